//! Desired-state translators.
//!
//! Translators are pure: they validate a document and build remote request
//! bodies without touching the network.

pub mod snapshot;
pub mod storage_account;

pub use snapshot::SnapshotTranslator;
pub use storage_account::StorageAccountTranslator;
