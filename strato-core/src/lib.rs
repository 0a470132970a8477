//! strato-core: reconciliation engine for cloud resources.
//!
//! Converges remote resources (storage accounts, disk snapshots) to a
//! declarative document:
//! - `translate` turns a document into create/update requests
//! - `poller` waits for long-running provisioning to settle
//! - `reflect` maps remote representations back onto documents
//! - `reconciler` sequences the above per lifecycle operation
//!
//! The remote control plane is reached only through the traits in `client`.

pub mod audit;
pub mod changes;
pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod migrate;
pub mod model;
pub mod poller;
pub mod reconciler;
pub mod reflect;
pub mod tags;
pub mod translate;
pub mod validation;

pub use audit::AuditLogger;
pub use changes::{FieldChangeSet, UpdateGroup};
pub use client::{
    ClientError, InMemoryCloud, OperationHandle, OperationKind, SnapshotsApi, StorageAccountsApi,
};
pub use config::{EngineConfig, PollConfig};
pub use error::{ReconcileError, Result, ValidationError};
pub use id::{IdParseError, ResourceId};
pub use model::{Coordinates, DeclaredResource, ProvisioningState, Snapshot, StorageAccount};
pub use poller::{Clock, ManualClock, PollError, PollOutcome, PollSpec, Poller, TokioClock};
pub use reconciler::{Observed, Reconciler, SnapshotReconciler, StorageAccountReconciler};
