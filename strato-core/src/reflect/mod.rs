//! State reflectors: remote representations back onto documents.

pub mod snapshot;
pub mod storage_account;

use thiserror::Error;

/// The remote representation violated a format this engine relies on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {detail}")]
pub struct ReflectError {
    pub field: &'static str,
    pub detail: String,
}

impl ReflectError {
    pub fn new(field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            field,
            detail: detail.into(),
        }
    }

    pub fn missing(field: &'static str) -> Self {
        Self::new(field, "missing from remote representation")
    }
}

/// Blob connection string for an endpoint and account key.
pub fn connection_string(blob_endpoint: &str, account_name: &str, account_key: &str) -> String {
    format!(
        "DefaultEndpointsProtocol=https;BlobEndpoint={};AccountName={};AccountKey={}",
        blob_endpoint, account_name, account_key
    )
}
