//! Error types for the reconciliation engine.

use std::time::Duration;

use thiserror::Error;

use crate::changes::UpdateGroup;
use crate::id::IdParseError;
use crate::model::snapshot::CreateOption;
use crate::model::storage_account::ReplicationType;
use crate::model::{Coordinates, ProvisioningState};
use crate::poller::PollError;

/// Errors returned by a remote control plane client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The addressed resource does not exist remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote API rejected or failed the request.
    #[error("remote API returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The request never reached the remote API.
    #[error("transport: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::NotFound(_) => false,
            ClientError::Api { status, .. } => *status >= 500 || *status == 429,
            ClientError::Transport(_) => true,
        }
    }
}

/// Input combinations rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} {value:?} is not a recognised value")]
    UnknownValue { field: &'static str, value: String },

    #[error(
        "storage account name {0:?} can only consist of lowercase letters and numbers, and must be between 3 and 24 characters long"
    )]
    StorageAccountName(String),

    #[error("snapshot name {0:?} can only contain alphanumeric characters and underscores")]
    SnapshotNameCharacters(String),

    #[error("snapshot name can be up to 80 characters, currently {0}")]
    SnapshotNameLength(usize),

    #[error("an account_replication_type of {0} isn't supported for BlobStorage accounts")]
    UnsupportedReplication(ReplicationType),

    #[error("storage account type {0:?} is not supported")]
    UnsupportedSku(String),

    #[error("access_tier is only valid for BlobStorage accounts")]
    AccessTierNotSupported,

    #[error("create_option {option} requires {field}")]
    MissingCreationSource {
        option: CreateOption,
        field: &'static str,
    },

    #[error("a maximum of 15 tags can be applied, got {0}")]
    TooManyTags(usize),

    #[error("tag key {0:?} exceeds 512 characters")]
    TagKeyTooLong(String),

    #[error("value for tag {0:?} exceeds 256 characters")]
    TagValueTooLong(String),

    #[error("invalid state document: {0}")]
    InvalidDocument(String),
}

/// Errors surfaced by the reconciler, carrying enough context to correlate
/// with remote-side logs.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("invalid {kind} {name:?}: {source}")]
    Validation {
        kind: &'static str,
        name: String,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    InvalidId(#[from] IdParseError),

    #[error("{kind} {id:?} does not exist")]
    NotFound { kind: &'static str, id: String },

    #[error("error {action} {kind} {target}: {source}")]
    Api {
        kind: &'static str,
        action: &'static str,
        target: Coordinates,
        #[source]
        source: ClientError,
    },

    #[error("error creating {kind} {target}: {source}")]
    CreateFailed {
        kind: &'static str,
        target: Coordinates,
        /// Identifier discovered after the failed create, already recorded on the document.
        recovered_id: Option<String>,
        #[source]
        source: ClientError,
    },

    #[error("{kind} {target} was created but its identifier is not discoverable yet")]
    IdentityLoss {
        kind: &'static str,
        target: Coordinates,
    },

    #[error("{kind} {target} reached unexpected provisioning state {state} after {polls} polls")]
    UnexpectedState {
        kind: &'static str,
        target: Coordinates,
        state: ProvisioningState,
        polls: u32,
    },

    #[error("timed out after {elapsed:?} waiting for {kind} {target} (last state {last_state})")]
    Timeout {
        kind: &'static str,
        target: Coordinates,
        elapsed: Duration,
        last_state: ProvisioningState,
    },

    #[error(
        "error updating {group} of {kind} {target} (already applied: [{}]): {source}",
        join_groups(.applied)
    )]
    PartialApply {
        kind: &'static str,
        target: Coordinates,
        group: UpdateGroup,
        applied: Vec<UpdateGroup>,
        #[source]
        source: ClientError,
    },

    #[error("{kind} {target} returned malformed {field}: {detail}")]
    MalformedRemoteState {
        kind: &'static str,
        target: Coordinates,
        field: &'static str,
        detail: String,
    },

    #[error("changing {} of {kind} {target} requires replacing the resource", .fields.join(", "))]
    RequiresReplacement {
        kind: &'static str,
        target: Coordinates,
        fields: Vec<&'static str>,
    },
}

impl ReconcileError {
    /// Maps a poller failure onto the reconciler taxonomy.
    pub fn from_poll(kind: &'static str, target: Coordinates, err: PollError) -> Self {
        match err {
            PollError::UnexpectedState { state, polls } => ReconcileError::UnexpectedState {
                kind,
                target,
                state,
                polls,
            },
            PollError::Timeout {
                last_state,
                elapsed,
                ..
            } => ReconcileError::Timeout {
                kind,
                target,
                elapsed,
                last_state,
            },
            PollError::Client { source, .. } => ReconcileError::Api {
                kind,
                action: "polling",
                target,
                source,
            },
            PollError::Vanished { polls } => ReconcileError::Api {
                kind,
                action: "polling",
                target,
                source: ClientError::NotFound(format!("resource disappeared after {polls} polls")),
            },
        }
    }

    /// Caller bugs (bad input, malformed identifiers) are never worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Validation { .. }
            | ReconcileError::InvalidId(_)
            | ReconcileError::RequiresReplacement { .. }
            | ReconcileError::MalformedRemoteState { .. }
            | ReconcileError::NotFound { .. }
            | ReconcileError::UnexpectedState { .. } => false,
            ReconcileError::Api { source, .. }
            | ReconcileError::CreateFailed { source, .. }
            | ReconcileError::PartialApply { source, .. } => source.is_transient(),
            ReconcileError::IdentityLoss { .. } | ReconcileError::Timeout { .. } => true,
        }
    }
}

fn join_groups(groups: &[UpdateGroup]) -> String {
    groups
        .iter()
        .map(|g| g.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
