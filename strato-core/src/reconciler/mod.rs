//! Reconcilers for the managed resource kinds.
//!
//! Each reconciler sequences translation, remote calls, polling and
//! reflection for one lifecycle operation. Documents are never cached
//! between calls: every operation reads and writes the caller's document.

pub mod snapshot;
pub mod storage_account;

use async_trait::async_trait;
use tracing::{info, warn};

pub use snapshot::SnapshotReconciler;
pub use storage_account::StorageAccountReconciler;

use crate::audit::AuditLogger;
use crate::error::{ClientError, ReconcileError, Result};
use crate::id::ResourceId;
use crate::model::{Coordinates, DeclaredResource};

/// Whether a read found the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    Present,
    /// Gone remotely. The document's identifier has been cleared.
    Absent,
}

/// Lifecycle operations for one resource kind.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Resource: DeclaredResource;

    /// Create the resource declared by `doc` and populate its identifier
    /// and computed fields.
    async fn create(&self, doc: &mut Self::Resource) -> Result<()>;

    /// Refresh `doc` from remote state.
    async fn read(&self, doc: &mut Self::Resource) -> Result<Observed>;

    /// Apply the changes between `state` and `desired`, recording each
    /// applied change in `state`.
    async fn update(&self, state: &mut Self::Resource, desired: &Self::Resource) -> Result<()>;

    /// Delete the resource. Absent resources count as deleted.
    async fn delete(&self, doc: &mut Self::Resource) -> Result<()>;

    /// Adopt an existing remote resource by identifier.
    async fn import(&self, id: &str) -> Result<Self::Resource> {
        ResourceId::parse(id)?.coordinates(Self::Resource::TYPE_KEY)?;

        let mut doc = Self::Resource::default();
        doc.set_id(Some(id.to_string()));
        match self.read(&mut doc).await? {
            Observed::Present => Ok(doc),
            Observed::Absent => Err(ReconcileError::NotFound {
                kind: Self::Resource::KIND,
                id: id.to_string(),
            }),
        }
    }

    /// Converge `state` to `desired`, creating the resource when it does
    /// not exist (or no longer exists) remotely.
    async fn apply(&self, state: &mut Self::Resource, desired: &Self::Resource) -> Result<()> {
        if state.id().is_some() && self.read(state).await? == Observed::Present {
            self.update(state, desired).await?;
            self.read(state).await?;
            return Ok(());
        }

        *state = desired.clone();
        state.set_id(None);
        self.create(state).await
    }
}

/// Identifier and coordinates of a created resource, `None` before creation.
pub(crate) fn locate<R: DeclaredResource>(doc: &R) -> Result<Option<(String, Coordinates)>> {
    let Some(id) = doc.id().filter(|id| !id.is_empty()) else {
        return Ok(None);
    };
    let coordinates = ResourceId::parse(id)?.coordinates(R::TYPE_KEY)?;
    Ok(Some((id.to_string(), coordinates)))
}

/// Like `locate`, for operations that need an existing resource.
pub(crate) fn require_located<R: DeclaredResource>(doc: &R) -> Result<(String, Coordinates)> {
    match locate(doc)? {
        Some(located) => Ok(located),
        None => Err(ReconcileError::NotFound {
            kind: R::KIND,
            id: String::new(),
        }),
    }
}

/// Second half of the create protocol: record any identifier found by the
/// follow-up lookup, then report the create outcome.
///
/// The identifier is set on `doc` before a create error is returned, so a
/// partially successful create can still be deleted.
pub(crate) fn confirm_identity<R: DeclaredResource>(
    doc: &mut R,
    target: &Coordinates,
    created: std::result::Result<(), ClientError>,
    lookup: std::result::Result<Option<String>, ClientError>,
    audit: &AuditLogger,
) -> Result<String> {
    let recovered = match &lookup {
        Ok(Some(id)) if !id.is_empty() => Some(id.clone()),
        _ => None,
    };
    if let Some(id) = &recovered {
        info!(kind = R::KIND, %target, %id, "Recorded identifier");
        doc.set_id(Some(id.clone()));
        audit.identity_recorded(R::KIND, &target.name, id);
    }

    if let Err(source) = created {
        audit.create_failed(R::KIND, &target.name, recovered.as_deref(), &source.to_string());
        return Err(ReconcileError::CreateFailed {
            kind: R::KIND,
            target: target.clone(),
            recovered_id: recovered,
            source,
        });
    }

    match (recovered, lookup) {
        (Some(id), _) => Ok(id),
        (None, Err(source)) if !source.is_not_found() => Err(ReconcileError::Api {
            kind: R::KIND,
            action: "reading",
            target: target.clone(),
            source,
        }),
        (None, _) => {
            warn!(kind = R::KIND, %target, "Created resource is not discoverable");
            audit.identity_lost(R::KIND, &target.name, &target.resource_group);
            Err(ReconcileError::IdentityLoss {
                kind: R::KIND,
                target: target.clone(),
            })
        }
    }
}

/// Remote deletes count as successful when the resource is already gone.
pub(crate) fn absorb_not_found(
    result: std::result::Result<(), ClientError>,
) -> std::result::Result<bool, ClientError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}
