//! Snapshot reconciler.
//!
//! Snapshots use one merged create-or-update call for both create and update.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Observed, Reconciler, absorb_not_found, confirm_identity, locate, require_located};
use crate::audit::AuditLogger;
use crate::changes::{snapshot_changed_fields, snapshot_replacements};
use crate::client::snapshots::{CreationData, SnapshotsApi};
use crate::client::{ClientError, OperationHandle};
use crate::config::EngineConfig;
use crate::error::{ReconcileError, Result, ValidationError};
use crate::model::{Coordinates, DeclaredResource, Snapshot};
use crate::poller::{PollSpec, Poller, SnapshotStates};
use crate::reflect::snapshot::reflect;
use crate::translate::SnapshotTranslator;

const KIND: &str = Snapshot::KIND;

pub struct SnapshotReconciler<C: ?Sized> {
    client: Arc<C>,
    translator: SnapshotTranslator,
    poller: Poller,
    poll: PollSpec,
    audit: Arc<AuditLogger>,
}

impl<C: SnapshotsApi + ?Sized> SnapshotReconciler<C> {
    pub fn new(client: Arc<C>, config: &EngineConfig, audit: Arc<AuditLogger>) -> Self {
        Self {
            client,
            translator: SnapshotTranslator,
            poller: Poller::default(),
            poll: PollSpec::creation(&config.create_poll),
            audit,
        }
    }

    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    async fn settle(
        &self,
        accepted: std::result::Result<OperationHandle, ClientError>,
    ) -> std::result::Result<(), ClientError> {
        let handle = accepted?;
        debug!(operation = %handle, "Waiting for operation");
        self.client.wait(&handle).await
    }

    fn validation_error(doc: &Snapshot, source: ValidationError) -> ReconcileError {
        ReconcileError::Validation {
            kind: KIND,
            name: doc.name.clone(),
            source,
        }
    }

    fn api_error(action: &'static str, target: &Coordinates, source: ClientError) -> ReconcileError {
        ReconcileError::Api {
            kind: KIND,
            action,
            target: target.clone(),
            source,
        }
    }
}

#[async_trait]
impl<C: SnapshotsApi + ?Sized + 'static> Reconciler for SnapshotReconciler<C> {
    type Resource = Snapshot;

    async fn create(&self, doc: &mut Snapshot) -> Result<()> {
        let target = doc.coordinates();
        let body = self
            .translator
            .translate_for_create(doc)
            .map_err(|e| Self::validation_error(doc, e))?;

        info!(%target, create_option = %doc.create_option, "Creating snapshot");
        let created = self
            .settle(self.client.create_or_update(&target, body).await)
            .await;

        let lookup = self.client.get(&target).await.map(|snapshot| snapshot.id);
        let id = confirm_identity(doc, &target, created, lookup, &self.audit)?;

        self.poller
            .await_terminal(&SnapshotStates(&*self.client), &target, &self.poll)
            .await
            .map_err(|e| ReconcileError::from_poll(KIND, target.clone(), e))?;

        if self.read(doc).await? == Observed::Absent {
            return Err(ReconcileError::NotFound { kind: KIND, id });
        }
        self.audit.created(KIND, &target.name, &id);
        Ok(())
    }

    async fn read(&self, doc: &mut Snapshot) -> Result<Observed> {
        let Some((id, target)) = locate(doc)? else {
            return Ok(Observed::Absent);
        };

        let remote = match self.client.get(&target).await {
            Ok(remote) => remote,
            Err(e) if e.is_not_found() => {
                warn!(%target, %id, "Snapshot no longer exists, removing from state");
                self.audit.drift_detected(KIND, &target.name, &id);
                doc.set_id(None);
                return Ok(Observed::Absent);
            }
            Err(e) => return Err(Self::api_error("reading", &target, e)),
        };

        let mut observed = reflect(&remote, &target.resource_group).map_err(|e| {
            ReconcileError::MalformedRemoteState {
                kind: KIND,
                target: target.clone(),
                field: e.field,
                detail: e.detail,
            }
        })?;
        observed.id = Some(id);
        *doc = observed;
        Ok(Observed::Present)
    }

    async fn update(&self, state: &mut Snapshot, desired: &Snapshot) -> Result<()> {
        let (id, target) = require_located(state)?;

        let replaced = snapshot_replacements(state, desired);
        if !replaced.is_empty() {
            return Err(ReconcileError::RequiresReplacement {
                kind: KIND,
                target,
                fields: replaced,
            });
        }

        let changed = snapshot_changed_fields(state, desired);
        if changed.is_empty() {
            debug!(%target, "Snapshot is up to date");
            return Ok(());
        }

        let mut body = self
            .translator
            .translate_for_create(desired)
            .map_err(|e| Self::validation_error(desired, e))?;
        // Source references cannot change in place; resend what the remote side holds.
        if let Some(props) = body.properties.as_mut() {
            props.creation_data = Some(CreationData {
                create_option: desired.create_option.to_string(),
                source_uri: state.source_uri.clone(),
                source_resource_id: state.source_resource_id.clone(),
                storage_account_id: state.storage_account_id.clone(),
            });
        }

        info!(%target, fields = ?changed, "Updating snapshot");
        self.settle(self.client.create_or_update(&target, body).await)
            .await
            .map_err(|e| Self::api_error("updating", &target, e))?;

        state.create_option = desired.create_option;
        if desired.disk_size_gb.is_some() {
            state.disk_size_gb = desired.disk_size_gb;
        }
        state.encryption_settings = desired.encryption_settings.clone();
        state.tags = desired.tags.clone();
        self.audit.updated(KIND, &target.name, &id);
        Ok(())
    }

    async fn delete(&self, doc: &mut Snapshot) -> Result<()> {
        let Some((id, target)) = locate(doc)? else {
            return Ok(());
        };

        info!(%target, "Deleting snapshot");
        let removed = absorb_not_found(self.settle(self.client.delete(&target).await).await)
            .map_err(|e| Self::api_error("deleting", &target, e))?;
        if !removed {
            debug!(%target, "Snapshot was already gone");
        }

        doc.set_id(None);
        self.audit.deleted(KIND, &target.name, &id);
        Ok(())
    }
}
