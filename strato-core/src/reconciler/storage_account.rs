//! Storage account reconciler.
//!
//! Create is a write followed by an identifier lookup and a wait for
//! `Succeeded`. Update issues one call per changed field group.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Observed, Reconciler, absorb_not_found, confirm_identity, locate, require_located};
use crate::audit::AuditLogger;
use crate::changes::{FieldChangeSet, storage_account_replacements};
use crate::client::storage::StorageAccountsApi;
use crate::client::{ClientError, OperationHandle};
use crate::config::EngineConfig;
use crate::error::{ReconcileError, Result};
use crate::model::{Coordinates, DeclaredResource, StorageAccount};
use crate::poller::{AccountStates, PollSpec, Poller};
use crate::reflect::storage_account::reflect;
use crate::translate::StorageAccountTranslator;

const KIND: &str = StorageAccount::KIND;

pub struct StorageAccountReconciler<C: ?Sized> {
    client: Arc<C>,
    translator: StorageAccountTranslator,
    poller: Poller,
    poll: PollSpec,
    audit: Arc<AuditLogger>,
}

impl<C: StorageAccountsApi + ?Sized> StorageAccountReconciler<C> {
    pub fn new(client: Arc<C>, config: &EngineConfig, audit: Arc<AuditLogger>) -> Self {
        Self {
            client,
            translator: StorageAccountTranslator::from_config(config),
            poller: Poller::default(),
            poll: PollSpec::creation(&config.create_poll),
            audit,
        }
    }

    /// Replace the poller, e.g. to drive it with a virtual clock.
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    /// Wait for an accepted write to complete.
    async fn settle(
        &self,
        accepted: std::result::Result<OperationHandle, ClientError>,
    ) -> std::result::Result<(), ClientError> {
        let handle = accepted?;
        debug!(operation = %handle, "Waiting for operation");
        self.client.wait(&handle).await
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
impl<C: StorageAccountsApi + ?Sized + 'static> Reconciler for StorageAccountReconciler<C> {
    type Resource = StorageAccount;

    async fn create(&self, doc: &mut StorageAccount) -> Result<()> {
        let target = doc.coordinates();
        let params = self
            .translator
            .translate_for_create(doc)
            .map_err(|source| ReconcileError::Validation {
                kind: KIND,
                name: doc.name.clone(),
                source,
            })?;

        info!(%target, sku = %params.sku.name, kind = %params.kind, "Creating storage account");
        let created = self.settle(self.client.create(&target, params).await).await;

        // The write response carries no identifier; a follow-up read is the
        // only way to learn it, even when the write reported an error.
        let lookup = self
            .client
            .get_properties(&target)
            .await
            .map(|account| account.id);
        let id = confirm_identity(doc, &target, created, lookup, &self.audit)?;

        debug!(%target, "Waiting for storage account to become available");
        self.poller
            .await_terminal(&AccountStates(&*self.client), &target, &self.poll)
            .await
            .map_err(|e| ReconcileError::from_poll(KIND, target.clone(), e))?;

        if self.read(doc).await? == Observed::Absent {
            return Err(ReconcileError::NotFound { kind: KIND, id });
        }
        self.audit.created(KIND, &target.name, &id);
        Ok(())
    }

    async fn read(&self, doc: &mut StorageAccount) -> Result<Observed> {
        let Some((id, target)) = locate(doc)? else {
            return Ok(Observed::Absent);
        };

        let account = match self.client.get_properties(&target).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                warn!(%target, %id, "Storage account no longer exists, removing from state");
                self.audit.drift_detected(KIND, &target.name, &id);
                doc.set_id(None);
                return Ok(Observed::Absent);
            }
            Err(e) => return Err(Self::api_error("reading", &target, e)),
        };

        let keys = self
            .client
            .list_keys(&target)
            .await
            .map_err(|e| Self::api_error("listing keys of", &target, e))?;

        let mut observed = reflect(&account, &target.resource_group, &keys).map_err(|e| {
            ReconcileError::MalformedRemoteState {
                kind: KIND,
                target: target.clone(),
                field: e.field,
                detail: e.detail,
            }
        })?;
        observed.retain_unreflected(doc);
        observed.id = Some(id);
        *doc = observed;
        Ok(Observed::Present)
    }

    async fn update(&self, state: &mut StorageAccount, desired: &StorageAccount) -> Result<()> {
        let (id, target) = require_located(state)?;

        let replaced = storage_account_replacements(state, desired);
        if !replaced.is_empty() {
            return Err(ReconcileError::RequiresReplacement {
                kind: KIND,
                target,
                fields: replaced,
            });
        }

        let changes = FieldChangeSet::between(state, desired);
        if changes.is_empty() {
            debug!(%target, "Storage account is up to date");
            return Ok(());
        }

        let requests = self
            .translator
            .translate_for_update(desired, &changes)
            .map_err(|source| ReconcileError::Validation {
                kind: KIND,
                name: desired.name.clone(),
                source,
            })?;

        let mut applied = Vec::with_capacity(requests.len());
        for (group, params) in requests {
            info!(%target, %group, fields = ?group.fields(), "Updating storage account");
            if let Err(source) = self.settle(self.client.update(&target, params).await).await {
                warn!(%target, %group, error = %source, "Update failed, earlier groups stay applied");
                return Err(ReconcileError::PartialApply {
                    kind: KIND,
                    target,
                    group,
                    applied,
                    source,
                });
            }
            group.persist(desired, state);
            self.audit.group_applied(KIND, &target.name, &id, group.label());
            applied.push(group);
        }

        self.audit.updated(KIND, &target.name, &id);
        Ok(())
    }

    async fn delete(&self, doc: &mut StorageAccount) -> Result<()> {
        let Some((id, target)) = locate(doc)? else {
            return Ok(());
        };

        info!(%target, "Deleting storage account");
        let removed = absorb_not_found(self.settle(self.client.delete(&target).await).await)
            .map_err(|e| Self::api_error("deleting", &target, e))?;
        if !removed {
            debug!(%target, "Storage account was already gone");
        }

        doc.set_id(None);
        self.audit.deleted(KIND, &target.name, &id);
        Ok(())
    }
}
