//! Shared test utilities for strato-core integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use strato_core::client::snapshots::SnapshotResource;
use strato_core::client::storage::{
    Account, AccountCreateParameters, AccountKey, AccountUpdateParameters,
};
use strato_core::model::snapshot::CreateOption;
use strato_core::{
    AuditLogger, ClientError, Coordinates, EngineConfig, InMemoryCloud, ManualClock,
    OperationHandle, Poller, Snapshot, SnapshotReconciler, SnapshotsApi, StorageAccount,
    StorageAccountReconciler, StorageAccountsApi,
};

pub const SUBSCRIPTION: &str = "11111111-2222-3333-4444-555555555555";

/// A scripted failure for one remote call.
struct Fault {
    call: &'static str,
    /// 1-based occurrence of `call` that fails.
    nth: usize,
    /// Perform the call against the emulated remote before failing it.
    apply: bool,
    error: ClientError,
}

/// Remote control plane that records every call in order and fails
/// scripted ones. Unscripted calls go to an `InMemoryCloud`.
pub struct FakeCloud {
    inner: InMemoryCloud,
    calls: Mutex<Vec<String>>,
    updates: Mutex<Vec<AccountUpdateParameters>>,
    faults: Mutex<Vec<Fault>>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Self::settling_after(1)
    }

    /// New resources report `Creating` for `reads` reads.
    pub fn settling_after(reads: u32) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryCloud::new(SUBSCRIPTION).with_settle_after(reads),
            calls: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
        })
    }

    /// Fail the `nth` call named `call` without reaching the remote.
    pub fn fail(&self, call: &'static str, nth: usize, error: ClientError) {
        self.faults.lock().unwrap().push(Fault {
            call,
            nth,
            apply: false,
            error,
        });
    }

    /// Apply the `nth` call named `call` remotely, then report `error`.
    pub fn fail_after_applying(&self, call: &'static str, nth: usize, error: ClientError) {
        self.faults.lock().unwrap().push(Fault {
            call,
            nth,
            apply: true,
            error,
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than `wait`, which every write is followed by.
    pub fn remote_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c != "wait")
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn updates(&self) -> Vec<AccountUpdateParameters> {
        self.updates.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.updates.lock().unwrap().clear();
    }

    pub fn inner(&self) -> &InMemoryCloud {
        &self.inner
    }

    /// Record a call and take the scripted fault for it, if any.
    fn record(&self, call: &'static str) -> Option<(bool, ClientError)> {
        let occurrence = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.to_string());
            calls.iter().filter(|c| *c == call).count()
        };
        let mut faults = self.faults.lock().unwrap();
        let index = faults
            .iter()
            .position(|f| f.call == call && f.nth == occurrence)?;
        let fault = faults.remove(index);
        Some((fault.apply, fault.error))
    }
}

/// Run `op` unless a fault is scripted; applying faults run it and discard the result.
macro_rules! scripted {
    ($self:ident, $call:literal, $op:expr) => {
        match $self.record($call) {
            None => $op,
            Some((true, error)) => {
                let _ = $op;
                Err(error)
            }
            Some((false, error)) => Err(error),
        }
    };
}

#[async_trait]
impl StorageAccountsApi for FakeCloud {
    async fn create(
        &self,
        target: &Coordinates,
        params: AccountCreateParameters,
    ) -> Result<OperationHandle, ClientError> {
        match self.record("create") {
            None => self.inner.create(target, params).await,
            Some((true, error)) => {
                let handle = self.inner.create(target, params).await?;
                StorageAccountsApi::wait(&self.inner, &handle).await?;
                Err(error)
            }
            Some((false, error)) => Err(error),
        }
    }

    async fn update(
        &self,
        target: &Coordinates,
        params: AccountUpdateParameters,
    ) -> Result<OperationHandle, ClientError> {
        self.updates.lock().unwrap().push(params.clone());
        scripted!(self, "update", self.inner.update(target, params).await)
    }

    async fn delete(&self, target: &Coordinates) -> Result<OperationHandle, ClientError> {
        scripted!(
            self,
            "delete",
            StorageAccountsApi::delete(&self.inner, target).await
        )
    }

    async fn get_properties(&self, target: &Coordinates) -> Result<Account, ClientError> {
        scripted!(
            self,
            "get_properties",
            self.inner.get_properties(target).await
        )
    }

    async fn list_keys(&self, target: &Coordinates) -> Result<Vec<AccountKey>, ClientError> {
        scripted!(self, "list_keys", self.inner.list_keys(target).await)
    }

    async fn wait(&self, handle: &OperationHandle) -> Result<(), ClientError> {
        scripted!(self, "wait", StorageAccountsApi::wait(&self.inner, handle).await)
    }
}

#[async_trait]
impl SnapshotsApi for FakeCloud {
    async fn create_or_update(
        &self,
        target: &Coordinates,
        snapshot: SnapshotResource,
    ) -> Result<OperationHandle, ClientError> {
        match self.record("create_or_update") {
            None => self.inner.create_or_update(target, snapshot).await,
            Some((true, error)) => {
                let handle = self.inner.create_or_update(target, snapshot).await?;
                SnapshotsApi::wait(&self.inner, &handle).await?;
                Err(error)
            }
            Some((false, error)) => Err(error),
        }
    }

    async fn delete(&self, target: &Coordinates) -> Result<OperationHandle, ClientError> {
        scripted!(self, "delete", SnapshotsApi::delete(&self.inner, target).await)
    }

    async fn get(&self, target: &Coordinates) -> Result<SnapshotResource, ClientError> {
        scripted!(self, "get", self.inner.get(target).await)
    }

    async fn wait(&self, handle: &OperationHandle) -> Result<(), ClientError> {
        scripted!(self, "wait", SnapshotsApi::wait(&self.inner, handle).await)
    }
}

pub fn server_error() -> ClientError {
    ClientError::Api {
        status: 500,
        code: "InternalServerError".to_string(),
        message: "An internal error occurred.".to_string(),
    }
}

pub fn virtual_poller() -> (Poller, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (Poller::new(clock.clone()), clock)
}

pub fn storage_reconciler(cloud: &Arc<FakeCloud>) -> StorageAccountReconciler<FakeCloud> {
    let (poller, _) = virtual_poller();
    StorageAccountReconciler::new(
        cloud.clone(),
        &EngineConfig::default(),
        Arc::new(AuditLogger::new_noop()),
    )
    .with_poller(poller)
}

pub fn snapshot_reconciler(cloud: &Arc<FakeCloud>) -> SnapshotReconciler<FakeCloud> {
    let (poller, _) = virtual_poller();
    SnapshotReconciler::new(
        cloud.clone(),
        &EngineConfig::default(),
        Arc::new(AuditLogger::new_noop()),
    )
    .with_poller(poller)
}

pub fn storage_account(name: &str) -> StorageAccount {
    StorageAccount {
        name: name.to_string(),
        resource_group_name: "rg-test".to_string(),
        location: "West Europe".to_string(),
        ..Default::default()
    }
}

pub fn snapshot(name: &str) -> Snapshot {
    Snapshot {
        name: name.to_string(),
        resource_group_name: "rg-test".to_string(),
        location: "westeurope".to_string(),
        create_option: CreateOption::Copy,
        source_resource_id: Some(format!(
            "/subscriptions/{}/resourceGroups/rg-test/providers/Microsoft.Compute/disks/osdisk",
            SUBSCRIPTION
        )),
        ..Default::default()
    }
}

pub fn account_id(name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/rg-test/providers/Microsoft.Storage/storageAccounts/{}",
        SUBSCRIPTION, name
    )
}

pub fn snapshot_id(name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/rg-test/providers/Microsoft.Compute/snapshots/{}",
        SUBSCRIPTION, name
    )
}
