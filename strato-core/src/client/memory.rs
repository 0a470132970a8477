//! In-memory control plane.
//!
//! Implements both remote contracts against local state, optionally mirrored
//! to a JSON file so separate processes observe the same emulated remote.
//! Newly created resources report `Creating` for a configurable number of
//! reads before settling on `Succeeded`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::snapshots::{SnapshotProperties, SnapshotResource, SnapshotsApi};
use super::storage::{
    Account, AccountCreateParameters, AccountKey, AccountProperties, AccountUpdateParameters,
    CustomDomainSetting, Encryption, Endpoints, Sku, StorageAccountsApi,
};
use super::{ClientError, OperationHandle, OperationKind};
use crate::id::ResourceId;
use crate::model::{Coordinates, ProvisioningState, normalize_location};

const STORAGE_PROVIDER: &str = "Microsoft.Storage";
const COMPUTE_PROVIDER: &str = "Microsoft.Compute";
const DEFAULT_SNAPSHOT_SIZE_GB: i32 = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAccount {
    resource_group: String,
    account: Account,
    keys: Vec<AccountKey>,
    /// Reads left before the account reports `Succeeded`.
    pending_reads: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSnapshot {
    snapshot: SnapshotResource,
    pending_reads: u32,
}

/// Emulated remote state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CloudState {
    subscription_id: String,
    settle_after: u32,
    /// Keyed by lowercased account name: account names are globally unique.
    accounts: BTreeMap<String, StoredAccount>,
    /// Keyed by lowercased `resource_group/name`.
    snapshots: BTreeMap<String, StoredSnapshot>,
    /// Accepted writes not yet awaited. Not persisted.
    #[serde(skip)]
    operations: HashSet<String>,
}

impl CloudState {
    fn accept(&mut self, kind: OperationKind, target: &Coordinates) -> OperationHandle {
        let handle = OperationHandle::new(kind, target.clone());
        self.operations.insert(handle.id.clone());
        handle
    }

    fn account_mut(&mut self, target: &Coordinates) -> Result<&mut StoredAccount, ClientError> {
        match self.accounts.get_mut(&target.name.to_lowercase()) {
            Some(stored) if stored.resource_group.eq_ignore_ascii_case(&target.resource_group) => {
                Ok(stored)
            }
            _ => Err(not_found("storage account", target)),
        }
    }
}

/// In-process implementation of `StorageAccountsApi` and `SnapshotsApi`.
pub struct InMemoryCloud {
    state: Mutex<CloudState>,
    path: Option<PathBuf>,
}

impl InMemoryCloud {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(CloudState {
                subscription_id: subscription_id.into(),
                ..Default::default()
            }),
            path: None,
        }
    }

    /// Open a file-backed control plane, starting empty if the file does not exist.
    pub async fn open(
        path: impl AsRef<Path>,
        subscription_id: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                ClientError::Transport(format!("corrupt cloud file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CloudState {
                subscription_id: subscription_id.into(),
                ..Default::default()
            },
            Err(e) => {
                return Err(ClientError::Transport(format!(
                    "failed to read cloud file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        Ok(Self {
            state: Mutex::new(state),
            path: Some(path),
        })
    }

    /// Number of reads a new resource reports `Creating` for.
    pub fn with_settle_after(mut self, reads: u32) -> Self {
        self.state.get_mut().settle_after = reads;
        self
    }

    async fn persist(&self, state: &CloudState) -> Result<(), ClientError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| ClientError::Transport(format!("failed to encode cloud state: {}", e)))?;
        tokio::fs::write(path, json).await.map_err(|e| {
            ClientError::Transport(format!("failed to write cloud file {}: {}", path.display(), e))
        })
    }

    async fn complete(&self, handle: &OperationHandle) -> Result<(), ClientError> {
        let mut state = self.state.lock().await;
        if state.operations.remove(&handle.id) {
            debug!(operation = %handle, "Operation completed");
            Ok(())
        } else {
            Err(ClientError::Transport(format!(
                "unknown operation {}",
                handle.id
            )))
        }
    }
}

fn not_found(kind: &str, target: &Coordinates) -> ClientError {
    ClientError::NotFound(format!("{} {}", kind, target))
}

fn bad_request(code: &str, message: impl Into<String>) -> ClientError {
    ClientError::Api {
        status: 400,
        code: code.to_string(),
        message: message.into(),
    }
}

fn settle(pending_reads: &mut u32) -> ProvisioningState {
    if *pending_reads > 0 {
        *pending_reads -= 1;
        ProvisioningState::Creating
    } else {
        ProvisioningState::Succeeded
    }
}

fn paired_region(location: &str) -> String {
    match location {
        "westeurope" => "northeurope",
        "northeurope" => "westeurope",
        "eastus" => "westus",
        "westus" => "eastus",
        "eastus2" => "centralus",
        "centralus" => "eastus2",
        other => other,
    }
    .to_string()
}

/// Split a `<tier>_<replication>` SKU name, rejecting anything else.
fn sku_parts(name: &str) -> Result<(&str, &str), ClientError> {
    match name.split_once('_') {
        Some((tier, replication)) if !tier.is_empty() && !replication.contains('_') => {
            Ok((tier, replication))
        }
        _ => Err(bad_request(
            "InvalidSku",
            format!("SKU name {:?} is not valid", name),
        )),
    }
}

fn endpoints(name: &str, blob_only: bool) -> Endpoints {
    let url = |service: &str| Some(format!("https://{}.{}.core.windows.net/", name, service));
    Endpoints {
        blob: url("blob"),
        queue: if blob_only { None } else { url("queue") },
        table: if blob_only { None } else { url("table") },
        file: if blob_only { None } else { url("file") },
    }
}

/// Recompute location and endpoint properties after a SKU or kind change.
fn refresh_topology(account: &mut Account) -> Result<(), ClientError> {
    let name = account.name.clone().unwrap_or_default();
    let location = account.location.clone().unwrap_or_default();
    let blob_only = account.kind.as_deref() == Some("BlobStorage");
    let sku = account
        .sku
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_default();
    let (_, replication) = sku_parts(&sku)?;
    let replication = replication.to_ascii_uppercase();

    let props = account.properties.get_or_insert_with(AccountProperties::default);
    props.primary_location = Some(location.clone());
    props.primary_endpoints = Some(endpoints(&name, blob_only));

    let geo_redundant = replication == "GRS" || replication == "RAGRS";
    props.secondary_location = geo_redundant.then(|| paired_region(&location));

    // Only read-access geo-redundancy exposes readable secondary endpoints; no file.
    props.secondary_endpoints = (replication == "RAGRS").then(|| {
        let mut secondary = endpoints(&format!("{}-secondary", name), blob_only);
        secondary.file = None;
        secondary
    });
    Ok(())
}

fn merge_encryption(current: &mut Option<Encryption>, update: Encryption) {
    let Some(existing) = current else {
        *current = Some(update);
        return;
    };
    existing.key_source = update.key_source;
    let Some(services) = update.services else {
        return;
    };
    let target = existing.services.get_or_insert_with(Default::default);
    if services.blob.is_some() {
        target.blob = services.blob;
    }
    if services.file.is_some() {
        target.file = services.file;
    }
}

fn non_empty_domain(domain: Option<CustomDomainSetting>) -> Option<CustomDomainSetting> {
    domain.filter(|d| !d.name.is_empty())
}

fn new_key(name: &str) -> AccountKey {
    AccountKey {
        key_name: name.to_string(),
        value: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
    }
}

#[async_trait]
impl StorageAccountsApi for InMemoryCloud {
    async fn create(
        &self,
        target: &Coordinates,
        params: AccountCreateParameters,
    ) -> Result<OperationHandle, ClientError> {
        let mut state = self.state.lock().await;
        let key = target.name.to_lowercase();

        if let Some(existing) = state.accounts.get(&key)
            && !existing.resource_group.eq_ignore_ascii_case(&target.resource_group)
        {
            return Err(ClientError::Api {
                status: 409,
                code: "StorageAccountAlreadyTaken".to_string(),
                message: format!("The storage account named {} is already taken.", target.name),
            });
        }

        let location = normalize_location(&params.location);
        if location.is_empty() {
            return Err(bad_request("LocationRequired", "The location property is required."));
        }
        let (tier, replication) = sku_parts(&params.sku.name)?;
        if params.kind == "BlobStorage" && replication.eq_ignore_ascii_case("ZRS") {
            return Err(bad_request(
                "InvalidSkuForKind",
                "ZRS replication is not supported for BlobStorage accounts.",
            ));
        }

        let id = ResourceId::build(
            &state.subscription_id,
            &target.resource_group,
            STORAGE_PROVIDER,
            "storageAccounts",
            &target.name,
        );
        let properties = AccountProperties {
            provisioning_state: Some(ProvisioningState::Creating),
            access_tier: params.properties.access_tier,
            enable_https_traffic_only: Some(
                params.properties.enable_https_traffic_only.unwrap_or(false),
            ),
            custom_domain: non_empty_domain(params.properties.custom_domain).map(|mut d| {
                // Indirect validation is a request-only setting.
                d.use_sub_domain = None;
                d
            }),
            encryption: params.properties.encryption,
            ..Default::default()
        };
        let mut account = Account {
            id: Some(id),
            name: Some(target.name.clone()),
            location: Some(location),
            kind: Some(params.kind),
            sku: Some(Sku {
                name: params.sku.name.clone(),
                tier: Some(tier.to_string()),
            }),
            tags: params.tags,
            properties: Some(properties),
        };
        refresh_topology(&mut account)?;

        let keys = match state.accounts.remove(&key) {
            Some(existing) => existing.keys,
            None => vec![new_key("key1"), new_key("key2")],
        };
        let pending_reads = state.settle_after;
        state.accounts.insert(
            key,
            StoredAccount {
                resource_group: target.resource_group.clone(),
                account,
                keys,
                pending_reads,
            },
        );

        let handle = state.accept(OperationKind::Create, target);
        self.persist(&state).await?;
        Ok(handle)
    }

    async fn update(
        &self,
        target: &Coordinates,
        params: AccountUpdateParameters,
    ) -> Result<OperationHandle, ClientError> {
        let mut state = self.state.lock().await;
        let stored = state.account_mut(target)?;
        let account = &mut stored.account;

        if let Some(sku) = params.sku {
            let (tier, replication) = sku_parts(&sku.name)?;
            if account.kind.as_deref() == Some("BlobStorage")
                && replication.eq_ignore_ascii_case("ZRS")
            {
                return Err(bad_request(
                    "InvalidSkuForKind",
                    "ZRS replication is not supported for BlobStorage accounts.",
                ));
            }
            account.sku = Some(Sku {
                name: sku.name.clone(),
                tier: Some(tier.to_string()),
            });
            refresh_topology(account)?;
        }

        if let Some(tags) = params.tags {
            account.tags = tags;
        }

        if let Some(update) = params.properties {
            let props = account
                .properties
                .get_or_insert_with(AccountProperties::default);
            if let Some(tier) = update.access_tier {
                props.access_tier = Some(tier);
            }
            if let Some(encryption) = update.encryption {
                merge_encryption(&mut props.encryption, encryption);
            }
            if let Some(domain) = update.custom_domain {
                props.custom_domain = non_empty_domain(Some(domain)).map(|mut d| {
                    d.use_sub_domain = None;
                    d
                });
            }
            if let Some(https) = update.enable_https_traffic_only {
                props.enable_https_traffic_only = Some(https);
            }
        }

        let handle = state.accept(OperationKind::Update, target);
        self.persist(&state).await?;
        Ok(handle)
    }

    async fn delete(&self, target: &Coordinates) -> Result<OperationHandle, ClientError> {
        let mut state = self.state.lock().await;
        state.account_mut(target)?;
        state.accounts.remove(&target.name.to_lowercase());

        let handle = state.accept(OperationKind::Delete, target);
        self.persist(&state).await?;
        Ok(handle)
    }

    async fn get_properties(&self, target: &Coordinates) -> Result<Account, ClientError> {
        let mut state = self.state.lock().await;
        let stored = state.account_mut(target)?;
        let provisioning = settle(&mut stored.pending_reads);
        if let Some(props) = stored.account.properties.as_mut() {
            props.provisioning_state = Some(provisioning);
        }
        let account = stored.account.clone();
        self.persist(&state).await?;
        Ok(account)
    }

    async fn list_keys(&self, target: &Coordinates) -> Result<Vec<AccountKey>, ClientError> {
        let mut state = self.state.lock().await;
        Ok(state.account_mut(target)?.keys.clone())
    }

    async fn wait(&self, handle: &OperationHandle) -> Result<(), ClientError> {
        self.complete(handle).await
    }
}

fn snapshot_key(target: &Coordinates) -> String {
    format!(
        "{}/{}",
        target.resource_group.to_lowercase(),
        target.name.to_lowercase()
    )
}

#[async_trait]
impl SnapshotsApi for InMemoryCloud {
    async fn create_or_update(
        &self,
        target: &Coordinates,
        snapshot: SnapshotResource,
    ) -> Result<OperationHandle, ClientError> {
        let mut state = self.state.lock().await;
        let key = snapshot_key(target);
        let incoming = snapshot.properties.unwrap_or_default();

        if let Some(existing) = state.snapshots.get_mut(&key) {
            let props = existing
                .snapshot
                .properties
                .get_or_insert_with(SnapshotProperties::default);
            if incoming.creation_data.is_some() && incoming.creation_data != props.creation_data {
                return Err(bad_request(
                    "PropertyChangeNotAllowed",
                    "Changing property 'creationData' is not allowed.",
                ));
            }
            if let Some(size) = incoming.disk_size_gb {
                if size < props.disk_size_gb.unwrap_or(0) {
                    return Err(bad_request(
                        "BadRequest",
                        "Snapshot size can only be increased.",
                    ));
                }
                props.disk_size_gb = Some(size);
            }
            props.encryption_settings = incoming.encryption_settings;
            existing.snapshot.tags = snapshot.tags;

            let handle = state.accept(OperationKind::Update, target);
            self.persist(&state).await?;
            return Ok(handle);
        }

        let location = normalize_location(snapshot.location.as_deref().unwrap_or_default());
        if location.is_empty() {
            return Err(bad_request("LocationRequired", "The location property is required."));
        }
        let Some(creation_data) = incoming.creation_data else {
            return Err(bad_request(
                "InvalidParameter",
                "Required parameter 'creationData' is missing.",
            ));
        };

        // Copies of tracked snapshots inherit their size.
        let source_size = creation_data
            .source_resource_id
            .as_deref()
            .and_then(|id| ResourceId::parse(id).ok())
            .and_then(|id| id.coordinates("snapshots").ok())
            .and_then(|source| state.snapshots.get(&snapshot_key(&source)))
            .and_then(|s| s.snapshot.properties.as_ref())
            .and_then(|p| p.disk_size_gb);
        let disk_size_gb = incoming
            .disk_size_gb
            .or(source_size)
            .unwrap_or(DEFAULT_SNAPSHOT_SIZE_GB);

        let id = ResourceId::build(
            &state.subscription_id,
            &target.resource_group,
            COMPUTE_PROVIDER,
            "snapshots",
            &target.name,
        );
        let stored = StoredSnapshot {
            snapshot: SnapshotResource {
                id: Some(id),
                name: Some(target.name.clone()),
                location: Some(location),
                tags: snapshot.tags,
                properties: Some(SnapshotProperties {
                    provisioning_state: Some(ProvisioningState::Creating),
                    creation_data: Some(creation_data),
                    disk_size_gb: Some(disk_size_gb),
                    encryption_settings: incoming.encryption_settings,
                    time_created: Some(Utc::now()),
                }),
            },
            pending_reads: state.settle_after,
        };
        state.snapshots.insert(key, stored);

        let handle = state.accept(OperationKind::Create, target);
        self.persist(&state).await?;
        Ok(handle)
    }

    async fn delete(&self, target: &Coordinates) -> Result<OperationHandle, ClientError> {
        let mut state = self.state.lock().await;
        if state.snapshots.remove(&snapshot_key(target)).is_none() {
            return Err(not_found("snapshot", target));
        }

        let handle = state.accept(OperationKind::Delete, target);
        self.persist(&state).await?;
        Ok(handle)
    }

    async fn get(&self, target: &Coordinates) -> Result<SnapshotResource, ClientError> {
        let mut state = self.state.lock().await;
        let stored = state
            .snapshots
            .get_mut(&snapshot_key(target))
            .ok_or_else(|| not_found("snapshot", target))?;
        let provisioning = settle(&mut stored.pending_reads);
        if let Some(props) = stored.snapshot.properties.as_mut() {
            props.provisioning_state = Some(provisioning);
        }
        let snapshot = stored.snapshot.clone();
        self.persist(&state).await?;
        Ok(snapshot)
    }

    async fn wait(&self, handle: &OperationHandle) -> Result<(), ClientError> {
        self.complete(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::AccountPropertiesCreate;

    fn params(sku: &str) -> AccountCreateParameters {
        AccountCreateParameters {
            location: "West Europe".to_string(),
            sku: Sku {
                name: sku.to_string(),
                tier: None,
            },
            kind: "Storage".to_string(),
            tags: Default::default(),
            properties: AccountPropertiesCreate::default(),
        }
    }

    #[tokio::test]
    async fn test_account_settles_after_reads() {
        let cloud = InMemoryCloud::new("sub").with_settle_after(2);
        let target = Coordinates::new("rg", "acct01");
        let handle = cloud.create(&target, params("Standard_LRS")).await.unwrap();
        StorageAccountsApi::wait(&cloud, &handle).await.unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let account = cloud.get_properties(&target).await.unwrap();
            seen.push(account.provisioning_state().cloned());
        }
        assert_eq!(
            seen,
            vec![
                Some(ProvisioningState::Creating),
                Some(ProvisioningState::Creating),
                Some(ProvisioningState::Succeeded)
            ]
        );
    }

    #[tokio::test]
    async fn test_secondaries_only_for_geo_redundancy() {
        let cloud = InMemoryCloud::new("sub");
        let lrs = Coordinates::new("rg", "lrsacct");
        let ragrs = Coordinates::new("rg", "ragrsacct");
        cloud.create(&lrs, params("Standard_LRS")).await.unwrap();
        cloud.create(&ragrs, params("Standard_RAGRS")).await.unwrap();

        let lrs = cloud.get_properties(&lrs).await.unwrap().properties.unwrap();
        assert!(lrs.secondary_location.is_none());
        assert!(lrs.secondary_endpoints.is_none());

        let ragrs = cloud.get_properties(&ragrs).await.unwrap().properties.unwrap();
        assert_eq!(ragrs.secondary_location.as_deref(), Some("northeurope"));
        let secondary = ragrs.secondary_endpoints.unwrap();
        assert_eq!(
            secondary.blob.as_deref(),
            Some("https://ragrsacct-secondary.blob.core.windows.net/")
        );
        assert!(secondary.file.is_none());
    }

    #[tokio::test]
    async fn test_account_name_is_global() {
        let cloud = InMemoryCloud::new("sub");
        cloud
            .create(&Coordinates::new("rg-a", "shared01"), params("Standard_LRS"))
            .await
            .unwrap();
        let err = cloud
            .create(&Coordinates::new("rg-b", "shared01"), params("Standard_LRS"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 409, .. }));

        let err = cloud
            .get_properties(&Coordinates::new("rg-b", "shared01"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_wait_unknown_operation() {
        let cloud = InMemoryCloud::new("sub");
        let handle = OperationHandle::new(OperationKind::Delete, Coordinates::new("rg", "x"));
        assert!(matches!(
            StorageAccountsApi::wait(&cloud, &handle).await,
            Err(ClientError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloud.json");
        let target = Coordinates::new("rg", "persisted01");

        let cloud = InMemoryCloud::open(&path, "sub").await.unwrap();
        cloud.create(&target, params("Standard_GRS")).await.unwrap();
        let keys = cloud.list_keys(&target).await.unwrap();
        drop(cloud);

        let reopened = InMemoryCloud::open(&path, "other").await.unwrap();
        let account = reopened.get_properties(&target).await.unwrap();
        assert_eq!(
            account.id.as_deref(),
            Some("/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/persisted01")
        );
        assert_eq!(reopened.list_keys(&target).await.unwrap(), keys);
    }
}
