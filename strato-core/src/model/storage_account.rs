//! Storage account document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Coordinates, DeclaredResource};

string_enum! {
    /// Storage account kind. Gates which replication and access tier values are legal.
    AccountKind("account_kind") {
        Storage => "Storage",
        BlobStorage => "BlobStorage",
    }
}

string_enum! {
    AccountTier("account_tier") {
        Standard => "Standard",
        Premium => "Premium",
    }
}

string_enum! {
    ReplicationType("account_replication_type") {
        Lrs => "LRS",
        Zrs => "ZRS",
        Grs => "GRS",
        Ragrs => "RAGRS",
    }
}

string_enum! {
    /// Blob access tier, only meaningful for BlobStorage accounts.
    AccessTier("access_tier") {
        Hot => "Hot",
        Cool => "Cool",
    }
}

impl Default for AccountKind {
    fn default() -> Self {
        AccountKind::Storage
    }
}

impl Default for AccountTier {
    fn default() -> Self {
        AccountTier::Standard
    }
}

impl Default for ReplicationType {
    fn default() -> Self {
        ReplicationType::Lrs
    }
}

/// Custom domain bound to the blob endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomDomain {
    pub name: String,
    /// Indirect CNAME validation. Never returned by the remote API.
    #[serde(default)]
    pub use_subdomain: bool,
}

/// Read-only fields, populated from remote data on Read and never sent upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageAccountComputed {
    /// Combined `<tier>_<replication>` SKU name as reported remotely.
    pub account_type: String,
    pub primary_location: String,
    pub secondary_location: String,
    pub primary_blob_endpoint: String,
    pub secondary_blob_endpoint: String,
    pub primary_queue_endpoint: String,
    pub secondary_queue_endpoint: String,
    pub primary_table_endpoint: String,
    pub secondary_table_endpoint: String,
    // No secondary file endpoint is exposed remotely.
    pub primary_file_endpoint: String,
    pub primary_access_key: String,
    pub secondary_access_key: String,
    pub primary_blob_connection_string: String,
    pub secondary_blob_connection_string: String,
}

/// Desired and observed state of one storage account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    #[serde(default)]
    pub account_kind: AccountKind,
    pub account_tier: AccountTier,
    pub account_replication_type: ReplicationType,
    /// Unset means "whatever the remote side chose" (defaults to Hot on create).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_tier: Option<AccessTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<CustomDomain>,
    #[serde(default)]
    pub enable_blob_encryption: bool,
    #[serde(default)]
    pub enable_file_encryption: bool,
    #[serde(default)]
    pub enable_https_traffic_only: bool,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub computed: StorageAccountComputed,
}

impl StorageAccount {
    /// Combined SKU name sent to the remote API, e.g. `Standard_LRS`.
    pub fn sku_name(&self) -> String {
        format!("{}_{}", self.account_tier, self.account_replication_type)
    }

    /// Copy over fields the remote API never reports from the document this
    /// one was reflected to replace.
    pub fn retain_unreflected(&mut self, prior: &StorageAccount) {
        if let (Some(domain), Some(prior_domain)) = (&mut self.custom_domain, &prior.custom_domain) {
            if domain.name.eq_ignore_ascii_case(&prior_domain.name) {
                domain.use_subdomain = prior_domain.use_subdomain;
            }
        }
    }
}

impl DeclaredResource for StorageAccount {
    const KIND: &'static str = "storage account";
    const TYPE_KEY: &'static str = "storageAccounts";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    fn coordinates(&self) -> Coordinates {
        Coordinates::new(&self.resource_group_name, &self.name)
    }
}
