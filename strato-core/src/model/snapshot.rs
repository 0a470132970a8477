//! Disk snapshot document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Coordinates, DeclaredResource};

string_enum! {
    /// How the snapshot's data is sourced.
    CreateOption("create_option") {
        Copy => "Copy",
        Import => "Import",
    }
}

impl Default for CreateOption {
    fn default() -> Self {
        CreateOption::Copy
    }
}

/// Key Vault secret holding the disk encryption key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskEncryptionKey {
    pub secret_url: String,
    pub source_vault_id: String,
}

/// Key Vault key wrapping the disk encryption key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEncryptionKey {
    pub key_url: String,
    pub source_vault_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_encryption_key: Option<DiskEncryptionKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_encryption_key: Option<KeyEncryptionKey>,
}

/// Desired and observed state of one disk snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    pub create_option: CreateOption,
    /// Blob URI to import from. Reported back remotely even when not declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
    /// Managed disk or snapshot to copy from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_resource_id: Option<String>,
    /// Storage account holding `source_uri`, when importing across accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_account_id: Option<String>,
    /// Unset means "inherit the source size".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_settings: Option<EncryptionSettings>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Computed: when the remote side took the snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_created: Option<DateTime<Utc>>,
}

impl DeclaredResource for Snapshot {
    const KIND: &'static str = "snapshot";
    const TYPE_KEY: &'static str = "snapshots";

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
