//! Field-level change tracking between a prior and a desired document.
//!
//! Storage account updates are split into independent groups, each applied
//! by exactly one remote call. Groups are always produced in the same order.

use std::fmt;

use crate::model::normalize_location;
use crate::model::snapshot::Snapshot;
use crate::model::storage_account::StorageAccount;

/// An independently updatable subset of a storage account's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateGroup {
    Replication,
    AccessTier,
    Tags,
    /// Which encryption services changed. At least one is set.
    Encryption { blob: bool, file: bool },
    CustomDomain,
    HttpsTrafficOnly,
}

impl UpdateGroup {
    pub fn label(&self) -> &'static str {
        match self {
            UpdateGroup::Replication => "account_replication_type",
            UpdateGroup::AccessTier => "access_tier",
            UpdateGroup::Tags => "tags",
            UpdateGroup::Encryption {
                blob: true,
                file: false,
            } => "enable_blob_encryption",
            UpdateGroup::Encryption {
                blob: false,
                file: true,
            } => "enable_file_encryption",
            UpdateGroup::Encryption { .. } => "encryption",
            UpdateGroup::CustomDomain => "custom_domain",
            UpdateGroup::HttpsTrafficOnly => "enable_https_traffic_only",
        }
    }

    /// Document fields this group writes.
    pub fn fields(&self) -> Vec<&'static str> {
        match *self {
            UpdateGroup::Encryption { blob, file } => {
                let mut fields = Vec::new();
                if blob {
                    fields.push("enable_blob_encryption");
                }
                if file {
                    fields.push("enable_file_encryption");
                }
                fields
            }
            other => vec![other.label()],
        }
    }

    /// Mark this group's fields as durably applied by copying them into `state`.
    pub fn persist(&self, desired: &StorageAccount, state: &mut StorageAccount) {
        match *self {
            UpdateGroup::Replication => {
                state.account_replication_type = desired.account_replication_type;
            }
            UpdateGroup::AccessTier => state.access_tier = desired.access_tier,
            UpdateGroup::Tags => state.tags = desired.tags.clone(),
            UpdateGroup::Encryption { blob, file } => {
                if blob {
                    state.enable_blob_encryption = desired.enable_blob_encryption;
                }
                if file {
                    state.enable_file_encryption = desired.enable_file_encryption;
                }
            }
            UpdateGroup::CustomDomain => state.custom_domain = desired.custom_domain.clone(),
            UpdateGroup::HttpsTrafficOnly => {
                state.enable_https_traffic_only = desired.enable_https_traffic_only;
            }
        }
    }
}

impl fmt::Display for UpdateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered set of changed update groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldChangeSet {
    groups: Vec<UpdateGroup>,
}

impl FieldChangeSet {
    pub fn between(prior: &StorageAccount, desired: &StorageAccount) -> Self {
        let mut groups = Vec::new();

        if prior.account_replication_type != desired.account_replication_type {
            groups.push(UpdateGroup::Replication);
        }
        // An unset access tier means "keep whatever the remote side has".
        if desired.access_tier.is_some() && desired.access_tier != prior.access_tier {
            groups.push(UpdateGroup::AccessTier);
        }
        if prior.tags != desired.tags {
            groups.push(UpdateGroup::Tags);
        }
        let blob = prior.enable_blob_encryption != desired.enable_blob_encryption;
        let file = prior.enable_file_encryption != desired.enable_file_encryption;
        if blob || file {
            groups.push(UpdateGroup::Encryption { blob, file });
        }
        if prior.custom_domain != desired.custom_domain {
            groups.push(UpdateGroup::CustomDomain);
        }
        if prior.enable_https_traffic_only != desired.enable_https_traffic_only {
            groups.push(UpdateGroup::HttpsTrafficOnly);
        }

        Self { groups }
    }

    pub fn groups(&self) -> &[UpdateGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn contains(&self, group: &UpdateGroup) -> bool {
        self.groups.contains(group)
    }
}

fn same_location(a: &str, b: &str) -> bool {
    normalize_location(a) == normalize_location(b)
}

/// Creation-time fields of a storage account that differ.
pub fn storage_account_replacements(
    prior: &StorageAccount,
    desired: &StorageAccount,
) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if prior.name != desired.name {
        fields.push("name");
    }
    if !prior
        .resource_group_name
        .eq_ignore_ascii_case(&desired.resource_group_name)
    {
        fields.push("resource_group_name");
    }
    if !same_location(&prior.location, &desired.location) {
        fields.push("location");
    }
    if prior.account_kind != desired.account_kind {
        fields.push("account_kind");
    }
    if prior.account_tier != desired.account_tier {
        fields.push("account_tier");
    }
    fields
}

/// Creation-time fields of a snapshot that differ.
pub fn snapshot_replacements(prior: &Snapshot, desired: &Snapshot) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if prior.name != desired.name {
        fields.push("name");
    }
    if !prior
        .resource_group_name
        .eq_ignore_ascii_case(&desired.resource_group_name)
    {
        fields.push("resource_group_name");
    }
    if !same_location(&prior.location, &desired.location) {
        fields.push("location");
    }
    // Reported back remotely even when undeclared, so only a declared value counts.
    if desired.source_uri.is_some() && prior.source_uri != desired.source_uri {
        fields.push("source_uri");
    }
    if prior.source_resource_id != desired.source_resource_id {
        fields.push("source_resource_id");
    }
    if prior.storage_account_id != desired.storage_account_id {
        fields.push("storage_account_id");
    }
    fields
}

/// Mutable snapshot fields that differ.
pub fn snapshot_changed_fields(prior: &Snapshot, desired: &Snapshot) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if prior.create_option != desired.create_option {
        fields.push("create_option");
    }
    if desired.disk_size_gb.is_some() && prior.disk_size_gb != desired.disk_size_gb {
        fields.push("disk_size_gb");
    }
    if prior.encryption_settings != desired.encryption_settings {
        fields.push("encryption_settings");
    }
    if prior.tags != desired.tags {
        fields.push("tags");
    }
    fields
}
