use super::ReflectError;
use crate::client::snapshots::{DiskEncryptionSettings, SnapshotResource};
use crate::model::normalize_location;
use crate::model::snapshot::{
    CreateOption, DiskEncryptionKey, EncryptionSettings, KeyEncryptionKey, Snapshot,
};
use crate::tags;

/// Map a remote snapshot onto a document.
pub fn reflect(remote: &SnapshotResource, resource_group: &str) -> Result<Snapshot, ReflectError> {
    let id = remote.id.clone().ok_or_else(|| ReflectError::missing("id"))?;
    let name = remote
        .name
        .clone()
        .ok_or_else(|| ReflectError::missing("name"))?;
    let location = remote
        .location
        .as_deref()
        .map(normalize_location)
        .ok_or_else(|| ReflectError::missing("location"))?;

    let mut doc = Snapshot {
        id: Some(id),
        name,
        resource_group_name: resource_group.to_string(),
        location,
        tags: tags::flatten(&remote.tags),
        ..Default::default()
    };

    let Some(props) = &remote.properties else {
        return Ok(doc);
    };

    if let Some(data) = &props.creation_data {
        doc.create_option = data
            .create_option
            .parse::<CreateOption>()
            .map_err(|e| ReflectError::new("creation_data.create_option", format!("{}", e)))?;
        doc.source_uri = data.source_uri.clone();
        doc.source_resource_id = data.source_resource_id.clone();
        doc.storage_account_id = data.storage_account_id.clone();
    }

    doc.disk_size_gb = match props.disk_size_gb {
        Some(size) => Some(u32::try_from(size).map_err(|_| {
            ReflectError::new("disk_size_gb", format!("{} is not a valid size", size))
        })?),
        None => None,
    };
    doc.encryption_settings = props.encryption_settings.as_ref().map(flatten_encryption);
    doc.time_created = props.time_created;

    Ok(doc)
}

fn flatten_encryption(settings: &DiskEncryptionSettings) -> EncryptionSettings {
    EncryptionSettings {
        enabled: settings.enabled.unwrap_or(false),
        disk_encryption_key: settings
            .disk_encryption_key
            .as_ref()
            .map(|key| DiskEncryptionKey {
                secret_url: key.secret_url.clone(),
                source_vault_id: key.source_vault.id.clone(),
            }),
        key_encryption_key: settings
            .key_encryption_key
            .as_ref()
            .map(|key| KeyEncryptionKey {
                key_url: key.key_url.clone(),
                source_vault_id: key.source_vault.id.clone(),
            }),
    }
}
