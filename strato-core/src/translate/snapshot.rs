use crate::client::snapshots::{
    CreationData, DiskEncryptionSettings, KeyVaultAndKeyReference, KeyVaultAndSecretReference,
    SnapshotProperties, SnapshotResource, SourceVault,
};
use crate::error::ValidationError;
use crate::model::normalize_location;
use crate::model::snapshot::{CreateOption, EncryptionSettings, Snapshot};
use crate::{tags, validation};

/// Builds snapshot create-or-update requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotTranslator;

impl SnapshotTranslator {
    pub fn validate(&self, doc: &Snapshot) -> Result<(), ValidationError> {
        validation::snapshot_name(&doc.name)?;
        validation::required("resource_group_name", &doc.resource_group_name)?;
        validation::required("location", &doc.location)?;
        tags::validate(&doc.tags)?;

        let (field, value) = match doc.create_option {
            CreateOption::Copy => ("source_resource_id", &doc.source_resource_id),
            CreateOption::Import => ("source_uri", &doc.source_uri),
        };
        if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
            return Err(ValidationError::MissingCreationSource {
                option: doc.create_option,
                field,
            });
        }

        if let Some(settings) = &doc.encryption_settings {
            if let Some(key) = &settings.disk_encryption_key {
                validation::required("disk_encryption_key.secret_url", &key.secret_url)?;
                validation::required("disk_encryption_key.source_vault_id", &key.source_vault_id)?;
            }
            if let Some(key) = &settings.key_encryption_key {
                validation::required("key_encryption_key.key_url", &key.key_url)?;
                validation::required("key_encryption_key.source_vault_id", &key.source_vault_id)?;
            }
        }

        Ok(())
    }

    /// Body for the merged create-or-update call.
    pub fn translate_for_create(&self, doc: &Snapshot) -> Result<SnapshotResource, ValidationError> {
        self.validate(doc)?;

        Ok(SnapshotResource {
            location: Some(normalize_location(&doc.location)),
            tags: tags::expand(&doc.tags),
            properties: Some(SnapshotProperties {
                creation_data: Some(CreationData {
                    create_option: doc.create_option.to_string(),
                    source_uri: doc.source_uri.clone(),
                    source_resource_id: doc.source_resource_id.clone(),
                    storage_account_id: doc.storage_account_id.clone(),
                }),
                disk_size_gb: doc
                    .disk_size_gb
                    .filter(|size| *size > 0)
                    .and_then(|size| i32::try_from(size).ok()),
                encryption_settings: doc.encryption_settings.as_ref().map(expand_encryption),
                ..Default::default()
            }),
            ..Default::default()
        })
    }
}

fn expand_encryption(settings: &EncryptionSettings) -> DiskEncryptionSettings {
    DiskEncryptionSettings {
        enabled: Some(settings.enabled),
        disk_encryption_key: settings.disk_encryption_key.as_ref().map(|key| {
            KeyVaultAndSecretReference {
                secret_url: key.secret_url.clone(),
                source_vault: SourceVault {
                    id: key.source_vault_id.clone(),
                },
            }
        }),
        key_encryption_key: settings.key_encryption_key.as_ref().map(|key| {
            KeyVaultAndKeyReference {
                key_url: key.key_url.clone(),
                source_vault: SourceVault {
                    id: key.source_vault_id.clone(),
                },
            }
        }),
    }
}
