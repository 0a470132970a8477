use crate::changes::{FieldChangeSet, UpdateGroup};
use crate::client::storage::{
    AccountCreateParameters, AccountPropertiesCreate, AccountPropertiesUpdate,
    AccountUpdateParameters, CustomDomainSetting, Encryption, EncryptionService,
    EncryptionServices, Sku,
};
use crate::config::EngineConfig;
use crate::error::ValidationError;
use crate::model::normalize_location;
use crate::model::storage_account::{
    AccessTier, AccountKind, AccountTier, CustomDomain, ReplicationType, StorageAccount,
};
use crate::{tags, validation};

/// Builds storage account requests.
///
/// The encryption key source is injected here and never exposed on the document.
#[derive(Debug, Clone)]
pub struct StorageAccountTranslator {
    key_source: String,
    default_access_tier: AccessTier,
}

impl StorageAccountTranslator {
    pub fn new(key_source: impl Into<String>, default_access_tier: AccessTier) -> Self {
        Self {
            key_source: key_source.into(),
            default_access_tier,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.encryption_key_source, config.default_access_tier)
    }

    /// Cross-field checks. Run before any request is built.
    pub fn validate(&self, doc: &StorageAccount) -> Result<(), ValidationError> {
        validation::storage_account_name(&doc.name)?;
        validation::required("resource_group_name", &doc.resource_group_name)?;
        validation::required("location", &doc.location)?;
        tags::validate(&doc.tags)?;

        if doc.account_tier == AccountTier::Premium
            && doc.account_replication_type != ReplicationType::Lrs
        {
            return Err(ValidationError::UnsupportedSku(doc.sku_name()));
        }

        if doc.account_kind == AccountKind::BlobStorage {
            if doc.account_replication_type == ReplicationType::Zrs {
                return Err(ValidationError::UnsupportedReplication(
                    doc.account_replication_type,
                ));
            }
        } else if doc.access_tier.is_some() {
            return Err(ValidationError::AccessTierNotSupported);
        }

        Ok(())
    }

    pub fn translate_for_create(
        &self,
        doc: &StorageAccount,
    ) -> Result<AccountCreateParameters, ValidationError> {
        self.validate(doc)?;

        let mut services = EncryptionServices {
            blob: Some(enabled(doc.enable_blob_encryption)),
            file: None,
        };
        if doc.enable_file_encryption {
            services.file = Some(enabled(true));
        }

        // Access tier is only valid for BlobStorage accounts.
        let access_tier = (doc.account_kind == AccountKind::BlobStorage).then(|| {
            doc.access_tier
                .unwrap_or(self.default_access_tier)
                .to_string()
        });

        Ok(AccountCreateParameters {
            location: normalize_location(&doc.location),
            sku: Sku {
                name: doc.sku_name(),
                tier: None,
            },
            kind: doc.account_kind.to_string(),
            tags: tags::expand(&doc.tags),
            properties: AccountPropertiesCreate {
                encryption: Some(Encryption {
                    services: Some(services),
                    key_source: self.key_source.clone(),
                }),
                custom_domain: doc.custom_domain.as_ref().map(domain_setting),
                access_tier,
                enable_https_traffic_only: Some(doc.enable_https_traffic_only),
            },
        })
    }

    /// One request per changed group, in the change set's order.
    pub fn translate_for_update(
        &self,
        doc: &StorageAccount,
        changes: &FieldChangeSet,
    ) -> Result<Vec<(UpdateGroup, AccountUpdateParameters)>, ValidationError> {
        self.validate(doc)?;

        Ok(changes
            .groups()
            .iter()
            .map(|group| (*group, self.update_request(doc, *group)))
            .collect())
    }

    fn update_request(&self, doc: &StorageAccount, group: UpdateGroup) -> AccountUpdateParameters {
        let properties = |props: AccountPropertiesUpdate| AccountUpdateParameters {
            properties: Some(props),
            ..Default::default()
        };

        match group {
            UpdateGroup::Replication => AccountUpdateParameters {
                sku: Some(Sku {
                    name: doc.sku_name(),
                    tier: None,
                }),
                ..Default::default()
            },
            UpdateGroup::AccessTier => properties(AccountPropertiesUpdate {
                access_tier: doc.access_tier.map(|t| t.to_string()),
                ..Default::default()
            }),
            UpdateGroup::Tags => AccountUpdateParameters {
                tags: Some(tags::expand(&doc.tags)),
                ..Default::default()
            },
            UpdateGroup::Encryption { blob, file } => properties(AccountPropertiesUpdate {
                encryption: Some(Encryption {
                    services: Some(EncryptionServices {
                        blob: blob.then(|| enabled(doc.enable_blob_encryption)),
                        file: file.then(|| enabled(doc.enable_file_encryption)),
                    }),
                    key_source: self.key_source.clone(),
                }),
                ..Default::default()
            }),
            UpdateGroup::CustomDomain => properties(AccountPropertiesUpdate {
                // An empty name detaches the current domain.
                custom_domain: Some(
                    doc.custom_domain
                        .as_ref()
                        .map(domain_setting)
                        .unwrap_or_default(),
                ),
                ..Default::default()
            }),
            UpdateGroup::HttpsTrafficOnly => properties(AccountPropertiesUpdate {
                enable_https_traffic_only: Some(doc.enable_https_traffic_only),
                ..Default::default()
            }),
        }
    }
}

fn enabled(value: bool) -> EncryptionService {
    EncryptionService {
        enabled: Some(value),
    }
}

fn domain_setting(domain: &CustomDomain) -> CustomDomainSetting {
    CustomDomainSetting {
        name: domain.name.clone(),
        use_sub_domain: Some(domain.use_subdomain),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ENCRYPTION_KEY_SOURCE;

    fn translator() -> StorageAccountTranslator {
        StorageAccountTranslator::from_config(&EngineConfig::default())
    }

    fn account() -> StorageAccount {
        StorageAccount {
            name: "acct01".to_string(),
            resource_group_name: "rg".to_string(),
            location: "West Europe".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_injects_key_source() {
        let params = translator().translate_for_create(&account()).unwrap();
        let encryption = params.properties.encryption.unwrap();
        assert_eq!(encryption.key_source, DEFAULT_ENCRYPTION_KEY_SOURCE);

        let services = encryption.services.unwrap();
        assert_eq!(services.blob, Some(enabled(false)));
        assert_eq!(services.file, None);

        assert_eq!(params.location, "westeurope");
        assert_eq!(params.sku.name, "Standard_LRS");
        assert_eq!(params.kind, "Storage");
        assert_eq!(params.properties.access_tier, None);
    }

    #[test]
    fn test_custom_key_source() {
        let translator = StorageAccountTranslator::new("Microsoft.Keyvault", AccessTier::Hot);
        let params = translator.translate_for_create(&account()).unwrap();
        assert_eq!(params.properties.encryption.unwrap().key_source, "Microsoft.Keyvault");
    }

    #[test]
    fn test_blob_storage_rejects_zrs() {
        let doc = StorageAccount {
            account_kind: AccountKind::BlobStorage,
            account_replication_type: ReplicationType::Zrs,
            ..account()
        };
        assert_eq!(
            translator().translate_for_create(&doc).unwrap_err(),
            ValidationError::UnsupportedReplication(ReplicationType::Zrs)
        );
    }

    #[test]
    fn test_blob_storage_defaults_access_tier() {
        let doc = StorageAccount {
            account_kind: AccountKind::BlobStorage,
            ..account()
        };
        let params = translator().translate_for_create(&doc).unwrap();
        assert_eq!(params.properties.access_tier.as_deref(), Some("Hot"));

        let cool = StorageAccount {
            access_tier: Some(AccessTier::Cool),
            ..doc
        };
        let params = translator().translate_for_create(&cool).unwrap();
        assert_eq!(params.properties.access_tier.as_deref(), Some("Cool"));
    }

    #[test]
    fn test_access_tier_requires_blob_storage() {
        let doc = StorageAccount {
            access_tier: Some(AccessTier::Cool),
            ..account()
        };
        assert_eq!(
            translator().validate(&doc).unwrap_err(),
            ValidationError::AccessTierNotSupported
        );
    }

    #[test]
    fn test_premium_only_locally_redundant() {
        let doc = StorageAccount {
            account_tier: AccountTier::Premium,
            account_replication_type: ReplicationType::Grs,
            ..account()
        };
        assert_eq!(
            translator().validate(&doc).unwrap_err(),
            ValidationError::UnsupportedSku("Premium_GRS".to_string())
        );
    }

    #[test]
    fn test_invalid_name() {
        let doc = StorageAccount {
            name: "ab".to_string(),
            ..account()
        };
        assert!(matches!(
            translator().validate(&doc),
            Err(ValidationError::StorageAccountName(_))
        ));
    }

    #[test]
    fn test_update_one_request_per_group() {
        let prior = account();
        let desired = StorageAccount {
            account_replication_type: ReplicationType::Grs,
            enable_blob_encryption: true,
            tags: [("env".to_string(), "prod".to_string())].into(),
            ..account()
        };
        let changes = FieldChangeSet::between(&prior, &desired);
        let requests = translator().translate_for_update(&desired, &changes).unwrap();

        let groups: Vec<_> = requests.iter().map(|(g, _)| *g).collect();
        assert_eq!(
            groups,
            vec![
                UpdateGroup::Replication,
                UpdateGroup::Tags,
                UpdateGroup::Encryption {
                    blob: true,
                    file: false
                },
            ]
        );

        assert_eq!(requests[0].1.sku.as_ref().unwrap().name, "Standard_GRS");
        assert!(requests[0].1.tags.is_none());

        let encryption = requests[2]
            .1
            .properties
            .as_ref()
            .unwrap()
            .encryption
            .as_ref()
            .unwrap();
        assert_eq!(encryption.key_source, DEFAULT_ENCRYPTION_KEY_SOURCE);
        let services = encryption.services.as_ref().unwrap();
        assert_eq!(services.blob, Some(enabled(true)));
        assert!(services.file.is_none());
    }

    #[test]
    fn test_removed_custom_domain_sends_empty_name() {
        let prior = StorageAccount {
            custom_domain: Some(CustomDomain {
                name: "assets.example.com".to_string(),
                use_subdomain: false,
            }),
            ..account()
        };
        let desired = account();
        let changes = FieldChangeSet::between(&prior, &desired);
        let requests = translator().translate_for_update(&desired, &changes).unwrap();

        assert_eq!(requests.len(), 1);
        let domain = requests[0]
            .1
            .properties
            .as_ref()
            .unwrap()
            .custom_domain
            .as_ref()
            .unwrap();
        assert_eq!(domain.name, "");
    }
}
