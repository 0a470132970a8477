use super::{ReflectError, connection_string};
use crate::client::storage::{Account, AccountKey, EncryptionService, Endpoints};
use crate::model::normalize_location;
use crate::model::storage_account::{
    AccessTier, AccountKind, AccountTier, CustomDomain, ReplicationType, StorageAccount,
    StorageAccountComputed,
};
use crate::tags;

/// Split a `<tier>_<replication>` SKU name on its single delimiter.
pub fn split_sku_name(name: &str) -> Result<(AccountTier, ReplicationType), ReflectError> {
    let mut parts = name.split('_');
    let (Some(tier), Some(replication), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ReflectError::new(
            "sku.name",
            format!("{:?} is not of the form <tier>_<replication>", name),
        ));
    };
    let tier = tier
        .parse()
        .map_err(|e| ReflectError::new("sku.name", format!("{}", e)))?;
    let replication = replication
        .parse()
        .map_err(|e| ReflectError::new("sku.name", format!("{}", e)))?;
    Ok((tier, replication))
}

/// Map a remote account plus its keys onto a document.
///
/// Every computed field is written, so values that disappeared remotely
/// (secondary endpoints after a replication change) are reset to empty.
pub fn reflect(
    account: &Account,
    resource_group: &str,
    keys: &[AccountKey],
) -> Result<StorageAccount, ReflectError> {
    let id = account.id.clone().ok_or_else(|| ReflectError::missing("id"))?;
    let name = account
        .name
        .clone()
        .ok_or_else(|| ReflectError::missing("name"))?;
    let location = account
        .location
        .as_deref()
        .map(normalize_location)
        .ok_or_else(|| ReflectError::missing("location"))?;
    let sku = account
        .sku
        .as_ref()
        .ok_or_else(|| ReflectError::missing("sku"))?;
    let (account_tier, account_replication_type) = split_sku_name(&sku.name)?;
    let account_kind: AccountKind = match account.kind.as_deref() {
        Some(kind) => kind
            .parse()
            .map_err(|e| ReflectError::new("kind", format!("{}", e)))?,
        None => AccountKind::default(),
    };

    let primary_key = keys.first().map(|k| k.value.as_str());
    let secondary_key = keys.get(1).map(|k| k.value.as_str());

    let mut doc = StorageAccount {
        id: Some(id),
        name,
        resource_group_name: resource_group.to_string(),
        location,
        account_kind,
        account_tier,
        account_replication_type,
        tags: tags::flatten(&account.tags),
        computed: StorageAccountComputed {
            account_type: sku.name.clone(),
            primary_access_key: primary_key.unwrap_or_default().to_string(),
            secondary_access_key: secondary_key.unwrap_or_default().to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    let Some(props) = &account.properties else {
        return Ok(doc);
    };

    doc.access_tier = match props.access_tier.as_deref() {
        Some(tier) => Some(
            tier.parse::<AccessTier>()
                .map_err(|e| ReflectError::new("access_tier", format!("{}", e)))?,
        ),
        None => None,
    };
    doc.enable_https_traffic_only = props.enable_https_traffic_only.unwrap_or(false);
    doc.custom_domain = props
        .custom_domain
        .as_ref()
        .filter(|d| !d.name.is_empty())
        .map(|d| CustomDomain {
            name: d.name.clone(),
            use_subdomain: false,
        });

    if let Some(services) = props.encryption.as_ref().and_then(|e| e.services.as_ref()) {
        let enabled = |s: &Option<EncryptionService>| {
            s.as_ref().and_then(|s| s.enabled).unwrap_or(false)
        };
        doc.enable_blob_encryption = enabled(&services.blob);
        doc.enable_file_encryption = enabled(&services.file);
    }

    let computed = &mut doc.computed;
    computed.primary_location = props.primary_location.clone().unwrap_or_default();
    computed.secondary_location = props.secondary_location.clone().unwrap_or_default();

    let primary = props.primary_endpoints.clone().unwrap_or_default();
    computed.primary_blob_endpoint = primary.blob.clone().unwrap_or_default();
    computed.primary_queue_endpoint = primary.queue.clone().unwrap_or_default();
    computed.primary_table_endpoint = primary.table.clone().unwrap_or_default();
    computed.primary_file_endpoint = primary.file.clone().unwrap_or_default();
    computed.primary_blob_connection_string =
        blob_connection_string(&primary, &doc.name, primary_key);

    let secondary = props.secondary_endpoints.clone().unwrap_or_default();
    computed.secondary_blob_endpoint = secondary.blob.clone().unwrap_or_default();
    computed.secondary_queue_endpoint = secondary.queue.clone().unwrap_or_default();
    computed.secondary_table_endpoint = secondary.table.clone().unwrap_or_default();
    computed.secondary_blob_connection_string =
        blob_connection_string(&secondary, &doc.name, secondary_key);

    Ok(doc)
}

/// Empty unless both the blob endpoint and the key exist.
fn blob_connection_string(endpoints: &Endpoints, name: &str, key: Option<&str>) -> String {
    match (endpoints.blob.as_deref(), key) {
        (Some(endpoint), Some(key)) => connection_string(endpoint, name, key),
        _ => String::new(),
    }
}
