//! Upgrades for persisted storage account documents.
//!
//! Version 0 documents carry a single combined `account_type`
//! (e.g. `"standard_ragrs"`). Version 1 splits it into `account_tier` and
//! `account_replication_type` and keeps the combined SKU name as a computed
//! field.

use serde_json::{Map, Value};
use tracing::info;

use crate::error::ValidationError;
use crate::model::storage_account::{AccountTier, ReplicationType};

/// Combined types accepted in version 0 documents.
const LEGACY_ACCOUNT_TYPES: &[&str] = &[
    "standard_lrs",
    "standard_zrs",
    "standard_grs",
    "standard_ragrs",
    "premium_lrs",
];

/// Whether `doc` is a version 0 storage account document.
pub fn needs_migration(doc: &Value) -> bool {
    doc.get("account_type").is_some() && doc.get("account_tier").is_none()
}

/// Upgrade a storage account document to the current layout.
/// Current documents are returned unchanged.
pub fn migrate_storage_account(doc: Value) -> Result<Value, ValidationError> {
    if !needs_migration(&doc) {
        return match doc {
            Value::Object(_) => Ok(doc),
            _ => Err(not_an_object()),
        };
    }
    let Value::Object(mut fields) = doc else {
        return Err(not_an_object());
    };

    let legacy = match fields.remove("account_type") {
        Some(Value::String(s)) => s,
        other => {
            return Err(ValidationError::InvalidDocument(format!(
                "account_type must be a string, got {}",
                other.unwrap_or(Value::Null)
            )));
        }
    };
    let (tier, replication) = split_legacy(&legacy)?;
    let sku_name = format!("{}_{}", tier, replication);

    info!(account_type = %legacy, %sku_name, "Migrating storage account document from v0 to v1");

    fields.insert("account_tier".to_string(), Value::from(tier.as_str()));
    fields.insert(
        "account_replication_type".to_string(),
        Value::from(replication.as_str()),
    );

    let computed = fields
        .entry("computed")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(computed) = computed {
        computed.insert("account_type".to_string(), Value::from(sku_name));
    }

    Ok(Value::Object(fields))
}

fn not_an_object() -> ValidationError {
    ValidationError::InvalidDocument("storage account document must be a JSON object".to_string())
}

fn split_legacy(account_type: &str) -> Result<(AccountTier, ReplicationType), ValidationError> {
    let unknown = || ValidationError::UnknownValue {
        field: "account_type",
        value: account_type.to_string(),
    };

    let normalized = account_type.trim().to_ascii_lowercase();
    if !LEGACY_ACCOUNT_TYPES.contains(&normalized.as_str()) {
        return Err(unknown());
    }
    let (tier, replication) = normalized.split_once('_').ok_or_else(unknown)?;
    Ok((tier.parse()?, replication.parse()?))
}
