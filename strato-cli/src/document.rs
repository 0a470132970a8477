//! Declarative documents on disk.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use strato_core::migrate;
use tracing::debug;

use crate::Kind;

pub async fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load a persisted document, upgrading legacy layouts. `None` when the
/// file does not exist yet.
pub async fn load_state<T: DeserializeOwned>(path: &Path, kind: Kind) -> Result<Option<T>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No persisted state");
            return Ok(None);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let mut value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if kind == Kind::StorageAccount && migrate::needs_migration(&value) {
        value = migrate::migrate_storage_account(value)
            .with_context(|| format!("failed to upgrade {}", path.display()))?;
    }

    serde_json::from_value(value)
        .map(Some)
        .with_context(|| format!("invalid document in {}", path.display()))
}

pub async fn save<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(doc).context("failed to encode document")?;
    json.push('\n');
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), "Saved document");
    Ok(())
}
