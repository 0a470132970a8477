//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::storage_account::AccessTier;

/// Key source the storage API requires for encryption services to take effect.
pub const DEFAULT_ENCRYPTION_KEY_SOURCE: &str = "Microsoft.Storage";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config {path}: {detail}")]
    Invalid { path: String, detail: String },
}

/// Polling parameters for a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Absolute deadline for the whole wait.
    pub timeout_secs: u64,
    /// Interval between two reads of the provisioning state.
    pub interval_secs: u64,
    /// Consecutive not-found reads tolerated before giving up.
    pub not_found_checks: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30 * 60,
            interval_secs: 15,
            not_found_checks: 20,
        }
    }
}

impl PollConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Configuration shared by all reconcilers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Injected into every encryption block sent for storage accounts.
    pub encryption_key_source: String,
    /// Access tier used for BlobStorage accounts that do not declare one.
    pub default_access_tier: AccessTier,
    /// Wait applied after create.
    pub create_poll: PollConfig,
    /// Subscription used by the in-memory control plane when minting identifiers.
    pub subscription_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            encryption_key_source: DEFAULT_ENCRYPTION_KEY_SOURCE.to_string(),
            default_access_tier: AccessTier::Hot,
            create_poll: PollConfig::default(),
            subscription_id: "00000000-0000-0000-0000-000000000000".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a JSON config file. Missing keys fall back to defaults.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let config = Self::from_json(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate().map_err(|detail| ConfigError::Invalid {
            path: path.display().to_string(),
            detail,
        })?;
        Ok(config)
    }

    /// Reject settings the poller cannot honor.
    pub fn validate(&self) -> Result<(), String> {
        if self.create_poll.interval_secs == 0 {
            return Err("create_poll.interval_secs must be at least 1".to_string());
        }
        if self.create_poll.timeout_secs == 0 {
            return Err("create_poll.timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.encryption_key_source, "Microsoft.Storage");
        assert_eq!(config.default_access_tier, AccessTier::Hot);
        assert_eq!(config.create_poll.timeout(), Duration::from_secs(1800));
        assert_eq!(config.create_poll.interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json(r#"{"create_poll": {"interval_secs": 5}, "default_access_tier": "cool"}"#)
                .unwrap();
        assert_eq!(config.create_poll.interval_secs, 5);
        assert_eq!(config.create_poll.timeout_secs, 1800);
        assert_eq!(config.default_access_tier, AccessTier::Cool);
        assert_eq!(config.encryption_key_source, DEFAULT_ENCRYPTION_KEY_SOURCE);
    }

    #[tokio::test]
    async fn test_load_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strato.json");
        tokio::fs::write(&path, r#"{"create_poll": {"interval_secs": 0}}"#)
            .await
            .unwrap();

        let err = EngineConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref detail, .. } if detail.contains("interval_secs")));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = EngineConfig::load("/nonexistent/strato.json").await.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
