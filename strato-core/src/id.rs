//! Resource identifier parsing.
//!
//! Identifiers look like
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}`:
//! a sequence of key/value segment pairs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::Coordinates;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error("resource identifier is empty")]
    Empty,

    #[error("resource identifier {0:?} does not consist of key/value segment pairs")]
    OddSegments(String),

    #[error("resource identifier {id:?} has an empty value for {key:?}")]
    EmptyValue { id: String, key: String },

    #[error("resource identifier {0:?} does not name a subscription")]
    MissingSubscription(String),

    #[error("resource identifier {0:?} does not name a resource group")]
    MissingResourceGroup(String),

    #[error("resource identifier {id:?} does not address a {key} resource")]
    MissingSegment { id: String, key: String },
}

/// A parsed resource identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: Option<String>,
    /// Provider namespace, e.g. `Microsoft.Storage`.
    pub provider: Option<String>,
    /// Remaining type/name pairs, e.g. `storageAccounts -> acct01`.
    pub path: BTreeMap<String, String>,
}

impl ResourceId {
    /// Parse an identifier string.
    pub fn parse(id: &str) -> Result<Self, IdParseError> {
        let trimmed = id.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(IdParseError::Empty);
        }

        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.len() % 2 != 0 {
            return Err(IdParseError::OddSegments(id.to_string()));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut provider = None;
        let mut path = BTreeMap::new();

        for pair in segments.chunks(2) {
            let (key, value) = (pair[0], pair[1]);
            if value.is_empty() {
                return Err(IdParseError::EmptyValue {
                    id: id.to_string(),
                    key: key.to_string(),
                });
            }

            if key.eq_ignore_ascii_case("subscriptions") {
                subscription_id = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("resourceGroups") {
                resource_group = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("providers") {
                provider = Some(value.to_string());
            } else {
                path.insert(key.to_string(), value.to_string());
            }
        }

        let subscription_id =
            subscription_id.ok_or_else(|| IdParseError::MissingSubscription(id.to_string()))?;

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path,
        })
    }

    /// Build the canonical identifier string for a provider resource.
    pub fn build(
        subscription_id: &str,
        resource_group: &str,
        provider: &str,
        type_key: &str,
        name: &str,
    ) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            subscription_id, resource_group, provider, type_key, name
        )
    }

    /// Name under the given type key, matched case-insensitively.
    pub fn name_for(&self, type_key: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(type_key))
            .map(|(_, v)| v.as_str())
    }

    /// Coordinates of the resource of the given type addressed by this identifier.
    pub fn coordinates(&self, type_key: &str) -> Result<Coordinates, IdParseError> {
        let resource_group = self
            .resource_group
            .clone()
            .ok_or_else(|| IdParseError::MissingResourceGroup(self.to_string()))?;
        let name = self
            .name_for(type_key)
            .ok_or_else(|| IdParseError::MissingSegment {
                id: self.to_string(),
                key: type_key.to_string(),
            })?;
        Ok(Coordinates::new(resource_group, name))
    }
}

impl FromStr for ResourceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceId::parse(s)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription_id)?;
        if let Some(rg) = &self.resource_group {
            write!(f, "/resourceGroups/{}", rg)?;
        }
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (key, value) in &self.path {
            write!(f, "/{}/{}", key, value)?;
        }
        Ok(())
    }
}
