//! Tag codec: declarative tag maps to and from the remote wire form.
//!
//! The wire form allows null values; the declarative form does not.

use std::collections::BTreeMap;

use crate::error::ValidationError;

/// Remote wire representation of tags.
pub type WireTags = BTreeMap<String, Option<String>>;

pub const MAX_TAGS: usize = 15;
pub const MAX_KEY_LEN: usize = 512;
pub const MAX_VALUE_LEN: usize = 256;

/// Check the limits the remote API enforces on tags.
pub fn validate(tags: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    if tags.len() > MAX_TAGS {
        return Err(ValidationError::TooManyTags(tags.len()));
    }

    for (key, value) in tags {
        if key.chars().count() > MAX_KEY_LEN {
            return Err(ValidationError::TagKeyTooLong(key.clone()));
        }
        if value.chars().count() > MAX_VALUE_LEN {
            return Err(ValidationError::TagValueTooLong(key.clone()));
        }
    }

    Ok(())
}

/// Declarative tags to wire tags.
pub fn expand(tags: &BTreeMap<String, String>) -> WireTags {
    tags.iter()
        .map(|(k, v)| (k.clone(), Some(v.clone())))
        .collect()
}

/// Wire tags to declarative tags. Null values become empty strings.
pub fn flatten(tags: &WireTags) -> BTreeMap<String, String> {
    tags.iter()
        .map(|(k, v)| (k.clone(), v.clone().unwrap_or_default()))
        .collect()
}
