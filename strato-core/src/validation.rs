//! Name validators applied before any reconciliation runs.

use crate::error::ValidationError;

/// Storage account names: 3-24 lowercase letters and digits.
pub fn storage_account_name(name: &str) -> Result<(), ValidationError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !valid_chars || !(3..=24).contains(&name.len()) {
        return Err(ValidationError::StorageAccountName(name.to_string()));
    }
    Ok(())
}

/// Snapshot names: letters, digits and underscores, up to 80 characters.
pub fn snapshot_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::SnapshotNameCharacters(name.to_string()));
    }
    if name.len() > 80 {
        return Err(ValidationError::SnapshotNameLength(name.len()));
    }
    Ok(())
}

/// A creation-time coordinate that must be present.
pub fn required(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_account_name() {
        assert!(storage_account_name("abc123").is_ok());
        assert!(storage_account_name("abc").is_ok());
        assert!(storage_account_name(&"a".repeat(24)).is_ok());

        assert!(storage_account_name("ab").is_err());
        assert!(storage_account_name(&"a".repeat(25)).is_err());
        assert!(storage_account_name("Abc123").is_err());
        assert!(storage_account_name("abc-123").is_err());
        assert!(storage_account_name("abc_123").is_err());
    }

    #[test]
    fn test_snapshot_name() {
        assert!(snapshot_name("nightly_Snapshot_01").is_ok());
        assert!(snapshot_name(&"s".repeat(80)).is_ok());

        assert_eq!(
            snapshot_name(&"s".repeat(81)),
            Err(ValidationError::SnapshotNameLength(81))
        );
        assert!(matches!(
            snapshot_name("nightly-snapshot"),
            Err(ValidationError::SnapshotNameCharacters(_))
        ));
        assert!(snapshot_name("").is_err());
    }

    #[test]
    fn test_required() {
        assert!(required("location", "westeurope").is_ok());
        assert_eq!(
            required("location", "  "),
            Err(ValidationError::Required("location"))
        );
    }
}
