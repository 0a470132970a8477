//! Audit logging for resource lifecycle events.
//!
//! Events are emitted on the `audit` tracing target with the affected
//! resource identifiers attached, so a subscriber can route them separately
//! from diagnostic logs.

use std::sync::Arc;

/// Audit severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditLevel {
    Audit,
    Warn,
    Error,
}

/// Audit logger with lifecycle-specific methods.
pub struct AuditLogger {
    component: String,
    enabled: bool,
}

impl AuditLogger {
    /// Create a new audit logger for a component
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            enabled: true,
        }
    }

    /// Create a noop audit logger (for testing)
    pub fn new_noop() -> Self {
        Self {
            component: String::new(),
            enabled: false,
        }
    }

    pub fn log(&self, level: AuditLevel, message: impl AsRef<str>, object_ids: &[&str]) {
        if !self.enabled {
            return;
        }
        let message = message.as_ref();
        match level {
            AuditLevel::Audit => {
                tracing::info!(target: "audit", component = %self.component, objects = ?object_ids, "{}", message)
            }
            AuditLevel::Warn => {
                tracing::warn!(target: "audit", component = %self.component, objects = ?object_ids, "{}", message)
            }
            AuditLevel::Error => {
                tracing::error!(target: "audit", component = %self.component, objects = ?object_ids, "{}", message)
            }
        }
    }

    // === Create ===

    pub fn created(&self, kind: &str, name: &str, id: &str) {
        self.log(
            AuditLevel::Audit,
            format!("{} '{}' created", kind, name),
            &[id],
        );
    }

    pub fn identity_recorded(&self, kind: &str, name: &str, id: &str) {
        self.log(
            AuditLevel::Audit,
            format!("{} '{}' assigned identifier", kind, name),
            &[id],
        );
    }

    pub fn create_failed(&self, kind: &str, name: &str, recovered_id: Option<&str>, error: &str) {
        match recovered_id {
            Some(id) => self.log(
                AuditLevel::Error,
                format!(
                    "Create of {} '{}' failed after allocating a remote resource: {}",
                    kind, name, error
                ),
                &[id],
            ),
            None => self.log(
                AuditLevel::Error,
                format!("Create of {} '{}' failed: {}", kind, name, error),
                &[],
            ),
        }
    }

    pub fn identity_lost(&self, kind: &str, name: &str, resource_group: &str) {
        self.log(
            AuditLevel::Error,
            format!(
                "{} '{}' in resource group '{}' created but not discoverable",
                kind, name, resource_group
            ),
            &[],
        );
    }

    // === Update ===

    pub fn group_applied(&self, kind: &str, name: &str, id: &str, group: &str) {
        self.log(
            AuditLevel::Audit,
            format!("{} '{}' updated {}", kind, name, group),
            &[id],
        );
    }

    pub fn updated(&self, kind: &str, name: &str, id: &str) {
        self.log(
            AuditLevel::Audit,
            format!("{} '{}' updated", kind, name),
            &[id],
        );
    }

    // === Read / Delete ===

    pub fn drift_detected(&self, kind: &str, name: &str, id: &str) {
        self.log(
            AuditLevel::Warn,
            format!("{} '{}' no longer exists remotely, removing from state", kind, name),
            &[id],
        );
    }

    pub fn deleted(&self, kind: &str, name: &str, id: &str) {
        self.log(
            AuditLevel::Audit,
            format!("{} '{}' deleted", kind, name),
            &[id],
        );
    }
}

/// Create a shared audit logger
pub fn create_audit_logger(component: &str) -> Arc<AuditLogger> {
    Arc::new(AuditLogger::new(component))
}
