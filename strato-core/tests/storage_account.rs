//! Storage account reconciler against a scripted remote.

mod common;

use common::*;
use strato_core::model::storage_account::{
    AccessTier, AccountKind, AccountTier, ReplicationType,
};
use strato_core::{
    ClientError, Coordinates, Observed, ReconcileError, Reconciler, StorageAccountsApi,
    UpdateGroup,
};

fn acct01() -> Coordinates {
    Coordinates::new("rg-test", "acct01")
}

#[tokio::test]
async fn test_create_populates_document() {
    let cloud = FakeCloud::settling_after(2);
    let reconciler = storage_reconciler(&cloud);

    let mut doc = storage_account("acct01");
    doc.account_replication_type = ReplicationType::Ragrs;
    doc.tags.insert("env".to_string(), "test".to_string());
    reconciler.create(&mut doc).await.unwrap();

    assert_eq!(doc.id.as_deref(), Some(account_id("acct01").as_str()));
    assert_eq!(doc.location, "westeurope");
    assert_eq!(doc.computed.account_type, "Standard_RAGRS");
    assert_eq!(
        doc.computed.primary_blob_endpoint,
        "https://acct01.blob.core.windows.net/"
    );
    assert_eq!(
        doc.computed.secondary_blob_endpoint,
        "https://acct01-secondary.blob.core.windows.net/"
    );
    assert!(
        doc.computed
            .secondary_blob_connection_string
            .contains(&doc.computed.secondary_access_key)
    );
    assert_eq!(doc.tags.get("env").map(String::as_str), Some("test"));

    // Lookup read, one pending poll, the settled poll, then the final read.
    assert_eq!(
        cloud.remote_calls(),
        vec![
            "create",
            "get_properties",
            "get_properties",
            "get_properties",
            "get_properties",
            "list_keys"
        ]
    );
}

#[tokio::test]
async fn test_create_failure_records_id_first() {
    let cloud = FakeCloud::new();
    cloud.fail_after_applying("create", 1, server_error());
    let reconciler = storage_reconciler(&cloud);

    let mut doc = storage_account("acct01");
    let err = reconciler.create(&mut doc).await.unwrap_err();

    match err {
        ReconcileError::CreateFailed {
            recovered_id,
            source,
            ..
        } => {
            assert_eq!(recovered_id, Some(account_id("acct01")));
            assert_eq!(source, server_error());
        }
        other => panic!("expected CreateFailed, got {other:?}"),
    }
    assert_eq!(doc.id, Some(account_id("acct01")));
    assert_eq!(cloud.remote_calls(), vec!["create", "get_properties"]);

    // The recorded identifier is enough to clean up.
    reconciler.delete(&mut doc).await.unwrap();
    assert!(doc.id.is_none());
    assert!(cloud.inner().get_properties(&acct01()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_create_failure_without_resource() {
    let cloud = FakeCloud::new();
    cloud.fail("create", 1, server_error());
    let reconciler = storage_reconciler(&cloud);

    let mut doc = storage_account("acct01");
    let err = reconciler.create(&mut doc).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::CreateFailed {
            recovered_id: None,
            ..
        }
    ));
    assert!(doc.id.is_none());
    // The lookup is attempted even after a failed write.
    assert_eq!(cloud.remote_calls(), vec!["create", "get_properties"]);
}

#[tokio::test]
async fn test_identity_loss() {
    let cloud = FakeCloud::new();
    cloud.fail(
        "get_properties",
        1,
        ClientError::NotFound("acct01".to_string()),
    );
    let reconciler = storage_reconciler(&cloud);

    let mut doc = storage_account("acct01");
    let err = reconciler.create(&mut doc).await.unwrap_err();

    assert!(matches!(err, ReconcileError::IdentityLoss { .. }));
    assert!(err.is_retryable());
    assert!(doc.id.is_none());
}

#[tokio::test]
async fn test_validation_makes_no_calls() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);

    let mut doc = storage_account("acct01");
    doc.account_kind = AccountKind::BlobStorage;
    doc.account_replication_type = ReplicationType::Zrs;
    let err = reconciler.create(&mut doc).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Validation { .. }));
    assert!(!err.is_retryable());
    assert!(cloud.calls().is_empty());

    let mut short = storage_account("ab");
    assert!(reconciler.create(&mut short).await.is_err());
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_poll_failure_keeps_id() {
    let cloud = FakeCloud::settling_after(3);
    // Lookup consumes the first read; the second poll fails.
    cloud.fail("get_properties", 3, server_error());
    let reconciler = storage_reconciler(&cloud);

    let mut doc = storage_account("acct01");
    let err = reconciler.create(&mut doc).await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Api {
            action: "polling",
            ..
        }
    ));
    assert_eq!(doc.id, Some(account_id("acct01")));
}

#[tokio::test]
async fn test_read_not_found_clears_id() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut doc = storage_account("acct01");
    reconciler.create(&mut doc).await.unwrap();

    // Deleted out of band.
    let handle = StorageAccountsApi::delete(cloud.inner(), &acct01())
        .await
        .unwrap();
    StorageAccountsApi::wait(cloud.inner(), &handle)
        .await
        .unwrap();

    assert_eq!(reconciler.read(&mut doc).await.unwrap(), Observed::Absent);
    assert!(doc.id.is_none());
}

#[tokio::test]
async fn test_read_error_keeps_state() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut doc = storage_account("acct01");
    reconciler.create(&mut doc).await.unwrap();
    let before = doc.clone();

    cloud.clear_calls();
    cloud.fail("get_properties", 1, server_error());
    let err = reconciler.read(&mut doc).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Api { action: "reading", .. }));
    assert_eq!(doc, before);
}

#[tokio::test]
async fn test_read_refetches_keys() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut doc = storage_account("acct01");
    reconciler.create(&mut doc).await.unwrap();

    cloud.clear_calls();
    reconciler.read(&mut doc).await.unwrap();
    reconciler.read(&mut doc).await.unwrap();
    assert_eq!(cloud.count("list_keys"), 2);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut doc = storage_account("acct01");
    reconciler.create(&mut doc).await.unwrap();

    let mut stale = doc.clone();
    reconciler.delete(&mut doc).await.unwrap();
    reconciler.delete(&mut stale).await.unwrap();

    assert!(doc.id.is_none());
    assert!(stale.id.is_none());
    assert_eq!(cloud.count("delete"), 2);
}

#[tokio::test]
async fn test_delete_error_keeps_id() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut doc = storage_account("acct01");
    reconciler.create(&mut doc).await.unwrap();

    cloud.fail("delete", 1, server_error());
    assert!(reconciler.delete(&mut doc).await.is_err());
    assert_eq!(doc.id, Some(account_id("acct01")));
}

#[tokio::test]
async fn test_update_one_call_per_group_in_order() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut state = storage_account("acct01");
    reconciler.create(&mut state).await.unwrap();

    let mut desired = storage_account("acct01");
    desired.enable_https_traffic_only = true;
    desired.tags.insert("env".to_string(), "prod".to_string());
    desired.account_replication_type = ReplicationType::Grs;

    cloud.clear_calls();
    reconciler.update(&mut state, &desired).await.unwrap();

    let updates = cloud.updates();
    assert_eq!(updates.len(), 3);
    assert!(updates[0].sku.is_some());
    assert!(updates[1].tags.is_some());
    assert_eq!(
        updates[2]
            .properties
            .as_ref()
            .and_then(|p| p.enable_https_traffic_only),
        Some(true)
    );
    assert_eq!(cloud.remote_calls(), vec!["update", "update", "update"]);

    reconciler.read(&mut state).await.unwrap();
    assert_eq!(state.account_replication_type, ReplicationType::Grs);
    assert_eq!(state.computed.secondary_location, "northeurope");
    assert!(state.enable_https_traffic_only);
}

#[tokio::test]
async fn test_update_stops_at_failed_group() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut state = storage_account("acct01");
    reconciler.create(&mut state).await.unwrap();

    let mut desired = storage_account("acct01");
    desired.account_replication_type = ReplicationType::Grs;
    desired.tags.insert("env".to_string(), "prod".to_string());
    desired.enable_file_encryption = true;
    desired.enable_https_traffic_only = true;

    cloud.clear_calls();
    cloud.fail("update", 2, server_error());
    let err = reconciler.update(&mut state, &desired).await.unwrap_err();

    match &err {
        ReconcileError::PartialApply { group, applied, .. } => {
            assert_eq!(*group, UpdateGroup::Tags);
            assert_eq!(applied, &vec![UpdateGroup::Replication]);
        }
        other => panic!("expected PartialApply, got {other:?}"),
    }
    assert!(err.is_retryable());
    // Calls 3 and 4 were never issued.
    assert_eq!(cloud.count("update"), 2);

    // The applied group is recorded, the failed and later ones are not.
    assert_eq!(state.account_replication_type, ReplicationType::Grs);
    assert!(state.tags.is_empty());
    assert!(!state.enable_file_encryption);

    // A retry only sends what is still outstanding.
    cloud.clear_calls();
    reconciler.update(&mut state, &desired).await.unwrap();
    assert_eq!(cloud.count("update"), 3);
    assert!(cloud.updates()[0].tags.is_some());
}

#[tokio::test]
async fn test_update_creation_field_requires_replacement() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut state = storage_account("acct01");
    reconciler.create(&mut state).await.unwrap();

    let mut desired = storage_account("acct01");
    desired.location = "northeurope".to_string();
    desired.account_tier = AccountTier::Premium;

    cloud.clear_calls();
    let err = reconciler.update(&mut state, &desired).await.unwrap_err();
    match err {
        ReconcileError::RequiresReplacement { fields, .. } => {
            assert_eq!(fields, vec!["location", "account_tier"]);
        }
        other => panic!("expected RequiresReplacement, got {other:?}"),
    }
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_blob_storage_access_tier() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);

    let mut state = storage_account("blobacct");
    state.account_kind = AccountKind::BlobStorage;
    reconciler.create(&mut state).await.unwrap();
    assert_eq!(state.access_tier, Some(AccessTier::Hot));

    let mut desired = storage_account("blobacct");
    desired.account_kind = AccountKind::BlobStorage;
    cloud.clear_calls();
    reconciler.update(&mut state, &desired).await.unwrap();
    assert!(cloud.calls().is_empty());

    desired.access_tier = Some(AccessTier::Cool);
    reconciler.apply(&mut state, &desired).await.unwrap();
    assert_eq!(state.access_tier, Some(AccessTier::Cool));
}

#[tokio::test]
async fn test_import_existing_and_absent() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let mut doc = storage_account("acct01");
    doc.enable_blob_encryption = true;
    reconciler.create(&mut doc).await.unwrap();

    let imported = reconciler.import(&account_id("acct01")).await.unwrap();
    assert_eq!(imported.name, "acct01");
    assert_eq!(imported.resource_group_name, "rg-test");
    assert!(imported.enable_blob_encryption);
    assert_eq!(imported.computed, doc.computed);

    let err = reconciler.import(&account_id("missing01")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::NotFound { .. }));

    let err = reconciler.import("not-an-id").await.unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidId(_)));
}

#[tokio::test]
async fn test_apply_recreates_after_drift() {
    let cloud = FakeCloud::new();
    let reconciler = storage_reconciler(&cloud);
    let desired = storage_account("acct01");

    let mut state = desired.clone();
    reconciler.create(&mut state).await.unwrap();
    StorageAccountsApi::delete(cloud.inner(), &acct01())
        .await
        .unwrap();

    reconciler.apply(&mut state, &desired).await.unwrap();
    assert_eq!(state.id, Some(account_id("acct01")));
    assert_eq!(cloud.count("create"), 2);
}
