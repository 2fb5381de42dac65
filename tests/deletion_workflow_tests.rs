//! Tenant deletion workflow: batching, validation aborts, verification and
//! auditing.

use std::sync::Arc;

use docvault::errors::ApiError;
use docvault::services::TenantDeletionService;
use docvault::test_utils::{InMemoryMetadataStore, InMemoryObjectStore};

fn seed_objects(storage: &InMemoryObjectStore, tenant_id: &str, count: usize) {
    for i in 0..count {
        let key = format!("tenants/{}/documents/raw/doc_{}/file_{}.pdf", tenant_id, i, i);
        storage.insert(&key, b"data");
    }
}

fn service(
    db: Arc<InMemoryMetadataStore>,
    storage: Arc<InMemoryObjectStore>,
) -> TenantDeletionService {
    TenantDeletionService::new(db, storage)
}

#[tokio::test]
async fn test_delete_empty_tenant_completes_with_zero() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_empty", 0);
    let storage = Arc::new(InMemoryObjectStore::new());

    let result = service(db.clone(), storage)
        .delete_tenant_storage("t_empty", false, "admin_1")
        .await
        .unwrap();

    assert_eq!(result.requested_count, 0);
    assert_eq!(result.deleted_count, 0);
    assert!(result.verified);
    assert!(result.errors.is_empty());
    assert_eq!(db.audit_entries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_batch_boundary_at_exactly_1000() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_9", 0);
    let storage = Arc::new(InMemoryObjectStore::new());
    seed_objects(&storage, "t_9", 1000);

    let result = service(db, storage.clone())
        .delete_tenant_storage("t_9", false, "admin_1")
        .await
        .unwrap();

    assert_eq!(result.deleted_count, 1000);
    assert_eq!(*storage.delete_batch_sizes.lock().unwrap(), vec![1000]);
    assert!(result.verified);
}

#[tokio::test]
async fn test_batch_boundary_at_1001_splits_into_two() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_9", 0);
    let storage = Arc::new(InMemoryObjectStore::new());
    seed_objects(&storage, "t_9", 1001);

    let result = service(db, storage.clone())
        .delete_tenant_storage("t_9", false, "admin_1")
        .await
        .unwrap();

    assert_eq!(result.deleted_count, 1001);
    assert_eq!(*storage.delete_batch_sizes.lock().unwrap(), vec![1000, 1]);
}

#[tokio::test]
async fn test_2500_objects_delete_in_three_batches_with_audit() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_9", 0);
    // Small listing pages to exercise continuation handling too
    let storage = Arc::new(InMemoryObjectStore::with_page_size(700));
    seed_objects(&storage, "t_9", 2500);

    let result = service(db.clone(), storage.clone())
        .delete_tenant_storage("t_9", false, "admin_1")
        .await
        .unwrap();

    assert_eq!(result.requested_count, 2500);
    assert_eq!(result.deleted_count, 2500);
    assert_eq!(*storage.delete_batch_sizes.lock().unwrap(), vec![1000, 1000, 500]);
    assert!(result.verified);
    assert!(storage.is_empty());

    let audits = db.audit_entries.lock().unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].metadata["deleted_count"], 2500);
    assert_eq!(audits[0].metadata["verified"], true);
}

#[tokio::test]
async fn test_foreign_object_aborts_before_any_delete() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_1", 0);
    let storage = Arc::new(InMemoryObjectStore::new());
    seed_objects(&storage, "t_1", 10);
    // A key under the tenant prefix that fails structural validation
    storage.insert("tenants/t_1/uploads/raw/doc_x/stray.pdf", b"data");

    let err = service(db.clone(), storage.clone())
        .delete_tenant_storage("t_1", false, "admin_1")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ForeignObjectsDetected { listed: 11, found: 1 }));
    // Abort-before-side-effect: no delete batch was ever issued
    assert!(storage.delete_batch_sizes.lock().unwrap().is_empty());
    assert_eq!(storage.len(), 11);
    // The abort itself is still audited
    let audits = db.audit_entries.lock().unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].metadata["deleted_count"], 0);
}

#[tokio::test]
async fn test_active_users_block_deletion_unless_forced() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_1", 3);
    let storage = Arc::new(InMemoryObjectStore::new());
    seed_objects(&storage, "t_1", 5);

    let svc = service(db.clone(), storage.clone());

    let err = svc
        .delete_tenant_storage("t_1", false, "admin_1")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::TenantHasActiveUsers(3)));
    assert_eq!(storage.len(), 5);

    let result = svc
        .delete_tenant_storage("t_1", true, "admin_1")
        .await
        .unwrap();
    assert_eq!(result.deleted_count, 5);
}

#[tokio::test]
async fn test_unknown_tenant_is_rejected() {
    let db = Arc::new(InMemoryMetadataStore::new());
    let storage = Arc::new(InMemoryObjectStore::new());

    let err = service(db.clone(), storage.clone())
        .delete_tenant_storage("t_missing", false, "admin_1")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::TenantNotFound));

    let err = service(db, storage)
        .delete_tenant_storage("???", false, "admin_1")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidParameter(_)));
}

#[tokio::test]
async fn test_failed_batch_does_not_abort_remaining_batches() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_1", 0);
    let mut storage = InMemoryObjectStore::new();
    // Poison a key that sorts into the first batch
    storage.fail_delete_containing = Some("doc_0/".to_string());
    let storage = Arc::new(storage);
    seed_objects(&storage, "t_1", 1500);

    let result = service(db, storage.clone())
        .delete_tenant_storage("t_1", false, "admin_1")
        .await
        .unwrap();

    // Both batches were attempted despite the first failing wholesale
    assert_eq!(storage.delete_batch_sizes.lock().unwrap().len(), 2);
    assert!(!result.errors.is_empty());
    assert!(result.deleted_count < result.requested_count);
    assert!(!result.verified);
}

#[tokio::test]
async fn test_delete_complete_removes_records_after_verification() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_1", 0);
    let storage = Arc::new(InMemoryObjectStore::new());
    seed_objects(&storage, "t_1", 12);

    let report = service(db.clone(), storage.clone())
        .delete_complete("t_1", false, "admin_1")
        .await
        .unwrap();

    assert!(report.storage.verified);
    assert!(report.records_deleted);
    assert_eq!(*db.records_deleted_for.lock().unwrap(), vec!["t_1".to_string()]);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_delete_complete_keeps_records_when_verification_fails() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_1", 0);
    let mut storage = InMemoryObjectStore::new();
    storage.fail_delete_containing = Some("doc_3/".to_string());
    let storage = Arc::new(storage);
    seed_objects(&storage, "t_1", 8);

    let report = service(db.clone(), storage)
        .delete_complete("t_1", false, "admin_1")
        .await
        .unwrap();

    assert!(!report.storage.verified);
    assert!(!report.records_deleted);
    // Metadata never deleted while bytes might still exist
    assert!(db.records_deleted_for.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_deletion_never_touches_other_tenants() {
    let db = Arc::new(InMemoryMetadataStore::new());
    db.add_tenant("t_1", 0);
    let storage = Arc::new(InMemoryObjectStore::new());
    seed_objects(&storage, "t_1", 20);
    seed_objects(&storage, "t_2", 20);
    seed_objects(&storage, "t_10", 20);

    let result = service(db, storage.clone())
        .delete_tenant_storage("t_1", false, "admin_1")
        .await
        .unwrap();

    assert_eq!(result.deleted_count, 20);
    let survivors = storage.keys();
    assert_eq!(survivors.len(), 40);
    assert!(survivors.iter().all(|k| !k.starts_with("tenants/t_1/")));
}
