//! Tenant isolation behavior of the upload and download services.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use docvault::errors::ApiError;
use docvault::guard;
use docvault::services::{DownloadService, UploadService};
use docvault::test_utils::{make_document, InMemoryMetadataStore, InMemoryObjectStore};

fn upload_service(storage: Arc<InMemoryObjectStore>) -> UploadService {
    UploadService::new(
        storage,
        vec!["pdf".to_string(), "txt".to_string()],
        10 * 1024 * 1024,
        Duration::from_secs(3600),
    )
}

fn download_service(
    db: Arc<InMemoryMetadataStore>,
    storage: Arc<InMemoryObjectStore>,
) -> DownloadService {
    DownloadService::new(db, storage, Duration::from_secs(3600))
}

#[tokio::test]
async fn test_upload_credential_key_is_tenant_scoped() {
    let storage = Arc::new(InMemoryObjectStore::new());
    let service = upload_service(storage);

    let credential = service
        .request_upload_credential("t_1", "report.pdf", "application/pdf", 1024, None)
        .await
        .unwrap();

    assert!(credential.key.starts_with("tenants/t_1/documents/raw/"));
    assert!(guard::validate(&credential.key, "t_1"));
    assert!(!guard::validate(&credential.key, "t_2"));
    assert!(credential.credential.contains(&credential.key));
}

#[tokio::test]
async fn test_upload_traversal_filename_is_neutralized() {
    let storage = Arc::new(InMemoryObjectStore::new());
    let service = upload_service(storage);

    let credential = service
        .request_upload_credential("t_1", "../../secret.pdf", "application/pdf", 1024, None)
        .await
        .unwrap();

    assert!(!credential.key.contains(".."));
    assert!(credential.key.starts_with("tenants/t_1/documents/raw/"));
    assert_eq!(credential.filename, "secret.pdf");
}

#[tokio::test]
async fn test_upload_rejects_before_credential_issuance() {
    let storage = Arc::new(InMemoryObjectStore::new());
    let service = upload_service(storage);

    let err = service
        .request_upload_credential("t_1", "setup.exe", "application/x-msdownload", 1024, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::UnsupportedFileType(_)));

    let err = service
        .request_upload_credential("t_1", "report.pdf", "application/pdf", i64::MAX, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::FileTooLarge { .. }));

    let err = service
        .request_upload_credential("???", "report.pdf", "application/pdf", 1024, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidParameter(_)));
}

#[tokio::test]
async fn test_download_cross_tenant_lookup_is_not_found() {
    let db = Arc::new(InMemoryMetadataStore::new());
    let storage = Arc::new(InMemoryObjectStore::new());

    let document = make_document("t_1", "report.pdf");
    let document_id = document.id;
    db.add_document(document);

    let service = download_service(db, storage);

    // Owner succeeds
    let credential = service
        .issue_download_credential(document_id, "t_1", &[])
        .await
        .unwrap();
    assert_eq!(credential.document_id, document_id);

    // Another tenant gets the same error as a missing document
    let err = service
        .issue_download_credential(document_id, "t_2", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFoundOrForbidden));

    let err = service
        .issue_download_credential(Uuid::new_v4(), "t_2", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFoundOrForbidden));
}

#[tokio::test]
async fn test_download_soft_deleted_document_is_not_found() {
    let db = Arc::new(InMemoryMetadataStore::new());
    let storage = Arc::new(InMemoryObjectStore::new());

    let mut document = make_document("t_1", "report.pdf");
    document.deleted_at = Some(chrono::Utc::now());
    let document_id = document.id;
    db.add_document(document);

    let service = download_service(db, storage);
    let err = service
        .issue_download_credential(document_id, "t_1", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFoundOrForbidden));
}

#[tokio::test]
async fn test_download_corrupted_storage_key_is_denied() {
    let db = Arc::new(InMemoryMetadataStore::new());
    let storage = Arc::new(InMemoryObjectStore::new());

    // Record owned by t_1 but pointing into t_2's prefix
    let mut document = make_document("t_1", "report.pdf");
    document.storage_key = "tenants/t_2/documents/raw/doc_x/f.pdf".to_string();
    let document_id = document.id;
    db.add_document(document);

    let service = download_service(db, storage);
    let err = service
        .issue_download_credential(document_id, "t_1", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStorageLocation));
}

#[tokio::test]
async fn test_download_empty_storage_key_is_denied() {
    let db = Arc::new(InMemoryMetadataStore::new());
    let storage = Arc::new(InMemoryObjectStore::new());

    let mut document = make_document("t_1", "report.pdf");
    document.storage_key = String::new();
    let document_id = document.id;
    db.add_document(document);

    let service = download_service(db, storage);
    let err = service
        .issue_download_credential(document_id, "t_1", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidStorageLocation));
}

#[tokio::test]
async fn test_role_chain_document_roles_win_over_folder() {
    let db = Arc::new(InMemoryMetadataStore::new());
    let storage = Arc::new(InMemoryObjectStore::new());

    let folder_id = Uuid::new_v4();
    db.folder_roles
        .lock()
        .unwrap()
        .insert(folder_id, Some(vec!["viewer".to_string()]));

    let mut document = make_document("t_1", "report.pdf");
    document.folder_id = Some(folder_id);
    document.allowed_roles = Some(vec!["finance".to_string()]);
    let document_id = document.id;
    db.add_document(document);

    let service = download_service(db, storage);

    // Document allow-list decides first: viewer role on the folder does not help
    let err = service
        .issue_download_credential(document_id, "t_1", &["viewer".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFoundOrForbidden));

    assert!(service
        .issue_download_credential(document_id, "t_1", &["finance".to_string()])
        .await
        .is_ok());
}

#[tokio::test]
async fn test_role_chain_falls_back_to_folder_then_default_allow() {
    let db = Arc::new(InMemoryMetadataStore::new());
    let storage = Arc::new(InMemoryObjectStore::new());

    let folder_id = Uuid::new_v4();
    db.folder_roles
        .lock()
        .unwrap()
        .insert(folder_id, Some(vec!["viewer".to_string()]));

    // Document without its own allow-list defers to its folder
    let mut in_folder = make_document("t_1", "a.pdf");
    in_folder.folder_id = Some(folder_id);
    let in_folder_id = in_folder.id;
    db.add_document(in_folder);

    // Document with neither defers to default-allow
    let loose = make_document("t_1", "b.pdf");
    let loose_id = loose.id;
    db.add_document(loose);

    let service = download_service(db, storage);

    assert!(service
        .issue_download_credential(in_folder_id, "t_1", &["viewer".to_string()])
        .await
        .is_ok());
    let err = service
        .issue_download_credential(in_folder_id, "t_1", &["intern".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFoundOrForbidden));

    // No allow-list anywhere: any tenant member may access
    assert!(service
        .issue_download_credential(loose_id, "t_1", &[])
        .await
        .is_ok());
}
