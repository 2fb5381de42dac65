pub mod download;
pub mod tenant_deletion;
pub mod upload;

pub use download::DownloadService;
pub use tenant_deletion::TenantDeletionService;
pub use upload::UploadService;
