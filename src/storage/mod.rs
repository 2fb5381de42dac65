//! Object storage abstraction over the shared document bucket.
//!
//! The backend itself has no tenant concept; callers are expected to have
//! run every key or prefix through the guard before any method here is
//! invoked. Keeping the client behind a trait lets services take test
//! doubles instead of a process-wide singleton.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

pub mod s3;

/// Which operation a presigned credential authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresignOperation {
    Get,
    Put,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectListing {
    pub keys: Vec<String>,
    pub next_token: Option<String>,
}

/// Result of a bulk delete. Partial failure is normal; callers accumulate
/// counts rather than aborting.
#[derive(Debug, Clone, Default)]
pub struct BatchDeleteOutcome {
    pub deleted_keys: Vec<String>,
    pub errors: Vec<String>,
}

/// The storage backend's bulk-delete ceiling per request.
pub const DELETE_BATCH_LIMIT: usize = 1000;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object at the given key.
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Fetch an object's bytes.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete a single object.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete up to [`DELETE_BATCH_LIMIT`] objects in one request.
    async fn delete_batch(&self, keys: &[String]) -> Result<BatchDeleteOutcome>;

    /// List one page of keys under a prefix.
    async fn list(&self, prefix: &str, continuation: Option<String>) -> Result<ObjectListing>;

    /// Produce a time-bounded URL authorizing exactly one operation on
    /// exactly one key. There is no revocation; expiry is the only
    /// cancellation primitive.
    async fn presign(
        &self,
        operation: PresignOperation,
        key: &str,
        expires_in: Duration,
    ) -> Result<String>;

    /// Human-readable backend identifier.
    fn storage_type(&self) -> &'static str;

    /// Validate access on startup.
    async fn initialize(&self) -> Result<()>;
}

/// Drain a prefix listing to completion, following continuation tokens.
pub async fn list_all(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut continuation: Option<String> = None;

    loop {
        let page = store.list(prefix, continuation).await?;
        keys.extend(page.keys);
        match page.next_token {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    Ok(keys)
}
