pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod guard;
pub mod ingestion;
pub mod keys;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::ingestion::IngestionPipeline;
use crate::storage::ObjectStore;

/// Shared application state. All clients are constructed once at startup
/// and injected; nothing here is a module-level singleton.
pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub storage: Arc<dyn ObjectStore>,
    pub pipeline: Arc<IngestionPipeline>,
}
