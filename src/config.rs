//! Environment-driven server configuration.

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_address: String,
    pub s3: S3Config,
    /// Upper bound for a single uploaded file, in bytes.
    pub max_upload_bytes: i64,
    /// Lifetime of presigned upload/download URLs, in seconds.
    pub presign_expiry_secs: u64,
    /// Extensions accepted for raw uploads.
    pub allowed_extensions: Vec<String>,
    /// Page size for the background ingestion query.
    pub ingestion_batch_size: i64,
    /// Interval between background ingestion passes, in seconds.
    pub ingestion_interval_secs: u64,
    pub embeddings: EmbeddingsConfig,
    pub vector_store: VectorStoreConfig,
}

#[derive(Debug, Clone)]
pub struct EmbeddingsConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub base_url: String,
    pub collection: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket_name: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible services (MinIO etc.).
    pub endpoint_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow!("DATABASE_URL must be set"))?;

        let s3 = S3Config {
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| anyhow!("S3_BUCKET_NAME must be set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| anyhow!("S3_ACCESS_KEY_ID must be set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| anyhow!("S3_SECRET_ACCESS_KEY must be set"))?,
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
        };

        let allowed_extensions = std::env::var("ALLOWED_FILE_EXTENSIONS")
            .unwrap_or_else(|_| "pdf,txt,doc,docx,md,csv,xlsx,pptx".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Config {
            database_url,
            server_address: std::env::var("SERVER_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            s3,
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50 * 1024 * 1024),
            presign_expiry_secs: std::env::var("PRESIGN_EXPIRY_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            allowed_extensions,
            ingestion_batch_size: std::env::var("INGESTION_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            ingestion_interval_secs: std::env::var("INGESTION_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            embeddings: EmbeddingsConfig {
                endpoint: std::env::var("EMBEDDINGS_ENDPOINT")
                    .unwrap_or_else(|_| "https://api.openai.com/v1/embeddings".to_string()),
                api_key: std::env::var("EMBEDDINGS_API_KEY").unwrap_or_default(),
                model: std::env::var("EMBEDDINGS_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            },
            vector_store: VectorStoreConfig {
                base_url: std::env::var("VECTOR_STORE_URL")
                    .unwrap_or_else(|_| "http://localhost:6333".to_string()),
                collection: std::env::var("VECTOR_STORE_COLLECTION")
                    .unwrap_or_else(|_| "documents".to_string()),
                api_key: std::env::var("VECTOR_STORE_API_KEY").ok().filter(|s| !s.is_empty()),
            },
        })
    }
}
