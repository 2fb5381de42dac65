use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use docvault::config::Config;
use docvault::db::Database;
use docvault::ingestion::external::{HttpEmbedder, HttpVectorStore, PlainTextExtractor};
use docvault::ingestion::IngestionPipeline;
use docvault::routes;
use docvault::storage::s3::S3Storage;
use docvault::storage::ObjectStore;
use docvault::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docvault=info")),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::new(&config.database_url).await?);

    let storage: Arc<dyn ObjectStore> = Arc::new(S3Storage::new(config.s3.clone())?);
    storage.initialize().await?;

    let pipeline = Arc::new(IngestionPipeline::new(
        db.clone(),
        storage.clone(),
        Arc::new(PlainTextExtractor),
        Arc::new(HttpEmbedder::new(
            config.embeddings.endpoint.clone(),
            config.embeddings.api_key.clone(),
            config.embeddings.model.clone(),
        )),
        Arc::new(HttpVectorStore::new(
            config.vector_store.base_url.clone(),
            config.vector_store.collection.clone(),
            config.vector_store.api_key.clone(),
        )),
        config.ingestion_batch_size,
    ));

    // Background ingestion pass, independent of request handling
    {
        let pipeline = pipeline.clone();
        let interval_secs = config.ingestion_interval_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                match pipeline.process_all_tenants().await {
                    Ok(0) => {}
                    Ok(count) => info!("background ingestion processed {} documents", count),
                    Err(e) => error!("background ingestion pass failed: {}", e),
                }
            }
        });
    }

    let server_address = config.server_address.clone();
    let state = Arc::new(AppState {
        config,
        db,
        storage,
        pipeline,
    });

    let app = Router::new()
        .route("/api/health", get(health))
        .nest("/api/documents", routes::documents::router())
        .nest("/api/admin", routes::admin::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    info!("docvault listening on {}", server_address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
