use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sensorlog::api;
use sensorlog::config::{Config, DatabaseBackend};
use sensorlog::service::ReadingService;
use sensorlog::storage::{PostgresStore, ReadingStore, SqliteStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sensorlog=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;
    info!("Loaded configuration");

    let db = &config.database;
    let store: Arc<dyn ReadingStore> = match db.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite store: {} (table {})", db.url, db.table);
            Arc::new(
                SqliteStore::new(&db.url, &db.pool, db.table.clone())
                    .await
                    .context("failed to open SQLite store")?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL store (table {})", db.table);
            Arc::new(
                PostgresStore::new(&db.url, &db.pool, db.table.clone())
                    .await
                    .context("failed to connect to PostgreSQL")?,
            )
        }
    };

    if let Err(e) = store.ping().await {
        error!("Store is not reachable: {}", e);
        return Err(e).context("store ping failed at startup");
    }
    info!(
        max_connections = db.pool.max_connections,
        min_connections = db.pool.min_connections,
        "Store connection pool ready"
    );

    let service = ReadingService::new(store);
    let router = api::create_api_router(service, config.cors_allow_any);

    let addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 Sensor API listening on http://{}", addr);
    info!("   - Readings at http://{}/api/sensor-data", addr);
    info!("   - Exports at http://{}/api/export", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
