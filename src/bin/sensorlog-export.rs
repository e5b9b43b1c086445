use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sensorlog::config::{Config, DatabaseBackend};
use sensorlog::query::ExportParams;
use sensorlog::service::ReadingService;
use sensorlog::storage::{PostgresStore, ReadingStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sensorlog-export")]
#[command(about = "Offline sensor report export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one device-month report to disk
    Export {
        /// Device unique id
        #[arg(long)]
        device: String,
        /// Month, as MM
        #[arg(long)]
        month: String,
        /// Four-digit year
        #[arg(long)]
        year: String,
        /// Comma-separated sensor codes, in column order
        #[arg(long)]
        sensors: String,
        /// Header labels as code:label pairs
        #[arg(long)]
        sensor_meta: Option<String>,
        /// wib, wita or wit
        #[arg(long, default_value = "wib")]
        zone: String,
        /// excel or csv
        #[arg(long, default_value = "excel")]
        out: String,
        /// Destination path; defaults to the report file name
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check that the configured store is reachable
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sensorlog=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let db = &config.database;

    let store: Arc<dyn ReadingStore> = match db.backend {
        DatabaseBackend::Sqlite => {
            Arc::new(SqliteStore::new(&db.url, &db.pool, db.table.clone()).await?)
        }
        DatabaseBackend::Postgres => {
            Arc::new(PostgresStore::new(&db.url, &db.pool, db.table.clone()).await?)
        }
    };
    let service = ReadingService::new(store);

    match cli.command {
        Commands::Export {
            device,
            month,
            year,
            sensors,
            sensor_meta,
            zone,
            out,
            output,
        } => {
            let params = ExportParams {
                device_id: Some(device),
                bulan: Some(month),
                tahun: Some(year),
                sensors: Some(sensors),
                sensor_meta,
                zonawaktu: Some(zone),
                out: Some(out),
            };
            let file = service.export_params(params).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&file.filename));
            tokio::fs::write(&path, &file.bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("✓ Wrote {} ({} bytes)", path.display(), file.bytes.len());
        }
        Commands::Ping => {
            service.ping().await?;
            println!("✓ Store is reachable");
        }
    }

    Ok(())
}
