use anyhow::{Context, Result};
use facematch_core::{SyncCoordinator, VectorIndex};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod store;

use config::{BusKind, Config};
use dbus_interface::{FaceMatchService, BUS_NAME, OBJECT_PATH};
use store::SqliteStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facematchd starting");

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(
        dimension = config.matching.dimension,
        tolerance = config.matching.tolerance,
        db = %config.db_path.display(),
        bus = ?config.bus,
        "configuration loaded"
    );

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    tracing::info!(records = store.count()?, "identity store opened");
    let index = Arc::new(VectorIndex::new(config.matching.dimension));
    let coordinator = Arc::new(SyncCoordinator::new(index));

    // A failed startup sync is fatal.
    if config.sync_on_start {
        let (sync, source) = (Arc::clone(&coordinator), Arc::clone(&store));
        let report = tokio::task::spawn_blocking(move || sync.full_sync(source.as_ref()))
            .await?
            .context("startup sync failed")?;
        tracing::info!(
            indexed = report.indexed,
            skipped = report.skipped,
            "startup sync complete"
        );
    } else {
        tracing::info!("startup sync disabled via FACEMATCH_SYNC_ON_START=0");
    }

    let service = FaceMatchService::new(config.matching, coordinator, store);

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let _connection = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on D-Bus")?;

    tracing::info!(name = BUS_NAME, path = OBJECT_PATH, "facematchd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("facematchd shutting down");

    Ok(())
}
