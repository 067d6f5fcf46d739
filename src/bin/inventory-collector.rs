// Copyright (c) 2025 - Cowboy AI, Inc.
//! Inventory Collector Service
//!
//! Polls the compute nodes listed in a node registry, keeps their inventory
//! current and publishes lifecycle events.
//!
//! - Node registry and probe data → fixture directory (`INVENTORY_FIXTURE_DIR`)
//! - Events → NATS (`NATS_URL`) or the log when NATS is not configured
//!
//! Run with: cargo run --bin inventory-collector
//!
//! Tuning knobs are read from `INVENTORY_*` variables (see `InventoryConfig`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cim_inventory::{
    events::LoggingEventSink,
    nats::{NatsClient, NatsConfig, NatsEventSink},
    probe::{FileHostProbe, FileNodeRegistry},
    EventSink, InMemoryRepository, InventoryConfig, InventoryManager, ResourceKind,
};
use tokio::sync::watch;
use tracing::{error, info};

/// Process-level settings that are not part of the inventory config
#[derive(Debug, Clone)]
struct CollectorSettings {
    fixture_dir: PathBuf,
    nats_url: Option<String>,
}

impl CollectorSettings {
    fn from_env() -> Result<Self> {
        let fixture_dir = std::env::var("INVENTORY_FIXTURE_DIR")
            .map(PathBuf::from)
            .context("INVENTORY_FIXTURE_DIR not set; point it at a directory holding nodes.json")?;
        let nats_url = std::env::var("NATS_URL").ok().filter(|url| !url.is_empty());
        Ok(Self {
            fixture_dir,
            nats_url,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting inventory collector");

    let settings = CollectorSettings::from_env()?;
    let config = InventoryConfig::from_env().context("Invalid inventory configuration")?;
    info!(
        fixture_dir = %settings.fixture_dir.display(),
        poll_interval = ?config.poll_interval,
        inventory_workers = config.inventory_workers,
        perf_workers = config.perf_workers,
        "Configuration loaded"
    );

    let sink: Arc<dyn EventSink> = match &settings.nats_url {
        Some(url) => {
            let client = NatsClient::new(NatsConfig::with_servers(url))
                .await
                .context("Failed to connect to NATS")?;
            Arc::new(NatsEventSink::new(client))
        }
        None => {
            info!("NATS_URL not set; events go to the log");
            Arc::new(LoggingEventSink)
        }
    };

    let manager = Arc::new(InventoryManager::new(
        config,
        Arc::new(FileNodeRegistry::in_dir(&settings.fixture_dir)),
        Arc::new(FileHostProbe::new(&settings.fixture_dir)),
        Arc::new(InMemoryRepository::new()),
        sink,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = tokio::spawn(manager.clone().run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    shutdown_tx
        .send(true)
        .context("Inventory manager already stopped")?;

    if let Err(e) = runner.await {
        error!(error = %e, "Inventory manager task failed");
    }

    info!(
        nodes = manager.node_ids().len(),
        resources = ResourceKind::POLL_ORDER
            .iter()
            .map(|kind| manager.cache().len(*kind))
            .sum::<usize>(),
        "Inventory collector stopped"
    );
    Ok(())
}
