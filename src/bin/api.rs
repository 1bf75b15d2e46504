//! DevChain API Server
//!
//! Run with: cargo run --bin devchain-api
//!
//! # Configuration
//!
//! Read from `DEVCHAIN_CONFIG` if set, else the first of
//! `~/.config/devchain/config.toml`, `/etc/devchain/config.toml` and
//! `./devchain.toml`. `DEVCHAIN_*` variables override file values, and
//! `RUST_LOG` overrides the configured log level.

use devchain::api::{serve, AppState};
use devchain::cloud::{AtlasClient, CloudMirror};
use devchain::config::Config;
use devchain::events::{EventHub, HubConfig};
use devchain::ledger::{HederaGateway, LedgerService};
use devchain::logging::init_logging;
use devchain::notify::build_notifier;
use devchain::scheduler::Scheduler;
use devchain::storage::{open_store, Repository};
use devchain::tracker::Tracker;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::var("DEVCHAIN_CONFIG") {
        Ok(path) => Config::load_with_env(&PathBuf::from(path))?,
        Err(_) => Config::load_default(),
    };

    init_logging(&config.logging)?;

    tracing::info!("Starting DevChain API server v{}", env!("CARGO_PKG_VERSION"));

    // Storage
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let store = open_store(&config.storage.backend, &data_dir)?;
    tracing::info!(backend = store.backend_name(), data_dir = ?data_dir, "Storage ready");

    // Ledger
    let ledger = if config.ledger.enabled {
        let gateway = HederaGateway::new(config.ledger.gateway_config())?;
        tracing::info!(
            network = %config.ledger.network,
            fallback = config.ledger.allow_local_fallback,
            "Ledger enabled"
        );
        LedgerService::new(Arc::new(gateway), config.ledger.settings())
    } else {
        tracing::info!("Ledger disabled (set ledger.enabled to record entries on Hedera)");
        LedgerService::disabled()
    };

    let notifier = build_notifier(&config.notifications)?;

    // Cloud mirror
    let cloud = match config.cloud.atlas_config() {
        Some(atlas) => {
            tracing::info!(database = %atlas.database, "Cloud mirror enabled");
            Some(Arc::new(CloudMirror::new(AtlasClient::new(atlas)?)))
        }
        None => None,
    };

    let events = Arc::new(EventHub::new(HubConfig::default()));

    let tracker = Arc::new(Tracker::new(
        Arc::clone(&store),
        Arc::new(ledger),
        Arc::clone(&notifier),
        cloud,
        Arc::clone(&events),
    ));

    let mut state = AppState::new(Arc::clone(&tracker), config.api.clone());

    // Scheduler
    let scheduler = if config.scheduler.enabled {
        let scheduler = Arc::new(Scheduler::new(
            Repository::new(Arc::clone(&store)),
            notifier,
            events,
            config.scheduler.clone(),
        )?);
        tracing::info!(
            interval_secs = config.scheduler.check_interval_secs,
            digest = %config.scheduler.digest_weekday,
            "Starting reminder scheduler"
        );
        Arc::clone(&scheduler).start();
        state = state.with_scheduler(Arc::clone(&scheduler));
        Some(scheduler)
    } else {
        tracing::info!("Scheduler disabled");
        None
    };

    // Run server
    serve(state, &config.api).await?;

    // Graceful shutdown
    if let Some(scheduler) = scheduler {
        tracing::info!("Stopping scheduler...");
        scheduler.stop().await;
    }
    tracing::info!("DevChain API server stopped");

    Ok(())
}
