pub mod bridge;
pub mod cli;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod device;
pub mod render;
pub mod state;

use crate::bridge::{BridgeSession, SessionSettings};
use crate::cli::Options;
use crate::config::BridgeConfig;
use crate::device::{connect_with_timeout, DeviceLink, SimulatedConnector};
use crate::render::{FrameScheduler, OrientationConsumer, TransformNode};
use crate::state::OrientationStore;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::parse();
    setup(options.log_level())?;

    let mut config = BridgeConfig::load(options.config.as_deref())
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))?;
    if let Some(model) = &options.model {
        config.render.model = model.clone();
    }
    if let Some(scale) = options.scale {
        config.render.scale = scale;
    }
    config
        .validate()
        .map_err(|e| eyre!("Invalid config: {}", e))?;
    debug!("Effective config: {:?}", config);

    let store = Arc::new(OrientationStore::new());

    // Connect
    let connector = SimulatedConnector::new(config.simulation.clone());
    let link = connect_with_timeout(&connector, config.link.connect_timeout_ms)
        .await
        .map_err(|e| eyre!("Failed to connect to cube: {}", e))?;
    let link: Arc<dyn DeviceLink> = Arc::new(link);

    let session = BridgeSession::create(link, store.clone(), SessionSettings::from(&config))
        .start()
        .await
        .map_err(|e| eyre!("Failed to start session: {}", e))?;

    if options.dry_run {
        info!("Dry run, tearing down without streaming");
        session
            .shutdown()
            .await
            .map_err(|e| eyre!("Teardown failed: {}", e))?;
        return Ok(());
    }

    // Scene
    let node = TransformNode::new("cube", config.render.model.clone(), config.render.scale);
    info!(
        "Scene node '{}' uses model {} at scale {}",
        node.name(),
        node.model().display(),
        node.scale()
    );
    let mut scheduler = FrameScheduler::new();
    scheduler.add(Box::new(OrientationConsumer::new(store, node)));

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal.cancel();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });

    let report = session
        .run(&mut scheduler, shutdown, options.frames)
        .await
        .map_err(|e| eyre!("Session failed: {}", e))?;
    info!(
        "Rendered {} frames with {} mode switches",
        report.frames, report.switches
    );

    Ok(())
}

fn setup(level: Level) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(level);
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
