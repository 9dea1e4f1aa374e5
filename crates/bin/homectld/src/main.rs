//! # homectld — homectl daemon
//!
//! Composition root that wires the hub together and runs it.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Fill the integration registry with every built-in plugin
//! - Construct the hub, then register and start its subsystems
//! - Run until SIGINT or a fatal bus error, then stop every subsystem
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use anyhow::Context;
use homectl_app::hub::Hub;
use homectl_app::registry::IntegrationRegistry;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let registry = homectl_adapter_virtual::register(IntegrationRegistry::new());
    tracing::debug!(
        plugins = ?registry.identifiers().collect::<Vec<_>>(),
        "integration registry ready"
    );

    let hub = Hub::new(config.hub_config(), &registry).context("building hub")?;
    hub.start().await.context("starting hub")?;

    let fatal = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for shutdown signal")?;
            tracing::info!("shutdown signal received");
            None
        }
        fatal = hub.wait_fatal() => fatal,
    };

    hub.shutdown().await;

    match fatal {
        Some(message) => anyhow::bail!("fatal bus error: {message}"),
        None => Ok(()),
    }
}
