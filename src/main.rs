//! modemdash - 4G proxy farm management daemon
//!
//! Drives a fleet of LTE modems (status, IP rotation, reboot) and keeps the
//! external 3proxy daemon in sync with modem/port assignments.

mod config;
mod db;
mod modem;
mod orchestrator;
mod proxy;
mod scheduler;
mod vpn;
mod web;

use config::ServerConfig;
use db::Store;
use orchestrator::Orchestrator;
use proxy::{ProxyPaths, ProxySupervisor};
use scheduler::RotationScheduler;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("modemdash=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting modemdash on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Proxy daemon supervisor
    let supervisor = Arc::new(ProxySupervisor::new(
        cfg.proxy_bin.clone(),
        ProxyPaths::new(cfg.proxy_dir.clone()),
    ));

    // Orchestrator and auto-rotation scheduler
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), supervisor.clone()));
    let scheduler = Arc::new(RotationScheduler::new(store.clone(), orchestrator.clone()));
    scheduler.start().await?;

    // Start web server
    let server = Server::new(cfg, store, orchestrator, scheduler, supervisor);
    server.start().await?;

    Ok(())
}
