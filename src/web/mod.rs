//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::orchestrator::Orchestrator;
use crate::proxy::ProxySupervisor;
use crate::scheduler::RotationScheduler;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<RotationScheduler>,
    pub supervisor: Arc<ProxySupervisor>,
}

/// Web server for modemdash.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(
        config: ServerConfig,
        store: Arc<Store>,
        orchestrator: Arc<Orchestrator>,
        scheduler: Arc<RotationScheduler>,
        supervisor: Arc<ProxySupervisor>,
    ) -> Self {
        Self {
            state: AppState {
                config,
                store,
                orchestrator,
                scheduler,
                supervisor,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            // Modem CRUD
            .route(
                "/api/modems",
                get(handlers::handle_get_modems).post(handlers::handle_create_modem),
            )
            .route(
                "/api/modems/{id}",
                get(handlers::handle_get_modem)
                    .put(handlers::handle_update_modem)
                    .delete(handlers::handle_delete_modem),
            )
            // Modem operations
            .route("/api/modems/{id}/status", get(handlers::handle_modem_status))
            .route("/api/modems/{id}/rotate-ip", post(handlers::handle_rotate_ip))
            .route("/api/modems/{id}/reboot", post(handlers::handle_reboot))
            .route(
                "/api/modems/{id}/assign-ports",
                post(handlers::handle_assign_ports),
            )
            // Proxy configurations
            .route(
                "/api/proxy-configs",
                get(handlers::handle_get_proxy_configs),
            )
            .route(
                "/api/proxy-configs/{id}",
                get(handlers::handle_get_proxy_config)
                    .put(handlers::handle_update_proxy_config)
                    .delete(handlers::handle_delete_proxy_config),
            )
            // Logs
            .route("/api/rotation-logs", get(handlers::handle_rotation_logs))
            .route("/api/logs", get(handlers::handle_system_logs))
            // Proxy daemon management
            .route("/api/proxy/status", get(handlers::handle_proxy_status))
            .route("/api/proxy/start", post(handlers::handle_proxy_start))
            .route("/api/proxy/stop", post(handlers::handle_proxy_stop))
            .route("/api/proxy/restart", post(handlers::handle_proxy_restart))
            .route("/api/proxy/logs", get(handlers::handle_proxy_logs))
            .route("/api/proxy/test", post(handlers::handle_proxy_test))
            // OpenVPN profiles
            .route(
                "/download/openvpn/{filename}",
                get(handlers::handle_openvpn_download),
            )
            .layer(cors)
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let orchestrator = self.state.orchestrator.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(orchestrator))
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(orchestrator: Arc<Orchestrator>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    // Abandon in-flight rotations so settle waits do not hold up exit.
    orchestrator.shutdown();
}
