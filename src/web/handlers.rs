//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, Modem};
use crate::orchestrator::{AssignPortsRequest, OrchestratorError};
use crate::vpn;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};

fn db_error(e: DbError) -> (StatusCode, String) {
    match e {
        DbError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn orchestrator_error(e: OrchestratorError) -> (StatusCode, String) {
    match e {
        OrchestratorError::ModemNotFound => (StatusCode::NOT_FOUND, e.to_string()),
        OrchestratorError::PortInUse(_) | OrchestratorError::MissingCredentials => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

// ============================================================================
// API: Modems
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ModemRequest {
    pub name: String,
    pub imei: String,
    #[serde(default)]
    pub local_ip: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub auto_ip_rotation: Option<bool>,
    #[serde(default)]
    pub ip_rotation_interval: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ModemRequest {
    fn apply(self, modem: &mut Modem) {
        modem.name = self.name;
        modem.imei = self.imei;
        if let Some(local_ip) = self.local_ip {
            modem.local_ip = local_ip;
        }
        if let Some(model) = self.model {
            modem.model = model;
        }
        if let Some(user) = self.admin_username {
            modem.admin_username = user;
        }
        if let Some(pass) = self.admin_password {
            modem.admin_password = pass;
        }
        if let Some(auto) = self.auto_ip_rotation {
            modem.auto_ip_rotation = auto;
        }
        if let Some(interval) = self.ip_rotation_interval {
            modem.ip_rotation_interval = interval;
        }
        if let Some(active) = self.is_active {
            modem.is_active = active;
        }
    }
}

pub async fn handle_get_modems(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_modems() {
        Ok(modems) => Json(modems).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

pub async fn handle_get_modem(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_modem(id) {
        Ok(modem) => Json(modem).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

pub async fn handle_create_modem(
    State(state): State<AppState>,
    Json(req): Json<ModemRequest>,
) -> impl IntoResponse {
    let mut modem = Modem::default();
    req.apply(&mut modem);

    match state.store.add_modem(&mut modem) {
        Ok(_) => {
            state.scheduler.add_modem(&modem).await;
            Json(modem).into_response()
        }
        Err(e) => db_error(e).into_response(),
    }
}

pub async fn handle_update_modem(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ModemRequest>,
) -> impl IntoResponse {
    let mut modem = match state.store.get_modem(id) {
        Ok(m) => m,
        Err(e) => return db_error(e).into_response(),
    };
    req.apply(&mut modem);

    match state.store.update_modem(&modem) {
        Ok(_) => {
            state.scheduler.sync_modem(&modem).await;
            Json(modem).into_response()
        }
        Err(e) => db_error(e).into_response(),
    }
}

pub async fn handle_delete_modem(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    state.scheduler.remove_modem(id).await;

    match state.store.delete_modem(id) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

// ============================================================================
// API: Modem operations
// ============================================================================

pub async fn handle_modem_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.orchestrator.refresh_modem_status(id).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => orchestrator_error(e).into_response(),
    }
}

pub async fn handle_rotate_ip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.orchestrator.rotate_modem_ip(id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => orchestrator_error(e).into_response(),
    }
}

pub async fn handle_reboot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.orchestrator.reboot_modem(id).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => orchestrator_error(e).into_response(),
    }
}

pub async fn handle_assign_ports(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AssignPortsRequest>,
) -> impl IntoResponse {
    match state.orchestrator.assign_ports(id, req).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => orchestrator_error(e).into_response(),
    }
}

// ============================================================================
// API: Proxy configurations
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProxyConfigUpdate {
    #[serde(default)]
    pub http_port: Option<u16>,
    #[serde(default)]
    pub socks_port: Option<u16>,
    #[serde(default)]
    pub authentication: Option<bool>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub max_connections: Option<i64>,
    #[serde(default)]
    pub connection_timeout: Option<i64>,
    #[serde(default)]
    pub allowed_ips: Option<Vec<String>>,
    #[serde(default)]
    pub blocked_ips: Option<Vec<String>>,
    #[serde(default)]
    pub bandwidth_limit: Option<i64>,
    #[serde(default)]
    pub daily_traffic_limit: Option<i64>,
    #[serde(default)]
    pub protocol: Option<String>,
}

pub async fn handle_get_proxy_configs(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.get_proxy_configs() {
        Ok(configs) => Json(configs).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

pub async fn handle_get_proxy_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match state.store.get_proxy_config(id) {
        Ok(config) => Json(config).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

pub async fn handle_update_proxy_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ProxyConfigUpdate>,
) -> impl IntoResponse {
    let mut config = match state.store.get_proxy_config(id) {
        Ok(c) => c,
        Err(e) => return db_error(e).into_response(),
    };

    if let Some(port) = req.http_port {
        config.http_port = port;
    }
    if let Some(port) = req.socks_port {
        config.socks_port = port;
    }
    if let Some(auth) = req.authentication {
        config.authentication = auth;
    }
    if req.username.is_some() {
        config.username = req.username;
    }
    if req.password.is_some() {
        config.password = req.password;
    }
    if let Some(active) = req.is_active {
        config.is_active = active;
    }
    if req.max_connections.is_some() {
        config.max_connections = req.max_connections;
    }
    if req.connection_timeout.is_some() {
        config.connection_timeout = req.connection_timeout;
    }
    if let Some(ips) = req.allowed_ips {
        config.allowed_ips = ips;
    }
    if let Some(ips) = req.blocked_ips {
        config.blocked_ips = ips;
    }
    if req.bandwidth_limit.is_some() {
        config.bandwidth_limit = req.bandwidth_limit;
    }
    if req.daily_traffic_limit.is_some() {
        config.daily_traffic_limit = req.daily_traffic_limit;
    }
    if req.protocol.is_some() {
        config.protocol = req.protocol;
    }

    if let Err(e) = state.store.update_proxy_config(&config) {
        return db_error(e).into_response();
    }
    // Port or filter changes only become live through a full regenerate.
    match state.orchestrator.reload_proxy().await {
        Ok(()) => Json(config).into_response(),
        Err(e) => orchestrator_error(e).into_response(),
    }
}

pub async fn handle_delete_proxy_config(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    if let Err(e) = state.store.delete_proxy_config(id) {
        return db_error(e).into_response();
    }
    match state.orchestrator.reload_proxy().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => orchestrator_error(e).into_response(),
    }
}

// ============================================================================
// API: Logs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn handle_rotation_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    match state.store.get_rotation_logs(query.limit.unwrap_or(100)) {
        Ok(logs) => Json(logs).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

pub async fn handle_system_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    match state.store.get_system_logs(query.limit.unwrap_or(100)) {
        Ok(logs) => Json(logs).into_response(),
        Err(e) => db_error(e).into_response(),
    }
}

// ============================================================================
// API: Proxy daemon
// ============================================================================

pub async fn handle_proxy_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.supervisor.status().await)
}

pub async fn handle_proxy_start(State(state): State<AppState>) -> impl IntoResponse {
    match state.supervisor.start().await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub async fn handle_proxy_stop(State(state): State<AppState>) -> impl IntoResponse {
    state.supervisor.stop().await;
    Json(serde_json::json!({"success": true}))
}

pub async fn handle_proxy_restart(State(state): State<AppState>) -> impl IntoResponse {
    match state.supervisor.restart().await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyLogsQuery {
    #[serde(default)]
    pub lines: Option<usize>,
}

pub async fn handle_proxy_logs(
    State(state): State<AppState>,
    Query(query): Query<ProxyLogsQuery>,
) -> impl IntoResponse {
    state.supervisor.logs(query.lines.unwrap_or(100)).await
}

#[derive(Debug, Deserialize)]
pub struct TestProxyRequest {
    pub port: u16,
    pub protocol: String,
}

#[derive(Debug, Serialize)]
pub struct TestProxyResponse {
    pub success: bool,
}

pub async fn handle_proxy_test(
    State(state): State<AppState>,
    Json(req): Json<TestProxyRequest>,
) -> impl IntoResponse {
    let success = state.supervisor.test_proxy(req.port, &req.protocol).await;
    Json(TestProxyResponse { success })
}

// ============================================================================
// OpenVPN profile download
// ============================================================================

pub async fn handle_openvpn_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    // Profile names are "<name>-<imei>.ovpn"; the IMEI is digits only, so
    // splitting on the last dash survives dashes in modem names.
    let Some((name, imei)) = filename
        .strip_suffix(".ovpn")
        .and_then(|stem| stem.rsplit_once('-'))
    else {
        return (StatusCode::NOT_FOUND, "OpenVPN configuration not found").into_response();
    };

    let modem = match state.store.get_modem_by_name(name) {
        Ok(m) => m,
        Err(_) => {
            return (StatusCode::NOT_FOUND, "OpenVPN configuration not found").into_response()
        }
    };
    if modem.imei != imei || modem.openvpn_config_path.is_none() {
        return (StatusCode::NOT_FOUND, "OpenVPN configuration not found").into_response();
    }

    let profile = vpn::client_profile(&modem);
    (
        [
            (header::CONTENT_TYPE, "application/x-openvpn-profile".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        profile,
    )
        .into_response()
}
