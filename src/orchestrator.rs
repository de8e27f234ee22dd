//! Orchestration of modem and proxy operations.
//!
//! Carries out the request choreography around the hardware drivers:
//! pick a controller, run the operation, persist the attempt and its
//! outcome, reconcile the modem record, and refresh the proxy daemon when
//! port topology changed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::db::{modem_status, DbError, IpRotationLog, Modem, ProxyConfig, Store, SystemLog};
use crate::modem::{controller_for, ModemStatus, RotationError};
use crate::proxy::{ProxySupervisor, SupervisorError};
use crate::vpn;

/// Orchestrator error types.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("modem not found")]
    ModemNotFound,
    #[error("port {0} is already assigned to an active proxy configuration")]
    PortInUse(u16),
    #[error("authentication requires a username and password")]
    MissingCredentials,
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Outcome of a rotation request, as reported to API clients and logs.
#[derive(Debug, Clone, Serialize)]
pub struct RotationReport {
    pub success: bool,
    pub old_ip: Option<String>,
    pub new_ip: Option<String>,
    pub error: Option<String>,
}

/// Outcome of a reboot request.
#[derive(Debug, Clone, Serialize)]
pub struct RebootReport {
    pub success: bool,
    pub error: Option<String>,
}

/// Port assignment request.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignPortsRequest {
    pub http_port: u16,
    pub socks_port: u16,
    #[serde(default)]
    pub authentication: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Port assignment result.
#[derive(Debug, Clone, Serialize)]
pub struct AssignPortsResponse {
    pub proxy_config: ProxyConfig,
    pub openvpn_config_url: String,
}

/// Drives modem controllers and the proxy supervisor on behalf of the API.
pub struct Orchestrator {
    store: Arc<Store>,
    supervisor: Arc<ProxySupervisor>,
    shutdown: broadcast::Sender<()>,
}

impl Orchestrator {
    pub fn new(store: Arc<Store>, supervisor: Arc<ProxySupervisor>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            store,
            supervisor,
            shutdown,
        }
    }

    /// Signal shutdown: in-flight rotations abandon their settle waits.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    fn get_modem(&self, id: i64) -> Result<Modem, OrchestratorError> {
        self.store.get_modem(id).map_err(|e| match e {
            DbError::NotFound => OrchestratorError::ModemNotFound,
            other => OrchestratorError::Db(other),
        })
    }

    /// Rotate a modem's carrier-assigned IP and persist the attempt.
    pub async fn rotate_modem_ip(&self, id: i64) -> Result<RotationReport, OrchestratorError> {
        let modem = self.get_modem(id)?;
        let controller = controller_for(&modem);

        let result = controller.rotate_ip(self.shutdown.subscribe()).await;

        let report = match &result {
            Ok(rotation) => RotationReport {
                success: true,
                old_ip: rotation.old_ip.clone(),
                new_ip: Some(rotation.new_ip.clone()),
                error: None,
            },
            Err(e) => RotationReport {
                success: false,
                old_ip: None,
                new_ip: None,
                error: Some(e.to_string()),
            },
        };

        let mut rotation_log = IpRotationLog {
            id: 0,
            modem_id: Some(id),
            old_ip: report.old_ip.clone(),
            new_ip: report.new_ip.clone(),
            success: report.success,
            error: report.error.clone(),
            rotated_at: chrono::Utc::now(),
        };
        self.store.add_rotation_log(&mut rotation_log)?;

        self.log_event(
            if report.success { "info" } else { "error" },
            format!(
                "IP rotation {} for modem {}",
                if report.success { "successful" } else { "failed" },
                modem.name
            ),
            report.error.clone(),
            "modem-controller",
            Some(id),
        )?;

        match &result {
            Ok(rotation) => {
                self.store.set_modem_public_ip(id, &rotation.new_ip)?;
            }
            Err(RotationError::ReconnectFailedMidway) => {
                // The modem was taken off-carrier and never confirmed a
                // reconnect. Surface the ambiguous hardware state instead
                // of leaving the previous status standing.
                self.store.set_modem_status(id, modem_status::ERROR)?;
                self.log_event(
                    "error",
                    format!(
                        "Modem {} left in unknown state after failed reconnect; operator attention required",
                        modem.name
                    ),
                    None,
                    "modem-controller",
                    Some(id),
                )?;
            }
            Err(_) => {}
        }

        Ok(report)
    }

    /// Reboot a modem. The record transitions to `rebooting` before the
    /// hardware command and is reconciled afterward.
    pub async fn reboot_modem(&self, id: i64) -> Result<RebootReport, OrchestratorError> {
        let modem = self.get_modem(id)?;

        self.store.set_modem_status(id, modem_status::REBOOTING)?;

        let controller = controller_for(&modem);
        let result = controller.reboot().await;

        let report = match &result {
            Ok(()) => RebootReport {
                success: true,
                error: None,
            },
            Err(e) => RebootReport {
                success: false,
                error: Some(e.to_string()),
            },
        };

        self.log_event(
            if report.success { "info" } else { "error" },
            format!(
                "Modem reboot {} for {}",
                if report.success { "initiated" } else { "failed" },
                modem.name
            ),
            report.error.clone(),
            "modem-controller",
            Some(id),
        )?;

        if report.success {
            self.store.set_modem_last_reboot(id)?;
        } else {
            self.store.set_modem_status(id, modem_status::ERROR)?;
        }

        Ok(report)
    }

    /// Assign proxy ports to a modem: create the configuration record,
    /// publish the OpenVPN profile location, and push the new topology to
    /// the proxy daemon.
    pub async fn assign_ports(
        &self,
        id: i64,
        req: AssignPortsRequest,
    ) -> Result<AssignPortsResponse, OrchestratorError> {
        let modem = self.get_modem(id)?;

        if req.authentication
            && (req.username.as_deref().unwrap_or("").is_empty()
                || req.password.as_deref().unwrap_or("").is_empty())
        {
            return Err(OrchestratorError::MissingCredentials);
        }

        if req.http_port == req.socks_port {
            return Err(OrchestratorError::PortInUse(req.socks_port));
        }
        let active = self.store.get_active_proxy_configs()?;
        for existing in &active {
            for port in [req.http_port, req.socks_port] {
                if existing.http_port == port || existing.socks_port == port {
                    return Err(OrchestratorError::PortInUse(port));
                }
            }
        }

        let mut config = ProxyConfig {
            modem_id: Some(id),
            http_port: req.http_port,
            socks_port: req.socks_port,
            authentication: req.authentication,
            username: req.username,
            password: req.password,
            is_active: true,
            ..Default::default()
        };
        self.store.add_proxy_config(&mut config)?;

        let filename = vpn::profile_filename(&modem);
        let openvpn_config_path = format!("/configs/openvpn/{filename}");
        let openvpn_config_url = format!("/download/openvpn/{filename}");
        self.store
            .set_modem_ports_assigned(id, &openvpn_config_path, &openvpn_config_url)?;

        self.reload_proxy().await?;

        self.log_event(
            "info",
            format!(
                "Ports assigned to {} - HTTP: {}, SOCKS: {}",
                modem.name, req.http_port, req.socks_port
            ),
            Some(format!(
                "OpenVPN config available at: {openvpn_config_url}. 3proxy updated with new configuration."
            )),
            "modem-management",
            Some(id),
        )?;

        Ok(AssignPortsResponse {
            proxy_config: config,
            openvpn_config_url,
        })
    }

    /// Query a modem's live status and copy the snapshot onto the record.
    pub async fn refresh_modem_status(&self, id: i64) -> Result<ModemStatus, OrchestratorError> {
        let mut modem = self.get_modem(id)?;
        let controller = controller_for(&modem);
        let status = controller.status().await;

        modem.status = if status.connected {
            modem_status::CONNECTED
        } else {
            modem_status::DISCONNECTED
        }
        .to_string();
        modem.signal_strength = Some(status.signal_strength);
        modem.download_speed = Some(status.download_speed);
        modem.upload_speed = Some(status.upload_speed);
        modem.connection_type = Some(status.connection_type.clone());
        modem.provider = Some(status.provider.clone());
        modem.firmware = Some(status.firmware.clone());
        if status.connected {
            if let Some(ip) = &status.public_ip {
                modem.public_ip = Some(ip.clone());
            }
            modem.last_seen = Some(chrono::Utc::now());
        }
        self.store.update_modem(&modem)?;

        Ok(status)
    }

    /// Push the current modem/port topology to the proxy daemon.
    pub async fn reload_proxy(&self) -> Result<(), OrchestratorError> {
        let modems = self.store.get_modems()?;
        let configs = self.store.get_proxy_configs()?;
        self.supervisor.update_configuration(&modems, &configs).await?;
        Ok(())
    }

    fn log_event(
        &self,
        level: &str,
        message: String,
        details: Option<String>,
        source: &str,
        source_id: Option<i64>,
    ) -> Result<(), DbError> {
        let mut log = SystemLog {
            id: 0,
            level: level.to_string(),
            message,
            details,
            source: Some(source.to_string()),
            source_id,
            created_at: chrono::Utc::now(),
        };
        self.store.add_system_log(&mut log)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProxyPaths;

    fn harness() -> (tempfile::TempDir, Arc<Store>, Orchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::new(dir.path().join("test.db")).unwrap());
        // "true" exits immediately, which is all these tests need from the
        // daemon binary.
        let supervisor = Arc::new(ProxySupervisor::new(
            "true",
            ProxyPaths::new(dir.path().join("3proxy")),
        ));
        let orchestrator = Orchestrator::new(store.clone(), supervisor);
        (dir, store, orchestrator)
    }

    fn simulated_modem(store: &Store) -> Modem {
        let mut modem = Modem {
            name: "sim-1".to_string(),
            imei: "356938035643809".to_string(),
            public_ip: Some("203.0.113.45".to_string()),
            status: modem_status::CONNECTED.to_string(),
            model: "simulated".to_string(),
            ..Default::default()
        };
        store.add_modem(&mut modem).unwrap();
        modem
    }

    #[tokio::test]
    async fn test_rotate_choreography_persists_logs_and_ip() {
        let (_dir, store, orchestrator) = harness();
        let modem = simulated_modem(&store);

        let report = orchestrator.rotate_modem_ip(modem.id).await.unwrap();

        assert!(report.success);
        assert_eq!(report.old_ip.as_deref(), Some("203.0.113.45"));
        let new_ip = report.new_ip.clone().unwrap();
        assert!(new_ip.starts_with("203.0.113."));
        assert_ne!(new_ip, "203.0.113.45");

        // Rotation log written exactly once, success recorded.
        let logs = store.get_rotation_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].success);
        assert_eq!(logs[0].new_ip.as_deref(), Some(new_ip.as_str()));

        // System log entry present.
        let sys = store.get_system_logs(10).unwrap();
        assert_eq!(sys.len(), 1);
        assert_eq!(sys[0].level, "info");

        // Modem record updated with the new IP and a last-seen bump.
        let updated = store.get_modem(modem.id).unwrap();
        assert_eq!(updated.public_ip.as_deref(), Some(new_ip.as_str()));
        assert!(updated.last_seen.is_some());
    }

    #[tokio::test]
    async fn test_rotate_unknown_modem() {
        let (_dir, _store, orchestrator) = harness();
        let err = orchestrator.rotate_modem_ip(42).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ModemNotFound));
    }

    #[tokio::test]
    async fn test_reboot_choreography() {
        let (_dir, store, orchestrator) = harness();
        let modem = simulated_modem(&store);

        let report = orchestrator.reboot_modem(modem.id).await.unwrap();
        assert!(report.success);

        let updated = store.get_modem(modem.id).unwrap();
        assert_eq!(updated.status, modem_status::REBOOTING);
        assert!(updated.last_reboot.is_some());

        let sys = store.get_system_logs(10).unwrap();
        assert!(sys[0].message.contains("reboot initiated"));
    }

    #[tokio::test]
    async fn test_assign_ports_choreography() {
        let (dir, store, orchestrator) = harness();
        let modem = simulated_modem(&store);

        let response = orchestrator
            .assign_ports(
                modem.id,
                AssignPortsRequest {
                    http_port: 51001,
                    socks_port: 51002,
                    authentication: false,
                    username: None,
                    password: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(response.proxy_config.http_port, 51001);
        assert!(response
            .openvpn_config_url
            .ends_with("sim-1-356938035643809.ovpn"));

        let updated = store.get_modem(modem.id).unwrap();
        assert!(updated.ports_assigned);
        assert!(updated.openvpn_config_path.is_some());

        // The supervisor wrote a config covering the new listeners.
        let written =
            std::fs::read_to_string(dir.path().join("3proxy").join("3proxy.cfg")).unwrap();
        assert!(written.contains("proxy -p51001"));
        assert!(written.contains("socks -p51002"));
    }

    #[tokio::test]
    async fn test_assign_ports_rejects_duplicates_and_bad_auth() {
        let (_dir, store, orchestrator) = harness();
        let modem = simulated_modem(&store);

        orchestrator
            .assign_ports(
                modem.id,
                AssignPortsRequest {
                    http_port: 51001,
                    socks_port: 51002,
                    authentication: false,
                    username: None,
                    password: None,
                },
            )
            .await
            .unwrap();

        let err = orchestrator
            .assign_ports(
                modem.id,
                AssignPortsRequest {
                    http_port: 51001,
                    socks_port: 51003,
                    authentication: false,
                    username: None,
                    password: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::PortInUse(51001)));

        let err = orchestrator
            .assign_ports(
                modem.id,
                AssignPortsRequest {
                    http_port: 51010,
                    socks_port: 51011,
                    authentication: true,
                    username: Some("u".to_string()),
                    password: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_refresh_status_with_simulated_modem() {
        let (_dir, store, orchestrator) = harness();
        let modem = simulated_modem(&store);

        let status = orchestrator.refresh_modem_status(modem.id).await.unwrap();
        assert!(status.connected);

        let updated = store.get_modem(modem.id).unwrap();
        assert_eq!(updated.status, modem_status::CONNECTED);
        assert_eq!(updated.signal_strength, Some(-70));
        assert!(updated.last_seen.is_some());
    }
}
