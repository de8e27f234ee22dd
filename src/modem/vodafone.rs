//! Vodafone M300z (ZTE-based) modem driver.
//!
//! Talks to the modem's local management interface over HTTP with Basic
//! Auth. Endpoint paths vary across firmware revisions, so every operation
//! probes an ordered candidate list (see `probe`).

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;

use super::parser::parse_status;
use super::probe::{try_in_order, ProbeError};
use super::{settle, ModemStatus, RebootError, Rotation, RotationError};
use crate::db::Modem;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const STATUS_ENDPOINTS: &[&str] = &[
    "/api/device/information",
    "/api/device/status",
    "/api/system/status",
    "/goform/goform_get_status",
    "/api/monitoring/status",
];

fn disconnect_commands() -> Vec<(&'static str, Value)> {
    vec![
        ("/api/dialup/mobile_connect", json!({"Action": 0})),
        (
            "/goform/goform_set_cmd_process",
            json!({"isTest": "false", "goformId": "DISCONNECT_NETWORK"}),
        ),
        ("/api/net/disconnect", json!({})),
        ("/api/connection/disconnect", json!({})),
    ]
}

fn connect_commands() -> Vec<(&'static str, Value)> {
    vec![
        ("/api/dialup/mobile_connect", json!({"Action": 1})),
        (
            "/goform/goform_set_cmd_process",
            json!({"isTest": "false", "goformId": "CONNECT_NETWORK"}),
        ),
        ("/api/net/connect", json!({})),
        ("/api/connection/connect", json!({})),
    ]
}

fn reboot_commands() -> Vec<(&'static str, Value)> {
    vec![
        ("/api/device/control", json!({"Control": 1})),
        ("/api/system/reboot", json!({})),
        (
            "/goform/goform_set_cmd_process",
            json!({"isTest": "false", "goformId": "REBOOT_DEVICE"}),
        ),
        ("/api/device/reboot", json!({})),
        ("/api/management/reboot", json!({})),
    ]
}

/// Fixed settle delays modeling carrier-side session state updates.
#[derive(Debug, Clone, Copy)]
pub struct RotationTiming {
    /// Wait after a successful disconnect, before reconnecting.
    pub disconnect_settle: Duration,
    /// Wait after reconnect, for the carrier to assign an IP.
    pub ip_assign_settle: Duration,
}

impl Default for RotationTiming {
    fn default() -> Self {
        Self {
            disconnect_settle: Duration::from_secs(5),
            ip_assign_settle: Duration::from_secs(15),
        }
    }
}

/// Driver for the Vodafone M300z management interface.
pub struct VodafoneM300z {
    name: String,
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
    timing: RotationTiming,
}

impl VodafoneM300z {
    pub fn new(modem: &Modem) -> Self {
        Self::with_timing(modem, RotationTiming::default())
    }

    /// Construct with explicit settle delays. Tests use zero waits.
    pub fn with_timing(modem: &Modem, timing: RotationTiming) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: modem.name.clone(),
            base_url: format!("http://{}", modem.local_ip),
            username: modem.admin_username.clone(),
            password: modem.admin_password.clone(),
            client,
            timing,
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, ProbeError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?
            .error_for_status()?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProbeError::EmptyBody);
        }
        // Firmware that answers with non-JSON still counts as data; the
        // parser degrades it to defaults.
        Ok(serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn post_command(&self, path: &'static str, body: Value) -> Result<(), ProbeError> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Query modem status. Never fails: no readable status endpoint
    /// degrades to a default snapshot if the modem is reachable at all,
    /// and to the unreachable sentinel otherwise.
    pub async fn status(&self) -> ModemStatus {
        let attempts: Vec<_> = STATUS_ENDPOINTS
            .iter()
            .map(|path| self.get_json(path))
            .collect();
        match try_in_order(attempts).await {
            Ok(data) => parse_status(&data),
            Err(_) => {
                // No status endpoint answered; a bare root request still
                // separates reachable from dead.
                let root = self
                    .client
                    .get(format!("{}/", self.base_url))
                    .basic_auth(&self.username, Some(&self.password))
                    .send()
                    .await
                    .and_then(|r| r.error_for_status());
                match root {
                    Ok(_) => ModemStatus::reachable_default(),
                    Err(e) => {
                        tracing::warn!("modem {} unreachable: {}", self.name, e);
                        ModemStatus::unreachable()
                    }
                }
            }
        }
    }

    /// Rotate the carrier-assigned IP by tearing down and re-establishing
    /// the cellular session.
    pub async fn rotate_ip(
        &self,
        mut stop: broadcast::Receiver<()>,
    ) -> Result<Rotation, RotationError> {
        let old_ip = self.status().await.public_ip;

        let disconnects: Vec<_> = disconnect_commands()
            .into_iter()
            .map(|(path, body)| self.post_command(path, body))
            .collect();
        if try_in_order(disconnects).await.is_err()
        {
            return Err(RotationError::Disconnect);
        }
        tracing::info!("modem {}: disconnected from carrier", self.name);

        settle(self.timing.disconnect_settle, &mut stop)
            .await
            .map_err(|_| RotationError::Cancelled)?;

        let connects: Vec<_> = connect_commands()
            .into_iter()
            .map(|(path, body)| self.post_command(path, body))
            .collect();
        if try_in_order(connects).await.is_err()
        {
            // Disconnect went through but reconnect did not: the modem is
            // off-carrier in an unknown state until an operator intervenes.
            return Err(RotationError::ReconnectFailedMidway);
        }
        tracing::info!("modem {}: reconnected to carrier", self.name);

        settle(self.timing.ip_assign_settle, &mut stop)
            .await
            .map_err(|_| RotationError::Cancelled)?;

        match self.status().await.public_ip {
            Some(new_ip) if Some(&new_ip) != old_ip.as_ref() => Ok(Rotation { old_ip, new_ip }),
            Some(_) => Err(RotationError::SameIp),
            None => Err(RotationError::NoNewIp),
        }
    }

    /// Reboot the modem through the first reboot endpoint that accepts the
    /// command.
    pub async fn reboot(&self) -> Result<(), RebootError> {
        let reboots: Vec<_> = reboot_commands()
            .into_iter()
            .map(|(path, body)| self.post_command(path, body))
            .collect();
        try_in_order(reboots)
            .await
            .map_err(|_| RebootError::NoEndpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn modem_for(server: &MockServer) -> Modem {
        Modem {
            name: "test-modem".to_string(),
            imei: "356938035643809".to_string(),
            local_ip: server.address().to_string(),
            ..Default::default()
        }
    }

    fn zero_timing() -> RotationTiming {
        RotationTiming {
            disconnect_settle: Duration::ZERO,
            ip_assign_settle: Duration::ZERO,
        }
    }

    fn stop_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
        broadcast::channel(1)
    }

    #[tokio::test]
    async fn test_status_first_responding_endpoint_wins() {
        let server = MockServer::start().await;

        // First two candidates 404 (unmatched); the third responds.
        Mock::given(method("GET"))
            .and(path("/api/system/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "SignalStrength": -61,
                "WanIPAddress": "203.0.113.5",
                "ConnectionStatus": "Connected",
            })))
            .mount(&server)
            .await;

        // Later candidates must never be probed once one succeeds.
        Mock::given(method("GET"))
            .and(path("/goform/goform_get_status"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        let status = controller.status().await;

        assert!(status.connected);
        assert_eq!(status.signal_strength, -61);
        assert_eq!(status.public_ip.as_deref(), Some("203.0.113.5"));
    }

    #[tokio::test]
    async fn test_status_root_fallback() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>M300z</html>"))
            .mount(&server)
            .await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        let status = controller.status().await;

        assert_eq!(status, ModemStatus::reachable_default());
    }

    #[tokio::test]
    async fn test_status_unreachable_sentinel() {
        // Nothing listens on port 1.
        let modem = Modem {
            name: "dead".to_string(),
            imei: "0".to_string(),
            local_ip: "127.0.0.1:1".to_string(),
            ..Default::default()
        };
        let controller = VodafoneM300z::with_timing(&modem, zero_timing());
        let status = controller.status().await;

        assert!(!status.connected);
        assert_eq!(status.signal_strength, -999);
    }

    #[tokio::test]
    async fn test_rotate_ip_success() {
        let server = MockServer::start().await;

        // Status before rotation reports one IP, after rotation another.
        Mock::given(method("GET"))
            .and(path("/api/device/information"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "WanIPAddress": "203.0.113.45",
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/device/information"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "WanIPAddress": "203.0.113.99",
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/dialup/mobile_connect"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        let (_stop_tx, stop_rx) = stop_channel();
        let rotation = controller.rotate_ip(stop_rx).await.unwrap();

        assert_eq!(rotation.old_ip.as_deref(), Some("203.0.113.45"));
        assert_eq!(rotation.new_ip, "203.0.113.99");
    }

    #[tokio::test]
    async fn test_rotate_ip_same_ip_is_failure() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/device/information"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "WanIPAddress": "203.0.113.45",
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dialup/mobile_connect"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        let (_stop_tx, stop_rx) = stop_channel();
        let err = controller.rotate_ip(stop_rx).await.unwrap_err();

        assert_eq!(err, RotationError::SameIp);
        assert_eq!(err.to_string(), "Carrier assigned the same IP address");
    }

    #[tokio::test]
    async fn test_rotate_ip_disconnect_failure_stops_early() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/device/information"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "WanIPAddress": "203.0.113.45",
            })))
            .mount(&server)
            .await;

        // All disconnect candidates 404. No reconnect may be attempted:
        // the connect-only endpoint must stay untouched.
        Mock::given(method("POST"))
            .and(path("/api/net/connect"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        let (_stop_tx, stop_rx) = stop_channel();
        let err = controller.rotate_ip(stop_rx).await.unwrap_err();

        assert_eq!(err, RotationError::Disconnect);
        assert_eq!(err.to_string(), "Failed to disconnect from 4G service");
    }

    #[tokio::test]
    async fn test_rotate_ip_reconnect_failure_is_midway_state() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/device/information"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "WanIPAddress": "203.0.113.45",
            })))
            .mount(&server)
            .await;

        // Only the goform disconnect answers; every connect candidate 404s.
        Mock::given(method("POST"))
            .and(path("/goform/goform_set_cmd_process"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        let (_stop_tx, stop_rx) = stop_channel();
        let err = controller.rotate_ip(stop_rx).await.unwrap_err();

        assert_eq!(err, RotationError::ReconnectFailedMidway);
        assert_eq!(err.to_string(), "Failed to reconnect to 4G service");
    }

    #[tokio::test]
    async fn test_rotate_ip_no_new_ip() {
        let server = MockServer::start().await;

        // Pre-rotation status has an IP; post-rotation status has none.
        Mock::given(method("GET"))
            .and(path("/api/device/information"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "WanIPAddress": "203.0.113.45",
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/device/information"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/dialup/mobile_connect"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        let (_stop_tx, stop_rx) = stop_channel();
        let err = controller.rotate_ip(stop_rx).await.unwrap_err();

        assert_eq!(err, RotationError::NoNewIp);
    }

    #[tokio::test]
    async fn test_reboot_stops_at_first_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/system/reboot"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/device/reboot"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        controller.reboot().await.unwrap();
    }

    #[tokio::test]
    async fn test_reboot_no_endpoint() {
        let server = MockServer::start().await;

        let controller = VodafoneM300z::with_timing(&modem_for(&server), zero_timing());
        let err = controller.reboot().await.unwrap_err();

        assert_eq!(err, RebootError::NoEndpoint);
        assert_eq!(err.to_string(), "No reboot endpoint responded successfully");
    }
}
