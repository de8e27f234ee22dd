//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Modem lifecycle status values stored in `Modem::status`.
pub mod modem_status {
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const RECONNECTING: &str = "reconnecting";
    pub const ERROR: &str = "error";
    pub const REBOOTING: &str = "rebooting";
}

/// A managed 4G/LTE modem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modem {
    pub id: i64,
    pub name: String,
    pub imei: String,
    /// IP of the modem's local management interface.
    pub local_ip: String,
    /// Last known carrier-assigned public IP. Only meaningful while connected.
    pub public_ip: Option<String>,
    pub status: String,
    pub signal_strength: Option<i64>,
    pub download_speed: Option<i64>,
    pub upload_speed: Option<i64>,
    pub provider: Option<String>,
    pub connection_type: Option<String>,
    /// Model identifier, selects the controller implementation.
    pub model: String,
    pub firmware: Option<String>,
    pub admin_username: String,
    pub admin_password: String,
    pub auto_ip_rotation: bool,
    /// Minutes between automatic rotations.
    pub ip_rotation_interval: i64,
    pub ports_assigned: bool,
    pub openvpn_config_path: Option<String>,
    pub openvpn_config_url: Option<String>,
    pub is_active: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub last_reboot: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Modem {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            imei: String::new(),
            local_ip: "192.168.1.1".to_string(),
            public_ip: None,
            status: modem_status::DISCONNECTED.to_string(),
            signal_strength: None,
            download_speed: None,
            upload_speed: None,
            provider: None,
            connection_type: None,
            model: "M300z".to_string(),
            firmware: None,
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            auto_ip_rotation: false,
            ip_rotation_interval: 30,
            ports_assigned: false,
            openvpn_config_path: None,
            openvpn_config_url: None,
            is_active: true,
            last_seen: None,
            last_reboot: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// One proxy listener assignment, tied to a modem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub id: i64,
    pub modem_id: Option<i64>,
    pub http_port: u16,
    pub socks_port: u16,
    pub authentication: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_active: bool,
    pub max_connections: Option<i64>,
    pub connection_timeout: Option<i64>,
    pub allowed_ips: Vec<String>,
    pub blocked_ips: Vec<String>,
    /// KB/s, unlimited if unset.
    pub bandwidth_limit: Option<i64>,
    /// MB per day, unlimited if unset.
    pub daily_traffic_limit: Option<i64>,
    /// "http", "socks5" or "both". Unset is treated as "both".
    pub protocol: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            id: 0,
            modem_id: None,
            http_port: 0,
            socks_port: 0,
            authentication: false,
            username: None,
            password: None,
            is_active: true,
            max_connections: Some(100),
            connection_timeout: Some(30),
            allowed_ips: Vec::new(),
            blocked_ips: Vec::new(),
            bandwidth_limit: None,
            daily_traffic_limit: None,
            protocol: Some("both".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Immutable record of one IP rotation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpRotationLog {
    pub id: i64,
    pub modem_id: Option<i64>,
    pub old_ip: Option<String>,
    pub new_ip: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub rotated_at: DateTime<Utc>,
}

/// A system event log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLog {
    pub id: i64,
    /// "info", "warn", "error" or "debug".
    pub level: String,
    pub message: String,
    pub details: Option<String>,
    pub source: Option<String>,
    pub source_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
