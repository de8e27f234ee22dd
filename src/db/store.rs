//! SQLite database store implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS modems (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    imei TEXT NOT NULL UNIQUE,
    local_ip TEXT NOT NULL DEFAULT '192.168.1.1',
    public_ip TEXT,
    status TEXT NOT NULL DEFAULT 'disconnected',
    signal_strength INTEGER,
    download_speed INTEGER,
    upload_speed INTEGER,
    provider TEXT,
    connection_type TEXT,
    model TEXT NOT NULL DEFAULT 'M300z',
    firmware TEXT,
    admin_username TEXT NOT NULL DEFAULT 'admin',
    admin_password TEXT NOT NULL DEFAULT 'admin',
    auto_ip_rotation INTEGER NOT NULL DEFAULT 0,
    ip_rotation_interval INTEGER NOT NULL DEFAULT 30,
    ports_assigned INTEGER NOT NULL DEFAULT 0,
    openvpn_config_path TEXT,
    openvpn_config_url TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_seen TEXT,
    last_reboot TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS proxy_configurations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    modem_id INTEGER REFERENCES modems(id),
    http_port INTEGER NOT NULL,
    socks_port INTEGER NOT NULL,
    authentication INTEGER NOT NULL DEFAULT 0,
    username TEXT,
    password TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    max_connections INTEGER DEFAULT 100,
    connection_timeout INTEGER DEFAULT 30,
    allowed_ips TEXT NOT NULL DEFAULT '[]',
    blocked_ips TEXT NOT NULL DEFAULT '[]',
    bandwidth_limit INTEGER,
    daily_traffic_limit INTEGER,
    protocol TEXT DEFAULT 'both',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ip_rotation_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    modem_id INTEGER REFERENCES modems(id),
    old_ip TEXT,
    new_ip TEXT,
    success INTEGER NOT NULL DEFAULT 1,
    error TEXT,
    rotated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS system_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    details TEXT,
    source TEXT,
    source_id INTEGER,
    created_at TEXT NOT NULL
);
"#;

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn opt_ts(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(ts)
}

fn parse_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_ts_req(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn encode_list(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
}

fn decode_list(s: String) -> Vec<String> {
    serde_json::from_str(&s).unwrap_or_default()
}

fn modem_from_row(row: &Row) -> rusqlite::Result<Modem> {
    Ok(Modem {
        id: row.get(0)?,
        name: row.get(1)?,
        imei: row.get(2)?,
        local_ip: row.get(3)?,
        public_ip: row.get(4)?,
        status: row.get(5)?,
        signal_strength: row.get(6)?,
        download_speed: row.get(7)?,
        upload_speed: row.get(8)?,
        provider: row.get(9)?,
        connection_type: row.get(10)?,
        model: row.get(11)?,
        firmware: row.get(12)?,
        admin_username: row.get(13)?,
        admin_password: row.get(14)?,
        auto_ip_rotation: row.get(15)?,
        ip_rotation_interval: row.get(16)?,
        ports_assigned: row.get(17)?,
        openvpn_config_path: row.get(18)?,
        openvpn_config_url: row.get(19)?,
        is_active: row.get(20)?,
        last_seen: parse_ts(row.get(21)?),
        last_reboot: parse_ts(row.get(22)?),
        created_at: parse_ts_req(row.get(23)?),
        updated_at: parse_ts_req(row.get(24)?),
    })
}

const MODEM_COLUMNS: &str = "id, name, imei, local_ip, public_ip, status, signal_strength, \
    download_speed, upload_speed, provider, connection_type, model, firmware, \
    admin_username, admin_password, auto_ip_rotation, ip_rotation_interval, \
    ports_assigned, openvpn_config_path, openvpn_config_url, is_active, \
    last_seen, last_reboot, created_at, updated_at";

fn proxy_config_from_row(row: &Row) -> rusqlite::Result<ProxyConfig> {
    Ok(ProxyConfig {
        id: row.get(0)?,
        modem_id: row.get(1)?,
        http_port: row.get(2)?,
        socks_port: row.get(3)?,
        authentication: row.get(4)?,
        username: row.get(5)?,
        password: row.get(6)?,
        is_active: row.get(7)?,
        max_connections: row.get(8)?,
        connection_timeout: row.get(9)?,
        allowed_ips: decode_list(row.get(10)?),
        blocked_ips: decode_list(row.get(11)?),
        bandwidth_limit: row.get(12)?,
        daily_traffic_limit: row.get(13)?,
        protocol: row.get(14)?,
        created_at: parse_ts_req(row.get(15)?),
        updated_at: parse_ts_req(row.get(16)?),
    })
}

const PROXY_CONFIG_COLUMNS: &str = "id, modem_id, http_port, socks_port, authentication, \
    username, password, is_active, max_connections, connection_timeout, allowed_ips, \
    blocked_ips, bandwidth_limit, daily_traffic_limit, protocol, created_at, updated_at";

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database schema.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        // SQLite's documented default is foreign-key enforcement OFF; the
        // `REFERENCES` clauses in the schema are advisory. The bundled SQLite
        // build flips that default on (SQLITE_DEFAULT_FOREIGN_KEYS=1), so pin
        // the connection back to the default this code was written against.
        conn.execute_batch("PRAGMA foreign_keys = OFF;")
            .map_err(|e| DbError::Migration(format!("pragma setup failed: {}", e)))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| DbError::Migration(format!("schema creation failed: {}", e)))?;
        Ok(())
    }

    // --- Modem CRUD ---

    /// Add a new modem and return its ID.
    pub fn add_modem(&self, modem: &mut Modem) -> Result<i64, DbError> {
        if modem.ip_rotation_interval <= 0 {
            modem.ip_rotation_interval = 30;
        }
        let now = Utc::now();
        modem.created_at = now;
        modem.updated_at = now;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO modems (name, imei, local_ip, public_ip, status, signal_strength, \
             download_speed, upload_speed, provider, connection_type, model, firmware, \
             admin_username, admin_password, auto_ip_rotation, ip_rotation_interval, \
             ports_assigned, openvpn_config_path, openvpn_config_url, is_active, \
             last_seen, last_reboot, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
             ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            params![
                modem.name,
                modem.imei,
                modem.local_ip,
                modem.public_ip,
                modem.status,
                modem.signal_strength,
                modem.download_speed,
                modem.upload_speed,
                modem.provider,
                modem.connection_type,
                modem.model,
                modem.firmware,
                modem.admin_username,
                modem.admin_password,
                modem.auto_ip_rotation,
                modem.ip_rotation_interval,
                modem.ports_assigned,
                modem.openvpn_config_path,
                modem.openvpn_config_url,
                modem.is_active,
                opt_ts(modem.last_seen),
                opt_ts(modem.last_reboot),
                ts(modem.created_at),
                ts(modem.updated_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        modem.id = id;
        Ok(id)
    }

    /// Get a modem by ID.
    pub fn get_modem(&self, id: i64) -> Result<Modem, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM modems WHERE id=?1", MODEM_COLUMNS))?;
        stmt.query_row(params![id], modem_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::NotFound,
                other => DbError::Sqlite(other),
            })
    }

    /// Get a modem by name.
    pub fn get_modem_by_name(&self, name: &str) -> Result<Modem, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM modems WHERE name=?1", MODEM_COLUMNS))?;
        stmt.query_row(params![name], modem_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::NotFound,
                other => DbError::Sqlite(other),
            })
    }

    /// Get all modems.
    pub fn get_modems(&self) -> Result<Vec<Modem>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM modems ORDER BY id", MODEM_COLUMNS))?;
        let modems = stmt
            .query_map([], modem_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(modems)
    }

    /// Update an existing modem (all mutable fields).
    pub fn update_modem(&self, modem: &Modem) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE modems SET name=?1, imei=?2, local_ip=?3, public_ip=?4, status=?5, \
             signal_strength=?6, download_speed=?7, upload_speed=?8, provider=?9, \
             connection_type=?10, model=?11, firmware=?12, admin_username=?13, \
             admin_password=?14, auto_ip_rotation=?15, ip_rotation_interval=?16, \
             ports_assigned=?17, openvpn_config_path=?18, openvpn_config_url=?19, \
             is_active=?20, last_seen=?21, last_reboot=?22, updated_at=?23 WHERE id=?24",
            params![
                modem.name,
                modem.imei,
                modem.local_ip,
                modem.public_ip,
                modem.status,
                modem.signal_strength,
                modem.download_speed,
                modem.upload_speed,
                modem.provider,
                modem.connection_type,
                modem.model,
                modem.firmware,
                modem.admin_username,
                modem.admin_password,
                modem.auto_ip_rotation,
                modem.ip_rotation_interval,
                modem.ports_assigned,
                modem.openvpn_config_path,
                modem.openvpn_config_url,
                modem.is_active,
                opt_ts(modem.last_seen),
                opt_ts(modem.last_reboot),
                ts(Utc::now()),
                modem.id,
            ],
        )?;
        Ok(())
    }

    /// Delete a modem.
    pub fn delete_modem(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM modems WHERE id=?1", params![id])?;
        if n == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Set a modem's lifecycle status.
    pub fn set_modem_status(&self, id: i64, status: &str) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE modems SET status=?1, updated_at=?2 WHERE id=?3",
            params![status, ts(Utc::now()), id],
        )?;
        Ok(())
    }

    /// Record a new public IP and bump the last-seen timestamp.
    pub fn set_modem_public_ip(&self, id: i64, public_ip: &str) -> Result<(), DbError> {
        let now = ts(Utc::now());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE modems SET public_ip=?1, last_seen=?2, updated_at=?2 WHERE id=?3",
            params![public_ip, now, id],
        )?;
        Ok(())
    }

    /// Mark ports as assigned and record the OpenVPN profile location.
    pub fn set_modem_ports_assigned(
        &self,
        id: i64,
        config_path: &str,
        config_url: &str,
    ) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE modems SET ports_assigned=1, openvpn_config_path=?1, \
             openvpn_config_url=?2, updated_at=?3 WHERE id=?4",
            params![config_path, config_url, ts(Utc::now()), id],
        )?;
        Ok(())
    }

    /// Record a reboot timestamp.
    pub fn set_modem_last_reboot(&self, id: i64) -> Result<(), DbError> {
        let now = ts(Utc::now());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE modems SET last_reboot=?1, updated_at=?1 WHERE id=?2",
            params![now, id],
        )?;
        Ok(())
    }

    // --- Proxy configuration CRUD ---

    /// Add a new proxy configuration and return its ID.
    pub fn add_proxy_config(&self, config: &mut ProxyConfig) -> Result<i64, DbError> {
        let now = Utc::now();
        config.created_at = now;
        config.updated_at = now;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO proxy_configurations (modem_id, http_port, socks_port, \
             authentication, username, password, is_active, max_connections, \
             connection_timeout, allowed_ips, blocked_ips, bandwidth_limit, \
             daily_traffic_limit, protocol, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                config.modem_id,
                config.http_port,
                config.socks_port,
                config.authentication,
                config.username,
                config.password,
                config.is_active,
                config.max_connections,
                config.connection_timeout,
                encode_list(&config.allowed_ips),
                encode_list(&config.blocked_ips),
                config.bandwidth_limit,
                config.daily_traffic_limit,
                config.protocol,
                ts(config.created_at),
                ts(config.updated_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        config.id = id;
        Ok(id)
    }

    /// Get a proxy configuration by ID.
    pub fn get_proxy_config(&self, id: i64) -> Result<ProxyConfig, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM proxy_configurations WHERE id=?1",
            PROXY_CONFIG_COLUMNS
        ))?;
        stmt.query_row(params![id], proxy_config_from_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => DbError::NotFound,
                other => DbError::Sqlite(other),
            })
    }

    /// Get all proxy configurations.
    pub fn get_proxy_configs(&self) -> Result<Vec<ProxyConfig>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM proxy_configurations ORDER BY id",
            PROXY_CONFIG_COLUMNS
        ))?;
        let configs = stmt
            .query_map([], proxy_config_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(configs)
    }

    /// Get active proxy configurations only.
    pub fn get_active_proxy_configs(&self) -> Result<Vec<ProxyConfig>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM proxy_configurations WHERE is_active=1 ORDER BY id",
            PROXY_CONFIG_COLUMNS
        ))?;
        let configs = stmt
            .query_map([], proxy_config_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(configs)
    }

    /// Update an existing proxy configuration.
    pub fn update_proxy_config(&self, config: &ProxyConfig) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE proxy_configurations SET modem_id=?1, http_port=?2, socks_port=?3, \
             authentication=?4, username=?5, password=?6, is_active=?7, \
             max_connections=?8, connection_timeout=?9, allowed_ips=?10, blocked_ips=?11, \
             bandwidth_limit=?12, daily_traffic_limit=?13, protocol=?14, updated_at=?15 \
             WHERE id=?16",
            params![
                config.modem_id,
                config.http_port,
                config.socks_port,
                config.authentication,
                config.username,
                config.password,
                config.is_active,
                config.max_connections,
                config.connection_timeout,
                encode_list(&config.allowed_ips),
                encode_list(&config.blocked_ips),
                config.bandwidth_limit,
                config.daily_traffic_limit,
                config.protocol,
                ts(Utc::now()),
                config.id,
            ],
        )?;
        Ok(())
    }

    /// Delete a proxy configuration.
    pub fn delete_proxy_config(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM proxy_configurations WHERE id=?1", params![id])?;
        if n == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    // --- IP rotation logs ---

    /// Insert an IP rotation log entry.
    pub fn add_rotation_log(&self, log: &mut IpRotationLog) -> Result<i64, DbError> {
        log.rotated_at = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO ip_rotation_logs (modem_id, old_ip, new_ip, success, error, rotated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.modem_id,
                log.old_ip,
                log.new_ip,
                log.success,
                log.error,
                ts(log.rotated_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        log.id = id;
        Ok(id)
    }

    /// Get the most recent rotation log entries, newest first.
    pub fn get_rotation_logs(&self, limit: i64) -> Result<Vec<IpRotationLog>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, modem_id, old_ip, new_ip, success, error, rotated_at \
             FROM ip_rotation_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let logs = stmt
            .query_map(params![limit], |row| {
                Ok(IpRotationLog {
                    id: row.get(0)?,
                    modem_id: row.get(1)?,
                    old_ip: row.get(2)?,
                    new_ip: row.get(3)?,
                    success: row.get(4)?,
                    error: row.get(5)?,
                    rotated_at: parse_ts_req(row.get(6)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    // --- System logs ---

    /// Insert a system log entry.
    pub fn add_system_log(&self, log: &mut SystemLog) -> Result<i64, DbError> {
        log.created_at = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO system_logs (level, message, details, source, source_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                log.level,
                log.message,
                log.details,
                log.source,
                log.source_id,
                ts(log.created_at),
            ],
        )?;
        let id = conn.last_insert_rowid();
        log.id = id;
        Ok(id)
    }

    /// Get the most recent system log entries, newest first.
    pub fn get_system_logs(&self, limit: i64) -> Result<Vec<SystemLog>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, level, message, details, source, source_id, created_at \
             FROM system_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let logs = stmt
            .query_map(params![limit], |row| {
                Ok(SystemLog {
                    id: row.get(0)?,
                    level: row.get(1)?,
                    message: row.get(2)?,
                    details: row.get(3)?,
                    source: row.get(4)?,
                    source_id: row.get(5)?,
                    created_at: parse_ts_req(row.get(6)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_modem_roundtrip() {
        let (_dir, store) = temp_store();

        let mut modem = Modem {
            name: "modem-1".to_string(),
            imei: "356938035643809".to_string(),
            public_ip: Some("203.0.113.45".to_string()),
            status: modem_status::CONNECTED.to_string(),
            ..Default::default()
        };
        let id = store.add_modem(&mut modem).unwrap();
        assert!(id > 0);

        let loaded = store.get_modem(id).unwrap();
        assert_eq!(loaded.name, "modem-1");
        assert_eq!(loaded.imei, "356938035643809");
        assert_eq!(loaded.local_ip, "192.168.1.1");
        assert_eq!(loaded.public_ip.as_deref(), Some("203.0.113.45"));
        assert_eq!(loaded.model, "M300z");
        assert!(loaded.is_active);
        assert!(!loaded.ports_assigned);

        let by_name = store.get_modem_by_name("modem-1").unwrap();
        assert_eq!(by_name.id, id);
    }

    #[test]
    fn test_modem_not_found() {
        let (_dir, store) = temp_store();
        assert!(matches!(store.get_modem(42), Err(DbError::NotFound)));
    }

    #[test]
    fn test_modem_targeted_updates() {
        let (_dir, store) = temp_store();
        let mut modem = Modem {
            name: "m".to_string(),
            imei: "1".to_string(),
            ..Default::default()
        };
        let id = store.add_modem(&mut modem).unwrap();

        store.set_modem_status(id, modem_status::REBOOTING).unwrap();
        assert_eq!(store.get_modem(id).unwrap().status, "rebooting");

        store.set_modem_public_ip(id, "203.0.113.9").unwrap();
        let m = store.get_modem(id).unwrap();
        assert_eq!(m.public_ip.as_deref(), Some("203.0.113.9"));
        assert!(m.last_seen.is_some());

        store
            .set_modem_ports_assigned(id, "/configs/openvpn/m-1.ovpn", "https://host/dl/m-1.ovpn")
            .unwrap();
        let m = store.get_modem(id).unwrap();
        assert!(m.ports_assigned);
        assert_eq!(m.openvpn_config_path.as_deref(), Some("/configs/openvpn/m-1.ovpn"));
    }

    #[test]
    fn test_proxy_config_roundtrip() {
        let (_dir, store) = temp_store();
        let mut config = ProxyConfig {
            modem_id: Some(1),
            http_port: 51001,
            socks_port: 51002,
            allowed_ips: vec!["10.0.0.0/8".to_string()],
            blocked_ips: vec!["192.0.2.1".to_string()],
            ..Default::default()
        };
        let id = store.add_proxy_config(&mut config).unwrap();

        let loaded = store.get_proxy_config(id).unwrap();
        assert_eq!(loaded.http_port, 51001);
        assert_eq!(loaded.socks_port, 51002);
        assert_eq!(loaded.allowed_ips, vec!["10.0.0.0/8"]);
        assert_eq!(loaded.blocked_ips, vec!["192.0.2.1"]);
        assert_eq!(loaded.protocol.as_deref(), Some("both"));

        let mut inactive = ProxyConfig {
            modem_id: Some(1),
            http_port: 51003,
            socks_port: 51004,
            is_active: false,
            ..Default::default()
        };
        store.add_proxy_config(&mut inactive).unwrap();

        assert_eq!(store.get_proxy_configs().unwrap().len(), 2);
        assert_eq!(store.get_active_proxy_configs().unwrap().len(), 1);
    }

    #[test]
    fn test_rotation_and_system_logs() {
        let (_dir, store) = temp_store();

        let mut log = IpRotationLog {
            id: 0,
            modem_id: Some(1),
            old_ip: Some("203.0.113.1".to_string()),
            new_ip: Some("203.0.113.2".to_string()),
            success: true,
            error: None,
            rotated_at: Utc::now(),
        };
        store.add_rotation_log(&mut log).unwrap();

        let mut failed = IpRotationLog {
            id: 0,
            modem_id: Some(1),
            old_ip: None,
            new_ip: None,
            success: false,
            error: Some("Failed to disconnect from 4G service".to_string()),
            rotated_at: Utc::now(),
        };
        store.add_rotation_log(&mut failed).unwrap();

        let logs = store.get_rotation_logs(10).unwrap();
        assert_eq!(logs.len(), 2);
        // Newest first
        assert!(!logs[0].success);
        assert!(logs[1].success);

        let mut sys = SystemLog {
            id: 0,
            level: "info".to_string(),
            message: "IP rotation successful for modem m".to_string(),
            details: None,
            source: Some("modem-controller".to_string()),
            source_id: Some(1),
            created_at: Utc::now(),
        };
        store.add_system_log(&mut sys).unwrap();
        assert_eq!(store.get_system_logs(10).unwrap().len(), 1);
    }
}
