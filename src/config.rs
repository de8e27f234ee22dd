//! Configuration module for modemdash.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "modemdash.db")
    pub db_path: String,
    /// Directory holding the 3proxy config, pid and log files (default: "/tmp/3proxy")
    pub proxy_dir: String,
    /// Name or path of the 3proxy binary (default: "3proxy")
    pub proxy_bin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "modemdash.db".to_string(),
            proxy_dir: "/tmp/3proxy".to_string(),
            proxy_bin: "3proxy".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `MODEMDASH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `MODEMDASH_DB_PATH`: Database file path (default: "modemdash.db")
    /// - `MODEMDASH_PROXY_DIR`: 3proxy working directory (default: "/tmp/3proxy")
    /// - `MODEMDASH_PROXY_BIN`: 3proxy binary name or path (default: "3proxy")
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("MODEMDASH_HTTP_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("MODEMDASH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(proxy_dir) = env::var("MODEMDASH_PROXY_DIR") {
            cfg.proxy_dir = proxy_dir;
        }

        if let Ok(proxy_bin) = env::var("MODEMDASH_PROXY_BIN") {
            cfg.proxy_bin = proxy_bin;
        }

        cfg
    }
}
