//! 3proxy process supervision.
//!
//! Exactly one external daemon instance exists, discovered across restarts
//! through its PID file. Every stop→start sequence and every
//! read-then-act on the PID file runs under one mutex so concurrent
//! configuration updates cannot interleave their halves.

use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::config::generate;
use super::ProxyPaths;
use crate::db::{Modem, ProxyConfig};

/// Supervisor error types.
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to launch {bin}: {source}")]
    Spawn {
        bin: String,
        source: std::io::Error,
    },
}

/// Status snapshot of the supervised daemon. Pure read, no side effects.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProxyStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub config_file: String,
    pub log_file: String,
}

/// Owns the lifecycle of the single external 3proxy process.
pub struct ProxySupervisor {
    bin: String,
    paths: ProxyPaths,
    inner: Mutex<Inner>,
}

struct Inner {
    /// Handle of the most recently spawned launcher. 3proxy daemonizes
    /// itself, so liveness is tracked through the PID file; the handle is
    /// kept to reap the launcher and to kill a non-daemonizing binary.
    child: Option<Child>,
}

impl ProxySupervisor {
    pub fn new<S: Into<String>>(bin: S, paths: ProxyPaths) -> Self {
        Self {
            bin: bin.into(),
            paths,
            inner: Mutex::new(Inner { child: None }),
        }
    }

    pub fn paths(&self) -> &ProxyPaths {
        &self.paths
    }

    /// Start the daemon against the current configuration file. Any
    /// previous instance is stopped first, so start is safe to call
    /// regardless of state. Spawn failure propagates: the caller must know
    /// the configuration is not live.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
        self.start_locked(&mut inner).await
    }

    /// Stop the daemon. Never fails: a missing PID file, a dead PID or a
    /// failed signal all count as "already stopped".
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
    }

    /// Stop then start, under a single lock acquisition.
    pub async fn restart(&self) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock().await;
        self.stop_locked(&mut inner).await;
        self.start_locked(&mut inner).await
    }

    /// True iff the PID file names a process that answers a liveness probe.
    pub async fn is_running(&self) -> bool {
        let _inner = self.inner.lock().await;
        self.is_running_unlocked().await
    }

    /// Status snapshot for the dashboard.
    pub async fn status(&self) -> ProxyStatus {
        let _inner = self.inner.lock().await;
        let pid = self.read_pid().await;
        let running = match pid {
            Some(p) => pid_alive(p).await,
            None => false,
        };
        ProxyStatus {
            running,
            pid: if running { pid } else { None },
            config_file: self.paths.config_file.display().to_string(),
            log_file: self.paths.log_file.display().to_string(),
        }
    }

    /// Regenerate configuration from the full modem and port-assignment
    /// sets, write it out, and bounce the daemon. This is the only path by
    /// which topology changes become live proxy behavior; every change is
    /// a full regenerate and a full restart.
    pub async fn update_configuration(
        &self,
        modems: &[Modem],
        configs: &[ProxyConfig],
    ) -> Result<(), SupervisorError> {
        let mut inner = self.inner.lock().await;

        let rendered = generate(modems, configs, &self.paths);
        self.write_config_locked(&rendered).await?;

        self.stop_locked(&mut inner).await;
        self.start_locked(&mut inner).await
    }

    /// Last `lines` lines of the daemon log. Missing log file yields an
    /// empty result.
    pub async fn logs(&self, lines: usize) -> String {
        match tokio::fs::read_to_string(&self.paths.log_file).await {
            Ok(contents) => {
                let all: Vec<&str> = contents.lines().collect();
                let start = all.len().saturating_sub(lines);
                all[start..].join("\n")
            }
            Err(_) => String::new(),
        }
    }

    /// Issue a request through the given local listener and report whether
    /// the echo endpoint answered 200.
    pub async fn test_proxy(&self, port: u16, protocol: &str) -> bool {
        let proxy_url = match protocol {
            "socks5" => format!("socks5://127.0.0.1:{port}"),
            _ => format!("http://127.0.0.1:{port}"),
        };

        let Ok(proxy) = reqwest::Proxy::all(&proxy_url) else {
            return false;
        };
        let Ok(client) = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(Duration::from_secs(10))
            .build()
        else {
            return false;
        };

        match client.get("http://httpbin.org/ip").send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }

    async fn start_locked(&self, inner: &mut Inner) -> Result<(), SupervisorError> {
        tokio::fs::create_dir_all(&self.paths.config_dir).await?;

        let child = Command::new(&self.bin)
            .arg(&self.paths.config_file)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;
        inner.child = Some(child);
        tracing::info!("3proxy started");
        Ok(())
    }

    async fn stop_locked(&self, inner: &mut Inner) {
        if let Some(mut child) = inner.child.take() {
            let _ = child.kill().await;
        }

        if let Some(pid) = self.read_pid().await {
            if pid_alive(pid).await {
                let _ = Command::new("kill").arg(pid.to_string()).output().await;
                tracing::info!("3proxy stopped (pid {})", pid);
            }
            let _ = tokio::fs::remove_file(&self.paths.pid_file).await;
        }
    }

    // Callers must hold the inner lock.
    async fn is_running_unlocked(&self) -> bool {
        match self.read_pid().await {
            Some(pid) => pid_alive(pid).await,
            None => false,
        }
    }

    async fn read_pid(&self) -> Option<u32> {
        let raw = tokio::fs::read_to_string(&self.paths.pid_file).await.ok()?;
        raw.trim().parse().ok()
    }

    async fn write_config_locked(&self, contents: &str) -> Result<(), SupervisorError> {
        tokio::fs::create_dir_all(&self.paths.config_dir).await?;
        // Write-then-rename so the daemon never sees a half-written file.
        let tmp = self.paths.config_file.with_extension("cfg.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.paths.config_file).await?;
        Ok(())
    }
}

async fn pid_alive(pid: u32) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
