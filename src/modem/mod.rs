//! Modem control module.
//!
//! One driver per modem model behind a common dispatch enum, plus the
//! shared endpoint-probing primitive and the vendor payload parser.

mod factory;
mod parser;
mod probe;
mod simulated;
mod vodafone;

pub use factory::*;
pub use parser::*;
pub use probe::*;
pub use simulated::*;
pub use vodafone::*;

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;

/// Normalized status snapshot of a modem's management interface.
///
/// Constructed fresh on every status query and discarded after use;
/// persistence of any of its fields is the caller's business.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModemStatus {
    pub connected: bool,
    /// dBm. -999 means the modem could not be read at all.
    pub signal_strength: i64,
    pub download_speed: i64,
    pub upload_speed: i64,
    pub public_ip: Option<String>,
    pub connection_type: String,
    pub provider: String,
    pub firmware: String,
}

impl ModemStatus {
    /// Snapshot for a modem that answered but reported nothing usable.
    pub fn reachable_default() -> Self {
        Self {
            connected: true,
            signal_strength: -70,
            download_speed: 0,
            upload_speed: 0,
            public_ip: None,
            connection_type: "4G".to_string(),
            provider: "Vodafone".to_string(),
            firmware: "Unknown".to_string(),
        }
    }

    /// Sentinel snapshot for a modem that did not answer at all.
    pub fn unreachable() -> Self {
        Self {
            connected: false,
            signal_strength: -999,
            download_speed: 0,
            upload_speed: 0,
            public_ip: None,
            connection_type: "Unknown".to_string(),
            provider: "Vodafone".to_string(),
            firmware: "Unknown".to_string(),
        }
    }
}

/// Successful IP rotation: the carrier handed out a different address.
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    pub old_ip: Option<String>,
    pub new_ip: String,
}

/// IP rotation failure, by phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RotationError {
    #[error("Failed to disconnect from 4G service")]
    Disconnect,
    /// The cellular session was torn down but could not be re-established.
    /// The modem is left in an unknown hardware state; operators must be
    /// told, and no automatic recovery is attempted.
    #[error("Failed to reconnect to 4G service")]
    ReconnectFailedMidway,
    #[error("Carrier assigned the same IP address")]
    SameIp,
    #[error("Unable to obtain new IP address after reconnection")]
    NoNewIp,
    #[error("Rotation cancelled by shutdown")]
    Cancelled,
}

/// Reboot failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RebootError {
    #[error("No reboot endpoint responded successfully")]
    NoEndpoint,
}

/// Per-model modem driver.
///
/// A closed set of variants keeps dispatch exhaustive-checkable while the
/// factory registry keeps model selection open for new entries.
pub enum Controller {
    VodafoneM300z(VodafoneM300z),
    Simulated(SimulatedModem),
}

impl Controller {
    /// Query the modem's management interface. Never fails; unreachable or
    /// unreadable modems degrade to sentinel snapshots.
    pub async fn status(&self) -> ModemStatus {
        match self {
            Controller::VodafoneM300z(c) => c.status().await,
            Controller::Simulated(c) => c.status().await,
        }
    }

    /// Disconnect and reconnect the cellular session so the carrier assigns
    /// a new public IP. The fixed settle waits abort early when `stop`
    /// fires.
    pub async fn rotate_ip(
        &self,
        stop: broadcast::Receiver<()>,
    ) -> Result<Rotation, RotationError> {
        match self {
            Controller::VodafoneM300z(c) => c.rotate_ip(stop).await,
            Controller::Simulated(c) => c.rotate_ip(stop).await,
        }
    }

    /// Reboot the modem hardware. Does not touch the modem record; status
    /// transitions around a reboot are the caller's responsibility.
    pub async fn reboot(&self) -> Result<(), RebootError> {
        match self {
            Controller::VodafoneM300z(c) => c.reboot().await,
            Controller::Simulated(c) => c.reboot().await,
        }
    }
}

/// Wait out a fixed settle delay, abandoning early if the stop channel
/// fires or closes.
pub(crate) async fn settle(
    delay: Duration,
    stop: &mut broadcast::Receiver<()>,
) -> Result<(), Cancelled> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = stop.recv() => Err(Cancelled),
    }
}

/// Marker for a settle wait interrupted by shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_snapshots() {
        let ok = ModemStatus::reachable_default();
        assert!(ok.connected);
        assert_eq!(ok.signal_strength, -70);
        assert_eq!(ok.public_ip, None);

        let dead = ModemStatus::unreachable();
        assert!(!dead.connected);
        assert_eq!(dead.signal_strength, -999);
    }

    #[tokio::test]
    async fn test_settle_cancelled_by_stop() {
        let (tx, mut rx) = broadcast::channel(1);
        tx.send(()).unwrap();
        let result = settle(Duration::from_secs(60), &mut rx).await;
        assert_eq!(result, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_settle_completes() {
        let (_tx, mut rx) = broadcast::channel::<()>(1);
        let result = settle(Duration::from_millis(1), &mut rx).await;
        assert_eq!(result, Ok(()));
    }
}
