//! Simulated modem driver.
//!
//! Performs no hardware I/O and returns synthetic but plausible results.
//! Used where physical modems are unavailable: development boxes, test
//! harnesses. Selected explicitly through the factory, never through an
//! ambient environment flag.

use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;

use super::{settle, ModemStatus, RebootError, Rotation, RotationError};
use crate::db::Modem;

/// Driver that fakes every operation.
pub struct SimulatedModem {
    public_ip: Option<String>,
    rotate_delay: Duration,
    reboot_delay: Duration,
}

impl SimulatedModem {
    pub fn new(modem: &Modem) -> Self {
        Self {
            public_ip: modem.public_ip.clone(),
            rotate_delay: Duration::from_secs(2),
            reboot_delay: Duration::from_secs(3),
        }
    }

    /// Run operations with the given delay instead of the default
    /// operation times. Tests pass `Duration::ZERO`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.rotate_delay = delay;
        self.reboot_delay = delay;
        self
    }

    pub async fn status(&self) -> ModemStatus {
        let mut status = ModemStatus::reachable_default();
        status.public_ip = self.public_ip.clone();
        status
    }

    pub async fn rotate_ip(
        &self,
        mut stop: broadcast::Receiver<()>,
    ) -> Result<Rotation, RotationError> {
        settle(self.rotate_delay, &mut stop)
            .await
            .map_err(|_| RotationError::Cancelled)?;

        let old_ip = self
            .public_ip
            .clone()
            .unwrap_or_else(|| "203.0.113.45".to_string());
        let mut new_ip = random_documentation_ip();
        while new_ip == old_ip {
            new_ip = random_documentation_ip();
        }

        Ok(Rotation {
            old_ip: Some(old_ip),
            new_ip,
        })
    }

    pub async fn reboot(&self) -> Result<(), RebootError> {
        tokio::time::sleep(self.reboot_delay).await;
        Ok(())
    }
}

/// Random address in the RFC 5737 documentation range.
fn random_documentation_ip() -> String {
    format!("203.0.113.{}", rand::thread_rng().gen_range(1..=254))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulated(public_ip: Option<&str>) -> SimulatedModem {
        let modem = Modem {
            name: "sim".to_string(),
            imei: "1".to_string(),
            public_ip: public_ip.map(String::from),
            model: "simulated".to_string(),
            ..Default::default()
        };
        SimulatedModem::new(&modem).with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_rotate_always_yields_fresh_ip() {
        let sim = simulated(Some("203.0.113.45"));
        let (_tx, rx) = broadcast::channel(1);
        let rotation = sim.rotate_ip(rx).await.unwrap();

        assert_eq!(rotation.old_ip.as_deref(), Some("203.0.113.45"));
        assert!(rotation.new_ip.starts_with("203.0.113."));
        assert_ne!(rotation.new_ip, "203.0.113.45");
    }

    #[tokio::test]
    async fn test_rotate_without_known_ip_uses_placeholder() {
        let sim = simulated(None);
        let (_tx, rx) = broadcast::channel(1);
        let rotation = sim.rotate_ip(rx).await.unwrap();

        assert_eq!(rotation.old_ip.as_deref(), Some("203.0.113.45"));
        assert_ne!(rotation.new_ip, "203.0.113.45");
    }

    #[tokio::test]
    async fn test_rotate_cancelled() {
        let modem = Modem::default();
        let sim = SimulatedModem::new(&modem); // default 2s delay
        let (tx, rx) = broadcast::channel(1);
        tx.send(()).unwrap();

        let err = sim.rotate_ip(rx).await.unwrap_err();
        assert_eq!(err, RotationError::Cancelled);
    }

    #[tokio::test]
    async fn test_status_and_reboot() {
        let sim = simulated(Some("203.0.113.7"));
        let status = sim.status().await;
        assert!(status.connected);
        assert_eq!(status.public_ip.as_deref(), Some("203.0.113.7"));

        sim.reboot().await.unwrap();
    }
}
