//! Automatic IP rotation scheduling.
//!
//! One background loop per modem with auto-rotation enabled; loops are
//! keyed by modem id and torn down through broadcast stop channels.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};

use crate::db::{DbError, Modem, Store};
use crate::orchestrator::Orchestrator;

/// Schedules automatic IP rotations.
pub struct RotationScheduler {
    store: Arc<Store>,
    orchestrator: Arc<Orchestrator>,
    stop_chans: Arc<RwLock<HashMap<i64, broadcast::Sender<()>>>>,
}

impl RotationScheduler {
    pub fn new(store: Arc<Store>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            store,
            orchestrator,
            stop_chans: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start rotation loops for every active modem with auto-rotation on.
    pub async fn start(&self) -> Result<(), DbError> {
        let modems = self.store.get_modems()?;
        let eligible: Vec<_> = modems
            .into_iter()
            .filter(|m| m.is_active && m.auto_ip_rotation)
            .collect();

        tracing::info!(
            "rotation scheduler: starting with {} modem(s)",
            eligible.len()
        );
        for modem in eligible {
            self.add_modem(&modem).await;
        }
        Ok(())
    }

    /// Begin rotating a modem on its configured interval. No-op for modems
    /// without auto-rotation or already scheduled ones.
    pub async fn add_modem(&self, modem: &Modem) {
        if !(modem.is_active && modem.auto_ip_rotation) {
            return;
        }

        let mut stop_chans = self.stop_chans.write().await;
        if stop_chans.contains_key(&modem.id) {
            return;
        }

        let (stop_tx, _) = broadcast::channel(1);
        stop_chans.insert(modem.id, stop_tx.clone());
        drop(stop_chans);

        tracing::info!(
            "rotation scheduler: rotating {} every {} minute(s)",
            modem.name,
            modem.ip_rotation_interval
        );

        let orchestrator = self.orchestrator.clone();
        let modem_id = modem.id;
        let modem_name = modem.name.clone();
        let interval_minutes = modem.ip_rotation_interval.max(1) as u64;

        // The loop only ever exits through its stop channel, and
        // `remove_modem` drops the map entry before signalling, so no
        // cleanup is needed here.
        tokio::spawn(run_rotation_loop(
            modem_id,
            modem_name,
            interval_minutes,
            orchestrator,
            stop_tx.subscribe(),
        ));
    }

    /// Stop rotating a modem.
    pub async fn remove_modem(&self, id: i64) {
        let mut stop_chans = self.stop_chans.write().await;
        if let Some(stop_tx) = stop_chans.remove(&id) {
            let _ = stop_tx.send(());
            tracing::info!("rotation scheduler: removed modem {}", id);
        }
    }

    /// Re-evaluate a modem after its record changed.
    pub async fn sync_modem(&self, modem: &Modem) {
        self.remove_modem(modem.id).await;
        self.add_modem(modem).await;
    }

    /// Whether a rotation loop is currently scheduled for the modem.
    pub async fn is_scheduled(&self, id: i64) -> bool {
        self.stop_chans.read().await.contains_key(&id)
    }
}

async fn run_rotation_loop(
    modem_id: i64,
    modem_name: String,
    interval_minutes: u64,
    orchestrator: Arc<Orchestrator>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately; consume it so the first
    // rotation happens a full interval after scheduling, not at startup.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                match orchestrator.rotate_modem_ip(modem_id).await {
                    Ok(report) if report.success => {
                        tracing::info!(
                            "auto rotation for {}: {:?} -> {:?}",
                            modem_name,
                            report.old_ip,
                            report.new_ip
                        );
                    }
                    Ok(report) => {
                        tracing::warn!(
                            "auto rotation failed for {}: {}",
                            modem_name,
                            report.error.as_deref().unwrap_or("unknown")
                        );
                    }
                    Err(e) => {
                        tracing::error!("auto rotation error for {}: {}", modem_name, e);
                    }
                }
            }
        }
    }
}
