//! Inactivity reaper — evicts peers that stopped heartbeating.
//!
//! Closing a socket is not treated as leaving: a peer is only removed when
//! its heartbeats stop for longer than the inactivity timeout. Each eviction
//! removes the registry session, deletes the durable record, and publishes
//! an `EvictionEvent`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use rendezvous_core::peer::fingerprint;

use crate::registry::SharedRegistry;
use crate::store::{with_store, SharedStore};

#[derive(Debug, Clone, Copy)]
pub struct ReaperSettings {
    /// Time between sweeps.
    pub period: Duration,
    /// Silence longer than this gets a peer evicted.
    pub threshold: Duration,
    /// Wait before the first sweep.
    pub first_sweep_delay: Duration,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(10),
            threshold: Duration::from_secs(10),
            first_sweep_delay: Duration::from_secs(1),
        }
    }
}

/// Published once per evicted peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionEvent {
    pub public_key: String,
    pub username: String,
    /// Silence at the time of eviction.
    pub idle: Duration,
    /// False if the durable record could not be deleted.
    pub record_deleted: bool,
}

/// Running counters, shared with the status API.
#[derive(Debug, Default)]
pub struct ReaperStats {
    sweeps: AtomicU64,
    evictions: AtomicU64,
    store_failures: AtomicU64,
}

impl ReaperStats {
    pub fn sweeps(&self) -> u64 {
        self.sweeps.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn store_failures(&self) -> u64 {
        self.store_failures.load(Ordering::Relaxed)
    }
}

pub struct InactivityReaper {
    registry: SharedRegistry,
    store: SharedStore,
    settings: ReaperSettings,
    events: broadcast::Sender<EvictionEvent>,
    stats: Arc<ReaperStats>,
}

impl InactivityReaper {
    pub fn new(registry: SharedRegistry, store: SharedStore, settings: ReaperSettings) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            registry,
            store,
            settings,
            events,
            stats: Arc::new(ReaperStats::default()),
        }
    }

    pub fn settings(&self) -> ReaperSettings {
        self.settings
    }

    pub fn stats(&self) -> Arc<ReaperStats> {
        self.stats.clone()
    }

    /// Receive every eviction published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EvictionEvent> {
        self.events.subscribe()
    }

    /// Run one sweep and return what was evicted.
    pub async fn sweep(&self) -> Vec<EvictionEvent> {
        let now = self.registry.clock().now();
        let threshold = self.settings.threshold;
        let expired = self.registry.list_expired(threshold, now).await;
        self.stats.sweeps.fetch_add(1, Ordering::Relaxed);

        let mut evicted = Vec::with_capacity(expired.len());
        for public_key in expired {
            let Some(session) = self
                .registry
                .remove_if_idle(&public_key, threshold, now)
                .await
            else {
                tracing::debug!(
                    peer = %fingerprint(&public_key),
                    "peer heartbeat arrived during sweep, keeping"
                );
                continue;
            };

            let key = public_key.clone();
            let record_deleted = match with_store(&self.store, move |s| s.delete(&key)).await {
                Ok(_) => true,
                Err(e) => {
                    self.stats.store_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        peer = %fingerprint(&public_key),
                        error = %e,
                        "failed to delete evicted peer record"
                    );
                    false
                }
            };

            let idle = session.idle_for(now);
            let event = EvictionEvent {
                public_key,
                username: session.identity.username,
                idle,
                record_deleted,
            };
            tracing::info!(
                peer = %fingerprint(&event.public_key),
                username = %event.username,
                idle_ms = event.idle.as_millis() as u64,
                "peer evicted for inactivity"
            );
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            // No subscribers is fine.
            let _ = self.events.send(event.clone());
            evicted.push(event);
        }

        evicted
    }

    /// Sweep on a fixed period until `shutdown` fires.
    ///
    /// Can be called again after it returns.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let start = tokio::time::Instant::now() + self.settings.first_sweep_delay;
        let mut interval = tokio::time::interval_at(start, self.settings.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            period_secs = self.settings.period.as_secs_f64(),
            threshold_secs = self.settings.threshold.as_secs_f64(),
            "inactivity reaper starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("inactivity reaper shutting down");
                    return;
                }
                _ = interval.tick() => {
                    let evicted = self.sweep().await;
                    if !evicted.is_empty() {
                        tracing::debug!(removed = evicted.len(), "sweep evicted peers");
                    }
                }
            }
        }
    }
}
