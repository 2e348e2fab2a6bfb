//! HTTP API handlers — exposes presence state as JSON.

pub mod peers;
pub mod status;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rendezvous_core::RosterSource;
use rendezvous_services::{ReaperStats, SharedRegistry, SharedStore};

#[derive(Clone)]
pub struct ApiState {
    pub registry: SharedRegistry,
    pub store: SharedStore,
    pub reaper: Arc<ReaperStats>,
    pub inactivity_timeout: Duration,
    pub sweep_interval: Duration,
    pub roster_source: RosterSource,
    /// Daemon start, for uptime.
    pub started_at: Instant,
    /// Shutdown broadcast sender — signals graceful daemon shutdown.
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

pub use peers::{handle_known_peers, handle_peers};
pub use status::{handle_shutdown, handle_status};
