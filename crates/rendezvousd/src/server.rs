//! Server wiring: opens the store, binds the listener, spawns the reaper.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use rendezvous_core::config::{ConfigError, RendezvousConfig};
use rendezvous_core::RosterSource;
use rendezvous_services::{
    Clock, InactivityReaper, PeerStore, ReaperSettings, SharedRegistry, SharedStore,
    SqlitePeerStore, StoreError,
};

use crate::session::{SessionContext, SessionListener};

/// Errors that stop the daemon before it serves anyone.
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("peer store: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    pub listen_addr: SocketAddr,
    pub reaper: ReaperSettings,
    pub roster_source: RosterSource,
    pub max_frame_bytes: usize,
}

impl ServerSettings {
    pub fn from_config(config: &RendezvousConfig) -> Self {
        Self {
            listen_addr: SocketAddr::new(config.network.listen_addr, config.network.port),
            reaper: ReaperSettings {
                period: config.presence.sweep_interval(),
                threshold: config.presence.inactivity_timeout(),
                first_sweep_delay: config.presence.first_sweep_delay(),
            },
            roster_source: config.presence.roster_source,
            max_frame_bytes: config.wire.max_frame_bytes,
        }
    }
}

/// Handles to a started server.
pub struct RunningServer {
    pub local_addr: SocketAddr,
    pub reaper: Arc<InactivityReaper>,
    pub listener_task: JoinHandle<()>,
    pub reaper_task: JoinHandle<()>,
}

/// Resolve the daemon configuration from `path`, environment overrides from
/// `lookup`, and an optional port argument, then validate it.
///
/// A missing file means defaults. A file that does not parse, a bad port
/// argument, or settings that fail validation stop the boot.
pub fn resolve_config(
    path: &Path,
    port_arg: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RendezvousConfig, BootError> {
    let mut config = RendezvousConfig::load_from(path)?;
    config.apply_overrides(lookup);

    if let Some(arg) = port_arg {
        config.network.port = arg
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid port argument {:?}", arg)))?;
    }
    config.validate()?;
    Ok(config)
}

/// Open the SQLite store and drop rows a previous run left behind.
pub fn open_store(config: &RendezvousConfig, clock: &dyn Clock) -> Result<SharedStore, BootError> {
    let store = SqlitePeerStore::open(&config.store.path)?;

    if config.store.prune_on_start {
        let timeout_ms = config.presence.inactivity_timeout().as_millis() as u64;
        let cutoff = clock.unix_millis().saturating_sub(timeout_ms);
        let pruned = store.prune_older_than(cutoff)?;
        if pruned > 0 {
            tracing::info!(pruned, "removed stale peer records from previous run");
        }
    }

    tracing::info!(
        path = %config.store.path.display(),
        records = store.count()?,
        "peer store ready"
    );
    Ok(Arc::new(store))
}

/// Bind the peer listener and start the listener and reaper tasks.
///
/// Both tasks stop when `shutdown` fires.
pub fn start(
    settings: ServerSettings,
    registry: SharedRegistry,
    store: SharedStore,
    shutdown: &broadcast::Sender<()>,
) -> Result<RunningServer, BootError> {
    let ctx = SessionContext {
        registry: registry.clone(),
        store: store.clone(),
        roster_source: settings.roster_source,
        max_frame_bytes: settings.max_frame_bytes,
    };

    let listener = SessionListener::bind(settings.listen_addr, ctx, shutdown.subscribe())
        .map_err(|source| BootError::Bind {
            addr: settings.listen_addr,
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| BootError::Bind {
        addr: settings.listen_addr,
        source,
    })?;

    let reaper = Arc::new(InactivityReaper::new(registry, store, settings.reaper));

    let listener_task = tokio::spawn(listener.run());
    let reaper_task = {
        let reaper = reaper.clone();
        let shutdown = shutdown.subscribe();
        tokio::spawn(async move { reaper.run(shutdown).await })
    };

    tracing::info!(
        %local_addr,
        roster_source = %settings.roster_source,
        "rendezvous server started"
    );

    Ok(RunningServer {
        local_addr,
        reaper,
        listener_task,
        reaper_task,
    })
}
