//! rendezvousd — presence and rendezvous daemon.

use std::time::Instant;

use anyhow::{Context, Result};

use rendezvous_core::config::RendezvousConfig;
use rendezvous_services::{PresenceRegistry, SystemClock};

use rendezvousd::server::{self, ServerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = RendezvousConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = server::resolve_config(
        &RendezvousConfig::file_path(),
        std::env::args().nth(1).as_deref(),
        |key| std::env::var(key).ok(),
    )
    .context("invalid configuration")?;
    tracing::info!(
        port = config.network.port,
        timeout_secs = config.presence.inactivity_timeout_secs,
        "rendezvousd starting"
    );

    // Shared state
    let clock = SystemClock::shared();
    let store = server::open_store(&config, clock.as_ref()).context("failed to open peer store")?;
    let registry = PresenceRegistry::shared(clock);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let settings = ServerSettings::from_config(&config);
    let running = server::start(settings, registry.clone(), store.clone(), &shutdown_tx)
        .context("failed to start rendezvous server")?;

    // Status HTTP endpoint
    let api_port = config.network.api_port;
    if api_port != 0 {
        let state = rendezvous_api::ApiState {
            registry: registry.clone(),
            store: store.clone(),
            reaper: running.reaper.stats(),
            inactivity_timeout: config.presence.inactivity_timeout(),
            sweep_interval: config.presence.sweep_interval(),
            roster_source: config.presence.roster_source,
            started_at: Instant::now(),
            shutdown_tx: shutdown_tx.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = rendezvous_api::serve(state, api_port).await {
                tracing::error!(error = %e, "status server failed");
            }
        });
    } else {
        tracing::info!("status API disabled");
    }

    // ── Wait for exit ────────────────────────────────────────────────────────

    tokio::select! {
        _ = shutdown_rx.recv()         => tracing::info!("shutting down"),
        r = running.listener_task      => tracing::error!("peer listener exited: {:?}", r),
        r = running.reaper_task        => tracing::error!("inactivity reaper exited: {:?}", r),
    }

    Ok(())
}
