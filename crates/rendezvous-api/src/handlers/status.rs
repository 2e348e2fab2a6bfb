//! /status and /daemon/shutdown handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use rendezvous_services::with_store;

use super::ApiState;

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub online_peers: usize,
    /// `None` when the store could not be read.
    pub known_peers: Option<usize>,
    pub uptime_secs: u64,
    pub inactivity_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    pub roster_source: String,
    pub reaper: ReaperInfo,
}

#[derive(Serialize)]
pub struct ReaperInfo {
    pub sweeps: u64,
    pub evictions: u64,
    pub store_failures: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let online_peers = state.registry.len().await;
    let known_peers = match with_store(&state.store, |s| s.count()).await {
        Ok(n) => Some(n),
        Err(e) => {
            tracing::warn!(error = %e, "failed to count stored peers");
            None
        }
    };

    Json(StatusResponse {
        online_peers,
        known_peers,
        uptime_secs: state.started_at.elapsed().as_secs(),
        inactivity_timeout_secs: state.inactivity_timeout.as_secs(),
        sweep_interval_secs: state.sweep_interval.as_secs(),
        roster_source: state.roster_source.to_string(),
        reaper: ReaperInfo {
            sweeps: state.reaper.sweeps(),
            evictions: state.reaper.evictions(),
            store_failures: state.reaper.store_failures(),
        },
    })
}

// ── /daemon/shutdown ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());

    Json(ShutdownResponse {
        message: "Shutdown initiated".to_string(),
    })
}
