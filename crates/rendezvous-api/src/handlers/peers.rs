//! /peers and /peers/known handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use rendezvous_core::peer::fingerprint;
use rendezvous_services::with_store;

use super::ApiState;

// ── /peers ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<OnlinePeer>,
}

#[derive(Serialize)]
pub struct OnlinePeer {
    pub public_key: String,
    pub fingerprint: String,
    pub ip_address: String,
    pub username: String,
    pub idle_secs: u64,
    pub online_secs: u64,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    let now = state.registry.clock().now();
    let peers = state
        .registry
        .sessions()
        .await
        .into_iter()
        .map(|s| OnlinePeer {
            fingerprint: fingerprint(&s.identity.public_key),
            idle_secs: s.idle_for(now).as_secs(),
            online_secs: now.saturating_duration_since(s.registered_at).as_secs(),
            public_key: s.identity.public_key,
            ip_address: s.identity.ip_address,
            username: s.identity.username,
        })
        .collect();

    Json(PeersResponse { peers })
}

// ── /peers/known ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct KnownPeersResponse {
    pub peers: Vec<KnownPeer>,
}

#[derive(Serialize)]
pub struct KnownPeer {
    pub public_key: String,
    pub ip_address: String,
    pub username: String,
    pub last_ping_ms: u64,
}

pub async fn handle_known_peers(
    State(state): State<ApiState>,
) -> Result<Json<KnownPeersResponse>, (StatusCode, String)> {
    let records = with_store(&state.store, |s| s.list_all())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let peers = records
        .into_iter()
        .map(|r| KnownPeer {
            public_key: r.identity.public_key,
            ip_address: r.identity.ip_address,
            username: r.identity.username,
            last_ping_ms: r.last_ping_ms,
        })
        .collect();

    Ok(Json(KnownPeersResponse { peers }))
}
