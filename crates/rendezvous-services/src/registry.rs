//! Presence registry — who is connected right now.
//!
//! One session per public key. Every operation takes the same lock exactly
//! once, so a reaper sweep and a concurrent heartbeat cannot interleave
//! inside an operation. Callers only ever get copies out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use rendezvous_core::PeerIdentity;

use crate::clock::SharedClock;

/// Live state for a registered peer.
#[derive(Debug, Clone)]
pub struct PeerSession {
    pub identity: PeerIdentity,
    /// When the current registration happened.
    pub registered_at: Instant,
    /// Last registration or heartbeat.
    pub last_ping: Instant,
}

impl PeerSession {
    /// Time since the last heartbeat.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_ping)
    }

    /// Silent for strictly longer than `threshold`.
    pub fn is_expired(&self, threshold: Duration, now: Instant) -> bool {
        self.idle_for(now) > threshold
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no session for peer {0}")]
    NotFound(String),
}

pub struct PresenceRegistry {
    sessions: Mutex<HashMap<String, PeerSession>>,
    clock: SharedClock,
}

/// The registry is shared between every session task, the reaper, and the API.
pub type SharedRegistry = Arc<PresenceRegistry>;

impl PresenceRegistry {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn shared(clock: SharedClock) -> SharedRegistry {
        Arc::new(Self::new(clock))
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Insert or replace the session for `identity.public_key`.
    /// Returns the session it replaced.
    pub async fn register(&self, identity: PeerIdentity) -> Option<PeerSession> {
        let now = self.clock.now();
        let key = identity.public_key.clone();
        self.sessions.lock().await.insert(
            key,
            PeerSession {
                identity,
                registered_at: now,
                last_ping: now,
            },
        )
    }

    /// Refresh the heartbeat time of an existing session.
    ///
    /// `NotFound` means the peer was never registered or has been evicted.
    /// It is never turned into a fresh registration.
    pub async fn touch(&self, public_key: &str) -> Result<(), RegistryError> {
        let now = self.clock.now();
        match self.sessions.lock().await.get_mut(public_key) {
            Some(session) => {
                session.last_ping = now;
                Ok(())
            }
            None => Err(RegistryError::NotFound(public_key.to_string())),
        }
    }

    pub async fn remove(&self, public_key: &str) -> Option<PeerSession> {
        self.sessions.lock().await.remove(public_key)
    }

    /// Remove the session only if it is still expired at `now`.
    ///
    /// A heartbeat that landed after `list_expired` keeps the peer.
    pub async fn remove_if_idle(
        &self,
        public_key: &str,
        threshold: Duration,
        now: Instant,
    ) -> Option<PeerSession> {
        let mut sessions = self.sessions.lock().await;
        let expired = sessions
            .get(public_key)
            .is_some_and(|s| s.is_expired(threshold, now));
        if expired {
            sessions.remove(public_key)
        } else {
            None
        }
    }

    /// Point-in-time copy of every registered identity, ordered by key.
    pub async fn snapshot(&self) -> Vec<PeerIdentity> {
        let mut peers: Vec<PeerIdentity> = self
            .sessions
            .lock()
            .await
            .values()
            .map(|s| s.identity.clone())
            .collect();
        peers.sort_by(|a, b| a.public_key.cmp(&b.public_key));
        peers
    }

    /// Point-in-time copy of every session, ordered by key.
    pub async fn sessions(&self) -> Vec<PeerSession> {
        let mut sessions: Vec<PeerSession> =
            self.sessions.lock().await.values().cloned().collect();
        sessions.sort_by(|a, b| a.identity.public_key.cmp(&b.identity.public_key));
        sessions
    }

    /// Keys whose last heartbeat is more than `threshold` before `now`.
    pub async fn list_expired(&self, threshold: Duration, now: Instant) -> Vec<String> {
        let mut keys: Vec<String> = self
            .sessions
            .lock()
            .await
            .iter()
            .filter(|(_, s)| s.is_expired(threshold, now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn contains(&self, public_key: &str) -> bool {
        self.sessions.lock().await.contains_key(public_key)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
