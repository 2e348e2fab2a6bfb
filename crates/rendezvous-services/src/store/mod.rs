//! Durable peer records.
//!
//! The store remembers the last-known identity of every peer that registered,
//! keyed by public key. It is written alongside the presence registry but
//! never inside the same transaction: a failed store call leaves the two
//! diverged until the next successful write for that peer.
//!
//! Two backends:
//! - `SqlitePeerStore`: the production store
//! - `MemoryPeerStore`: in-process map for tests and ephemeral runs

#[cfg(any(test, feature = "test-util"))]
mod failing;
mod memory;
mod sqlite;

#[cfg(any(test, feature = "test-util"))]
pub use failing::FailingPeerStore;
pub use memory::MemoryPeerStore;
pub use sqlite::SqlitePeerStore;

use std::sync::Arc;

use rendezvous_core::PeerIdentity;

/// One durable row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub identity: PeerIdentity,
    /// Wall-clock time of the last registration or heartbeat.
    pub last_ping_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("store task failed: {0}")]
    Task(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Key-addressed peer record store.
///
/// Every method is a single atomic operation from the store's point of view.
/// Calls block; async code goes through [`with_store`].
pub trait PeerStore: Send + Sync {
    /// Insert or overwrite the record for `identity.public_key`.
    fn upsert(&self, identity: &PeerIdentity, now_ms: u64) -> Result<(), StoreError>;

    /// Refresh the heartbeat time. Returns false if no row exists.
    fn update_ping_time(&self, public_key: &str, now_ms: u64) -> Result<bool, StoreError>;

    /// Returns false if no row existed.
    fn delete(&self, public_key: &str) -> Result<bool, StoreError>;

    /// All records, ordered by public key.
    fn list_all(&self) -> Result<Vec<PeerRecord>, StoreError>;

    /// Delete records whose last heartbeat is older than `cutoff_ms`.
    fn prune_older_than(&self, cutoff_ms: u64) -> Result<usize, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;
}

pub type SharedStore = Arc<dyn PeerStore>;

/// Run a store operation on the blocking pool.
pub async fn with_store<T, F>(store: &SharedStore, op: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn PeerStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
