//! A store that fails on demand, for exercising store-outage paths.

use std::sync::atomic::{AtomicUsize, Ordering};

use rendezvous_core::PeerIdentity;

use super::{MemoryPeerStore, PeerRecord, PeerStore, StoreError};

/// Wraps a `MemoryPeerStore`. Either every call fails, or only the first
/// few upserts do and everything after reaches the inner store.
pub struct FailingPeerStore {
    inner: MemoryPeerStore,
    always: bool,
    upserts_to_fail: AtomicUsize,
}

impl FailingPeerStore {
    /// Every call fails.
    pub fn broken() -> Self {
        Self {
            inner: MemoryPeerStore::new(),
            always: true,
            upserts_to_fail: AtomicUsize::new(0),
        }
    }

    /// The first `count` upserts fail; everything else succeeds.
    pub fn failing_upserts(count: usize) -> Self {
        Self {
            inner: MemoryPeerStore::new(),
            always: false,
            upserts_to_fail: AtomicUsize::new(count),
        }
    }

    pub fn inner(&self) -> &MemoryPeerStore {
        &self.inner
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.always {
            return Err(StoreError::Unavailable("store is down".into()));
        }
        Ok(())
    }
}

impl PeerStore for FailingPeerStore {
    fn upsert(&self, identity: &PeerIdentity, now_ms: u64) -> Result<(), StoreError> {
        self.check()?;
        let failed = self
            .upserts_to_fail
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable("upsert rejected".into()));
        }
        self.inner.upsert(identity, now_ms)
    }

    fn update_ping_time(&self, public_key: &str, now_ms: u64) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.update_ping_time(public_key, now_ms)
    }

    fn delete(&self, public_key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(public_key)
    }

    fn list_all(&self) -> Result<Vec<PeerRecord>, StoreError> {
        self.check()?;
        self.inner.list_all()
    }

    fn prune_older_than(&self, cutoff_ms: u64) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.prune_older_than(cutoff_ms)
    }

    fn count(&self) -> Result<usize, StoreError> {
        self.check()?;
        self.inner.count()
    }
}
