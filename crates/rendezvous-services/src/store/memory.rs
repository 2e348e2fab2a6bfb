use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use rendezvous_core::PeerIdentity;

use super::{PeerRecord, PeerStore, StoreError};

/// In-memory peer store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryPeerStore {
    records: Mutex<BTreeMap<String, PeerRecord>>,
}

impl MemoryPeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<MutexGuard<'_, BTreeMap<String, PeerRecord>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl PeerStore for MemoryPeerStore {
    fn upsert(&self, identity: &PeerIdentity, now_ms: u64) -> Result<(), StoreError> {
        self.records()?.insert(
            identity.public_key.clone(),
            PeerRecord {
                identity: identity.clone(),
                last_ping_ms: now_ms,
            },
        );
        Ok(())
    }

    fn update_ping_time(&self, public_key: &str, now_ms: u64) -> Result<bool, StoreError> {
        Ok(match self.records()?.get_mut(public_key) {
            Some(record) => {
                record.last_ping_ms = now_ms;
                true
            }
            None => false,
        })
    }

    fn delete(&self, public_key: &str) -> Result<bool, StoreError> {
        Ok(self.records()?.remove(public_key).is_some())
    }

    fn list_all(&self) -> Result<Vec<PeerRecord>, StoreError> {
        Ok(self.records()?.values().cloned().collect())
    }

    fn prune_older_than(&self, cutoff_ms: u64) -> Result<usize, StoreError> {
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|_, r| r.last_ping_ms >= cutoff_ms);
        Ok(before - records.len())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records()?.len())
    }
}
