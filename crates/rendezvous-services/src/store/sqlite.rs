use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};

use rendezvous_core::PeerIdentity;

use super::{PeerRecord, PeerStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS peers (
    public_key   TEXT PRIMARY KEY,
    ip_address   TEXT NOT NULL,
    username     TEXT NOT NULL,
    last_ping_ms INTEGER NOT NULL
);
";

/// SQLite-backed peer store. One connection, serialised by a mutex.
pub struct SqlitePeerStore {
    conn: Mutex<Connection>,
}

impl SqlitePeerStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl PeerStore for SqlitePeerStore {
    fn upsert(&self, identity: &PeerIdentity, now_ms: u64) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO peers (public_key, ip_address, username, last_ping_ms)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(public_key) DO UPDATE SET
                 ip_address   = excluded.ip_address,
                 username     = excluded.username,
                 last_ping_ms = excluded.last_ping_ms",
            params![
                identity.public_key,
                identity.ip_address,
                identity.username,
                now_ms as i64
            ],
        )?;
        Ok(())
    }

    fn update_ping_time(&self, public_key: &str, now_ms: u64) -> Result<bool, StoreError> {
        let changed = self.conn()?.execute(
            "UPDATE peers SET last_ping_ms = ?1 WHERE public_key = ?2",
            params![now_ms as i64, public_key],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, public_key: &str) -> Result<bool, StoreError> {
        let changed = self
            .conn()?
            .execute("DELETE FROM peers WHERE public_key = ?1", params![public_key])?;
        Ok(changed > 0)
    }

    fn list_all(&self) -> Result<Vec<PeerRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT public_key, ip_address, username, last_ping_ms
             FROM peers ORDER BY public_key",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PeerRecord {
                identity: PeerIdentity {
                    public_key: row.get(0)?,
                    ip_address: row.get(1)?,
                    username: row.get(2)?,
                },
                last_ping_ms: row.get::<_, i64>(3)?.max(0) as u64,
            })
        })?;
        let records = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn prune_older_than(&self, cutoff_ms: u64) -> Result<usize, StoreError> {
        let removed = self.conn()?.execute(
            "DELETE FROM peers WHERE last_ping_ms < ?1",
            params![cutoff_ms as i64],
        )?;
        Ok(removed)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM peers", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
