//! Durable peer records across daemon restarts.

use rendezvous_core::config::RendezvousConfig;
use rendezvous_services::{Clock, PeerStore, SqlitePeerStore};
use rendezvousd::server::open_store;

use crate::*;

/// Records written by one run survive into the next; stale ones are pruned
/// on boot.
#[tokio::test]
async fn test_sqlite_records_survive_restart_and_stale_ones_are_pruned() {
    let dir = scratch_dir("restart");
    let mut config = RendezvousConfig::default();
    config.store.path = dir.join("peers.db");
    let clock = SystemClock::shared();

    // First run: one live peer plus a record nobody has refreshed in a minute.
    {
        let store = open_store(&config, clock.as_ref()).unwrap();
        store
            .upsert(
                &PeerIdentity::new("pkStale", "10.0.0.9", "stale"),
                clock.unix_millis() - 60_000,
            )
            .unwrap();

        let server =
            TestServer::start_with_store(store.clone(), quiet_reaper(), RosterSource::Registry)
                .await
                .unwrap();
        let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
        alice.ping().await.unwrap();
        server.stop().await;
        assert_eq!(store.count().unwrap(), 2);
    }

    // Second run.
    let store = open_store(&config, clock.as_ref()).unwrap();
    let records = store.list_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity.public_key, "pkAlice");
    assert_eq!(records[0].identity.username, "alice");

    drop(store);
    let _ = std::fs::remove_dir_all(&dir);
}

/// Heartbeats refresh the stored ping time.
#[tokio::test]
async fn test_heartbeat_refreshes_stored_ping_time() {
    let dir = scratch_dir("heartbeat");
    let store: SharedStore = Arc::new(SqlitePeerStore::open(&dir.join("peers.db")).unwrap());
    let server = TestServer::start_with_store(store.clone(), quiet_reaper(), RosterSource::Store)
        .await
        .unwrap();

    let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    let roster = alice.ping().await.unwrap();
    assert_eq!(keys(&roster), vec!["pkAlice"]);
    let first = store.list_all().unwrap()[0].last_ping_ms;

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    alice.ping().await.unwrap();
    let second = store.list_all().unwrap()[0].last_ping_ms;
    assert!(second > first, "ping time not refreshed: {first} -> {second}");

    server.stop().await;
    drop(store);
    let _ = std::fs::remove_dir_all(&dir);
}
