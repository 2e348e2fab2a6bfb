//! Registration, heartbeats, and the roster they return.

use rendezvous_services::PeerStore;

use crate::*;

/// Two peers see each other in every roster.
#[tokio::test]
async fn test_two_peers_share_a_roster() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();

    let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    assert_eq!(keys(&alice.ping().await.unwrap()), vec!["pkAlice"]);

    let mut bob = TestPeer::join(server.addr, "pkBob", "bob").await.unwrap();
    let roster = bob.ping().await.unwrap();
    assert_eq!(keys(&roster), vec!["pkAlice", "pkBob"]);

    let roster = alice.ping().await.unwrap();
    assert_eq!(keys(&roster), vec!["pkAlice", "pkBob"]);
    let bob_entry = roster.iter().find(|p| p.public_key == "pkBob").unwrap();
    assert_eq!(bob_entry.username, "bob");
    assert_eq!(bob_entry.ip_address, "127.0.0.1");

    assert_eq!(server.store.count().unwrap(), 2);
    server.stop().await;
}

/// A disconnect is not a departure: the peer stays listed until evicted.
#[tokio::test]
async fn test_disconnected_peer_stays_listed() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();

    let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    alice.ping().await.unwrap();
    drop(alice);

    let mut bob = TestPeer::join(server.addr, "pkBob", "bob").await.unwrap();
    let roster = bob.ping().await.unwrap();
    assert_eq!(keys(&roster), vec!["pkAlice", "pkBob"]);

    server.stop().await;
}

/// Announcing the same key again replaces the stored identity.
#[tokio::test]
async fn test_reregistration_overwrites_identity() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();

    let mut first = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    first.ping().await.unwrap();

    let mut second = TestPeer::join(server.addr, "pkAlice", "alice-laptop")
        .await
        .unwrap();
    let roster = second.ping().await.unwrap();

    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].username, "alice-laptop");

    let records = server.store.list_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identity.username, "alice-laptop");

    server.stop().await;
}

/// A peer that stops heartbeating is evicted, dropped from the store, and
/// its next heartbeat ends the connection.
#[tokio::test]
async fn test_silent_peer_is_evicted() {
    let server = TestServer::start(
        ReaperSettings {
            period: Duration::from_millis(100),
            threshold: Duration::from_millis(300),
            first_sweep_delay: Duration::from_millis(100),
        },
        RosterSource::Registry,
    )
    .await
    .unwrap();
    let mut evictions = server.running.reaper.subscribe();

    let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    alice.ping().await.unwrap();
    assert_eq!(server.store.count().unwrap(), 1);

    let event = tokio::time::timeout(IO_TIMEOUT, evictions.recv())
        .await
        .expect("no eviction within timeout")
        .unwrap();
    assert_eq!(event.public_key, "pkAlice");
    assert_eq!(event.username, "alice");
    assert!(event.idle > Duration::from_millis(300));
    assert!(event.record_deleted);

    assert!(!server.registry.contains("pkAlice").await);
    assert_eq!(server.store.count().unwrap(), 0);

    // The evicted session is closed instead of re-registered.
    assert!(alice.ping().await.is_err());
    assert!(!server.registry.contains("pkAlice").await);

    server.stop().await;
}

/// Regular heartbeats keep a peer registered across many sweeps.
#[tokio::test]
async fn test_heartbeating_peer_is_kept() {
    let server = TestServer::start(
        ReaperSettings {
            period: Duration::from_millis(50),
            threshold: Duration::from_millis(400),
            first_sweep_delay: Duration::from_millis(50),
        },
        RosterSource::Registry,
    )
    .await
    .unwrap();

    let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    for _ in 0..8 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let roster = alice.ping().await.unwrap();
        assert_eq!(keys(&roster), vec!["pkAlice"]);
    }

    assert!(server.running.reaper.stats().sweeps() >= 2);
    assert_eq!(server.running.reaper.stats().evictions(), 0);

    server.stop().await;
}

/// With the store as roster source, recorded peers are listed even when no
/// session is live for them.
#[tokio::test]
async fn test_store_roster_includes_recorded_peers() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Store)
        .await
        .unwrap();
    server
        .store
        .upsert(&PeerIdentity::new("pkCarol", "10.0.0.3", "carol"), 0)
        .unwrap();

    let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    let roster = alice.ping().await.unwrap();
    assert_eq!(keys(&roster), vec!["pkAlice", "pkCarol"]);

    assert!(!server.registry.contains("pkCarol").await);
    server.stop().await;
}
