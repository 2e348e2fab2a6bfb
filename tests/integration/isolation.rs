//! A misbehaving peer only ever ends its own session.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::*;

async fn expect_hangup(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(IO_TIMEOUT, stream.read(&mut buf))
        .await
        .expect("server did not close the connection");
    // EOF or reset; either way nothing was sent back.
    assert!(matches!(read, Ok(0) | Err(_)), "unexpected reply: {read:?}");
}

/// Garbage from one connection does not disturb another peer's heartbeats.
#[tokio::test]
async fn test_malformed_frame_closes_only_that_session() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();
    let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    alice.ping().await.unwrap();

    let mut rogue = TcpStream::connect(server.addr).await.unwrap();
    let garbage = b"{not json";
    rogue
        .write_all(&(garbage.len() as u32).to_be_bytes())
        .await
        .unwrap();
    rogue.write_all(garbage).await.unwrap();
    expect_hangup(&mut rogue).await;

    let roster = alice.ping().await.unwrap();
    assert_eq!(keys(&roster), vec!["pkAlice"]);
    server.stop().await;
}

/// A ping before any hello is a protocol violation.
#[tokio::test]
async fn test_ping_before_hello_is_rejected() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    let frame = serde_json::to_vec(&serde_json::json!({
        "type": "ping",
        "public_key": "pkNobody",
    }))
    .unwrap();
    stream
        .write_all(&(frame.len() as u32).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(&frame).await.unwrap();
    expect_hangup(&mut stream).await;

    assert!(server.registry.is_empty().await);
    server.stop().await;
}

/// A frame announcing more than the frame limit is refused.
#[tokio::test]
async fn test_oversized_frame_is_rejected() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
    expect_hangup(&mut stream).await;

    server.stop().await;
}

/// Heartbeating under someone else's key ends the session without touching
/// the other peer.
#[tokio::test]
async fn test_foreign_key_heartbeat_is_rejected() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();
    let mut alice = TestPeer::join(server.addr, "pkAlice", "alice").await.unwrap();
    alice.ping().await.unwrap();

    let mut mallory = TestPeer::join(server.addr, "pkMallory", "mallory")
        .await
        .unwrap();
    mallory.ping().await.unwrap();
    mallory.identity.public_key = "pkAlice".into();
    assert!(mallory.ping().await.is_err());

    let roster = alice.ping().await.unwrap();
    assert_eq!(keys(&roster), vec!["pkAlice", "pkMallory"]);
    server.stop().await;
}

/// An empty public key is never registered.
#[tokio::test]
async fn test_blank_public_key_is_refused() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();

    let mut blank = TestPeer::join(server.addr, "  ", "ghost").await.unwrap();
    assert!(blank.next_reply().await.unwrap().is_none());
    assert!(server.registry.is_empty().await);
    server.stop().await;
}
