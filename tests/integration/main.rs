//! Rendezvous integration test harness.
//!
//! Every test runs an in-process server on an ephemeral loopback port and
//! talks to it over real TCP with the client codec. Nothing here needs root
//! or a running daemon.
//!
//!   cargo test --test integration

mod isolation;
mod persistence;
mod presence;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::codec::Framed;

use rendezvous_core::{ClientCodec, ClientMessage, PeerIdentity, RosterSource, ServerMessage};
use rendezvous_core::wire::DEFAULT_MAX_FRAME_BYTES;
use rendezvous_services::{
    MemoryPeerStore, PresenceRegistry, ReaperSettings, SharedRegistry, SharedStore, SystemClock,
};
use rendezvousd::server::{self, RunningServer, ServerSettings};

// ── Harness ───────────────────────────────────────────────────────────────────

/// How long any single read may take before a test fails.
pub const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Reaper settings far longer than any test, so nobody is evicted by accident.
pub fn quiet_reaper() -> ReaperSettings {
    ReaperSettings {
        period: Duration::from_secs(3600),
        threshold: Duration::from_secs(3600),
        first_sweep_delay: Duration::from_secs(3600),
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: SharedRegistry,
    pub store: SharedStore,
    pub running: RunningServer,
    shutdown: broadcast::Sender<()>,
}

impl TestServer {
    pub async fn start(reaper: ReaperSettings, roster_source: RosterSource) -> Result<Self> {
        Self::start_with_store(Arc::new(MemoryPeerStore::new()), reaper, roster_source).await
    }

    pub async fn start_with_store(
        store: SharedStore,
        reaper: ReaperSettings,
        roster_source: RosterSource,
    ) -> Result<Self> {
        let registry = PresenceRegistry::shared(SystemClock::shared());
        let (shutdown, _) = broadcast::channel(1);
        let settings = ServerSettings {
            listen_addr: "127.0.0.1:0".parse()?,
            reaper,
            roster_source,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        };
        let running = server::start(settings, registry.clone(), store.clone(), &shutdown)
            .context("failed to start test server")?;

        Ok(Self {
            addr: running.local_addr,
            registry,
            store,
            running,
            shutdown,
        })
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.running.listener_task.await;
        let _ = self.running.reaper_task.await;
    }
}

/// A client speaking the peer protocol.
pub struct TestPeer {
    pub identity: PeerIdentity,
    framed: Framed<TcpStream, ClientCodec>,
}

impl TestPeer {
    /// Connect and announce.
    pub async fn join(addr: SocketAddr, public_key: &str, username: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))?;
        let mut peer = Self {
            identity: PeerIdentity::new(public_key, "127.0.0.1", username),
            framed: Framed::new(stream, ClientCodec::new()),
        };
        peer.framed
            .send(ClientMessage::Hello(peer.identity.clone()))
            .await?;
        Ok(peer)
    }

    /// Heartbeat and return the roster the server answers with.
    pub async fn ping(&mut self) -> Result<Vec<PeerIdentity>> {
        self.framed
            .send(ClientMessage::Ping {
                public_key: self.identity.public_key.clone(),
            })
            .await?;
        match self.next_reply().await? {
            Some(ServerMessage::Roster { peers }) => Ok(peers),
            None => bail!("server closed the connection"),
        }
    }

    /// Next server message, or `None` once the server hung up.
    pub async fn next_reply(&mut self) -> Result<Option<ServerMessage>> {
        match tokio::time::timeout(IO_TIMEOUT, self.framed.next()).await {
            Err(_) => bail!("timed out waiting for the server"),
            Ok(None) => Ok(None),
            Ok(Some(Ok(msg))) => Ok(Some(msg)),
            // A reset after the server closed counts as a hang-up.
            Ok(Some(Err(_))) => Ok(None),
        }
    }
}

/// Sorted public keys of a roster.
pub fn keys(roster: &[PeerIdentity]) -> Vec<String> {
    let mut keys: Vec<_> = roster.iter().map(|p| p.public_key.clone()).collect();
    keys.sort();
    keys
}

/// A scratch directory unique to one test.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "rendezvous-it-{}-{}",
        name,
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

// ── Smoke ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_server_binds_ephemeral_port() {
    let server = TestServer::start(quiet_reaper(), RosterSource::Registry)
        .await
        .unwrap();
    assert_ne!(server.addr.port(), 0);
    assert!(server.registry.is_empty().await);
    server.stop().await;
}
