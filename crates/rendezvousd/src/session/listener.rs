//! Inbound connection acceptor.
//!
//! Accepts peers on the configured TCP endpoint and spawns one
//! `SessionHandler` task per connection. Never waits on a session.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use rendezvous_core::peer::fingerprint;

use super::handler::{SessionError, SessionHandler};
use super::SessionContext;

const ACCEPT_BACKLOG: i32 = 1024;

pub struct SessionListener {
    listener: TcpListener,
    ctx: SessionContext,
    shutdown: broadcast::Receiver<()>,
}

impl SessionListener {
    /// Bind the listening socket. Failure here is fatal to the daemon.
    pub fn bind(
        addr: SocketAddr,
        ctx: SessionContext,
        shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<Self> {
        let socket = make_listener_socket(addr)?;
        Ok(Self {
            listener: TcpListener::from_std(socket)?,
            ctx,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(mut self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "peer listener accepting");
        }

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("peer listener shutting down");
                    return;
                }

                result = self.listener.accept() => {
                    let (stream, peer_addr) = match result {
                        Ok(r) => r,
                        Err(e) => {
                            // Usually fd exhaustion; back off instead of spinning.
                            tracing::warn!(error = %e, "accept failed");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };

                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(error = %e, "failed to set TCP_NODELAY");
                    }

                    tracing::debug!(%peer_addr, "connection accepted");
                    let handler = SessionHandler::new(stream, peer_addr, self.ctx.clone());
                    tokio::spawn(async move {
                        log_session_end(peer_addr, handler.run().await);
                    });
                }
            }
        }
    }
}

fn log_session_end(peer_addr: SocketAddr, result: Result<(), SessionError>) {
    match result {
        Ok(()) => tracing::debug!(%peer_addr, "peer disconnected"),
        Err(SessionError::Evicted(key)) => tracing::info!(
            %peer_addr,
            peer = %fingerprint(&key),
            "closing session of evicted peer"
        ),
        Err(e) => tracing::warn!(%peer_addr, error = %e, "session terminated"),
    }
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn make_listener_socket(addr: SocketAddr) -> std::io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(ACCEPT_BACKLOG)?;
    Ok(socket.into())
}
