//! Per-connection protocol: Hello once, then Ping → Roster until the stream
//! closes.
//!
//! Store failures are logged and never end a session; a heartbeat that finds
//! its durable record missing writes it back. A heartbeat for a peer
//! the reaper already evicted ends the session; the handler never registers
//! the peer again on its behalf. Closing the connection leaves the registry
//! alone, eviction is the reaper's job.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

use rendezvous_core::peer::fingerprint;
use rendezvous_core::{
    ClientMessage, IdentityError, PeerIdentity, RosterSource, ServerCodec, ServerMessage,
    WireError,
};
use rendezvous_services::{with_store, RegistryError};

use super::SessionContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingIdentity,
    Active { identity: PeerIdentity },
    Terminated,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] WireError),
    #[error("invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),
    #[error("expected {expected} message, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },
    #[error("heartbeat for {got} on a session registered as {expected}")]
    KeyMismatch { expected: String, got: String },
    #[error("peer {0} is no longer registered")]
    Evicted(String),
}

pub struct SessionHandler<S> {
    framed: Framed<S, ServerCodec>,
    peer_addr: SocketAddr,
    ctx: SessionContext,
    state: SessionState,
}

impl<S> SessionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer_addr: SocketAddr, ctx: SessionContext) -> Self {
        let codec = ServerCodec::with_max_frame(ctx.max_frame_bytes);
        Self {
            framed: Framed::new(stream, codec),
            peer_addr,
            ctx,
            state: SessionState::AwaitingIdentity,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Drive the session to completion. `Ok` means the peer closed the
    /// stream; every other ending is an error. The transport is dropped
    /// when this returns.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let result = self.drive().await;
        self.state = SessionState::Terminated;
        result
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        while let Some(frame) = self.framed.next().await {
            let msg = frame?;

            let registered = match &self.state {
                SessionState::AwaitingIdentity => None,
                SessionState::Active { identity } => Some(identity.clone()),
                SessionState::Terminated => return Ok(()),
            };

            match (registered, msg) {
                (None, ClientMessage::Hello(identity)) => self.register(identity).await?,
                (Some(registered), ClientMessage::Ping { public_key }) => {
                    self.heartbeat(&registered, public_key).await?
                }
                (None, other) => {
                    return Err(SessionError::UnexpectedMessage {
                        expected: "hello",
                        got: other.kind(),
                    })
                }
                (Some(_), other) => {
                    return Err(SessionError::UnexpectedMessage {
                        expected: "ping",
                        got: other.kind(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn register(&mut self, identity: PeerIdentity) -> Result<(), SessionError> {
        identity.validate()?;

        let replaced = self.ctx.registry.register(identity.clone()).await;

        let now_ms = self.ctx.registry.clock().unix_millis();
        let record = identity.clone();
        if let Err(e) = with_store(&self.ctx.store, move |s| s.upsert(&record, now_ms)).await {
            tracing::warn!(
                peer = %identity.fingerprint(),
                error = %e,
                "failed to persist peer record"
            );
        }

        tracing::info!(
            peer = %identity.fingerprint(),
            addr = %self.peer_addr,
            ip = %identity.ip_address,
            username = %identity.username,
            replaced = replaced.is_some(),
            "peer online"
        );

        self.state = SessionState::Active { identity };
        Ok(())
    }

    async fn heartbeat(
        &mut self,
        registered: &PeerIdentity,
        public_key: String,
    ) -> Result<(), SessionError> {
        if public_key != registered.public_key {
            return Err(SessionError::KeyMismatch {
                expected: registered.public_key.clone(),
                got: public_key,
            });
        }

        let now_ms = self.ctx.registry.clock().unix_millis();
        let key = public_key.clone();
        let record_missing =
            match with_store(&self.ctx.store, move |s| s.update_ping_time(&key, now_ms)).await {
                Ok(refreshed) => !refreshed,
                Err(e) => {
                    tracing::warn!(
                        peer = %fingerprint(&public_key),
                        error = %e,
                        "failed to record heartbeat"
                    );
                    false
                }
            };

        match self.ctx.registry.touch(&public_key).await {
            Ok(()) => {}
            Err(RegistryError::NotFound(key)) => return Err(SessionError::Evicted(key)),
        }

        // Only a peer that is still registered gets its record back.
        if record_missing {
            self.restore_record(registered, now_ms).await;
        }

        let peers = self.roster().await;
        tracing::debug!(
            peer = %fingerprint(&public_key),
            roster = peers.len(),
            "heartbeat"
        );
        self.framed.send(ServerMessage::Roster { peers }).await?;
        Ok(())
    }

    /// Write back a durable record that went missing while the session
    /// stayed registered.
    async fn restore_record(&self, identity: &PeerIdentity, now_ms: u64) {
        let record = identity.clone();
        match with_store(&self.ctx.store, move |s| s.upsert(&record, now_ms)).await {
            Ok(()) => tracing::info!(
                peer = %identity.fingerprint(),
                "restored missing peer record"
            ),
            Err(e) => tracing::warn!(
                peer = %identity.fingerprint(),
                error = %e,
                "failed to restore peer record"
            ),
        }
    }

    async fn roster(&self) -> Vec<PeerIdentity> {
        match self.ctx.roster_source {
            RosterSource::Registry => self.ctx.registry.snapshot().await,
            RosterSource::Store => match with_store(&self.ctx.store, |s| s.list_all()).await {
                Ok(records) => records.into_iter().map(|r| r.identity).collect(),
                Err(e) => {
                    tracing::warn!(error = %e, "store roster unavailable, using live sessions");
                    self.ctx.registry.snapshot().await
                }
            },
        }
    }
}
