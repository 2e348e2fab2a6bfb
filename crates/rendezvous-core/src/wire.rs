//! Rendezvous wire format — framed JSON messages over a TCP stream.
//!
//! Every message is one frame: a 4-byte big-endian length prefix followed by
//! a JSON object tagged by `"type"`. The protocol is positional, not keyed
//! by request IDs:
//!
//!   client → server  Hello   (exactly once, first)
//!   client → server  Ping    (repeatedly)
//!   server → client  Roster  (once per Ping)
//!
//! There is no disconnect message. A session ends when the stream closes.

use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::peer::PeerIdentity;

/// Default upper bound on a single frame body.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

// ── Messages ──────────────────────────────────────────────────────────────────

/// Messages sent by a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Registration. Must be the first message on a connection.
    Hello(PeerIdentity),
    /// Heartbeat for the key registered on this connection.
    Ping { public_key: String },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hello(_) => "hello",
            Self::Ping { .. } => "ping",
        }
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Known peers, sent in reply to every Ping.
    Roster { peers: Vec<PeerIdentity> },
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

// ── Codec ─────────────────────────────────────────────────────────────────────

/// Length-prefixed JSON codec. `Enc` is what this side writes, `Dec` is what
/// it reads.
///
/// Only inbound frames are capped by the configured limit. Outbound frames
/// may use the full 4-byte length range, since a roster grows with the peer
/// population.
pub struct WireCodec<Enc, Dec> {
    inbound: LengthDelimitedCodec,
    outbound: LengthDelimitedCodec,
    _marker: PhantomData<fn(Enc) -> Dec>,
}

/// Codec used by the server: reads `ClientMessage`, writes `ServerMessage`.
pub type ServerCodec = WireCodec<ServerMessage, ClientMessage>;

/// Codec used by peers: reads `ServerMessage`, writes `ClientMessage`.
pub type ClientCodec = WireCodec<ClientMessage, ServerMessage>;

impl<Enc, Dec> WireCodec<Enc, Dec> {
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Refuse inbound frames longer than `max_frame_bytes`.
    pub fn with_max_frame(max_frame_bytes: usize) -> Self {
        Self {
            inbound: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_bytes)
                .new_codec(),
            outbound: LengthDelimitedCodec::builder()
                .max_frame_length(u32::MAX as usize)
                .new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<Enc, Dec> Default for WireCodec<Enc, Dec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Enc, Dec: DeserializeOwned> Decoder for WireCodec<Enc, Dec> {
    type Item = Dec;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Dec>, WireError> {
        match self.inbound.decode(src)? {
            Some(frame) => serde_json::from_slice(&frame)
                .map(Some)
                .map_err(WireError::Decode),
            None => Ok(None),
        }
    }
}

impl<Enc: Serialize, Dec> Encoder<Enc> for WireCodec<Enc, Dec> {
    type Error = WireError;

    fn encode(&mut self, item: Enc, dst: &mut BytesMut) -> Result<(), WireError> {
        let body = serde_json::to_vec(&item).map_err(WireError::Encode)?;
        self.outbound.encode(Bytes::from(body), dst)?;
        Ok(())
    }
}
