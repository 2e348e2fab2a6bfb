//! rendezvous-core — shared types, wire format, and configuration.
//! All other Rendezvous crates depend on this one.

pub mod config;
pub mod peer;
pub mod wire;

pub use config::{RendezvousConfig, RosterSource};
pub use peer::{IdentityError, PeerIdentity};
pub use wire::{ClientCodec, ClientMessage, ServerCodec, ServerMessage, WireCodec, WireError};
