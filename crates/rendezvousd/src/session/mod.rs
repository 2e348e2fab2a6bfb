//! Peer sessions, one task per accepted TCP connection.

pub mod handler;
pub mod listener;

pub use handler::{SessionError, SessionHandler, SessionState};
pub use listener::SessionListener;

use rendezvous_core::RosterSource;
use rendezvous_services::{SharedRegistry, SharedStore};

/// Everything a session needs, cloned into each connection task.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: SharedRegistry,
    pub store: SharedStore,
    pub roster_source: RosterSource,
    pub max_frame_bytes: usize,
}
