//! rendezvousd — presence and rendezvous daemon.
//!
//! Peers connect over TCP, announce themselves once, then heartbeat. Each
//! heartbeat is answered with the current roster. The binary in `main.rs`
//! only loads configuration and calls into [`server`].

pub mod server;
pub mod session;
