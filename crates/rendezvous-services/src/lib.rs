//! rendezvous-services — presence state shared by every session: the live
//! registry, the durable peer store, and the inactivity reaper.

pub mod clock;
pub mod reaper;
pub mod registry;
pub mod store;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use reaper::{EvictionEvent, InactivityReaper, ReaperSettings, ReaperStats};
pub use registry::{PeerSession, PresenceRegistry, RegistryError, SharedRegistry};
#[cfg(any(test, feature = "test-util"))]
pub use store::FailingPeerStore;
pub use store::{
    with_store, MemoryPeerStore, PeerRecord, PeerStore, SharedStore, SqlitePeerStore, StoreError,
};
