//! Peer identity — what a client claims to be when it connects.
//!
//! Identities are self-reported and never verified. The public key is an
//! opaque string and the only thing that distinguishes one peer from another.

use serde::{Deserialize, Serialize};

/// A peer's announced identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Unique identifier. Immutable once registered.
    pub public_key: String,
    /// Address other peers should use to reach this one.
    pub ip_address: String,
    /// Display name.
    pub username: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("public key is empty")]
    EmptyPublicKey,
}

impl PeerIdentity {
    pub fn new(
        public_key: impl Into<String>,
        ip_address: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            ip_address: ip_address.into(),
            username: username.into(),
        }
    }

    /// Reject identities that cannot be keyed.
    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.public_key.trim().is_empty() {
            return Err(IdentityError::EmptyPublicKey);
        }
        Ok(())
    }

    /// Short hex digest of the public key, for log lines.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key)
    }
}

/// Short hex digest of a public key. Keys can be arbitrarily long PEM or
/// base64 blobs; the first 8 bytes of the BLAKE3 hash are enough to tell
/// peers apart in logs.
pub fn fingerprint(public_key: &str) -> String {
    let hash = blake3::hash(public_key.as_bytes());
    hex::encode(&hash.as_bytes()[..8])
}
