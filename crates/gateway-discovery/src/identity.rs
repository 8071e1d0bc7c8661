//! Deterministic endpoint identities.
//!
//! A discovered address is named from what the gateway knows about it
//! (group, scheme, address, port), never from a registry-internal id, so the
//! same address always maps to the same endpoint across snapshots and
//! restarts.

use sha2::{Digest, Sha256};
use std::fmt;

const DIGEST_PREFIX_LEN: usize = 16;

/// Name of a discovered endpoint
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointIdentity(String);

impl EndpointIdentity {
    /// Derive the identity of `address:port` in `group`
    #[must_use]
    pub fn derive(group: &str, scheme: &str, address: &str, port: u16) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(group.as_bytes());
        hasher.update([0u8]);
        hasher.update(scheme.as_bytes());
        hasher.update([0u8]);
        hasher.update(address.as_bytes());
        hasher.update([0u8]);
        hasher.update(port.to_be_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("{group}-{}", &digest[..DIGEST_PREFIX_LEN]))
    }

    /// Identity as endpoint name
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
