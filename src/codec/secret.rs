//! # Secret Ring
//!
//! The ring holds the secret used to mint new artifacts plus a bounded,
//! most-recent-first history of the secrets it replaced. Readers take a
//! complete snapshot; the rotation scheduler publishes a new ring built by
//! copy-on-write, so a reader never observes a new `secret` paired with a
//! stale history.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use hkdf::Hkdf;
use sha2::Sha256;

/// Maximum number of previous secrets kept for decryption fallback.
pub const MAX_PREVIOUS: usize = 10;

const DERIVE_INFO: &[u8] = b"token-codec secret rotation";

/// Derive the secret for a rotation bucket.
///
/// HKDF-SHA256 with the counter (8-byte big-endian) as salt and `base` as
/// input keying material, hex encoded.
#[must_use]
pub fn derive(base: &str, counter: u64) -> String {
    let mut okm = [0u8; 32];
    // 32 bytes is always a valid HKDF-SHA256 output length
    let _ = Hkdf::<Sha256>::new(Some(&counter.to_be_bytes()), base.as_bytes())
        .expand(DERIVE_INFO, &mut okm);
    hex::encode(okm)
}

/// The rotation bucket `now_secs` falls into.
#[must_use]
pub const fn bucket(now_secs: u64, ttl_secs: u64) -> u64 {
    if ttl_secs == 0 {
        return 0;
    }
    now_secs / ttl_secs
}

/// Current secret plus the secrets it replaced.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretRing {
    /// Secret used to encrypt new artifacts.
    pub secret: String,

    /// Older secrets, most recent first, tried in order when `secret` fails
    /// to authenticate a token.
    pub previous_secrets: Vec<String>,
}

impl SecretRing {
    /// A ring from statically configured secrets.
    #[must_use]
    pub fn new(secret: impl Into<String>, mut previous_secrets: Vec<String>) -> Self {
        previous_secrets.truncate(MAX_PREVIOUS);
        Self {
            secret: secret.into(),
            previous_secrets,
        }
    }

    /// A ring reconstructed for rotation bucket `counter`: the bucket's
    /// secret is current and the preceding bucket's secret is kept so tokens
    /// minted just before a restart remain valid.
    #[must_use]
    pub fn seeded(base: &str, counter: u64) -> Self {
        let previous = counter.checked_sub(1).map(|c| derive(base, c)).into_iter().collect();
        Self::new(derive(base, counter), previous)
    }

    /// A new ring with `secret` current and the old current secret pushed to
    /// the front of the history.
    #[must_use]
    pub fn rotated(&self, secret: String) -> Self {
        let mut previous_secrets = Vec::with_capacity(MAX_PREVIOUS);
        previous_secrets.push(self.secret.clone());
        previous_secrets.extend(self.previous_secrets.iter().take(MAX_PREVIOUS - 1).cloned());
        Self {
            secret,
            previous_secrets,
        }
    }

    /// Secrets in decryption order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.secret.as_str()).chain(self.previous_secrets.iter().map(String::as_str))
    }
}

impl fmt::Debug for SecretRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRing")
            .field("secret", &"[redacted]")
            .field("previous_secrets", &self.previous_secrets.len())
            .finish()
    }
}

/// Shared, atomically swappable [`SecretRing`].
#[derive(Debug)]
pub struct SecretStore {
    ring: ArcSwap<SecretRing>,
    rotating: AtomicBool,
}

impl SecretStore {
    /// Create a store holding `ring`.
    #[must_use]
    pub fn new(ring: SecretRing) -> Self {
        Self {
            ring: ArcSwap::from_pointee(ring),
            rotating: AtomicBool::new(false),
        }
    }

    /// A consistent snapshot of the current ring.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SecretRing> {
        self.ring.load_full()
    }

    /// Publish a ring with `secret` as the current secret.
    pub fn rotate(&self, secret: &str) {
        self.ring.rcu(|ring| ring.rotated(secret.to_string()));
    }

    /// Mark the store as rotated by a scheduler. Returns `false` when one is
    /// already running.
    pub(crate) fn claim_rotation(&self) -> bool {
        !self.rotating.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release_rotation(&self) {
        self.rotating.store(false, Ordering::Release);
    }
}
