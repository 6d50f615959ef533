//! Content digests — 16-byte MD5, used for both asset bytes and settings.
//!
//! Digests are compared to decide whether a peer's copy is stale. They are
//! always recomputed from content held locally; a digest received on the
//! wire only steers the decision to request, never what gets stored.

use serde::{Deserialize, Serialize};

/// A 16-byte content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 16]);

impl Digest {
    /// Compute the digest of a byte buffer.
    pub fn of(data: &[u8]) -> Self {
        Self(md5::compute(data).0)
    }

    /// Digest of a settings delta string (hashed as raw bytes).
    pub fn of_text(text: &str) -> Self {
        Self::of(text.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}
