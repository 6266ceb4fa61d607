//! Fixed-width canonical encoding fed straight into SHA-256.
//!
//! Integers are 8-byte big-endian. Variable-length values carry an 8-byte
//! length prefix. Every digest starts with a domain tag so a commitment can
//! never be mistaken for a session fingerprint or a verification hash.

use sha2::{Digest, Sha256};

use crate::types::Bytes32;

pub const DATA_DOMAIN: &[u8] = b"zktls-oracle/data/v1";
pub const SESSION_DOMAIN: &[u8] = b"zktls-oracle/session/v1";
pub const ATTEST_DOMAIN: &[u8] = b"zktls-oracle/attest/v1";

pub struct CanonicalHasher {
    hasher: Sha256,
}

impl CanonicalHasher {
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_be_bytes());
        self
    }

    pub fn fixed(&mut self, value: &Bytes32) -> &mut Self {
        self.hasher.update(value.as_bytes());
        self
    }

    /// Length-prefixed bytes.
    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.u64(value.len() as u64);
        self.hasher.update(value);
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    pub fn finish(self) -> Bytes32 {
        Bytes32(self.hasher.finalize().into())
    }
}

/// Plain SHA-256, no domain tag.
pub fn sha256(data: &[u8]) -> Bytes32 {
    Bytes32(Sha256::digest(data).into())
}
