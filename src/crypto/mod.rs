//! Cryptographic core of the oracle
//!
//! - Canonical fixed-width encoding for SHA-256 digests
//! - Session-bound transcript commitments over block data
//! - Ed25519 attestations over commitments for target-chain verifiers

pub mod canonical;
pub mod commitment;
pub mod signing;

pub use commitment::{Commitment, TranscriptCommitter, data_commitment, session_fingerprint};
pub use signing::{
    Attestation, AttestationSigner, KeyProvider, KeypairFile, StaticKey, verification_hash_for,
    verify_attestation,
};
