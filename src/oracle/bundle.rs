use crate::crypto::{Attestation, Commitment, verification_hash_for, verify_attestation};
use crate::error::{OracleError, OracleResult};
use crate::types::BlockHeader;

pub const PROOF_VERSION: &str = "0.1.0";

/// Commitment, attestation and the block they cover, served as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBundle {
    pub commitment: Commitment,
    pub attestation: Attestation,
    pub raw_block: BlockHeader,
    pub created_at: u64,
    pub proof_version: String,
}

impl ProofBundle {
    pub fn new(
        commitment: Commitment,
        attestation: Attestation,
        raw_block: BlockHeader,
        created_at: u64,
    ) -> Self {
        Self {
            commitment,
            attestation,
            raw_block,
            created_at,
            proof_version: PROOF_VERSION.to_string(),
        }
    }

    /// Seconds since creation; zero if the clock is behind `created_at`.
    pub fn age_secs(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    /// The attestation must cover this bundle's commitment and carry a
    /// valid signature.
    pub fn validate(&self) -> OracleResult<()> {
        let expected = verification_hash_for(&self.commitment, &self.attestation.context);
        if expected != self.attestation.verification_hash {
            return Err(OracleError::InvalidBundle(
                "verification hash does not match commitment".to_string(),
            ));
        }

        if !verify_attestation(&self.attestation) {
            return Err(OracleError::InvalidBundle(
                "attestation signature does not verify".to_string(),
            ));
        }

        Ok(())
    }
}
