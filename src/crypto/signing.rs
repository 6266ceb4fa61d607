use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use rand::rngs::OsRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::canonical::{ATTEST_DOMAIN, CanonicalHasher};
use super::commitment::Commitment;
use crate::error::{OracleError, OracleResult};
use crate::types::{Bytes32, TargetChainContext};

/// Signed statement over a commitment, consumable by a target-chain verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attestation {
    pub verification_hash: Bytes32,
    pub oracle_pubkey: VerifyingKey,
    pub signature: Signature,
    pub context: TargetChainContext,
}

impl Attestation {
    /// Base58 public key, as Solana programs and wallets render it.
    pub fn pubkey_base58(&self) -> String {
        bs58::encode(self.oracle_pubkey.as_bytes()).into_string()
    }

    pub fn signature_hex(&self) -> String {
        hex::encode(self.signature.to_bytes())
    }
}

/// Access to the oracle's long-lived signing key.
pub trait KeyProvider: Send + Sync {
    fn signing_key(&self) -> OracleResult<SigningKey>;
}

/// Key held in memory for the lifetime of the process.
pub struct StaticKey {
    key: SigningKey,
}

impl StaticKey {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Generate a throwaway key from the OS RNG.
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let mut secret_bytes = [0u8; 32];
        csprng.fill_bytes(&mut secret_bytes);
        Self::new(SigningKey::from_bytes(&secret_bytes))
    }

    pub fn from_hex(secret_hex: &str) -> OracleResult<Self> {
        // The parse error echoes its input, so it is not forwarded.
        let secret = secret_hex.parse::<Bytes32>().map_err(|_| {
            OracleError::SigningUnavailable("signing key must be 32 bytes of hex".to_string())
        })?;
        Ok(Self::new(SigningKey::from_bytes(secret.as_bytes())))
    }
}

impl KeyProvider for StaticKey {
    fn signing_key(&self) -> OracleResult<SigningKey> {
        Ok(self.key.clone())
    }
}

/// Solana CLI keypair file (JSON array of 64 bytes, secret half first).
/// Re-read on every use so a rotated file takes effect on the next cycle.
pub struct KeypairFile {
    path: PathBuf,
}

impl KeypairFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyProvider for KeypairFile {
    fn signing_key(&self) -> OracleResult<SigningKey> {
        let unavailable = |reason: String| {
            OracleError::SigningUnavailable(format!("{}: {}", self.path.display(), reason))
        };

        let contents = std::fs::read_to_string(&self.path).map_err(|e| unavailable(e.to_string()))?;
        let bytes: Vec<u8> =
            serde_json::from_str(&contents).map_err(|e| unavailable(e.to_string()))?;
        let keypair: [u8; 64] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| unavailable(format!("expected 64 bytes, got {}", b.len())))?;

        SigningKey::from_keypair_bytes(&keypair).map_err(|e| unavailable(e.to_string()))
    }
}

pub struct AttestationSigner {
    keys: Arc<dyn KeyProvider>,
}

impl AttestationSigner {
    pub fn new(keys: Arc<dyn KeyProvider>) -> Self {
        Self { keys }
    }

    pub fn attest(
        &self,
        commitment: &Commitment,
        context: &TargetChainContext,
    ) -> OracleResult<Attestation> {
        let key = self.keys.signing_key()?;
        let verification_hash = verification_hash_for(commitment, context);
        let signature = key.sign(verification_hash.as_bytes());

        debug!(
            "Attested {} at slot {} with key {}",
            verification_hash,
            context.slot,
            bs58::encode(key.verifying_key().as_bytes()).into_string()
        );

        Ok(Attestation {
            verification_hash,
            oracle_pubkey: key.verifying_key(),
            signature,
            context: *context,
        })
    }

    /// Public key currently served by the key provider.
    pub fn public_key(&self) -> OracleResult<VerifyingKey> {
        Ok(self.keys.signing_key()?.verifying_key())
    }
}

/// `H(ATTEST_DOMAIN || data_commitment || session_fingerprint || blockhash || slot)`
pub fn verification_hash_for(commitment: &Commitment, context: &TargetChainContext) -> Bytes32 {
    let mut hasher = CanonicalHasher::new(ATTEST_DOMAIN);
    hasher
        .fixed(&commitment.data_commitment)
        .fixed(&commitment.session_fingerprint)
        .fixed(&context.recent_blockhash)
        .u64(context.slot);
    hasher.finish()
}

/// Check the signature against the embedded key and hash.
pub fn verify_attestation(attestation: &Attestation) -> bool {
    attestation
        .oracle_pubkey
        .verify(attestation.verification_hash.as_bytes(), &attestation.signature)
        .is_ok()
}
