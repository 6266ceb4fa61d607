//! Query commands and their JSON responses.
//!
//! Every response is built from a single bundle snapshot taken by the
//! caller, so one reply never mixes fields of two bundles.

use serde::Serialize;

use crate::oracle::{ProofBundle, RefreshStats};
use crate::types::{BlockHeader, Bytes32};

pub const NO_ACTIVE_PROOF: &str = "no active proof";
pub const UNKNOWN_COMMAND: &str = "unknown command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    OracleStatus,
    ZkProof,
    SolanaProof,
    LatestBlock,
    ProofBundle,
    Unknown,
}

impl Command {
    /// Case-insensitive; surrounding whitespace (including `\r\n`) is ignored.
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_uppercase().as_str() {
            "GET_ORACLE_STATUS" => Self::OracleStatus,
            "GET_ZK_PROOF" => Self::ZkProof,
            "GET_SOLANA_PROOF" => Self::SolanaProof,
            "GET_LATEST_BLOCK" => Self::LatestBlock,
            "GET_PROOF_BUNDLE" => Self::ProofBundle,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OracleStatus => "GET_ORACLE_STATUS",
            Self::ZkProof => "GET_ZK_PROOF",
            Self::SolanaProof => "GET_SOLANA_PROOF",
            Self::LatestBlock => "GET_LATEST_BLOCK",
            Self::ProofBundle => "GET_PROOF_BUNDLE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub has_active_proof: bool,
    pub proof_age_seconds: Option<u64>,
    pub proof_version: Option<String>,
    pub block_height: Option<u64>,
    pub consecutive_failures: u64,
    pub network: String,
}

#[derive(Debug, Serialize)]
pub struct ZkTlsProofView {
    pub data_commitment: Bytes32,
    pub session_fingerprint: Bytes32,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct SolanaProofView {
    pub verification_hash: Bytes32,
    pub oracle_pubkey: String,
    pub signature: String,
    pub recent_blockhash: String,
    pub slot: u64,
}

#[derive(Debug, Serialize)]
pub struct RawDataView<'a> {
    pub block_header: &'a BlockHeader,
}

#[derive(Serialize)]
struct ZkProofResponse {
    zk_tls_proof: ZkTlsProofView,
}

#[derive(Serialize)]
struct SolanaProofResponse {
    solana_proof: SolanaProofView,
}

#[derive(Serialize)]
struct LatestBlockResponse<'a> {
    raw_data: RawDataView<'a>,
}

#[derive(Serialize)]
struct BundleResponse<'a> {
    zk_tls_proof: ZkTlsProofView,
    solana_proof: SolanaProofView,
    raw_data: RawDataView<'a>,
    proof_version: &'a str,
    created_at: u64,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

impl ZkTlsProofView {
    fn of(bundle: &ProofBundle) -> Self {
        Self {
            data_commitment: bundle.commitment.data_commitment,
            session_fingerprint: bundle.commitment.session_fingerprint,
            timestamp: bundle.commitment.timestamp,
        }
    }
}

impl SolanaProofView {
    fn of(bundle: &ProofBundle) -> Self {
        let attestation = &bundle.attestation;
        Self {
            verification_hash: attestation.verification_hash,
            oracle_pubkey: attestation.pubkey_base58(),
            signature: attestation.signature_hex(),
            recent_blockhash: attestation.context.recent_blockhash.to_base58(),
            slot: attestation.context.slot,
        }
    }
}

/// Inputs a response may depend on besides the bundle.
pub struct QueryContext<'a> {
    pub now: u64,
    pub stats: &'a RefreshStats,
    pub network: &'a str,
}

/// Render the JSON document answering `command` against `snapshot`.
pub fn respond(command: Command, snapshot: Option<&ProofBundle>, ctx: &QueryContext<'_>) -> String {
    let rendered = match (command, snapshot) {
        (Command::OracleStatus, _) => serde_json::to_string(&StatusResponse {
            has_active_proof: snapshot.is_some(),
            proof_age_seconds: snapshot.map(|b| b.age_secs(ctx.now)),
            proof_version: snapshot.map(|b| b.proof_version.clone()),
            block_height: snapshot.map(|b| b.raw_block.height),
            consecutive_failures: ctx.stats.consecutive_failures(),
            network: ctx.network.to_string(),
        }),
        (Command::Unknown, _) => return error_json(UNKNOWN_COMMAND),
        (_, None) => return error_json(NO_ACTIVE_PROOF),
        (Command::ZkProof, Some(bundle)) => serde_json::to_string(&ZkProofResponse {
            zk_tls_proof: ZkTlsProofView::of(bundle),
        }),
        (Command::SolanaProof, Some(bundle)) => serde_json::to_string(&SolanaProofResponse {
            solana_proof: SolanaProofView::of(bundle),
        }),
        (Command::LatestBlock, Some(bundle)) => serde_json::to_string(&LatestBlockResponse {
            raw_data: RawDataView {
                block_header: &bundle.raw_block,
            },
        }),
        (Command::ProofBundle, Some(bundle)) => serde_json::to_string(&BundleResponse {
            zk_tls_proof: ZkTlsProofView::of(bundle),
            solana_proof: SolanaProofView::of(bundle),
            raw_data: RawDataView {
                block_header: &bundle.raw_block,
            },
            proof_version: &bundle.proof_version,
            created_at: bundle.created_at,
        }),
    };

    match rendered {
        Ok(json) => json,
        Err(e) => error_json(&format!("failed to serialize response: {}", e)),
    }
}

pub fn error_json(message: &str) -> String {
    serde_json::to_string(&ErrorResponse { error: message })
        .unwrap_or_else(|_| r#"{"error":"internal error"}"#.to_string())
}
