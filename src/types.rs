//! Shared data types for block data, session metadata and target-chain context.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{OracleError, OracleResult};

/// Fixed 32-byte value (hashes, commitments). Hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bytes32(pub [u8; 32]);

impl Bytes32 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    pub fn from_base58(s: &str) -> OracleResult<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| OracleError::malformed(format!("invalid base58 value: {}", e)))?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> OracleResult<Self> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            OracleError::malformed(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Bytes32 {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let bytes = hex::decode(trimmed)
            .map_err(|e| OracleError::malformed(format!("invalid hex value '{}': {}", s, e)))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({})", self.to_hex())
    }
}

impl Serialize for Bytes32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bytes32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Block header as observed from the upstream chain. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: Bytes32,
    pub timestamp: u64,
    pub tx_hashes: Vec<Bytes32>,
}

#[derive(Deserialize)]
struct RpcEnvelope {
    result: Option<GetBlockResult>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct GetBlockResult {
    block_header: RawBlockHeader,
    #[serde(default)]
    tx_hashes: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawBlockHeader {
    height: u64,
    hash: String,
    timestamp: u64,
    #[serde(default)]
    tx_hashes: Option<Vec<String>>,
}

impl BlockHeader {
    /// Parse a Monero `get_block` JSON-RPC response body.
    ///
    /// Transaction hashes are taken from `result.tx_hashes`, falling back to
    /// `result.block_header.tx_hashes`. A block without transactions omits both.
    pub fn from_rpc_response(raw: &[u8]) -> OracleResult<Self> {
        let envelope: RpcEnvelope = serde_json::from_slice(raw)
            .map_err(|e| OracleError::malformed(format!("unparseable block response: {}", e)))?;

        if let Some(err) = envelope.error {
            return Err(OracleError::malformed(format!(
                "rpc error {}: {}",
                err.code, err.message
            )));
        }

        let result = envelope
            .result
            .ok_or_else(|| OracleError::malformed("response has no result"))?;

        let hash = result
            .block_header
            .hash
            .parse::<Bytes32>()
            .map_err(|e| OracleError::malformed(format!("block hash: {}", e)))?;

        let tx_hashes = result
            .tx_hashes
            .or(result.block_header.tx_hashes)
            .unwrap_or_default()
            .iter()
            .map(|h| {
                h.parse::<Bytes32>()
                    .map_err(|e| OracleError::malformed(format!("tx hash: {}", e)))
            })
            .collect::<OracleResult<Vec<_>>>()?;

        Ok(Self {
            height: result.block_header.height,
            hash,
            timestamp: result.block_header.timestamp,
            tx_hashes,
        })
    }
}

/// Transport-level facts about the authenticated session that fetched data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMetadata {
    /// URL the data was fetched from
    pub endpoint: String,
    /// Remote socket address, when the transport reports it
    pub peer_addr: Option<String>,
    /// DER-encoded leaf certificate presented by the peer
    pub peer_certificate: Option<Vec<u8>>,
    /// Negotiated application protocol (e.g. "HTTP/1.1")
    pub protocol: String,
}

/// Target-chain freshness reference bound into every attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetChainContext {
    pub recent_blockhash: Bytes32,
    pub slot: u64,
}
