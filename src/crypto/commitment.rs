//! Session-bound commitments over fetched block data.
//!
//! A commitment binds the exact response bytes and the block header parsed
//! from them (`data_commitment`) to the TLS session that delivered them
//! (`session_fingerprint`). It is a transcript commitment, not a succinct
//! proof: auditing it requires the raw bytes and session metadata.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::canonical::{CanonicalHasher, DATA_DOMAIN, SESSION_DOMAIN, sha256};
use crate::clock::Clock;
use crate::error::OracleResult;
use crate::types::{BlockHeader, Bytes32, SessionMetadata};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub data_commitment: Bytes32,
    pub session_fingerprint: Bytes32,
    /// Unix seconds at generation
    pub timestamp: u64,
}

pub struct TranscriptCommitter {
    clock: Arc<dyn Clock>,
    last_timestamp: AtomicU64,
}

impl TranscriptCommitter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_timestamp: AtomicU64::new(0),
        }
    }

    /// Commit to `raw` as delivered over `session`.
    pub fn commit(&self, raw: &[u8], session: &SessionMetadata) -> OracleResult<Commitment> {
        self.commit_block(raw, session).map(|(_, commitment)| commitment)
    }

    /// Commit and also hand back the header the commitment covers.
    pub fn commit_block(
        &self,
        raw: &[u8],
        session: &SessionMetadata,
    ) -> OracleResult<(BlockHeader, Commitment)> {
        // Parse before reading the clock so malformed input leaves no trace.
        let header = BlockHeader::from_rpc_response(raw)?;
        let timestamp = self.next_timestamp();
        let commitment = Self::commit_header_at(raw, &header, session, timestamp);

        debug!(
            "Committed block {} ({} txs): {}",
            header.height,
            header.tx_hashes.len(),
            commitment.data_commitment
        );

        Ok((header, commitment))
    }

    /// Pure form of [`commit`](Self::commit) with an explicit timestamp.
    pub fn commit_at(
        raw: &[u8],
        session: &SessionMetadata,
        timestamp: u64,
    ) -> OracleResult<Commitment> {
        let header = BlockHeader::from_rpc_response(raw)?;
        Ok(Self::commit_header_at(raw, &header, session, timestamp))
    }

    fn commit_header_at(
        raw: &[u8],
        header: &BlockHeader,
        session: &SessionMetadata,
        timestamp: u64,
    ) -> Commitment {
        Commitment {
            data_commitment: data_commitment(raw, header),
            session_fingerprint: session_fingerprint(session),
            timestamp,
        }
    }

    fn next_timestamp(&self) -> u64 {
        let now = self.clock.now_secs();
        let previous = self.last_timestamp.fetch_max(now, Ordering::SeqCst);
        now.max(previous)
    }
}

/// `H(DATA_DOMAIN || len || raw || height || hash || timestamp || n || tx_hashes)`
pub fn data_commitment(raw: &[u8], header: &BlockHeader) -> Bytes32 {
    let mut hasher = CanonicalHasher::new(DATA_DOMAIN);
    hasher
        .bytes(raw)
        .u64(header.height)
        .fixed(&header.hash)
        .u64(header.timestamp)
        .u64(header.tx_hashes.len() as u64);
    for tx in &header.tx_hashes {
        hasher.fixed(tx);
    }
    hasher.finish()
}

pub fn session_fingerprint(session: &SessionMetadata) -> Bytes32 {
    let cert_digest = session
        .peer_certificate
        .as_deref()
        .map(sha256)
        .unwrap_or(Bytes32::ZERO);

    let mut hasher = CanonicalHasher::new(SESSION_DOMAIN);
    hasher
        .str(&session.endpoint)
        .str(session.peer_addr.as_deref().unwrap_or(""))
        .fixed(&cert_digest)
        .str(&session.protocol);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::OracleError;

    fn sample_response() -> Vec<u8> {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": "0",
            "result": {
                "block_header": {
                    "height": 100,
                    "hash": "aa".repeat(32),
                    "timestamp": 1700000000u64
                },
                "tx_hashes": ["11".repeat(32), "22".repeat(32)]
            }
        })
        .to_string()
        .into_bytes()
    }

    fn sample_session() -> SessionMetadata {
        SessionMetadata {
            endpoint: "https://node.example.org:38089/json_rpc".to_string(),
            peer_addr: Some("203.0.113.7:38089".to_string()),
            peer_certificate: Some(vec![0x30, 0x82, 0x01, 0x0a]),
            protocol: "HTTP/1.1".to_string(),
        }
    }

    fn committer(now: u64) -> (Arc<ManualClock>, TranscriptCommitter) {
        let clock = Arc::new(ManualClock::new(now));
        let committer = TranscriptCommitter::new(clock.clone());
        (clock, committer)
    }

    #[test]
    fn test_commitment_is_deterministic() {
        let (_, committer) = committer(1700000100);
        let raw = sample_response();
        let session = sample_session();

        let first = committer.commit(&raw, &session).unwrap();
        let second = committer.commit(&raw, &session).unwrap();

        assert_eq!(first.data_commitment, second.data_commitment);
        assert_eq!(first.session_fingerprint, second.session_fingerprint);
    }

    #[test]
    fn test_any_byte_change_alters_commitment() {
        let raw = sample_response();
        let session = sample_session();
        let baseline = TranscriptCommitter::commit_at(&raw, &session, 1).unwrap();

        // Flip the last hex digit of the block hash; the body stays parseable.
        let text = String::from_utf8(raw.clone()).unwrap();
        let tampered = text.replacen(&"aa".repeat(32), &format!("{}ab", "aa".repeat(31)), 1);
        assert_ne!(text, tampered);
        let changed =
            TranscriptCommitter::commit_at(tampered.as_bytes(), &session, 1).unwrap();
        assert_ne!(baseline.data_commitment, changed.data_commitment);

        // Whitespace outside the parsed fields is still committed.
        let mut padded = raw.clone();
        padded.push(b' ');
        let padded_commitment = TranscriptCommitter::commit_at(&padded, &session, 1).unwrap();
        assert_ne!(baseline.data_commitment, padded_commitment.data_commitment);
    }

    #[test]
    fn test_session_binding() {
        let raw = sample_response();
        let session = sample_session();
        let mut other = sample_session();
        other.peer_certificate = Some(vec![0xde, 0xad]);

        let a = TranscriptCommitter::commit_at(&raw, &session, 1).unwrap();
        let b = TranscriptCommitter::commit_at(&raw, &other, 1).unwrap();

        assert_eq!(a.data_commitment, b.data_commitment);
        assert_ne!(a.session_fingerprint, b.session_fingerprint);

        let mut no_cert = sample_session();
        no_cert.peer_certificate = None;
        assert_ne!(session_fingerprint(&session), session_fingerprint(&no_cert));
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let (clock, committer) = committer(1000);
        let raw = sample_response();
        let session = sample_session();

        let first = committer.commit(&raw, &session).unwrap();
        clock.set(900);
        let second = committer.commit(&raw, &session).unwrap();
        clock.set(1200);
        let third = committer.commit(&raw, &session).unwrap();

        assert_eq!(first.timestamp, 1000);
        assert_eq!(second.timestamp, 1000);
        assert_eq!(third.timestamp, 1200);
    }

    #[test]
    fn test_malformed_source_fails_fast() {
        let (_, committer) = committer(1000);
        let result = committer.commit(br#"{"result":{"block_header":{}}}"#, &sample_session());
        assert!(matches!(result, Err(OracleError::MalformedSourceData(_))));
    }

    #[test]
    fn test_commit_block_returns_parsed_header() {
        let (_, committer) = committer(1000);
        let raw = sample_response();
        let (header, commitment) = committer.commit_block(&raw, &sample_session()).unwrap();

        assert_eq!(header.height, 100);
        assert_eq!(header.tx_hashes.len(), 2);
        assert_eq!(commitment.data_commitment, data_commitment(&raw, &header));
    }
}
