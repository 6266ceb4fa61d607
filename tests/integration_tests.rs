//! Integration tests for the ZK-TLS oracle
//!
//! Drives the real TCP server on an ephemeral port, fed by an in-memory
//! block source and a manual clock.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use zktls_oracle::{
    AttestationSigner, BlockSource, Bytes32, DriverConfig, ManualClock, OracleClient,
    OracleError, OracleProtocolServer, OracleResult, ProofStore, ProtocolConfig, RefreshDriver,
    SessionMetadata, StaticKey, TranscriptCommitter,
    crypto::{data_commitment, session_fingerprint},
    source::{ClockContext, SessionResponse},
    types::BlockHeader,
};

const START: u64 = 1700000100;

/// Serves queued responses in order; an empty queue is an upstream failure.
#[derive(Default)]
struct MemorySource {
    queue: Mutex<VecDeque<OracleResult<SessionResponse>>>,
}

impl MemorySource {
    fn push_block(&self, body: Vec<u8>) {
        self.queue.lock().unwrap().push_back(Ok(SessionResponse {
            body,
            session: session(),
        }));
    }

    fn push_failure(&self) {
        self.queue
            .lock()
            .unwrap()
            .push_back(Err(OracleError::Upstream("node unreachable".to_string())));
    }
}

#[async_trait]
impl BlockSource for MemorySource {
    async fn fetch(&self) -> OracleResult<SessionResponse> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Upstream("nothing queued".to_string())))
    }
}

fn session() -> SessionMetadata {
    SessionMetadata {
        endpoint: "https://node.monerodevs.org:38089/json_rpc".to_string(),
        peer_addr: Some("203.0.113.7:38089".to_string()),
        peer_certificate: Some(vec![0x30, 0x82, 0x01, 0x0a]),
        protocol: "HTTP/1.1".to_string(),
    }
}

fn block_body(height: u64, hash_byte: u8, timestamp: u64) -> Vec<u8> {
    serde_json::json!({
        "id": "0",
        "jsonrpc": "2.0",
        "result": {
            "block_header": {
                "height": height,
                "hash": hex::encode([hash_byte; 32]),
                "timestamp": timestamp
            },
            "tx_hashes": [hex::encode([0x11; 32])],
            "status": "OK"
        }
    })
    .to_string()
    .into_bytes()
}

struct TestOracle {
    source: Arc<MemorySource>,
    clock: Arc<ManualClock>,
    driver: RefreshDriver,
    client: OracleClient,
    addr: String,
    shutdown: CancellationToken,
}

impl Drop for TestOracle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_oracle() -> TestOracle {
    let source = Arc::new(MemorySource::default());
    let clock = Arc::new(ManualClock::new(START));
    let store = Arc::new(ProofStore::new());

    let driver = RefreshDriver::new(
        source.clone(),
        Arc::new(ClockContext::new(clock.clone())),
        TranscriptCommitter::new(clock.clone()),
        AttestationSigner::new(Arc::new(StaticKey::generate())),
        store.clone(),
        DriverConfig::default(),
    );

    let server = OracleProtocolServer::bind(
        "127.0.0.1:0",
        store,
        driver.stats(),
        clock.clone(),
        ProtocolConfig::default(),
    )
    .await
    .unwrap();
    let addr = server.local_addr().unwrap().to_string();

    let shutdown = CancellationToken::new();
    tokio::spawn(server.serve(shutdown.clone()));

    TestOracle {
        source,
        clock,
        driver,
        client: OracleClient::new(addr.clone()).with_timeout(Duration::from_secs(5)),
        addr,
        shutdown,
    }
}

mod presence {
    use super::*;

    #[tokio::test]
    async fn test_no_proof_before_first_refresh() {
        let oracle = start_oracle().await;

        for command in ["GET_ZK_PROOF", "GET_SOLANA_PROOF", "GET_LATEST_BLOCK", "GET_PROOF_BUNDLE"] {
            let response = oracle.client.query(command).await.unwrap();
            assert_eq!(response, serde_json::json!({ "error": "no active proof" }));
        }

        let status = oracle.client.query("GET_ORACLE_STATUS").await.unwrap();
        assert_eq!(status["has_active_proof"], false);
    }

    #[tokio::test]
    async fn test_proof_after_refresh_matches_independent_recomputation() {
        let oracle = start_oracle().await;
        let body = block_body(100, 0xAA, 1700000000);
        oracle.source.push_block(body.clone());

        oracle.driver.run_cycle().await.unwrap();

        let response = oracle.client.query("GET_ZK_PROOF").await.unwrap();
        let proof = &response["zk_tls_proof"];

        let header = BlockHeader::from_rpc_response(&body).unwrap();
        assert_eq!(header.height, 100);
        assert_eq!(header.hash, Bytes32([0xAA; 32]));
        assert_eq!(header.timestamp, 1700000000);

        let expected = TranscriptCommitter::commit_at(&body, &session(), START).unwrap();
        assert_eq!(expected.data_commitment, data_commitment(&body, &header));
        assert_eq!(proof["data_commitment"], expected.data_commitment.to_hex());
        assert_eq!(proof["session_fingerprint"], session_fingerprint(&session()).to_hex());
        assert_eq!(proof["timestamp"], START);

        let block = oracle.client.query("GET_LATEST_BLOCK").await.unwrap();
        assert_eq!(block["raw_data"]["block_header"]["height"], 100);
        assert_eq!(block["raw_data"]["block_header"]["hash"], "aa".repeat(32));
    }

    #[tokio::test]
    async fn test_bundle_fields_come_from_one_snapshot() {
        let oracle = start_oracle().await;
        oracle.source.push_block(block_body(100, 0xAA, 1700000000));
        oracle.driver.run_cycle().await.unwrap();

        let bundle = oracle.client.query("GET_PROOF_BUNDLE").await.unwrap();
        assert_eq!(bundle["zk_tls_proof"]["timestamp"], bundle["created_at"]);
        assert_eq!(bundle["raw_data"]["block_header"]["height"], 100);
        assert_eq!(bundle["proof_version"], "0.1.0");
    }
}

mod staleness {
    use super::*;

    #[tokio::test]
    async fn test_age_grows_after_failed_refresh() {
        let oracle = start_oracle().await;
        oracle.source.push_block(block_body(100, 0xAA, 1700000000));
        oracle.driver.run_cycle().await.unwrap();

        oracle.clock.advance(30);
        oracle.source.push_failure();
        oracle.driver.run_cycle().await.unwrap();

        let first = oracle.client.query("GET_ORACLE_STATUS").await.unwrap();
        assert_eq!(first["has_active_proof"], true);
        assert_eq!(first["proof_age_seconds"], 30);
        assert_eq!(first["consecutive_failures"], 1);
        assert_eq!(first["block_height"], 100);

        oracle.clock.advance(15);
        let second = oracle.client.query("GET_ORACLE_STATUS").await.unwrap();
        assert_eq!(second["proof_age_seconds"], 45);

        let proof = oracle.client.query("GET_ZK_PROOF").await.unwrap();
        assert_eq!(proof["zk_tls_proof"]["timestamp"], START);
    }

    #[tokio::test]
    async fn test_next_success_replaces_bundle() {
        let oracle = start_oracle().await;
        oracle.source.push_block(block_body(100, 0xAA, 1700000000));
        oracle.driver.run_cycle().await.unwrap();

        oracle.clock.advance(30);
        oracle.source.push_block(block_body(101, 0xBB, 1700000120));
        oracle.driver.run_cycle().await.unwrap();

        let status = oracle.client.query("GET_ORACLE_STATUS").await.unwrap();
        assert_eq!(status["block_height"], 101);
        assert_eq!(status["proof_age_seconds"], 0);
        assert_eq!(status["consecutive_failures"], 0);
    }
}

mod protocol {
    use super::*;

    #[tokio::test]
    async fn test_unknown_command_then_clean_close() {
        let oracle = start_oracle().await;

        let mut stream = TcpStream::connect(&oracle.addr).await.unwrap();
        stream.write_all(b"FOO\n").await.unwrap();

        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();

        let response: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(response, serde_json::json!({ "error": "unknown command" }));

        // Server closed its side: further reads hit EOF.
        let mut rest = Vec::new();
        assert_eq!(stream.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commands_are_case_insensitive() {
        let oracle = start_oracle().await;
        oracle.source.push_block(block_body(100, 0xAA, 1700000000));
        oracle.driver.run_cycle().await.unwrap();

        let upper = oracle.client.query_raw("GET_ZK_PROOF").await.unwrap();
        let lower = oracle.client.query_raw("get_zk_proof").await.unwrap();
        let mixed = oracle.client.query_raw("  Get_Zk_Proof\r").await.unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper, mixed);
    }

    #[tokio::test]
    async fn test_oversized_command_is_rejected() {
        let oracle = start_oracle().await;
        let long = "A".repeat(4096);

        let response = oracle.client.query(&long).await.unwrap();
        assert_eq!(response["error"], "unknown command");
    }

    #[tokio::test]
    async fn test_server_survives_silent_client() {
        let oracle = start_oracle().await;

        let stream = TcpStream::connect(&oracle.addr).await.unwrap();
        drop(stream);

        let status = oracle.client.query("GET_ORACLE_STATUS").await.unwrap();
        assert_eq!(status["network"], "zk-tls-monero");
    }
}

mod attestation {
    use super::*;

    #[tokio::test]
    async fn test_solana_proof_verifies_offline() {
        let oracle = start_oracle().await;
        oracle.source.push_block(block_body(100, 0xAA, 1700000000));
        oracle.driver.run_cycle().await.unwrap();

        let response = oracle.client.query("GET_SOLANA_PROOF").await.unwrap();
        let proof = &response["solana_proof"];

        let pubkey_bytes: [u8; 32] = bs58::decode(proof["oracle_pubkey"].as_str().unwrap())
            .into_vec()
            .unwrap()
            .try_into()
            .unwrap();
        let pubkey = VerifyingKey::from_bytes(&pubkey_bytes).unwrap();

        let signature_bytes: [u8; 64] = hex::decode(proof["signature"].as_str().unwrap())
            .unwrap()
            .try_into()
            .unwrap();
        let signature = Signature::from_bytes(&signature_bytes);

        let hash = hex::decode(proof["verification_hash"].as_str().unwrap()).unwrap();
        assert!(pubkey.verify(&hash, &signature).is_ok());

        let mut tampered = hash.clone();
        tampered[0] ^= 0x01;
        assert!(pubkey.verify(&tampered, &signature).is_err());
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queries_during_refresh_see_whole_bundles() {
        let oracle = start_oracle().await;
        oracle.source.push_block(block_body(1, 0x01, 1700000000));
        oracle.driver.run_cycle().await.unwrap();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let client = oracle.client.clone();
                tokio::spawn(async move {
                    for _ in 0..20 {
                        let bundle = client.query("GET_PROOF_BUNDLE").await.unwrap();
                        let height = bundle["raw_data"]["block_header"]["height"].as_u64().unwrap();
                        let hash = bundle["raw_data"]["block_header"]["hash"].as_str().unwrap();
                        assert_eq!(hash, hex::encode([height as u8; 32]));
                        assert_eq!(bundle["zk_tls_proof"]["timestamp"], bundle["created_at"]);
                    }
                })
            })
            .collect();

        for height in 2..=10u64 {
            oracle.clock.advance(1);
            oracle
                .source
                .push_block(block_body(height, height as u8, 1700000000 + height));
            oracle.driver.run_cycle().await.unwrap();
        }

        for reader in readers {
            reader.await.unwrap();
        }

        let status = oracle.client.query("GET_ORACLE_STATUS").await.unwrap();
        assert_eq!(status["block_height"], 10);
    }
}
