use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::ContextSource;
use super::http::SecureHttpClient;
use crate::clock::Clock;
use crate::error::{OracleError, OracleResult};
use crate::types::{Bytes32, TargetChainContext};

/// Map a cluster name to its public RPC endpoint. `offline` maps to `None`;
/// anything else is taken as an RPC URL.
pub fn cluster_rpc_url(cluster: &str) -> Option<String> {
    match cluster.to_lowercase().as_str() {
        "offline" | "none" => None,
        "devnet" => Some("https://api.devnet.solana.com".to_string()),
        "testnet" => Some("https://api.testnet.solana.com".to_string()),
        "mainnet" | "mainnet-beta" => Some("https://api.mainnet-beta.solana.com".to_string()),
        _ => Some(cluster.to_string()),
    }
}

/// Uses the cluster's latest finalized blockhash and slot as attestation
/// context, so on-chain verifiers can reject stale attestations.
pub struct SolanaRpcContext {
    http: SecureHttpClient,
    url: Url,
}

#[derive(Deserialize)]
struct LatestBlockhashResponse {
    result: Option<LatestBlockhash>,
}

#[derive(Deserialize)]
struct LatestBlockhash {
    context: SlotContext,
    value: BlockhashValue,
}

#[derive(Deserialize)]
struct SlotContext {
    slot: u64,
}

#[derive(Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

impl SolanaRpcContext {
    pub fn new(http: SecureHttpClient, rpc_url: &str) -> OracleResult<Self> {
        let url = Url::parse(rpc_url)
            .map_err(|e| OracleError::Upstream(format!("invalid Solana RPC URL {}: {}", rpc_url, e)))?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl ContextSource for SolanaRpcContext {
    async fn current(&self) -> OracleResult<TargetChainContext> {
        let response = self
            .http
            .post_json_rpc(
                &self.url,
                "getLatestBlockhash",
                serde_json::json!([{ "commitment": "finalized" }]),
            )
            .await?;

        let context = parse_latest_blockhash(&response.body)?;
        debug!(
            "Solana context: slot {} blockhash {}",
            context.slot,
            context.recent_blockhash.to_base58()
        );
        Ok(context)
    }
}

fn parse_latest_blockhash(body: &[u8]) -> OracleResult<TargetChainContext> {
    let parsed: LatestBlockhashResponse = serde_json::from_slice(body)
        .map_err(|e| OracleError::Upstream(format!("getLatestBlockhash: {}", e)))?;
    let result = parsed
        .result
        .ok_or_else(|| OracleError::Upstream("getLatestBlockhash returned no result".to_string()))?;

    let recent_blockhash = Bytes32::from_base58(&result.value.blockhash)
        .map_err(|e| OracleError::Upstream(format!("getLatestBlockhash: {}", e)))?;

    Ok(TargetChainContext {
        recent_blockhash,
        slot: result.context.slot,
    })
}

/// Offline context: zero blockhash and the current unix time as the slot.
pub struct ClockContext {
    clock: Arc<dyn Clock>,
}

impl ClockContext {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl ContextSource for ClockContext {
    async fn current(&self) -> OracleResult<TargetChainContext> {
        Ok(TargetChainContext {
            recent_blockhash: Bytes32::ZERO,
            slot: self.clock.now_secs(),
        })
    }
}
