use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::http::{SecureHttpClient, SessionResponse};
use super::BlockSource;
use crate::error::{OracleError, OracleResult};
use crate::types::BlockHeader;

/// Fetches confirmed blocks from a randomly chosen Monero daemon.
pub struct MoneroRpcSource {
    http: SecureHttpClient,
    nodes: Vec<Url>,
    confirmations: u64,
}

#[derive(Deserialize)]
struct BlockCountResponse {
    result: Option<BlockCount>,
}

#[derive(Deserialize)]
struct BlockCount {
    count: u64,
}

impl MoneroRpcSource {
    pub fn new(http: SecureHttpClient, nodes: &[String], confirmations: u64) -> OracleResult<Self> {
        let nodes = nodes
            .iter()
            .map(|node| {
                let base = http.validate_url(node)?;
                json_rpc_endpoint(base)
            })
            .collect::<OracleResult<Vec<_>>>()?;

        if nodes.is_empty() {
            return Err(OracleError::Upstream("no Monero nodes configured".to_string()));
        }

        info!("Monero block source over {} node(s)", nodes.len());

        Ok(Self {
            http,
            nodes,
            confirmations,
        })
    }

    fn pick_node(&self) -> OracleResult<Url> {
        let mut rng = rand::thread_rng();
        self.nodes
            .choose(&mut rng)
            .cloned()
            .ok_or_else(|| OracleError::Upstream("no Monero nodes configured".to_string()))
    }

    async fn block_count(&self, url: &Url) -> OracleResult<u64> {
        let response = self
            .http
            .post_json_rpc(url, "get_block_count", serde_json::json!({}))
            .await?;

        let parsed: BlockCountResponse = serde_json::from_slice(&response.body)
            .map_err(|e| OracleError::Upstream(format!("get_block_count: {}", e)))?;

        parsed
            .result
            .map(|r| r.count)
            .ok_or_else(|| OracleError::Upstream("get_block_count returned no result".to_string()))
    }
}

#[async_trait]
impl BlockSource for MoneroRpcSource {
    async fn fetch(&self) -> OracleResult<SessionResponse> {
        let url = self.pick_node()?;
        let count = self.block_count(&url).await?;
        let height = target_height(count, self.confirmations);

        debug!("Fetching block {} from {} (chain count {})", height, url, count);

        let response = self
            .http
            .post_json_rpc(&url, "get_block", serde_json::json!({ "height": height }))
            .await?;

        // A node answering for a different height is not the block we asked for.
        let header = BlockHeader::from_rpc_response(&response.body)?;
        if header.height != height {
            return Err(OracleError::malformed(format!(
                "requested block {} but node returned {}",
                height, header.height
            )));
        }

        Ok(response)
    }
}

/// Height of the newest block with the requested number of confirmations on top.
pub fn target_height(block_count: u64, confirmations: u64) -> u64 {
    block_count.saturating_sub(1).saturating_sub(confirmations)
}

fn json_rpc_endpoint(base: Url) -> OracleResult<Url> {
    if base.path().trim_end_matches('/').ends_with("json_rpc") {
        return Ok(base);
    }
    base.join("json_rpc")
        .map_err(|e| OracleError::Upstream(format!("invalid node URL {}: {}", base, e)))
}
