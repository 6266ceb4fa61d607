//! Upstream collaborators: where block data and attestation context come from
//!
//! - `http.rs`   - HTTPS JSON-RPC client recording TLS session metadata
//! - `monero.rs` - Monero daemon block source
//! - `solana.rs` - Solana recent-blockhash context, with an offline fallback

pub mod http;
pub mod monero;
pub mod solana;

use async_trait::async_trait;

use crate::error::OracleResult;
use crate::types::TargetChainContext;

pub use http::{HttpSecurityConfig, SecureHttpClient, SessionResponse};
pub use monero::MoneroRpcSource;
pub use solana::{ClockContext, SolanaRpcContext, cluster_rpc_url};

/// Produces the raw bytes of one block observation and the session that
/// delivered them.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch(&self) -> OracleResult<SessionResponse>;
}

/// Produces the target-chain freshness reference for the next attestation.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn current(&self) -> OracleResult<TargetChainContext>;
}
