//! Error taxonomy for the refresh pipeline and the query transport.
//!
//! Missing proofs and unrecognized commands are not errors: the protocol
//! layer renders them as `{"error": ...}` documents.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    /// Source bytes could not be parsed into a block header.
    #[error("malformed source data: {0}")]
    MalformedSourceData(String),

    /// The oracle key could not be obtained for signing.
    #[error("signing unavailable: {0}")]
    SigningUnavailable(String),

    /// The upstream chain or target chain RPC could not be reached.
    #[error("upstream fetch failed: {0}")]
    Upstream(String),

    /// A client connection failed mid-request.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] std::io::Error),

    /// The store refused a bundle; the previous bundle stays in place.
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
}

impl OracleError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSourceData(reason.into())
    }

    pub fn is_signing_unavailable(&self) -> bool {
        matches!(self, Self::SigningUnavailable(_))
    }
}

pub type OracleResult<T> = Result<T, OracleError>;
