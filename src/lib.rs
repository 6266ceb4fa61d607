//! ZK-TLS Monero Oracle
//!
//! Periodically fetches the latest confirmed Monero block over an
//! authenticated TLS session, commits to the exact bytes received, signs the
//! commitment with an Ed25519 key for Solana-side verification, and serves the
//! newest proof bundle over a line-oriented TCP protocol.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Environment configuration and presets
//! ├── error.rs       - Error taxonomy
//! ├── types.rs       - Block header, session metadata, 32-byte values
//! ├── clock.rs       - Wall clock abstraction
//! ├── crypto/        - Commitments and attestations
//! │   ├── canonical.rs  - Domain-separated canonical hashing
//! │   ├── commitment.rs - Transcript commitments
//! │   └── signing.rs    - Ed25519 attestation signing
//! ├── source/        - Upstream data
//! │   ├── http.rs    - TLS client capturing session metadata
//! │   ├── monero.rs  - Monero daemon block source
//! │   └── solana.rs  - Attestation context (recent blockhash, slot)
//! ├── oracle/        - Proof lifecycle
//! │   ├── bundle.rs  - Proof bundle
//! │   ├── store.rs   - Latest-bundle store
//! │   └── driver.rs  - Periodic refresh driver
//! └── api/           - Query protocol
//!     ├── protocol.rs - Commands and JSON responses
//!     ├── server.rs   - TCP server
//!     └── client.rs   - Protocol client
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod oracle;
pub mod source;
pub mod types;

// Re-export main types for convenience
pub use api::{Command, OracleClient, OracleProtocolServer, ProtocolConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Network, OracleConfig};
pub use crypto::{
    Attestation, AttestationSigner, Commitment, KeyProvider, KeypairFile, StaticKey,
    TranscriptCommitter, verify_attestation,
};
pub use error::{OracleError, OracleResult};
pub use oracle::{DriverConfig, ProofBundle, ProofStore, RefreshDriver, RefreshStats};
pub use source::{BlockSource, ContextSource, MoneroRpcSource};
pub use types::{BlockHeader, Bytes32, SessionMetadata, TargetChainContext};
