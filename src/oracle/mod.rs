//! Proof bundle lifecycle
//!
//! ```text
//! RefreshDriver ──fetch──► TranscriptCommitter ──► AttestationSigner
//!       │                                                │
//!       └──────────────── put(ProofBundle) ◄─────────────┘
//!                              │
//!                         ProofStore ◄── get() ── OracleProtocolServer
//! ```

pub mod bundle;
pub mod driver;
pub mod store;

pub use bundle::{PROOF_VERSION, ProofBundle};
pub use driver::{DriverConfig, RefreshDriver, RefreshStats};
pub use store::ProofStore;
