//! Single-slot bundle store.
//!
//! The slot holds an `Arc<ProofBundle>`: `put` swaps the pointer under a
//! write lock held for the swap only, and `get` clones the pointer. Readers
//! therefore always hold a complete bundle that no one mutates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

use super::bundle::ProofBundle;
use crate::error::{OracleError, OracleResult};

#[derive(Default)]
pub struct ProofStore {
    slot: RwLock<Option<Arc<ProofBundle>>>,
    sequence: AtomicU64,
}

impl ProofStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current bundle. On error the previous bundle is kept.
    pub async fn put(&self, bundle: ProofBundle) -> OracleResult<()> {
        // Signature checks run before the lock is taken.
        bundle.validate()?;
        let bundle = Arc::new(bundle);

        let mut slot = self.slot.write().await;
        if let Some(current) = slot.as_ref()
            && bundle.created_at < current.created_at
        {
            return Err(OracleError::InvalidBundle(format!(
                "bundle created at {} is older than current bundle at {}",
                bundle.created_at, current.created_at
            )));
        }

        let height = bundle.raw_block.height;
        *slot = Some(bundle);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        drop(slot);

        info!("Stored proof bundle #{} for block {}", sequence, height);
        Ok(())
    }

    /// Current bundle snapshot, `None` before the first successful `put`.
    pub async fn get(&self) -> Option<Arc<ProofBundle>> {
        self.slot.read().await.clone()
    }

    /// Number of bundles accepted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
