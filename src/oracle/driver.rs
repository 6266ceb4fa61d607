//! Refresh driver: fetch -> commit -> attest -> put, on a fixed interval.
//!
//! Any failure aborts the cycle before the store is touched, so readers keep
//! the last good bundle. Shutdown is only observed between cycles.

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::bundle::ProofBundle;
use super::store::ProofStore;
use crate::crypto::{AttestationSigner, TranscriptCommitter};
use crate::error::OracleResult;
use crate::source::{BlockSource, ContextSource};

#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Time between refresh cycles
    pub interval: Duration,
    /// Consecutive `SigningUnavailable` cycles before the driver gives up
    pub max_signing_failures: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_signing_failures: 5,
        }
    }
}

/// Refresh counters shared with the query server.
#[derive(Debug, Default)]
pub struct RefreshStats {
    consecutive_failures: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    consecutive_signing_failures: AtomicU32,
}

impl RefreshStats {
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn total_successes(&self) -> u64 {
        self.total_successes.load(Ordering::SeqCst)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::SeqCst)
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.consecutive_signing_failures.store(0, Ordering::SeqCst);
        self.total_successes.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the current signing-failure streak.
    fn record_failure(&self, signing_unavailable: bool) -> u32 {
        self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
        self.total_failures.fetch_add(1, Ordering::SeqCst);
        if signing_unavailable {
            self.consecutive_signing_failures.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.consecutive_signing_failures.load(Ordering::SeqCst)
        }
    }
}

pub struct RefreshDriver {
    source: Arc<dyn BlockSource>,
    context: Arc<dyn ContextSource>,
    committer: TranscriptCommitter,
    signer: AttestationSigner,
    store: Arc<ProofStore>,
    stats: Arc<RefreshStats>,
    config: DriverConfig,
}

impl RefreshDriver {
    pub fn new(
        source: Arc<dyn BlockSource>,
        context: Arc<dyn ContextSource>,
        committer: TranscriptCommitter,
        signer: AttestationSigner,
        store: Arc<ProofStore>,
        config: DriverConfig,
    ) -> Self {
        Self {
            source,
            context,
            committer,
            signer,
            store,
            stats: Arc::new(RefreshStats::default()),
            config,
        }
    }

    pub fn stats(&self) -> Arc<RefreshStats> {
        self.stats.clone()
    }

    /// One full cycle. The store is only written by the final step.
    pub async fn refresh_once(&self) -> OracleResult<u64> {
        let fetched = self.source.fetch().await?;
        let (header, commitment) = self
            .committer
            .commit_block(&fetched.body, &fetched.session)?;
        let context = self.context.current().await?;
        let attestation = self.signer.attest(&commitment, &context)?;

        let height = header.height;
        let created_at = commitment.timestamp;
        self.store
            .put(ProofBundle::new(commitment, attestation, header, created_at))
            .await?;

        Ok(height)
    }

    /// Run a cycle and update counters. Errors only when signing has been
    /// unavailable for `max_signing_failures` cycles in a row.
    pub async fn run_cycle(&self) -> Result<()> {
        match self.refresh_once().await {
            Ok(height) => {
                self.stats.record_success();
                info!(
                    "Refreshed ZK-TLS proof for block {} ({} total)",
                    height,
                    self.stats.total_successes()
                );
                Ok(())
            }
            Err(e) => {
                let signing_streak = self.stats.record_failure(e.is_signing_unavailable());
                warn!(
                    "Refresh cycle failed ({} in a row), keeping previous bundle: {}",
                    self.stats.consecutive_failures(),
                    e
                );

                if signing_streak >= self.config.max_signing_failures {
                    error!(
                        "Signing key unavailable for {} consecutive cycles",
                        signing_streak
                    );
                    return Err(anyhow::anyhow!(
                        "signing unavailable for {} consecutive cycles: {}",
                        signing_streak,
                        e
                    ));
                }
                Ok(())
            }
        }
    }

    /// Refresh until `shutdown` is cancelled. The first cycle runs at once.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(
            "Refresh driver started (interval {}s)",
            self.config.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping refresh driver");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            self.run_cycle().await?;
        }
    }
}
