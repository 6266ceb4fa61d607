use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::fmt::format::FmtSpan;

use zktls_oracle::{
    AttestationSigner, ContextSource, KeyProvider, KeypairFile, MoneroRpcSource,
    OracleConfig, OracleProtocolServer, ProofStore, RefreshDriver, StaticKey, SystemClock,
    TranscriptCommitter,
    clock::Clock,
    source::{ClockContext, SecureHttpClient, SolanaRpcContext, cluster_rpc_url},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - this validates nodes and key material
    let config = OracleConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check ZKTLS_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    if config.monero.allowed_domains.is_empty() {
        warn!("No domain allowlist configured - any Monero node host is accepted");
    }

    info!("Starting ZK-TLS Monero oracle ({:?})", config.network);
    info!(
        "Upstream: {} node(s), HTTPS required: {}, confirmations: {}",
        config.monero.nodes.len(),
        config.monero.require_https,
        config.monero.confirmations
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Signing key
    let keys = key_provider(&config)?;
    let signer = AttestationSigner::new(keys);
    match signer.public_key() {
        Ok(pubkey) => info!(
            "Oracle public key: {}",
            bs58::encode(pubkey.as_bytes()).into_string()
        ),
        // The driver stops after repeated signing failures.
        Err(e) => warn!("Signing key unavailable at startup: {}", e),
    }

    // Upstream block source
    let upstream = SecureHttpClient::new(config.upstream_http())?;
    let source = MoneroRpcSource::new(upstream, &config.monero.nodes, config.monero.confirmations)
        .context("Failed to configure Monero block source")?;

    // Attestation context
    let context: Arc<dyn ContextSource> = match cluster_rpc_url(&config.solana.cluster) {
        Some(rpc_url) => {
            info!("Attestation context from Solana RPC {}", rpc_url);
            let http = SecureHttpClient::new(config.context_http())?;
            Arc::new(
                SolanaRpcContext::new(http, &rpc_url)
                    .context("Failed to configure Solana context source")?,
            )
        }
        None => {
            warn!("Solana cluster is offline - attestations carry a zero blockhash");
            Arc::new(ClockContext::new(clock.clone()))
        }
    };

    let store = Arc::new(ProofStore::new());
    let driver = RefreshDriver::new(
        Arc::new(source),
        context,
        TranscriptCommitter::new(clock.clone()),
        signer,
        store.clone(),
        config.driver(),
    );

    let server = OracleProtocolServer::bind(
        &config.bind_addr(),
        store,
        driver.stats(),
        clock,
        config.protocol(),
    )
    .await?;

    let shutdown = CancellationToken::new();
    let mut driver_task = tokio::spawn(driver.run(shutdown.clone()));
    let server_task = tokio::spawn(server.serve(shutdown.clone()));

    let mut fatal = None;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        }
        result = &mut driver_task => {
            fatal = Some(match result {
                Ok(Ok(())) => anyhow::anyhow!("refresh driver stopped unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => anyhow::anyhow!("refresh driver panicked: {}", e),
            });
        }
    }

    shutdown.cancel();

    if fatal.is_none() {
        match driver_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => fatal = Some(e),
            Err(e) => error!("Refresh driver task failed: {}", e),
        }
    }
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Server error: {}", e),
        Err(e) => error!("Server task failed: {}", e),
    }

    if let Some(e) = fatal {
        error!("Oracle stopped: {:#}", e);
        return Err(e);
    }

    info!("Oracle stopped");
    Ok(())
}

fn key_provider(config: &OracleConfig) -> Result<Arc<dyn KeyProvider>> {
    if let Some(secret) = &config.signing.signing_key_hex {
        info!("Using signing key from ZKTLS_SIGNING_KEY");
        return Ok(Arc::new(StaticKey::from_hex(secret)?));
    }

    if let Some(path) = &config.signing.keypair_path {
        info!("Using signing keypair file {}", path.display());
        return Ok(Arc::new(KeypairFile::new(path.clone())));
    }

    warn!("No signing key configured - generated an ephemeral key, attestations will not survive a restart");
    Ok(Arc::new(StaticKey::generate()))
}

/// Initialize logging based on configuration
fn init_logging(config: &OracleConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(if config.logging.log_connections {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
