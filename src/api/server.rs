//! Line-protocol TCP server.
//!
//! Each connection carries exactly one command: read one line, answer with
//! one JSON document, close. Connection failures stay local to the
//! connection and never stop the accept loop.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::protocol::{Command, QueryContext, respond};
use crate::clock::Clock;
use crate::error::{OracleError, OracleResult};
use crate::oracle::{ProofStore, RefreshStats};

/// Upper bound on input discarded after an over-long command.
const DRAIN_LIMIT: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Time allowed for the client to send its command line
    pub read_timeout: Duration,
    /// Longest accepted command line, excluding the newline
    pub max_command_bytes: usize,
    /// Network label reported by `GET_ORACLE_STATUS`
    pub network: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            max_command_bytes: 1024,
            network: "zk-tls-monero".to_string(),
        }
    }
}

struct Shared {
    store: Arc<ProofStore>,
    stats: Arc<RefreshStats>,
    clock: Arc<dyn Clock>,
    config: ProtocolConfig,
}

pub struct OracleProtocolServer {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl OracleProtocolServer {
    pub async fn bind(
        addr: &str,
        store: Arc<ProofStore>,
        stats: Arc<RefreshStats>,
        clock: Arc<dyn Clock>,
        config: ProtocolConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                store,
                stats,
                clock,
                config,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Listener has no local address")
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        info!("ZK-TLS oracle listening on {}", self.local_addr()?);

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Connection error: {}", e);
                        continue;
                    }
                },
            };

            let shared = self.shared.clone();
            let span = info_span!("connection", %peer);
            tokio::spawn(
                async move {
                    if let Err(e) = handle_connection(stream, &shared).await {
                        warn!("Client handler error: {}", e);
                    }
                }
                .instrument(span),
            );
        }
    }
}

async fn handle_connection(mut stream: TcpStream, shared: &Shared) -> OracleResult<()> {
    let config = &shared.config;
    let (read_half, mut write_half) = stream.split();

    // Room for a CRLF terminator; any byte beyond it marks the line as too long.
    let limit = (config.max_command_bytes as u64).saturating_add(2);
    let mut reader = BufReader::new(read_half).take(limit);
    let mut line = Vec::new();

    let read = tokio::time::timeout(config.read_timeout, reader.read_until(b'\n', &mut line))
        .await
        .map_err(|_| {
            OracleError::TransportFailure(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "timed out waiting for command",
            ))
        })??;

    if read == 0 {
        debug!("Client closed before sending a command");
        return Ok(());
    }

    let body = strip_line_ending(&line);
    let oversized = body.len() > config.max_command_bytes;
    let command = if oversized {
        Command::Unknown
    } else {
        Command::parse(&String::from_utf8_lossy(body))
    };

    // Single snapshot per request.
    let snapshot = shared.store.get().await;
    let ctx = QueryContext {
        now: shared.clock.now_secs(),
        stats: &shared.stats,
        network: &config.network,
    };
    let mut response = respond(command, snapshot.as_deref(), &ctx);
    response.push('\n');

    write_half.write_all(response.as_bytes()).await?;
    write_half.shutdown().await?;

    // Closing with unread input resets the connection and can destroy the
    // response before the client reads it.
    if oversized {
        let mut rest = reader.into_inner().take(DRAIN_LIMIT);
        let mut sink = tokio::io::sink();
        let drain = tokio::io::copy(&mut rest, &mut sink);
        let _ = tokio::time::timeout(config.read_timeout, drain).await;
    }

    debug!("Answered {} ({} bytes)", command.as_str(), response.len());
    Ok(())
}

fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
