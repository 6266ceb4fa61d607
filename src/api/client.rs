use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{OracleError, OracleResult};

/// Minimal client for the oracle's one-command-per-connection protocol.
#[derive(Debug, Clone)]
pub struct OracleClient {
    addr: String,
    timeout: Duration,
}

impl OracleClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `command` and return the raw response body.
    pub async fn query_raw(&self, command: &str) -> OracleResult<String> {
        tokio::time::timeout(self.timeout, self.exchange(command))
            .await
            .map_err(|_| {
                OracleError::TransportFailure(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no response from {} within {:?}", self.addr, self.timeout),
                ))
            })?
    }

    /// Send `command` and parse the JSON response.
    pub async fn query(&self, command: &str) -> OracleResult<serde_json::Value> {
        let body = self.query_raw(command).await?;
        serde_json::from_str(&body).map_err(|e| {
            OracleError::TransportFailure(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    async fn exchange(&self, command: &str) -> OracleResult<String> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.shutdown().await?;

        let mut body = String::new();
        stream.read_to_string(&mut body).await?;
        Ok(body)
    }
}
