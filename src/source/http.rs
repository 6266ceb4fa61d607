use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::tls::TlsInfo;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{OracleError, OracleResult};
use crate::types::SessionMetadata;

/// Transport requirements for upstream RPC calls
#[derive(Debug, Clone)]
pub struct HttpSecurityConfig {
    /// Refuse plain-HTTP endpoints
    pub require_https: bool,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum response size in bytes
    pub max_response_size: usize,
    /// Allowed endpoint domains; empty allows any host
    pub allowed_domains: Vec<String>,
}

impl Default for HttpSecurityConfig {
    fn default() -> Self {
        Self {
            require_https: true,
            timeout_secs: 10,
            max_response_size: 4 * 1024 * 1024, // 4MB, blocks with many txs
            allowed_domains: Vec::new(),
        }
    }
}

/// Response body together with the session that delivered it.
#[derive(Debug, Clone)]
pub struct SessionResponse {
    pub body: Vec<u8>,
    pub session: SessionMetadata,
}

/// HTTPS JSON-RPC client that records TLS session metadata per response
#[derive(Clone)]
pub struct SecureHttpClient {
    client: Client,
    config: HttpSecurityConfig,
}

impl SecureHttpClient {
    pub fn new(config: HttpSecurityConfig) -> Result<Self> {
        let mut client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("zktls-oracle/", env!("CARGO_PKG_VERSION")))
            .tls_info(true);

        if config.require_https {
            client_builder = client_builder.https_only(true);
            info!("HTTPS enforcement enabled for upstream RPC");
        } else {
            warn!("HTTPS not required - commitments from plain HTTP carry no certificate binding");
        }

        let client = client_builder
            .build()
            .context("Failed to create upstream HTTP client")?;

        Ok(Self { client, config })
    }

    /// Check scheme and domain allowlist.
    pub fn validate_url(&self, url: &str) -> OracleResult<Url> {
        validate_endpoint(url, &self.config)
    }

    /// POST a JSON-RPC 2.0 request and return the raw body with its session.
    pub async fn post_json_rpc(
        &self,
        url: &Url,
        method: &str,
        params: serde_json::Value,
    ) -> OracleResult<SessionResponse> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": "0",
            "method": method,
            "params": params,
        });

        debug!("POST {} {}", url, method);

        let response = self
            .client
            .post(url.as_str())
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::Upstream(format!("{} {}: {}", url, method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Upstream(format!(
                "{} {} failed with status {}",
                url,
                method,
                status.as_u16()
            )));
        }

        if let Some(length) = response.content_length()
            && length > self.config.max_response_size as u64
        {
            return Err(OracleError::Upstream(format!(
                "response too large: {} bytes (max: {})",
                length, self.config.max_response_size
            )));
        }

        // Session facts must be read before the body consumes the response.
        let session = SessionMetadata {
            endpoint: url.to_string(),
            peer_addr: response.remote_addr().map(|addr| addr.to_string()),
            peer_certificate: response
                .extensions()
                .get::<TlsInfo>()
                .and_then(|info| info.peer_certificate())
                .map(<[u8]>::to_vec),
            protocol: format!("{:?}", response.version()),
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| OracleError::Upstream(format!("reading {} body: {}", method, e)))?;

        if body.len() > self.config.max_response_size {
            return Err(OracleError::Upstream(format!(
                "response body too large: {} bytes (max: {})",
                body.len(),
                self.config.max_response_size
            )));
        }

        Ok(SessionResponse {
            body: body.to_vec(),
            session,
        })
    }
}

/// Validate an endpoint URL against the transport requirements.
pub fn validate_endpoint(url: &str, config: &HttpSecurityConfig) -> OracleResult<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| OracleError::Upstream(format!("invalid URL {}: {}", url, e)))?;

    if config.require_https && parsed.scheme() != "https" {
        return Err(OracleError::Upstream(format!(
            "HTTPS is required but URL uses {}: {}",
            parsed.scheme(),
            url
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| OracleError::Upstream(format!("URL must have a valid host: {}", url)))?;

    if !config.allowed_domains.is_empty()
        && !config
            .allowed_domains
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{}", domain)))
    {
        return Err(OracleError::Upstream(format!(
            "Domain '{}' is not in the allowed list: {:?}",
            host, config.allowed_domains
        )));
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(domains: &[&str]) -> HttpSecurityConfig {
        HttpSecurityConfig {
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
            ..HttpSecurityConfig::default()
        }
    }

    #[test]
    fn test_url_validation() {
        let config = config(&["monerodevs.org"]);

        assert!(validate_endpoint("https://node.monerodevs.org:38089/json_rpc", &config).is_ok());
        assert!(validate_endpoint("https://monerodevs.org/json_rpc", &config).is_ok());

        // Plain HTTP when HTTPS required
        assert!(validate_endpoint("http://node.monerodevs.org:38089", &config).is_err());

        // Disallowed domain, including suffix tricks
        assert!(validate_endpoint("https://evil.example.com/", &config).is_err());
        assert!(validate_endpoint("https://evilmonerodevs.org/", &config).is_err());

        assert!(validate_endpoint("not a url", &config).is_err());
    }

    #[test]
    fn test_empty_allowlist_allows_any_host() {
        let mut config = config(&[]);
        config.require_https = false;
        assert!(validate_endpoint("http://127.0.0.1:18081/json_rpc", &config).is_ok());
    }
}
