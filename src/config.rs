use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::ProtocolConfig;
use crate::crypto::StaticKey;
use crate::oracle::DriverConfig;
use crate::source::http::validate_endpoint;
use crate::source::{HttpSecurityConfig, cluster_rpc_url};

/// Upper bound for `ZKTLS_MAX_COMMAND_BYTES`.
pub const MAX_COMMAND_BYTES_LIMIT: usize = 64 * 1024;

/// Deployment preset. Selects the Solana cluster and refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Devnet,
    Mainnet,
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "devnet" => Ok(Self::Devnet),
            "mainnet" | "mainnet-beta" => Ok(Self::Mainnet),
            other => Err(anyhow::anyhow!("unknown network '{}'", other)),
        }
    }
}

/// Configuration for the ZK-TLS oracle
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub network: Network,
    /// Query listener
    pub server: ServerConfig,
    /// Upstream Monero RPC
    pub monero: MoneroConfig,
    /// Attestation context and keys
    pub solana: SolanaConfig,
    pub signing: SigningConfig,
    /// Refresh driver
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Seconds a client has to send its command
    pub read_timeout_secs: u64,
    /// Longest accepted command line
    pub max_command_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct MoneroConfig {
    /// Daemon base URLs; one is picked at random per refresh
    pub nodes: Vec<String>,
    /// Domains the nodes must belong to
    pub allowed_domains: Vec<String>,
    /// Refuse plain-HTTP nodes
    pub require_https: bool,
    /// RPC timeout in seconds
    pub timeout_secs: u64,
    /// Blocks to leave on top of the committed one
    pub confirmations: u64,
}

#[derive(Debug, Clone)]
pub struct SolanaConfig {
    /// `devnet`, `testnet`, `mainnet`, an RPC URL, or `offline`
    pub cluster: String,
}

#[derive(Clone, Default)]
pub struct SigningConfig {
    /// 32-byte Ed25519 secret, hex
    pub signing_key_hex: Option<String>,
    /// Solana CLI keypair file
    pub keypair_path: Option<PathBuf>,
}

// Never print key material.
impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field(
                "signing_key_hex",
                &self.signing_key_hex.as_ref().map(|_| "<redacted>"),
            )
            .field("keypair_path", &self.keypair_path)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Seconds between refresh cycles
    pub proof_interval_secs: u64,
    /// Consecutive signing failures before the process stops
    pub max_signing_failures: u32,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Emit span events for every query connection
    pub log_connections: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

impl OracleConfig {
    pub fn devnet() -> Self {
        Self {
            network: Network::Devnet,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 38089,
                read_timeout_secs: 5,
                max_command_bytes: 1024,
            },
            monero: MoneroConfig {
                nodes: vec![
                    "https://moneroproxy.myxmr.com:38089".to_string(),
                    "https://node.monerodevs.org:38089".to_string(),
                ],
                allowed_domains: vec!["myxmr.com".to_string(), "monerodevs.org".to_string()],
                require_https: true,
                timeout_secs: 10,
                confirmations: 1,
            },
            solana: SolanaConfig {
                cluster: "devnet".to_string(),
            },
            signing: SigningConfig::default(),
            refresh: RefreshConfig {
                proof_interval_secs: 30,
                max_signing_failures: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                log_connections: false,
            },
        }
    }

    pub fn mainnet() -> Self {
        let mut config = Self::devnet();
        config.network = Network::Mainnet;
        config.solana.cluster = "mainnet".to_string();
        config.refresh.proof_interval_secs = 60;
        config
    }

    /// Load configuration from `ZKTLS_*` environment variables and validate it
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let network = match lookup("ZKTLS_NETWORK") {
            Some(value) => value.parse().context("Invalid ZKTLS_NETWORK value")?,
            None => Network::Devnet,
        };
        let mut config = match network {
            Network::Devnet => Self::devnet(),
            Network::Mainnet => Self::mainnet(),
        };

        // Server configuration
        if let Some(host) = lookup("ZKTLS_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("ZKTLS_PORT") {
            config.server.port = port.parse().context("Invalid ZKTLS_PORT value")?;
        }
        if let Some(secs) = parse_var(&lookup, "ZKTLS_READ_TIMEOUT_SECS")? {
            config.server.read_timeout_secs = secs;
        }
        if let Some(bytes) = parse_var(&lookup, "ZKTLS_MAX_COMMAND_BYTES")? {
            config.server.max_command_bytes = bytes;
        }

        // Monero upstream
        if let Some(nodes) = lookup("ZKTLS_MONERO_NODES") {
            config.monero.nodes = split_list(&nodes);
        }
        if let Some(domains) = lookup("ZKTLS_ALLOWED_DOMAINS") {
            config.monero.allowed_domains = split_list(&domains);
        }
        if let Some(require) = parse_var(&lookup, "ZKTLS_REQUIRE_HTTPS")? {
            config.monero.require_https = require;
        }
        if let Some(secs) = parse_var(&lookup, "ZKTLS_RPC_TIMEOUT_SECS")? {
            config.monero.timeout_secs = secs;
        }
        if let Some(confirmations) = parse_var(&lookup, "ZKTLS_CONFIRMATIONS")? {
            config.monero.confirmations = confirmations;
        }

        // Attestation
        if let Some(cluster) = lookup("ZKTLS_SOLANA_CLUSTER") {
            config.solana.cluster = cluster;
        }
        config.signing.signing_key_hex = lookup("ZKTLS_SIGNING_KEY").filter(|k| !k.is_empty());
        config.signing.keypair_path = lookup("ZKTLS_KEYPAIR_PATH")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        // Refresh driver
        if let Some(secs) = parse_var(&lookup, "ZKTLS_PROOF_INTERVAL_SECS")? {
            config.refresh.proof_interval_secs = secs;
        }
        if let Some(max) = parse_var(&lookup, "ZKTLS_MAX_SIGNING_FAILURES")? {
            config.refresh.max_signing_failures = max;
        }

        // Logging
        if let Some(level) = lookup("ZKTLS_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(log_connections) = parse_var(&lookup, "ZKTLS_LOG_CONNECTIONS")? {
            config.logging.log_connections = log_connections;
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for security and consistency
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }
        if self.server.max_command_bytes == 0 {
            return Err(anyhow::anyhow!("Maximum command length must be non-zero"));
        }
        if self.server.max_command_bytes > MAX_COMMAND_BYTES_LIMIT {
            return Err(anyhow::anyhow!(
                "Maximum command length cannot exceed {} bytes",
                MAX_COMMAND_BYTES_LIMIT
            ));
        }

        if self.refresh.proof_interval_secs == 0 {
            return Err(anyhow::anyhow!("Proof interval must be non-zero"));
        }
        if self.refresh.max_signing_failures == 0 {
            return Err(anyhow::anyhow!("Maximum signing failures must be non-zero"));
        }

        if self.monero.nodes.is_empty() {
            return Err(anyhow::anyhow!("At least one Monero node must be configured"));
        }
        let http = self.upstream_http();
        for node in &self.monero.nodes {
            validate_endpoint(node, &http)
                .with_context(|| format!("Invalid Monero node {}", node))?;
        }

        if self.signing.signing_key_hex.is_some() && self.signing.keypair_path.is_some() {
            return Err(anyhow::anyhow!(
                "ZKTLS_SIGNING_KEY and ZKTLS_KEYPAIR_PATH are mutually exclusive"
            ));
        }
        if let Some(secret) = &self.signing.signing_key_hex {
            StaticKey::from_hex(secret).context("Invalid ZKTLS_SIGNING_KEY")?;
        }

        if self.solana.cluster.is_empty() {
            return Err(anyhow::anyhow!("Solana cluster cannot be empty"));
        }
        if let Some(rpc_url) = cluster_rpc_url(&self.solana.cluster) {
            validate_endpoint(&rpc_url, &self.context_http())
                .with_context(|| format!("Invalid Solana RPC URL {}", rpc_url))?;
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn upstream_http(&self) -> HttpSecurityConfig {
        HttpSecurityConfig {
            require_https: self.monero.require_https,
            timeout_secs: self.monero.timeout_secs,
            allowed_domains: self.monero.allowed_domains.clone(),
            ..HttpSecurityConfig::default()
        }
    }

    /// Transport for the target-chain RPC. The Monero allowlist does not apply.
    pub fn context_http(&self) -> HttpSecurityConfig {
        HttpSecurityConfig {
            require_https: self.monero.require_https,
            timeout_secs: self.monero.timeout_secs,
            ..HttpSecurityConfig::default()
        }
    }

    pub fn protocol(&self) -> ProtocolConfig {
        ProtocolConfig {
            read_timeout: Duration::from_secs(self.server.read_timeout_secs),
            max_command_bytes: self.server.max_command_bytes,
            ..ProtocolConfig::default()
        }
    }

    pub fn driver(&self) -> DriverConfig {
        DriverConfig {
            interval: Duration::from_secs(self.refresh.proof_interval_secs),
            max_signing_failures: self.refresh.max_signing_failures,
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid {} value", name))
        })
        .transpose()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
