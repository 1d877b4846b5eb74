//! Configuration for contributor and aggregator nodes.
//!
//! These structs are populated by the binaries from command line flags and passed
//! to the respective modules. `validate` must succeed before a node starts serving.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::net::PeerAddress;

/// Fatal start-up errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A certificate, key or CA file does not exist.
    #[error("missing TLS credential: {0}")]
    MissingCredential(PathBuf),
    /// A credential exists but cannot be read or parsed.
    #[error("unreadable TLS credential {path}: {reason}")]
    BadCredential { path: PathBuf, reason: String },
    /// A round needs at least one contributor.
    #[error("population must be at least 1")]
    InvalidPopulation,
    /// Share draws need a range of at least 2.
    #[error("max range must be at least 2, got {0}")]
    InvalidRange(i64),
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// TLS material shared by the server and the client side of a node.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// PEM certificate presented by this node's server.
    pub cert_path: PathBuf,
    /// PEM private key for `cert_path`.
    pub key_path: PathBuf,
    /// PEM certificate trusted when calling other nodes.
    /// If None, `cert_path` is trusted (all demo nodes share one certificate).
    pub ca_path: Option<PathBuf>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("server.crt"),
            key_path: PathBuf::from("server.key"),
            ca_path: None,
        }
    }
}

impl TlsConfig {
    /// The certificate clients should trust.
    pub fn trust_anchor(&self) -> &Path {
        self.ca_path.as_deref().unwrap_or(&self.cert_path)
    }

    /// Checks that every credential file is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for path in [&self.cert_path, &self.key_path] {
            if !path.is_file() {
                return Err(ConfigError::MissingCredential(path.clone()));
            }
        }
        let anchor = self.trust_anchor();
        if !anchor.is_file() {
            return Err(ConfigError::MissingCredential(anchor.to_path_buf()));
        }
        Ok(())
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout. A round itself never times out.
    pub request_timeout: Duration,
    /// Maximum number of share sends in flight at once.
    pub fanout: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            fanout: 16,
        }
    }
}

/// Settings of one contributor node.
#[derive(Debug, Clone)]
pub struct ContributorConfig {
    /// Host every node listens on (wire messages carry ports only).
    pub host: String,
    /// This node's listen port; also its identity in the peer list.
    pub port: u16,
    /// The aggregator's listen port.
    pub aggregator_port: u16,
    /// Expected number of contributors.
    pub population: usize,
    /// Upper bound (exclusive) for share draws and generated private values.
    pub max_range: i64,
    pub client: ClientConfig,
    pub tls: TlsConfig,
}

impl Default for ContributorConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 8081,
            aggregator_port: 8080,
            population: 3,
            // Keeps the total of three demo contributors under 500.
            max_range: 500 / 3,
            client: ClientConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

impl ContributorConfig {
    pub fn own_address(&self) -> PeerAddress {
        PeerAddress::new(self.host.clone(), self.port)
    }

    pub fn aggregator_address(&self) -> PeerAddress {
        PeerAddress::new(self.host.clone(), self.aggregator_port)
    }

    /// Checks the protocol parameters. TLS files are checked separately.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::InvalidPopulation);
        }
        if self.max_range < 2 {
            return Err(ConfigError::InvalidRange(self.max_range));
        }
        Ok(())
    }
}

/// Settings of the aggregator node.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub host: String,
    pub port: u16,
    /// Number of contributors to wait for before broadcasting the peer list.
    pub population: usize,
    pub client: ClientConfig,
    pub tls: TlsConfig,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 8080,
            population: 3,
            client: ClientConfig::default(),
            tls: TlsConfig::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::InvalidPopulation);
        }
        Ok(())
    }
}
