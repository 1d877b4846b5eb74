pub mod messages;
pub mod server;
pub mod transport;

pub use messages::{PeerList, Registration, ShareMessage};
pub use transport::{HttpsTransport, Transport};

use core::fmt;
use thiserror::Error;

/// Transport failures. Logged by the caller; they never abort a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("connection failed")]
    ConnectionFailed,
    #[error("operation timed out")]
    Timeout,
    /// The remote answered with a non-success status.
    #[error("request rejected with status {0}")]
    Rejected(u16),
    #[error("invalid message format")]
    InvalidMessage,
    #[error("invalid address format")]
    InvalidAddress,
    #[error("TLS failure")]
    Tls,
}

/// Network locator of one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// HTTPS URL of `path` on this node.
    pub fn url(&self, path: &str) -> String {
        format!("https://{}:{}{}", self.host, self.port, path)
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_address_url() {
        let addr = PeerAddress::new("localhost", 8082);
        assert_eq!(addr.url("/shares"), "https://localhost:8082/shares");
        assert_eq!(addr.to_string(), "localhost:8082");
    }
}
