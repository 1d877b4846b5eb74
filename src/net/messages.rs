//! Wire messages.
//!
//! JSON bodies with capitalised field names, as every node in a round expects.
//! Bodies are decoded from raw bytes; the `Content-Type` header is not trusted.

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolError;

/// Contributor → aggregator `/patient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(rename = "Port")]
    pub port: u16,
}

/// Aggregator → contributor `/patients`.
///
/// `ports` lists every registered contributor; the population of the round is the
/// number of distinct ports in it together with the recipient's own port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerList {
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "PortsList", default)]
    pub ports: Vec<u16>,
}

/// One share (contributor → contributor) or one aggregate (contributor → aggregator),
/// both POSTed to `/shares`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareMessage {
    #[serde(rename = "Share")]
    pub share: i64,
}

impl core::fmt::Debug for ShareMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShareMessage")
            .field("share", &"***SENSITIVE***")
            .finish()
    }
}

/// Decodes a request body.
pub fn decode<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(body).map_err(|e| {
        log::debug!("Rejecting malformed body: {}", e);
        ProtocolError::MalformedMessage
    })
}
