//! Point-to-point request/response transport.
//!
//! The protocol layer only sees the `Transport` trait. `HttpsTransport` is the
//! production implementation: JSON over HTTPS, with the server certificate validated
//! against a configured trust anchor.

use futures::future::BoxFuture;
use reqwest::{Certificate, Client};
use serde::Serialize;

use super::messages::{PeerList, Registration, ShareMessage};
use super::{NetError, PeerAddress};
use crate::config::{ClientConfig, ConfigError, TlsConfig};

/// Outbound calls made by contributors and the aggregator.
///
/// Implementations only report whether the remote accepted the request; no response
/// body is interpreted.
pub trait Transport: Send + Sync + 'static {
    /// Registers `own` with the aggregator at `aggregator`.
    fn register<'a>(
        &'a self,
        aggregator: &'a PeerAddress,
        own: &'a PeerAddress,
    ) -> BoxFuture<'a, Result<(), NetError>>;

    /// Delivers one share to a peer contributor.
    fn send_share<'a>(
        &'a self,
        peer: &'a PeerAddress,
        share: i64,
    ) -> BoxFuture<'a, Result<(), NetError>>;

    /// Submits a contributor's round aggregate to the aggregator.
    fn submit_aggregate<'a>(
        &'a self,
        aggregator: &'a PeerAddress,
        aggregate: i64,
    ) -> BoxFuture<'a, Result<(), NetError>>;

    /// Pushes the full peer list to one contributor.
    fn push_peer_list<'a>(
        &'a self,
        contributor: &'a PeerAddress,
        list: &'a PeerList,
    ) -> BoxFuture<'a, Result<(), NetError>>;
}

/// JSON over HTTPS using `reqwest` with rustls.
#[derive(Clone)]
pub struct HttpsTransport {
    client: Client,
}

impl HttpsTransport {
    /// Builds a client trusting the configured certificate.
    ///
    /// # Errors
    /// Returns `ConfigError` if the trust anchor is missing or is not valid PEM.
    pub fn new(tls: &TlsConfig, client: &ClientConfig) -> Result<Self, ConfigError> {
        let anchor = tls.trust_anchor();
        let pem = std::fs::read(anchor)
            .map_err(|_| ConfigError::MissingCredential(anchor.to_path_buf()))?;
        let cert = Certificate::from_pem(&pem).map_err(|e| ConfigError::BadCredential {
            path: anchor.to_path_buf(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .use_rustls_tls()
            .add_root_certificate(cert)
            .timeout(client.request_timeout)
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one with additional settings.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn post<T: Serialize + ?Sized>(&self, url: String, body: &T) -> Result<(), NetError> {
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                log::debug!("POST {} failed: {}", url, e);
                map_reqwest_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetError::Rejected(status.as_u16()));
        }
        log::debug!("POST {} -> {}", url, status);
        Ok(())
    }
}

fn map_reqwest_error(e: &reqwest::Error) -> NetError {
    if e.is_timeout() {
        NetError::Timeout
    } else if e.is_builder() {
        NetError::InvalidAddress
    } else if e.is_body() || e.is_decode() {
        NetError::InvalidMessage
    } else {
        NetError::ConnectionFailed
    }
}

impl Transport for HttpsTransport {
    fn register<'a>(
        &'a self,
        aggregator: &'a PeerAddress,
        own: &'a PeerAddress,
    ) -> BoxFuture<'a, Result<(), NetError>> {
        Box::pin(async move {
            let body = Registration { port: own.port() };
            self.post(aggregator.url("/patient"), &body).await
        })
    }

    fn send_share<'a>(
        &'a self,
        peer: &'a PeerAddress,
        share: i64,
    ) -> BoxFuture<'a, Result<(), NetError>> {
        Box::pin(async move {
            let body = ShareMessage { share };
            self.post(peer.url("/shares"), &body).await
        })
    }

    fn submit_aggregate<'a>(
        &'a self,
        aggregator: &'a PeerAddress,
        aggregate: i64,
    ) -> BoxFuture<'a, Result<(), NetError>> {
        Box::pin(async move {
            let body = ShareMessage { share: aggregate };
            self.post(aggregator.url("/shares"), &body).await
        })
    }

    fn push_peer_list<'a>(
        &'a self,
        contributor: &'a PeerAddress,
        list: &'a PeerList,
    ) -> BoxFuture<'a, Result<(), NetError>> {
        Box::pin(async move { self.post(contributor.url("/patients"), list).await })
    }
}
