//! HTTPS endpoints.
//!
//! Contributor: `POST /patients` (peer list) and `POST /shares` (one share).
//! Aggregator: `POST /patient` (registration) and `POST /shares` (one aggregate).
//!
//! Errors never reach the serving loop; each handler maps them to a status code.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
pub use axum_server::Handle;

use super::messages::{decode, PeerList, Registration, ShareMessage};
use super::Transport;
use crate::config::{ConfigError, TlsConfig};
use crate::mpc::MpcError;
use crate::protocol::{Aggregator, ContributorNode, ProtocolError};

fn status_for(err: &ProtocolError) -> StatusCode {
    match err {
        ProtocolError::MalformedMessage => StatusCode::INTERNAL_SERVER_ERROR,
        ProtocolError::InvalidState(_)
        | ProtocolError::RegistryFull { .. }
        | ProtocolError::Share(MpcError::RoundClosed { .. }) => StatusCode::CONFLICT,
        ProtocolError::PopulationMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ProtocolError::Transport(_) => StatusCode::BAD_GATEWAY,
        ProtocolError::Share(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        (status_for(&self), self.to_string()).into_response()
    }
}

/// Routes served by a contributor.
pub fn contributor_router<T: Transport>(node: Arc<ContributorNode<T>>) -> Router {
    Router::new()
        .route("/patients", post(receive_peer_list::<T>))
        .route("/shares", post(receive_share::<T>))
        .with_state(node)
}

async fn receive_peer_list<T: Transport>(
    State(node): State<Arc<ContributorNode<T>>>,
    body: Bytes,
) -> Result<StatusCode, ProtocolError> {
    log::info!("{}: Received POST /patients", node.port());
    let list: PeerList = decode(&body)?;
    node.receive_peer_list(list).await?;
    Ok(StatusCode::OK)
}

async fn receive_share<T: Transport>(
    State(node): State<Arc<ContributorNode<T>>>,
    body: Bytes,
) -> Result<StatusCode, ProtocolError> {
    log::debug!("{}: Received POST /shares", node.port());
    let message: ShareMessage = decode(&body)?;
    node.receive_share(message.share).await?;
    Ok(StatusCode::OK)
}

/// Routes served by the aggregator.
pub fn aggregator_router<T: Transport>(aggregator: Arc<Aggregator<T>>) -> Router {
    Router::new()
        .route("/patient", post(register::<T>))
        .route("/shares", post(receive_aggregate::<T>))
        .with_state(aggregator)
}

async fn register<T: Transport>(
    State(aggregator): State<Arc<Aggregator<T>>>,
    body: Bytes,
) -> Result<StatusCode, ProtocolError> {
    let registration: Registration = decode(&body)?;
    aggregator.register(registration.port)?;
    Ok(StatusCode::OK)
}

async fn receive_aggregate<T: Transport>(
    State(aggregator): State<Arc<Aggregator<T>>>,
    body: Bytes,
) -> Result<StatusCode, ProtocolError> {
    let message: ShareMessage = decode(&body)?;
    aggregator.receive_aggregate(message.share)?;
    Ok(StatusCode::OK)
}

/// Loads the server certificate and key.
pub async fn load_tls(tls: &TlsConfig) -> Result<RustlsConfig, ConfigError> {
    tls.validate()?;
    RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| ConfigError::BadCredential {
            path: tls.cert_path.clone(),
            reason: e.to_string(),
        })
}

/// Serves `router` over HTTPS on every interface.
///
/// Runs until the listener fails or `handle` is told to shut down.
pub async fn serve_tls(
    router: Router,
    port: u16,
    tls: RustlsConfig,
    handle: Handle,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Serving on https://{}", addr);
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(router.into_make_service())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AggregatorConfig, ContributorConfig};
    use crate::entropy;
    use crate::mpc::PrivateValue;
    use crate::net::{NetError, PeerAddress};
    use axum::body::Body;
    use axum::http::Request;
    use futures::future::BoxFuture;
    use tower::ServiceExt;

    struct NullTransport;

    impl Transport for NullTransport {
        fn register<'a>(
            &'a self,
            _aggregator: &'a PeerAddress,
            _own: &'a PeerAddress,
        ) -> BoxFuture<'a, Result<(), NetError>> {
            Box::pin(async { Ok(()) })
        }

        fn send_share<'a>(
            &'a self,
            _peer: &'a PeerAddress,
            _share: i64,
        ) -> BoxFuture<'a, Result<(), NetError>> {
            Box::pin(async { Ok(()) })
        }

        fn submit_aggregate<'a>(
            &'a self,
            _aggregator: &'a PeerAddress,
            _aggregate: i64,
        ) -> BoxFuture<'a, Result<(), NetError>> {
            Box::pin(async { Ok(()) })
        }

        fn push_peer_list<'a>(
            &'a self,
            _contributor: &'a PeerAddress,
            _list: &'a PeerList,
        ) -> BoxFuture<'a, Result<(), NetError>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn contributor(population: usize) -> Arc<ContributorNode<NullTransport>> {
        let config = ContributorConfig {
            population,
            ..ContributorConfig::default()
        };
        Arc::new(
            ContributorNode::new(
                config,
                PrivateValue::new(10),
                entropy::seeded(1),
                Arc::new(NullTransport),
            )
            .unwrap(),
        )
    }

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            // Clients are not required to send a JSON content type.
            .header("content-type", "string")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_share_accepted_then_round_closed() {
        let node = contributor(1);
        let app = contributor_router(Arc::clone(&node));

        let resp = app
            .clone()
            .oneshot(post_json("/shares", r#"{"Share":5}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(node.received(), 1);

        let resp = app
            .oneshot(post_json("/shares", r#"{"Share":5}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(node.received(), 1);
    }

    #[tokio::test]
    async fn test_malformed_share_is_server_error() {
        let node = contributor(2);
        let app = contributor_router(Arc::clone(&node));

        let resp = app
            .oneshot(post_json("/shares", r#"{"Share":"five"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(node.received(), 0);
    }

    #[tokio::test]
    async fn test_peer_list_before_registration_conflicts() {
        let app = contributor_router(contributor(2));
        let resp = app
            .oneshot(post_json("/patients", r#"{"Port":8081,"PortsList":[8081,8082]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_peer_list_population_mismatch() {
        let node = contributor(2);
        node.register().await.unwrap();
        let app = contributor_router(node);
        let resp = app
            .oneshot(post_json("/patients", r#"{"Port":8081,"PortsList":[8081,8082,8083]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_aggregator_endpoints() {
        let config = AggregatorConfig {
            population: 1,
            ..AggregatorConfig::default()
        };
        let aggregator = Arc::new(Aggregator::new(config, Arc::new(NullTransport)).unwrap());
        let app = aggregator_router(Arc::clone(&aggregator));

        let resp = app
            .clone()
            .oneshot(post_json("/patient", r#"{"Port":8081,"PortsList":null}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = app
            .clone()
            .oneshot(post_json("/patient", r#"{"Port":8082}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .clone()
            .oneshot(post_json("/shares", r#"{"Share":42}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(aggregator.total(), Some(42));

        let resp = app.oneshot(post_json("/shares", "{")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
