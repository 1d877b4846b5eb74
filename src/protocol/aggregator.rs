//! Aggregator Node.
//!
//! Collects contributor registrations, broadcasts the peer list once the expected
//! population has registered, and sums the per-contributor aggregates. It only ever
//! sees aggregates, each of which mixes shares from every contributor.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use super::registry::{PeerRegistry, Registered};
use super::ProtocolError;
use crate::config::AggregatorConfig;
use crate::mpc::ShareStore;
use crate::net::{PeerAddress, PeerList, Transport};

/// The coordinating node of a round.
pub struct Aggregator<T: Transport> {
    config: AggregatorConfig,
    transport: Arc<T>,
    registry: Mutex<PeerRegistry>,
    aggregates: ShareStore,
    total: watch::Sender<Option<i64>>,
}

impl<T: Transport> Aggregator<T> {
    /// # Errors
    /// Returns `ProtocolError::Share` if the configured population is zero.
    pub fn new(config: AggregatorConfig, transport: Arc<T>) -> Result<Self, ProtocolError> {
        let aggregates = ShareStore::new(config.population)?;
        let (total, _) = watch::channel(None);
        Ok(Self {
            registry: Mutex::new(PeerRegistry::new(config.population)),
            config,
            transport,
            aggregates,
            total,
        })
    }

    fn registry(&self) -> MutexGuard<'_, PeerRegistry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Registered contributors, in registration order.
    pub fn peers(&self) -> Vec<PeerAddress> {
        self.registry().peers().to_vec()
    }

    /// Number of aggregates received so far.
    pub fn received(&self) -> usize {
        self.aggregates.len()
    }

    /// The final sum, once every contributor submitted.
    pub fn total(&self) -> Option<i64> {
        *self.total.borrow()
    }

    /// Waits for the final sum.
    pub async fn wait_total(&self) -> Option<i64> {
        let mut rx = self.total.subscribe();
        let result = match rx.wait_for(Option::is_some).await {
            Ok(total) => *total,
            Err(_) => None,
        };
        result
    }

    /// Registers a contributor listening on `port`.
    ///
    /// The registration that completes the registry spawns the peer list broadcast;
    /// it does not wait for the pushes to finish.
    ///
    /// # Errors
    /// Returns `RegistryFull` if the round already has every contributor.
    pub fn register(&self, port: u16) -> Result<(), ProtocolError> {
        let address = PeerAddress::new(self.config.host.clone(), port);
        let outcome = self.registry().register(address)?;

        match outcome {
            Registered::Pending { remaining } => {
                log::info!(
                    "{}: Registered contributor {}, waiting for {} more",
                    self.port(),
                    port,
                    remaining
                );
            }
            Registered::Duplicate => {
                log::info!("{}: Contributor {} already registered", self.port(), port);
            }
            Registered::Complete(peers) => {
                log::info!(
                    "{}: Registered contributor {}, all {} contributors present",
                    self.port(),
                    port,
                    peers.len()
                );
                self.broadcast(peers);
            }
        }
        Ok(())
    }

    /// Pushes the peer list to every contributor, one task per contributor.
    fn broadcast(&self, peers: Vec<PeerAddress>) {
        let ports: Vec<u16> = peers.iter().map(PeerAddress::port).collect();
        for peer in peers {
            let transport = Arc::clone(&self.transport);
            let list = PeerList {
                port: peer.port(),
                ports: ports.clone(),
            };
            let own_port = self.port();
            tokio::spawn(async move {
                match transport.push_peer_list(&peer, &list).await {
                    Ok(()) => log::info!("{}: Sent peer list to {}", own_port, peer),
                    Err(e) => log::warn!("{}: Error when sending peer list to {}: {}", own_port, peer, e),
                }
            });
        }
    }

    /// Accumulates one contributor aggregate.
    ///
    /// The aggregate that completes the round computes and publishes the total.
    ///
    /// # Errors
    /// Returns `Share(RoundClosed)` once every contributor has submitted.
    pub fn receive_aggregate(&self, value: i64) -> Result<usize, ProtocolError> {
        let size = self.aggregates.add(value)?;
        log::info!(
            "{}: Received aggregate share ({}/{})",
            self.port(),
            size,
            self.aggregates.population()
        );

        if size == self.aggregates.population() {
            let total = self.aggregates.aggregate()?;
            log::info!("{}: Final result is {}", self.port(), total);
            self.total.send_replace(Some(total));
        }
        Ok(size)
    }
}
