//! Peer Registry.
//!
//! Ordered list of contributor addresses kept by the aggregator. The registration
//! that fills the registry is reported exactly once so the peer list is broadcast
//! exactly once.

use crate::net::PeerAddress;

use super::ProtocolError;

/// Result of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registered {
    /// Still waiting for `remaining` contributors.
    Pending { remaining: usize },
    /// This registration filled the registry; the ordered peer list is attached.
    Complete(Vec<PeerAddress>),
    /// The address was already registered; nothing changed.
    Duplicate,
}

/// Registration order is preserved.
#[derive(Debug)]
pub struct PeerRegistry {
    population: usize,
    peers: Vec<PeerAddress>,
}

impl PeerRegistry {
    pub fn new(population: usize) -> Self {
        Self {
            population,
            peers: Vec::with_capacity(population),
        }
    }

    /// Adds a contributor.
    ///
    /// # Errors
    /// Returns `ProtocolError::RegistryFull` when a new address arrives after the
    /// registry is complete.
    pub fn register(&mut self, address: PeerAddress) -> Result<Registered, ProtocolError> {
        if self.peers.contains(&address) {
            return Ok(Registered::Duplicate);
        }
        if self.is_complete() {
            return Err(ProtocolError::RegistryFull {
                population: self.population,
            });
        }

        self.peers.push(address);
        if self.is_complete() {
            Ok(Registered::Complete(self.peers.clone()))
        } else {
            Ok(Registered::Pending {
                remaining: self.population - self.peers.len(),
            })
        }
    }

    pub fn is_complete(&self) -> bool {
        self.peers.len() >= self.population
    }

    pub fn peers(&self) -> &[PeerAddress] {
        &self.peers
    }

    pub fn population(&self) -> usize {
        self.population
    }

    /// Ports of every registered contributor, in registration order.
    pub fn ports(&self) -> Vec<u16> {
        self.peers.iter().map(PeerAddress::port).collect()
    }
}
