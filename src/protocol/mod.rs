//! Protocol Layer.
//!
//! This module implements the secure-sum round, including:
//! - Contributor lifecycle state machine
//! - Peer registry kept by the aggregator
//! - Contributor node: registration, share distribution, accumulation, submission
//! - Aggregator node: registration, peer list broadcast, final sum

pub mod aggregator;
pub mod contributor;
pub mod registry;
pub mod state_machine;

pub use aggregator::Aggregator;
pub use contributor::{ContributorNode, DispatchReport};
pub use registry::PeerRegistry;
pub use state_machine::{State, StateMachine};

use thiserror::Error;

use crate::mpc::MpcError;
use crate::net::NetError;

/// Errors related to protocol execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0:?}")]
    InvalidState(State),
    /// Request body could not be decoded.
    #[error("malformed message")]
    MalformedMessage,
    /// The delivered peer list disagrees with the configured population.
    #[error("population mismatch: expected {expected}, peer list implies {delivered}")]
    PopulationMismatch { expected: usize, delivered: usize },
    /// More contributors tried to register than the round expects.
    #[error("registry full: {population} contributors already registered")]
    RegistryFull { population: usize },
    /// Share accumulation failure (round closed, not ready).
    #[error(transparent)]
    Share(#[from] MpcError),
    /// Underlying transport failure.
    #[error(transparent)]
    Transport(#[from] NetError),
}
