//! Additive secret sharing.
//!
//! This module implements the n-out-of-n additive sharing used by the secure-sum
//! round: a private value is split into N integers that sum back to it, and every
//! contributor accumulates one share from each participant.
//!
//! # Components
//! - `share`: Private values, shares and share sets.
//! - `split`: Splitting a private value into N additive shares.
//! - `store`: Synchronized accumulator of received shares.
//!
//! # Security
//! - **Not modular**: Shares are plain `i64` values. The last share of a split can
//!   leak the magnitude of the partial sums; this scheme gives no formal privacy bound.
//! - **Zeroization**: Shares, private values and store contents are zeroized on drop.
//! - **Arithmetic**: All sums wrap on `i64` overflow, so the sum invariant holds for
//!   every input.

pub mod share;
pub mod split;
pub mod store;

pub use share::{PrivateValue, Share, ShareSet};
pub use split::split_secret;
pub use store::ShareStore;

use thiserror::Error;

/// Errors for share handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MpcError {
    /// The store already holds one share per contributor.
    #[error("round closed: store already holds {population} shares")]
    RoundClosed { population: usize },
    /// Aggregate requested before every share arrived.
    #[error("aggregate not ready: {received} of {population} shares received")]
    NotReady { received: usize, population: usize },
    /// A round needs at least one contributor.
    #[error("population must be at least 1")]
    InvalidPopulation,
}
