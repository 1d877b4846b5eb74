//! Secure-sum over additive secret shares.
//!
//! N contributors each split a private integer into N additive shares, exchange them
//! over HTTPS, and forward the sum of the shares they hold to an aggregator. The
//! aggregator learns the total of all private values and nothing else; contributors
//! learn only the shares they receive.
//!
//! Honest-but-curious participants only: peers are not authenticated, shares are
//! not modular, and a lost share stalls the round forever.

pub mod config;
pub mod entropy;
pub mod mpc;
pub mod net;
pub mod protocol;

pub use config::{AggregatorConfig, ContributorConfig, TlsConfig};
pub use mpc::{split_secret, PrivateValue, ShareStore};
pub use protocol::{Aggregator, ContributorNode, State};
