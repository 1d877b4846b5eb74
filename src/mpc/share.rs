//! Share and private value definitions.
//!
//! # Security
//! - Implements `Zeroize` and `ZeroizeOnDrop` to wipe values from memory.
//! - `Debug` implementations redact the actual value.

use core::fmt;
use rand::Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The integer a contributor keeps to itself.
///
/// Generated once at node start and never transmitted.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateValue(i64);

impl PrivateValue {
    /// Wraps a known value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Draws a value uniformly from `[0, max_range)`.
    ///
    /// A `max_range` below 1 yields 0.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R, max_range: i64) -> Self {
        if max_range <= 1 {
            return Self(0);
        }
        Self(rng.gen_range(0..max_range))
    }

    /// Returns the raw value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for PrivateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateValue").field(&"***SENSITIVE***").finish()
    }
}

/// One additive component of a split private value.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Share(i64);

impl Share {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Share").field(&"***SENSITIVE***").finish()
    }
}

/// The N shares produced from one private value.
///
/// The last share is retained by the splitting contributor; the others are
/// handed to peers in order.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareSet {
    shares: Vec<Share>,
}

impl ShareSet {
    /// Builds a set from at least one share.
    pub(crate) fn from_shares(shares: Vec<Share>) -> Self {
        debug_assert!(!shares.is_empty());
        Self { shares }
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    /// Shares destined for peers, in peer order.
    pub fn outbound(&self) -> &[Share] {
        match self.shares.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// The share kept by the splitting contributor.
    pub fn retained(&self) -> &Share {
        // Non-empty by construction.
        &self.shares[self.shares.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Share> {
        self.shares.iter()
    }

    /// Wrapping sum of every share; equals the split secret.
    pub fn sum(&self) -> i64 {
        self.shares
            .iter()
            .fold(0i64, |acc, share| acc.wrapping_add(share.value()))
    }
}

impl fmt::Debug for ShareSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareSet")
            .field("length", &self.shares.len())
            .field("shares", &"***SENSITIVE***")
            .finish()
    }
}
