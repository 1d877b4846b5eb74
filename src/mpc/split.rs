//! Additive splitting of a private value.
//!
//! N-1 shares are drawn uniformly from `[1, max_range - 1]`; the last share is the
//! secret minus their sum. Nothing is reduced modulo anything, so the last share can
//! be negative or larger than `max_range` when the draws overshoot the secret.

use rand::Rng;

use super::share::{Share, ShareSet};

/// Splits `secret` into `population` additive shares.
///
/// This is a total function:
/// * `population == 0` is treated as 1.
/// * `max_range <= 1` leaves the draw interval empty; every draw is then `1`.
///
/// The returned set always satisfies `set.sum() == secret` (wrapping).
pub fn split_secret<R: Rng + ?Sized>(
    secret: i64,
    population: usize,
    max_range: i64,
    rng: &mut R,
) -> ShareSet {
    let population = population.max(1);
    let mut shares = Vec::with_capacity(population);
    let mut drawn = 0i64;

    for _ in 0..population - 1 {
        let value = if max_range > 2 {
            rng.gen_range(1..max_range)
        } else {
            1
        };
        drawn = drawn.wrapping_add(value);
        shares.push(Share::new(value));
    }

    shares.push(Share::new(secret.wrapping_sub(drawn)));
    ShareSet::from_shares(shares)
}
