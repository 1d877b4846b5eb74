//! Randomness for private values and share draws.
//!
//! Each process seeds one `StdRng` from the wall clock at start. This is enough to
//! make every contributor's draws differ between runs; it is NOT a cryptographically
//! secure source and the protocol makes no claim that it is.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Generator used by a contributor for its private value and share draws.
pub type ShareRng = StdRng;

/// Nanoseconds since the Unix epoch, folded into 64 bits.
fn clock_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    (nanos as u64) ^ ((nanos >> 64) as u64)
}

/// Creates a generator seeded from the current time.
pub fn time_seeded() -> ShareRng {
    let seed = clock_seed();
    log::debug!("Seeding share generator from clock");
    StdRng::seed_from_u64(seed)
}

/// Creates a generator with a fixed seed, for reproducible runs.
pub fn seeded(seed: u64) -> ShareRng {
    StdRng::seed_from_u64(seed)
}
