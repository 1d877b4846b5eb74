//! Per-node accumulator of received shares.
//!
//! The store is reached concurrently by every inbound share handler and by the
//! node's own retained share. The size check and the append happen in one critical
//! section, so exactly one `add` observes the store reaching its population; that
//! caller owns the completion event for the round.

use std::sync::{Mutex, MutexGuard};

use zeroize::Zeroizing;

use super::MpcError;

/// Synchronized multiset of share values, closed once it holds `population` entries.
pub struct ShareStore {
    population: usize,
    values: Mutex<Zeroizing<Vec<i64>>>,
}

impl ShareStore {
    /// Creates an empty store for a round with `population` contributors.
    pub fn new(population: usize) -> Result<Self, MpcError> {
        if population == 0 {
            return Err(MpcError::InvalidPopulation);
        }
        Ok(Self {
            population,
            values: Mutex::new(Zeroizing::new(Vec::with_capacity(population))),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Zeroizing<Vec<i64>>> {
        // A panicking writer cannot leave the vector half-updated; keep serving.
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends a share and returns the new size.
    ///
    /// # Errors
    /// Returns `MpcError::RoundClosed` if the store is already complete.
    pub fn add(&self, value: i64) -> Result<usize, MpcError> {
        let mut values = self.lock();
        if values.len() >= self.population {
            return Err(MpcError::RoundClosed {
                population: self.population,
            });
        }
        values.push(value);
        Ok(values.len())
    }

    /// Appends a share and reports whether this call completed the store.
    pub fn add_and_check(&self, value: i64) -> Result<bool, MpcError> {
        Ok(self.add(value)? == self.population)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn population(&self) -> usize {
        self.population
    }

    /// True once every contributor's share has arrived.
    pub fn is_complete(&self) -> bool {
        self.len() == self.population
    }

    /// Wrapping sum of all stored shares.
    ///
    /// # Errors
    /// Returns `MpcError::NotReady` until the store is complete.
    pub fn aggregate(&self) -> Result<i64, MpcError> {
        let values = self.lock();
        if values.len() != self.population {
            return Err(MpcError::NotReady {
                received: values.len(),
                population: self.population,
            });
        }
        Ok(values.iter().fold(0i64, |acc, v| acc.wrapping_add(*v)))
    }
}
