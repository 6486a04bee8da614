//! Array generation
//!
//! A single generation authority draws array 1 and then array 2 from one
//! seeded stream, so a fixed seed always yields the same pair.

use crate::error::{Result, try_alloc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seed used for every benchmark submission
pub const DEFAULT_SEED: u64 = 100_065_736;

/// Upper bound of generated values (glibc `RAND_MAX`)
pub const DEFAULT_MAX_VALUE: i32 = i32::MAX;

pub trait DataSource: Send {
    /// Produce the next `size` integers
    fn generate(&mut self, size: usize) -> Result<Vec<i32>>;
}

/// Uniform integers in `1..=max_value` from a portable, seedable generator
pub struct SeededSource {
    rng: ChaCha8Rng,
    max_value: i32,
}

impl SeededSource {
    pub fn new(seed: u64, max_value: i32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_value: max_value.max(1),
        }
    }
}

impl DataSource for SeededSource {
    fn generate(&mut self, size: usize) -> Result<Vec<i32>> {
        let mut values = try_alloc(size)?;
        let max_value = self.max_value;
        values.extend((0..size).map(|_| self.rng.gen_range(1..=max_value)));
        Ok(values)
    }
}

/// Hands out pre-built arrays in order; used to pin exact inputs
pub struct FixedSource {
    arrays: std::collections::VecDeque<Vec<i32>>,
}

impl FixedSource {
    pub fn new(arrays: Vec<Vec<i32>>) -> Self {
        Self {
            arrays: arrays.into(),
        }
    }
}

impl DataSource for FixedSource {
    fn generate(&mut self, size: usize) -> Result<Vec<i32>> {
        let next = self.arrays.pop_front().unwrap_or_default();
        if next.len() != size {
            return Err(crate::error::CommonError::Protocol(format!(
                "fixed source holds {} values, {} requested",
                next.len(),
                size
            )));
        }
        Ok(next)
    }
}
