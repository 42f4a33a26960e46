//! Random draws behind a small trait so timing can be pinned in tests.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use storecrawl_common::JitterRange;

/// Source of uniformly distributed integers.
pub trait RangeSampler: Send {
    /// Uniform integer in `[low, high]`. Callers guarantee `low <= high`.
    fn sample_inclusive(&mut self, low: u64, high: u64) -> u64;
}

/// [`RangeSampler`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSampler<R> {
    rng: R,
}

impl<R> RngSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngSampler<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic sequence for reproducible runs and tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// Seeded when a seed is configured, entropy otherwise.
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl<R: Rng + Send> RangeSampler for RngSampler<R> {
    fn sample_inclusive(&mut self, low: u64, high: u64) -> u64 {
        self.rng.gen_range(low..=high)
    }
}

/// Cloneable handle to one sampler shared by several users.
///
/// The lock is held only for a single draw, never across an await.
#[derive(Clone)]
pub struct SharedSampler {
    inner: Arc<Mutex<Box<dyn RangeSampler>>>,
}

impl SharedSampler {
    pub fn new(sampler: impl RangeSampler + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(sampler))),
        }
    }
}

impl std::fmt::Debug for SharedSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSampler").finish_non_exhaustive()
    }
}

impl RangeSampler for SharedSampler {
    fn sample_inclusive(&mut self, low: u64, high: u64) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sample_inclusive(low, high)
    }
}

/// Draw one value from `range`.
pub fn draw(range: &JitterRange, sampler: &mut dyn RangeSampler) -> u64 {
    let (low, high) = range.bounds();
    match range.resolution {
        Some(steps) if steps >= 2 => {
            let step = sampler.sample_inclusive(0, u64::from(steps - 1));
            range.value_at(step as u32)
        }
        _ => sampler.sample_inclusive(low, high),
    }
}

/// Draw a value from `range` and read it as milliseconds.
pub fn draw_duration(range: &JitterRange, sampler: &mut dyn RangeSampler) -> Duration {
    Duration::from_millis(draw(range, sampler))
}
