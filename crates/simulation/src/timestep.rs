//! Time increment strategies.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stochnet_core::{TimestepError, TimestepFunction};
use stochnet_types::{HistoryError, TimestepsHistory};

/// The same increment every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantTimestepFunction {
    stepsize: f64,
}

impl ConstantTimestepFunction {
    /// Step by `stepsize` every step.
    pub fn new(stepsize: f64) -> Self {
        Self { stepsize }
    }
}

impl TimestepFunction for ConstantTimestepFunction {
    fn next_increment(&mut self, _timesteps: &TimestepsHistory) -> Result<f64, TimestepError> {
        Ok(self.stepsize)
    }
}

/// Exponentially distributed inter-event times.
///
/// Sampled by inverse CDF, `-mean * ln(1 - u)` with `u` uniform in `[0, 1)`,
/// from a private ChaCha8 generator. The same seed always yields the same
/// sequence of increments.
#[derive(Debug, Clone)]
pub struct ExponentialTimestepFunction {
    mean: f64,
    seed: u64,
    rng: ChaCha8Rng,
}

impl ExponentialTimestepFunction {
    /// Increments with the given mean, seeded deterministically.
    pub fn new(mean: f64, seed: u64) -> Self {
        Self {
            mean,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Mean increment.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Rewind the generator to its seed.
    pub fn reseed(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }
}

impl TimestepFunction for ExponentialTimestepFunction {
    fn next_increment(&mut self, timesteps: &TimestepsHistory) -> Result<f64, TimestepError> {
        if !(self.mean.is_finite() && self.mean > 0.0) {
            return Err(TimestepError::InvalidIncrement {
                step: timesteps.pending_step(),
                increment: self.mean,
            });
        }
        let u: f64 = self.rng.gen();
        Ok(-self.mean * (1.0 - u).ln())
    }
}

/// Replays a recorded sequence of increments.
///
/// Step `n` receives increment `n - 1`. Asking beyond the recording is an
/// exhaustion error at the step where it first happens.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayTimestepFunction {
    increments: Vec<f64>,
}

impl ReplayTimestepFunction {
    /// Replay the given increments in order.
    pub fn from_increments(increments: Vec<f64>) -> Self {
        Self { increments }
    }

    /// Replay the increments between recorded cumulative times, oldest first.
    pub fn from_cumulative_times(times: &[f64]) -> Result<Self, HistoryError> {
        let mut increments = Vec::with_capacity(times.len().saturating_sub(1));
        for (index, pair) in times.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(HistoryError::NonMonotonicTimes {
                    index: index + 1,
                    newer: pair[1],
                    older_index: index,
                    older: pair[0],
                });
            }
            increments.push(pair[1] - pair[0]);
        }
        Ok(Self { increments })
    }

    /// Number of recorded increments.
    pub fn len(&self) -> usize {
        self.increments.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.increments.is_empty()
    }
}

impl TimestepFunction for ReplayTimestepFunction {
    fn next_increment(&mut self, timesteps: &TimestepsHistory) -> Result<f64, TimestepError> {
        let step = timesteps.pending_step();
        usize::try_from(timesteps.current_step())
            .ok()
            .and_then(|index| self.increments.get(index).copied())
            .ok_or(TimestepError::Exhausted {
                step,
                available: self.increments.len(),
            })
    }
}

/// Replays the time window of an outer run inside a nested run.
///
/// The nested run starts at the oldest time of `data`; step `n` moves to the
/// time at depth `depth - n - 1`. One step past the window uses the outer
/// run's pending increment, and any further step is exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct FromHistoryTimestepFunction {
    data: TimestepsHistory,
}

impl FromHistoryTimestepFunction {
    /// Replay `data`, typically a clone of the outer run's timesteps history.
    pub fn new(data: TimestepsHistory) -> Self {
        Self { data }
    }

    /// Cumulative time the nested run should start at.
    pub fn start_time(&self) -> f64 {
        self.data.at(self.data.depth() - 1)
    }
}

impl TimestepFunction for FromHistoryTimestepFunction {
    fn next_increment(&mut self, timesteps: &TimestepsHistory) -> Result<f64, TimestepError> {
        let step = timesteps.pending_step();
        let depth = self.data.depth();
        let exhausted = TimestepError::Exhausted {
            step,
            available: depth,
        };
        let step_index = usize::try_from(step).map_err(|_| exhausted.clone())?;
        match depth.checked_sub(step_index + 1) {
            Some(index) => Ok(self.data.at(index) - timesteps.latest()),
            None if step_index == depth => Ok(self.data.next_increment()),
            None => Err(exhausted),
        }
    }
}
