//! General-purpose iterations for stochnet.
//!
//! None of these implement a probability distribution. They are the
//! plumbing that stochastic processes are assembled from:
//!
//! - values: [`ConstantValuesIteration`], [`ParamValuesIteration`],
//!   [`CopyValuesIteration`]
//! - accumulation: [`CumulativeIteration`], [`DiscountedCumulativeIteration`]
//! - gating and composition: [`ValueGenerationEventIteration`],
//!   [`SerialIterations`]
//! - replay: [`FromHistoryIteration`]
//! - nesting: [`EmbeddedSimulationRunIteration`], which drives a complete
//!   inner run on every outer step
//!
//! Wrappers only use the [`Iteration`](stochnet_core::Iteration) contract,
//! so the coordinator never needs to know how an iteration is composed.

mod cumulative;
mod embedded;
mod event;
mod from_history;
mod serial;
mod values;

pub use cumulative::{CumulativeIteration, DiscountedCumulativeIteration};
pub use embedded::EmbeddedSimulationRunIteration;
pub use event::ValueGenerationEventIteration;
pub use from_history::FromHistoryIteration;
pub use serial::SerialIterations;
pub use values::{ConstantValuesIteration, CopyValuesIteration, ParamValuesIteration};

use stochnet_core::IterationError;

/// Read a float parameter value as an index.
pub(crate) fn as_index(value: f64, what: &str) -> Result<usize, IterationError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(IterationError::InvariantViolation(format!(
            "{what} must be a non-negative integer, got {value}"
        )))
    }
}
