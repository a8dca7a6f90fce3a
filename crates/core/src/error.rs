//! Error types returned by the collaborator contracts.

use stochnet_types::ParamsError;
use thiserror::Error;

/// Errors returned by [`Iteration::iterate`](crate::Iteration::iterate).
///
/// Every variant is fatal for the run: the coordinator discards the whole
/// step and stops.
#[derive(Debug, Error)]
pub enum IterationError {
    /// A parameter was missing, out of range or not a valid flag.
    #[error(transparent)]
    Params(#[from] ParamsError),

    /// A finite replay source ran out of data.
    #[error("replay data exhausted at step {step} ({available} rows available)")]
    Exhausted {
        /// Step being computed when exhaustion was observed.
        step: u64,
        /// Rows the source held.
        available: usize,
    },

    /// A caller misconfiguration surfaced at run time.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A nested run driven by this iteration failed.
    #[error("nested run failed: {0}")]
    Nested(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by [`TimestepFunction::next_increment`](crate::TimestepFunction::next_increment).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestepError {
    /// A replayed increment sequence ran out before the run did.
    #[error("timestep replay exhausted at step {step} ({available} increments available)")]
    Exhausted {
        /// Step the increment was requested for.
        step: u64,
        /// Increments the source held.
        available: usize,
    },

    /// The increment was negative, NaN or infinite.
    #[error("invalid time increment {increment} at step {step}")]
    InvalidIncrement {
        /// Step the increment was requested for.
        step: u64,
        /// Offending increment.
        increment: f64,
    },
}

/// Errors returned by [`OutputFunction::output`](crate::OutputFunction::output).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutputError {
    /// The sink can no longer accept output (e.g. a closed stream).
    #[error("output sink failed: {0}")]
    Sink(String),
}
