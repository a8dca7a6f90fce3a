//! Run errors.

use stochnet_core::{IterationError, OutputError, TimestepError};
use stochnet_types::{ConfigError, PartitionIndex};
use thiserror::Error;

/// Errors that stop a run.
///
/// There is no retry anywhere: once a coordinator returns one of these it is
/// terminated and the histories hold the last fully committed step.
#[derive(Debug, Error)]
pub enum RunError {
    /// Configuration rejected before any step executed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A partition's iteration failed; nothing was committed for the step.
    #[error("partition {partition} failed at step {step}: {source}")]
    Iteration {
        /// Failing partition.
        partition: PartitionIndex,
        /// Step being computed.
        step: u64,
        /// Underlying error.
        source: IterationError,
    },

    /// A partition returned a vector of the wrong length.
    #[error("partition {partition} returned {got} values at step {step}, expected {expected}")]
    WidthMismatch {
        /// Offending partition.
        partition: PartitionIndex,
        /// Step being computed.
        step: u64,
        /// Configured state width.
        expected: usize,
        /// Length returned.
        got: usize,
    },

    /// The timestep function failed or produced an invalid increment.
    #[error("timestep error: {0}")]
    Timestep(#[from] TimestepError),

    /// The output sink failed.
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// The coordinator was stepped after it terminated.
    #[error("coordinator already terminated")]
    AlreadyTerminated,
}
