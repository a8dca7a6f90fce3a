//! Harness errors.

use stochnet_coordinator::RunError;
use thiserror::Error;

/// Why [`run_with_harnesses`](crate::run_with_harnesses) rejected a configuration.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// One of the runs failed, including any harness check.
    #[error(transparent)]
    Run(#[from] RunError),

    /// The two runs disagree after reconfiguring.
    #[error("outputs before and after reconfiguring differ for partition {name:?} at output {index}; an iteration keeps state outside configure")]
    StatefulnessResidue {
        /// Partition whose outputs differ.
        name: String,
        /// Index of the first differing output.
        index: usize,
    },
}
