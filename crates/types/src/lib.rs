//! Core types for stochnet.
//!
//! This crate holds the data model shared by every other crate in the
//! workspace:
//!
//! - [`StateHistory`]: fixed-depth rolling window of state vectors, one per
//!   partition, addressed by depth index (0 = most recent).
//! - [`TimestepsHistory`]: rolling window of cumulative elapsed time shared
//!   by all partitions, plus the increment pending for the step in flight.
//! - [`Params`]: the named parameter table handed to an iteration.
//! - [`ConfigError`], [`HistoryError`], [`ParamsError`]: the error types for
//!   configuration and parameter access.

mod error;
mod history;
mod params;
mod timesteps;

pub use error::{ConfigError, HistoryError, ParamsError};
pub use history::StateHistory;
pub use params::Params;
pub use timesteps::TimestepsHistory;

/// Stable index of a partition within one coordinated run.
///
/// Indices are assigned at configuration time in declaration order and never
/// change for the lifetime of a run.
pub type PartitionIndex = usize;
