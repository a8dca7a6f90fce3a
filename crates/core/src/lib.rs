//! Core contracts for stochnet.
//!
//! The coordinator is generic over a handful of pluggable strategies. This
//! crate defines those contracts and the in-memory settings they are
//! configured from:
//!
//! - [`Iteration`]: computes a partition's next state vector from its
//!   parameter table and the read-only pre-step snapshot
//! - [`TimestepFunction`]: produces the next elapsed-time increment
//! - [`OutputCondition`] / [`OutputFunction`]: decide whether and how the
//!   committed joint state is emitted
//! - [`TerminationCondition`]: decides when a run stops
//!
//! All strategies are `Send` so that a whole run (including a nested run
//! owned by an iteration) can move onto a worker thread.

mod builder;
mod error;
mod joint;
mod settings;
mod traits;

pub use builder::SettingsBuilder;
pub use error::{IterationError, OutputError, TimestepError};
pub use joint::JointState;
pub use settings::{ParamRoute, PartitionSettings, RouteSource, RouteTarget, RowOffset, Settings};
pub use traits::{
    Implementations, Iteration, OutputCondition, OutputFunction, TerminationCondition,
    TimestepFunction,
};

pub use stochnet_types::{
    ConfigError, HistoryError, Params, ParamsError, PartitionIndex, StateHistory, TimestepsHistory,
};
