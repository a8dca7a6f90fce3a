//! Built-in run strategies for stochnet.
//!
//! The coordinator only knows the strategy traits. This crate provides the
//! common implementations:
//!
//! | concern | strategies |
//! |---|---|
//! | time increments | [`ConstantTimestepFunction`], [`ExponentialTimestepFunction`], [`ReplayTimestepFunction`], [`FromHistoryTimestepFunction`] |
//! | stopping | [`NumberOfStepsTerminationCondition`], [`TimeElapsedTerminationCondition`] |
//! | output throttling | [`EveryStepOutputCondition`], [`EveryNStepsOutputCondition`] |
//! | output sinks | [`NilOutputFunction`], [`TracingOutputFunction`], [`StateTimeStorageOutputFunction`] |
//!
//! It also provides [`IterationTestHarness`] and [`run_with_harnesses`] for
//! checking that an iteration behaves under the coordinator's contract.

mod error;
mod harness;
mod output;
mod storage;
mod termination;
mod timestep;

pub use error::HarnessError;
pub use harness::{run_with_harnesses, IterationTestHarness};
pub use output::{
    EveryNStepsOutputCondition, EveryStepOutputCondition, NilOutputFunction,
    StateTimeStorageOutputFunction, TracingOutputFunction,
};
pub use storage::{SharedStorage, StateTimeStorage};
pub use termination::{NumberOfStepsTerminationCondition, TimeElapsedTerminationCondition};
pub use timestep::{
    ConstantTimestepFunction, ExponentialTimestepFunction, FromHistoryTimestepFunction,
    ReplayTimestepFunction,
};
