//! Partition coordination for stochnet.
//!
//! A run advances every partition together, one step at a time:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    PartitionCoordinator                      │
//! │                                                              │
//! │  1. Δt = TimestepFunction::next_increment(timesteps)         │
//! │                                                              │
//! │  2. for each partition, in parallel:                         │
//! │       params = ParameterResolver::resolve(p, snapshot)       │
//! │       row[p] = Iteration::iterate(params, p, snapshot, t)    │
//! │                                                              │
//! │  3. barrier: collect rows in partition order                 │
//! │                                                              │
//! │  4. commit every row and advance time together               │
//! │                                                              │
//! │  5. TerminationCondition → final output, or                  │
//! │     OutputCondition → OutputFunction                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every partition reads the same committed snapshot during a step, so no
//! partition can observe another's result for the step in flight. Update
//! order therefore never matters and the per-step work runs in parallel
//! without locks.

mod coordinator;
mod error;
mod resolver;

pub use coordinator::{CoordinatorState, ExecutionMode, PartitionCoordinator};
pub use error::RunError;
pub use resolver::ParameterResolver;
