//! Termination conditions.

use stochnet_core::{JointState, TerminationCondition};

/// Stop once a fixed number of steps has been committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberOfStepsTerminationCondition {
    max_steps: u64,
}

impl NumberOfStepsTerminationCondition {
    /// Stop after `max_steps` committed steps.
    pub fn new(max_steps: u64) -> Self {
        Self { max_steps }
    }
}

impl TerminationCondition for NumberOfStepsTerminationCondition {
    fn terminate(&mut self, step: u64, _state: &JointState<'_>) -> bool {
        step >= self.max_steps
    }
}

/// Stop once cumulative time reaches a bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeElapsedTerminationCondition {
    max_time: f64,
}

impl TimeElapsedTerminationCondition {
    /// Stop when the committed time is at least `max_time`.
    pub fn new(max_time: f64) -> Self {
        Self { max_time }
    }
}

impl TerminationCondition for TimeElapsedTerminationCondition {
    fn terminate(&mut self, _step: u64, state: &JointState<'_>) -> bool {
        state.time() >= self.max_time
    }
}
