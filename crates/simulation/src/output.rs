//! Output conditions and sinks.

use crate::SharedStorage;
use stochnet_core::{JointState, OutputCondition, OutputError, OutputFunction};
use tracing::debug;

/// Output every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct EveryStepOutputCondition;

impl OutputCondition for EveryStepOutputCondition {
    fn should_output(&mut self, _step: u64) -> bool {
        true
    }
}

/// Output every `n`th step, starting with the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EveryNStepsOutputCondition {
    n: u64,
}

impl EveryNStepsOutputCondition {
    /// Output on steps `0, n, 2n, ...`. An `n` of zero is treated as one.
    pub fn new(n: u64) -> Self {
        Self { n: n.max(1) }
    }
}

impl OutputCondition for EveryNStepsOutputCondition {
    fn should_output(&mut self, step: u64) -> bool {
        step % self.n == 0
    }
}

/// Discards all output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilOutputFunction;

impl OutputFunction for NilOutputFunction {
    fn output(&mut self, _state: &JointState<'_>) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Logs every partition's latest state at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingOutputFunction;

impl OutputFunction for TracingOutputFunction {
    fn output(&mut self, state: &JointState<'_>) -> Result<(), OutputError> {
        for (partition, name, values) in state.iter() {
            debug!(
                step = state.step(),
                time = state.time(),
                partition,
                name,
                ?values,
                "Partition state"
            );
        }
        Ok(())
    }
}

/// Appends every partition's latest state to a [`StateTimeStorage`](crate::StateTimeStorage).
#[derive(Debug, Clone)]
pub struct StateTimeStorageOutputFunction {
    store: SharedStorage,
}

impl StateTimeStorageOutputFunction {
    /// Write into `store`.
    pub fn new(store: SharedStorage) -> Self {
        Self { store }
    }

    /// The storage written to.
    pub fn store(&self) -> &SharedStorage {
        &self.store
    }
}

impl OutputFunction for StateTimeStorageOutputFunction {
    fn output(&mut self, state: &JointState<'_>) -> Result<(), OutputError> {
        let mut store = self.store.lock();
        for (_, name, values) in state.iter() {
            store.append(name, state.time(), values);
        }
        Ok(())
    }
}
