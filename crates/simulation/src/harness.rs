//! Contract checks for iterations.

use crate::{HarnessError, StateTimeStorage, StateTimeStorageOutputFunction};
use stochnet_coordinator::PartitionCoordinator;
use stochnet_core::{Implementations, Iteration, IterationError, Settings};
use stochnet_types::{ConfigError, Params, PartitionIndex, StateHistory, TimestepsHistory};
use tracing::info;

/// Wraps an iteration and fails the step when it breaks the contract.
///
/// Checked on every call:
///
/// - the partition's history in the snapshot matches what the harness
///   recorded from the iteration's own outputs (nothing was lost or
///   overwritten between steps)
/// - the output has the configured width
/// - the output contains no NaN
///
/// Violations are reported as [`IterationError::InvariantViolation`].
pub struct IterationTestHarness {
    iteration: Box<dyn Iteration>,
    name: String,
    width: usize,
    expected: Option<StateHistory>,
}

impl IterationTestHarness {
    /// Wrap an iteration.
    pub fn new(iteration: Box<dyn Iteration>) -> Self {
        Self {
            iteration,
            name: String::new(),
            width: 0,
            expected: None,
        }
    }

    /// Unwrap the iteration.
    pub fn into_inner(self) -> Box<dyn Iteration> {
        self.iteration
    }

    fn violation(&self, time: f64, message: String) -> IterationError {
        IterationError::InvariantViolation(format!(
            "partition {:?}, time {}: {}",
            self.name, time, message
        ))
    }
}

impl Iteration for IterationTestHarness {
    fn configure(
        &mut self,
        partition: PartitionIndex,
        settings: &Settings,
    ) -> Result<(), ConfigError> {
        let config = &settings.partitions[partition];
        self.name = settings.partition_name(partition);
        self.width = config.state_width;
        self.expected = Some(config.initial_history(partition)?);
        self.iteration.configure(partition, settings)
    }

    fn iterate(
        &mut self,
        params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        let time = timesteps.pending_time();
        let snapshot = &histories[partition];
        {
            let expected = self.expected.as_ref().ok_or_else(|| {
                self.violation(time, "harness used before configure".to_string())
            })?;
            if snapshot.depth() != expected.depth() {
                return Err(self.violation(
                    time,
                    format!(
                        "state history has depth {}, should be {}",
                        snapshot.depth(),
                        expected.depth()
                    ),
                ));
            }
            for (depth, (seen, recorded)) in snapshot.rows().zip(expected.rows()).enumerate() {
                if seen != recorded {
                    return Err(self.violation(
                        time,
                        format!(
                            "past state at depth {depth} not retained: {seen:?} should be {recorded:?}"
                        ),
                    ));
                }
            }
        }

        let output = self
            .iteration
            .iterate(params, partition, histories, timesteps)?;

        if output.iter().any(|v| v.is_nan()) {
            return Err(self.violation(time, format!("output state has NaN: {output:?}")));
        }
        if output.len() != self.width {
            return Err(self.violation(
                time,
                format!(
                    "output state has width {}, should be {}",
                    output.len(),
                    self.width
                ),
            ));
        }
        if let Some(expected) = self.expected.as_mut() {
            expected.commit_next(&output);
        }
        Ok(output)
    }
}

/// Run a configuration twice under harnesses and compare the trajectories.
///
/// Every iteration is wrapped in an [`IterationTestHarness`] and the output
/// function is replaced with in-memory storage. After the first run every
/// iteration is configured again and the run is repeated. Any harness
/// violation or run failure is returned, as is any difference between the
/// two stored trajectories: an iteration whose `configure` does not fully
/// reset it leaves a statefulness residue.
///
/// The timestep, output condition and termination strategies are reused
/// as they are, so they must give the same sequence on the second run.
pub fn run_with_harnesses(
    settings: &Settings,
    mut implementations: Implementations,
) -> Result<(), HarnessError> {
    implementations.iterations = implementations
        .iterations
        .into_iter()
        .map(|iteration| Box::new(IterationTestHarness::new(iteration)) as Box<dyn Iteration>)
        .collect();

    let first = StateTimeStorage::shared();
    implementations.output_function = Box::new(StateTimeStorageOutputFunction::new(first.clone()));
    let mut coordinator = PartitionCoordinator::configured(settings, implementations)?;
    coordinator.run()?;

    let mut implementations = coordinator.into_implementations();
    let second = StateTimeStorage::shared();
    implementations.output_function =
        Box::new(StateTimeStorageOutputFunction::new(second.clone()));
    let mut coordinator = PartitionCoordinator::configured(settings, implementations)?;
    coordinator.run()?;

    let first = first.lock();
    let second = second.lock();
    for name in first.names() {
        let before = first.values(&name).unwrap_or_default();
        let after = second.values(&name).unwrap_or_default();
        let mismatch = before
            .iter()
            .zip(after)
            .position(|(a, b)| a != b)
            .or_else(|| (before.len() != after.len()).then(|| before.len().min(after.len())));
        if let Some(index) = mismatch {
            return Err(HarnessError::StatefulnessResidue { name, index });
        }
    }

    info!(
        partitions = settings.partitions.len(),
        outputs = first.times().len(),
        "Harness runs agree"
    );
    Ok(())
}
