//! Test helpers for stochnet.
//!
//! Small deterministic iterations and strategy doubles shared by the tests
//! of the other crates. The real built-in strategies live in
//! `stochnet-simulation`; these stay here so that lower crates can test
//! without depending on it.

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use stochnet_core::{
    ConfigError, Implementations, Iteration, IterationError, JointState, OutputCondition,
    OutputError, OutputFunction, ParamRoute, Params, PartitionIndex, PartitionSettings, Settings,
    StateHistory, TerminationCondition, TimestepError, TimestepFunction, TimestepsHistory,
};

// ═══════════════════════════════════════════════════════════════════════════
// Iterations
// ═══════════════════════════════════════════════════════════════════════════

/// Returns its own latest row unchanged.
pub struct HoldIteration;

impl Iteration for HoldIteration {
    fn iterate(
        &mut self,
        _params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        _timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        Ok(histories[partition].copy_row(0))
    }
}

/// Returns the values of one parameter.
pub struct ParamEchoIteration {
    param: String,
}

impl Iteration for ParamEchoIteration {
    fn iterate(
        &mut self,
        params: &mut Params,
        _partition: PartitionIndex,
        _histories: &[StateHistory],
        _timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        Ok(params.get(&self.param)?.to_vec())
    }
}

/// Doubles its own latest row.
pub struct DoublingIteration;

impl Iteration for DoublingIteration {
    fn iterate(
        &mut self,
        _params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        _timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        Ok(histories[partition]
            .latest_row()
            .iter()
            .map(|v| v * 2.0)
            .collect())
    }
}

/// Adds uniform noise in `[-step_size, step_size)` to every element.
///
/// Seeded from the partition seed in `configure`, so the same settings give
/// the same walk. `step_size` defaults to 1.
#[derive(Default)]
pub struct RandomWalkIteration {
    rng: Option<ChaCha8Rng>,
}

impl Iteration for RandomWalkIteration {
    fn configure(
        &mut self,
        partition: PartitionIndex,
        settings: &Settings,
    ) -> Result<(), ConfigError> {
        self.rng = Some(ChaCha8Rng::seed_from_u64(
            settings.partitions[partition].seed,
        ));
        Ok(())
    }

    fn iterate(
        &mut self,
        params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        _timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        let step_size = params.get_ok("step_size").map_or(1.0, |v| v[0]);
        let rng = self.rng.as_mut().ok_or_else(|| {
            IterationError::InvariantViolation("random walk used before configure".to_string())
        })?;
        Ok(histories[partition]
            .latest_row()
            .iter()
            .map(|v| v + rng.gen_range(-step_size..step_size))
            .collect())
    }
}

/// Holds its row until the given step, then fails.
pub struct FailingIteration {
    at_step: u64,
}

impl Iteration for FailingIteration {
    fn iterate(
        &mut self,
        _params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        if timesteps.pending_step() == self.at_step {
            return Err(IterationError::InvariantViolation(format!(
                "failing on purpose at step {}",
                self.at_step
            )));
        }
        Ok(histories[partition].copy_row(0))
    }
}

/// Returns one more value than its configured width.
pub struct WrongWidthIteration;

impl Iteration for WrongWidthIteration {
    fn iterate(
        &mut self,
        _params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        _timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        let mut row = histories[partition].copy_row(0);
        row.push(0.0);
        Ok(row)
    }
}

/// Boxed [`HoldIteration`].
pub fn hold() -> Box<dyn Iteration> {
    Box::new(HoldIteration)
}

/// Boxed [`ParamEchoIteration`] for `param`.
pub fn param_echo(param: &str) -> Box<dyn Iteration> {
    Box::new(ParamEchoIteration {
        param: param.to_string(),
    })
}

/// Boxed [`DoublingIteration`].
pub fn doubling() -> Box<dyn Iteration> {
    Box::new(DoublingIteration)
}

/// Boxed, unconfigured [`RandomWalkIteration`].
pub fn random_walk() -> Box<dyn Iteration> {
    Box::new(RandomWalkIteration::default())
}

/// Boxed [`FailingIteration`] failing at `step`.
pub fn failing_at(step: u64) -> Box<dyn Iteration> {
    Box::new(FailingIteration { at_step: step })
}

/// Boxed [`WrongWidthIteration`].
pub fn wrong_width() -> Box<dyn Iteration> {
    Box::new(WrongWidthIteration)
}

// ═══════════════════════════════════════════════════════════════════════════
// Strategy doubles
// ═══════════════════════════════════════════════════════════════════════════

struct FixedTimestep(f64);

impl TimestepFunction for FixedTimestep {
    fn next_increment(&mut self, _timesteps: &TimestepsHistory) -> Result<f64, TimestepError> {
        Ok(self.0)
    }
}

struct EveryStep;

impl OutputCondition for EveryStep {
    fn should_output(&mut self, _step: u64) -> bool {
        true
    }
}

struct StepLimit(u64);

impl TerminationCondition for StepLimit {
    fn terminate(&mut self, step: u64, _state: &JointState<'_>) -> bool {
        step >= self.0
    }
}

/// A fixed time increment.
pub fn constant_timestep(increment: f64) -> Box<dyn TimestepFunction> {
    Box::new(FixedTimestep(increment))
}

/// Output on every step.
pub fn every_step() -> Box<dyn OutputCondition> {
    Box::new(EveryStep)
}

/// Terminate once `steps` steps have been committed.
pub fn step_limit(steps: u64) -> Box<dyn TerminationCondition> {
    Box::new(StepLimit(steps))
}

/// One emitted joint state.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    /// Committed step.
    pub step: u64,
    /// Cumulative time.
    pub time: f64,
    /// Latest row of every partition.
    pub rows: Vec<Vec<f64>>,
}

/// Shared log written by a recording output function.
#[derive(Debug, Clone, Default)]
pub struct OutputLog(Arc<Mutex<Vec<OutputRecord>>>);

impl OutputLog {
    /// Every record so far.
    pub fn records(&self) -> Vec<OutputRecord> {
        self.0.lock().clone()
    }

    /// Steps output so far.
    pub fn steps(&self) -> Vec<u64> {
        self.0.lock().iter().map(|r| r.step).collect()
    }

    /// Latest rows of one partition across all records.
    pub fn partition_rows(&self, partition: PartitionIndex) -> Vec<Vec<f64>> {
        self.0
            .lock()
            .iter()
            .map(|r| r.rows[partition].clone())
            .collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether nothing has been output.
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

struct RecordingOutput {
    log: OutputLog,
    fail_after: Option<usize>,
}

impl OutputFunction for RecordingOutput {
    fn output(&mut self, state: &JointState<'_>) -> Result<(), OutputError> {
        let mut records = self.log.0.lock();
        if self.fail_after.is_some_and(|limit| records.len() >= limit) {
            return Err(OutputError::Sink("stream closed".to_string()));
        }
        records.push(OutputRecord {
            step: state.step(),
            time: state.time(),
            rows: state.iter().map(|(_, _, row)| row.to_vec()).collect(),
        });
        Ok(())
    }
}

/// An output function recording every joint state into the returned log.
pub fn recording_output() -> (Box<dyn OutputFunction>, OutputLog) {
    let log = OutputLog::default();
    let output = RecordingOutput {
        log: log.clone(),
        fail_after: None,
    };
    (Box::new(output), log)
}

/// Like [`recording_output`], but the sink closes after `records` outputs.
pub fn closing_output(records: usize) -> (Box<dyn OutputFunction>, OutputLog) {
    let log = OutputLog::default();
    let output = RecordingOutput {
        log: log.clone(),
        fail_after: Some(records),
    };
    (Box::new(output), log)
}

/// Unit time steps, output every step, stop after `steps` steps.
pub fn implementations(
    iterations: Vec<Box<dyn Iteration>>,
    steps: u64,
) -> (Implementations, OutputLog) {
    let (output, log) = recording_output();
    let implementations = Implementations::new(
        iterations,
        constant_timestep(1.0),
        every_step(),
        output,
        step_limit(steps),
    );
    (implementations, log)
}

// ═══════════════════════════════════════════════════════════════════════════
// Settings fixtures
// ═══════════════════════════════════════════════════════════════════════════

/// Two width-1, depth-2 partitions: `source` seeded with `[5.0]` and `sink`
/// routing the latest row of `source` into its parameter `x`.
pub fn routed_pair_settings() -> Settings {
    Settings::new(vec![
        PartitionSettings::new("source", vec![5.0]).with_history_depth(2),
        PartitionSettings::new("sink", vec![0.0])
            .with_history_depth(2)
            .with_route(ParamRoute::new("x", 0)),
    ])
}

/// `count` width-`width` random walk partitions with distinct seeds.
pub fn random_walk_settings(count: usize, width: usize, seed: u64) -> Settings {
    Settings::new(
        (0..count)
            .map(|i| {
                PartitionSettings::new(format!("walk_{i}"), vec![0.0; width])
                    .with_history_depth(3)
                    .with_seed(seed.wrapping_add(i as u64))
                    .with_param("step_size", vec![0.5])
            })
            .collect(),
    )
}
