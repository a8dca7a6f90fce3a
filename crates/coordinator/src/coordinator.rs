//! The partition coordinator state machine.

use crate::{ParameterResolver, RunError};
use rayon::prelude::*;
use stochnet_core::{Implementations, Iteration, JointState, Settings, TimestepError};
use stochnet_types::{ConfigError, PartitionIndex, StateHistory, TimestepsHistory};
use tracing::{debug, error, info, instrument, trace};

/// Lifecycle of a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Constructed, no output emitted, no step taken.
    Idle,
    /// Initial output emitted; stepping.
    Running,
    /// Termination fired or a step failed. Stepping again is an error.
    Terminated,
}

/// How the per-step partition work is scheduled.
///
/// Both modes produce bit-identical trajectories: each partition reads only
/// the committed snapshot and results are committed in partition order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Fan partitions out over the rayon thread pool.
    #[default]
    Parallel,
    /// Compute partitions one after another on the calling thread.
    Sequential,
}

/// Drives one run over every partition.
///
/// Owns the run state exclusively: every partition history, the shared
/// timesteps history and the strategies. Iterations only ever see shared
/// references to the committed snapshot.
///
/// The coordinator does not call [`Iteration::configure`]. Use
/// [`configured`](Self::configured) for a run whose iterations still need
/// it, or [`new`](Self::new) when they were configured already (for example
/// by [`SettingsBuilder`](stochnet_core::SettingsBuilder), or by a nested
/// run that builds a fresh coordinator on every outer step).
pub struct PartitionCoordinator {
    resolver: ParameterResolver,
    names: Vec<String>,
    widths: Vec<usize>,
    histories: Vec<StateHistory>,
    timesteps: TimestepsHistory,
    implementations: Implementations,
    state: CoordinatorState,
    mode: ExecutionMode,
}

impl std::fmt::Debug for PartitionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionCoordinator")
            .field("names", &self.names)
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("step", &self.timesteps.current_step())
            .field("time", &self.timesteps.latest())
            .finish_non_exhaustive()
    }
}

impl PartitionCoordinator {
    /// Build a coordinator from settings and already-configured strategies.
    ///
    /// Validates shapes and routes. Every configuration error surfaces here,
    /// before any step executes.
    pub fn new(settings: &Settings, implementations: Implementations) -> Result<Self, RunError> {
        settings
            .validate()
            .inspect_err(|e| error!(error = %e, "Invalid settings"))?;
        if implementations.iterations.len() != settings.partitions.len() {
            return Err(ConfigError::IterationCountMismatch {
                iterations: implementations.iterations.len(),
                partitions: settings.partitions.len(),
            }
            .into());
        }

        let resolver = ParameterResolver::new(settings)?;
        let histories = settings.initial_histories()?;
        let timesteps = settings.initial_timesteps()?;
        let names = settings.partition_names();
        let widths = settings.partitions.iter().map(|p| p.state_width).collect();

        debug!(
            partitions = names.len(),
            timesteps_depth = timesteps.depth(),
            init_time = timesteps.latest(),
            "Partition coordinator created"
        );

        Ok(Self {
            resolver,
            names,
            widths,
            histories,
            timesteps,
            implementations,
            state: CoordinatorState::Idle,
            mode: ExecutionMode::default(),
        })
    }

    /// Configure every iteration, then build the coordinator.
    pub fn configured(
        settings: &Settings,
        mut implementations: Implementations,
    ) -> Result<Self, RunError> {
        implementations
            .configure(settings)
            .inspect_err(|e| error!(error = %e, "Iteration configuration failed"))?;
        Self::new(settings, implementations)
    }

    /// Select how partitions are scheduled within a step.
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Scheduling mode.
    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Number of committed steps.
    pub fn step_count(&self) -> u64 {
        self.timesteps.current_step()
    }

    /// Cumulative time of the last commit.
    pub fn time(&self) -> f64 {
        self.timesteps.latest()
    }

    /// Committed partition histories, indexed by partition.
    pub fn histories(&self) -> &[StateHistory] {
        &self.histories
    }

    /// Committed timesteps history.
    pub fn timesteps(&self) -> &TimestepsHistory {
        &self.timesteps
    }

    /// Display names of the partitions.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// View of the committed joint state.
    pub fn joint_state(&self) -> JointState<'_> {
        JointState::new(
            self.timesteps.current_step(),
            self.timesteps.latest(),
            &self.names,
            &self.histories,
        )
    }

    /// Give the strategies back, for reuse by a later run.
    pub fn into_implementations(self) -> Implementations {
        self.implementations
    }

    /// Leave `Idle`: emit the initial state and check termination at step 0.
    ///
    /// A termination condition that already holds for the initial state
    /// ends the run before any step executes.
    pub fn start(&mut self) -> Result<CoordinatorState, RunError> {
        match self.state {
            CoordinatorState::Idle => {}
            CoordinatorState::Running => return Ok(self.state),
            CoordinatorState::Terminated => return Err(RunError::AlreadyTerminated),
        }
        self.state = CoordinatorState::Running;
        if let Err(e) = self.finish_step() {
            return Err(self.fail(self.timesteps.current_step(), e));
        }
        Ok(self.state)
    }

    /// Execute one step and return the state after it.
    ///
    /// Starts the run first if it is still `Idle`. On error nothing from the
    /// failed step is committed and the coordinator is `Terminated`.
    pub fn step(&mut self) -> Result<CoordinatorState, RunError> {
        match self.state {
            CoordinatorState::Terminated => return Err(RunError::AlreadyTerminated),
            CoordinatorState::Idle => {
                if self.start()? == CoordinatorState::Terminated {
                    return Ok(self.state);
                }
            }
            CoordinatorState::Running => {}
        }
        let step = self.timesteps.pending_step();
        if let Err(e) = self.advance().and_then(|()| self.finish_step()) {
            return Err(self.fail(step, e));
        }
        Ok(self.state)
    }

    /// Step until the termination condition fires.
    ///
    /// Returns the number of committed steps. A termination condition that
    /// never fires runs forever.
    #[instrument(skip_all, fields(partitions = self.names.len()))]
    pub fn run(&mut self) -> Result<u64, RunError> {
        info!(mode = ?self.mode, "Starting run");
        while self.step()? != CoordinatorState::Terminated {}
        info!(
            steps = self.timesteps.current_step(),
            time = self.timesteps.latest(),
            "Run terminated"
        );
        Ok(self.timesteps.current_step())
    }

    /// Compute every partition's next row against the committed snapshot,
    /// then commit all of them and the clock together.
    fn advance(&mut self) -> Result<(), RunError> {
        let step = self.timesteps.pending_step();
        let increment = self
            .implementations
            .timestep_function
            .next_increment(&self.timesteps)?;
        if !increment.is_finite() || increment < 0.0 {
            return Err(TimestepError::InvalidIncrement { step, increment }.into());
        }
        self.timesteps.set_next_increment(increment);
        trace!(step, increment, "Time increment");

        let results = self.compute(step);

        // Barrier: the first failure in partition order wins and nothing is
        // committed.
        let rows = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        for (history, row) in self.histories.iter_mut().zip(&rows) {
            history.commit_next(row);
        }
        self.timesteps.advance();
        trace!(step, time = self.timesteps.latest(), "Step committed");
        Ok(())
    }

    fn compute(&mut self, step: u64) -> Vec<Result<Vec<f64>, RunError>> {
        let snapshot = Snapshot {
            resolver: &self.resolver,
            histories: &self.histories,
            timesteps: &self.timesteps,
            widths: &self.widths,
            step,
        };
        let work = |(partition, iteration): (PartitionIndex, &mut Box<dyn Iteration>)| {
            snapshot.compute_partition(partition, iteration.as_mut())
        };

        let iterations = &mut self.implementations.iterations;
        match self.mode {
            ExecutionMode::Parallel => iterations.par_iter_mut().enumerate().map(work).collect(),
            ExecutionMode::Sequential => iterations.iter_mut().enumerate().map(work).collect(),
        }
    }

    /// Check termination on the committed state, then emit output.
    ///
    /// The final output on termination ignores the output condition.
    fn finish_step(&mut self) -> Result<(), RunError> {
        let step = self.timesteps.current_step();
        let joint = JointState::new(
            step,
            self.timesteps.latest(),
            &self.names,
            &self.histories,
        );
        let implementations = &mut self.implementations;

        if implementations.termination_condition.terminate(step, &joint) {
            implementations.output_function.output(&joint)?;
            self.state = CoordinatorState::Terminated;
            debug!(step, "Termination condition met");
            return Ok(());
        }
        if implementations.output_condition.should_output(step) {
            implementations.output_function.output(&joint)?;
        }
        Ok(())
    }

    fn fail(&mut self, step: u64, error: RunError) -> RunError {
        error!(step, error = %error, "Run failed");
        self.state = CoordinatorState::Terminated;
        error
    }
}

/// Read-only view a partition computes its next row against.
struct Snapshot<'a> {
    resolver: &'a ParameterResolver,
    histories: &'a [StateHistory],
    timesteps: &'a TimestepsHistory,
    widths: &'a [usize],
    step: u64,
}

impl Snapshot<'_> {
    fn compute_partition(
        &self,
        partition: PartitionIndex,
        iteration: &mut dyn Iteration,
    ) -> Result<Vec<f64>, RunError> {
        let step = self.step;
        let width = self.widths[partition];
        let mut params = self.resolver.resolve(partition, self.histories);
        let row = iteration
            .iterate(&mut params, partition, self.histories, self.timesteps)
            .map_err(|source| RunError::Iteration {
                partition,
                step,
                source,
            })?;
        if row.len() != width {
            return Err(RunError::WidthMismatch {
                partition,
                step,
                expected: width,
                got: row.len(),
            });
        }
        Ok(row)
    }
}
