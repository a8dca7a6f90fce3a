//! Collaborator contracts consumed by the coordinator.

use crate::{IterationError, JointState, OutputError, Settings, TimestepError};
use stochnet_types::{ConfigError, Params, PartitionIndex, StateHistory, TimestepsHistory};

/// The pluggable unit of computation for one partition.
///
/// Implementations are the stochastic processes, deterministic transforms
/// and composites that make up a simulation. The coordinator never inspects
/// which variant it is driving.
///
/// # Example
///
/// ```ignore
/// struct Doubling;
///
/// impl Iteration for Doubling {
///     fn iterate(
///         &mut self,
///         _params: &mut Params,
///         partition: PartitionIndex,
///         histories: &[StateHistory],
///         _timesteps: &TimestepsHistory,
///     ) -> Result<Vec<f64>, IterationError> {
///         Ok(histories[partition].latest_row().iter().map(|v| v * 2.0).collect())
///     }
/// }
/// ```
pub trait Iteration: Send {
    /// One-time setup before the run starts.
    ///
    /// Typical uses are seeding a private random source from
    /// `settings.partitions[partition].seed` or deriving static slices from
    /// the partition's parameters. Called once per run configuration, not
    /// once per coordinator: nested runs reuse the configured state.
    fn configure(
        &mut self,
        _partition: PartitionIndex,
        _settings: &Settings,
    ) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Compute the partition's next state vector.
    ///
    /// # Guarantees
    ///
    /// - **Snapshot isolation**: `histories` and `timesteps` hold only
    ///   committed pre-step data. No other partition's result for this step
    ///   is visible.
    /// - **Private parameters**: `params` is a fresh copy built for this call
    ///   and may be mutated in place.
    ///
    /// # Arguments
    ///
    /// * `params` - Static parameters overlaid with routed values
    /// * `partition` - Index of the partition being computed
    /// * `histories` - Every partition's history, indexed by partition
    /// * `timesteps` - Cumulative time history with the pending increment set
    ///
    /// # Returns
    ///
    /// The next state vector, which must have the partition's configured width.
    fn iterate(
        &mut self,
        params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError>;
}

impl Iteration for Box<dyn Iteration> {
    fn configure(
        &mut self,
        partition: PartitionIndex,
        settings: &Settings,
    ) -> Result<(), ConfigError> {
        (**self).configure(partition, settings)
    }

    fn iterate(
        &mut self,
        params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        (**self).iterate(params, partition, histories, timesteps)
    }
}

/// Produces the elapsed-time increment for the next step.
///
/// Called exactly once per step, before any parameters are resolved, with
/// the timesteps history as committed by the previous step.
pub trait TimestepFunction: Send {
    /// The increment for the step about to be computed.
    fn next_increment(&mut self, timesteps: &TimestepsHistory) -> Result<f64, TimestepError>;
}

/// Decides whether the committed state of a step is emitted.
pub trait OutputCondition: Send {
    /// Whether to call the output function for this step.
    ///
    /// `step` counts committed steps; step 0 is the initial state.
    fn should_output(&mut self, step: u64) -> bool;
}

/// Emits the committed joint state.
pub trait OutputFunction: Send {
    /// Emit the joint state after a commit.
    ///
    /// An error stops the run: a sink that can no longer accept output is a
    /// failure, not something to skip.
    fn output(&mut self, state: &JointState<'_>) -> Result<(), OutputError>;
}

/// Decides when a run stops.
pub trait TerminationCondition: Send {
    /// Whether the run should stop after the given committed step.
    fn terminate(&mut self, step: u64, state: &JointState<'_>) -> bool;
}

/// Every strategy needed to drive one run.
pub struct Implementations {
    /// One iteration per partition, indexed by partition.
    pub iterations: Vec<Box<dyn Iteration>>,

    /// Source of time increments.
    pub timestep_function: Box<dyn TimestepFunction>,

    /// Throttle for output.
    pub output_condition: Box<dyn OutputCondition>,

    /// Sink for committed joint states.
    pub output_function: Box<dyn OutputFunction>,

    /// Stopping rule.
    pub termination_condition: Box<dyn TerminationCondition>,
}

impl Implementations {
    /// Bundle the strategies for a run.
    pub fn new(
        iterations: Vec<Box<dyn Iteration>>,
        timestep_function: Box<dyn TimestepFunction>,
        output_condition: Box<dyn OutputCondition>,
        output_function: Box<dyn OutputFunction>,
        termination_condition: Box<dyn TerminationCondition>,
    ) -> Self {
        Self {
            iterations,
            timestep_function,
            output_condition,
            output_function,
            termination_condition,
        }
    }

    /// Replace the output strategies.
    pub fn with_output(
        mut self,
        output_condition: Box<dyn OutputCondition>,
        output_function: Box<dyn OutputFunction>,
    ) -> Self {
        self.output_condition = output_condition;
        self.output_function = output_function;
        self
    }

    /// Call [`Iteration::configure`] on every iteration in partition order.
    pub fn configure(&mut self, settings: &Settings) -> Result<(), ConfigError> {
        if self.iterations.len() != settings.partitions.len() {
            return Err(ConfigError::IterationCountMismatch {
                iterations: self.iterations.len(),
                partitions: settings.partitions.len(),
            });
        }
        for (index, iteration) in self.iterations.iter_mut().enumerate() {
            iteration.configure(index, settings)?;
        }
        Ok(())
    }
}
