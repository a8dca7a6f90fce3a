//! Nested simulation runs.
//!
//! [`EmbeddedSimulationRunIteration`] owns a complete inner run (settings
//! plus strategies) and drives a fresh [`PartitionCoordinator`] over it to
//! termination inside every outer step. The outer coordinator sees an
//! ordinary iteration.
//!
//! Outer parameters named `"<i>/<name>"` address nested partition `i`:
//!
//! | Outer parameter | Effect on the nested run |
//! |-----------------|--------------------------|
//! | `<i>/init_state_values` | initial state of nested partition `i` |
//! | `<i>/state_memory_partition` | static; replay outer partition `[j]` as nested partition `i` |
//! | `<i>/<other>` | parameter `<other>` of nested partition `i` |
//! | `init_time_value` | initial cumulative time of the nested run |
//! | `burn_in_steps` | static; outer steps that hold the state before nesting starts |
//!
//! With state memory configured, the nested run replays the outer run's
//! recent past: the timesteps come from the outer timesteps window, the
//! nested run starts at the oldest time in it, and every memory partition
//! replays the matching outer history from its oldest row.

use crate::FromHistoryIteration;
use stochnet_coordinator::{ExecutionMode, ParameterResolver, PartitionCoordinator};
use stochnet_core::{Implementations, Iteration, IterationError, Settings};
use stochnet_simulation::FromHistoryTimestepFunction;
use stochnet_types::{ConfigError, Params, PartitionIndex, StateHistory, TimestepsHistory};
use tracing::{debug, trace};

const INIT_STATE_VALUES: &str = "init_state_values";
const STATE_MEMORY_PARTITION: &str = "state_memory_partition";

/// Split `"<i>/<name>"` into the nested partition index and parameter name.
fn split_nested(name: &str) -> Option<(PartitionIndex, &str)> {
    let (index, param) = name.split_once('/')?;
    Some((index.parse().ok()?, param))
}

/// Outer partition replayed as a nested partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StateMemory {
    outer: PartitionIndex,
    inner: PartitionIndex,
}

/// Runs a nested simulation to termination on every step.
///
/// The output is the concatenation of the nested partitions' final rows, so
/// the outer partition's width must equal the sum of the nested widths.
pub struct EmbeddedSimulationRunIteration {
    settings: Settings,
    /// Taken while the nested coordinator runs, then handed back.
    implementations: Option<Implementations>,
    mode: ExecutionMode,
    memories: Vec<StateMemory>,
    burn_in_steps: u64,
}

impl EmbeddedSimulationRunIteration {
    /// Nest a run of `implementations` over `settings`.
    ///
    /// The nested run is sequential by default; the outer coordinator
    /// already spreads partitions over threads.
    pub fn new(settings: Settings, implementations: Implementations) -> Self {
        Self {
            settings,
            implementations: Some(implementations),
            mode: ExecutionMode::Sequential,
            memories: Vec::new(),
            burn_in_steps: 0,
        }
    }

    /// Select the nested coordinator's execution mode.
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Settings of the nested run, before per-step parameter injection.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn total_width(&self) -> usize {
        self.settings.partitions.iter().map(|p| p.state_width).sum()
    }

    fn read_static_params(
        &mut self,
        partition: PartitionIndex,
        params: &Params,
        outer: &Settings,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid { partition, message };

        let count = self.settings.partitions.len();
        let own_routes = outer.partitions[partition].routes.iter().filter_map(|route| {
            let upstream = outer.resolve_source(partition, route).ok()?;
            Some(route.target_name(upstream, &outer.partitions[upstream].name))
        });
        let targets = params.floats().map(|(name, _)| name.to_string()).chain(own_routes);
        for name in targets {
            match split_nested(&name) {
                Some((inner, _)) if inner >= count => {
                    return Err(invalid(format!(
                        "{name:?} targets nested partition {inner} but the nested run has {count}"
                    )));
                }
                _ => {}
            }
        }

        self.memories.clear();
        for (name, values) in params.floats() {
            let Some((inner, STATE_MEMORY_PARTITION)) = split_nested(name) else {
                continue;
            };
            let outer_index = values
                .first()
                .copied()
                .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
                .map(|v| v as usize)
                .ok_or_else(|| invalid(format!("{name:?} must hold one partition index")))?;
            let Some(outer_partition) = outer.partitions.get(outer_index) else {
                return Err(invalid(format!(
                    "{name:?} refers to outer partition {outer_index} but only {} exist",
                    outer.partitions.len()
                )));
            };
            let Some(inner_partition) = self.settings.partitions.get(inner) else {
                return Err(invalid(format!(
                    "{name:?} refers to nested partition {inner} but only {} exist",
                    self.settings.partitions.len()
                )));
            };
            if outer_partition.state_width != inner_partition.state_width {
                return Err(invalid(format!(
                    "outer partition {outer_index} has width {} but nested partition {inner} has width {}",
                    outer_partition.state_width, inner_partition.state_width
                )));
            }
            self.memories.push(StateMemory {
                outer: outer_index,
                inner,
            });
        }

        self.burn_in_steps = match params.get_ok("burn_in_steps") {
            Some(values) => values
                .first()
                .copied()
                .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
                .map(|v| v as u64)
                .ok_or_else(|| invalid("burn_in_steps must be a non-negative integer".to_string()))?,
            None => 0,
        };
        Ok(())
    }

    /// Nested settings for one outer step.
    fn step_settings(
        &self,
        params: &Params,
        timesteps: &TimestepsHistory,
    ) -> Result<Settings, IterationError> {
        let mut settings = self.settings.clone();
        let count = settings.partitions.len();

        for (name, values) in params.floats() {
            let Some((index, param)) = split_nested(name) else {
                continue;
            };
            if param == STATE_MEMORY_PARTITION {
                continue;
            }
            let nested = settings.partitions.get_mut(index).ok_or_else(|| {
                IterationError::InvariantViolation(format!(
                    "param {name:?} targets nested partition {index} but the nested run has {count}"
                ))
            })?;
            if param == INIT_STATE_VALUES {
                nested.init_state_values = values.to_vec();
            } else {
                nested.params.set(param, values.to_vec());
            }
        }

        if params.contains("init_time_value") {
            settings.init_time_value = params.get_index("init_time_value", 0)?;
        }
        if !self.memories.is_empty() {
            settings.init_time_value = timesteps.at(timesteps.depth() - 1);
        }
        Ok(settings)
    }
}

impl Iteration for EmbeddedSimulationRunIteration {
    fn configure(
        &mut self,
        partition: PartitionIndex,
        settings: &Settings,
    ) -> Result<(), ConfigError> {
        let nested = |e: ConfigError| ConfigError::Invalid {
            partition,
            message: format!("nested run: {e}"),
        };

        self.settings.validate().map_err(nested)?;
        ParameterResolver::new(&self.settings).map_err(nested)?;
        let implementations =
            self.implementations
                .as_mut()
                .ok_or_else(|| ConfigError::Invalid {
                    partition,
                    message: "nested strategies were lost by an earlier failure".to_string(),
                })?;
        implementations.configure(&self.settings).map_err(nested)?;

        let Some(outer) = settings.partitions.get(partition) else {
            return Err(ConfigError::Invalid {
                partition,
                message: "partition not configured".to_string(),
            });
        };
        let expected = self.total_width();
        if outer.state_width != expected {
            return Err(ConfigError::WidthMismatch {
                partition,
                configured: outer.state_width,
                expected,
            });
        }

        self.read_static_params(partition, &outer.params, settings)?;

        debug!(
            partition,
            nested_partitions = self.settings.partitions.len(),
            memories = self.memories.len(),
            burn_in_steps = self.burn_in_steps,
            "Embedded run configured"
        );
        Ok(())
    }

    fn iterate(
        &mut self,
        params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        if timesteps.pending_step() < self.burn_in_steps {
            return Ok(histories[partition].copy_row(0));
        }

        let mut settings = self.step_settings(params, timesteps)?;
        let mut implementations = self.implementations.take().ok_or_else(|| {
            IterationError::InvariantViolation(
                "nested strategies were lost by an earlier failure".to_string(),
            )
        })?;

        if !self.memories.is_empty() {
            implementations.timestep_function =
                Box::new(FromHistoryTimestepFunction::new(timesteps.clone()));
        }
        for memory in &self.memories {
            let data = &histories[memory.outer];
            settings.partitions[memory.inner].init_state_values =
                data.copy_row(data.depth() - 1);
            implementations.iterations[memory.inner] =
                Box::new(FromHistoryIteration::new(data.clone()));
        }

        let mut coordinator = PartitionCoordinator::new(&settings, implementations)
            .map_err(|e| IterationError::Nested(Box::new(e)))?
            .with_execution_mode(self.mode);
        let outcome = coordinator.run();
        let row: Vec<f64> = coordinator
            .histories()
            .iter()
            .flat_map(|history| history.latest_row().iter().copied())
            .collect();
        let time = coordinator.time();
        self.implementations = Some(coordinator.into_implementations());

        let steps = outcome.map_err(|e| IterationError::Nested(Box::new(e)))?;
        trace!(
            partition,
            outer_step = timesteps.pending_step(),
            nested_steps = steps,
            nested_time = time,
            "Embedded run finished"
        );
        Ok(row)
    }
}
