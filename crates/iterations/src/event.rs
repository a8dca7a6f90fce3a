//! Event-gated value generation.

use crate::as_index;
use stochnet_core::{Iteration, IterationError, Settings};
use stochnet_types::{ConfigError, Params, PartitionIndex, StateHistory, TimestepsHistory};

/// Runs the inner iteration only when an event has occurred.
///
/// The boolean `event_occurred` flag selects the branch: 1 runs the inner
/// iteration, 0 returns `default_values`. Any other value is an invariant
/// violation.
///
/// When `event_occurred_partition_index` is set, the flag is first derived
/// from column `event_occurred_state_value_index` of that partition's latest
/// row and written back into the parameter table, where the inner iteration
/// can see it. The table is this call's private copy, so the write never
/// leaks to another partition or another step.
pub struct ValueGenerationEventIteration {
    iteration: Box<dyn Iteration>,
}

impl ValueGenerationEventIteration {
    /// Gate `iteration` on the event flag.
    pub fn new(iteration: Box<dyn Iteration>) -> Self {
        Self { iteration }
    }
}

impl Iteration for ValueGenerationEventIteration {
    fn configure(
        &mut self,
        partition: PartitionIndex,
        settings: &Settings,
    ) -> Result<(), ConfigError> {
        self.iteration.configure(partition, settings)
    }

    fn iterate(
        &mut self,
        params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        if let Some(source) = params.get_ok("event_occurred_partition_index") {
            let source = as_index(source.first().copied().unwrap_or(f64::NAN), "event partition")?;
            let column = as_index(
                params.get_index("event_occurred_state_value_index", 0)?,
                "event state value index",
            )?;
            let value = histories
                .get(source)
                .and_then(|h| h.latest_row().get(column))
                .copied()
                .ok_or_else(|| {
                    IterationError::InvariantViolation(format!(
                        "no state value {column} in partition {source}"
                    ))
                })?;
            params.set("event_occurred", vec![value]);
        }

        if params.get_flag("event_occurred")? {
            self.iteration
                .iterate(params, partition, histories, timesteps)
        } else {
            Ok(params.get("default_values")?.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamValuesIteration;
    use stochnet_types::ParamsError;

    fn run(params: &mut Params, histories: &[StateHistory]) -> Result<Vec<f64>, IterationError> {
        let timesteps = TimestepsHistory::new(0.0, 1).unwrap();
        ValueGenerationEventIteration::new(Box::new(ParamValuesIteration))
            .iterate(params, 0, histories, &timesteps)
    }

    fn params() -> Params {
        Params::new()
            .with_float("param_values", vec![7.0])
            .with_float("default_values", vec![0.0])
    }

    #[test]
    fn test_static_flag_selects_branch() {
        let histories = vec![StateHistory::new(1, 1, &[0.0]).unwrap()];

        let mut on = params().with_float("event_occurred", vec![1.0]);
        assert_eq!(run(&mut on, &histories).unwrap(), vec![7.0]);

        let mut off = params().with_float("event_occurred", vec![0.0]);
        assert_eq!(run(&mut off, &histories).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_flag_derived_from_partition_is_written_back() {
        let histories = vec![
            StateHistory::new(1, 1, &[0.0]).unwrap(),
            StateHistory::new(2, 1, &[0.0, 1.0]).unwrap(),
        ];
        let mut params = params()
            .with_float("event_occurred_partition_index", vec![1.0])
            .with_float("event_occurred_state_value_index", vec![1.0]);

        assert_eq!(run(&mut params, &histories).unwrap(), vec![7.0]);
        assert_eq!(params.get("event_occurred").unwrap(), &[1.0]);
    }

    #[test]
    fn test_non_boolean_flag_is_fatal() {
        let histories = vec![StateHistory::new(1, 1, &[0.0]).unwrap()];
        let mut params = params().with_float("event_occurred", vec![0.3]);

        assert!(matches!(
            run(&mut params, &histories),
            Err(IterationError::Params(ParamsError::NotBoolean { .. }))
        ));
    }
}
