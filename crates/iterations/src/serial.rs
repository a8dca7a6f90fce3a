//! Serial composition of iterations within one step.

use stochnet_core::{Iteration, IterationError, Settings};
use stochnet_types::{ConfigError, Params, PartitionIndex, StateHistory, TimestepsHistory};

/// Runs several iterations in sequence on the same partition.
///
/// Each iteration after the first sees the previous one's output as this
/// partition's latest row. The chaining happens on a private copy of the
/// snapshot; the coordinator's histories are never touched. The output of
/// the last iteration is the step's result.
pub struct SerialIterations {
    iterations: Vec<Box<dyn Iteration>>,
}

impl SerialIterations {
    /// Chain `iterations`, applied in order.
    pub fn new(iterations: Vec<Box<dyn Iteration>>) -> Self {
        Self { iterations }
    }
}

impl Iteration for SerialIterations {
    fn configure(
        &mut self,
        partition: PartitionIndex,
        settings: &Settings,
    ) -> Result<(), ConfigError> {
        if self.iterations.is_empty() {
            return Err(ConfigError::Invalid {
                partition,
                message: "serial composition needs at least one iteration".to_string(),
            });
        }
        for iteration in &mut self.iterations {
            iteration.configure(partition, settings)?;
        }
        Ok(())
    }

    fn iterate(
        &mut self,
        params: &mut Params,
        partition: PartitionIndex,
        histories: &[StateHistory],
        timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        let Some((last, chained)) = self.iterations.split_last_mut() else {
            return Err(IterationError::InvariantViolation(
                "serial composition has no iterations".to_string(),
            ));
        };
        if chained.is_empty() {
            return last.iterate(params, partition, histories, timesteps);
        }

        let mut scratch = histories.to_vec();
        let width = scratch[partition].width();
        for iteration in chained {
            let row = iteration.iterate(params, partition, &scratch, timesteps)?;
            if row.len() != width {
                return Err(IterationError::InvariantViolation(format!(
                    "serial iteration returned {} values for a state of width {width}",
                    row.len()
                )));
            }
            scratch[partition].overwrite_latest(&row);
        }
        last.iterate(params, partition, &scratch, timesteps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CumulativeIteration, ParamValuesIteration};
    use stochnet_core::PartitionSettings;

    #[test]
    fn test_chained_outputs_feed_forward() {
        // param_values sets the row to 3, then the accumulator adds 3 to it
        let mut serial = SerialIterations::new(vec![
            Box::new(ParamValuesIteration),
            Box::new(CumulativeIteration::new(Box::new(ParamValuesIteration))),
        ]);
        let mut params = Params::new().with_float("param_values", vec![3.0]);
        let histories = vec![StateHistory::new(1, 2, &[100.0]).unwrap()];
        let timesteps = TimestepsHistory::new(0.0, 1).unwrap();

        let row = serial
            .iterate(&mut params, 0, &histories, &timesteps)
            .unwrap();

        assert_eq!(row, vec![6.0]);
        // The snapshot itself is untouched
        assert_eq!(histories[0].latest_row(), &[100.0]);
    }

    #[test]
    fn test_empty_composition_is_config_error() {
        let settings = Settings::new(vec![PartitionSettings::new("s", vec![0.0])]);
        let mut serial = SerialIterations::new(Vec::new());

        assert!(matches!(
            serial.configure(0, &settings),
            Err(ConfigError::Invalid { partition: 0, .. })
        ));
    }
}
