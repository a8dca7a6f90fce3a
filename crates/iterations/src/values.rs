//! Iterations that produce values directly.

use crate::as_index;
use stochnet_core::{Iteration, IterationError};
use stochnet_types::{Params, PartitionIndex, StateHistory, TimestepsHistory};

/// Keeps its state unchanged: the initial values forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantValuesIteration;

impl Iteration for ConstantValuesIteration {
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

/// Returns the `param_values` parameter, static or routed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParamValuesIteration;

impl Iteration for ParamValuesIteration {
    fn iterate(
        &mut self,
        params: &mut Params,
        _partition: PartitionIndex,
        _histories: &[StateHistory],
        _timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        Ok(params.get("param_values")?.to_vec())
    }
}

/// Gathers single values from the latest rows of other partitions.
///
/// Element `i` of the output is column `partition_state_values[i]` of the
/// latest row of partition `partitions[i]`. Both parameters hold indices and
/// must have the same length.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyValuesIteration;

impl Iteration for CopyValuesIteration {
    fn iterate(
        &mut self,
        params: &mut Params,
        _partition: PartitionIndex,
        histories: &[StateHistory],
        _timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        let partitions = params.get("partitions")?;
        let columns = params.get("partition_state_values")?;
        if partitions.len() != columns.len() {
            return Err(IterationError::InvariantViolation(format!(
                "'partitions' has {} entries but 'partition_state_values' has {}",
                partitions.len(),
                columns.len()
            )));
        }
        partitions
            .iter()
            .zip(columns)
            .map(|(&partition, &column)| {
                let partition = as_index(partition, "partition index")?;
                let column = as_index(column, "state value index")?;
                histories
                    .get(partition)
                    .and_then(|h| h.latest_row().get(column))
                    .copied()
                    .ok_or_else(|| {
                        IterationError::InvariantViolation(format!(
                            "no state value {column} in partition {partition}"
                        ))
                    })
            })
            .collect()
    }
}
