//! Accumulating wrappers.

use stochnet_core::{Iteration, IterationError, Settings};
use stochnet_types::{ConfigError, Params, PartitionIndex, StateHistory, TimestepsHistory};

fn accumulate(
    increment: Vec<f64>,
    previous: &[f64],
    factor: f64,
) -> Result<Vec<f64>, IterationError> {
    if increment.len() != previous.len() {
        return Err(IterationError::InvariantViolation(format!(
            "inner iteration returned {} values for a state of width {}",
            increment.len(),
            previous.len()
        )));
    }
    Ok(increment
        .into_iter()
        .zip(previous)
        .map(|(inc, prev)| inc + factor * prev)
        .collect())
}

/// Adds the inner iteration's output to the previous state.
pub struct CumulativeIteration {
    iteration: Box<dyn Iteration>,
}

impl CumulativeIteration {
    /// Accumulate the output of `iteration`.
    pub fn new(iteration: Box<dyn Iteration>) -> Self {
        Self { iteration }
    }
}

impl Iteration for CumulativeIteration {
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
        let increment = self
            .iteration
            .iterate(params, partition, histories, timesteps)?;
        accumulate(increment, histories[partition].latest_row(), 1.0)
    }
}

/// Adds the inner output to the previous state scaled by `discount_factor`.
pub struct DiscountedCumulativeIteration {
    iteration: Box<dyn Iteration>,
}

impl DiscountedCumulativeIteration {
    /// Discount-accumulate the output of `iteration`.
    pub fn new(iteration: Box<dyn Iteration>) -> Self {
        Self { iteration }
    }
}

impl Iteration for DiscountedCumulativeIteration {
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
        let increment = self
            .iteration
            .iterate(params, partition, histories, timesteps)?;
        let discount = params.get_index("discount_factor", 0)?;
        accumulate(increment, histories[partition].latest_row(), discount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParamValuesIteration;

    fn step(iteration: &mut dyn Iteration, params: &mut Params, history: &mut StateHistory) {
        let timesteps = TimestepsHistory::new(0.0, 1).unwrap();
        let row = iteration
            .iterate(params, 0, std::slice::from_ref(history), &timesteps)
            .unwrap();
        history.commit_next(&row);
    }

    #[test]
    fn test_cumulative_sums_increments() {
        let mut iteration = CumulativeIteration::new(Box::new(ParamValuesIteration));
        let mut params = Params::new().with_float("param_values", vec![1.0, -0.5]);
        let mut history = StateHistory::new(2, 1, &[10.0, 0.0]).unwrap();

        for _ in 0..4 {
            step(&mut iteration, &mut params, &mut history);
        }

        assert_eq!(history.latest_row(), &[14.0, -2.0]);
    }

    #[test]
    fn test_discounted_cumulative() {
        let mut iteration = DiscountedCumulativeIteration::new(Box::new(ParamValuesIteration));
        let mut params = Params::new()
            .with_float("param_values", vec![1.0])
            .with_float("discount_factor", vec![0.5]);
        let mut history = StateHistory::new(1, 1, &[0.0]).unwrap();

        step(&mut iteration, &mut params, &mut history);
        step(&mut iteration, &mut params, &mut history);
        step(&mut iteration, &mut params, &mut history);

        assert_eq!(history.latest_row(), &[1.75]);
    }

    #[test]
    fn test_width_mismatch_is_violation() {
        let mut iteration = CumulativeIteration::new(Box::new(ParamValuesIteration));
        let mut params = Params::new().with_float("param_values", vec![1.0]);
        let history = StateHistory::new(2, 1, &[0.0, 0.0]).unwrap();
        let timesteps = TimestepsHistory::new(0.0, 1).unwrap();

        assert!(matches!(
            iteration.iterate(&mut params, 0, &[history], &timesteps),
            Err(IterationError::InvariantViolation(_))
        ));
    }
}
