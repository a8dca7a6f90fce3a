//! Replay of recorded state data.

use stochnet_core::{Iteration, IterationError};
use stochnet_types::{Params, PartitionIndex, StateHistory, TimestepsHistory};

/// Replays a recorded history, oldest row first.
///
/// Step `n` returns row `depth - n - 1` of the data, so the last recorded row
/// comes out at step `depth - 1`. One step beyond the data the
/// `latest_data_values` parameter is used when present. After that the
/// replay is exhausted and the step fails.
#[derive(Debug, Clone)]
pub struct FromHistoryIteration {
    data: StateHistory,
}

impl FromHistoryIteration {
    /// Replay `data` (row 0 = most recent).
    pub fn new(data: StateHistory) -> Self {
        Self { data }
    }

    /// Recorded data being replayed.
    pub fn data(&self) -> &StateHistory {
        &self.data
    }
}

impl Iteration for FromHistoryIteration {
    fn iterate(
        &mut self,
        params: &mut Params,
        _partition: PartitionIndex,
        _histories: &[StateHistory],
        timesteps: &TimestepsHistory,
    ) -> Result<Vec<f64>, IterationError> {
        let step = timesteps.pending_step();
        let depth = self.data.depth() as u64;
        if step < depth {
            return Ok(self.data.copy_row((depth - step - 1) as usize));
        }
        match params.get_ok("latest_data_values") {
            Some(values) if step == depth => Ok(values.to_vec()),
            _ => Err(IterationError::Exhausted {
                step,
                available: self.data.depth(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> StateHistory {
        StateHistory::from_rows(&[vec![3.0], vec![2.0], vec![1.0]]).unwrap()
    }

    fn run(
        iteration: &mut FromHistoryIteration,
        params: &mut Params,
        steps: usize,
    ) -> Vec<Result<Vec<f64>, IterationError>> {
        let histories = vec![StateHistory::new(1, 1, &[0.0]).unwrap()];
        let mut timesteps = TimestepsHistory::new(0.0, 1).unwrap();
        (0..steps)
            .map(|_| {
                let result = iteration.iterate(params, 0, &histories, &timesteps);
                timesteps.advance();
                result
            })
            .collect()
    }

    #[test]
    fn test_replays_oldest_first_then_fallback() {
        let mut iteration = FromHistoryIteration::new(data());
        let mut params = Params::new().with_float("latest_data_values", vec![9.0]);

        let results = run(&mut iteration, &mut params, 4);

        // Step 1 replays row depth-2; row depth-1 is the initial state
        assert_eq!(results[0].as_deref().unwrap(), &[2.0]);
        assert_eq!(results[1].as_deref().unwrap(), &[3.0]);
        assert_eq!(results[2].as_deref().unwrap(), &[9.0]);
        assert!(matches!(
            results[3],
            Err(IterationError::Exhausted {
                step: 4,
                available: 3
            })
        ));
    }

    #[test]
    fn test_exhausted_without_fallback() {
        let mut iteration = FromHistoryIteration::new(data());
        let mut params = Params::new();

        let results = run(&mut iteration, &mut params, 3);

        assert!(results[1].is_ok());
        assert!(matches!(
            results[2],
            Err(IterationError::Exhausted { step: 3, .. })
        ));
    }
}
