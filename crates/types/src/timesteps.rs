//! Rolling history of cumulative simulation time.

use crate::HistoryError;

/// Rolling window of cumulative elapsed time values shared by all partitions.
///
/// Index 0 is the time of the most recently committed step. The increment
/// for the step in flight is held separately in
/// [`next_increment`](Self::next_increment) until the coordinator commits it
/// with [`advance`](Self::advance).
#[derive(Debug, Clone, PartialEq)]
pub struct TimestepsHistory {
    values: Vec<f64>,
    depth: usize,
    head: usize,
    next_increment: f64,
    current_step: u64,
}

impl TimestepsHistory {
    /// Create a history with every slot holding the initial time.
    pub fn new(init_time: f64, depth: usize) -> Result<Self, HistoryError> {
        if depth == 0 {
            return Err(HistoryError::ZeroDepth);
        }
        Ok(Self {
            values: vec![init_time; depth],
            depth,
            head: 0,
            next_increment: 0.0,
            current_step: 0,
        })
    }

    /// Build a history from recorded cumulative times, most recent first.
    ///
    /// `next_increment` is the increment that followed the most recent time,
    /// used when replaying beyond the recorded window.
    pub fn from_times(times: &[f64], next_increment: f64) -> Result<Self, HistoryError> {
        if times.is_empty() {
            return Err(HistoryError::ZeroDepth);
        }
        for (index, pair) in times.windows(2).enumerate() {
            if pair[0] < pair[1] {
                return Err(HistoryError::NonMonotonicTimes {
                    index,
                    newer: pair[0],
                    older_index: index + 1,
                    older: pair[1],
                });
            }
        }
        Ok(Self {
            values: times.to_vec(),
            depth: times.len(),
            head: 0,
            next_increment,
            current_step: 0,
        })
    }

    /// Time of the most recently committed step.
    pub fn latest(&self) -> f64 {
        self.at(0)
    }

    /// Cumulative time at a depth index (0 = most recent).
    ///
    /// # Panics
    ///
    /// Panics if `depth_index >= depth`.
    pub fn at(&self, depth_index: usize) -> f64 {
        assert!(
            depth_index < self.depth,
            "timesteps row {} requested but depth is {}",
            depth_index,
            self.depth
        );
        self.values[(self.head + depth_index) % self.depth]
    }

    /// Cumulative time at a depth index, or `None` beyond the depth.
    pub fn get(&self, depth_index: usize) -> Option<f64> {
        (depth_index < self.depth).then(|| self.at(depth_index))
    }

    /// Iterate cumulative times from most recent to oldest.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.depth).map(move |i| self.at(i))
    }

    /// Number of slots held.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Increment pending for the step in flight.
    pub fn next_increment(&self) -> f64 {
        self.next_increment
    }

    /// Set the increment for the step in flight.
    pub fn set_next_increment(&mut self, increment: f64) {
        debug_assert!(increment >= 0.0, "negative time increment {increment}");
        self.next_increment = increment;
    }

    /// Time the step in flight will commit at: `latest() + next_increment()`.
    pub fn pending_time(&self) -> f64 {
        self.latest() + self.next_increment
    }

    /// Number of steps committed so far.
    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Number of the step in flight (`current_step() + 1`).
    pub fn pending_step(&self) -> u64 {
        self.current_step + 1
    }

    /// Commit the pending increment as a new most recent time.
    pub fn advance(&mut self) {
        let next = self.pending_time();
        self.head = (self.head + self.depth - 1) % self.depth;
        self.values[self.head] = next;
        self.current_step += 1;
    }
}
