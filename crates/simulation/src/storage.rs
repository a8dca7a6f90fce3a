//! In-memory result storage.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stochnet_types::{HistoryError, StateHistory, TimestepsHistory};

/// Storage shared between an output function and its reader.
pub type SharedStorage = Arc<Mutex<StateTimeStorage>>;

/// Every emitted state, grouped by partition name, plus the time axis.
///
/// Names keep first-seen order. The time axis holds one entry per joint
/// output: a time is recorded when a series grows past the time axis, so the
/// partitions of a single joint state share one entry. Two outputs at the
/// same time (a zero increment) get two entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateTimeStorage {
    values: IndexMap<String, Vec<Vec<f64>>>,
    times: Vec<f64>,
}

impl StateTimeStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty storage behind a shared lock.
    pub fn shared() -> SharedStorage {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Record one partition's state at a time.
    pub fn append(&mut self, name: &str, time: f64, values: &[f64]) {
        let rows = match self.values.get_mut(name) {
            Some(series) => {
                series.push(values.to_vec());
                series.len()
            }
            None => {
                self.values.insert(name.to_string(), vec![values.to_vec()]);
                1
            }
        };
        if rows > self.times.len() {
            self.times.push(time);
        }
    }

    /// Partition names in first-seen order.
    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Recorded states of one partition, oldest first.
    pub fn values(&self, name: &str) -> Option<&[Vec<f64>]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Recorded times, oldest first.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert the recording into replayable histories.
    ///
    /// Each partition becomes a [`StateHistory`] holding every recorded row,
    /// most recent first, and the times become a [`TimestepsHistory`] with
    /// no pending increment. Feed them to `FromHistoryIteration` and
    /// [`FromHistoryTimestepFunction`](crate::FromHistoryTimestepFunction).
    ///
    /// Every series must have one row per recorded time; a partition that
    /// missed some outputs is a [`HistoryError::MisalignedSeries`].
    pub fn to_histories(
        &self,
    ) -> Result<(IndexMap<String, StateHistory>, TimestepsHistory), HistoryError> {
        let mut histories = IndexMap::with_capacity(self.values.len());
        for (name, series) in &self.values {
            if series.len() != self.times.len() {
                return Err(HistoryError::MisalignedSeries {
                    name: name.clone(),
                    rows: series.len(),
                    times: self.times.len(),
                });
            }
            let rows: Vec<Vec<f64>> = series.iter().rev().cloned().collect();
            histories.insert(name.clone(), StateHistory::from_rows(&rows)?);
        }
        let times: Vec<f64> = self.times.iter().rev().copied().collect();
        let timesteps = TimestepsHistory::from_times(&times, 0.0)?;
        Ok((histories, timesteps))
    }
}
