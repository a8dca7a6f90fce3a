//! Read-only view of the committed joint state.

use stochnet_types::{PartitionIndex, StateHistory};

/// The joint state of every partition after a committed step.
///
/// Handed to output and termination strategies. Borrowed from the
/// coordinator's run state, so it cannot outlive the call it is passed to.
#[derive(Debug, Clone, Copy)]
pub struct JointState<'a> {
    step: u64,
    time: f64,
    names: &'a [String],
    histories: &'a [StateHistory],
}

impl<'a> JointState<'a> {
    /// Create a view over committed histories.
    pub fn new(step: u64, time: f64, names: &'a [String], histories: &'a [StateHistory]) -> Self {
        debug_assert_eq!(names.len(), histories.len());
        Self {
            step,
            time,
            names,
            histories,
        }
    }

    /// Number of committed steps.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Cumulative time of the most recent commit.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    /// Whether the run has no partitions.
    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Name of a partition.
    pub fn name(&self, partition: PartitionIndex) -> &'a str {
        &self.names[partition]
    }

    /// Most recent state of a partition.
    pub fn latest(&self, partition: PartitionIndex) -> &'a [f64] {
        self.histories[partition].latest_row()
    }

    /// Full history of a partition.
    pub fn history(&self, partition: PartitionIndex) -> &'a StateHistory {
        &self.histories[partition]
    }

    /// All partition histories, indexed by partition.
    pub fn histories(&self) -> &'a [StateHistory] {
        self.histories
    }

    /// Iterate `(index, name, latest state)` for every partition.
    pub fn iter(&self) -> impl Iterator<Item = (PartitionIndex, &'a str, &'a [f64])> + 'a {
        let names = self.names;
        self.histories
            .iter()
            .enumerate()
            .map(move |(i, h)| (i, names[i].as_str(), h.latest_row()))
    }
}
