//! Error types for configuration and parameter access.

use crate::PartitionIndex;
use thiserror::Error;

/// Errors constructing a rolling history.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    /// State width must be at least one.
    #[error("state width must be at least 1")]
    ZeroWidth,

    /// History depth must be at least one.
    #[error("history depth must be at least 1")]
    ZeroDepth,

    /// Initial values are neither one row nor a full history.
    #[error("initial values have length {got}, expected {width} (one row) or {full} (full history)")]
    InitialLength {
        /// Configured state width.
        width: usize,
        /// `width * depth`.
        full: usize,
        /// Length actually supplied.
        got: usize,
    },

    /// A row of recorded data has the wrong width.
    #[error("row {row} has width {got}, expected {expected}")]
    RaggedRows {
        /// Offending row index.
        row: usize,
        /// Width of row 0.
        expected: usize,
        /// Width of the offending row.
        got: usize,
    },

    /// Recorded cumulative times decrease towards the most recent entry.
    #[error("cumulative times must be non-decreasing: index {index} is {newer} but index {older_index} is {older}")]
    NonMonotonicTimes {
        /// Newer index.
        index: usize,
        /// Value at the newer index.
        newer: f64,
        /// Older index.
        older_index: usize,
        /// Value at the older index.
        older: f64,
    },

    /// A recorded series does not line up with the recorded times.
    #[error("series {name:?} has {rows} rows but {times} times were recorded")]
    MisalignedSeries {
        /// Series name.
        name: String,
        /// Rows recorded for the series.
        rows: usize,
        /// Entries on the time axis.
        times: usize,
    },
}

/// Fatal configuration errors, detected once before any step executes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A partition's history could not be built.
    #[error("partition {partition}: {source}")]
    History {
        /// Offending partition.
        partition: PartitionIndex,
        /// Underlying history error.
        source: HistoryError,
    },

    /// The timesteps history needs at least one slot.
    #[error("timesteps history depth must be at least 1")]
    ZeroTimestepsDepth,

    /// The run has no partitions.
    #[error("a run needs at least one partition")]
    NoPartitions,

    /// The number of iterations does not match the number of partitions.
    #[error("{iterations} iterations supplied for {partitions} partitions")]
    IterationCountMismatch {
        /// Iterations supplied.
        iterations: usize,
        /// Partitions configured.
        partitions: usize,
    },

    /// Two partitions share a name.
    #[error("duplicate partition name: {0}")]
    DuplicatePartitionName(String),

    /// A reference by name does not match any partition.
    #[error("partition {partition}: no partition named {name:?}")]
    UnknownPartitionName {
        /// Partition holding the reference.
        partition: PartitionIndex,
        /// Name that failed to resolve.
        name: String,
    },

    /// A route references a partition index that is not configured.
    #[error("partition {partition}, param {param:?}: upstream partition {upstream} not configured ({partitions} partitions)")]
    UnknownRouteSource {
        /// Partition owning the route.
        partition: PartitionIndex,
        /// Target parameter name of the route.
        param: String,
        /// Referenced partition index.
        upstream: PartitionIndex,
        /// Number of configured partitions.
        partitions: usize,
    },

    /// A route selects a column beyond the upstream state width.
    #[error("partition {partition}, param {param:?}: column {column} out of range for upstream {upstream} of width {width}")]
    RouteColumnOutOfRange {
        /// Partition owning the route.
        partition: PartitionIndex,
        /// Target parameter name of the route.
        param: String,
        /// Upstream partition.
        upstream: PartitionIndex,
        /// Requested column.
        column: usize,
        /// Upstream state width.
        width: usize,
    },

    /// A route selects a history row beyond the upstream depth.
    #[error("partition {partition}, param {param:?}: row {row} out of range for upstream {upstream} of depth {depth}")]
    RouteRowOutOfRange {
        /// Partition owning the route.
        partition: PartitionIndex,
        /// Target parameter name of the route.
        param: String,
        /// Upstream partition.
        upstream: PartitionIndex,
        /// Requested depth offset.
        row: usize,
        /// Upstream history depth.
        depth: usize,
    },

    /// A partition's configured width does not match what its iteration produces.
    #[error("partition {partition}: state width {configured} but iteration produces {expected}")]
    WidthMismatch {
        /// Offending partition.
        partition: PartitionIndex,
        /// Width from the settings.
        configured: usize,
        /// Width implied by the iteration.
        expected: usize,
    },

    /// A parameter required at configuration time is missing or malformed.
    #[error("partition {partition}: {source}")]
    Params {
        /// Offending partition.
        partition: PartitionIndex,
        /// Underlying parameter error.
        source: ParamsError,
    },

    /// Any other invalid configuration detected by an iteration.
    #[error("partition {partition}: {message}")]
    Invalid {
        /// Offending partition.
        partition: PartitionIndex,
        /// Description of the problem.
        message: String,
    },
}

/// Errors reading or writing a parameter table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    /// No parameter with this name.
    #[error("partition {partition:?} does not have params set for {name:?}")]
    Missing {
        /// Owning partition name.
        partition: String,
        /// Requested parameter.
        name: String,
    },

    /// Index beyond the parameter vector length.
    #[error("partition {partition:?}, param {name:?}: index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Owning partition name.
        partition: String,
        /// Parameter name.
        name: String,
        /// Requested index.
        index: usize,
        /// Vector length.
        len: usize,
    },

    /// A boolean flag parameter held something other than 0 or 1.
    #[error("partition {partition:?}, param {name:?}: boolean flag must be 0 or 1, got {value}")]
    NotBoolean {
        /// Owning partition name.
        partition: String,
        /// Parameter name.
        name: String,
        /// Value found.
        value: f64,
    },
}
