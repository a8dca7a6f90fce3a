//! In-memory run configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use stochnet_types::{ConfigError, Params, PartitionIndex, StateHistory, TimestepsHistory};

/// Which partition a route copies values from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    /// By partition index.
    Index(PartitionIndex),
    /// By partition name, resolved once at configuration time.
    Name(String),
}

impl From<PartitionIndex> for RouteSource {
    fn from(index: PartitionIndex) -> Self {
        RouteSource::Index(index)
    }
}

impl From<&str> for RouteSource {
    fn from(name: &str) -> Self {
        RouteSource::Name(name.to_string())
    }
}

impl From<String> for RouteSource {
    fn from(name: String) -> Self {
        RouteSource::Name(name)
    }
}

/// Which parameter slot a route writes into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTarget {
    /// A fixed parameter name.
    Named(String),
    /// `"<source partition name>/<suffix>"`.
    UpstreamNamed(String),
    /// `"<source partition index>/<suffix>"`.
    Indexed(String),
}

/// Which history row a route reads.
///
/// Both options are explicit: a route never infers its row from context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOffset {
    /// Row 0, the most recent pre-step value.
    #[default]
    Latest,
    /// An explicit depth index into the upstream history.
    Depth(usize),
}

impl RowOffset {
    /// The depth index this offset reads.
    pub fn depth_index(self) -> usize {
        match self {
            RowOffset::Latest => 0,
            RowOffset::Depth(depth) => depth,
        }
    }
}

/// A rule copying values from another partition's history into a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRoute {
    /// Partition whose history is read.
    pub source: RouteSource,

    /// Parameter slot written.
    pub target: RouteTarget,

    /// History row read.
    #[serde(default)]
    pub row: RowOffset,

    /// Columns copied, in this order. `None` copies the whole row.
    #[serde(default)]
    pub columns: Option<Vec<usize>>,
}

impl ParamRoute {
    /// Copy the latest row of partition `upstream` into `param`.
    pub fn new(param: impl Into<String>, upstream: PartitionIndex) -> Self {
        Self {
            source: RouteSource::Index(upstream),
            target: RouteTarget::Named(param.into()),
            row: RowOffset::Latest,
            columns: None,
        }
    }

    /// Copy the latest row of the partition called `upstream` into `param`.
    pub fn from_partition(param: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            source: RouteSource::Name(upstream.into()),
            target: RouteTarget::Named(param.into()),
            row: RowOffset::Latest,
            columns: None,
        }
    }

    /// Write into `"<source name>/<suffix>"`.
    pub fn upstream_named(suffix: impl Into<String>, source: impl Into<RouteSource>) -> Self {
        Self {
            source: source.into(),
            target: RouteTarget::UpstreamNamed(suffix.into()),
            row: RowOffset::Latest,
            columns: None,
        }
    }

    /// Write into `"<source index>/<suffix>"`.
    pub fn indexed(suffix: impl Into<String>, source: impl Into<RouteSource>) -> Self {
        Self {
            source: source.into(),
            target: RouteTarget::Indexed(suffix.into()),
            row: RowOffset::Latest,
            columns: None,
        }
    }

    /// Read an explicit history depth instead of the latest row.
    pub fn at_depth(mut self, depth: usize) -> Self {
        self.row = RowOffset::Depth(depth);
        self
    }

    /// Copy only the given columns, in the given order.
    pub fn with_columns(mut self, columns: Vec<usize>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// The parameter name this route writes for a resolved upstream.
    pub fn target_name(&self, upstream: PartitionIndex, upstream_name: &str) -> String {
        match &self.target {
            RouteTarget::Named(name) => name.clone(),
            RouteTarget::UpstreamNamed(suffix) => format!("{upstream_name}/{suffix}"),
            RouteTarget::Indexed(suffix) => format!("{upstream}/{suffix}"),
        }
    }

    /// Short label for error messages.
    pub fn label(&self) -> String {
        match &self.target {
            RouteTarget::Named(name) => name.clone(),
            RouteTarget::UpstreamNamed(suffix) | RouteTarget::Indexed(suffix) => {
                format!("*/{suffix}")
            }
        }
    }
}

/// Configuration of one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSettings {
    /// Unique name. Empty means "refer to me by index".
    #[serde(default)]
    pub name: String,

    /// Either one row of `state_width` values or a full seeded history of
    /// `state_width * state_history_depth` values, most recent row first.
    pub init_state_values: Vec<f64>,

    /// State vector dimension.
    pub state_width: usize,

    /// Number of rows retained.
    pub state_history_depth: usize,

    /// Seed for the partition's private random source.
    #[serde(default)]
    pub seed: u64,

    /// Static parameters.
    #[serde(default)]
    pub params: Params,

    /// Routed parameters, applied in declared order after the statics.
    #[serde(default)]
    pub routes: Vec<ParamRoute>,

    /// Parameters holding lists of partition indices, given by name.
    #[serde(default)]
    pub params_as_partitions: IndexMap<String, Vec<String>>,
}

impl PartitionSettings {
    /// A partition with depth 1 whose width is the length of `init_state_values`.
    pub fn new(name: impl Into<String>, init_state_values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            state_width: init_state_values.len(),
            init_state_values,
            state_history_depth: 1,
            seed: 0,
            params: Params::default(),
            routes: Vec::new(),
            params_as_partitions: IndexMap::new(),
        }
    }

    /// Set the state width, for seeding from a full history.
    pub fn with_state_width(mut self, width: usize) -> Self {
        self.state_width = width;
        self
    }

    /// Set the history depth.
    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.state_history_depth = depth;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the static parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Add a static float parameter.
    pub fn with_param(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.params.set(name, values);
        self
    }

    /// Append a route.
    pub fn with_route(mut self, route: ParamRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Declare a parameter listing other partitions by name.
    pub fn with_params_as_partitions(
        mut self,
        param: impl Into<String>,
        partitions: Vec<String>,
    ) -> Self {
        self.params_as_partitions.insert(param.into(), partitions);
        self
    }

    /// Build the initial history for this partition.
    pub fn initial_history(&self, partition: PartitionIndex) -> Result<StateHistory, ConfigError> {
        StateHistory::new(
            self.state_width,
            self.state_history_depth,
            &self.init_state_values,
        )
        .map_err(|source| ConfigError::History { partition, source })
    }
}

/// Configuration of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Partitions, indexed by position.
    pub partitions: Vec<PartitionSettings>,

    /// Cumulative time before the first step.
    #[serde(default)]
    pub init_time_value: f64,

    /// Number of cumulative time values retained.
    pub timesteps_history_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            partitions: Vec::new(),
            init_time_value: 0.0,
            timesteps_history_depth: 1,
        }
    }
}

impl Settings {
    /// Settings for the given partitions.
    ///
    /// The timesteps depth defaults to the deepest partition history.
    pub fn new(partitions: Vec<PartitionSettings>) -> Self {
        let timesteps_history_depth = partitions
            .iter()
            .map(|p| p.state_history_depth)
            .max()
            .unwrap_or(1)
            .max(1);
        Self {
            partitions,
            init_time_value: 0.0,
            timesteps_history_depth,
        }
    }

    /// Append a partition, deepening the timesteps history if needed.
    pub fn with_partition(mut self, partition: PartitionSettings) -> Self {
        self.timesteps_history_depth = self
            .timesteps_history_depth
            .max(partition.state_history_depth);
        self.partitions.push(partition);
        self
    }

    /// Set the initial cumulative time.
    pub fn with_init_time_value(mut self, time: f64) -> Self {
        self.init_time_value = time;
        self
    }

    /// Set the timesteps history depth.
    pub fn with_timesteps_history_depth(mut self, depth: usize) -> Self {
        self.timesteps_history_depth = depth;
        self
    }

    /// Number of partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Whether no partitions are configured.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Index of the partition with this name.
    pub fn partition_index(&self, name: &str) -> Option<PartitionIndex> {
        self.partitions.iter().position(|p| p.name == name)
    }

    /// Display name of a partition: its name, or its index if unnamed.
    pub fn partition_name(&self, partition: PartitionIndex) -> String {
        match self.partitions.get(partition) {
            Some(p) if !p.name.is_empty() => p.name.clone(),
            _ => partition.to_string(),
        }
    }

    /// Display names of every partition, indexed by partition.
    pub fn partition_names(&self) -> Vec<String> {
        (0..self.partitions.len())
            .map(|i| self.partition_name(i))
            .collect()
    }

    /// Resolve a route source to a partition index.
    pub fn resolve_source(
        &self,
        partition: PartitionIndex,
        route: &ParamRoute,
    ) -> Result<PartitionIndex, ConfigError> {
        match &route.source {
            RouteSource::Index(index) if *index < self.partitions.len() => Ok(*index),
            RouteSource::Index(index) => Err(ConfigError::UnknownRouteSource {
                partition,
                param: route.label(),
                upstream: *index,
                partitions: self.partitions.len(),
            }),
            RouteSource::Name(name) => {
                self.partition_index(name)
                    .ok_or_else(|| ConfigError::UnknownPartitionName {
                        partition,
                        name: name.clone(),
                    })
            }
        }
    }

    /// Check the shapes and names of every partition.
    ///
    /// Route validation needs the upstream shapes as well and is done when
    /// the parameter resolver is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions.is_empty() {
            return Err(ConfigError::NoPartitions);
        }
        if self.timesteps_history_depth == 0 {
            return Err(ConfigError::ZeroTimestepsDepth);
        }
        let mut seen = HashSet::new();
        for (index, partition) in self.partitions.iter().enumerate() {
            partition.initial_history(index)?;
            if !partition.name.is_empty() && !seen.insert(partition.name.as_str()) {
                return Err(ConfigError::DuplicatePartitionName(partition.name.clone()));
            }
        }
        Ok(())
    }

    /// Build every partition's initial history, indexed by partition.
    pub fn initial_histories(&self) -> Result<Vec<StateHistory>, ConfigError> {
        self.partitions
            .iter()
            .enumerate()
            .map(|(index, p)| p.initial_history(index))
            .collect()
    }

    /// Build the initial timesteps history.
    pub fn initial_timesteps(&self) -> Result<TimestepsHistory, ConfigError> {
        TimestepsHistory::new(self.init_time_value, self.timesteps_history_depth)
            .map_err(|_| ConfigError::ZeroTimestepsDepth)
    }

    /// Resolve name-based references into parameter values.
    ///
    /// Tags every partition's parameter table with its display name and
    /// writes each `params_as_partitions` entry as a float parameter holding
    /// the referenced partition indices.
    pub fn resolve_names(&mut self) -> Result<(), ConfigError> {
        let names = self.partition_names();
        let mut resolved = Vec::with_capacity(self.partitions.len());
        for (index, partition) in self.partitions.iter().enumerate() {
            let mut entries = Vec::with_capacity(partition.params_as_partitions.len());
            for (param, referenced) in &partition.params_as_partitions {
                let indices = referenced
                    .iter()
                    .map(|name| {
                        self.partition_index(name)
                            .map(|i| i as f64)
                            .ok_or_else(|| ConfigError::UnknownPartitionName {
                                partition: index,
                                name: name.clone(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                entries.push((param.clone(), indices));
            }
            resolved.push(entries);
        }
        for ((partition, entries), name) in self.partitions.iter_mut().zip(resolved).zip(names) {
            partition.params.set_partition_name(name);
            for (param, indices) in entries {
                partition.params.set(param, indices);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_partitions() -> Settings {
        Settings::new(vec![
            PartitionSettings::new("source", vec![1.0, 2.0]).with_history_depth(3),
            PartitionSettings::new("sink", vec![0.0])
                .with_params_as_partitions("watched", vec!["source".to_string()]),
        ])
    }

    #[test]
    fn test_new_takes_deepest_history() {
        let settings = two_partitions();
        assert_eq!(settings.timesteps_history_depth, 3);
        assert_eq!(settings.partitions[0].state_width, 2);
    }

    #[test]
    fn test_partition_names_fall_back_to_index() {
        let settings = Settings::default()
            .with_partition(PartitionSettings::new("", vec![0.0]))
            .with_partition(PartitionSettings::new("b", vec![0.0]));

        assert_eq!(settings.partition_names(), vec!["0", "b"]);
        assert_eq!(settings.partition_index("b"), Some(1));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let settings = Settings::new(vec![
            PartitionSettings::new("a", vec![0.0]),
            PartitionSettings::new("a", vec![1.0]),
        ]);
        assert_eq!(
            settings.validate().unwrap_err(),
            ConfigError::DuplicatePartitionName("a".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_bad_initial_values() {
        let settings =
            Settings::new(vec![PartitionSettings::new("a", vec![0.0, 1.0]).with_state_width(3)]);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::History { partition: 0, .. })
        ));
        assert_eq!(
            Settings::default().validate().unwrap_err(),
            ConfigError::NoPartitions
        );
    }

    #[test]
    fn test_resolve_names_writes_partition_indices() {
        let mut settings = two_partitions();
        settings.resolve_names().unwrap();

        let params = &settings.partitions[1].params;
        assert_eq!(params.get("watched").unwrap(), &[0.0]);
        assert_eq!(params.partition_name(), "sink");
    }

    #[test]
    fn test_resolve_names_rejects_unknown() {
        let mut settings = Settings::new(vec![PartitionSettings::new("a", vec![0.0])
            .with_params_as_partitions("p", vec!["missing".to_string()])]);
        assert_eq!(
            settings.resolve_names().unwrap_err(),
            ConfigError::UnknownPartitionName {
                partition: 0,
                name: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_route_target_names() {
        let route = ParamRoute::upstream_named("rate", "source");
        assert_eq!(route.target_name(0, "source"), "source/rate");

        let route = ParamRoute::indexed("rate", 4usize);
        assert_eq!(route.target_name(4, "four"), "4/rate");
    }

    #[test]
    fn test_settings_deserialize() {
        let json = r#"{
            "partitions": [
                {
                    "name": "walk",
                    "init_state_values": [0.0],
                    "state_width": 1,
                    "state_history_depth": 2,
                    "seed": 7,
                    "params": {"float_params": {"step": [0.5]}},
                    "routes": [
                        {"source": {"index": 0}, "target": {"named": "self"}, "row": {"depth": 1}}
                    ]
                }
            ],
            "timesteps_history_depth": 2
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        let partition = &settings.partitions[0];
        assert_eq!(partition.seed, 7);
        assert_eq!(partition.params.get("step").unwrap(), &[0.5]);
        assert_eq!(partition.routes[0].row, RowOffset::Depth(1));
        assert_eq!(partition.routes[0].columns, None);
        assert!(settings.validate().is_ok());
    }
}
