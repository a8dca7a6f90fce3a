//! Per-step parameter resolution.

use stochnet_core::{ParamRoute, Settings};
use stochnet_types::{ConfigError, Params, PartitionIndex, StateHistory};
use tracing::error;

/// A route with its upstream and target name fixed at configuration time.
#[derive(Debug, Clone)]
struct ResolvedRoute {
    upstream: PartitionIndex,
    target: String,
    depth_index: usize,
    columns: Option<Vec<usize>>,
}

/// Builds each partition's private parameter table for a step.
///
/// Routes are validated once, when the resolver is built: an unknown
/// upstream, a column beyond the upstream width or a row beyond the upstream
/// depth is a [`ConfigError`] before any step runs. After that,
/// [`resolve`](Self::resolve) cannot fail.
#[derive(Debug, Clone)]
pub struct ParameterResolver {
    statics: Vec<Params>,
    routes: Vec<Vec<ResolvedRoute>>,
}

impl ParameterResolver {
    /// Validate every route and capture the static parameter tables.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let mut settings = settings.clone();
        settings.resolve_names()?;

        let mut routes = Vec::with_capacity(settings.partitions.len());
        for (partition, config) in settings.partitions.iter().enumerate() {
            let resolved = config
                .routes
                .iter()
                .map(|route| Self::resolve_route(&settings, partition, route))
                .collect::<Result<Vec<_>, _>>()
                .inspect_err(|e| error!(partition, error = %e, "Invalid parameter route"))?;
            routes.push(resolved);
        }

        let statics = settings.partitions.into_iter().map(|p| p.params).collect();
        Ok(Self { statics, routes })
    }

    fn resolve_route(
        settings: &Settings,
        partition: PartitionIndex,
        route: &ParamRoute,
    ) -> Result<ResolvedRoute, ConfigError> {
        let upstream = settings.resolve_source(partition, route)?;
        let source = &settings.partitions[upstream];
        let depth_index = route.row.depth_index();
        if depth_index >= source.state_history_depth {
            return Err(ConfigError::RouteRowOutOfRange {
                partition,
                param: route.label(),
                upstream,
                row: depth_index,
                depth: source.state_history_depth,
            });
        }
        if let Some(columns) = &route.columns {
            if let Some(&column) = columns.iter().find(|&&c| c >= source.state_width) {
                return Err(ConfigError::RouteColumnOutOfRange {
                    partition,
                    param: route.label(),
                    upstream,
                    column,
                    width: source.state_width,
                });
            }
        }
        Ok(ResolvedRoute {
            upstream,
            target: route.target_name(upstream, &settings.partition_name(upstream)),
            depth_index,
            columns: route.columns.clone(),
        })
    }

    /// Number of partitions covered.
    pub fn len(&self) -> usize {
        self.statics.len()
    }

    /// Whether no partitions are covered.
    pub fn is_empty(&self) -> bool {
        self.statics.is_empty()
    }

    /// Static parameters of a partition, before any routes are applied.
    pub fn statics(&self, partition: PartitionIndex) -> &Params {
        &self.statics[partition]
    }

    /// Assemble the parameter table for one partition.
    ///
    /// Starts from a copy of the static parameters, then applies every route
    /// in declared order against `snapshot`; later routes overwrite earlier
    /// values under the same name. The snapshot is only read, so the result
    /// is independent of which partitions were resolved before.
    ///
    /// `snapshot` must hold the histories built from the same settings.
    pub fn resolve(&self, partition: PartitionIndex, snapshot: &[StateHistory]) -> Params {
        let mut params = self.statics[partition].clone();
        for route in &self.routes[partition] {
            let row = snapshot[route.upstream].row_at(route.depth_index);
            let values = match &route.columns {
                Some(columns) => columns.iter().map(|&c| row[c]).collect(),
                None => row.to_vec(),
            };
            params.set(route.target.clone(), values);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stochnet_core::PartitionSettings;

    fn settings() -> Settings {
        Settings::new(vec![
            PartitionSettings::new("walk", vec![1.0, 2.0, 3.0]).with_history_depth(3),
            PartitionSettings::new("", vec![10.0]),
            PartitionSettings::new("reader", vec![0.0])
                .with_param("x", vec![-1.0])
                .with_param("kept", vec![4.0]),
        ])
    }

    #[test]
    fn test_statics_are_copied() {
        let settings = settings();
        let resolver = ParameterResolver::new(&settings).unwrap();
        let histories = settings.initial_histories().unwrap();

        let mut params = resolver.resolve(2, &histories);
        params.set_index("x", 0, 99.0).unwrap();

        assert_eq!(resolver.statics(2).get("x").unwrap(), &[-1.0]);
        assert_eq!(resolver.resolve(2, &histories).get("x").unwrap(), &[-1.0]);
        assert_eq!(params.partition_name(), "reader");
    }

    #[test]
    fn test_routes_apply_in_order_last_write_wins() {
        let mut settings = settings();
        settings.partitions[2].routes = vec![
            ParamRoute::new("x", 0).with_columns(vec![2]),
            ParamRoute::new("x", 1),
        ];
        let resolver = ParameterResolver::new(&settings).unwrap();
        let histories = settings.initial_histories().unwrap();

        let params = resolver.resolve(2, &histories);
        assert_eq!(params.get("x").unwrap(), &[10.0]);
        assert_eq!(params.get("kept").unwrap(), &[4.0]);
    }

    #[test]
    fn test_depth_offset_and_column_subset() {
        let mut settings = settings();
        settings.partitions[2].routes =
            vec![ParamRoute::new("lagged", 0).at_depth(1).with_columns(vec![2, 0])];
        let resolver = ParameterResolver::new(&settings).unwrap();
        let mut histories = settings.initial_histories().unwrap();
        histories[0].commit_next(&[4.0, 5.0, 6.0]);

        let params = resolver.resolve(2, &histories);
        assert_eq!(params.get("lagged").unwrap(), &[3.0, 1.0]);
    }

    #[test]
    fn test_target_naming_styles() {
        let mut settings = settings();
        settings.partitions[2].routes = vec![
            ParamRoute::upstream_named("state", "walk"),
            ParamRoute::upstream_named("state", 1usize),
            ParamRoute::indexed("state", "walk"),
        ];
        let resolver = ParameterResolver::new(&settings).unwrap();
        let histories = settings.initial_histories().unwrap();

        let params = resolver.resolve(2, &histories);
        assert_eq!(params.get("walk/state").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(params.get("1/state").unwrap(), &[10.0]);
        assert_eq!(params.get("0/state").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_unknown_upstream_is_config_error() {
        let mut settings = settings();
        settings.partitions[2].routes = vec![ParamRoute::new("x", 99)];

        assert_eq!(
            ParameterResolver::new(&settings).unwrap_err(),
            ConfigError::UnknownRouteSource {
                partition: 2,
                param: "x".to_string(),
                upstream: 99,
                partitions: 3
            }
        );
    }

    #[test]
    fn test_out_of_range_column_and_row_are_config_errors() {
        let mut settings = settings();
        settings.partitions[2].routes = vec![ParamRoute::new("x", 1).with_columns(vec![1])];
        assert!(matches!(
            ParameterResolver::new(&settings),
            Err(ConfigError::RouteColumnOutOfRange {
                upstream: 1,
                column: 1,
                width: 1,
                ..
            })
        ));

        settings.partitions[2].routes = vec![ParamRoute::new("x", 0).at_depth(3)];
        assert!(matches!(
            ParameterResolver::new(&settings),
            Err(ConfigError::RouteRowOutOfRange {
                row: 3,
                depth: 3,
                ..
            })
        ));
    }
}
