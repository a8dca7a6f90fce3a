//! End-to-end coordinator behaviour.

use stochnet_coordinator::{CoordinatorState, ExecutionMode, PartitionCoordinator, RunError};
use stochnet_core::{
    ConfigError, Implementations, IterationError, ParamRoute, PartitionSettings, Settings,
};
use stochnet_test_helpers::{
    closing_output, constant_timestep, doubling, every_step, failing_at, hold, implementations,
    param_echo, random_walk, random_walk_settings, routed_pair_settings, step_limit, wrong_width,
    OutputRecord,
};

fn run(
    settings: &Settings,
    implementations: Implementations,
    mode: ExecutionMode,
) -> PartitionCoordinator {
    let mut coordinator = PartitionCoordinator::configured(settings, implementations)
        .unwrap()
        .with_execution_mode(mode);
    coordinator.run().unwrap();
    coordinator
}

fn walk_trajectory(mode: ExecutionMode, seed: u64) -> Vec<OutputRecord> {
    let settings = random_walk_settings(6, 3, seed);
    let (implementations, log) = implementations((0..6).map(|_| random_walk()).collect(), 25);
    run(&settings, implementations, mode);
    log.records()
}

#[test]
fn test_routed_constant_is_seen_every_step() {
    let settings = routed_pair_settings();
    let (implementations, log) = implementations(vec![hold(), param_echo("x")], 3);

    let coordinator = run(&settings, implementations, ExecutionMode::Parallel);

    assert_eq!(coordinator.step_count(), 3);
    assert_eq!(coordinator.histories()[1].latest_row(), &[5.0]);
    // Step 0 is the initial state; every committed step sees the routed value
    assert_eq!(
        log.partition_rows(1),
        vec![vec![0.0], vec![5.0], vec![5.0], vec![5.0]]
    );
}

#[test]
fn test_output_count_bounded_by_termination() {
    let settings = Settings::new(vec![PartitionSettings::new("a", vec![1.0])]);
    let (implementations, log) = implementations(vec![hold()], 10);

    let coordinator = run(&settings, implementations, ExecutionMode::Parallel);

    assert_eq!(coordinator.state(), CoordinatorState::Terminated);
    assert_eq!(log.steps(), (0..=10).collect::<Vec<_>>());
}

#[test]
fn test_route_to_unknown_partition_fails_before_any_step() {
    let mut settings = Settings::new(vec![
        PartitionSettings::new("a", vec![0.0]),
        PartitionSettings::new("b", vec![0.0]),
        PartitionSettings::new("c", vec![0.0]),
    ]);
    settings.partitions[1].routes.push(ParamRoute::new("x", 99));
    let (implementations, log) = implementations(vec![hold(), hold(), hold()], 5);

    let err = PartitionCoordinator::configured(&settings, implementations).unwrap_err();

    assert!(matches!(
        err,
        RunError::Config(ConfigError::UnknownRouteSource {
            partition: 1,
            upstream: 99,
            partitions: 3,
            ..
        })
    ));
    assert!(log.is_empty());
}

#[test]
fn test_deepest_row_is_initial_value_during_warmup() {
    let settings = Settings::new(vec![
        PartitionSettings::new("grow", vec![1.0]).with_history_depth(4),
        PartitionSettings::new("lagged", vec![0.0])
            .with_route(ParamRoute::new("x", 0).at_depth(3)),
    ]);
    let (implementations, log) = implementations(vec![doubling(), param_echo("x")], 5);

    let coordinator = run(&settings, implementations, ExecutionMode::Parallel);

    // Row 3 of "grow" holds the seed until three steps have been committed
    assert_eq!(
        log.partition_rows(1),
        vec![vec![0.0], vec![1.0], vec![1.0], vec![1.0], vec![1.0], vec![2.0]]
    );
    let grow = &coordinator.histories()[0];
    assert_eq!(grow.latest_row(), &[32.0]);
    assert_eq!(grow.meaningful_rows(), 4);
}

#[test]
fn test_snapshot_isolation_between_readers() {
    // Both readers route the doubling partition; neither may see this step's value
    let settings = Settings::new(vec![
        PartitionSettings::new("reader_a", vec![0.0]).with_route(ParamRoute::new("x", 1)),
        PartitionSettings::new("doubler", vec![1.0]),
        PartitionSettings::new("reader_b", vec![0.0]).with_route(ParamRoute::new("x", 1)),
    ]);
    let (implementations, log) =
        implementations(vec![param_echo("x"), doubling(), param_echo("x")], 6);

    run(&settings, implementations, ExecutionMode::Parallel);

    for record in log.records().iter().skip(1) {
        assert_eq!(record.rows[0], record.rows[2]);
        assert_eq!(record.rows[0][0] * 2.0, record.rows[1][0]);
    }
}

#[test]
fn test_parallel_and_sequential_are_bit_identical() {
    let parallel = walk_trajectory(ExecutionMode::Parallel, 7);
    let sequential = walk_trajectory(ExecutionMode::Sequential, 7);

    assert_eq!(parallel.len(), 26);
    assert_eq!(parallel, sequential);
}

#[test]
fn test_same_seed_same_trajectory() {
    let first = walk_trajectory(ExecutionMode::Parallel, 11);
    let second = walk_trajectory(ExecutionMode::Parallel, 11);
    let other = walk_trajectory(ExecutionMode::Parallel, 12);

    assert_eq!(first, second);
    assert_ne!(first, other);
}

#[test]
fn test_failed_step_commits_nothing() {
    let settings = Settings::new(vec![
        PartitionSettings::new("grow", vec![1.0]),
        PartitionSettings::new("fails", vec![0.0]),
    ]);
    let (implementations, log) = implementations(vec![doubling(), failing_at(3)], 10);
    let mut coordinator = PartitionCoordinator::configured(&settings, implementations).unwrap();

    let err = coordinator.run().unwrap_err();

    assert!(matches!(
        err,
        RunError::Iteration {
            partition: 1,
            step: 3,
            source: IterationError::InvariantViolation(_)
        }
    ));
    assert_eq!(coordinator.state(), CoordinatorState::Terminated);
    assert_eq!(coordinator.step_count(), 2);
    assert_eq!(coordinator.histories()[0].latest_row(), &[4.0]);
    assert_eq!(coordinator.timesteps().latest(), 2.0);
    assert_eq!(log.steps(), vec![0, 1, 2]);
}

#[test]
fn test_wrong_width_is_fatal() {
    let settings = Settings::new(vec![PartitionSettings::new("a", vec![0.0, 0.0])]);
    let (implementations, _) = implementations(vec![wrong_width()], 3);
    let mut coordinator = PartitionCoordinator::configured(&settings, implementations).unwrap();

    assert!(matches!(
        coordinator.step(),
        Err(RunError::WidthMismatch {
            partition: 0,
            step: 1,
            expected: 2,
            got: 3
        })
    ));
    assert_eq!(coordinator.histories()[0].steps_committed(), 0);
}

#[test]
fn test_closed_output_sink_is_surfaced() {
    let settings = Settings::new(vec![PartitionSettings::new("a", vec![1.0])]);
    let (output, log) = closing_output(4);
    let implementations = Implementations::new(
        vec![doubling()],
        constant_timestep(0.25),
        every_step(),
        output,
        step_limit(100),
    );
    let mut coordinator = PartitionCoordinator::configured(&settings, implementations).unwrap();

    assert!(matches!(coordinator.run(), Err(RunError::Output(_))));
    assert_eq!(log.len(), 4);
    assert_eq!(coordinator.state(), CoordinatorState::Terminated);
}

#[test]
fn test_time_accumulates_and_implementations_are_returned() {
    let settings = Settings::new(vec![PartitionSettings::new("a", vec![1.0])])
        .with_init_time_value(10.0)
        .with_timesteps_history_depth(3);
    let (implementations, log) = implementations(vec![hold()], 4);

    let coordinator = run(&settings, implementations, ExecutionMode::Sequential);

    assert_eq!(coordinator.time(), 14.0);
    assert_eq!(
        coordinator.timesteps().times().collect::<Vec<_>>(),
        vec![14.0, 13.0, 12.0]
    );
    assert_eq!(
        log.records().iter().map(|r| r.time).collect::<Vec<_>>(),
        vec![10.0, 11.0, 12.0, 13.0, 14.0]
    );
    let implementations = coordinator.into_implementations();
    assert_eq!(implementations.iterations.len(), 1);
}
