//! Single-cluster teardown tests

#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use common::{no_sleep, FakePlatform};
use easy_aws::deploy::drain;
use easy_aws::deploy::fsm::DeletionState;
use easy_aws::deploy::teardown::{drain_deadline, RepositoryCleanup, Teardown, TeardownOptions};
use easy_aws::errors::LauncherError;
use easy_aws::models::tags::{TagSet, CREATOR_TAG, KEEP_ALIVE_TAG};
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

const CLUSTER: &str = "demo_app-feature-0f0e";

fn owned_by(username: &str) -> TagSet {
    TagSet::new().with(CREATOR_TAG, username)
}

fn launched() -> FakePlatform {
    FakePlatform::new()
        .with_cluster(CLUSTER, owned_by("alice"))
        .with_services(CLUSTER, &["web"])
        .with_task_definitions(CLUSTER, 2)
        .with_repository(CLUSTER)
}

fn short_drain(force: bool) -> TeardownOptions {
    TeardownOptions {
        force,
        drain: drain::Options {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        },
    }
}

#[tokio::test]
async fn test_stop_cluster_step_order() {
    let platform = launched();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_cluster(CLUSTER).await);

    assert!(report.cluster_found);
    assert_eq!(report.services_deleted, 1);
    assert_eq!(report.task_definitions_deleted, 2);
    assert_eq!(report.repository, RepositoryCleanup::Deleted);

    let first = common::task_definition_arn(CLUSTER, 1);
    let second = common::task_definition_arn(CLUSTER, 2);
    assert_eq!(
        platform.calls(),
        vec![
            format!("describe_cluster:{CLUSTER}"),
            format!("list_services:{CLUSTER}"),
            "delete_service:web".to_string(),
            format!("delete_cluster:{CLUSTER}"),
            format!("list_task_definitions:{CLUSTER}"),
            format!("deregister_task_definition:{first}"),
            format!("deregister_task_definition:{second}"),
            "delete_task_definitions:2".to_string(),
            format!("describe_repository:{CLUSTER}"),
            format!("delete_repository:{CLUSTER}"),
        ]
    );
    assert!(!platform.has_cluster(CLUSTER));
}

#[tokio::test]
async fn test_keep_alive_blocks_without_force() {
    let platform = FakePlatform::new()
        .with_cluster(CLUSTER, owned_by("alice").with(KEEP_ALIVE_TAG, "true"))
        .with_services(CLUSTER, &["web"]);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let err = assert_err!(teardown.stop_cluster(CLUSTER).await);

    assert!(matches!(&err, LauncherError::KeepAlive(name) if name == CLUSTER));
    assert_eq!(platform.count("delete_service"), 0);
    assert_eq!(platform.count("delete_cluster"), 0);
    assert_eq!(platform.count("deregister_task_definition"), 0);
    assert_eq!(platform.count("delete_task_definitions"), 0);
    assert_eq!(platform.count("delete_repository"), 0);
    assert!(platform.has_cluster(CLUSTER));
}

#[tokio::test]
async fn test_keep_alive_false_does_not_block() {
    let platform = FakePlatform::new()
        .with_cluster(CLUSTER, owned_by("alice").with(KEEP_ALIVE_TAG, "false"));
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    assert_ok!(teardown.stop_cluster(CLUSTER).await);
    assert!(!platform.has_cluster(CLUSTER));
}

#[tokio::test]
async fn test_keep_alive_with_force() {
    let platform = launched();
    platform
        .state
        .lock()
        .unwrap()
        .clusters
        .insert(CLUSTER.to_string(), owned_by("alice").with(KEEP_ALIVE_TAG, "true"));
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, short_drain(true), no_sleep, shutdown_rx);

    assert_ok!(teardown.stop_cluster(CLUSTER).await);
    assert_eq!(platform.count("delete_service"), 1);
    assert!(!platform.has_cluster(CLUSTER));
}

#[tokio::test]
async fn test_delete_waits_for_tasks() {
    let platform = launched()
        .refusing_deletes(1)
        .with_task_lists(vec![vec!["task-1"], vec![]]);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let fsm = assert_ok!(teardown.delete_cluster(CLUSTER).await);

    assert_eq!(fsm.state(), &DeletionState::Deleted);
    assert_eq!(fsm.delete_attempts(), 2);
    assert_eq!(fsm.polls(), 2);
    assert_eq!(platform.count("list_tasks"), 2);
    assert_eq!(platform.count("delete_cluster"), 2);
    assert!(!platform.has_cluster(CLUSTER));
}

#[tokio::test]
async fn test_huge_drain_timeout_is_clamped() {
    let platform = launched()
        .refusing_deletes(1)
        .with_task_lists(vec![vec!["task-1"], vec![]]);
    let options = TeardownOptions {
        force: false,
        drain: drain::Options {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(u64::MAX),
        },
    };
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, options, no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_cluster(CLUSTER).await);

    assert!(report.cluster_found);
    assert_eq!(platform.count("delete_cluster"), 2);
}

#[test]
fn test_drain_deadline_never_overflows() {
    let now = tokio::time::Instant::now();

    assert_eq!(
        drain_deadline(now, Duration::from_secs(30)),
        now + Duration::from_secs(30)
    );
    assert!(drain_deadline(now, Duration::MAX) > now);
}

#[tokio::test]
async fn test_task_definitions_deleted_in_batches() {
    let platform = FakePlatform::new().with_task_definitions(CLUSTER, 23);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let deleted = assert_ok!(teardown.cleanup_task_definitions(CLUSTER).await);

    assert_eq!(deleted, 23);
    assert_eq!(platform.count("deregister_task_definition"), 23);
    let batches: Vec<usize> = platform
        .state
        .lock()
        .unwrap()
        .deleted_batches
        .iter()
        .map(Vec::len)
        .collect();
    assert_eq!(batches, vec![10, 10, 3]);
}

#[tokio::test]
async fn test_task_definitions_of_other_families_untouched() {
    let platform = FakePlatform::new()
        .with_task_definitions(CLUSTER, 1)
        .with_task_definitions("other-project", 1);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    assert_eq!(assert_ok!(teardown.cleanup_task_definitions(CLUSTER).await), 1);
    assert_eq!(
        platform.state.lock().unwrap().task_definitions,
        vec![common::task_definition_arn("other-project", 1)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_drain_timeout_leaves_repository() {
    let platform = launched()
        .refusing_deletes(1)
        .with_stuck_tasks(&["task-1"]);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown =
        Teardown::new(&platform, short_drain(false), tokio::time::sleep, shutdown_rx);

    let err = assert_err!(teardown.stop_cluster(CLUSTER).await);

    assert!(matches!(
        &err,
        LauncherError::DrainTimedOut { cluster, waited }
            if cluster == CLUSTER && *waited == Duration::from_secs(5)
    ));
    assert_eq!(platform.count("delete_cluster"), 1);
    assert_eq!(platform.count("list_task_definitions"), 0);
    assert_eq!(platform.count("describe_repository"), 0);
    assert!(platform.has_cluster(CLUSTER));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_drain() {
    let platform = launched()
        .refusing_deletes(1)
        .with_stuck_tasks(&["task-1"]);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown =
        Teardown::new(&platform, TeardownOptions::default(), tokio::time::sleep, shutdown_rx);

    shutdown_tx.send(()).unwrap();
    let err = assert_err!(teardown.stop_cluster(CLUSTER).await);

    assert!(matches!(err, LauncherError::Cancelled(_)));
    assert_eq!(platform.count("delete_repository"), 0);
}

#[tokio::test]
async fn test_missing_cluster_still_cleans_up() {
    let platform = FakePlatform::new()
        .with_task_definitions(CLUSTER, 1)
        .with_repository(CLUSTER);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_cluster(CLUSTER).await);

    assert!(!report.cluster_found);
    assert_eq!(report.task_definitions_deleted, 1);
    assert_eq!(report.repository, RepositoryCleanup::Deleted);
    assert_eq!(platform.count("list_services"), 0);
    assert_eq!(platform.count("delete_cluster"), 0);
}

#[tokio::test]
async fn test_missing_repository_is_not_an_error() {
    let platform = FakePlatform::new().with_cluster(CLUSTER, owned_by("alice"));
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_cluster(CLUSTER).await);

    assert_eq!(report.repository, RepositoryCleanup::NotFound);
    assert_eq!(platform.count("delete_repository"), 0);
}

#[tokio::test]
async fn test_repository_delete_failure_is_reported() {
    let platform = launched().failing("delete_repository", "RepositoryPolicyNotFound");
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_cluster(CLUSTER).await);
    assert!(matches!(report.repository, RepositoryCleanup::Failed(_)));
}

#[tokio::test]
async fn test_deregister_failure_keeps_repository() {
    let platform = launched().failing("deregister_task_definition", "Throttling");
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let err = assert_err!(teardown.stop_cluster(CLUSTER).await);

    assert!(matches!(err, LauncherError::CloudError(_)));
    assert_eq!(platform.count("delete_task_definitions"), 0);
    assert_eq!(platform.count("describe_repository"), 0);
    assert_eq!(platform.state.lock().unwrap().repositories.len(), 1);
}

#[tokio::test]
async fn test_cluster_delete_failure_stops_teardown() {
    let platform = launched().failing("delete_cluster", "AccessDenied");
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    assert_err!(teardown.stop_cluster(CLUSTER).await);
    assert_eq!(platform.count("list_task_definitions"), 0);
}
