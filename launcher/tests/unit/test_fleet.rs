//! Fleet teardown tests

#[path = "../common/mod.rs"]
mod common;

use common::{no_sleep, FakePlatform};
use easy_aws::deploy::teardown::{Teardown, TeardownOptions};
use easy_aws::errors::LauncherError;
use easy_aws::models::tags::{TagSet, CREATOR_TAG, KEEP_ALIVE_TAG};
use tokio::sync::broadcast;
use tokio_test::{assert_err, assert_ok};

fn owned_by(username: &str) -> TagSet {
    TagSet::new().with(CREATOR_TAG, username)
}

fn fleet() -> FakePlatform {
    FakePlatform::new()
        .with_cluster("alpha", owned_by("alice"))
        .with_cluster("bravo", owned_by("bob"))
        .with_cluster("charlie", owned_by("alice"))
        .with_cluster("delta", TagSet::new())
}

#[tokio::test]
async fn test_stop_all_only_owned_clusters() {
    let platform = fleet();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_all_clusters("alice").await);

    let stopped: Vec<&str> = report.results.iter().map(|r| r.cluster.as_str()).collect();
    assert_eq!(stopped, vec!["alpha", "charlie"]);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 0);

    assert!(!platform.has_cluster("alpha"));
    assert!(!platform.has_cluster("charlie"));
    assert!(platform.has_cluster("bravo"));
    assert!(platform.has_cluster("delta"));
    assert_eq!(platform.count("delete_cluster"), 2);
}

#[tokio::test]
async fn test_stop_all_isolates_failures() {
    let platform = fleet().failing("list_services:alpha", "Throttling");
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_all_clusters("alice").await);

    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.results[0].cluster, "alpha");
    assert!(report.results[0].outcome.is_err());
    assert!(platform.has_cluster("alpha"));
    assert!(!platform.has_cluster("charlie"));
}

#[tokio::test]
async fn test_stop_all_respects_keep_alive() {
    let platform = FakePlatform::new()
        .with_cluster("alpha", owned_by("alice").with(KEEP_ALIVE_TAG, "true"))
        .with_cluster("charlie", owned_by("alice"));
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_all_clusters("alice").await);

    assert_eq!(report.failed(), 1);
    assert!(matches!(
        report.results[0].outcome,
        Err(LauncherError::KeepAlive(_))
    ));
    assert!(platform.has_cluster("alpha"));
    assert!(!platform.has_cluster("charlie"));
}

#[tokio::test]
async fn test_stop_all_with_force() {
    let platform = FakePlatform::new()
        .with_cluster("alpha", owned_by("alice").with(KEEP_ALIVE_TAG, "true"));
    let options = TeardownOptions {
        force: true,
        ..Default::default()
    };
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, options, no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_all_clusters("alice").await);

    assert_eq!(report.succeeded(), 1);
    assert!(!platform.has_cluster("alpha"));
}

#[tokio::test]
async fn test_stop_all_nothing_owned() {
    let platform = fleet();
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    let report = assert_ok!(teardown.stop_all_clusters("mallory").await);

    assert!(report.results.is_empty());
    assert_eq!(platform.count("delete_cluster"), 0);
}

#[tokio::test]
async fn test_stop_all_list_failure() {
    let platform = fleet().failing("list_clusters", "ExpiredToken");
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut teardown = Teardown::new(&platform, TeardownOptions::default(), no_sleep, shutdown_rx);

    assert_err!(teardown.stop_all_clusters("alice").await);
    assert_eq!(platform.count("describe_cluster"), 0);
}
