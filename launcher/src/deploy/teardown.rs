//! Teardown flow: drain services, delete the cluster, clean up task
//! definitions and the image repository

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cloud::error::CloudError;
use crate::cloud::{ContainerPlatform, MAX_TASK_DEFINITION_BATCH};
use crate::config::settings::MAX_DRAIN_SECS;
use crate::deploy::drain;
use crate::deploy::fsm::{ClusterDeletionFsm, DeletionEvent};
use crate::errors::LauncherError;

/// Teardown options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownOptions {
    /// Delete clusters even when they carry the keep-alive tag
    pub force: bool,

    /// Drain polling
    pub drain: drain::Options,
}

/// Longest drain wait; larger timeouts are clamped to it
const MAX_DRAIN_WAIT: Duration = Duration::from_secs(MAX_DRAIN_SECS);

/// Deadline `timeout` after `now`, never overflowing the clock
pub fn drain_deadline(now: Instant, timeout: Duration) -> Instant {
    now.checked_add(timeout.min(MAX_DRAIN_WAIT)).unwrap_or(now)
}

/// Outcome of the service drain step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No such cluster; nothing to drain or delete
    ClusterNotFound,

    /// This many services were deleted
    Drained(usize),
}

/// Outcome of the best-effort repository step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryCleanup {
    Deleted,
    NotFound,
    Failed(String),
}

/// Result of tearing down one cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub cluster: String,
    pub cluster_found: bool,
    pub services_deleted: usize,
    pub task_definitions_deleted: usize,
    pub repository: RepositoryCleanup,
}

/// Result of tearing down one cluster of a fleet
#[derive(Debug)]
pub struct ClusterResult {
    pub cluster: String,
    pub outcome: Result<TeardownReport, LauncherError>,
}

/// Result of a fleet teardown
#[derive(Debug, Default)]
pub struct FleetReport {
    pub results: Vec<ClusterResult>,
}

impl FleetReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_err()).count()
    }
}

/// Runs teardowns against a platform.
///
/// `sleep_fn` paces the drain poll; shutdown broadcasts on `shutdown_rx`
/// cancel a drain in progress.
pub struct Teardown<'a, S> {
    platform: &'a dyn ContainerPlatform,
    options: TeardownOptions,
    sleep_fn: S,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<'a, S, F> Teardown<'a, S>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    pub fn new(
        platform: &'a dyn ContainerPlatform,
        options: TeardownOptions,
        sleep_fn: S,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            platform,
            options,
            sleep_fn,
            shutdown_rx,
        }
    }

    /// Tear down one cluster: drain, delete, deregister, then remove the
    /// repository. The repository step only runs when the others succeeded.
    pub async fn stop_cluster(&mut self, cluster: &str) -> Result<TeardownReport, LauncherError> {
        let (cluster_found, services_deleted) = match self.drain_services(cluster).await? {
            DrainOutcome::ClusterNotFound => {
                warn!("No clusters found matching {}", cluster);
                (false, 0)
            }
            DrainOutcome::Drained(count) => {
                self.delete_cluster(cluster).await?;
                (true, count)
            }
        };

        let task_definitions_deleted = self.cleanup_task_definitions(cluster).await?;
        let repository = self.clean_repository(cluster).await;

        Ok(TeardownReport {
            cluster: cluster.to_string(),
            cluster_found,
            services_deleted,
            task_definitions_deleted,
            repository,
        })
    }

    /// Tear down every cluster tagged as created by `username`.
    ///
    /// Fails only when the clusters cannot be listed; per-cluster failures
    /// are recorded in the report and the loop moves on.
    pub async fn stop_all_clusters(&mut self, username: &str) -> Result<FleetReport, LauncherError> {
        let clusters = self.platform.list_clusters().await.map_err(|e| {
            error!("Error listing clusters: {}", e);
            e
        })?;

        let owned: Vec<String> = clusters
            .into_iter()
            .filter(|cluster| {
                debug!("{} {:?}", cluster.name, cluster.tags);
                cluster.tags.is_created_by(username)
            })
            .map(|cluster| cluster.name)
            .collect();
        info!("Identified the following clusters: {:?}", owned);

        let mut report = FleetReport::default();
        for cluster in owned {
            info!("Deleting cluster: {}", cluster);
            let outcome = self.stop_cluster(&cluster).await;
            if let Err(e) = &outcome {
                error!("Teardown of {} failed: {}", cluster, e);
            }
            report.results.push(ClusterResult { cluster, outcome });
        }
        Ok(report)
    }

    /// Check keep-alive protection and force-delete every Fargate service
    pub async fn drain_services(&self, cluster: &str) -> Result<DrainOutcome, LauncherError> {
        let info = match self.platform.describe_cluster(cluster).await {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(DrainOutcome::ClusterNotFound),
            Err(e) => {
                error!("Error describing clusters: {}", e);
                return Err(e.into());
            }
        };
        debug!("{} {:?}", info.name, info.tags);

        if info.tags.is_keep_alive() {
            if self.options.force {
                info!("Force stopping: {}", cluster);
            } else {
                warn!("{} has keep-alive enabled. Use --force to override.", cluster);
                return Err(LauncherError::KeepAlive(cluster.to_string()));
            }
        }

        let services = self.platform.list_services(cluster).await.map_err(|e| {
            error!("Error listing services: {}", e);
            e
        })?;
        info!("Service ARNs: {:?}", services);

        for service in &services {
            info!("Deleting service: {}", service);
            self.platform
                .delete_service(cluster, service)
                .await
                .map_err(|e| {
                    error!("Error deleting {}: {}", service, e);
                    e
                })?;
        }

        Ok(DrainOutcome::Drained(services.len()))
    }

    /// Delete the cluster, waiting for its tasks to stop when the control
    /// plane refuses because some are still running
    pub async fn delete_cluster(
        &mut self,
        cluster: &str,
    ) -> Result<ClusterDeletionFsm, LauncherError> {
        let mut fsm = ClusterDeletionFsm::new();
        let deadline = drain_deadline(Instant::now(), self.options.drain.timeout);

        loop {
            fsm.process(DeletionEvent::Delete)
                .map_err(LauncherError::TeardownError)?;
            info!("Deleting cluster: {}", cluster);

            match self.platform.delete_cluster(cluster).await {
                Ok(()) => {
                    fsm.process(DeletionEvent::DeleteSucceeded)
                        .map_err(LauncherError::TeardownError)?;
                    info!("Cluster deleted: {}", cluster);
                    return Ok(fsm);
                }
                Err(CloudError::ClusterContainsTasks(_)) => {
                    fsm.process(DeletionEvent::ContainsTasks)
                        .map_err(LauncherError::TeardownError)?;
                    drain::wait_for_drain(
                        self.platform,
                        cluster,
                        &self.options.drain,
                        deadline,
                        &self.sleep_fn,
                        &mut self.shutdown_rx,
                        &mut fsm,
                    )
                    .await
                    .map_err(|e| {
                        error!("Error while waiting for tasks to stop: {}", e);
                        e
                    })?;
                }
                Err(e) => {
                    fsm.process(DeletionEvent::Failed(e.to_string()))
                        .map_err(LauncherError::TeardownError)?;
                    error!("Error deleting cluster: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Deregister and delete every task definition in the cluster's family.
    /// Returns how many were removed.
    pub async fn cleanup_task_definitions(&self, cluster: &str) -> Result<usize, LauncherError> {
        let task_definitions = self
            .platform
            .list_task_definitions(cluster)
            .await
            .map_err(|e| {
                error!("Error listing task definitions: {}", e);
                e
            })?;
        info!("Task definitions: {:?}", task_definitions);

        if task_definitions.is_empty() {
            return Ok(0);
        }

        for task_definition in &task_definitions {
            info!("Deregistering {}", task_definition);
            self.platform
                .deregister_task_definition(task_definition)
                .await
                .map_err(|e| {
                    error!("Error deregistering task definition: {}", e);
                    e
                })?;
        }

        for batch in task_definitions.chunks(MAX_TASK_DEFINITION_BATCH) {
            info!("Deleting task definitions: {:?}", batch);
            self.platform
                .delete_task_definitions(batch)
                .await
                .map_err(|e| {
                    error!("Error deleting task definitions: {}", e);
                    e
                })?;
        }

        Ok(task_definitions.len())
    }

    /// Force-delete the repository named after the cluster.
    /// Never fails the teardown.
    pub async fn clean_repository(&self, cluster: &str) -> RepositoryCleanup {
        match self.platform.describe_repository(cluster).await {
            Ok(repository) => debug!("Repository: {:?}", repository),
            Err(CloudError::NotFound(_)) => {
                warn!("The repository {} does not exist", cluster);
                return RepositoryCleanup::NotFound;
            }
            Err(e) => {
                error!("Error describing repositories: {}", e);
                return RepositoryCleanup::Failed(e.to_string());
            }
        }

        info!("Deleting repository: {}", cluster);
        match self.platform.delete_repository(cluster).await {
            Ok(()) => RepositoryCleanup::Deleted,
            Err(e) => {
                error!("Error deleting repository: {}", e);
                RepositoryCleanup::Failed(e.to_string())
            }
        }
    }
}
