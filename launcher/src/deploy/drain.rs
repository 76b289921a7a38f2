//! Wait for a cluster's tasks to stop

use std::future::Future;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cloud::ContainerPlatform;
use crate::deploy::fsm::{ClusterDeletionFsm, DeletionEvent};
use crate::errors::LauncherError;

/// Drain polling options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Delay between task-list polls
    pub interval: Duration,

    /// Total time allowed for the cluster to drain
    pub timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(600),
        }
    }
}

enum Interrupted {
    TimedOut,
    Cancelled,
}

/// Poll the cluster's task list until it is empty.
///
/// Returns [`LauncherError::DrainTimedOut`] once `deadline` passes and
/// [`LauncherError::Cancelled`] when a shutdown is broadcast. The FSM must be
/// in `AwaitingDrain` and is left there on success.
pub async fn wait_for_drain<S, F>(
    platform: &dyn ContainerPlatform,
    cluster: &str,
    options: &Options,
    deadline: Instant,
    sleep_fn: &S,
    shutdown_rx: &mut broadcast::Receiver<()>,
    fsm: &mut ClusterDeletionFsm,
) -> Result<(), LauncherError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Waiting for {} tasks to stop", cluster);

    let outcome = {
        let poll = poll_until_empty(platform, cluster, options, sleep_fn, &mut *fsm);
        tokio::select! {
            result = tokio::time::timeout_at(deadline, poll) => {
                result.map_err(|_| Interrupted::TimedOut)
            }
            Ok(_) = shutdown_rx.recv() => Err(Interrupted::Cancelled),
        }
    };

    match outcome {
        Ok(result) => result,
        Err(Interrupted::TimedOut) => {
            fsm.process(DeletionEvent::TimedOut)
                .map_err(LauncherError::TeardownError)?;
            Err(LauncherError::DrainTimedOut {
                cluster: cluster.to_string(),
                waited: options.timeout,
            })
        }
        Err(Interrupted::Cancelled) => {
            fsm.process(DeletionEvent::Cancel)
                .map_err(LauncherError::TeardownError)?;
            Err(LauncherError::Cancelled(cluster.to_string()))
        }
    }
}

async fn poll_until_empty<S, F>(
    platform: &dyn ContainerPlatform,
    cluster: &str,
    options: &Options,
    sleep_fn: &S,
    fsm: &mut ClusterDeletionFsm,
) -> Result<(), LauncherError>
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    loop {
        let tasks = match platform.list_tasks(cluster).await {
            Ok(tasks) => tasks,
            Err(e) => {
                fsm.process(DeletionEvent::Failed(e.to_string()))
                    .map_err(LauncherError::TeardownError)?;
                return Err(e.into());
            }
        };

        if tasks.is_empty() {
            fsm.process(DeletionEvent::Drained)
                .map_err(LauncherError::TeardownError)?;
            info!("All tasks stopped in {}", cluster);
            return Ok(());
        }

        fsm.process(DeletionEvent::TasksRemaining(tasks.len()))
            .map_err(LauncherError::TeardownError)?;
        debug!("{} tasks still running in {}", tasks.len(), cluster);
        sleep_fn(options.interval).await;
    }
}
