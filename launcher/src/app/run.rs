//! Command dispatch

use std::future::Future;

use colored::Colorize;
use tokio::sync::{broadcast, oneshot};
use tracing::{info, warn};

use crate::app::options::{Cli, Command};
use crate::cloud::aws::AwsPlatform;
use crate::config::deployment::DeploymentConfig;
use crate::config::prompt::TerminalPrompter;
use crate::config::resolve_config;
use crate::deploy::docker::DockerCli;
use crate::deploy::provision::launch_cluster;
use crate::deploy::teardown::{FleetReport, Teardown, TeardownOptions};
use crate::errors::LauncherError;

/// Resolve the configuration and run the selected command
pub async fn run(
    cli: Cli,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), LauncherError> {
    let command = cli.command();
    let cwd = std::env::current_dir()?;

    let config = resolve_config(&cwd, &cli.overrides(), &TerminalPrompter).await?;

    if cli.test {
        info!("Test mode exiting");
        return Ok(());
    }

    let platform = AwsPlatform::new(config.aws_region.as_deref()).await;

    match command {
        Command::Start(_) => {
            let docker = DockerCli::default();
            docker.ensure_available().await?;
            let report = launch_cluster(&platform, &docker, &config, &cwd).await?;
            info!("Launch complete: {:?}", report);
            Ok(())
        }
        Command::Stop(_) => {
            let (shutdown_rx, force_quit_rx) = spawn_shutdown_listener(shutdown_signal);
            let mut teardown = Teardown::new(
                &platform,
                teardown_options(&config),
                tokio::time::sleep,
                shutdown_rx,
            );
            let report =
                until_force_quit(teardown.stop_cluster(&config.cluster_name), force_quit_rx)
                    .await??;
            info!("Teardown complete: {:?}", report);
            Ok(())
        }
        Command::StopAll(_) => {
            let (shutdown_rx, force_quit_rx) = spawn_shutdown_listener(shutdown_signal);
            let mut teardown = Teardown::new(
                &platform,
                teardown_options(&config),
                tokio::time::sleep,
                shutdown_rx,
            );
            let report =
                until_force_quit(teardown.stop_all_clusters(&config.local_username), force_quit_rx)
                    .await??;
            print_fleet_report(&report);

            if report.failed() > 0 {
                return Err(LauncherError::TeardownError(format!(
                    "{} of {} clusters failed to stop",
                    report.failed(),
                    report.results.len()
                )));
            }
            Ok(())
        }
    }
}

/// Broadcast the first shutdown signal so a drain wait can stop cleanly.
/// A second Ctrl+C fires the returned force-quit receiver.
fn spawn_shutdown_listener(
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> (broadcast::Receiver<()>, oneshot::Receiver<()>) {
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let (force_quit_tx, force_quit_rx) = oneshot::channel();
    tokio::spawn(async move {
        shutdown_signal.await;
        let _ = shutdown_tx.send(());
        warn!("Press Ctrl+C again to quit immediately");
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = force_quit_tx.send(());
        }
    });
    (shutdown_rx, force_quit_rx)
}

/// Run `work` unless a force quit arrives first.
///
/// Returning instead of exiting in place lets `main` drop the log guard, so
/// the log file is flushed.
pub async fn until_force_quit<T>(
    work: impl Future<Output = T>,
    force_quit_rx: oneshot::Receiver<()>,
) -> Result<T, LauncherError> {
    tokio::select! {
        output = work => Ok(output),
        Ok(()) = force_quit_rx => Err(LauncherError::Interrupted),
    }
}

/// Process exit status for a run result
pub fn exit_status(result: &Result<(), LauncherError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(LauncherError::Interrupted) => 130,
        Err(_) => 1,
    }
}

fn teardown_options(config: &DeploymentConfig) -> TeardownOptions {
    TeardownOptions {
        force: config.force,
        drain: config.drain_options(),
    }
}

fn print_fleet_report(report: &FleetReport) {
    if report.results.is_empty() {
        warn!("No clusters to stop");
        return;
    }

    for result in &report.results {
        match &result.outcome {
            Ok(_) => println!("{} {}", "stopped".green(), result.cluster),
            Err(e) => println!("{} {}: {}", "failed ".red(), result.cluster, e),
        }
    }
    println!(
        "{} stopped, {} failed",
        report.succeeded().to_string().bold(),
        report.failed().to_string().bold()
    );
}
