//! easy-aws - Entry Point
//!
//! Launches the current checkout as an ECS service (`start`) and tears it
//! down again (`stop`, `stopall`).

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error, info};

use easy_aws::app::options::Cli;
use easy_aws::app::run::{exit_status, run};
use easy_aws::logs::{init_logging, LogOptions};
use easy_aws::utils::version_info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // Help and version requests are not errors
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let log_options = LogOptions {
        console_level: cli.console_level(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let version = version_info();
    debug!(
        "easy-aws {} ({}, built {})",
        version.version, version.git_hash, version.build_time
    );

    if cli.test {
        info!("Running in test mode");
    }

    let result = run(cli, await_shutdown_signal()).await;
    if let Err(e) = &result {
        error!("{e}");
    }
    ExitCode::from(exit_status(&result))
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Unable to listen for SIGTERM: {e}");
                let _ = tokio::signal::ctrl_c().await;
                info!("Ctrl+C received, cancelling...");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, cancelling...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, cancelling...");
        }
    }
}
