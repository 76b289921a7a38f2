//! Command line options

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::deployment::ConfigOverrides;
use crate::logs::LogLevel;

/// Launch an ECS cluster/service/task from a locally built Docker image
#[derive(Debug, Clone, Parser)]
#[command(name = "easy-aws", version, about)]
pub struct Cli {
    /// Resolve and print the configuration, then exit without touching AWS
    #[arg(short, long, global = true)]
    pub test: bool,

    /// Show more messages (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Build, push and launch the service for this checkout (default)
    Start(StartArgs),

    /// Stop and delete one cluster
    Stop(StopArgs),

    /// Stop and delete every cluster you created
    #[command(name = "stopall")]
    StopAll(StopAllArgs),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct StartArgs {
    /// Tag the cluster so that stopping it requires --force
    #[arg(short, long)]
    pub keep_alive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct StopArgs {
    /// Name of the cluster to stop (defaults to this checkout's cluster)
    #[arg(short, long)]
    pub cluster: Option<String>,

    /// Stop clusters with keep-alive enabled
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct StopAllArgs {
    /// Stop clusters with keep-alive enabled
    #[arg(short, long)]
    pub force: bool,
}

impl Cli {
    /// The command to run; no subcommand means `start`
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Start(StartArgs::default()))
    }

    pub fn console_level(&self) -> LogLevel {
        LogLevel::from_verbosity(self.verbose, self.test)
    }

    /// Configuration values carried by the command line
    pub fn overrides(&self) -> ConfigOverrides {
        match self.command() {
            Command::Start(args) => ConfigOverrides {
                keep_alive: Some(args.keep_alive),
                ..Default::default()
            },
            Command::Stop(args) => ConfigOverrides {
                cluster: args.cluster,
                force: args.force,
                ..Default::default()
            },
            Command::StopAll(args) => ConfigOverrides {
                force: args.force,
                ..Default::default()
            },
        }
    }
}
