//! Error types for easy-aws

use std::time::Duration;

use thiserror::Error;

use crate::cloud::error::CloudError;

/// Main error type for the launcher
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Env file error: {0}")]
    EnvFileError(#[from] dotenvy::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] CloudError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Git error: {0}")]
    GitError(String),

    #[error("Prompt error: {0}")]
    PromptError(String),

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("{0} has keep-alive enabled. Use --force to override.")]
    KeepAlive(String),

    #[error("Timed out after {waited:?} waiting for tasks in {cluster} to stop")]
    DrainTimedOut { cluster: String, waited: Duration },

    #[error("Cancelled while waiting for tasks in {0} to stop")]
    Cancelled(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("Teardown error: {0}")]
    TeardownError(String),
}
