//! Utility functions

use serde::{Deserialize, Serialize};

use crate::errors::LauncherError;

/// Version information for the launcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Generate a random UUID v4
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Name of the operating-system user running the launcher.
///
/// Checks the same variables, in the same order, as a login shell would
/// when no passwd lookup is available.
pub fn current_username() -> Result<String, LauncherError> {
    username_from(|key| std::env::var(key).ok())
}

const USERNAME_VARS: [&str; 4] = ["LOGNAME", "USER", "LNAME", "USERNAME"];

fn username_from(lookup: impl Fn(&str) -> Option<String>) -> Result<String, LauncherError> {
    USERNAME_VARS
        .iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .ok_or_else(|| {
            LauncherError::ConfigError(format!(
                "Unable to determine the current user (checked {})",
                USERNAME_VARS.join(", ")
            ))
        })
}
