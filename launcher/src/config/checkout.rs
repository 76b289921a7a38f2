//! Git checkout discovery

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::errors::LauncherError;

/// The git checkout the launcher runs from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// Top-level directory of the working tree
    pub root: PathBuf,

    /// Currently checked out branch
    pub branch: String,
}

impl Checkout {
    /// Name of the checkout directory
    pub fn dir_name(&self) -> Option<&str> {
        self.root.file_name().and_then(|name| name.to_str())
    }

    /// Name of the directory containing the checkout
    pub fn parent_dir_name(&self) -> Option<&str> {
        self.root
            .parent()
            .and_then(|parent| parent.file_name())
            .and_then(|name| name.to_str())
    }
}

/// Locate the checkout containing `dir` and its active branch
pub async fn discover(dir: &Path) -> Result<Checkout, LauncherError> {
    let root = git_output(dir, &["rev-parse", "--show-toplevel"]).await?;
    let branch = git_output(dir, &["symbolic-ref", "--short", "HEAD"])
        .await
        .map_err(|e| {
            LauncherError::GitError(format!(
                "Unable to determine the active branch (detached HEAD?): {}",
                e
            ))
        })?;

    debug!("Checkout root: {}, branch: {}", root, branch);
    Ok(Checkout {
        root: PathBuf::from(root),
        branch,
    })
}

/// Check that the git executable can be run
pub async fn ensure_git_available() -> Result<(), LauncherError> {
    let status = Command::new("git")
        .arg("--version")
        .output()
        .await
        .map_err(|e| LauncherError::MissingDependency(format!("git: {}", e)))?
        .status;

    if !status.success() {
        return Err(LauncherError::MissingDependency(
            "git --version failed".to_string(),
        ));
    }
    Ok(())
}

async fn git_output(dir: &Path, args: &[&str]) -> Result<String, LauncherError> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .await
        .map_err(|e| LauncherError::GitError(format!("Failed to run git {}: {}", args[0], e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(LauncherError::GitError(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
