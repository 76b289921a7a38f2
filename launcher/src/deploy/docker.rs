//! Docker image build and push

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::LauncherError;
use crate::models::resources::RegistryCredentials;

/// One build-tag-push of the local project image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePush {
    /// Build context, normally the working directory
    pub context_dir: PathBuf,

    /// Local image reference (`name:version`)
    pub local_image: String,

    /// Registry host to log in to
    pub registry: String,

    /// Fully qualified remote reference to tag and push
    pub remote_image: String,
}

/// Builds and publishes images to a registry
#[async_trait]
pub trait ImagePublisher: Send + Sync {
    async fn publish(
        &self,
        push: &ImagePush,
        credentials: &RegistryCredentials,
    ) -> Result<(), LauncherError>;
}

/// Publishes through the `docker` command line
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check that the docker executable can be run
    pub async fn ensure_available(&self) -> Result<(), LauncherError> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| LauncherError::MissingDependency(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(LauncherError::MissingDependency(format!(
                "{} --version failed",
                self.program
            )));
        }
        debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }

    async fn login(
        &self,
        registry: &str,
        credentials: &RegistryCredentials,
    ) -> Result<(), LauncherError> {
        debug!("Logging in to {}", registry);

        let mut child = Command::new(&self.program)
            .args([
                "login",
                "--username",
                credentials.username.as_str(),
                "--password-stdin",
                registry,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| LauncherError::ImageError(format!("Failed to run docker login: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(credentials.password.expose_secret().as_bytes())
                .await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(LauncherError::ImageError(format!(
                "docker login to {} failed: {}",
                registry,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn run(&self, push: &ImagePush, args: &[&str]) -> Result<(), LauncherError> {
        debug!("Running: {} {}", self.program, args.join(" "));

        let status = Command::new(&self.program)
            .current_dir(&push.context_dir)
            .args(args)
            .status()
            .await
            .map_err(|e| {
                LauncherError::ImageError(format!("Failed to run docker {}: {}", args[0], e))
            })?;

        if !status.success() {
            return Err(LauncherError::ImageError(format!(
                "docker {} exited with {}",
                args[0], status
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ImagePublisher for DockerCli {
    async fn publish(
        &self,
        push: &ImagePush,
        credentials: &RegistryCredentials,
    ) -> Result<(), LauncherError> {
        self.login(&push.registry, credentials).await?;

        info!("Building image: {}", push.local_image);
        self.run(push, &["build", "-t", &push.local_image, "."]).await?;

        debug!("Tagging {} as {}", push.local_image, push.remote_image);
        self.run(push, &["tag", &push.local_image, &push.remote_image])
            .await?;

        info!("Pushing image: {}", push.remote_image);
        self.run(push, &["push", &push.remote_image]).await?;

        Ok(())
    }
}
