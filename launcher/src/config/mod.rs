//! Configuration resolution
//!
//! Resolution runs in two stages. The pure stage turns variables into
//! [`settings::EnvSettings`] and then into a [`deployment::DeploymentConfig`].
//! The side-effecting stage around it reads the `.env` file and the process
//! environment, asks git about the checkout, persists the checkout id and
//! prompts for whatever is still missing.

pub mod checkout;
pub mod deployment;
pub mod env_file;
pub mod prompt;
pub mod settings;

use std::path::Path;

use tracing::{debug, info};

use crate::config::deployment::{ConfigOverrides, DeploymentConfig};
use crate::config::env_file::{merge_vars, process_vars, EnvFile};
use crate::config::prompt::{fill_missing, Prompter};
use crate::config::settings::EnvSettings;
use crate::errors::LauncherError;
use crate::utils::{current_username, generate_uuid};

/// Name of the env file read from the working directory
pub const ENV_FILE_NAME: &str = ".env";

/// Variable holding the per-checkout random identifier
pub const CHECKOUT_ID_KEY: &str = "CURRENT_UUID";

/// Resolve the configuration for a run started in `cwd`
pub async fn resolve_config(
    cwd: &Path,
    overrides: &ConfigOverrides,
    prompter: &dyn Prompter,
) -> Result<DeploymentConfig, LauncherError> {
    let env_file = EnvFile::new(cwd.join(ENV_FILE_NAME));
    let file_vars = env_file.read_vars().await?;
    debug!("Read {} variables from {}", file_vars.len(), env_file.path().display());

    let vars = merge_vars(file_vars, process_vars());
    let settings = EnvSettings::from_vars(&vars)?;

    checkout::ensure_git_available().await?;
    let checkout = checkout::discover(cwd).await?;
    let username = current_username()?;
    let checkout_id = ensure_checkout_id(&settings, &env_file).await?;

    let settings = fill_missing(settings, prompter)?;
    let config =
        DeploymentConfig::resolve(&settings, &checkout, &checkout_id, &username, overrides)?;
    info!("{}", config.cluster_name);

    config.log_params()?;
    Ok(config)
}

/// Return the stored checkout id, generating and persisting one on first use
pub async fn ensure_checkout_id(
    settings: &EnvSettings,
    env_file: &EnvFile,
) -> Result<String, LauncherError> {
    if let Some(id) = &settings.current_uuid {
        return Ok(id.clone());
    }

    let id = generate_uuid();
    env_file.append_var(CHECKOUT_ID_KEY, &id).await?;
    info!(
        "Stored new {} in {}",
        CHECKOUT_ID_KEY,
        env_file.path().display()
    );
    Ok(id)
}
