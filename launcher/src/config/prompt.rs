//! Interactive fallback for missing settings

use dialoguer::Input;
use tracing::debug;

use crate::config::settings::EnvSettings;
use crate::errors::LauncherError;

/// Source of values for settings the environment did not provide
pub trait Prompter {
    fn prompt(&self, label: &str) -> Result<String, LauncherError>;
}

/// Asks on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&self, label: &str) -> Result<String, LauncherError> {
        Input::<String>::new()
            .with_prompt(label)
            .interact_text()
            .map(|value| value.trim().to_string())
            .map_err(|e| LauncherError::PromptError(e.to_string()))
    }
}

/// Ask for every required setting that is still unset
pub fn fill_missing(
    mut settings: EnvSettings,
    prompter: &dyn Prompter,
) -> Result<EnvSettings, LauncherError> {
    for field in settings.missing_required() {
        debug!("{} not set, prompting", field.env_key());
        let value = prompter.prompt(field.prompt())?;
        if value.is_empty() {
            return Err(LauncherError::ConfigError(format!(
                "{} is required",
                field.env_key()
            )));
        }
        settings.set(field, value);
    }
    Ok(settings)
}
