//! `.env` file access

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::errors::LauncherError;

/// A dotenv-style `KEY=value` file
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
}

impl EnvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Parse the file without touching the process environment.
    /// A missing file reads as empty.
    pub async fn read_vars(&self) -> Result<BTreeMap<String, String>, LauncherError> {
        if !self.exists().await {
            return Ok(BTreeMap::new());
        }

        let contents = fs::read(&self.path).await?;
        let vars = dotenvy::from_read_iter(contents.as_slice())
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(vars)
    }

    /// Append `KEY=value` on its own line, creating the file if needed
    pub async fn append_var(&self, key: &str, value: &str) -> Result<(), LauncherError> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("\n{}={}\n", key, value).as_bytes())
            .await?;
        file.sync_all().await?;
        Ok(())
    }
}

/// The process environment, skipping variables that are not valid UTF-8
pub fn process_vars() -> Vec<(String, String)> {
    utf8_vars(std::env::vars_os())
}

/// Keep the entries whose key and value are both valid UTF-8
pub fn utf8_vars(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Vec<(String, String)> {
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!("Skipping non UTF-8 environment variable {:?}", key);
                None
            }
        })
        .collect()
}

/// Overlay `overrides` on top of `base`; the process environment wins over
/// values from the file.
pub fn merge_vars(
    base: BTreeMap<String, String>,
    overrides: impl IntoIterator<Item = (String, String)>,
) -> BTreeMap<String, String> {
    let mut merged = base;
    merged.extend(overrides);
    merged
}
