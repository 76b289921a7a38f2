//! Settings read from the environment

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::deploy::drain;
use crate::errors::LauncherError;

/// Raw settings, one field per supported environment variable.
/// Every field is optional at this stage; empty values count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct EnvSettings {
    pub project_name: Option<String>,
    pub show_parent_path: Option<String>,
    pub ecr_uri: Option<String>,
    pub container_name: Option<String>,
    pub task_family_name: Option<String>,
    pub service_name: Option<String>,
    pub subnet: Option<String>,
    pub security_group: Option<String>,
    pub task_role_arn: Option<String>,
    pub task_execution_role_arn: Option<String>,
    pub project_version: Option<String>,
    pub current_uuid: Option<String>,
    pub aws_region: Option<String>,
    pub log_group: Option<String>,
    pub drain_poll_interval_secs: Option<String>,
    pub drain_timeout_secs: Option<String>,
}

impl EnvSettings {
    /// Build settings from a variable map. Unknown keys are ignored.
    pub fn from_vars(vars: &BTreeMap<String, String>) -> Result<Self, LauncherError> {
        let object = vars
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(key, value)| (key.clone(), Value::String(value.trim().to_string())))
            .collect::<serde_json::Map<_, _>>();
        Ok(serde_json::from_value(Value::Object(object))?)
    }

    /// `SHOW_PARENT_PATH` is on for any value except the usual false spellings
    pub fn show_parent_path(&self) -> bool {
        match self.show_parent_path.as_deref() {
            None => false,
            Some(value) => !matches!(
                value.to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ),
        }
    }

    pub fn get(&self, field: RequiredField) -> Option<&str> {
        match field {
            RequiredField::EcrUri => self.ecr_uri.as_deref(),
            RequiredField::Subnet => self.subnet.as_deref(),
            RequiredField::SecurityGroup => self.security_group.as_deref(),
            RequiredField::TaskRoleArn => self.task_role_arn.as_deref(),
            RequiredField::TaskExecutionRoleArn => self.task_execution_role_arn.as_deref(),
        }
    }

    pub fn set(&mut self, field: RequiredField, value: String) {
        let slot = match field {
            RequiredField::EcrUri => &mut self.ecr_uri,
            RequiredField::Subnet => &mut self.subnet,
            RequiredField::SecurityGroup => &mut self.security_group,
            RequiredField::TaskRoleArn => &mut self.task_role_arn,
            RequiredField::TaskExecutionRoleArn => &mut self.task_execution_role_arn,
        };
        *slot = Some(value);
    }

    /// Required fields that are still unset
    pub fn missing_required(&self) -> Vec<RequiredField> {
        RequiredField::ALL
            .into_iter()
            .filter(|field| self.get(*field).is_none())
            .collect()
    }

    /// Drain polling options, falling back to the defaults
    pub fn drain_options(&self) -> Result<drain::Options, LauncherError> {
        let defaults = drain::Options::default();
        Ok(drain::Options {
            interval: parse_secs(
                "DRAIN_POLL_INTERVAL_SECS",
                self.drain_poll_interval_secs.as_deref(),
            )?
            .unwrap_or(defaults.interval),
            timeout: parse_secs("DRAIN_TIMEOUT_SECS", self.drain_timeout_secs.as_deref())?
                .unwrap_or(defaults.timeout),
        })
    }
}

/// Upper bound for the drain timing variables (one week)
pub const MAX_DRAIN_SECS: u64 = 7 * 24 * 60 * 60;

fn parse_secs(key: &str, value: Option<&str>) -> Result<Option<Duration>, LauncherError> {
    value
        .map(|raw| match raw.parse::<u64>() {
            Ok(secs) if secs <= MAX_DRAIN_SECS => Ok(Duration::from_secs(secs)),
            Ok(_) => Err(LauncherError::ConfigError(format!(
                "{} must be at most {} seconds, got {}",
                key, MAX_DRAIN_SECS, raw
            ))),
            Err(_) => Err(LauncherError::ConfigError(format!(
                "{} must be a number of seconds, got {:?}",
                key, raw
            ))),
        })
        .transpose()
}

/// Settings that have no default and are prompted for when missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    EcrUri,
    Subnet,
    SecurityGroup,
    TaskRoleArn,
    TaskExecutionRoleArn,
}

impl RequiredField {
    pub const ALL: [RequiredField; 5] = [
        RequiredField::EcrUri,
        RequiredField::Subnet,
        RequiredField::SecurityGroup,
        RequiredField::TaskRoleArn,
        RequiredField::TaskExecutionRoleArn,
    ];

    pub fn env_key(&self) -> &'static str {
        match self {
            RequiredField::EcrUri => "ECR_URI",
            RequiredField::Subnet => "SUBNET",
            RequiredField::SecurityGroup => "SECURITY_GROUP",
            RequiredField::TaskRoleArn => "TASK_ROLE_ARN",
            RequiredField::TaskExecutionRoleArn => "TASK_EXECUTION_ROLE_ARN",
        }
    }

    pub fn prompt(&self) -> &'static str {
        match self {
            RequiredField::EcrUri => "Enter image URI",
            RequiredField::Subnet => "Enter VPC Subnet",
            RequiredField::SecurityGroup => "Enter Security Group",
            RequiredField::TaskRoleArn => "Enter Task Role ARN",
            RequiredField::TaskExecutionRoleArn => "Enter Task Execution Role ARN",
        }
    }
}
