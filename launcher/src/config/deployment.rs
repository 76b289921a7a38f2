//! The resolved deployment configuration

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::checkout::Checkout;
use crate::config::settings::{EnvSettings, RequiredField};
use crate::deploy::drain;
use crate::errors::LauncherError;
use crate::models::resources::{
    ContainerSpec, ServiceSpec, TaskDefinitionSpec, CONTAINER_PORT, LOG_STREAM_PREFIX, TASK_CPU,
    TASK_MEMORY,
};
use crate::models::tags::{TagSet, CREATOR_TAG, KEEP_ALIVE_TAG};

/// Values taken from the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Operate on this cluster instead of the derived one
    pub cluster: Option<String>,

    /// Ignore keep-alive protection
    pub force: bool,

    /// Set when launching; adds the keep-alive tag with this value
    pub keep_alive: Option<bool>,
}

/// Everything a flow needs, resolved once per invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentConfig {
    pub cluster_name: String,
    pub project_name: String,
    pub project_version: String,
    pub ecr_uri: String,
    pub ecr_repo: String,
    pub container_name: String,
    pub task_family_name: String,
    pub service_name: String,
    pub subnet: String,
    pub security_group: String,
    pub task_role_arn: String,
    pub task_execution_role_arn: String,
    pub image_uri: String,
    pub local_container: String,
    pub local_username: String,
    pub tags: TagSet,
    pub force: bool,
    pub log_group: String,
    pub aws_region: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub drain_poll_interval: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub drain_timeout: Duration,
}

impl DeploymentConfig {
    /// Derive the configuration from settings whose required fields are
    /// filled in. Does no I/O.
    pub fn resolve(
        settings: &EnvSettings,
        checkout: &Checkout,
        checkout_id: &str,
        username: &str,
        overrides: &ConfigOverrides,
    ) -> Result<Self, LauncherError> {
        let required = |field: RequiredField| {
            settings.get(field).map(str::to_owned).ok_or_else(|| {
                LauncherError::ConfigError(format!("{} is not set", field.env_key()))
            })
        };

        let project_name = settings
            .project_name
            .as_deref()
            .or_else(|| checkout.dir_name())
            .map(normalize_name)
            .ok_or_else(|| {
                LauncherError::ConfigError(
                    "PROJECT_NAME is not set and the checkout directory has no name".to_string(),
                )
            })?;

        let parent_prefix = if settings.show_parent_path() {
            checkout
                .parent_dir_name()
                .map(|parent| format!("{}-", parent))
                .unwrap_or_default()
        } else {
            String::new()
        };

        let derived_cluster = format!(
            "{}{}-{}-{}",
            parent_prefix, project_name, checkout.branch, checkout_id
        )
        .replace(' ', "_");

        let ecr_uri = required(RequiredField::EcrUri)?;
        let container_name = settings
            .container_name
            .clone()
            .unwrap_or_else(|| project_name.clone());
        let task_family_name = settings
            .task_family_name
            .clone()
            .unwrap_or_else(|| derived_cluster.clone());
        let service_name = settings
            .service_name
            .clone()
            .unwrap_or_else(|| derived_cluster.clone());
        let project_version = settings
            .project_version
            .clone()
            .unwrap_or_else(|| "latest".to_string());

        let ecr_repo = service_name.clone();
        let image_uri = format!("{}/{}:latest", ecr_uri, ecr_repo).to_lowercase();
        let local_container = format!("{}:{}", container_name, project_version);
        let log_group = settings
            .log_group
            .clone()
            .unwrap_or_else(|| format!("/ecs/{}", project_name));

        let mut tags = TagSet::new().with(CREATOR_TAG, username);
        if let Some(keep_alive) = overrides.keep_alive {
            tags = tags.with(KEEP_ALIVE_TAG, keep_alive.to_string());
        }

        let drain = settings.drain_options()?;

        Ok(Self {
            cluster_name: overrides.cluster.clone().unwrap_or(derived_cluster),
            project_name,
            project_version,
            ecr_uri,
            ecr_repo,
            container_name,
            task_family_name,
            service_name,
            subnet: required(RequiredField::Subnet)?,
            security_group: required(RequiredField::SecurityGroup)?,
            task_role_arn: required(RequiredField::TaskRoleArn)?,
            task_execution_role_arn: required(RequiredField::TaskExecutionRoleArn)?,
            image_uri,
            local_container,
            local_username: username.to_string(),
            tags,
            force: overrides.force,
            log_group,
            aws_region: settings.aws_region.clone(),
            drain_poll_interval: drain.interval,
            drain_timeout: drain.timeout,
        })
    }

    pub fn drain_options(&self) -> drain::Options {
        drain::Options {
            interval: self.drain_poll_interval,
            timeout: self.drain_timeout,
        }
    }

    pub fn task_definition_spec(&self) -> TaskDefinitionSpec {
        TaskDefinitionSpec {
            family: self.task_family_name.clone(),
            task_role_arn: self.task_role_arn.clone(),
            execution_role_arn: self.task_execution_role_arn.clone(),
            cpu: TASK_CPU.to_string(),
            memory: TASK_MEMORY.to_string(),
            container: ContainerSpec {
                name: self.container_name.clone(),
                image: self.image_uri.clone(),
                port: CONTAINER_PORT,
                log_group: self.log_group.clone(),
                log_region: self.aws_region.clone(),
                log_stream_prefix: LOG_STREAM_PREFIX.to_string(),
            },
            tags: self.tags.clone(),
        }
    }

    pub fn service_spec(&self) -> ServiceSpec {
        ServiceSpec {
            cluster: self.cluster_name.clone(),
            service_name: self.service_name.clone(),
            task_family: self.task_family_name.clone(),
            desired_count: 1,
            subnet: self.subnet.clone(),
            security_group: self.security_group.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Log every parameter on its own aligned line
    pub fn log_params(&self) -> Result<(), LauncherError> {
        if let Value::Object(params) = serde_json::to_value(self)? {
            for (key, value) in params {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                info!("{:<40}{}", format!("{}:", key), value);
            }
        }
        Ok(())
    }
}

fn normalize_name(name: &str) -> String {
    name.replace(' ', "_").to_lowercase()
}

fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}
