//! Remote resource descriptions

use secrecy::SecretString;
use serde::Serialize;

use crate::models::tags::TagSet;

/// A cluster as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub name: String,
    pub arn: Option<String>,
    pub status: Option<String>,
    pub tags: TagSet,
}

impl ClusterInfo {
    /// Deleted clusters keep being described as `INACTIVE` for a while
    pub fn is_active(&self) -> bool {
        self.status.as_deref() != Some("INACTIVE")
    }
}

/// An image repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub name: String,
    pub uri: Option<String>,
}

/// Decoded registry login
#[derive(Debug)]
pub struct RegistryCredentials {
    pub username: String,
    pub password: SecretString,
    pub endpoint: Option<String>,
}

/// Fargate task sizing
pub const TASK_CPU: &str = "512";
pub const TASK_MEMORY: &str = "1GB";
pub const CONTAINER_PORT: i32 = 80;
pub const LOG_STREAM_PREFIX: &str = "ecs";

/// The single container of a task definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub port: i32,
    pub log_group: String,
    pub log_region: Option<String>,
    pub log_stream_prefix: String,
}

/// A task definition revision to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub task_role_arn: String,
    pub execution_role_arn: String,
    pub cpu: String,
    pub memory: String,
    pub container: ContainerSpec,
    pub tags: TagSet,
}

/// A Fargate service bound to a cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    pub cluster: String,
    pub service_name: String,
    pub task_family: String,
    pub desired_count: i32,
    pub subnet: String,
    pub security_group: String,
    pub tags: TagSet,
}
