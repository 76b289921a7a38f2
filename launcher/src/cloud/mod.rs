//! Container platform abstraction
//!
//! The provisioning and teardown flows only talk to the control plane
//! through [`ContainerPlatform`], so they can run against the AWS
//! implementation or an in-memory fake.

pub mod aws;
pub mod error;

use async_trait::async_trait;

use crate::cloud::error::CloudError;
use crate::models::resources::{
    ClusterInfo, RegistryCredentials, RepositoryInfo, ServiceSpec, TaskDefinitionSpec,
};
use crate::models::tags::TagSet;

/// Operations issued against the image registry and the orchestration
/// control plane
#[async_trait]
pub trait ContainerPlatform: Send + Sync {
    /// Create an image repository. Fails with [`CloudError::AlreadyExists`]
    /// when it is already there.
    async fn create_repository(&self, name: &str) -> Result<(), CloudError>;

    /// Fetch and decode a registry login token
    async fn registry_credentials(&self) -> Result<RegistryCredentials, CloudError>;

    /// Fails with [`CloudError::NotFound`] when the repository is missing
    async fn describe_repository(&self, name: &str) -> Result<RepositoryInfo, CloudError>;

    /// Delete a repository together with every image in it
    async fn delete_repository(&self, name: &str) -> Result<(), CloudError>;

    async fn create_cluster(&self, name: &str, tags: &TagSet) -> Result<(), CloudError>;

    /// Describe one cluster with its tags; `None` when it does not exist
    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterInfo>, CloudError>;

    /// Every cluster in the account and region, with tags
    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, CloudError>;

    /// Delete a cluster. Fails with [`CloudError::ClusterContainsTasks`]
    /// while tasks are still running in it.
    async fn delete_cluster(&self, name: &str) -> Result<(), CloudError>;

    /// Register a new revision and return its ARN
    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<String, CloudError>;

    /// All task definition ARNs whose family starts with `family_prefix`
    async fn list_task_definitions(&self, family_prefix: &str) -> Result<Vec<String>, CloudError>;

    async fn deregister_task_definition(&self, arn: &str) -> Result<(), CloudError>;

    /// Delete up to [`MAX_TASK_DEFINITION_BATCH`] deregistered revisions
    async fn delete_task_definitions(&self, arns: &[String]) -> Result<(), CloudError>;

    /// Create a service. Fails with [`CloudError::AlreadyExists`] when a
    /// service of that name is already in the cluster.
    async fn create_service(&self, spec: &ServiceSpec) -> Result<(), CloudError>;

    /// Point an existing service at the latest revision of `task_family`
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_family: &str,
    ) -> Result<(), CloudError>;

    /// ARNs of the Fargate services in a cluster
    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, CloudError>;

    /// Delete a service without waiting for its tasks to stop
    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), CloudError>;

    /// ARNs of the tasks currently in a cluster
    async fn list_tasks(&self, cluster: &str) -> Result<Vec<String>, CloudError>;
}

/// Maximum number of revisions accepted by one delete-task-definitions call
pub const MAX_TASK_DEFINITION_BATCH: usize = 10;
