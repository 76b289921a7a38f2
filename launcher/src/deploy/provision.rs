//! Provisioning flow: repository, image, cluster, task definition, service

use std::path::Path;

use tracing::{error, info};

use crate::cloud::error::CloudError;
use crate::cloud::ContainerPlatform;
use crate::config::deployment::DeploymentConfig;
use crate::deploy::docker::{ImagePublisher, ImagePush};
use crate::errors::LauncherError;

/// What the service step ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Created,
    Updated,
}

/// Result of a successful launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub cluster: String,
    pub task_definition_arn: String,
    pub service: ServiceAction,
}

/// Run the whole provisioning flow.
///
/// Stops at the first failure; only "already exists" conditions are
/// recovered from.
pub async fn launch_cluster(
    platform: &dyn ContainerPlatform,
    publisher: &dyn ImagePublisher,
    config: &DeploymentConfig,
    context_dir: &Path,
) -> Result<LaunchReport, LauncherError> {
    ensure_repository(platform, publisher, config, context_dir).await?;
    create_cluster(platform, config).await?;
    let task_definition_arn = register_task_definition(platform, config).await?;
    let service = upsert_service(platform, config).await?;

    Ok(LaunchReport {
        cluster: config.cluster_name.clone(),
        task_definition_arn,
        service,
    })
}

/// Create the image repository if needed, then build and push the image
pub async fn ensure_repository(
    platform: &dyn ContainerPlatform,
    publisher: &dyn ImagePublisher,
    config: &DeploymentConfig,
    context_dir: &Path,
) -> Result<(), LauncherError> {
    match platform.create_repository(&config.ecr_repo).await {
        Ok(()) => info!("Repository created: {}", config.ecr_repo),
        Err(CloudError::AlreadyExists(_)) => {
            info!("Repository {} already exists", config.ecr_repo)
        }
        Err(e) => {
            error!("Error occurred while creating repository: {}", e);
            return Err(e.into());
        }
    }

    let credentials = platform.registry_credentials().await.map_err(|e| {
        error!("Error occurred while fetching registry credentials: {}", e);
        e
    })?;

    let push = ImagePush {
        context_dir: context_dir.to_path_buf(),
        local_image: config.local_container.clone(),
        registry: config.ecr_uri.clone(),
        remote_image: config.image_uri.clone(),
    };
    publisher.publish(&push, &credentials).await.map_err(|e| {
        error!("Error occurred while tagging/pushing image: {}", e);
        e
    })
}

/// Create the cluster with the configured tags
pub async fn create_cluster(
    platform: &dyn ContainerPlatform,
    config: &DeploymentConfig,
) -> Result<(), LauncherError> {
    platform
        .create_cluster(&config.cluster_name, &config.tags)
        .await
        .map_err(|e| {
            error!("Error occurred while creating cluster: {}", e);
            e
        })?;
    info!("Cluster created: {}", config.cluster_name);
    Ok(())
}

/// Register a new task definition revision and return its ARN
pub async fn register_task_definition(
    platform: &dyn ContainerPlatform,
    config: &DeploymentConfig,
) -> Result<String, LauncherError> {
    let arn = platform
        .register_task_definition(&config.task_definition_spec())
        .await
        .map_err(|e| {
            error!("Error occurred while registering task definition: {}", e);
            e
        })?;
    info!("Task definition registered: {}", arn);
    Ok(arn)
}

/// Create the service, or point the existing one at the new revision
pub async fn upsert_service(
    platform: &dyn ContainerPlatform,
    config: &DeploymentConfig,
) -> Result<ServiceAction, LauncherError> {
    match platform.create_service(&config.service_spec()).await {
        Ok(()) => {
            info!("Service created: {}", config.service_name);
            Ok(ServiceAction::Created)
        }
        Err(CloudError::AlreadyExists(_)) => {
            info!(
                "Service {} already exists, updating to {}",
                config.service_name, config.task_family_name
            );
            platform
                .update_service(
                    &config.cluster_name,
                    &config.service_name,
                    &config.task_family_name,
                )
                .await
                .map_err(|e| {
                    error!("Error occurred while updating service: {}", e);
                    e
                })?;
            info!("Updated service: {}", config.service_name);
            Ok(ServiceAction::Updated)
        }
        Err(e) => {
            error!("Error occurred while creating service: {}", e);
            Err(e.into())
        }
    }
}
