//! AWS implementation of the container platform (ECS + ECR)

use async_trait::async_trait;
use aws_sdk_ecr::Client as EcrClient;
use aws_sdk_ecs::config::Region;
use aws_sdk_ecs::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_ecs::types::{
    AssignPublicIp, AwsVpcConfiguration, Cluster, ClusterField, Compatibility,
    ContainerDefinition, LaunchType, LogConfiguration, LogDriver, NetworkConfiguration,
    NetworkMode, PortMapping, PropagateTags, Tag as EcsTag, TransportProtocol,
};
use aws_sdk_ecs::Client as EcsClient;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::cloud::error::{is_service_already_exists, CloudError};
use crate::cloud::ContainerPlatform;
use crate::models::resources::{
    ClusterInfo, RegistryCredentials, RepositoryInfo, ServiceSpec, TaskDefinitionSpec,
};
use crate::models::tags::{Tag, TagSet};

/// DescribeClusters accepts at most this many names per call
const DESCRIBE_CLUSTERS_BATCH: usize = 100;

/// ECS and ECR clients sharing one resolved SDK configuration
#[derive(Debug, Clone)]
pub struct AwsPlatform {
    ecs: EcsClient,
    ecr: EcrClient,
}

impl AwsPlatform {
    /// Load credentials and region from the default provider chain.
    /// `region` overrides the chain's region when given.
    pub async fn new(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        Self {
            ecs: EcsClient::new(&sdk_config),
            ecr: EcrClient::new(&sdk_config),
        }
    }

    async fn describe_clusters_with_tags(
        &self,
        names: Vec<String>,
    ) -> Result<Vec<ClusterInfo>, CloudError> {
        let output = self
            .ecs
            .describe_clusters()
            .set_clusters(Some(names))
            .include(ClusterField::Tags)
            .send()
            .await
            .map_err(|e| api_error("DescribeClusters", e))?;
        debug!("{:?}", output);

        for failure in output.failures() {
            debug!(
                "DescribeClusters failure for {}: {}",
                failure.arn().unwrap_or_default(),
                failure.reason().unwrap_or_default()
            );
        }

        Ok(output.clusters().iter().map(cluster_info).collect())
    }
}

#[async_trait]
impl ContainerPlatform for AwsPlatform {
    async fn create_repository(&self, name: &str) -> Result<(), CloudError> {
        match self.ecr.create_repository().repository_name(name).send().await {
            Ok(output) => {
                debug!("{:?}", output);
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_repository_already_exists_exception()) =>
            {
                Err(CloudError::AlreadyExists(name.to_string()))
            }
            Err(err) => Err(api_error("CreateRepository", err)),
        }
    }

    async fn registry_credentials(&self) -> Result<RegistryCredentials, CloudError> {
        let output = self
            .ecr
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| api_error("GetAuthorizationToken", e))?;

        let data = output.authorization_data().first().ok_or_else(|| {
            CloudError::api("GetAuthorizationToken", "response carried no authorization data")
        })?;
        let token = data.authorization_token().ok_or_else(|| {
            CloudError::api("GetAuthorizationToken", "response carried no token")
        })?;
        let (username, password) = decode_authorization_token(token)?;

        Ok(RegistryCredentials {
            username,
            password: SecretString::from(password),
            endpoint: data.proxy_endpoint().map(str::to_owned),
        })
    }

    async fn describe_repository(&self, name: &str) -> Result<RepositoryInfo, CloudError> {
        match self
            .ecr
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
        {
            Ok(output) => {
                debug!("{:?}", output);
                output
                    .repositories()
                    .first()
                    .map(|repo| RepositoryInfo {
                        name: repo.repository_name().unwrap_or(name).to_string(),
                        uri: repo.repository_uri().map(str::to_owned),
                    })
                    .ok_or_else(|| CloudError::NotFound(name.to_string()))
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_repository_not_found_exception()) =>
            {
                Err(CloudError::NotFound(name.to_string()))
            }
            Err(err) => Err(api_error("DescribeRepositories", err)),
        }
    }

    async fn delete_repository(&self, name: &str) -> Result<(), CloudError> {
        let output = self
            .ecr
            .delete_repository()
            .repository_name(name)
            .force(true)
            .send()
            .await
            .map_err(|e| api_error("DeleteRepository", e))?;
        debug!("{:?}", output);
        Ok(())
    }

    async fn create_cluster(&self, name: &str, tags: &TagSet) -> Result<(), CloudError> {
        let output = self
            .ecs
            .create_cluster()
            .cluster_name(name)
            .set_tags(Some(ecs_tags(tags)))
            .send()
            .await
            .map_err(|e| api_error("CreateCluster", e))?;
        debug!("{:?}", output);
        Ok(())
    }

    async fn describe_cluster(&self, name: &str) -> Result<Option<ClusterInfo>, CloudError> {
        let clusters = self.describe_clusters_with_tags(vec![name.to_string()]).await?;
        Ok(clusters.into_iter().find(ClusterInfo::is_active))
    }

    async fn list_clusters(&self) -> Result<Vec<ClusterInfo>, CloudError> {
        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .ecs
                .list_clusters()
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| api_error("ListClusters", e))?;
            debug!("{:?}", output);
            arns.extend(output.cluster_arns().iter().cloned());
            next_token = output.next_token().map(str::to_owned);
            if next_token.is_none() {
                break;
            }
        }

        let mut clusters = Vec::with_capacity(arns.len());
        for batch in arns.chunks(DESCRIBE_CLUSTERS_BATCH) {
            let described = self.describe_clusters_with_tags(batch.to_vec()).await?;
            clusters.extend(described.into_iter().filter(ClusterInfo::is_active));
        }
        Ok(clusters)
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), CloudError> {
        match self.ecs.delete_cluster().cluster(name).send().await {
            Ok(output) => {
                debug!("{:?}", output);
                Ok(())
            }
            Err(err)
                if err.as_service_error().is_some_and(|e| {
                    e.is_cluster_contains_tasks_exception()
                        || e.is_cluster_contains_services_exception()
                }) =>
            {
                Err(CloudError::ClusterContainsTasks(name.to_string()))
            }
            Err(err) => Err(api_error("DeleteCluster", err)),
        }
    }

    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<String, CloudError> {
        let container = &spec.container;

        let mut log_configuration = LogConfiguration::builder()
            .log_driver(LogDriver::Awslogs)
            .options("awslogs-group", &container.log_group)
            .options("awslogs-stream-prefix", &container.log_stream_prefix);
        if let Some(region) = &container.log_region {
            log_configuration = log_configuration.options("awslogs-region", region);
        }
        let log_configuration = log_configuration
            .build()
            .map_err(|e| api_error("RegisterTaskDefinition", e))?;

        let container_definition = ContainerDefinition::builder()
            .name(&container.name)
            .image(&container.image)
            .essential(true)
            .log_configuration(log_configuration)
            .port_mappings(
                PortMapping::builder()
                    .container_port(container.port)
                    .host_port(container.port)
                    .protocol(TransportProtocol::Tcp)
                    .build(),
            )
            .cpu(0)
            .build();

        let output = self
            .ecs
            .register_task_definition()
            .family(&spec.family)
            .task_role_arn(&spec.task_role_arn)
            .execution_role_arn(&spec.execution_role_arn)
            .network_mode(NetworkMode::Awsvpc)
            .requires_compatibilities(Compatibility::Fargate)
            .cpu(&spec.cpu)
            .memory(&spec.memory)
            .container_definitions(container_definition)
            .set_tags(Some(ecs_tags(&spec.tags)))
            .send()
            .await
            .map_err(|e| api_error("RegisterTaskDefinition", e))?;
        debug!("{:?}", output);

        output
            .task_definition()
            .and_then(|definition| definition.task_definition_arn())
            .map(str::to_owned)
            .ok_or_else(|| {
                CloudError::api("RegisterTaskDefinition", "response carried no task definition ARN")
            })
    }

    async fn list_task_definitions(&self, family_prefix: &str) -> Result<Vec<String>, CloudError> {
        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .ecs
                .list_task_definitions()
                .family_prefix(family_prefix)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| api_error("ListTaskDefinitions", e))?;
            debug!("{:?}", output);
            arns.extend(output.task_definition_arns().iter().cloned());
            next_token = output.next_token().map(str::to_owned);
            if next_token.is_none() {
                break;
            }
        }
        Ok(arns)
    }

    async fn deregister_task_definition(&self, arn: &str) -> Result<(), CloudError> {
        let output = self
            .ecs
            .deregister_task_definition()
            .task_definition(arn)
            .send()
            .await
            .map_err(|e| api_error("DeregisterTaskDefinition", e))?;
        debug!("{:?}", output);
        Ok(())
    }

    async fn delete_task_definitions(&self, arns: &[String]) -> Result<(), CloudError> {
        let output = self
            .ecs
            .delete_task_definitions()
            .set_task_definitions(Some(arns.to_vec()))
            .send()
            .await
            .map_err(|e| api_error("DeleteTaskDefinitions", e))?;
        debug!("{:?}", output);

        for failure in output.failures() {
            warn!(
                "Unable to delete task definition {}: {}",
                failure.arn().unwrap_or_default(),
                failure.reason().unwrap_or_default()
            );
        }
        Ok(())
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<(), CloudError> {
        let vpc_configuration = AwsVpcConfiguration::builder()
            .subnets(&spec.subnet)
            .security_groups(&spec.security_group)
            .assign_public_ip(AssignPublicIp::Disabled)
            .build()
            .map_err(|e| api_error("CreateService", e))?;

        let result = self
            .ecs
            .create_service()
            .cluster(&spec.cluster)
            .service_name(&spec.service_name)
            .task_definition(&spec.task_family)
            .desired_count(spec.desired_count)
            .launch_type(LaunchType::Fargate)
            .network_configuration(
                NetworkConfiguration::builder()
                    .awsvpc_configuration(vpc_configuration)
                    .build(),
            )
            .set_tags(Some(ecs_tags(&spec.tags)))
            .send()
            .await;

        match result {
            Ok(output) => {
                debug!("{:?}", output);
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .and_then(|e| e.message())
                    .is_some_and(is_service_already_exists) =>
            {
                Err(CloudError::AlreadyExists(spec.service_name.clone()))
            }
            Err(err) => Err(api_error("CreateService", err)),
        }
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_family: &str,
    ) -> Result<(), CloudError> {
        let output = self
            .ecs
            .update_service()
            .cluster(cluster)
            .service(service)
            .task_definition(task_family)
            .propagate_tags(PropagateTags::Service)
            .send()
            .await
            .map_err(|e| api_error("UpdateService", e))?;
        debug!("{:?}", output);
        Ok(())
    }

    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, CloudError> {
        let mut arns = Vec::new();
        let mut next_token = None;
        loop {
            let output = self
                .ecs
                .list_services()
                .cluster(cluster)
                .launch_type(LaunchType::Fargate)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| api_error("ListServices", e))?;
            debug!("{:?}", output);
            arns.extend(output.service_arns().iter().cloned());
            next_token = output.next_token().map(str::to_owned);
            if next_token.is_none() {
                break;
            }
        }
        Ok(arns)
    }

    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), CloudError> {
        let output = self
            .ecs
            .delete_service()
            .cluster(cluster)
            .service(service)
            .force(true)
            .send()
            .await
            .map_err(|e| api_error("DeleteService", e))?;
        debug!("{:?}", output);
        Ok(())
    }

    async fn list_tasks(&self, cluster: &str) -> Result<Vec<String>, CloudError> {
        // First page only: the drain poll just needs to know it is non-empty
        let output = self
            .ecs
            .list_tasks()
            .cluster(cluster)
            .send()
            .await
            .map_err(|e| api_error("ListTasks", e))?;
        debug!("{:?}", output);
        Ok(output.task_arns().to_vec())
    }
}

fn api_error<E: std::error::Error>(operation: &'static str, err: E) -> CloudError {
    CloudError::api(operation, DisplayErrorContext(err).to_string())
}

fn ecs_tags(tags: &TagSet) -> Vec<EcsTag> {
    tags.iter()
        .map(|tag| EcsTag::builder().key(&tag.key).value(&tag.value).build())
        .collect()
}

fn cluster_info(cluster: &Cluster) -> ClusterInfo {
    ClusterInfo {
        name: cluster.cluster_name().unwrap_or_default().to_string(),
        arn: cluster.cluster_arn().map(str::to_owned),
        status: cluster.status().map(str::to_owned),
        tags: cluster
            .tags()
            .iter()
            .filter_map(|tag| Some(Tag::new(tag.key()?, tag.value()?)))
            .collect(),
    }
}

/// Split a base64 `user:password` registry token
pub fn decode_authorization_token(token: &str) -> Result<(String, String), CloudError> {
    let decoded = STANDARD
        .decode(token.trim())
        .map_err(|e| CloudError::api("GetAuthorizationToken", format!("invalid token: {}", e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| CloudError::api("GetAuthorizationToken", format!("invalid token: {}", e)))?;

    decoded
        .split_once(':')
        .map(|(user, password)| (user.to_string(), password.to_string()))
        .ok_or_else(|| CloudError::api("GetAuthorizationToken", "token is not user:password"))
}
