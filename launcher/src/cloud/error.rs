//! Classified control-plane errors

use thiserror::Error;

/// Errors returned by a [`ContainerPlatform`](crate::cloud::ContainerPlatform)
///
/// The first three variants are expected conditions the flows handle inline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The cluster still holds tasks (or services that are still draining)
    #[error("Cluster still contains tasks: {0}")]
    ClusterContainsTasks(String),

    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
}

impl CloudError {
    pub fn api(operation: &'static str, message: impl Into<String>) -> Self {
        CloudError::Api {
            operation,
            message: message.into(),
        }
    }
}

/// Whether a create-service failure means the service is already there.
///
/// ECS has no typed error for this; it answers with an invalid-parameter
/// error carrying this message. Keep every match on the wording here.
pub fn is_service_already_exists(message: &str) -> bool {
    message.contains("Creation of service was not idempotent")
}
