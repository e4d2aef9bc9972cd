//! Current resource definition lookup

use crate::error::{OptimizerError, Result};
use crate::models::ResourceDefinition;
use async_trait::async_trait;

/// Resolves a service's active resource definition
///
/// Implementations first resolve the service's active definition reference,
/// then expand it into container values. Errors: `ServiceNotFound`,
/// `DefinitionNotFound`, `NoContainerDefinition`, `SourceUnavailable`.
#[async_trait]
pub trait DefinitionSource: Send + Sync {
    async fn resolve_definition(&self, cluster: &str, service: &str) -> Result<ResourceDefinition>;
}

/// Resource settings of one container entry
///
/// Fields the orchestrator leaves unset are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContainerResources {
    pub cpu: Option<i64>,
    pub memory: Option<i64>,
    pub memory_reservation: Option<i64>,
}

/// Build a definition from the container entries of `reference`
///
/// Only the first entry is used; multi-container definitions are not
/// supported. Unset fields read as 0.
pub fn definition_from_containers(
    reference: &str,
    containers: &[ContainerResources],
) -> Result<ResourceDefinition> {
    let first = containers
        .first()
        .ok_or_else(|| OptimizerError::NoContainerDefinition {
            reference: reference.to_string(),
        })?;

    if containers.len() > 1 {
        tracing::warn!(
            reference = %reference,
            containers = containers.len(),
            "Task definition has several containers, using the first one"
        );
    }

    Ok(ResourceDefinition::new(
        first.cpu.unwrap_or(0),
        first.memory.unwrap_or(0),
        first.memory_reservation.unwrap_or(0),
    ))
}
