//! JSON payloads printed by the AWS CLI, and what the optimizer reads from them

use crate::definition::{definition_from_containers, ContainerResources};
use crate::error::{OptimizerError, Result};
use crate::metrics::{mean_of_averages, MetricQuery};
use crate::models::ResourceDefinition;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `aws ecs describe-services`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeServicesOutput {
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub service_name: Option<String>,
    pub task_definition: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub arn: Option<String>,
    pub reason: Option<String>,
}

/// `aws ecs describe-task-definition`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeTaskDefinitionOutput {
    pub task_definition: Option<TaskDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub task_definition_arn: Option<String>,
    #[serde(default)]
    pub container_definitions: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: Option<String>,
    pub cpu: Option<i64>,
    pub memory: Option<i64>,
    pub memory_reservation: Option<i64>,
}

impl From<&ContainerDefinition> for ContainerResources {
    fn from(container: &ContainerDefinition) -> Self {
        Self {
            cpu: container.cpu,
            memory: container.memory,
            memory_reservation: container.memory_reservation,
        }
    }
}

/// `aws cloudwatch get-metric-statistics`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetMetricStatisticsOutput {
    pub label: Option<String>,
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Datapoint {
    pub timestamp: Option<DateTime<Utc>>,
    pub average: Option<f64>,
    pub unit: Option<String>,
}

/// Active task definition reference of the requested service
pub fn task_definition_reference(
    output: &DescribeServicesOutput,
    cluster: &str,
    service: &str,
) -> Result<String> {
    for failure in &output.failures {
        tracing::debug!(
            arn = ?failure.arn,
            reason = ?failure.reason,
            "describe-services reported a failure"
        );
    }

    output
        .services
        .first()
        .and_then(|svc| svc.task_definition.clone())
        .filter(|reference| !reference.is_empty())
        .ok_or_else(|| OptimizerError::ServiceNotFound {
            cluster: cluster.to_string(),
            service: service.to_string(),
        })
}

/// Resource definition of the first container of a described task definition
pub fn resource_definition(
    output: &DescribeTaskDefinitionOutput,
    reference: &str,
) -> Result<ResourceDefinition> {
    let task_definition =
        output
            .task_definition
            .as_ref()
            .ok_or_else(|| OptimizerError::DefinitionNotFound {
                reference: reference.to_string(),
            })?;

    let containers: Vec<ContainerResources> = task_definition
        .container_definitions
        .iter()
        .map(ContainerResources::from)
        .collect();

    definition_from_containers(reference, &containers)
}

/// Window average across the returned datapoints
pub fn datapoint_average(output: &GetMetricStatisticsOutput, query: &MetricQuery) -> Result<f64> {
    let averages = output.datapoints.iter().filter_map(|dp| dp.average);
    let average = mean_of_averages(averages).ok_or_else(|| query.no_data())?;

    let earliest = output.datapoints.iter().filter_map(|dp| dp.timestamp).min();
    let latest = output.datapoints.iter().filter_map(|dp| dp.timestamp).max();
    tracing::debug!(
        metric = %query.metric_name,
        datapoints = output.datapoints.len(),
        earliest = ?earliest,
        latest = ?latest,
        average = average,
        "Aggregated datapoints"
    );

    Ok(average)
}
