//! AWS collaborators backed by the AWS CLI
//!
//! Each lookup runs one `aws` invocation with JSON output. Credentials,
//! profiles, SSO and MFA prompts are handled by the CLI itself. Every
//! invocation is bounded by the configured timeout; the child process is
//! killed when the deadline passes.

mod responses;


pub use responses::{
    datapoint_average, resource_definition, task_definition_reference, ContainerDefinition,
    Datapoint, DescribeServicesOutput, DescribeTaskDefinitionOutput, GetMetricStatisticsOutput,
    Service, TaskDefinition,
};

use crate::definition::DefinitionSource;
use crate::error::{OptimizerError, Result};
use crate::metrics::{MetricQuery, UtilizationSource};
use crate::models::ResourceDefinition;
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "ap-northeast-1";

/// Default deadline for a single CLI invocation
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for CLI invocations
#[derive(Debug, Clone)]
pub struct AwsCliConfig {
    /// Path or name of the `aws` executable
    pub program: PathBuf,
    pub region: String,
    /// Named profile passed as `--profile`
    pub profile: Option<String>,
    /// Deadline for each invocation
    pub timeout: Duration,
}

impl Default for AwsCliConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("aws"),
            region: DEFAULT_REGION.to_string(),
            profile: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Why an invocation produced no usable output
#[derive(Debug)]
enum InvokeError {
    /// The CLI ran and exited non-zero, usually an AWS service error
    Rejected { code: Option<i32>, stderr: String },
    /// The CLI could not run, timed out or printed unparsable output
    Failed(String),
}

impl InvokeError {
    /// Whether the CLI reported the named AWS exception
    fn is_exception(&self, name: &str) -> bool {
        match self {
            InvokeError::Rejected { stderr, .. } => stderr.contains(&format!("({})", name)),
            InvokeError::Failed(_) => false,
        }
    }

    fn into_unavailable(self, operation: &str) -> OptimizerError {
        let message = match self {
            InvokeError::Rejected { code, stderr } => match code {
                Some(code) => format!("aws exited with status {}: {}", code, stderr.trim()),
                None => format!("aws terminated by signal: {}", stderr.trim()),
            },
            InvokeError::Failed(message) => message,
        };
        OptimizerError::source_unavailable(operation, message)
    }
}

/// Definition and utilization source using the AWS CLI
#[derive(Debug, Clone)]
pub struct AwsCliSource {
    config: AwsCliConfig,
}

impl AwsCliSource {
    pub fn new(config: AwsCliConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AwsCliConfig {
        &self.config
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--region".to_string(), self.config.region.clone()];
        if let Some(profile) = &self.config.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args.push("--output".to_string());
        args.push("json".to_string());
        args
    }

    pub fn describe_services_args(&self, cluster: &str, service: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "ecs",
            "describe-services",
            "--cluster",
            cluster,
            "--services",
            service,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.common_args());
        args
    }

    pub fn describe_task_definition_args(&self, reference: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "ecs",
            "describe-task-definition",
            "--task-definition",
            reference,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.common_args());
        args
    }

    pub fn get_metric_statistics_args(&self, query: &MetricQuery) -> Vec<String> {
        let mut args = vec![
            "cloudwatch".to_string(),
            "get-metric-statistics".to_string(),
            "--namespace".to_string(),
            query.namespace.clone(),
            "--metric-name".to_string(),
            query.metric_name.clone(),
            "--dimensions".to_string(),
            format!("Name=ClusterName,Value={}", query.cluster),
            format!("Name=ServiceName,Value={}", query.service),
            "--start-time".to_string(),
            query.start_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            "--end-time".to_string(),
            query.end_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            "--period".to_string(),
            query.period.as_secs().to_string(),
            "--statistics".to_string(),
            query.statistic.clone(),
            "--unit".to_string(),
            query.unit.clone(),
        ];
        args.extend(self.common_args());
        args
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        args: Vec<String>,
    ) -> std::result::Result<T, InvokeError> {
        debug!(program = %self.config.program.display(), args = ?args, "Invoking AWS CLI");

        let mut command = Command::new(&self.config.program);
        command.args(&args).stdin(Stdio::inherit()).kill_on_drop(true);

        let output = match tokio::time::timeout(self.config.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(InvokeError::Failed(format!(
                    "failed to run {}: {}",
                    self.config.program.display(),
                    e
                )))
            }
            Err(_) => {
                return Err(InvokeError::Failed(format!(
                    "timed out after {}s",
                    self.config.timeout.as_secs_f64()
                )))
            }
        };

        if !output.status.success() {
            return Err(InvokeError::Rejected {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| InvokeError::Failed(format!("unparsable response: {}", e)))
    }
}

#[async_trait]
impl DefinitionSource for AwsCliSource {
    async fn resolve_definition(&self, cluster: &str, service: &str) -> Result<ResourceDefinition> {
        let services: DescribeServicesOutput = self
            .invoke(self.describe_services_args(cluster, service))
            .await
            .map_err(|e| {
                if e.is_exception("ClusterNotFoundException") {
                    OptimizerError::ServiceNotFound {
                        cluster: cluster.to_string(),
                        service: service.to_string(),
                    }
                } else {
                    e.into_unavailable("ecs describe-services")
                }
            })?;

        let reference = task_definition_reference(&services, cluster, service)?;
        debug!(reference = %reference, "Resolved active task definition");

        let described: DescribeTaskDefinitionOutput = self
            .invoke(self.describe_task_definition_args(&reference))
            .await
            .map_err(|e| {
                if e.is_exception("ClientException") {
                    OptimizerError::DefinitionNotFound {
                        reference: reference.clone(),
                    }
                } else {
                    e.into_unavailable("ecs describe-task-definition")
                }
            })?;

        resource_definition(&described, &reference)
    }
}

#[async_trait]
impl UtilizationSource for AwsCliSource {
    async fn average_utilization(&self, query: &MetricQuery) -> Result<f64> {
        let statistics: GetMetricStatisticsOutput = self
            .invoke(self.get_metric_statistics_args(query))
            .await
            .map_err(|e| e.into_unavailable("cloudwatch get-metric-statistics"))?;

        datapoint_average(&statistics, query)
    }
}
