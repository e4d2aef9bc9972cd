//! Error taxonomy for optimization runs

use crate::models::ResourceDimension;
use std::fmt;
use thiserror::Error;

/// Failure raised by the engine or one of its collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("service {service} not found in cluster {cluster}")]
    ServiceNotFound { cluster: String, service: String },

    #[error("task definition {reference} could not be resolved")]
    DefinitionNotFound { reference: String },

    #[error("task definition {reference} has no container definitions")]
    NoContainerDefinition { reference: String },

    #[error("no {metric} datapoints for service {service} in cluster {cluster}")]
    NoDataAvailable {
        metric: String,
        cluster: String,
        service: String,
    },

    #[error("{operation} unavailable: {message}")]
    SourceUnavailable { operation: String, message: String },
}

impl OptimizerError {
    pub fn source_unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Stable identifier used in logs and metric labels
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::ServiceNotFound { .. } => "service_not_found",
            Self::DefinitionNotFound { .. } => "definition_not_found",
            Self::NoContainerDefinition { .. } => "no_container_definition",
            Self::NoDataAvailable { .. } => "no_data_available",
            Self::SourceUnavailable { .. } => "source_unavailable",
        }
    }
}

pub type Result<T> = std::result::Result<T, OptimizerError>;

/// Stage of a run, used to report where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Validate,
    LoadDefinition,
    CollectUtilization(ResourceDimension),
    Propose(ResourceDimension),
    AssembleReport,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Validate => f.write_str("validate"),
            RunStage::LoadDefinition => f.write_str("load definition"),
            RunStage::CollectUtilization(dim) => write!(f, "collect {} utilization", dim),
            RunStage::Propose(dim) => write!(f, "propose {}", dim),
            RunStage::AssembleReport => f.write_str("assemble report"),
        }
    }
}

/// A failed run: which stage failed and why
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed: {error}")]
pub struct RunError {
    pub stage: RunStage,
    #[source]
    pub error: OptimizerError,
}

impl RunError {
    pub fn new(stage: RunStage, error: OptimizerError) -> Self {
        Self { stage, error }
    }
}
