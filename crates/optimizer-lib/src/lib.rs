//! Right-sizing recommendations for ECS services
//!
//! This crate provides:
//! - Current resource definition lookup
//! - Trailing-window utilization averages
//! - Proposal calculation under an upward rounding policy
//! - The recommendation engine tying them into a report
//! - AWS CLI backed collaborators, logging and metrics

pub mod aws;
pub mod definition;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod proposal;

pub use definition::{ContainerResources, DefinitionSource};
pub use engine::RecommendationEngine;
pub use error::{OptimizerError, RunError, RunStage};
pub use metrics::{MetricQuery, MetricsAverager, UtilizationSource};
pub use models::*;
pub use observability::{OptimizerMetrics, StructuredLogger};
