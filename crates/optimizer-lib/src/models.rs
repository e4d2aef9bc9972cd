//! Core data models for the optimizer

use crate::error::{OptimizerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Default target utilization for every dimension
pub const DEFAULT_DESIRED_PERCENTAGE: f64 = 80.0;

/// Resource axis a value applies to
///
/// Ordering follows declaration order, which is also the order in which
/// utilization is collected during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceDimension {
    Cpu,
    Memory,
}

impl ResourceDimension {
    pub const ALL: [ResourceDimension; 2] = [ResourceDimension::Cpu, ResourceDimension::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceDimension::Cpu => "cpu",
            ResourceDimension::Memory => "memory",
        }
    }

    /// CloudWatch metric name published by ECS for this dimension
    pub fn metric_name(&self) -> &'static str {
        match self {
            ResourceDimension::Cpu => "CPUUtilization",
            ResourceDimension::Memory => "MemoryUtilization",
        }
    }
}

impl fmt::Display for ResourceDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Currently configured allocation of a service's container
///
/// CPU is expressed in CPU units, memory values in MiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    pub cpu: i64,
    pub memory: i64,
    /// Soft memory limit. Reported only, never used to compute a proposal.
    pub reserved_memory: i64,
}

impl ResourceDefinition {
    pub fn new(cpu: i64, memory: i64, reserved_memory: i64) -> Self {
        Self {
            cpu,
            memory,
            reserved_memory,
        }
    }

    /// Allocation for a dimension
    pub fn value(&self, dimension: ResourceDimension) -> i64 {
        match dimension {
            ResourceDimension::Cpu => self.cpu,
            ResourceDimension::Memory => self.memory,
        }
    }
}

/// Target utilization percentage per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredPercentage(BTreeMap<ResourceDimension, f64>);

impl Default for DesiredPercentage {
    fn default() -> Self {
        Self::new(DEFAULT_DESIRED_PERCENTAGE, DEFAULT_DESIRED_PERCENTAGE)
    }
}

impl DesiredPercentage {
    pub fn new(cpu: f64, memory: f64) -> Self {
        Self(BTreeMap::from([
            (ResourceDimension::Cpu, cpu),
            (ResourceDimension::Memory, memory),
        ]))
    }

    /// Configuration with no targets; add them with [`DesiredPercentage::with_target`]
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with_target(mut self, dimension: ResourceDimension, percentage: f64) -> Self {
        self.0.insert(dimension, percentage);
        self
    }

    pub fn get(&self, dimension: ResourceDimension) -> Option<f64> {
        self.0.get(&dimension).copied()
    }

    /// Configured dimensions in collection order
    pub fn dimensions(&self) -> impl Iterator<Item = ResourceDimension> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceDimension, f64)> + '_ {
        self.0.iter().map(|(dimension, pct)| (*dimension, *pct))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that at least one target is set and every target is a positive
    /// finite percentage
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(OptimizerError::Configuration(
                "no desired percentage configured".to_string(),
            ));
        }

        for (dimension, pct) in &self.0 {
            if !pct.is_finite() || *pct <= 0.0 {
                return Err(OptimizerError::Configuration(format!(
                    "desired {} percentage must be greater than 0, got {}",
                    dimension, pct
                )));
            }
        }

        Ok(())
    }
}

/// Final output of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationReport {
    pub cluster: String,
    pub service: String,
    pub desired_percentage: DesiredPercentage,
    pub current_def: ResourceDefinition,
    pub utilization: BTreeMap<ResourceDimension, f64>,
    pub proposal: BTreeMap<ResourceDimension, u64>,
}

impl OptimizationReport {
    /// Assemble a report, rejecting it unless every configured dimension has
    /// both an observed utilization and a proposal
    pub fn assemble(
        cluster: impl Into<String>,
        service: impl Into<String>,
        desired_percentage: DesiredPercentage,
        current_def: ResourceDefinition,
        utilization: BTreeMap<ResourceDimension, f64>,
        proposal: BTreeMap<ResourceDimension, u64>,
    ) -> Result<Self> {
        for dimension in desired_percentage.dimensions() {
            if !utilization.contains_key(&dimension) {
                return Err(OptimizerError::Configuration(format!(
                    "report is missing {} utilization",
                    dimension
                )));
            }
            if !proposal.contains_key(&dimension) {
                return Err(OptimizerError::Configuration(format!(
                    "report is missing {} proposal",
                    dimension
                )));
            }
        }

        Ok(Self {
            cluster: cluster.into(),
            service: service.into(),
            desired_percentage,
            current_def,
            utilization,
            proposal,
        })
    }
}

/// Reject cluster and service names that are empty or only whitespace
pub fn validate_identifiers(cluster: &str, service: &str) -> Result<()> {
    if cluster.trim().is_empty() {
        return Err(OptimizerError::Configuration(
            "cluster must not be empty".to_string(),
        ));
    }
    if service.trim().is_empty() {
        return Err(OptimizerError::Configuration(
            "service must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_desired_percentage() {
        let desired = DesiredPercentage::default();
        assert_eq!(desired.get(ResourceDimension::Cpu), Some(80.0));
        assert_eq!(desired.get(ResourceDimension::Memory), Some(80.0));
        assert!(desired.validate().is_ok());
    }

    #[test]
    fn test_dimensions_in_collection_order() {
        let desired = DesiredPercentage::empty()
            .with_target(ResourceDimension::Memory, 70.0)
            .with_target(ResourceDimension::Cpu, 60.0);
        let dims: Vec<_> = desired.dimensions().collect();
        assert_eq!(dims, vec![ResourceDimension::Cpu, ResourceDimension::Memory]);
    }

    #[test]
    fn test_zero_desired_percentage_rejected() {
        let desired = DesiredPercentage::new(80.0, 0.0);
        assert!(matches!(
            desired.validate(),
            Err(OptimizerError::Configuration(_))
        ));
    }

    #[test]
    fn test_non_finite_desired_percentage_rejected() {
        assert!(DesiredPercentage::new(f64::NAN, 80.0).validate().is_err());
        assert!(DesiredPercentage::new(-10.0, 80.0).validate().is_err());
        assert!(DesiredPercentage::empty().validate().is_err());
    }

    #[test]
    fn test_blank_identifiers_rejected() {
        assert!(validate_identifiers("test-cluster", "test-service").is_ok());
        let blanks = [("", "svc"), (" \t", "svc"), ("cluster", ""), ("cluster", "  ")];
        for (cluster, service) in blanks {
            assert!(matches!(
                validate_identifiers(cluster, service),
                Err(OptimizerError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_definition_value_by_dimension() {
        let def = ResourceDefinition::new(512, 2048, 1024);
        assert_eq!(def.value(ResourceDimension::Cpu), 512);
        assert_eq!(def.value(ResourceDimension::Memory), 2048);
    }

    #[test]
    fn test_assemble_rejects_missing_dimension() {
        let utilization = BTreeMap::from([(ResourceDimension::Cpu, 50.0)]);
        let proposal = BTreeMap::from([(ResourceDimension::Cpu, 320)]);

        let result = OptimizationReport::assemble(
            "c",
            "s",
            DesiredPercentage::default(),
            ResourceDefinition::new(512, 2048, 1024),
            utilization,
            proposal,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_report_json_layout() {
        let report = OptimizationReport::assemble(
            "test-cluster",
            "test-service",
            DesiredPercentage::default(),
            ResourceDefinition::new(512, 2048, 1024),
            BTreeMap::from([
                (ResourceDimension::Cpu, 49.5),
                (ResourceDimension::Memory, 102.25),
            ]),
            BTreeMap::from([
                (ResourceDimension::Cpu, 318),
                (ResourceDimension::Memory, 2621),
            ]),
        )
        .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cluster"], "test-cluster");
        assert_eq!(json["service"], "test-service");
        assert_eq!(json["desiredPercentage"]["cpu"], 80.0);
        assert_eq!(json["currentDef"]["cpu"], 512);
        assert_eq!(json["currentDef"]["memory"], 2048);
        assert_eq!(json["currentDef"]["reservedMemory"], 1024);
        assert_eq!(json["utilization"]["memory"], 102.25);
        assert_eq!(json["proposal"]["cpu"], 318);
        assert_eq!(json["proposal"]["memory"], 2621);

        let parsed: OptimizationReport = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, report);
    }
}
