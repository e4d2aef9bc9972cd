//! Recommendation engine
//!
//! Runs are linear: validate inputs, load the current definition, collect
//! utilization for each configured dimension (CPU first, then memory),
//! compute proposals and assemble the report. The first failure aborts the
//! run and no partial report is produced. The engine never retries.

use crate::definition::DefinitionSource;
use crate::error::{OptimizerError, Result, RunError, RunStage};
use crate::metrics::{MetricsAverager, UtilizationSource};
use crate::models::{
    validate_identifiers, DesiredPercentage, OptimizationReport, ResourceDefinition,
};
use crate::observability::{OptimizerMetrics, StructuredLogger};
use crate::proposal;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Produces an [`OptimizationReport`] for one service
pub struct RecommendationEngine {
    definitions: Arc<dyn DefinitionSource>,
    averager: MetricsAverager,
    metrics: Option<OptimizerMetrics>,
}

impl RecommendationEngine {
    pub fn new(
        definitions: Arc<dyn DefinitionSource>,
        utilization: Arc<dyn UtilizationSource>,
    ) -> Self {
        Self {
            definitions,
            averager: MetricsAverager::new(utilization),
            metrics: None,
        }
    }

    /// Record query latency, run outcomes and report values
    pub fn with_metrics(mut self, metrics: OptimizerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve the service's current resource definition
    pub async fn load_definition(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ResourceDefinition> {
        validate_identifiers(cluster, service)?;
        self.timed(
            "describe_definition",
            self.definitions.resolve_definition(cluster, service),
        )
        .await
    }

    /// Compute the report for `service` in `cluster`
    pub async fn run(
        &self,
        cluster: &str,
        service: &str,
        desired: &DesiredPercentage,
    ) -> std::result::Result<OptimizationReport, RunError> {
        let logger = StructuredLogger::new(cluster, service);
        let result = self.execute(cluster, service, desired, &logger).await;

        match &result {
            Ok(report) => {
                logger.log_run_completed(report);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_run("success");
                    metrics.record_report(report);
                }
            }
            Err(err) => {
                logger.log_run_failed(err);
                if let Some(metrics) = &self.metrics {
                    metrics.inc_run(err.error.code());
                }
            }
        }

        result
    }

    async fn execute(
        &self,
        cluster: &str,
        service: &str,
        desired: &DesiredPercentage,
        logger: &StructuredLogger,
    ) -> std::result::Result<OptimizationReport, RunError> {
        validate_identifiers(cluster, service)
            .and_then(|_| desired.validate())
            .map_err(|e| RunError::new(RunStage::Validate, e))?;
        logger.log_run_started(desired);

        let definition = self
            .load_definition(cluster, service)
            .await
            .map_err(|e| RunError::new(RunStage::LoadDefinition, e))?;
        logger.log_definition_loaded(&definition);

        let mut utilization = BTreeMap::new();
        for dimension in desired.dimensions() {
            let operation = format!("{}_utilization", dimension);
            let average = self
                .timed(&operation, self.averager.average(dimension, cluster, service))
                .await
                .map_err(|e| RunError::new(RunStage::CollectUtilization(dimension), e))?;
            logger.log_utilization(dimension, average);
            utilization.insert(dimension, average);
        }

        let mut proposal = BTreeMap::new();
        for (dimension, target) in desired.iter() {
            let stage = RunStage::Propose(dimension);
            let observed = utilization.get(&dimension).copied().ok_or_else(|| {
                RunError::new(
                    stage,
                    OptimizerError::Configuration(format!(
                        "no {} utilization collected",
                        dimension
                    )),
                )
            })?;
            let current = definition.value(dimension);
            let proposed = proposal::propose(current, observed, target)
                .map_err(|e| RunError::new(stage, e))?;
            logger.log_proposal(dimension, current, observed, target, proposed);
            proposal.insert(dimension, proposed);
        }

        OptimizationReport::assemble(
            cluster,
            service,
            desired.clone(),
            definition,
            utilization,
            proposal,
        )
        .map_err(|e| RunError::new(RunStage::AssembleReport, e))
    }

    async fn timed<T, F>(&self, operation: &str, query: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let result = query.await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_query_latency(operation, started.elapsed().as_secs_f64());
        }
        result
    }
}
