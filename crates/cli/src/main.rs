//! ECS Optimizer CLI
//!
//! Proposes CPU and memory allocations for an ECS service that would bring
//! its 30-day average utilization to a target percentage.

mod config;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use crate::config::{LogFormat, Overrides, Settings};
use optimizer_lib::{aws::AwsCliSource, OptimizerMetrics, RecommendationEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// ECS Optimizer CLI
#[derive(Parser)]
#[command(name = "ecs-optimizer")]
#[command(
    author,
    version,
    about = "Right-size CPU and memory of an ECS service",
    long_about = None
)]
pub struct Cli {
    /// ECS cluster name
    #[arg(long, short = 'c')]
    pub cluster: String,

    /// ECS service name
    #[arg(long, short = 's')]
    pub service: String,

    /// AWS region (default: ap-northeast-1)
    #[arg(long, short = 'r')]
    pub region: Option<String>,

    /// Named AWS profile whose settings and credentials are used
    #[arg(long, short = 'p')]
    pub profile: Option<String>,

    /// Desired percentage of CPU utilization (default: 80)
    #[arg(long, short = 'C')]
    pub cpu_desired_percentage: Option<f64>,

    /// Desired percentage of memory utilization (default: 80)
    #[arg(long, short = 'M')]
    pub memory_desired_percentage: Option<f64>,

    /// Output format
    #[arg(long, short, default_value = "json")]
    pub format: output::OutputFormat,

    /// Path to a JSON config file (default: ~/.config/ecs-optimizer/config.json)
    #[arg(long, env = "ECS_OPTIMIZER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write Prometheus metrics in text format to this file after the run
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the report, logs go to stderr
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn write_metrics(metrics: &OptimizerMetrics, path: &Path) -> Result<()> {
    let text = metrics.encode_text().context("Failed to encode metrics")?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = Overrides {
        region: cli.region.clone(),
        profile: cli.profile.clone(),
        cpu_desired_percentage: cli.cpu_desired_percentage,
        memory_desired_percentage: cli.memory_desired_percentage,
    };
    let settings = Settings::load(cli.config.as_deref(), &overrides)?;
    let run_config = settings.into_run_config(cli.cluster, cli.service);

    init_tracing(cli.verbose, run_config.log_format);
    debug!(config = ?run_config, "Configuration loaded");

    let source = Arc::new(AwsCliSource::new(run_config.aws.clone()));
    let metrics = OptimizerMetrics::new();
    let engine = RecommendationEngine::new(source.clone(), source).with_metrics(metrics.clone());

    let result = engine
        .run(&run_config.cluster, &run_config.service, &run_config.desired)
        .await;

    if let Some(path) = &cli.metrics_file {
        if let Err(e) = write_metrics(&metrics, path) {
            // a failed run reports its own error
            if result.is_ok() {
                return Err(e);
            }
            error!(error = %format!("{:#}", e), "Metrics file not written");
        }
    }

    let report = result?;
    output::print_report(&report, cli.format)?;

    Ok(())
}
