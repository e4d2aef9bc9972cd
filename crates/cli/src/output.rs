//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use optimizer_lib::{OptimizationReport, ResourceDimension};
use tabled::{settings::Style, Table, Tabled};

/// Output format for the report
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Table format
    Table,
}

/// Row of the report table
#[derive(Tabled)]
struct DimensionRow {
    #[tabled(rename = "Resource")]
    dimension: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Utilization")]
    utilization: String,
    #[tabled(rename = "Proposed")]
    proposed: String,
    #[tabled(rename = "Change")]
    change: String,
}

/// Print the report to stdout
pub fn print_report(report: &OptimizationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Table => {
            print_info(&format!(
                "Service {} in cluster {}",
                report.service.as_str().bold(),
                report.cluster.as_str().bold()
            ));
            println!("{}", render_table(report));
            println!(
                "\nReserved memory: {} (not used for proposals)",
                format_allocation(ResourceDimension::Memory, report.current_def.reserved_memory)
            );
        }
    }
    Ok(())
}

/// Pretty-printed JSON of the report
pub fn render_json(report: &OptimizationReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Table with one row per dimension
pub fn render_table(report: &OptimizationReport) -> String {
    let rows: Vec<DimensionRow> = report
        .desired_percentage
        .iter()
        .map(|(dimension, target)| {
            let current = report.current_def.value(dimension);
            let proposed = report.proposal.get(&dimension).copied();
            DimensionRow {
                dimension: dimension.to_string(),
                target: format_percent(target),
                current: format_allocation(dimension, current),
                utilization: report
                    .utilization
                    .get(&dimension)
                    .map(|u| format_percent(*u))
                    .unwrap_or_default(),
                proposed: proposed
                    .map(|p| format_allocation(dimension, p as i64))
                    .unwrap_or_default(),
                change: proposed
                    .map(|p| color_change(current, p))
                    .unwrap_or_default(),
            }
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an allocation with its unit
pub fn format_allocation(dimension: ResourceDimension, value: i64) -> String {
    match dimension {
        ResourceDimension::Cpu => format!("{} units", value),
        ResourceDimension::Memory => format!("{} MiB", value),
    }
}

/// Format a percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Relative change from current to proposed, `None` when current is 0
pub fn change_percent(current: i64, proposed: u64) -> Option<f64> {
    if current <= 0 {
        return None;
    }
    Some((proposed as f64 - current as f64) / current as f64 * 100.0)
}

/// Color a change: shrinking is green, growing is yellow
pub fn color_change(current: i64, proposed: u64) -> String {
    match change_percent(current, proposed) {
        None => "n/a".to_string(),
        Some(change) => {
            let formatted = format!("{:+.1}%", change);
            if change < 0.0 {
                formatted.green().to_string()
            } else if change > 0.0 {
                formatted.yellow().to_string()
            } else {
                formatted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimizer_lib::{DesiredPercentage, ResourceDefinition};
    use std::collections::BTreeMap;

    fn report() -> OptimizationReport {
        OptimizationReport::assemble(
            "test-cluster",
            "test-service",
            DesiredPercentage::default(),
            ResourceDefinition::new(512, 2048, 1024),
            BTreeMap::from([
                (ResourceDimension::Cpu, 49.53529105870167),
                (ResourceDimension::Memory, 102.3319085080778),
            ]),
            BTreeMap::from([
                (ResourceDimension::Cpu, 318),
                (ResourceDimension::Memory, 2621),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn test_render_json_field_names() {
        let json = render_json(&report()).unwrap();
        for field in [
            "\"cluster\"",
            "\"service\"",
            "\"desiredPercentage\"",
            "\"currentDef\"",
            "\"reservedMemory\"",
            "\"utilization\"",
            "\"proposal\"",
        ] {
            assert!(json.contains(field), "missing {}", field);
        }
    }

    #[test]
    fn test_render_table_rows() {
        let table = render_table(&report());
        assert!(table.contains("cpu"));
        assert!(table.contains("memory"));
        assert!(table.contains("318 units"));
        assert!(table.contains("2621 MiB"));
        assert!(table.contains("49.5%"));
        assert!(table.contains("102.3%"));
    }

    #[test]
    fn test_change_percent() {
        assert_eq!(change_percent(0, 1), None);
        assert_eq!(change_percent(200, 100), Some(-50.0));
        assert_eq!(change_percent(100, 125), Some(25.0));
    }

    #[test]
    fn test_format_allocation() {
        assert_eq!(format_allocation(ResourceDimension::Cpu, 256), "256 units");
        assert_eq!(format_allocation(ResourceDimension::Memory, 512), "512 MiB");
    }
}
