//! Configuration management for the CLI
//!
//! Settings are layered once at startup, lowest precedence first: built-in
//! defaults, the JSON config file, `ECS_OPTIMIZER_*` environment variables,
//! then command-line flags. The result is an immutable [`RunConfig`].

use anyhow::{Context, Result};
use config::{Environment, File, FileFormat};
use optimizer_lib::aws::{AwsCliConfig, DEFAULT_QUERY_TIMEOUT, DEFAULT_REGION};
use optimizer_lib::{DesiredPercentage, DEFAULT_DESIRED_PERCENTAGE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables read as settings
pub const ENV_PREFIX: &str = "ECS_OPTIMIZER";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings after all layers are merged
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
    pub cpu_desired_percentage: f64,
    pub memory_desired_percentage: f64,
    pub aws_cli_path: PathBuf,
    pub query_timeout_secs: u64,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub cpu_desired_percentage: Option<f64>,
    pub memory_desired_percentage: Option<f64>,
}

impl Settings {
    /// Load settings from the config file, the process environment and flags
    ///
    /// An explicitly given config file must exist; the default one is optional.
    pub fn load(config_file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        match config_file {
            Some(path) => Self::load_from(Some((path, true)), None, overrides),
            None => {
                let default_path = default_config_path().ok();
                Self::load_from(default_path.as_deref().map(|p| (p, false)), None, overrides)
            }
        }
    }

    /// Load settings from explicit sources
    ///
    /// `env` replaces the process environment when given.
    pub fn load_from(
        config_file: Option<(&Path, bool)>,
        env: Option<config::Map<String, String>>,
        overrides: &Overrides,
    ) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("region", DEFAULT_REGION)?
            .set_default("cpu_desired_percentage", DEFAULT_DESIRED_PERCENTAGE)?
            .set_default("memory_desired_percentage", DEFAULT_DESIRED_PERCENTAGE)?
            .set_default("aws_cli_path", "aws")?
            .set_default("query_timeout_secs", DEFAULT_QUERY_TIMEOUT.as_secs() as i64)?
            .set_default("log_format", "text")?;

        if let Some((path, required)) = config_file {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Json)
                    .required(required),
            );
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .set_override_option("region", overrides.region.clone())?
            .set_override_option("profile", overrides.profile.clone())?
            .set_override_option("cpu_desired_percentage", overrides.cpu_desired_percentage)?
            .set_override_option(
                "memory_desired_percentage",
                overrides.memory_desired_percentage,
            )?
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Failed to parse configuration")?;

        Ok(settings)
    }

    /// Freeze the settings for one run
    pub fn into_run_config(self, cluster: String, service: String) -> RunConfig {
        let profile = self.profile.filter(|p| !p.trim().is_empty());

        RunConfig {
            cluster,
            service,
            desired: DesiredPercentage::new(
                self.cpu_desired_percentage,
                self.memory_desired_percentage,
            ),
            aws: AwsCliConfig {
                program: self.aws_cli_path,
                region: self.region,
                profile,
                timeout: Duration::from_secs(self.query_timeout_secs),
            },
            log_format: self.log_format,
        }
    }
}

/// Everything one run needs, built once
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cluster: String,
    pub service: String,
    pub desired: DesiredPercentage,
    pub aws: AwsCliConfig,
    pub log_format: LogFormat,
}

/// Get the default configuration file path
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("ecs-optimizer").join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimizer_lib::ResourceDimension;
    use tempfile::TempDir;

    fn no_env() -> Option<config::Map<String, String>> {
        Some(config::Map::new())
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_from(None, no_env(), &Overrides::default()).unwrap();

        assert_eq!(settings.region, "ap-northeast-1");
        assert_eq!(settings.profile, None);
        assert_eq!(settings.cpu_desired_percentage, 80.0);
        assert_eq!(settings.memory_desired_percentage, 80.0);
        assert_eq!(settings.aws_cli_path, PathBuf::from("aws"));
        assert_eq!(settings.query_timeout_secs, 30);
        assert_eq!(settings.log_format, LogFormat::Text);
    }

    #[test]
    fn test_layer_precedence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "region": "us-east-1",
                "profile": "from-file",
                "cpu_desired_percentage": 60,
                "memory_desired_percentage": 65,
                "query_timeout_secs": 5,
                "log_format": "json"
            }"#,
        )
        .unwrap();

        let env = config::Map::from([
            ("ECS_OPTIMIZER_REGION".to_string(), "eu-central-1".to_string()),
            (
                "ECS_OPTIMIZER_MEMORY_DESIRED_PERCENTAGE".to_string(),
                "70".to_string(),
            ),
        ]);
        let overrides = Overrides {
            cpu_desired_percentage: Some(90.0),
            ..Overrides::default()
        };

        let settings = Settings::load_from(Some((&path, true)), Some(env), &overrides).unwrap();

        assert_eq!(settings.region, "eu-central-1");
        assert_eq!(settings.profile.as_deref(), Some("from-file"));
        assert_eq!(settings.cpu_desired_percentage, 90.0);
        assert_eq!(settings.memory_desired_percentage, 70.0);
        assert_eq!(settings.query_timeout_secs, 5);
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_required_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");

        let result = Settings::load_from(Some((&path, true)), no_env(), &Overrides::default());
        assert!(result.is_err());

        let result = Settings::load_from(Some((&path, false)), no_env(), &Overrides::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_run_config() {
        let overrides = Overrides {
            region: Some("us-west-2".to_string()),
            profile: Some("  ".to_string()),
            memory_desired_percentage: Some(75.0),
            ..Overrides::default()
        };
        let settings = Settings::load_from(None, no_env(), &overrides).unwrap();
        let run = settings.into_run_config("test-cluster".to_string(), "test-service".to_string());

        assert_eq!(run.cluster, "test-cluster");
        assert_eq!(run.service, "test-service");
        assert_eq!(run.desired.get(ResourceDimension::Cpu), Some(80.0));
        assert_eq!(run.desired.get(ResourceDimension::Memory), Some(75.0));
        assert_eq!(run.aws.region, "us-west-2");
        assert_eq!(run.aws.profile, None);
        assert_eq!(run.aws.timeout, Duration::from_secs(30));
    }
}
