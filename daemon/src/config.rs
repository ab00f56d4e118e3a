use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use anyhow::{Context, Result};
use std::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,
}

fn default_socket_path() -> PathBuf { PathBuf::from(common::DEFAULT_SOCKET_PATH) }
fn default_max_request_bytes() -> usize { 64 * 1024 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            max_request_bytes: default_max_request_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
    pub output: Option<PathBuf>,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_min_lead_time")]
    pub min_lead_time_secs: i64,
    /// Zone used for previews when a request does not name one.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_max_fire_times")]
    pub max_fire_times: usize,
}

fn default_min_lead_time() -> i64 { common::scheduler::DEFAULT_MIN_LEAD_TIME_SECS }
fn default_timezone() -> String { common::DEFAULT_TIMEZONE.to_string() }
fn default_max_fire_times() -> usize { 100 }

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            min_lead_time_secs: default_min_lead_time(),
            default_timezone: default_timezone(),
            max_fire_times: default_max_fire_times(),
        }
    }
}

/// A class target the executor has registered and jobs may reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TargetConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl common::CronTarget for TargetConfig {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Detect file type by extension and load
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let config = match ext {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "toml" => Self::from_toml_file(path),
            _ => Err(anyhow::anyhow!("Unsupported config file format. Use .yaml, .yml, or .toml")),
        }?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduling.min_lead_time_secs < 0 {
            anyhow::bail!("scheduling.min_lead_time_secs must not be negative");
        }
        common::parse_timezone(&self.scheduling.default_timezone)
            .context("scheduling.default_timezone")?;
        self.logging.level.parse::<log::LevelFilter>()
            .with_context(|| format!("Invalid log level: {}", self.logging.level))?;
        Ok(())
    }

    /// Merge with another config, preferring values from other
    pub fn merge(&mut self, other: Config) {
        // Server settings
        self.server.socket_path = other.server.socket_path;
        self.server.max_request_bytes = other.server.max_request_bytes;

        // Logging settings
        self.logging.level = other.logging.level;
        self.logging.format = other.logging.format;
        if other.logging.output.is_some() {
            self.logging.output = other.logging.output;
        }

        // Scheduling settings
        self.scheduling = other.scheduling;

        // Targets - append, later declarations win by name
        for target in other.targets {
            self.targets.retain(|t| t.name != target.name);
            self.targets.push(target);
        }
    }
}
