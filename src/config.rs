use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PathsConfig {
    /// Directory holding `state.json` and `logs/`
    #[serde(default = "default_state_dir")]
    pub state: String,
}

fn default_state_dir() -> String {
    ".mission-control".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: default_state_dir(),
        }
    }
}

/// Status registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatusConfig {
    /// A health report older than this reads as "offline" (default: 180)
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Keys whose reads apply the staleness rule
    #[serde(default = "default_health_keys")]
    pub health_keys: Vec<String>,
}

fn default_stale_after() -> u64 {
    180 // 3 minutes
}

fn default_health_keys() -> Vec<String> {
    vec!["daemon_health".to_string()]
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after(),
            health_keys: default_health_keys(),
        }
    }
}

impl StatusConfig {
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.stale_after_secs).unwrap_or(i64::MAX))
    }
}

/// REST API server configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    crate::rest::DEFAULT_PORT
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

/// Health reporter configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HeartbeatConfig {
    /// Base URL of the mission control API
    #[serde(default = "default_heartbeat_url")]
    pub api_url: String,

    /// Status key to report under
    #[serde(default = "default_heartbeat_key")]
    pub key: String,

    /// Seconds between reports (default: 60)
    #[serde(default = "default_heartbeat_interval")]
    pub interval_secs: u64,

    /// Retries per report on transient failures (default: 3)
    #[serde(default = "default_heartbeat_retries")]
    pub max_retries: usize,
}

fn default_heartbeat_url() -> String {
    "http://127.0.0.1:7008".to_string()
}

fn default_heartbeat_key() -> String {
    "daemon_health".to_string()
}

fn default_heartbeat_interval() -> u64 {
    60 // 1 minute
}

fn default_heartbeat_retries() -> usize {
    3
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            api_url: default_heartbeat_url(),
            key: default_heartbeat_key(),
            interval_secs: default_heartbeat_interval(),
            max_retries: default_heartbeat_retries(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Workflow template seeding
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TemplatesConfig {
    /// Directory of `*.yaml|*.yml|*.json` template definitions created at
    /// server startup when their names are not taken yet
    #[serde(default)]
    pub dir: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether the server logs to a file (false = stderr)
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
        }
    }
}

impl Config {
    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".mission-control/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Embedded defaults so nothing needs a config file
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/mission-control/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("mission-control").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MISSION_CONTROL")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("status.health_keys")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .mission-control/config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = Self::project_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create mission control config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Path of the store snapshot
    pub fn store_path(&self) -> PathBuf {
        self.state_path().join("state.json")
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    /// Address the API server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
