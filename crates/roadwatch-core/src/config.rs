//! Configuration loading and typed config structures for Roadwatch.
//!
//! The configuration lives in `roadwatch-config.yaml` in the working
//! directory. Every field has a default, so a missing file or an empty
//! document yields a runnable single-instance setup: in-memory persistence,
//! the in-process message bus, and the HTTP API on port 8484.

use std::path::Path;

use serde::Deserialize;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "roadwatch-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override carried an unusable value.
    #[error("environment variable {var} has invalid value {value:?}")]
    InvalidEnv {
        /// The variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level service configuration.
///
/// Mirrors the structure of `roadwatch-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Instance identity.
    #[serde(default)]
    pub service: InstanceConfig,

    /// Where the road network is seeded from.
    #[serde(default)]
    pub seed: SeedConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Message bus subjects and timeouts.
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// HTTP API binding.
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist. Environment overrides are applied afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if an existing file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::InvalidEnv`] for a malformed override.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_yml::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides looked up through `lookup`.
    ///
    /// Recognised keys: `NATS_URL`, `DATABASE_URL`, `ROADWATCH_SEED_FILE`,
    /// `ROADWATCH_API_PORT`, `ROADWATCH_INSTANCE_ID`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] if the port override is not a
    /// valid port number.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("NATS_URL") {
            self.infrastructure.nats_url = val;
        }
        if let Some(val) = lookup("DATABASE_URL") {
            self.infrastructure.postgres_url = val;
        }
        if let Some(val) = lookup("ROADWATCH_SEED_FILE") {
            self.seed.file = val;
        }
        if let Some(val) = lookup("ROADWATCH_INSTANCE_ID") {
            self.service.instance_id = val;
        }
        if let Some(val) = lookup("ROADWATCH_API_PORT") {
            self.api.port = val.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidEnv {
                    var: "ROADWATCH_API_PORT",
                    value: format!("{val} ({e})"),
                }
            })?;
        }
        Ok(())
    }
}

/// Instance identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceConfig {
    /// Name this replica logs under.
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            instance_id: default_instance_id(),
        }
    }
}

/// Seed source for the road network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    /// Path of the seed file. Empty starts with an empty network.
    #[serde(default)]
    pub file: String,
}

impl SeedConfig {
    /// The seed path, if one is configured.
    pub fn path(&self) -> Option<&Path> {
        let trimmed = self.file.trim();
        (!trimmed.is_empty()).then(|| Path::new(trimmed))
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// `PostgreSQL` connection string. Empty selects in-memory persistence.
    #[serde(default)]
    pub postgres_url: String,

    /// Maximum `PostgreSQL` pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// NATS messaging URL. Empty selects the in-process bus.
    #[serde(default)]
    pub nats_url: String,
}

impl InfrastructureConfig {
    /// The database URL, if one is configured.
    pub fn postgres_url(&self) -> Option<&str> {
        non_empty(&self.postgres_url)
    }

    /// The NATS URL, if one is configured.
    pub fn nats_url(&self) -> Option<&str> {
        non_empty(&self.nats_url)
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            postgres_url: String::new(),
            max_connections: default_max_connections(),
            nats_url: String::new(),
        }
    }
}

/// Message bus subjects and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagingConfig {
    /// Subject commands are sent to.
    #[serde(default = "default_command_subject")]
    pub command_subject: String,

    /// Subject events are broadcast on.
    #[serde(default = "default_event_subject")]
    pub event_subject: String,

    /// Queue group command handlers join, so one replica handles each command.
    #[serde(default = "default_queue_group")]
    pub queue_group: String,

    /// How long a command waits for its reply.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            command_subject: default_command_subject(),
            event_subject: default_event_subject(),
            queue_group: default_queue_group(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// HTTP API binding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind.
    #[serde(default = "default_api_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn default_instance_id() -> String {
    "roadwatch".to_owned()
}

const fn default_max_connections() -> u32 {
    10
}

fn default_command_subject() -> String {
    "roadwatch.commands.surface".to_owned()
}

fn default_event_subject() -> String {
    "roadwatch.events.surface".to_owned()
}

fn default_queue_group() -> String {
    "roadwatch".to_owned()
}

const fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_api_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_api_port() -> u16 {
    8484
}

fn default_log_level() -> String {
    "info".to_owned()
}
