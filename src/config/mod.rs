/// Configuration management for rumbo
use crate::balance::SelectionPolicy;
use crate::endpoint::EndpointConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main rumbo configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Primary endpoint; every write and every failover lands here
    pub primary: EndpointConfig,
    /// Read replicas registered at startup
    #[serde(default)]
    pub replicas: Vec<EndpointConfig>,
    /// Health monitor configuration
    #[serde(default)]
    pub health: HealthConfig,
    /// Routing configuration
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Health monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Global probe tick interval in milliseconds
    pub interval_ms: u64,
    /// Per-probe timeout in milliseconds
    pub probe_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            probe_timeout_ms: 5_000,
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Replica selection policy
    pub policy: SelectionPolicy,
    /// Replica attempts per read before fallback
    pub max_retries: u32,
    /// Whether exhausted reads fall back to the primary
    pub fallback_to_primary: bool,
    /// Per-operation timeout in milliseconds
    pub operation_timeout_ms: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            policy: SelectionPolicy::default(),
            max_retries: 2,
            fallback_to_primary: true,
            operation_timeout_ms: 10_000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, text)
    pub format: String,
    /// Log to stdout
    pub stdout: bool,
    /// Log file path (optional)
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            stdout: true,
            file: None,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primary: EndpointConfig::new("postgres://127.0.0.1:5432/app", "local"),
            replicas: Vec::new(),
            health: HealthConfig::default(),
            routing: RoutingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let settings: Settings =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.primary.validate()?;
        for replica in &self.replicas {
            replica.validate()?;
        }

        if self.health.interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "health interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.health.probe_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "health probe_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.health.probe_timeout_ms >= self.health.interval_ms {
            return Err(ConfigError::ValidationError(
                "health probe_timeout_ms must be less than interval_ms".to_string(),
            ));
        }

        if self.routing.operation_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "routing operation_timeout_ms must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Create example configuration file
    pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
        let mut near = EndpointConfig::new("postgres://10.0.1.11:5432/app", "us-east-1");
        near.priority = 0;
        let mut far = EndpointConfig::new("postgres://10.1.1.11:5432/app", "eu-west-1");
        far.priority = 1;

        let settings = Settings {
            primary: EndpointConfig::new("postgres://10.0.1.10:5432/app", "us-east-1"),
            replicas: vec![near, far],
            ..Default::default()
        };

        settings.save_to_file(path)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
