//! Server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use eegstream_types::ChannelId;
use eegstream_types::signal::{A3_OFFSET, DEFAULT_OFFSET};

use crate::upload::TIMESTAMPS_KEY;

/// Server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server settings.
    pub server: ServerConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// Background producer settings.
    pub producer: ProducerConfig,
    /// Live query settings.
    pub live: LiveConfig,
    /// Upload band-pass filter settings.
    pub filter: FilterConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - Server bind address is valid (host:port format)
    /// - Storage path is not empty
    /// - Producer interval is within bounds and channels are unique
    /// - Live query limits are consistent
    /// - Filter band fits below the Nyquist frequency
    ///
    /// # Example
    ///
    /// ```
    /// use eegstream_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.server.validate());
        errors.extend(self.storage.validate());
        errors.extend(self.producer.validate());
        errors.extend(self.live.validate());
        errors.extend(self.filter.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:5000").
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.bind.is_empty() {
            errors.push(ValidationError::new(
                "server.bind",
                "bind address cannot be empty",
            ));
            return errors;
        }

        match self.bind.rsplit_once(':') {
            None => errors.push(ValidationError::new(
                "server.bind",
                format!(
                    "invalid bind address '{}': expected format 'host:port'",
                    self.bind
                ),
            )),
            Some((_, port)) => match port.parse::<u16>() {
                Ok(0) => errors.push(ValidationError::new("server.bind", "port cannot be 0")),
                Err(_) => errors.push(ValidationError::new(
                    "server.bind",
                    format!("invalid port '{}': must be a number 1-65535", port),
                )),
                Ok(_) => {}
            },
        }

        errors
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Optional SQL script executed when the database is opened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_script: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: eegstream_store::default_db_path(),
            schema_script: None,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }

        if let Some(script) = &self.schema_script
            && script.as_os_str().is_empty()
        {
            errors.push(ValidationError::new(
                "storage.schema_script",
                "schema script path cannot be empty (omit it instead)",
            ));
        }

        errors
    }
}

/// Minimum producer interval in milliseconds.
pub const MIN_INTERVAL_MS: u64 = 1;
/// Maximum producer interval in milliseconds (1 minute).
pub const MAX_INTERVAL_MS: u64 = 60_000;

/// Background producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Whether this process runs the producer at all.
    pub enabled: bool,
    /// Time between ticks in milliseconds.
    pub interval_ms: u64,
    /// Channels written on every tick.
    pub channels: Vec<ChannelConfig>,
    /// Offset for channels without an explicit one.
    pub default_offset: f64,
    /// Fixed RNG seed for reproducible runs; entropy when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Environment variable a process relauncher sets to `"true"` in the
    /// child that should run the producer. When absent every process is
    /// considered primary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_env: Option<String>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 50,
            channels: vec![
                ChannelConfig {
                    id: ChannelId::a3(),
                    offset: Some(A3_OFFSET),
                },
                ChannelConfig {
                    id: ChannelId::a4(),
                    offset: Some(DEFAULT_OFFSET),
                },
            ],
            default_offset: DEFAULT_OFFSET,
            seed: None,
            primary_env: None,
        }
    }
}

impl ProducerConfig {
    /// Tick interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Identifiers of the configured channels, in tick order.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channels.iter().map(|c| c.id.clone()).collect()
    }

    /// Validate producer configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval_ms < MIN_INTERVAL_MS {
            errors.push(ValidationError::new(
                "producer.interval_ms",
                format!(
                    "interval {} ms is too short (minimum {} ms)",
                    self.interval_ms, MIN_INTERVAL_MS
                ),
            ));
        } else if self.interval_ms > MAX_INTERVAL_MS {
            errors.push(ValidationError::new(
                "producer.interval_ms",
                format!(
                    "interval {} ms is too long (maximum {} ms)",
                    self.interval_ms, MAX_INTERVAL_MS
                ),
            ));
        }

        if self.channels.is_empty() {
            errors.push(ValidationError::new(
                "producer.channels",
                "at least one channel is required",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for (i, channel) in self.channels.iter().enumerate() {
            if !seen.insert(channel.id.as_str()) {
                errors.push(ValidationError::new(
                    format!("producer.channels[{}].id", i),
                    format!("duplicate channel '{}'", channel.id),
                ));
            }
            if channel.id.as_str() == TIMESTAMPS_KEY {
                errors.push(ValidationError::new(
                    format!("producer.channels[{}].id", i),
                    format!("'{}' is reserved for upload timestamps", TIMESTAMPS_KEY),
                ));
            }
            if let Some(offset) = channel.offset
                && !offset.is_finite()
            {
                errors.push(ValidationError::new(
                    format!("producer.channels[{}].offset", i),
                    "offset must be a finite number",
                ));
            }
        }

        if !self.default_offset.is_finite() {
            errors.push(ValidationError::new(
                "producer.default_offset",
                "offset must be a finite number",
            ));
        }

        if let Some(var) = &self.primary_env
            && var.is_empty()
        {
            errors.push(ValidationError::new(
                "producer.primary_env",
                "variable name cannot be empty (omit it instead)",
            ));
        }

        errors
    }
}

/// One channel written by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel identifier.
    pub id: ChannelId,
    /// Fixed offset added to every sample of this channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

/// Default page size of `/live`.
pub const DEFAULT_LIVE_LIMIT: u32 = 200;
/// Largest page size `/live` will return.
pub const MAX_LIVE_LIMIT: u32 = 1000;
/// Default number of samples returned by `/samples`.
pub const DEFAULT_SAMPLES_LIMIT: u32 = 100;

/// Live query configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Channel used when a request names none.
    pub default_channel: ChannelId,
    /// Page size used when a request gives none or an invalid one.
    pub default_limit: u32,
    /// Upper bound for the page size.
    pub max_limit: u32,
    /// Number of samples `/samples` returns when a request gives none.
    pub samples_limit: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            default_channel: ChannelId::a4(),
            default_limit: DEFAULT_LIVE_LIMIT,
            max_limit: MAX_LIVE_LIMIT,
            samples_limit: DEFAULT_SAMPLES_LIMIT,
        }
    }
}

impl LiveConfig {
    /// Validate live query configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.default_limit == 0 {
            errors.push(ValidationError::new(
                "live.default_limit",
                "default limit must be at least 1",
            ));
        }
        if self.default_limit > self.max_limit {
            errors.push(ValidationError::new(
                "live.default_limit",
                format!(
                    "default limit {} exceeds max limit {}",
                    self.default_limit, self.max_limit
                ),
            ));
        }
        if self.samples_limit == 0 || self.samples_limit > self.max_limit {
            errors.push(ValidationError::new(
                "live.samples_limit",
                format!("samples limit must be between 1 and {}", self.max_limit),
            ));
        }

        errors
    }
}

/// Band-pass filter configuration for `/upload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Lower cutoff in Hz.
    pub low_hz: f64,
    /// Upper cutoff in Hz.
    pub high_hz: f64,
    /// Assumed sample rate of uploaded recordings in Hz.
    pub sample_rate_hz: f64,
    /// Butterworth prototype order.
    pub order: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_hz: 1.0,
            high_hz: 30.0,
            sample_rate_hz: 100.0,
            order: 5,
        }
    }
}

impl FilterConfig {
    /// Validate filter configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        match eegstream_types::BandPassFilter::butterworth(
            self.low_hz,
            self.high_hz,
            self.sample_rate_hz,
            self.order,
        ) {
            Ok(_) => Vec::new(),
            Err(e) => vec![ValidationError::new("filter", e.to_string())],
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `server.bind` or `producer.channels[0].id`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eegstream")
        .join("server.toml")
}
