use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};
use thiserror::Error;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration file: {0}")]
    Parse(String),
    #[error("unsupported configuration format, use 'yaml', 'yml' or 'json'")]
    UnsupportedFormat,
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime profile selecting baseline defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Dev,
    Test,
    Prod,
}

/// Output format for log events.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// HTTP server settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    /// Port the HTTP listener binds to.
    pub port: u16,
    /// Header carrying the per-request correlation id.
    pub request_id_header: String,
}

/// Chat room settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoomConfig {
    /// Seconds a long-poll waiter may sit idle before the sweeper
    /// force-completes it with an empty result.
    pub idle_limit_secs: u64,
    /// Maximum length of a participant name.
    pub name_max_chars: usize,
    /// Maximum length of a single chat message.
    pub message_max_chars: usize,
}

/// Logging settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggingConfig {
    /// Default tracing level directive (e.g. "info", "debug").
    pub level: String,
    /// Event output format.
    pub format: LogFormat,
}

/// The main configuration structure for the parlor server.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub profile: Profile,
    pub server: ServerConfig,
    pub room: RoomConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Baseline configuration for the given profile.
    #[must_use]
    pub fn default_for_profile(profile: Profile) -> Self {
        let (port, idle_limit_secs, level) = match profile {
            Profile::Dev => (8080, 30, "debug"),
            Profile::Test => (0, 2, "warn"),
            Profile::Prod => (8080, 30, "info"),
        };

        Self {
            profile,
            server: ServerConfig {
                port,
                request_id_header: "x-request-id".to_string(),
            },
            room: RoomConfig {
                idle_limit_secs,
                name_max_chars: 16,
                message_max_chars: 1024,
            },
            logging: LoggingConfig {
                level: level.to_string(),
                format: LogFormat::Text,
            },
        }
    }

    /// Loads the configuration from a file, environment variables, or
    /// defaults, in that order of precedence (later layers win).
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a YAML or JSON configuration file.
    /// * `port_override` - Optional port number from the command line.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, or
    /// if the resolved configuration fails validation.
    pub fn load(
        config_path: Option<PathBuf>,
        port_override: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => serde_yml::from_str(&content)
                    .map_err(|err| ConfigError::Parse(err.to_string()))?,
                Some("json") => serde_json::from_str(&content)
                    .map_err(|err| ConfigError::Parse(err.to_string()))?,
                _ => return Err(ConfigError::UnsupportedFormat),
            }
        } else {
            Config::default_for_profile(Profile::Dev)
        };

        config.apply_env_overrides()?;

        if let Some(port) = port_override {
            config.server.port = port;
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = env::var("PARLOR_SERVER_PORT") {
            self.server.port = port.parse().map_err(|_| {
                ConfigError::Invalid("PARLOR_SERVER_PORT must be a number between 0 and 65535".into())
            })?;
        }
        if let Ok(level) = env::var("PARLOR_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("PARLOR_LOG_FORMAT") {
            self.logging.format = match format.as_str() {
                "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "PARLOR_LOG_FORMAT must be 'text' or 'json', got '{other}'"
                    )));
                }
            };
        }
        if let Ok(limit) = env::var("PARLOR_IDLE_LIMIT_SECS") {
            self.room.idle_limit_secs = limit.parse().map_err(|_| {
                ConfigError::Invalid("PARLOR_IDLE_LIMIT_SECS must be a positive number".into())
            })?;
        }
        Ok(())
    }

    /// Validates the resolved configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room.idle_limit_secs < 2 {
            return Err(ConfigError::Invalid(
                "room.idle_limit_secs must be at least 2 so the sweep period is non-zero".into(),
            ));
        }
        if self.room.name_max_chars == 0 {
            return Err(ConfigError::Invalid(
                "room.name_max_chars must be greater than 0".into(),
            ));
        }
        if self.room.message_max_chars == 0 {
            return Err(ConfigError::Invalid(
                "room.message_max_chars must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
