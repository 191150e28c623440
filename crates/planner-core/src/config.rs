use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable consulted when no token is stored in the config file.
pub const TOKEN_ENV_VAR: &str = "HA_TOKEN";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// How events are obtained for each configured calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Ask the Home Assistant calendar API for each entity.
    #[default]
    Remote,
    /// Read events embedded in already-resident entity state.
    Local,
}

/// What happens when one calendar cannot be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and carry on with the remaining calendars.
    #[default]
    BestEffort,
    /// Surface the first failure and abandon the rest of the query.
    FailFast,
}

/// Ordering of the aggregated event list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EventOrdering {
    /// Calendars in configured order, each calendar's events as received.
    #[default]
    Unordered,
    /// Ascending by start marker.
    Chronological,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Home Assistant connection settings
    pub home_assistant: HomeAssistantConfig,

    /// Calendar card settings
    #[serde(default)]
    pub card: CardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeAssistantConfig {
    /// Base URL of the Home Assistant instance
    pub base_url: String,

    /// Long-lived access token (falls back to `HA_TOKEN`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://homeassistant.local:8123".to_string(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HomeAssistantConfig {
    /// Token from the config file, else from the environment.
    pub fn access_token(&self) -> Option<String> {
        self.token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardConfig {
    /// Calendar entity ids shown on the card
    #[serde(default)]
    pub entities: Vec<String>,

    #[serde(default)]
    pub strategy: RetrievalStrategy,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub ordering: EventOrdering,

    /// Title used for events that carry none
    #[serde(default = "default_placeholder_title")]
    pub placeholder_title: String,
}

fn default_placeholder_title() -> String {
    "(no title)".to_string()
}

impl Default for CardConfig {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            strategy: RetrievalStrategy::default(),
            failure_policy: FailurePolicy::default(),
            ordering: EventOrdering::default(),
            placeholder_title: default_placeholder_title(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            home_assistant: HomeAssistantConfig::default(),
            card: CardConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors abort the load with [`ConfigError::Invalid`].
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(
            &self.home_assistant.base_url,
            "home_assistant.base_url",
            &mut result,
        );

        if self.home_assistant.timeout_secs == 0 {
            result.add_error(
                "home_assistant.timeout_secs",
                "Timeout must be greater than 0",
            );
        }

        if self.home_assistant.access_token().is_none()
            && self.card.strategy == RetrievalStrategy::Remote
        {
            result.add_warning(
                "home_assistant.token",
                format!("No access token configured and {TOKEN_ENV_VAR} is not set"),
            );
        }

        if self.card.entities.is_empty() {
            result.add_warning("card.entities", "No calendars configured - card will be empty");
        }

        for entity in &self.card.entities {
            if !entity.starts_with("calendar.") {
                result.add_warning(
                    "card.entities",
                    format!("'{entity}' is not a calendar entity"),
                );
            }
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("planner-calendar");

        Ok(config_dir.join("config.toml"))
    }
}
