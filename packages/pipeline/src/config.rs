//! Deployment configuration for a batch geocoding run.
//!
//! A default configuration is embedded at compile time from
//! `config/default.toml`; `--config <path>` replaces it with a user file.
//! The only value read from the process environment is the service API
//! key, looked up under the variable named by `service.api_key_env`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use geobatch_geocoder::google::GoogleConfig;
use geobatch_geocoder::resolver::RetryPolicy;
use geobatch_tabular::Dialect;
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The API key environment variable is unset or empty.
    #[error("Missing environment variable {var}")]
    MissingCredential {
        /// Name of the variable that was looked up.
        var: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`BatchConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds unusable values.
    #[error("Invalid config: {message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },
}

/// Complete configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Which input columns feed the query, hints, and restrictions.
    pub columns: ColumnConfig,
    /// Input/output file dialect.
    #[serde(default)]
    pub dialect: DialectConfig,
    /// Per-query retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Geocoding service connection settings.
    #[serde(default)]
    pub service: ServiceConfig,
}

/// Input column selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnConfig {
    /// Columns joined, in order, into the address query.
    pub address: Vec<String>,
    /// Columns whose values rank candidates against each other.
    #[serde(default)]
    pub locality: Vec<String>,
    /// Separator placed between address values.
    #[serde(default = "default_query_separator")]
    pub query_separator: String,
    /// Service restriction key mapped to the column supplying its value.
    #[serde(default)]
    pub component_restrictions: BTreeMap<String, String>,
}

/// Delimited-text dialect settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DialectConfig {
    /// Single ASCII field delimiter.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

/// Retry settings for transient service errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per query, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Seconds to wait before retrying an unclassified error.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

/// Google Geocoding API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Endpoint URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Optional region bias (ccTLD, e.g. `"ar"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Optional result language (e.g. `"es"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn default_query_separator() -> String {
    ",".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

const fn default_max_attempts() -> u32 {
    geobatch_geocoder::resolver::DEFAULT_MAX_ATTEMPTS
}

const fn default_delay_secs() -> u64 {
    geobatch_geocoder::resolver::DEFAULT_RETRY_DELAY.as_secs()
}

fn default_base_url() -> String {
    geobatch_geocoder::google::DEFAULT_BASE_URL.to_string()
}

const fn default_timeout_secs() -> u64 {
    geobatch_geocoder::google::DEFAULT_TIMEOUT.as_secs()
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

impl Default for DialectConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
            region: None,
            language: None,
        }
    }
}

impl BatchConfig {
    /// Returns the configuration embedded at compile time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded file fails to parse or
    /// validate.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG_TOML)
    }

    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise the embedded default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Self::embedded();
        };

        log::info!("Loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Serializes the effective configuration back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Invalid {
            message: format!("cannot serialize config: {e}"),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.columns.address.is_empty() {
            return Err(ConfigError::Invalid {
                message: "columns.address must name at least one column".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }
        if self.service.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "service.timeout_secs must be greater than 0".to_string(),
            });
        }
        if self.service.api_key_env.is_empty() {
            return Err(ConfigError::Invalid {
                message: "service.api_key_env must not be empty".to_string(),
            });
        }
        self.delimiter_byte().map(|_| ())
    }

    fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.dialect.delimiter.as_bytes() {
            [b] if b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r' => Ok(*b),
            _ => Err(ConfigError::Invalid {
                message: format!(
                    "dialect.delimiter must be a single ASCII character, got {:?}",
                    self.dialect.delimiter
                ),
            }),
        }
    }

    /// Dialect for both the input and output files.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        Dialect {
            delimiter: self.delimiter_byte().unwrap_or(b','),
        }
    }

    /// Retry policy for the resolver.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.delay_secs),
        )
    }

    /// Reads the API key through `lookup`, given the variable named by
    /// `service.api_key_env` (normally `std::env::var`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] if `lookup` yields nothing
    /// or an empty value.
    pub fn api_key_from(
        &self,
        lookup: impl FnOnce(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        let var = &self.service.api_key_env;
        match lookup(var) {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingCredential { var: var.clone() }),
        }
    }

    /// Google client settings using `api_key`.
    #[must_use]
    pub fn google_config(&self, api_key: String) -> GoogleConfig {
        GoogleConfig {
            base_url: self.service.base_url.clone(),
            api_key,
            timeout: Duration::from_secs(self.service.timeout_secs),
            region: self.service.region.clone(),
            language: self.service.language.clone(),
        }
    }
}
