//! Configuration error types

use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Range validation error
    #[error("Invalid value for '{field}': {value}. {hint}")]
    Range {
        field: String,
        value: String,
        hint: String,
    },

    /// A component needs a section that was not configured
    #[error("Missing configuration: {what}. Set {env} or add it to the config file.")]
    Missing { what: String, env: String },

    /// Missing version field in YAML
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// Environment variable holds an unparsable value
    #[error("Environment variable {var}={value} is not valid: {reason}")]
    Env {
        var: String,
        value: String,
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn missing(what: impl Into<String>, env: impl Into<String>) -> Self {
        ConfigError::Missing {
            what: what.into(),
            env: env.into(),
        }
    }

    pub fn range(field: &str, value: impl ToString, hint: impl Into<String>) -> Self {
        ConfigError::Range {
            field: field.to_string(),
            value: value.to_string(),
            hint: hint.into(),
        }
    }
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;
