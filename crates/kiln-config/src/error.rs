//! Error types for configuration loading and descriptor composition.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Settings file discovery and parsing
    #[error("settings file not found in {0}")]
    NotFound(PathBuf),

    #[error("invalid config value for '{field}'{}", hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default())]
    InvalidValue {
        field: String,
        hint: Option<String>,
    },

    #[error("unknown environment '{0}' (expected development, production or testing)")]
    UnknownEnvironment(String),

    // Descriptor composition
    #[error("overlay must be a mapping at the top level, found {found}")]
    OverlayNotMapping { found: &'static str },

    #[error("merged descriptor is invalid: {message}")]
    InvalidDescriptor { message: String },

    #[error("invalid rule pattern '{pattern}': {message}")]
    InvalidRulePattern { pattern: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single proxy table entry that could not be turned into a rule.
///
/// The dev server logs these and keeps going; they never abort startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("proxy rule '{context}' skipped: {reason}")]
pub struct ProxyConfigError {
    pub context: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_value_renders_hint() {
        let err = ConfigError::InvalidValue {
            field: "dev.port".to_string(),
            hint: Some("expected a number".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "invalid config value for 'dev.port': expected a number"
        );
    }

    #[test]
    fn invalid_value_without_hint() {
        let err = ConfigError::InvalidValue {
            field: "build".to_string(),
            hint: None,
        };
        assert_eq!(err.to_string(), "invalid config value for 'build'");
    }

    #[test]
    fn proxy_error_names_context() {
        let err = ProxyConfigError {
            context: "/api".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert!(err.to_string().contains("'/api'"));
    }
}
