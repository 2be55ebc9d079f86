//! The environment switch that selects which overlay a descriptor gets.
//!
//! Everything downstream takes an `Environment` by value instead of reading
//! `NODE_ENV` on its own.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the process variable that carries the environment.
pub const NODE_ENV: &str = "NODE_ENV";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Debug builds are everything except production.
    pub fn is_debug(self) -> bool {
        !matches!(self, Environment::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Testing => "testing",
        }
    }

    /// Read `NODE_ENV`, falling back to `default` when unset or empty.
    pub fn from_env_or(default: Environment) -> Result<Self, ConfigError> {
        match std::env::var(NODE_ENV) {
            Ok(value) if !value.trim().is_empty() => value.parse(),
            _ => Ok(default),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Settings files store the value JSON-quoted ("\"production\"")
        match s.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "testing" | "test" => Ok(Environment::Testing),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn parses_quoted_and_short_forms() {
        assert_eq!(
            "\"production\"".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert_eq!("test".parse::<Environment>().unwrap(), Environment::Testing);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn only_production_is_not_debug() {
        assert!(Environment::Development.is_debug());
        assert!(Environment::Testing.is_debug());
        assert!(!Environment::Production.is_debug());
    }

    #[test]
    #[serial]
    fn from_env_uses_default_when_unset() {
        std::env::remove_var(NODE_ENV);
        assert_eq!(
            Environment::from_env_or(Environment::Testing).unwrap(),
            Environment::Testing
        );

        std::env::set_var(NODE_ENV, "production");
        assert_eq!(
            Environment::from_env_or(Environment::Development).unwrap(),
            Environment::Production
        );
        std::env::remove_var(NODE_ENV);
    }
}
