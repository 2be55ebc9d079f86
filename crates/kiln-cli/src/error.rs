//! Error handling for the kiln CLI.
//!
//! `CliError` is what commands return. Domain errors (`ConfigError` from
//! kiln-config, `BuildError`, `PreconditionError`) convert into it via
//! `#[from]`. Every fatal variant ends with a hint where there is something
//! the user can do about it.
//!
//! Malformed proxy rules are the one recoverable configuration error; they
//! are logged by the dev server and never surface here.
//!
//! # Example
//!
//! ```rust,no_run
//! use kiln_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_index(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path).with_path(path)
//! }
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

mod report;

pub use kiln_config::ConfigError;
pub use report::{build_error_to_miette, cli_error_to_miette};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tool versions do not satisfy `engines`
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("Failed to clean {}: {source}\n\nHint: Check that nothing else holds files open in the output directory", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Failed to listen on {addr}: {source}\n\nHint: Another process may be using this port. Set PORT or dev.port to pick a different one")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

/// Every `engines` requirement the installed tools violate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Installed tools do not satisfy package.json engines:\n\n{}\n\nHint: Update the tools listed above", format_violations(.violations))]
pub struct PreconditionError {
    pub violations: Vec<VersionViolation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionViolation {
    pub tool: String,
    pub current: String,
    pub required: String,
}

fn format_violations(violations: &[VersionViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("  {}: {} should be {}", v.tool, v.current, v.required))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Compilation failed with {} error(s):\n\n{}", .errors.len(), .errors.join("\n\n"))]
    Compile { errors: Vec<String> },

    #[error("No bundler program configured\n\nHint: Set [bundler] program in kiln.toml (or \"kiln\".\"bundler\" in package.json)")]
    BundlerNotConfigured,

    #[error("Failed to write asset: {0}\n\nHint: Check output directory permissions")]
    AssetWriteFailed(String),

    #[error("Plugin '{plugin}' failed: {message}")]
    PluginFailed { plugin: String, message: String },

    #[error("{0}")]
    Custom(String),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into `FileNotFound(path)`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            match err {
                CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                    CliError::FileNotFound(path.as_ref().to_path_buf())
                }
                other => other,
            }
        })
    }

    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_lists_every_violation() {
        let err = PreconditionError {
            violations: vec![
                VersionViolation {
                    tool: "node".to_string(),
                    current: "8.0.0".to_string(),
                    required: ">=10.0.0".to_string(),
                },
                VersionViolation {
                    tool: "npm".to_string(),
                    current: "3.10.0".to_string(),
                    required: ">=6.0.0".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("node: 8.0.0 should be >=10.0.0"));
        assert!(msg.contains("npm: 3.10.0 should be >=6.0.0"));
    }

    #[test]
    fn test_compile_error_counts() {
        let err = BuildError::Compile {
            errors: vec!["a.js: unexpected token".into(), "b.vue: missing </template>".into()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Compilation failed with 2 error(s)"));
        assert!(msg.contains("b.vue"));
    }

    #[test]
    fn test_listen_error_has_hint() {
        let err = CliError::Listen {
            addr: "127.0.0.1:8080".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:8080"));
        assert!(msg.contains("Hint:"));
    }

    #[test]
    fn test_cli_error_from_config_error() {
        let cli_err: CliError = ConfigError::UnknownEnvironment("staging".into()).into();
        assert!(matches!(cli_err, CliError::Config(_)));
    }

    #[test]
    fn test_result_ext_with_path() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        let err = result.with_path("/test/path.txt").unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(_)));
    }

    #[test]
    fn test_result_ext_with_hint() {
        let result: std::result::Result<(), BuildError> = Err(BuildError::BundlerNotConfigured);
        let err = result.with_hint("Try kiln.toml").unwrap_err();
        assert!(err.to_string().contains("Hint: Try kiln.toml"));
    }

    #[test]
    fn test_result_ext_context() {
        let result: std::result::Result<(), BuildError> =
            Err(BuildError::Custom("boom".to_string()));
        let err = result.context("Failed to emit").unwrap_err();
        assert_eq!(err.to_string(), "Failed to emit: Build error: boom");
    }
}
