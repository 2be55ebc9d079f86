//! kiln CLI - dev server and production builds for front-end asset pipelines.
//!
//! Descriptor composition lives in `kiln-config`; this crate runs the
//! descriptors.
//!
//! - [`dev`] - development server: in-memory bundle, hot reload, API proxy
//! - [`build`] - production builds and post-emit plugins
//! - [`bundler`] - the seam to the external bundler program
//! - [`version`] - `engines` checks against installed tools
//! - [`error`] - error types and miette conversion
//! - [`logger`] - tracing setup
//! - [`ui`] - terminal output
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kiln_cli::{build::BuildRunner, bundler::ProcessBundler, error::Result};
//!
//! async fn release(root: &std::path::Path) -> Result<()> {
//!     let project = kiln_config::discover(root)?;
//!     let bundler = ProcessBundler::from_settings(&project.bundler, root)?;
//!     let report = BuildRunner::new(project, root, Arc::new(bundler)).run().await?;
//!     println!("{} assets", report.assets.len());
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod bundler;
pub mod cli;
pub mod commands;
pub mod dev;
pub mod error;
pub mod logger;
pub mod ui;
pub mod version;

pub use error::{BuildError, CliError, ConfigError, Result, ResultExt};
