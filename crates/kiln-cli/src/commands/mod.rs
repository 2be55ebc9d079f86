//! `kiln start` and `kiln build`.
//!
//! Each command lives in its own module with an `execute` function taking
//! the parsed arguments and the global options.

pub mod build;
pub mod start;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use start::execute as start_execute;
