//! Command-line front end for the `doclib` engine.
//!
//! The binary resolves a [`DocLibConfig`](doclib_core::DocLibConfig) from the
//! usual sources, applies command-line overrides, builds one
//! [`DocService`](doclib_service::DocService) and prints the result of the
//! requested operation as JSON on stdout. Logs go to stderr.

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::{Cli, Commands};
