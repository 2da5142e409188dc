//! Core domain types, errors, and configuration for `doclib`.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum and `Result` alias shared by every crate.
//!   Errors are `Clone` so one failed rebuild can be reported to every caller
//!   waiting on the same key.
//! - **`types`**: tree nodes, documents, breadcrumbs and the validated
//!   `LibraryPath` newtype.
//! - **`config`**: `DocLibConfig` and the precedence-aware `ConfigLoader`.
//! - **`constants`**: hidden-entry marker, depth ceiling, MIME table.

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

pub use self::{
    config::{ConfigLoader, ConfigOverlay, ConfigSource, DocLibConfig},
    constants::*,
    errors::{Error, Result},
    types::*,
};
