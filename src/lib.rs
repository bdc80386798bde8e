//! Cascading rule-sheet resolver for package descriptions.
//!
//! A *sheet* is a CSS-like document of rules (`files[bin] { include:
//! "*.dll"; }`) that together describe a software package: its metadata,
//! the file lists it ships and the roles those files play.  Rules cascade,
//! file lists include and exclude each other, and property values may refer
//! to macros that fall back through several tiers.
//!
//! The public API is organised into layers:
//!
//! - **[`sheet`]**: tokenize, parse and load sheets (with `@import`)
//! - **[`resolve`]**: a [`resolve::Session`] turning a sheet into file
//!   lists, macro values and package metadata
//! - **[`diagnostics`]**: non-fatal problem reporting
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod operations;
pub mod resolve;
pub mod sheet;

/// Version string stamped by the build script, or `dev-<crate version>`.
pub const VERSION: &str = match option_env!("PKGRULES_VERSION") {
    Some(version) => version,
    None => concat!("dev-", env!("CARGO_PKG_VERSION")),
};
