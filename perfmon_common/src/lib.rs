//! Perfmon Common Library
//!
//! Shared constants and configuration loading for the perfmon workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Binary layout of the instrumentation buffer and polling defaults
//! - [`config`] - Producer synchronisation settings and TOML loading
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! perfmon = { package = "perfmon_common", path = "../perfmon_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use perfmon_common::consts::PROLOGUE_SIZE;
//! use perfmon_common::config::{ConfigLoader, SyncConfig};
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
