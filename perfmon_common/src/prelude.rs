//! Prelude module for common re-exports.
//!
//! ```rust
//! use perfmon_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, PerfmonConfig, SyncConfig};

// ─── Layout ─────────────────────────────────────────────────────────
pub use crate::consts::{ENTRY_ALIGNMENT, ENTRY_HEADER_SIZE, EntryFlags, PROLOGUE_SIZE};
