//! Producer synchronisation settings.
//!
//! A consumer attaching to a live buffer has two knobs: how long a sync wait
//! may block ([`SyncConfig::sync_wait_ms`]) and how long to sleep between
//! re-scans ([`SyncConfig::poll_interval_ms`]). Both live in the `[sync]`
//! table of a small TOML file; every key is optional.
//!
//! ```toml
//! log_level = "debug"
//!
//! [sync]
//! sync_wait_ms = 2000
//! poll_interval_ms = 10
//! ```
//!
//! ```rust,no_run
//! use perfmon_common::config::{ConfigError, ConfigLoader, PerfmonConfig};
//! use std::path::Path;
//! use std::time::Instant;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = PerfmonConfig::load(Path::new("perfmon.toml"))?;
//!     config.validate()?;
//!     let deadline = config.sync.deadline_from(Instant::now());
//!     println!("polling every {:?} until {deadline:?}", config.sync.poll_interval());
//!     Ok(())
//! }
//! ```

use crate::consts::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_SYNC_WAIT_MS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failure to produce a usable [`PerfmonConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("no configuration at {}", .0.display())]
    Missing(PathBuf),

    /// The file exists but could not be read.
    #[error("cannot read {}: {reason}", path.display())]
    Unreadable {
        /// File that failed.
        path: PathBuf,
        /// I/O error text.
        reason: String,
    },

    /// The document is not valid TOML for the target type.
    #[error("malformed configuration: {0}")]
    Malformed(String),

    /// Values parse but contradict each other.
    #[error("{field}: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Fallback verbosity for [`tracing`] output when `RUST_LOG` is unset.
///
/// [`tracing`]: https://docs.rs/tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-entry parse tracing.
    Trace,
    /// Refresh and commit details.
    Debug,
    /// Registry lifecycle.
    #[default]
    Info,
    /// Duplicate names, poll failures.
    Warn,
    /// Only errors.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// How a consumer waits on its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on how long to wait for a sync point, in milliseconds.
    pub sync_wait_ms: u64,
    /// Sleep between poll iterations, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_wait_ms: DEFAULT_SYNC_WAIT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl SyncConfig {
    /// Check that the interval is usable within the wait.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` when `poll_interval_ms` is zero or longer than
    /// `sync_wait_ms`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_ms > self.sync_wait_ms {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: format!(
                    "{} exceeds sync_wait_ms {}",
                    self.poll_interval_ms, self.sync_wait_ms
                ),
            });
        }
        Ok(())
    }

    /// Sleep quantum between poll iterations.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Maximum wait for a sync point.
    pub fn sync_wait(&self) -> Duration {
        Duration::from_millis(self.sync_wait_ms)
    }

    /// Deadline for a sync wait starting at `start`.
    pub fn deadline_from(&self, start: Instant) -> Instant {
        start + self.sync_wait()
    }
}

/// Everything a buffer consumer reads from its configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfmonConfig {
    /// Passed to `perfmon_buffer::init_tracing`.
    pub log_level: LogLevel,
    /// Producer synchronisation.
    pub sync: SyncConfig,
}

impl PerfmonConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sync.validate()
    }
}

/// TOML loading for any deserializable settings type.
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Read and parse `path`.
    ///
    /// # Errors
    ///
    /// `ConfigError::Missing` when the file does not exist,
    /// `ConfigError::Unreadable` on any other I/O failure, and
    /// `ConfigError::Malformed` from [`from_toml`](Self::from_toml).
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::Missing(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };
        Self::from_toml(&content)
    }

    /// Parse an in-memory document.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Malformed(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::default().as_directive(), "info");
    }

    #[test]
    fn test_log_level_deserialization() {
        for (text, level) in [
            ("trace", LogLevel::Trace),
            ("debug", LogLevel::Debug),
            ("info", LogLevel::Info),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
        ] {
            let parsed = PerfmonConfig::from_toml(&format!("log_level = \"{text}\"")).unwrap();
            assert_eq!(parsed.log_level, level);
            assert_eq!(level.as_directive(), text);
        }
    }

    #[test]
    fn test_sync_config_defaults() {
        let sync = SyncConfig::default();
        assert_eq!(sync.sync_wait(), Duration::from_millis(DEFAULT_SYNC_WAIT_MS));
        assert_eq!(
            sync.poll_interval(),
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS)
        );
        assert!(sync.validate().is_ok());

        let start = Instant::now();
        assert_eq!(sync.deadline_from(start) - start, sync.sync_wait());
    }

    #[test]
    fn test_sync_config_rejects_zero_interval() {
        let sync = SyncConfig {
            sync_wait_ms: 100,
            poll_interval_ms: 0,
        };
        assert!(matches!(
            sync.validate(),
            Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_sync_config_rejects_interval_longer_than_wait() {
        let sync = SyncConfig {
            sync_wait_ms: 10,
            poll_interval_ms: 50,
        };
        let err = sync.validate().unwrap_err();
        assert_eq!(err.to_string(), "poll_interval_ms: 50 exceeds sync_wait_ms 10");
    }

    #[test]
    fn test_missing_file_names_path() {
        let path = Path::new("/nonexistent/path/perfmon.toml");
        let result = PerfmonConfig::load(path);
        assert_eq!(result, Err(ConfigError::Missing(path.to_path_buf())));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = PerfmonConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn test_directory_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let result = PerfmonConfig::load(dir.path());
        assert!(matches!(result, Err(ConfigError::Unreadable { .. })));
    }

    #[test]
    fn test_load_sync_settings() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"log_level = "debug"

[sync]
sync_wait_ms = 2000
poll_interval_ms = 10
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = PerfmonConfig::load(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.sync.sync_wait(), Duration::from_secs(2));
        assert_eq!(config.sync.poll_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = PerfmonConfig::from_toml("").unwrap();
        assert_eq!(config, PerfmonConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sync_section_keeps_defaults() {
        let config = PerfmonConfig::from_toml(
            r#"[sync]
sync_wait_ms = 750
"#,
        )
        .unwrap();
        assert_eq!(config.sync.sync_wait_ms, 750);
        assert_eq!(config.sync.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_invalid_sync_section_fails_whole_config() {
        let config = PerfmonConfig::from_toml(
            r#"[sync]
sync_wait_ms = 5
poll_interval_ms = 20
"#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
