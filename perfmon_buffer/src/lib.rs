//! # Perfmon Instrumentation Buffer
//!
//! Read-only consumer for the append-only instrumentation buffers that a
//! producer process publishes through shared memory. The crate validates the
//! buffer's prologue, walks its variable-length entries, and keeps a live
//! name-to-monitor registry that can be refreshed as the producer appends.
//!
//! ## Features
//!
//! - **Live views**: a [`Monitor`] re-reads its bytes on every access, so a
//!   value is never stale
//! - **Incremental re-scan**: [`MonitorRegistry::refresh`] resumes from the
//!   last cursor and skips the scan entirely when the producer's counters
//!   are unchanged
//! - **No shared lock**: correctness rests on the producer publishing its
//!   `used` and modification counters only after entry bytes are in place
//! - **Bounded waits**: [`SyncPoller`] waits for a named monitor with a hard
//!   deadline and stops early on producer overflow
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  RawBuffer  ├───►│  Prologue   ├───►│ EntryParser ├───►│  Registry   │
//! │ bytes|mmap  │    │ magic/order │    │ cursor walk │    │ name→Monitor│
//! └─────────────┘    │ live counts │    └─────────────┘    └──────┬──────┘
//!                    └─────────────┘                              │
//!                                                          ┌──────┴──────┐
//!                                                          │ SyncPoller  │
//!                                                          └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use perfmon_buffer::{MonitorRegistry, RawBuffer, SyncPoller};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let buffer = RawBuffer::map_file("/tmp/perfdata/4242")?;
//! let mut registry = MonitorRegistry::open(buffer)?;
//!
//! // Block until the producer finished its startup phase
//! let mut poller = SyncPoller::default();
//! let ready = poller.wait_for_timeout(&mut registry, "app.init.done", Duration::from_secs(5))?;
//! println!("{} = {}", ready.name(), ready.value()?);
//!
//! for monitor in registry.delta()?.inserted {
//!     println!("new counter {}", monitor.name());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`PerfResult`]. Structural errors mean the
//! buffer no longer matches the format and should be abandoned; liveness
//! errors come from [`SyncPoller`] and leave the registry usable.
//!
//! ```rust,no_run
//! use perfmon_buffer::{MonitorRegistry, PerfDataError, RawBuffer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = MonitorRegistry::open(RawBuffer::map_file("/tmp/perfdata/4242")?)?;
//! match registry.refresh() {
//!     Ok(inserted) => println!("{inserted} new monitors"),
//!     Err(e) if e.is_structural() => eprintln!("buffer corrupt, detaching: {e}"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod entry;
pub mod error;
pub mod monitor;
pub mod platform;
pub mod poller;
pub mod prologue;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use buffer::{ByteOrder, ByteSlice, RawBuffer};
pub use entry::{Entries, EntryParser, ParseOutcome};
pub use error::{PerfDataError, PerfResult};
pub use monitor::{DataType, Monitor, MonitorSnapshot, MonitorValue, Payload, Units, Variability};
pub use poller::{MIN_POLL_INTERVAL, SyncPoller, SyncState};
pub use prologue::Prologue;
pub use registry::{MonitorDelta, MonitorRegistry};

use perfmon::prelude::LogLevel;

/// Initialize tracing with `level` as the fallback filter.
///
/// `RUST_LOG` takes precedence when set. Calling this more than once is
/// harmless; only the first subscriber is installed.
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
