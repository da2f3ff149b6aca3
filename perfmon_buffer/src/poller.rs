//! Deadline-bounded waits on a live buffer
//!
//! Every wait is a sleep-and-retry loop over [`MonitorRegistry::refresh`].
//! The deadline is the only way a wait ends early; nothing blocks on the
//! producer beyond the sleep between iterations.

use crate::error::{PerfDataError, PerfResult};
use crate::monitor::{Monitor, MonitorValue};
use crate::prologue::Prologue;
use crate::registry::MonitorRegistry;
use perfmon::consts::DEFAULT_POLL_INTERVAL_MS;
use perfmon::prelude::SyncConfig;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Shortest sleep between iterations
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Progress of the most recent wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// Polling, or no wait has run yet
    #[default]
    Waiting,
    /// The target appeared and satisfied its condition
    Found,
    /// The deadline passed first
    TimedOut,
    /// The producer reported an overflow before the target appeared
    Overflowed,
}

/// Polls a registry until a named monitor is present (and optionally
/// satisfies a predicate), a deadline elapses, or the producer overflows.
#[derive(Debug, Clone)]
pub struct SyncPoller {
    poll_interval: Duration,
    state: SyncState,
}

impl Default for SyncPoller {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }
}

impl SyncPoller {
    /// Poller sleeping `poll_interval` between iterations.
    ///
    /// A zero interval is raised to [`MIN_POLL_INTERVAL`].
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            state: SyncState::Waiting,
        }
    }

    /// Poller using the configured poll interval
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.poll_interval())
    }

    /// Outcome of the last wait
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Sleep quantum between iterations
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Wait until `name` exists in the registry.
    ///
    /// # Errors
    ///
    /// - `PerfDataError::TimedOut` once `deadline` has passed
    /// - `PerfDataError::Overflowed` if the producer's overflow counter is
    ///   nonzero while the monitor is still missing
    /// - any structural error raised by `refresh`
    pub fn wait_for(
        &mut self,
        registry: &mut MonitorRegistry,
        name: &str,
        deadline: Instant,
    ) -> PerfResult<Monitor> {
        self.wait_until(registry, name, deadline, |_| true)
    }

    /// [`wait_for`](Self::wait_for) with a deadline relative to now
    pub fn wait_for_timeout(
        &mut self,
        registry: &mut MonitorRegistry,
        name: &str,
        timeout: Duration,
    ) -> PerfResult<Monitor> {
        self.wait_for(registry, name, Instant::now() + timeout)
    }

    /// Wait until `name` exists and its current value satisfies `predicate`.
    ///
    /// The predicate is re-evaluated against a fresh read on every iteration.
    pub fn wait_until<F>(
        &mut self,
        registry: &mut MonitorRegistry,
        name: &str,
        deadline: Instant,
        mut predicate: F,
    ) -> PerfResult<Monitor>
    where
        F: FnMut(&MonitorValue) -> bool,
    {
        self.state = SyncState::Waiting;
        let started = Instant::now();
        let mut iterations = 0u32;

        loop {
            let present = match registry.lookup(name) {
                Some(monitor) => {
                    if predicate(&monitor.value()?) {
                        self.state = SyncState::Found;
                        debug!(
                            name,
                            iterations,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "sync point reached"
                        );
                        return Ok(monitor.clone());
                    }
                    true
                }
                None => false,
            };

            self.pause(deadline);
            iterations = iterations.saturating_add(1);

            if Instant::now() >= deadline {
                self.state = SyncState::TimedOut;
                let waited = started.elapsed();
                warn!(name, waited_ms = waited.as_millis() as u64, "sync wait timed out");
                return Err(PerfDataError::TimedOut {
                    target: name.to_string(),
                    waited,
                });
            }

            if !present {
                let overflow = registry.prologue().overflow_count()?;
                if overflow != 0 {
                    self.state = SyncState::Overflowed;
                    warn!(name, overflow, "producer overflowed before sync point");
                    return Err(PerfDataError::Overflowed {
                        target: name.to_string(),
                        overflow,
                    });
                }
            }

            registry.refresh()?;
            trace!(name, iterations, present, "sync poll");
        }
    }

    /// Wait until the producer marks the buffer accessible.
    ///
    /// # Errors
    ///
    /// Returns `PerfDataError::TimedOut` once `deadline` has passed.
    pub fn wait_accessible(&mut self, prologue: &Prologue, deadline: Instant) -> PerfResult<()> {
        self.state = SyncState::Waiting;
        let started = Instant::now();

        while !prologue.is_accessible()? {
            self.pause(deadline);
            if Instant::now() >= deadline {
                self.state = SyncState::TimedOut;
                return Err(PerfDataError::TimedOut {
                    target: "accessible".to_string(),
                    waited: started.elapsed(),
                });
            }
        }
        self.state = SyncState::Found;
        Ok(())
    }

    /// Sleep one quantum, never past `deadline`
    fn pause(&self, deadline: Instant) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        std::thread::sleep(self.poll_interval.min(remaining));
    }
}
