//! Name-to-monitor registry with incremental re-scans
//!
//! The producer only ever appends entries and bumps its counters after the
//! entry bytes are in place. Once `used` has been observed at some value,
//! every entry below that offset is complete, so the registry can resume
//! parsing from its saved cursor without any lock shared with the producer.

use crate::buffer::RawBuffer;
use crate::entry::{EntryParser, ParseOutcome};
use crate::error::{PerfDataError, PerfResult};
use crate::monitor::{Monitor, MonitorSnapshot};
use crate::prologue::Prologue;
use perfmon::consts::PROLOGUE_SIZE;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Monitors that appeared (or disappeared) since the previous delta query
#[derive(Debug, Clone, Default)]
pub struct MonitorDelta {
    /// Newly discovered monitors, in no guaranteed order
    pub inserted: Vec<Monitor>,
    /// Always empty: the format has no deletion primitive
    pub removed: Vec<Monitor>,
}

impl MonitorDelta {
    /// True when nothing changed
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

/// Producer counters observed at the last successful scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Baseline {
    used: usize,
    modified: i64,
}

/// Live collection of every monitor in one buffer
#[derive(Debug)]
pub struct MonitorRegistry {
    prologue: Prologue,
    monitors: HashMap<String, Monitor>,
    cursor: usize,
    baseline: Baseline,
    pending: Vec<Monitor>,
}

impl MonitorRegistry {
    /// Validate the prologue of `buffer` and build the initial registry
    pub fn open(buffer: RawBuffer) -> PerfResult<Self> {
        Self::build_initial(Prologue::open(buffer)?)
    }

    /// Seed pseudo-monitors, then parse every committed entry.
    ///
    /// Monitors found here are not reported by [`delta`](Self::delta).
    pub fn build_initial(prologue: Prologue) -> PerfResult<Self> {
        let mut monitors = HashMap::new();
        for monitor in prologue.pseudo_monitors() {
            monitors.insert(monitor.name().to_string(), monitor);
        }

        let mut registry = Self {
            prologue,
            monitors,
            cursor: PROLOGUE_SIZE,
            baseline: Baseline {
                used: 0,
                modified: i64::MIN,
            },
            pending: Vec::new(),
        };

        let baseline = registry.observe()?;
        let (discovered, cursor) = registry.scan(baseline)?;
        let count = discovered.len();
        registry.commit(discovered, cursor, baseline, false);

        info!(
            monitors = registry.monitors.len(),
            entries = count,
            used = baseline.used,
            "built monitor registry"
        );
        Ok(registry)
    }

    /// Read the producer counters and check they have not gone backwards
    fn observe(&self) -> PerfResult<Baseline> {
        let used = self.prologue.used_bytes()?;
        let modified = self.prologue.modification_counter()?;
        let declared = self.prologue.declared_size();

        if used > declared {
            return Err(PerfDataError::MalformedHeader {
                reason: format!("used bytes {used} exceed declared size {declared}"),
            });
        }
        if used < self.baseline.used {
            return Err(PerfDataError::CounterRegression {
                counter: "used",
                previous: self.baseline.used as i64,
                current: used as i64,
            });
        }
        if modified < self.baseline.modified {
            return Err(PerfDataError::CounterRegression {
                counter: "modification",
                previous: self.baseline.modified,
                current: modified,
            });
        }
        Ok(Baseline { used, modified })
    }

    /// Parse from the saved cursor up to `baseline.used` without publishing
    fn scan(&self, baseline: Baseline) -> PerfResult<(Vec<Monitor>, usize)> {
        let parser = EntryParser::new(self.prologue.buffer().clone(), baseline.used)?;
        let mut discovered = Vec::new();
        let mut cursor = self.cursor;

        while let ParseOutcome::Entry { monitor, next } = parser.parse_next(cursor)? {
            discovered.push(monitor);
            cursor = next;
        }
        Ok((discovered, cursor))
    }

    /// Publish a successful scan
    fn commit(&mut self, discovered: Vec<Monitor>, cursor: usize, baseline: Baseline, track: bool) {
        for monitor in discovered {
            if let Some(existing) = self.monitors.get(monitor.name()) {
                warn!(
                    name = monitor.name(),
                    kept = ?existing.payload(),
                    shadowed = ?monitor.payload(),
                    "duplicate monitor name ignored"
                );
                continue;
            }
            if track {
                self.pending.push(monitor.clone());
            }
            self.monitors.insert(monitor.name().to_string(), monitor);
        }
        self.cursor = cursor;
        self.baseline = baseline;
    }

    /// Pick up entries appended since the last scan.
    ///
    /// Returns immediately when neither `used` nor the modification counter
    /// changed. Any parse error aborts the pass with nothing published;
    /// monitors from earlier passes stay valid.
    pub fn refresh(&mut self) -> PerfResult<usize> {
        let observed = self.observe()?;
        if observed == self.baseline {
            return Ok(0);
        }

        let (discovered, cursor) = self.scan(observed)?;
        let before = self.monitors.len();
        self.commit(discovered, cursor, observed, true);
        let inserted = self.monitors.len() - before;

        debug!(
            inserted,
            cursor,
            used = observed.used,
            modified = observed.modified,
            "refreshed monitor registry"
        );
        Ok(inserted)
    }

    /// Refresh, then hand over and clear the pending insertions
    pub fn delta(&mut self) -> PerfResult<MonitorDelta> {
        self.refresh()?;
        Ok(MonitorDelta {
            inserted: std::mem::take(&mut self.pending),
            removed: Vec::new(),
        })
    }

    /// Monitor by exact name; does not refresh
    pub fn lookup(&self, name: &str) -> Option<&Monitor> {
        self.monitors.get(name)
    }

    /// Monitors whose name matches a regular expression; does not refresh
    pub fn find_by_pattern(&self, pattern: &str) -> PerfResult<Vec<&Monitor>> {
        let regex = Regex::new(pattern)?;
        let mut found: Vec<&Monitor> = self
            .monitors
            .values()
            .filter(|m| regex.is_match(m.name()))
            .collect();
        found.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(found)
    }

    /// Point-in-time copy of every monitor, sorted by name
    pub fn snapshot(&self) -> PerfResult<Vec<MonitorSnapshot>> {
        let mut snapshots = self
            .monitors
            .values()
            .map(Monitor::snapshot)
            .collect::<PerfResult<Vec<_>>>()?;
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(snapshots)
    }

    /// All monitors, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.values()
    }

    /// All monitor names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.monitors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of monitors, pseudo-monitors included
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// True if the registry holds no monitors
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Offset of the next unparsed entry
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Prologue of the underlying buffer
    pub fn prologue(&self) -> &Prologue {
        &self.prologue
    }
}
