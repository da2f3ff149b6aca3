//! Error types for instrumentation buffer parsing and polling

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while reading an instrumentation buffer
#[derive(Error, Debug)]
pub enum PerfDataError {
    /// Read outside the mapped region
    #[error("Read of {len} bytes at offset {offset} exceeds buffer capacity {capacity}")]
    OutOfBounds {
        /// Start of the attempted read
        offset: usize,
        /// Width of the attempted read
        len: usize,
        /// Mapped capacity
        capacity: usize,
    },

    /// Prologue is too short, has the wrong magic or an unsupported version
    #[error("Malformed prologue: {reason}")]
    MalformedHeader {
        /// What failed validation
        reason: String,
    },

    /// Entry cursor not on a 4-byte boundary
    #[error("Entry at offset {offset} is not 4-byte aligned")]
    MisalignedEntry {
        /// Offending cursor
        offset: usize,
    },

    /// Entry cursor beyond the parse limit
    #[error("Entry cursor {cursor} beyond parse limit {limit}")]
    CursorOutOfBounds {
        /// Offending cursor
        cursor: usize,
        /// Parse limit for the pass
        limit: usize,
    },

    /// Declared entry length is negative, too small or larger than the limit
    #[error("Invalid entry length {length} at offset {offset} (limit {limit})")]
    InvalidEntryLength {
        /// Entry start
        offset: usize,
        /// Declared length
        length: i64,
        /// Parse limit for the pass
        limit: usize,
    },

    /// Entry runs past the parse limit
    #[error("Entry at offset {offset} with length {length} runs past limit {limit}")]
    TruncatedEntry {
        /// Entry start
        offset: usize,
        /// Declared (or minimum readable) length
        length: usize,
        /// Parse limit for the pass
        limit: usize,
    },

    /// A length field inside the entry is inconsistent with the entry length
    #[error("Invalid {field} {value} in entry at offset {offset} (entry length {entry_length})")]
    InvalidFieldLength {
        /// Entry start
        offset: usize,
        /// Field name
        field: &'static str,
        /// Declared value
        value: i64,
        /// Declared entry length
        entry_length: usize,
    },

    /// A tag byte does not decode to a known enum member
    #[error("Invalid {attribute} tag {value:#04x} in entry at offset {offset}")]
    InvalidAttribute {
        /// Entry start
        offset: usize,
        /// Attribute name
        attribute: &'static str,
        /// Raw tag
        value: u8,
    },

    /// Data type / vector length combination is not representable
    #[error("Unsupported data type {data_type:#04x} (vector length {vector_length}) at offset {offset}")]
    UnsupportedType {
        /// Entry start
        offset: usize,
        /// Raw data-type tag
        data_type: u8,
        /// Declared vector length
        vector_length: usize,
    },

    /// Byte vector with a variability other than constant or variable
    #[error("Unsupported variability {variability} for byte vector at offset {offset}")]
    UnsupportedVariability {
        /// Entry start
        offset: usize,
        /// Decoded variability name
        variability: &'static str,
    },

    /// A producer counter went backwards between two observations
    #[error("Counter {counter} regressed from {previous} to {current}")]
    CounterRegression {
        /// Counter name
        counter: &'static str,
        /// Baseline value
        previous: i64,
        /// Newly observed value
        current: i64,
    },

    /// Sync wait reached its deadline
    #[error("Timed out after {waited:?} waiting for {target}")]
    TimedOut {
        /// What was being waited for
        target: String,
        /// Time spent waiting
        waited: Duration,
    },

    /// Producer ran out of space before the awaited monitor appeared
    #[error("Producer overflowed ({overflow}) while waiting for {target}")]
    Overflowed {
        /// What was being waited for
        target: String,
        /// Overflow counter value
        overflow: u32,
    },

    /// Monitor name pattern failed to compile
    #[error("Invalid monitor pattern: {source}")]
    InvalidPattern {
        /// Source regex error
        #[from]
        source: regex::Error,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

impl PerfDataError {
    /// The buffer's bytes do not conform to the format; stop using it.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::OutOfBounds { .. }
                | Self::MalformedHeader { .. }
                | Self::MisalignedEntry { .. }
                | Self::CursorOutOfBounds { .. }
                | Self::InvalidEntryLength { .. }
                | Self::TruncatedEntry { .. }
                | Self::InvalidFieldLength { .. }
                | Self::InvalidAttribute { .. }
                | Self::UnsupportedType { .. }
                | Self::UnsupportedVariability { .. }
                | Self::CounterRegression { .. }
        )
    }

    /// Expected waiting outcome; the caller decides whether to retry.
    pub fn is_liveness(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Overflowed { .. })
    }
}

/// Result type for instrumentation buffer operations
pub type PerfResult<T> = Result<T, PerfDataError>;
