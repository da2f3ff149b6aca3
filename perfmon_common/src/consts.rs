//! Binary layout constants for the instrumentation buffer.
//!
//! These constants are a fixed contract with the producer process. They are
//! the single source of truth - the parser and the test producers both import
//! from here.

use bitflags::bitflags;
use static_assertions::const_assert;

/// Magic number at offset 0, always stored big-endian.
pub const PERFDATA_MAGIC: u32 = 0xCAFE_C0C0;

/// The only major layout version this reader understands.
pub const SUPPORTED_MAJOR_VERSION: u8 = 2;

/// Byte-order marker value for big-endian buffers.
pub const BYTE_ORDER_BIG_ENDIAN: u8 = 0;

/// Byte-order marker value for little-endian buffers.
pub const BYTE_ORDER_LITTLE_ENDIAN: u8 = 1;

// ─── Prologue ───────────────────────────────────────────────────────

/// Size of the fixed prologue; the first entry starts right after it.
pub const PROLOGUE_SIZE: usize = 32;

/// Offset of the magic number.
pub const PROLOGUE_MAGIC_OFFSET: usize = 0;
/// Offset of the byte-order marker.
pub const PROLOGUE_BYTE_ORDER_OFFSET: usize = 4;
/// Offset of the major version byte.
pub const PROLOGUE_MAJOR_OFFSET: usize = 5;
/// Offset of the minor version byte.
pub const PROLOGUE_MINOR_OFFSET: usize = 6;
/// Offset of the accessible flag (live).
pub const PROLOGUE_ACCESSIBLE_OFFSET: usize = 7;
/// Offset of the used-bytes counter (live, 4 bytes).
pub const PROLOGUE_USED_OFFSET: usize = 8;
/// Offset of the overflow counter (live, 4 bytes).
pub const PROLOGUE_OVERFLOW_OFFSET: usize = 12;
/// Offset of the modification timestamp (live, 8 bytes).
pub const PROLOGUE_MOD_TIMESTAMP_OFFSET: usize = 16;
/// Offset of the declared buffer size (4 bytes).
pub const PROLOGUE_SIZE_OFFSET: usize = 24;

// ─── Entries ────────────────────────────────────────────────────────

/// Every entry starts on a multiple of this.
pub const ENTRY_ALIGNMENT: usize = 4;

/// entryLength | nameLength | vectorLength | type | flags | units | variability
pub const ENTRY_HEADER_SIZE: usize = 16;

/// Offset of nameLength within an entry.
pub const ENTRY_NAME_LENGTH_OFFSET: usize = 4;
/// Offset of vectorLength within an entry.
pub const ENTRY_VECTOR_LENGTH_OFFSET: usize = 8;
/// Offset of the data-type tag within an entry.
pub const ENTRY_DATA_TYPE_OFFSET: usize = 12;
/// Offset of the flags byte within an entry.
pub const ENTRY_FLAGS_OFFSET: usize = 13;
/// Offset of the units tag within an entry.
pub const ENTRY_UNITS_OFFSET: usize = 14;
/// Offset of the variability tag within an entry.
pub const ENTRY_VARIABILITY_OFFSET: usize = 15;

/// Width of a scalar long payload, right-aligned at the end of its entry.
pub const LONG_PAYLOAD_SIZE: usize = 8;

/// Data-type tag for byte vectors.
pub const TYPE_BYTE: u8 = b'B';
/// Data-type tag for 64-bit integers.
pub const TYPE_LONG: u8 = b'J';

bitflags! {
    /// Per-entry flags byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u8 {
        /// The counter is part of the stable, supported set.
        const SUPPORTED = 0x01;
    }
}

// ─── Polling ────────────────────────────────────────────────────────

/// Default time to wait for the producer to reach a sync point.
pub const DEFAULT_SYNC_WAIT_MS: u64 = 5000;

/// Default sleep between poll iterations.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 20;

// ─── Pseudo-monitors ────────────────────────────────────────────────

/// Major layout version, from the prologue.
pub const PSEUDO_MAJOR_VERSION: &str = "perfdata.version.major";
/// Minor layout version, from the prologue.
pub const PSEUDO_MINOR_VERSION: &str = "perfdata.version.minor";
/// Declared buffer size.
pub const PSEUDO_SIZE: &str = "perfdata.size";
/// Live used-bytes counter.
pub const PSEUDO_USED: &str = "perfdata.used";
/// Live overflow counter.
pub const PSEUDO_OVERFLOW: &str = "perfdata.overflow";
/// Live modification timestamp.
pub const PSEUDO_TIMESTAMP: &str = "perfdata.timestamp";

const_assert!(PROLOGUE_SIZE % ENTRY_ALIGNMENT == 0);
const_assert!(PROLOGUE_SIZE_OFFSET + 4 <= PROLOGUE_SIZE);
const_assert!(ENTRY_VARIABILITY_OFFSET + 1 == ENTRY_HEADER_SIZE);
const_assert!(ENTRY_HEADER_SIZE % ENTRY_ALIGNMENT == 0);
