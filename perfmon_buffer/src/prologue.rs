//! Fixed header at the start of the instrumentation buffer
//!
//! The structural fields (magic, byte order, versions, declared size) are
//! validated and read once at open time. The producer's counters (used,
//! overflow, modification timestamp, accessible flag) alias live memory and
//! are re-read from the buffer on every call.

use crate::buffer::{ByteOrder, RawBuffer};
use crate::error::{PerfDataError, PerfResult};
use crate::monitor::{Monitor, Payload, Units, Variability};
use perfmon::consts::{
    BYTE_ORDER_BIG_ENDIAN, BYTE_ORDER_LITTLE_ENDIAN, EntryFlags, PERFDATA_MAGIC,
    PROLOGUE_ACCESSIBLE_OFFSET, PROLOGUE_BYTE_ORDER_OFFSET, PROLOGUE_MAGIC_OFFSET,
    PROLOGUE_MAJOR_OFFSET, PROLOGUE_MINOR_OFFSET, PROLOGUE_MOD_TIMESTAMP_OFFSET,
    PROLOGUE_OVERFLOW_OFFSET, PROLOGUE_SIZE, PROLOGUE_SIZE_OFFSET, PROLOGUE_USED_OFFSET,
    PSEUDO_MAJOR_VERSION, PSEUDO_MINOR_VERSION, PSEUDO_OVERFLOW, PSEUDO_SIZE, PSEUDO_TIMESTAMP,
    PSEUDO_USED, SUPPORTED_MAJOR_VERSION,
};
use std::sync::Arc;

/// Validated prologue with live counter accessors
#[derive(Debug, Clone)]
pub struct Prologue {
    buffer: Arc<RawBuffer>,
    major: u8,
    minor: u8,
    declared_size: usize,
}

fn malformed(reason: impl Into<String>) -> PerfDataError {
    PerfDataError::MalformedHeader {
        reason: reason.into(),
    }
}

impl Prologue {
    /// Validate the header and fix the buffer's byte order.
    ///
    /// # Errors
    ///
    /// Returns `PerfDataError::MalformedHeader` if the region is shorter than
    /// the prologue, the magic is wrong, the byte-order marker or major
    /// version is unknown, or the declared size does not fit the region.
    pub fn open(buffer: RawBuffer) -> PerfResult<Self> {
        let capacity = buffer.capacity();
        if capacity < PROLOGUE_SIZE {
            return Err(malformed(format!(
                "region of {capacity} bytes is shorter than the {PROLOGUE_SIZE}-byte prologue"
            )));
        }

        let magic = buffer.read_u32_be(PROLOGUE_MAGIC_OFFSET)?;
        if magic != PERFDATA_MAGIC {
            return Err(malformed(format!("bad magic {magic:#010x}")));
        }

        let order = match buffer.read_u8(PROLOGUE_BYTE_ORDER_OFFSET)? {
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            other => return Err(malformed(format!("unknown byte-order marker {other}"))),
        };

        let major = buffer.read_u8(PROLOGUE_MAJOR_OFFSET)?;
        let minor = buffer.read_u8(PROLOGUE_MINOR_OFFSET)?;
        if major != SUPPORTED_MAJOR_VERSION {
            return Err(malformed(format!("unsupported version {major}.{minor}")));
        }

        let buffer = buffer.with_byte_order(order);
        let declared_size = buffer.read_u32(PROLOGUE_SIZE_OFFSET)? as usize;
        if declared_size < PROLOGUE_SIZE || declared_size > capacity {
            return Err(malformed(format!(
                "declared size {declared_size} outside [{PROLOGUE_SIZE}, {capacity}]"
            )));
        }

        Ok(Self {
            buffer: Arc::new(buffer),
            major,
            minor,
            declared_size,
        })
    }

    /// Shared handle to the underlying buffer
    pub fn buffer(&self) -> &Arc<RawBuffer> {
        &self.buffer
    }

    /// Byte order declared by the producer
    pub fn byte_order(&self) -> ByteOrder {
        self.buffer.byte_order()
    }

    /// Major layout version
    pub fn major_version(&self) -> u8 {
        self.major
    }

    /// Minor layout version
    pub fn minor_version(&self) -> u8 {
        self.minor
    }

    /// Total buffer size declared by the producer
    pub fn declared_size(&self) -> usize {
        self.declared_size
    }

    /// Whether the producer finished initialising the buffer (live)
    pub fn is_accessible(&self) -> PerfResult<bool> {
        Ok(self.buffer.read_u8(PROLOGUE_ACCESSIBLE_OFFSET)? != 0)
    }

    /// Bytes committed by the producer (live).
    ///
    /// Loaded with acquire ordering: every entry below the returned offset is
    /// complete for reads issued afterwards.
    pub fn used_bytes(&self) -> PerfResult<usize> {
        Ok(self.buffer.load_u32_acquire(PROLOGUE_USED_OFFSET)? as usize)
    }

    /// Number of entries the producer failed to allocate (live)
    pub fn overflow_count(&self) -> PerfResult<u32> {
        self.buffer.read_u32(PROLOGUE_OVERFLOW_OFFSET)
    }

    /// Modification timestamp, bumped after each committed entry (live)
    pub fn modification_counter(&self) -> PerfResult<i64> {
        self.buffer.load_i64_acquire(PROLOGUE_MOD_TIMESTAMP_OFFSET)
    }

    /// Synthetic monitors backed by prologue fields
    pub fn pseudo_monitors(&self) -> Vec<Monitor> {
        let pseudo = |name: &str, units, variability, payload| {
            Monitor::new(
                name,
                units,
                variability,
                EntryFlags::SUPPORTED,
                payload,
                Arc::clone(&self.buffer),
            )
        };

        vec![
            pseudo(
                PSEUDO_MAJOR_VERSION,
                Units::None,
                Variability::Constant,
                Payload::Byte {
                    offset: PROLOGUE_MAJOR_OFFSET,
                },
            ),
            pseudo(
                PSEUDO_MINOR_VERSION,
                Units::None,
                Variability::Constant,
                Payload::Byte {
                    offset: PROLOGUE_MINOR_OFFSET,
                },
            ),
            pseudo(
                PSEUDO_SIZE,
                Units::Bytes,
                Variability::Constant,
                Payload::Int {
                    offset: PROLOGUE_SIZE_OFFSET,
                },
            ),
            pseudo(
                PSEUDO_USED,
                Units::Bytes,
                Variability::Monotonic,
                Payload::Int {
                    offset: PROLOGUE_USED_OFFSET,
                },
            ),
            pseudo(
                PSEUDO_OVERFLOW,
                Units::Bytes,
                Variability::Monotonic,
                Payload::Int {
                    offset: PROLOGUE_OVERFLOW_OFFSET,
                },
            ),
            pseudo(
                PSEUDO_TIMESTAMP,
                Units::Ticks,
                Variability::Monotonic,
                Payload::Long {
                    offset: PROLOGUE_MOD_TIMESTAMP_OFFSET,
                },
            ),
        ]
    }
}
