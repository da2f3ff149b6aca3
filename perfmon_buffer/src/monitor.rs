//! Typed live views over buffer entries

use crate::buffer::RawBuffer;
use crate::error::PerfResult;
use perfmon::consts::{EntryFlags, LONG_PAYLOAD_SIZE, TYPE_BYTE, TYPE_LONG};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Element type of an entry's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    /// Byte vector
    Byte = TYPE_BYTE,
    /// 64-bit signed integer
    Long = TYPE_LONG,
}

impl DataType {
    /// Decode a data-type tag. Returns `None` for unknown tags.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            TYPE_BYTE => Some(Self::Byte),
            TYPE_LONG => Some(Self::Long),
            _ => None,
        }
    }
}

/// Unit of measure of a monitor's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Units {
    /// Dimensionless
    None = 1,
    /// Byte count
    Bytes = 2,
    /// Clock ticks
    Ticks = 3,
    /// Event count
    Events = 4,
    /// Text
    String = 5,
    /// Frequency
    Hertz = 6,
}

impl Units {
    /// Decode a units tag. Returns `None` for unknown tags.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::None),
            2 => Some(Self::Bytes),
            3 => Some(Self::Ticks),
            4 => Some(Self::Events),
            5 => Some(Self::String),
            6 => Some(Self::Hertz),
            _ => None,
        }
    }
}

/// How a monitor's value may change over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Variability {
    /// Never changes after creation
    Constant = 1,
    /// Only increases
    Monotonic = 2,
    /// May change arbitrarily
    Variable = 3,
}

impl Variability {
    /// Decode a variability tag. Returns `None` for unknown tags.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Constant),
            2 => Some(Self::Monotonic),
            3 => Some(Self::Variable),
            _ => None,
        }
    }

    /// Lowercase name used in diagnostics
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Monotonic => "monotonic",
            Self::Variable => "variable",
        }
    }
}

/// Location and shape of a monitor's value inside the buffer.
///
/// `Long`, `ConstString` and `VarString` are the only shapes a parsed entry
/// can have. `Byte` and `Int` exist for prologue pseudo-monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// 8-byte integer at `offset`
    Long {
        /// Absolute offset
        offset: usize,
    },
    /// 4-byte unsigned integer at `offset`
    Int {
        /// Absolute offset
        offset: usize,
    },
    /// Single byte at `offset`
    Byte {
        /// Absolute offset
        offset: usize,
    },
    /// Immutable NUL-padded text
    ConstString {
        /// Absolute offset
        offset: usize,
        /// Vector length
        len: usize,
    },
    /// Producer-updated NUL-terminated text
    VarString {
        /// Absolute offset
        offset: usize,
        /// Usable bytes, terminator excluded
        max_len: usize,
    },
}

/// Value read from a monitor at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonitorValue {
    /// Integer counters
    Long(i64),
    /// Text monitors
    String(String),
}

impl MonitorValue {
    /// Integer value, if this is a numeric monitor
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            Self::String(_) => None,
        }
    }

    /// Text value, if this is a string monitor
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Long(_) => None,
            Self::String(s) => Some(s),
        }
    }
}

impl fmt::Display for MonitorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Named, typed handle over a live sub-range of the buffer.
///
/// Reading the value always goes back to the buffer; a `Monitor` never
/// caches what it read.
#[derive(Clone)]
pub struct Monitor {
    name: Arc<str>,
    units: Units,
    variability: Variability,
    flags: EntryFlags,
    payload: Payload,
    buffer: Arc<RawBuffer>,
}

impl Monitor {
    pub(crate) fn new(
        name: impl Into<Arc<str>>,
        units: Units,
        variability: Variability,
        flags: EntryFlags,
        payload: Payload,
        buffer: Arc<RawBuffer>,
    ) -> Self {
        Self {
            name: name.into(),
            units,
            variability,
            flags,
            payload,
            buffer,
        }
    }

    /// Unique name within the registry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit of measure
    pub fn units(&self) -> Units {
        self.units
    }

    /// Change pattern
    pub fn variability(&self) -> Variability {
        self.variability
    }

    /// Whether the producer flagged this counter as supported
    pub fn is_supported(&self) -> bool {
        self.flags.contains(EntryFlags::SUPPORTED)
    }

    /// Raw flags byte
    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Value location
    pub fn payload(&self) -> Payload {
        self.payload
    }

    /// True for string monitors
    pub fn is_string(&self) -> bool {
        matches!(
            self.payload,
            Payload::ConstString { .. } | Payload::VarString { .. }
        )
    }

    /// Re-read the current value from the buffer
    pub fn value(&self) -> PerfResult<MonitorValue> {
        let buffer = &self.buffer;
        Ok(match self.payload {
            Payload::Long { offset } => MonitorValue::Long(buffer.read_i64(offset)?),
            Payload::Int { offset } => MonitorValue::Long(i64::from(buffer.read_u32(offset)?)),
            Payload::Byte { offset } => MonitorValue::Long(i64::from(buffer.read_u8(offset)?)),
            Payload::ConstString { offset, len } => {
                MonitorValue::String(buffer.slice(offset, len)?.to_c_string()?)
            }
            Payload::VarString { offset, max_len } => {
                MonitorValue::String(buffer.slice(offset, max_len)?.to_c_string()?)
            }
        })
    }

    /// Current integer value; `None` for string monitors
    pub fn long_value(&self) -> PerfResult<Option<i64>> {
        Ok(self.value()?.as_long())
    }

    /// Serializable point-in-time copy
    pub fn snapshot(&self) -> PerfResult<MonitorSnapshot> {
        Ok(MonitorSnapshot {
            name: self.name.to_string(),
            units: self.units,
            variability: self.variability,
            supported: self.is_supported(),
            value: self.value()?,
        })
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("name", &self.name)
            .field("units", &self.units)
            .field("variability", &self.variability)
            .field("flags", &self.flags)
            .field("payload", &self.payload)
            .finish()
    }
}

/// Monitor name, attributes and value at one instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Monitor name
    pub name: String,
    /// Unit of measure
    pub units: Units,
    /// Change pattern
    pub variability: Variability,
    /// Producer's supported flag
    pub supported: bool,
    /// Value when the snapshot was taken
    pub value: MonitorValue,
}

/// Offset of a long payload right-aligned in an entry ending at `entry_end`
pub(crate) const fn long_payload_offset(entry_end: usize) -> usize {
    entry_end - LONG_PAYLOAD_SIZE
}
