//! Variable-length entry parser
//!
//! Each entry is self-describing:
//!
//! ```text
//! +0  entryLength   i32   total record length, 0 = end of data
//! +4  nameLength    i32   includes the trailing terminator
//! +8  vectorLength  i32   0 for scalars
//! +12 dataType      u8    'B' byte vector, 'J' long
//! +13 flags         u8    bit 0 = supported
//! +14 units         u8
//! +15 variability   u8
//! +16 name          nameLength bytes
//!     payload       up to entryLength
//! ```
//!
//! The parser trusts `entryLength` for advancement, but validates every
//! field against it first: the bytes come from another process and may be
//! corrupt or half-written.

use crate::buffer::RawBuffer;
use crate::error::{PerfDataError, PerfResult};
use crate::monitor::{DataType, Monitor, Payload, Units, Variability, long_payload_offset};
use perfmon::consts::{
    ENTRY_ALIGNMENT, ENTRY_DATA_TYPE_OFFSET, ENTRY_FLAGS_OFFSET, ENTRY_HEADER_SIZE,
    ENTRY_NAME_LENGTH_OFFSET, ENTRY_UNITS_OFFSET, ENTRY_VARIABILITY_OFFSET,
    ENTRY_VECTOR_LENGTH_OFFSET, EntryFlags, LONG_PAYLOAD_SIZE,
};
use std::sync::Arc;
use tracing::trace;

/// Result of parsing at one cursor position
#[derive(Debug, Clone)]
pub enum ParseOutcome {
    /// A monitor was parsed; `next` is where the following entry starts
    Entry {
        /// Parsed monitor
        monitor: Monitor,
        /// Cursor of the next entry
        next: usize,
    },
    /// Zero-length sentinel, or the cursor reached the limit
    EndOfData,
}

/// Walks entries in `[.., limit)` of one buffer
#[derive(Debug, Clone)]
pub struct EntryParser {
    buffer: Arc<RawBuffer>,
    limit: usize,
}

impl EntryParser {
    /// Parser over a buffer, bounded by `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns `PerfDataError::CursorOutOfBounds` if `limit` exceeds the
    /// buffer capacity.
    pub fn new(buffer: Arc<RawBuffer>, limit: usize) -> PerfResult<Self> {
        let capacity = buffer.capacity();
        if limit > capacity {
            return Err(PerfDataError::CursorOutOfBounds {
                cursor: limit,
                limit: capacity,
            });
        }
        Ok(Self { buffer, limit })
    }

    /// Parse limit for this pass
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Parse the entry starting at `cursor`.
    pub fn parse_next(&self, cursor: usize) -> PerfResult<ParseOutcome> {
        let limit = self.limit;

        if cursor % ENTRY_ALIGNMENT != 0 {
            return Err(PerfDataError::MisalignedEntry { offset: cursor });
        }
        if cursor > limit {
            return Err(PerfDataError::CursorOutOfBounds { cursor, limit });
        }
        if cursor == limit {
            return Ok(ParseOutcome::EndOfData);
        }
        if limit - cursor < 4 {
            return Err(PerfDataError::TruncatedEntry {
                offset: cursor,
                length: 4,
                limit,
            });
        }

        let buffer = &self.buffer;
        let raw_length = buffer.read_i32(cursor)?;
        if raw_length < 0 || raw_length as usize > limit {
            return Err(PerfDataError::InvalidEntryLength {
                offset: cursor,
                length: i64::from(raw_length),
                limit,
            });
        }
        if raw_length == 0 {
            return Ok(ParseOutcome::EndOfData);
        }

        let entry_length = raw_length as usize;
        let entry_end = match cursor.checked_add(entry_length) {
            Some(end) if end <= limit => end,
            _ => {
                return Err(PerfDataError::TruncatedEntry {
                    offset: cursor,
                    length: entry_length,
                    limit,
                });
            }
        };
        if entry_length < ENTRY_HEADER_SIZE {
            return Err(PerfDataError::InvalidEntryLength {
                offset: cursor,
                length: i64::from(raw_length),
                limit,
            });
        }

        let name_length = buffer.read_i32(cursor + ENTRY_NAME_LENGTH_OFFSET)?;
        let vector_length = buffer.read_i32(cursor + ENTRY_VECTOR_LENGTH_OFFSET)?;
        let data_type = buffer.read_u8(cursor + ENTRY_DATA_TYPE_OFFSET)?;
        let flags = buffer.read_u8(cursor + ENTRY_FLAGS_OFFSET)?;
        let units = buffer.read_u8(cursor + ENTRY_UNITS_OFFSET)?;
        let variability = buffer.read_u8(cursor + ENTRY_VARIABILITY_OFFSET)?;

        let field_error = |field: &'static str, value: i64| PerfDataError::InvalidFieldLength {
            offset: cursor,
            field,
            value,
            entry_length,
        };

        if name_length <= 0 || name_length as usize > entry_length {
            return Err(field_error("name length", i64::from(name_length)));
        }
        if vector_length < 0 || vector_length as usize > entry_length {
            return Err(field_error("vector length", i64::from(vector_length)));
        }
        let name_length = name_length as usize;
        let vector_length = vector_length as usize;

        let name_start = cursor + ENTRY_HEADER_SIZE;
        let name_end = name_start + name_length;
        if name_end > entry_end {
            return Err(field_error("name length", name_length as i64));
        }

        let variability =
            Variability::from_tag(variability).ok_or(PerfDataError::InvalidAttribute {
                offset: cursor,
                attribute: "variability",
                value: variability,
            })?;
        let units = Units::from_tag(units).ok_or(PerfDataError::InvalidAttribute {
            offset: cursor,
            attribute: "units",
            value: units,
        })?;

        // Last byte of the name field is the terminator
        let name = buffer.slice(name_start, name_length - 1)?.to_c_string()?;

        let unsupported_type = PerfDataError::UnsupportedType {
            offset: cursor,
            data_type,
            vector_length,
        };
        let payload = match (vector_length == 0, DataType::from_tag(data_type)) {
            (true, Some(DataType::Long)) => {
                if entry_end - name_end < LONG_PAYLOAD_SIZE {
                    return Err(field_error("long payload", LONG_PAYLOAD_SIZE as i64));
                }
                Payload::Long {
                    offset: long_payload_offset(entry_end),
                }
            }
            (false, Some(DataType::Byte)) if units == Units::String => {
                if name_end + vector_length > entry_end {
                    return Err(field_error("vector length", vector_length as i64));
                }
                match variability {
                    Variability::Constant => Payload::ConstString {
                        offset: name_end,
                        len: vector_length,
                    },
                    Variability::Variable => Payload::VarString {
                        offset: name_end,
                        max_len: vector_length - 1,
                    },
                    Variability::Monotonic => {
                        return Err(PerfDataError::UnsupportedVariability {
                            offset: cursor,
                            variability: variability.as_str(),
                        });
                    }
                }
            }
            _ => return Err(unsupported_type),
        };

        trace!(offset = cursor, length = entry_length, %name, "parsed entry");

        let monitor = Monitor::new(
            name,
            units,
            variability,
            EntryFlags::from_bits_truncate(flags),
            payload,
            Arc::clone(&self.buffer),
        );
        Ok(ParseOutcome::Entry {
            monitor,
            next: entry_end,
        })
    }

    /// Iterate entries from `start` until end of data or the first error.
    pub fn entries(&self, start: usize) -> Entries<'_> {
        Entries {
            parser: self,
            cursor: start,
            done: false,
        }
    }
}

/// Iterator over consecutive entries; see [`EntryParser::entries`]
#[derive(Debug)]
pub struct Entries<'a> {
    parser: &'a EntryParser,
    cursor: usize,
    done: bool,
}

impl Entries<'_> {
    /// Offset of the next unparsed entry (or of the end-of-data marker)
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Iterator for Entries<'_> {
    type Item = PerfResult<Monitor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parser.parse_next(self.cursor) {
            Ok(ParseOutcome::Entry { monitor, next }) => {
                self.cursor = next;
                Some(Ok(monitor))
            }
            Ok(ParseOutcome::EndOfData) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
