//! File-backed producer used by the integration tests
//!
//! Writes through a shared writable mapping while the code under test reads
//! the same file through its own read-only mapping. Entry bytes always land
//! before the `used` and modification counters are release-stored.

#![allow(dead_code)]

use memmap2::{MmapMut, MmapOptions};
use perfmon::consts::{
    BYTE_ORDER_BIG_ENDIAN, BYTE_ORDER_LITTLE_ENDIAN, ENTRY_ALIGNMENT, ENTRY_HEADER_SIZE,
    EntryFlags, PERFDATA_MAGIC, PROLOGUE_ACCESSIBLE_OFFSET, PROLOGUE_BYTE_ORDER_OFFSET,
    PROLOGUE_MAJOR_OFFSET, PROLOGUE_MOD_TIMESTAMP_OFFSET, PROLOGUE_OVERFLOW_OFFSET,
    PROLOGUE_SIZE, PROLOGUE_SIZE_OFFSET, PROLOGUE_USED_OFFSET, SUPPORTED_MAJOR_VERSION,
    TYPE_BYTE, TYPE_LONG,
};
use perfmon_buffer::ByteOrder;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tempfile::NamedTempFile;

/// Variability tags as written by the producer
pub const CONSTANT: u8 = 1;
pub const MONOTONIC: u8 = 2;
pub const VARIABLE: u8 = 3;

/// Units tags
pub const UNITS_EVENTS: u8 = 4;
pub const UNITS_STRING: u8 = 5;

fn align(len: usize) -> usize {
    len.div_ceil(ENTRY_ALIGNMENT) * ENTRY_ALIGNMENT
}

fn name_field(name: &str) -> Vec<u8> {
    let mut field = name.as_bytes().to_vec();
    field.push(0);
    field.resize(align(field.len()), 0);
    field
}

/// Appends entries to a temporary buffer file
pub struct Producer {
    file: NamedTempFile,
    map: MmapMut,
    order: ByteOrder,
    used: usize,
    modified: i64,
}

impl Producer {
    /// Create an accessible, empty buffer of `size` bytes
    pub fn create(size: usize, order: ByteOrder) -> Self {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(size as u64).unwrap();
        // SAFETY: the file is private to this test and sized above
        let map = unsafe { MmapOptions::new().map_mut(file.as_file()).unwrap() };

        let mut producer = Self {
            file,
            map,
            order,
            used: PROLOGUE_SIZE,
            modified: 0,
        };
        producer.map[0..4].copy_from_slice(&PERFDATA_MAGIC.to_be_bytes());
        producer.map[PROLOGUE_BYTE_ORDER_OFFSET] = match order {
            ByteOrder::BigEndian => BYTE_ORDER_BIG_ENDIAN,
            ByteOrder::LittleEndian => BYTE_ORDER_LITTLE_ENDIAN,
        };
        producer.map[PROLOGUE_MAJOR_OFFSET] = SUPPORTED_MAJOR_VERSION;
        producer.map[PROLOGUE_ACCESSIBLE_OFFSET] = 1;
        producer.put_u32(PROLOGUE_SIZE_OFFSET, size as u32);
        producer.publish();
        producer
    }

    /// Path for `RawBuffer::map_file`
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Copy of the current image
    pub fn bytes(&self) -> Vec<u8> {
        self.map.to_vec()
    }

    /// Bytes committed so far
    pub fn used(&self) -> usize {
        self.used
    }

    /// Append a scalar long entry; returns the payload offset
    pub fn append_long(&mut self, name: &str, value: i64) -> usize {
        let name = name_field(name);
        let entry_length = align(ENTRY_HEADER_SIZE + name.len() + 8);
        let start = self.used;
        let end = start + entry_length;

        self.put_header(start, entry_length, name.len(), 0, TYPE_LONG, UNITS_EVENTS, MONOTONIC);
        self.map[start + ENTRY_HEADER_SIZE..start + ENTRY_HEADER_SIZE + name.len()]
            .copy_from_slice(&name);
        self.put_i64(end - 8, value);

        self.used = end;
        self.publish();
        end - 8
    }

    /// Append a byte-vector string entry; returns the payload offset
    pub fn append_string(
        &mut self,
        name: &str,
        value: &str,
        vector_length: usize,
        variability: u8,
    ) -> usize {
        let name = name_field(name);
        let entry_length = align(ENTRY_HEADER_SIZE + name.len() + vector_length);
        let start = self.used;
        let payload = start + ENTRY_HEADER_SIZE + name.len();

        self.put_header(
            start,
            entry_length,
            name.len(),
            vector_length,
            TYPE_BYTE,
            UNITS_STRING,
            variability,
        );
        self.map[start + ENTRY_HEADER_SIZE..payload].copy_from_slice(&name);
        let text = &value.as_bytes()[..value.len().min(vector_length)];
        self.map[payload..payload + text.len()].copy_from_slice(text);

        self.used = start + entry_length;
        self.publish();
        payload
    }

    /// Write raw bytes at the end of the committed region without publishing
    pub fn write_unpublished(&mut self, bytes: &[u8]) {
        self.map[self.used..self.used + bytes.len()].copy_from_slice(bytes);
    }

    /// Publish `used` as `used + extra` without writing entry bytes
    pub fn advance_used(&mut self, extra: usize) {
        self.used += extra;
        self.publish();
    }

    /// Overwrite a long payload in place
    pub fn set_long(&mut self, offset: usize, value: i64) {
        self.put_i64(offset, value);
    }

    /// Overwrite the producer's overflow counter
    pub fn set_overflow(&mut self, overflow: u32) {
        self.put_u32(PROLOGUE_OVERFLOW_OFFSET, overflow);
    }

    /// Flip the accessible flag
    pub fn set_accessible(&mut self, accessible: bool) {
        self.map[PROLOGUE_ACCESSIBLE_OFFSET] = u8::from(accessible);
    }

    /// Force the raw `used` word, bypassing the producer bookkeeping
    pub fn force_used(&mut self, used: u32) {
        self.put_u32(PROLOGUE_USED_OFFSET, used);
    }

    #[allow(clippy::too_many_arguments)]
    fn put_header(
        &mut self,
        start: usize,
        entry_length: usize,
        name_length: usize,
        vector_length: usize,
        data_type: u8,
        units: u8,
        variability: u8,
    ) {
        self.put_u32(start, entry_length as u32);
        self.put_u32(start + 4, name_length as u32);
        self.put_u32(start + 8, vector_length as u32);
        self.map[start + 12..start + 16].copy_from_slice(&[
            data_type,
            EntryFlags::SUPPORTED.bits(),
            units,
            variability,
        ]);
    }

    /// Release-store the counters after the entry bytes
    fn publish(&mut self) {
        self.modified += 1;
        let modified = match self.order {
            ByteOrder::BigEndian => self.modified.to_be_bytes(),
            ByteOrder::LittleEndian => self.modified.to_le_bytes(),
        };
        let used = match self.order {
            ByteOrder::BigEndian => (self.used as u32).to_be_bytes(),
            ByteOrder::LittleEndian => (self.used as u32).to_le_bytes(),
        };
        // SAFETY: both words are in bounds and naturally aligned in a
        // page-aligned mapping owned by this producer
        unsafe {
            let base = self.map.as_mut_ptr();
            AtomicU64::from_ptr(base.add(PROLOGUE_MOD_TIMESTAMP_OFFSET).cast())
                .store(u64::from_ne_bytes(modified), Ordering::Release);
            AtomicU32::from_ptr(base.add(PROLOGUE_USED_OFFSET).cast())
                .store(u32::from_ne_bytes(used), Ordering::Release);
        }
    }

    fn put_u32(&mut self, offset: usize, value: u32) {
        let bytes = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.map[offset..offset + 4].copy_from_slice(&bytes);
    }

    fn put_i64(&mut self, offset: usize, value: i64) {
        let bytes = match self.order {
            ByteOrder::BigEndian => value.to_be_bytes(),
            ByteOrder::LittleEndian => value.to_le_bytes(),
        };
        self.map[offset..offset + 8].copy_from_slice(&bytes);
    }
}
