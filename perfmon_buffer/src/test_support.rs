//! In-memory buffer images for unit tests

use crate::buffer::ByteOrder;
use perfmon::consts::{
    BYTE_ORDER_BIG_ENDIAN, BYTE_ORDER_LITTLE_ENDIAN, ENTRY_ALIGNMENT, ENTRY_HEADER_SIZE,
    EntryFlags, PERFDATA_MAGIC, PROLOGUE_SIZE, SUPPORTED_MAJOR_VERSION, TYPE_BYTE, TYPE_LONG,
};

/// Raw field values of one entry, written verbatim
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub entry_length: i32,
    pub name_length: i32,
    pub vector_length: i32,
    pub data_type: u8,
    pub flags: u8,
    pub units: u8,
    pub variability: u8,
    pub body: Vec<u8>,
    /// Scalar written in the buffer's byte order after `body`
    pub long_value: Option<i64>,
}

impl RawEntry {
    pub fn long(name: &str, value: i64) -> Self {
        let name_field = name_field(name);
        let entry_length = align(ENTRY_HEADER_SIZE + name_field.len() + 8);
        let mut body = name_field.clone();
        body.resize(entry_length - ENTRY_HEADER_SIZE - 8, 0);
        Self {
            entry_length: entry_length as i32,
            name_length: name_field.len() as i32,
            vector_length: 0,
            data_type: TYPE_LONG,
            flags: EntryFlags::SUPPORTED.bits(),
            units: 4,
            variability: 2,
            body,
            long_value: Some(value),
        }
    }

    pub fn string(name: &str, value: &str, vector_length: usize, variability: u8) -> Self {
        let name_field = name_field(name);
        let entry_length = align(ENTRY_HEADER_SIZE + name_field.len() + vector_length);
        let mut body = name_field.clone();
        let mut payload = value.as_bytes().to_vec();
        payload.resize(vector_length, 0);
        body.extend_from_slice(&payload);
        body.resize(entry_length - ENTRY_HEADER_SIZE, 0);
        Self {
            entry_length: entry_length as i32,
            name_length: name_field.len() as i32,
            vector_length: vector_length as i32,
            data_type: TYPE_BYTE,
            flags: 0,
            units: 5,
            variability,
            body,
            long_value: None,
        }
    }

    fn encode(&self, order: ByteOrder) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENTRY_HEADER_SIZE + self.body.len());
        for field in [self.entry_length, self.name_length, self.vector_length] {
            out.extend_from_slice(&i32_bytes(field, order));
        }
        out.extend_from_slice(&[self.data_type, self.flags, self.units, self.variability]);
        out.extend_from_slice(&self.body);
        if let Some(value) = self.long_value {
            out.extend_from_slice(&match order {
                ByteOrder::BigEndian => value.to_be_bytes(),
                ByteOrder::LittleEndian => value.to_le_bytes(),
            });
        }
        out
    }
}

fn align(len: usize) -> usize {
    len.div_ceil(ENTRY_ALIGNMENT) * ENTRY_ALIGNMENT
}

fn name_field(name: &str) -> Vec<u8> {
    let mut field = name.as_bytes().to_vec();
    field.push(0);
    field.resize(align(field.len()), 0);
    field
}

fn i32_bytes(value: i32, order: ByteOrder) -> [u8; 4] {
    match order {
        ByteOrder::BigEndian => value.to_be_bytes(),
        ByteOrder::LittleEndian => value.to_le_bytes(),
    }
}

/// Builds a complete buffer image: prologue followed by entries
pub struct BufferBuilder {
    size: usize,
    order: ByteOrder,
    accessible: bool,
    used: Option<usize>,
    overflow: u32,
    modified: i64,
    entries: Vec<RawEntry>,
}

impl BufferBuilder {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            order: ByteOrder::BigEndian,
            accessible: true,
            used: None,
            overflow: 0,
            modified: 0,
            entries: Vec::new(),
        }
    }

    pub fn order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    pub fn accessible(mut self, accessible: bool) -> Self {
        self.accessible = accessible;
        self
    }

    pub fn used(mut self, used: usize) -> Self {
        self.used = Some(used);
        self
    }

    pub fn overflow(mut self, overflow: u32) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn modified(mut self, modified: i64) -> Self {
        self.modified = modified;
        self
    }

    pub fn entry(mut self, entry: RawEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut body = Vec::new();
        for entry in &self.entries {
            body.extend_from_slice(&entry.encode(self.order));
        }
        let used = self.used.unwrap_or(PROLOGUE_SIZE + body.len());

        let mut out = vec![0u8; self.size.max(PROLOGUE_SIZE + body.len())];
        out[0..4].copy_from_slice(&PERFDATA_MAGIC.to_be_bytes());
        out[4] = match self.order {
            ByteOrder::BigEndian => BYTE_ORDER_BIG_ENDIAN,
            ByteOrder::LittleEndian => BYTE_ORDER_LITTLE_ENDIAN,
        };
        out[5] = SUPPORTED_MAJOR_VERSION;
        out[6] = 0;
        out[7] = u8::from(self.accessible);
        let (used, overflow, size) = (used as u32, self.overflow, self.size as u32);
        let (modified, order) = (self.modified, self.order);
        match order {
            ByteOrder::BigEndian => {
                out[8..12].copy_from_slice(&used.to_be_bytes());
                out[12..16].copy_from_slice(&overflow.to_be_bytes());
                out[16..24].copy_from_slice(&modified.to_be_bytes());
                out[24..28].copy_from_slice(&size.to_be_bytes());
            }
            ByteOrder::LittleEndian => {
                out[8..12].copy_from_slice(&used.to_le_bytes());
                out[12..16].copy_from_slice(&overflow.to_le_bytes());
                out[16..24].copy_from_slice(&modified.to_le_bytes());
                out[24..28].copy_from_slice(&size.to_le_bytes());
            }
        }
        out[PROLOGUE_SIZE..PROLOGUE_SIZE + body.len()].copy_from_slice(&body);
        out
    }
}
