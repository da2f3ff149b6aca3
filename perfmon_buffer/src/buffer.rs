//! Bounds-checked, byte-order aware view over an instrumentation region
//!
//! A [`RawBuffer`] is either an owned snapshot or a read-only mapping of
//! memory that an external producer keeps writing. Every read copies the
//! requested bytes out of the region through a raw pointer; no reference into
//! the mapping ever escapes, so two reads of the same offset may observe
//! different values.
//!
//! The producer publishes an entry by writing its bytes first and the `used`
//! and modification counters last. [`RawBuffer::load_u32_acquire`] and
//! [`RawBuffer::load_i64_acquire`] read those counters with acquire ordering,
//! which orders every later copy after the publication it observed.

use crate::error::{PerfDataError, PerfResult};
use crate::platform;
use memmap2::Mmap;
use std::fmt;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering, fence};

/// Byte order of every multi-byte field after the magic number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Most significant byte first
    #[default]
    BigEndian,
    /// Least significant byte first
    LittleEndian,
}

impl ByteOrder {
    /// Order of the host this reader runs on
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::LittleEndian
        } else {
            Self::BigEndian
        }
    }
}

enum Backing {
    Owned(Box<[u8]>),
    Mapped(Mmap),
}

impl Backing {
    fn as_ptr(&self) -> *const u8 {
        match self {
            Self::Owned(bytes) => bytes.as_ptr(),
            Self::Mapped(mmap) => mmap.as_ptr(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Owned(bytes) => bytes.len(),
            Self::Mapped(mmap) => mmap.len(),
        }
    }

    fn is_shared(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

/// Fixed-capacity byte region with positioned reads
pub struct RawBuffer {
    backing: Backing,
    order: ByteOrder,
}

impl RawBuffer {
    /// Wrap an owned byte snapshot
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            backing: Backing::Owned(bytes.into()),
            order: ByteOrder::default(),
        }
    }

    /// Map a file-backed region read-only; producer writes stay visible
    pub fn map_file(path: impl AsRef<Path>) -> PerfResult<Self> {
        let mmap = platform::map_readonly(path.as_ref())?;
        Ok(Self {
            backing: Backing::Mapped(mmap),
            order: ByteOrder::default(),
        })
    }

    /// Fix the byte order; only the prologue reader does this, once
    pub(crate) fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Byte order used by multi-byte reads
    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    /// Region length in bytes
    pub fn capacity(&self) -> usize {
        self.backing.len()
    }

    fn check_range(&self, offset: usize, len: usize) -> PerfResult<()> {
        let capacity = self.capacity();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(PerfDataError::OutOfBounds {
                offset,
                len,
                capacity,
            }),
        }
    }

    /// Copy `dst.len()` bytes at `offset` into `dst`; the range is checked
    fn copy_into(&self, offset: usize, dst: &mut [u8]) -> PerfResult<()> {
        self.check_range(offset, dst.len())?;
        // SAFETY: `offset..offset + dst.len()` lies inside the backing region,
        // which outlives `self`. `dst` is a distinct local allocation.
        unsafe {
            let src = self.backing.as_ptr().add(offset);
            ptr::copy_nonoverlapping(src, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    fn read_array<const N: usize>(&self, offset: usize) -> PerfResult<[u8; N]> {
        let mut out = [0u8; N];
        self.copy_into(offset, &mut out)?;
        Ok(out)
    }

    /// Read one byte
    pub fn read_u8(&self, offset: usize) -> PerfResult<u8> {
        Ok(self.read_array::<1>(offset)?[0])
    }

    /// Read a 32-bit signed integer in the buffer's byte order
    pub fn read_i32(&self, offset: usize) -> PerfResult<i32> {
        let raw = self.read_array::<4>(offset)?;
        Ok(match self.order {
            ByteOrder::BigEndian => i32::from_be_bytes(raw),
            ByteOrder::LittleEndian => i32::from_le_bytes(raw),
        })
    }

    /// Read a 32-bit unsigned integer in the buffer's byte order
    pub fn read_u32(&self, offset: usize) -> PerfResult<u32> {
        Ok(self.decode_u32(self.read_array::<4>(offset)?))
    }

    /// Read a 32-bit unsigned integer big-endian regardless of byte order
    pub fn read_u32_be(&self, offset: usize) -> PerfResult<u32> {
        Ok(u32::from_be_bytes(self.read_array::<4>(offset)?))
    }

    /// Read a 64-bit signed integer in the buffer's byte order
    pub fn read_i64(&self, offset: usize) -> PerfResult<i64> {
        Ok(self.decode_i64(self.read_array::<8>(offset)?))
    }

    /// Read a producer-published 32-bit counter with acquire ordering.
    ///
    /// Every read issued after this one observes at least the bytes the
    /// producer wrote before storing the counter value returned here.
    pub fn load_u32_acquire(&self, offset: usize) -> PerfResult<u32> {
        self.check_range(offset, 4)?;
        // SAFETY: in bounds (checked above); the mapping outlives `self`
        let word = unsafe { self.backing.as_ptr().add(offset) } as *mut u32;
        let raw = if self.backing.is_shared() && word.is_aligned() {
            // SAFETY: aligned, in bounds, and only ever accessed by value
            unsafe { AtomicU32::from_ptr(word) }
                .load(Ordering::Acquire)
                .to_ne_bytes()
        } else {
            let raw = self.read_array::<4>(offset)?;
            fence(Ordering::Acquire);
            raw
        };
        Ok(self.decode_u32(raw))
    }

    /// Read a producer-published 64-bit counter with acquire ordering
    pub fn load_i64_acquire(&self, offset: usize) -> PerfResult<i64> {
        self.check_range(offset, 8)?;
        // SAFETY: in bounds (checked above); the mapping outlives `self`
        let word = unsafe { self.backing.as_ptr().add(offset) } as *mut u64;
        let raw = if self.backing.is_shared() && word.is_aligned() {
            // SAFETY: aligned, in bounds, and only ever accessed by value
            unsafe { AtomicU64::from_ptr(word) }
                .load(Ordering::Acquire)
                .to_ne_bytes()
        } else {
            let raw = self.read_array::<8>(offset)?;
            fence(Ordering::Acquire);
            raw
        };
        Ok(self.decode_i64(raw))
    }

    fn decode_u32(&self, raw: [u8; 4]) -> u32 {
        match self.order {
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
        }
    }

    fn decode_i64(&self, raw: [u8; 8]) -> i64 {
        match self.order {
            ByteOrder::BigEndian => i64::from_be_bytes(raw),
            ByteOrder::LittleEndian => i64::from_le_bytes(raw),
        }
    }

    /// Bounds-checked handle on `len` bytes starting at `offset`
    pub fn slice(&self, offset: usize, len: usize) -> PerfResult<ByteSlice<'_>> {
        self.check_range(offset, len)?;
        Ok(ByteSlice {
            buffer: self,
            offset,
            len,
        })
    }
}

impl fmt::Debug for RawBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.backing {
            Backing::Owned(_) => "owned",
            Backing::Mapped(_) => "mapped",
        };
        f.debug_struct("RawBuffer")
            .field("backing", &kind)
            .field("capacity", &self.capacity())
            .field("order", &self.order)
            .finish()
    }
}

/// Already bounds-checked sub-range of a [`RawBuffer`].
///
/// Holds a position, not the bytes; every accessor copies the current
/// contents out of the region.
#[derive(Clone, Copy)]
pub struct ByteSlice<'a> {
    buffer: &'a RawBuffer,
    offset: usize,
    len: usize,
}

impl ByteSlice<'_> {
    /// Start offset within the buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-length view
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy of the current bytes
    pub fn to_vec(&self) -> PerfResult<Vec<u8>> {
        let mut out = vec![0u8; self.len];
        self.buffer.copy_into(self.offset, &mut out)?;
        Ok(out)
    }

    /// Bytes up to (not including) the first NUL, decoded lossily
    pub fn to_c_string(&self) -> PerfResult<String> {
        let mut bytes = self.to_vec()?;
        if let Some(end) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(end);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Debug for ByteSlice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSlice")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}
