//! Platform-specific access to producer-owned memory

mod mmap;

pub use mmap::map_readonly;
