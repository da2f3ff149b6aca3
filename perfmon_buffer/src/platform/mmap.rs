//! File-backed shared mappings

use crate::error::PerfResult;
use memmap2::{Mmap, MmapOptions};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::debug;

/// Map an existing instrumentation file read-only and shared.
///
/// The mapping is `MAP_SHARED`, so entries the producer appends after this
/// call become visible through it without remapping.
pub fn map_readonly(path: &Path) -> PerfResult<Mmap> {
    let file = OpenOptions::new().read(true).open(path)?;

    // SAFETY: the producer keeps rewriting counters and values in place, so
    // `RawBuffer` never hands out references into the mapping. It copies
    // bytes through the raw pointer and loads the publication counters
    // atomically, always within the length fixed here.
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    debug!(path = %path.display(), len = mmap.len(), "mapped instrumentation region");
    Ok(mmap)
}
