//! Explicit runtime context, replacing the process-wide globals the
//! original Python implementation keeps (a memory-map temp-file counter
//! and a decompression-bomb pixel guard). Constructed once by the
//! caller and threaded down into `image::load` and `Workers::new`
//! (spec §9 design note).

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, explicit runtime state. Cheap to clone (an `Arc` internally
/// would be overkill here — the counter and config fields are copy or
/// reference-counted where it matters).
#[derive(Debug)]
pub struct RuntimeContext {
    /// Upper bound on total pixels a single `raster::load` call will decode;
    /// mirrors `PIL.Image.MAX_IMAGE_PIXELS` in the original, but explicit
    /// rather than a process-wide mutation of a third-party library's global.
    pub max_image_pixels: u64,
    /// Directory memory-mapped scratch rasters are created in.
    pub scratch_dir: PathBuf,
    mmap_counter: AtomicU64,
}

impl RuntimeContext {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_image_pixels: 4_000_000_000,
            scratch_dir: scratch_dir.into(),
            mmap_counter: AtomicU64::new(0),
        }
    }

    /// Build a unique path for a memory-mapped scratch raster, keyed by
    /// process id, thread id, and a monotonic counter so concurrent workers
    /// never collide (spec §5 "Memory-mapped rasters").
    pub fn next_mmap_path(&self, suffix: &str) -> PathBuf {
        let counter = self.mmap_counter.fetch_add(1, Ordering::Relaxed);
        let pid = process::id();
        let tid = thread_id();
        self.scratch_dir.join(format!("nornir-{pid}-{tid}-{counter}-{suffix}"))
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

fn thread_id() -> u64 {
    // std::thread::ThreadId has no stable numeric conversion; hash it instead.
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmap_paths_are_unique() {
        let ctx = RuntimeContext::new(std::env::temp_dir());
        let a = ctx.next_mmap_path("raster");
        let b = ctx.next_mmap_path("raster");
        assert_ne!(a, b);
    }
}
