// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Peak-allocation tracking for per-trial memory deltas.
//!
//! The library never installs a global allocator. A binary that wants memory
//! figures opts in:
//!
//! ```rust,ignore
//! use fulltext_bench::bench::TrackingAllocator;
//!
//! #[global_allocator]
//! static ALLOC: TrackingAllocator = TrackingAllocator;
//! ```
//!
//! Without it every [`MemoryProbe`] reads 0.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static CURRENT_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_BYTES: AtomicUsize = AtomicUsize::new(0);
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// System allocator wrapper that tracks live and peak bytes.
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        CURRENT_BYTES.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                record_alloc(new_size - layout.size());
            } else {
                CURRENT_BYTES.fetch_sub(layout.size() - new_size, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}

fn record_alloc(size: usize) {
    ACTIVE.store(true, Ordering::Relaxed);
    let now = CURRENT_BYTES.fetch_add(size, Ordering::Relaxed) + size;
    PEAK_BYTES.fetch_max(now, Ordering::Relaxed);
}

/// Whether [`TrackingAllocator`] is the global allocator of this process.
#[must_use]
pub fn is_tracking() -> bool {
    ACTIVE.load(Ordering::Relaxed)
}

/// Live heap bytes.
#[must_use]
pub fn current_bytes() -> usize {
    CURRENT_BYTES.load(Ordering::Relaxed)
}

/// Memory delta of one trial: peak usage during the trial minus usage
/// immediately before it.
#[derive(Debug)]
pub struct MemoryProbe {
    baseline: usize,
}

impl MemoryProbe {
    /// Reset the peak to the current usage and remember it as the baseline.
    #[must_use]
    pub fn start() -> Self {
        let baseline = CURRENT_BYTES.load(Ordering::Relaxed);
        PEAK_BYTES.store(baseline, Ordering::Relaxed);
        Self { baseline }
    }

    /// Bytes above the baseline at the highest point since `start`.
    #[must_use]
    pub fn peak_delta(&self) -> u64 {
        let peak = PEAK_BYTES.load(Ordering::Relaxed);
        peak.saturating_sub(self.baseline) as u64
    }
}
