//! Shared Cache Metrics
//!
//! Lock-free counters for traffic through the shared cache file and for the
//! I/O handles handed out on its pages.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters owned by a [`SharedBytes`](super::SharedBytes)
#[derive(Debug, Default)]
pub struct SharedBytesMetrics {
    reads: AtomicU64,
    writes: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    handles_created: AtomicU64,
    handles_released: AtomicU64,
}

impl SharedBytesMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_read(&self, bytes: usize) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_write(&self, bytes: usize) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_handle_created(&self) {
        self.handles_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handle_released(&self) {
        self.handles_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Handles created but not yet fully released
    pub fn live_handles(&self) -> u64 {
        let created = self.handles_created.load(Ordering::Relaxed);
        let released = self.handles_released.load(Ordering::Relaxed);
        created.saturating_sub(released)
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            handles_created: self.handles_created.load(Ordering::Relaxed),
            live_handles: self.live_handles(),
        }
    }
}

/// Point-in-time metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub handles_created: u64,
    pub live_handles: u64,
}
