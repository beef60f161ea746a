//! Shared Snapshot Cache
//!
//! A single preallocated file on local disk holding fragments of remotely
//! stored snapshot files, split into fixed-size shared pages of three size
//! classes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     SharedCacheConfiguration                         │
//! │   pool sizing │ page -> physical offset │ file position -> region    │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                          SharedBytes                                 │
//! │  ┌────────────────┐   ┌─────────────────────┐   ┌────────────────┐   │
//! │  │ Page registry  │──▶│ Io (ref-counted)    │──▶│ CacheFile      │   │
//! │  │ (DashMap)      │   │ bounded pread/pwrite│   │ (strategy)     │   │
//! │  └────────────────┘   └─────────────────────┘   └────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callers map a byte position of a source file to its region with
//! [`SharedCacheConfiguration::get_region`], obtain the shared page they
//! assigned to that region with [`SharedBytes::get_io`], and read or write
//! through the returned [`IoRef`]. [`ByteRange`] describes which parts of a
//! region are populated. Deciding which pages to assign and evict is left to
//! the caller.

mod byte_range;
pub(crate) mod channel;
mod configuration;
pub mod copy;
mod io;
mod metrics;
mod ref_count;
mod settings;
mod shared_bytes;

#[cfg(test)]
mod proptest;

pub use byte_range::ByteRange;
pub use channel::ChannelStrategy;
pub use configuration::{FileRegions, RegionType, SharedCacheConfiguration};
pub use io::{Io, IoRef};
pub use metrics::{MetricsSnapshot, SharedBytesMetrics};
pub use ref_count::RefCount;
pub use settings::{ByteSize, SharedCacheSettings};
pub use shared_bytes::SharedBytes;

/// Size of a tiny region (1KB)
pub const TINY_REGION_SIZE: u64 = 1024;

/// Size of a small region (64KB)
pub const SMALL_REGION_SIZE: u64 = 64 * 1024;

/// Name of the shared cache file in a data path
pub const CACHE_FILE_NAME: &str = "shared_snapshot_cache";

// =============================================================================
// Tests
// =============================================================================
