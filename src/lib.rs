//! Shared Snapshot Cache
//!
//! Local on-disk cache for fragments of index files that live in a remote
//! snapshot repository. All cached data lives in one preallocated file per
//! node, divided into large, small and tiny shared pages.
//!
//! # Architecture
//!
//! ```text
//! Settings → SharedCacheConfiguration → SharedBytes → IoRef (pread/pwrite)
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Region layout, address translation and the shared cache file
//! - [`environment`] - Data paths, free space and file preallocation
//! - [`error`] - Error types
//!
//! # Lifecycle
//!
//! ```no_run
//! use snapcache::{ByteSize, NodeDataPaths, SharedBytes, SharedCacheConfiguration, SharedCacheSettings};
//!
//! # fn main() -> snapcache::Result<()> {
//! let settings = SharedCacheSettings::with_cache_size(ByteSize::gib(1));
//! let configuration = SharedCacheConfiguration::new(&settings)?;
//! let shared_bytes = SharedBytes::new(configuration, &NodeDataPaths::new(["/var/lib/node/data"]))?;
//!
//! let io = shared_bytes.get_io(0)?;
//! io.write_all(b"fragment", 0)?;
//! io.close();
//!
//! shared_bytes.close();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod environment;
pub mod error;

// Re-export commonly used types
pub use cache::{
    ByteRange, ByteSize, ChannelStrategy, IoRef, RegionType, SharedBytes, SharedCacheConfiguration,
    SharedCacheSettings,
};
pub use environment::{DataPaths, NodeDataPaths};
pub use error::{Error, Result};
