//! Shared Bytes
//!
//! Owner of the single preallocated cache file. Hands out reference-counted
//! [`IoRef`] handles for positional access to individual shared pages.
//!
//! # Lifetime
//!
//! ```text
//! owner claim ─┐
//! Io claim ────┼──▶ RefCount ──(0)──▶ close handles + delete file
//! Io claim ────┘
//! ```
//!
//! The owner releases its claim with [`SharedBytes::close`]. Each live
//! [`Io`] holds one more claim, so the file outlives every handle.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::channel::{CacheFile, ChannelStrategy};
use super::configuration::SharedCacheConfiguration;
use super::io::{Io, IoRef};
use super::metrics::{MetricsSnapshot, SharedBytesMetrics};
use super::ref_count::RefCount;
use super::CACHE_FILE_NAME;
use crate::environment::{preallocate, DataPaths};
use crate::error::{Error, Result};

/// The shared cache file and its registry of live page handles
pub struct SharedBytes {
    /// Pool sizing and address translation
    configuration: SharedCacheConfiguration,
    /// Location of the cache file (None when the cache is disabled)
    path: Option<PathBuf>,
    /// Open handles, dropped once the last claim is released
    file: RwLock<Option<CacheFile>>,
    /// Page index -> current I/O handle
    ios: DashMap<usize, Arc<Io>>,
    /// Owner claim plus one claim per live Io
    refs: RefCount,
    /// Whether the owner already released its claim
    owner_released: AtomicBool,
    /// Traffic counters
    metrics: SharedBytesMetrics,
}

impl SharedBytes {
    /// Create the shared cache file on the first data path with enough room
    pub fn new(configuration: SharedCacheConfiguration, data_paths: &dyn DataPaths) -> Result<Arc<Self>> {
        Self::with_strategy(configuration, data_paths, ChannelStrategy::for_platform())
    }

    /// Create the shared cache file using an explicit positional I/O strategy
    pub fn with_strategy(
        configuration: SharedCacheConfiguration,
        data_paths: &dyn DataPaths,
        strategy: ChannelStrategy,
    ) -> Result<Arc<Self>> {
        let total_size = configuration.total_size();

        let (path, file) = if total_size == 0 {
            for dir in data_paths.candidate_paths() {
                delete_stale_cache_file(&dir.join(CACHE_FILE_NAME))?;
            }
            info!("Shared snapshot cache disabled");
            (None, None)
        } else {
            let path = find_cache_file_path(data_paths, total_size)?;
            preallocate(&path, total_size)?;
            let file = CacheFile::open(&path, strategy)?;
            info!(
                path = %path.display(),
                size = total_size,
                regions = configuration.num_regions(),
                strategy = ?strategy,
                "Created shared snapshot cache file"
            );
            (Some(path), Some(file))
        };

        Ok(Arc::new(Self {
            configuration,
            path,
            file: RwLock::new(file),
            ios: DashMap::new(),
            refs: RefCount::new(),
            owner_released: AtomicBool::new(false),
            metrics: SharedBytesMetrics::new(),
        }))
    }

    /// Get a live handle on a shared page
    ///
    /// Reuses the registered handle if it still has claims, otherwise
    /// registers a fresh one. The registry entry is locked for the whole
    /// update, so a handle being released concurrently is never revived.
    pub fn get_io(self: &Arc<Self>, page: usize) -> Result<IoRef> {
        match self.ios.entry(page) {
            Entry::Occupied(mut entry) => {
                if entry.get().try_inc_ref() {
                    return Ok(IoRef::new(entry.get().clone()));
                }
                let io = self.new_io(page)?;
                debug!(page, "Replaced released I/O handle");
                entry.insert(io.clone());
                Ok(IoRef::new(io))
            }
            Entry::Vacant(entry) => {
                let io = self.new_io(page)?;
                debug!(page, "Registered I/O handle");
                entry.insert(io.clone());
                Ok(IoRef::new(io))
            }
        }
    }

    fn new_io(self: &Arc<Self>, page: usize) -> Result<Arc<Io>> {
        if !self.refs.try_inc_ref() {
            return Err(Error::AlreadyClosed);
        }
        match Io::new(self.clone(), page) {
            Ok(io) => {
                self.metrics.record_handle_created();
                Ok(Arc::new(io))
            }
            Err(e) => {
                self.release();
                Err(e)
            }
        }
    }

    /// Called by an Io once its last claim is gone
    pub(super) fn release_io(&self, io: &Io) {
        self.ios
            .remove_if(&io.page_index(), |_, current| std::ptr::eq(Arc::as_ptr(current), io));
        self.metrics.record_handle_released();
        self.release();
    }

    /// Run `op` against the open cache file
    pub(super) fn with_file<T>(&self, op: impl FnOnce(&CacheFile) -> io::Result<T>) -> Result<T> {
        let guard = self.file.read();
        match guard.as_ref() {
            Some(file) => Ok(op(file)?),
            None => Err(Error::AlreadyClosed),
        }
    }

    pub(super) fn metrics(&self) -> &SharedBytesMetrics {
        &self.metrics
    }

    /// Byte offset of a shared page in the cache file
    pub fn physical_offset(&self, page: usize) -> u64 {
        self.configuration.physical_offset(page)
    }

    pub fn configuration(&self) -> &SharedCacheConfiguration {
        &self.configuration
    }

    /// Location of the cache file, if the cache is enabled
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Positional I/O strategy in use, if the cache is enabled
    pub fn strategy(&self) -> Option<ChannelStrategy> {
        self.file.read().as_ref().map(CacheFile::strategy)
    }

    /// Outstanding claims: the owner's plus one per live handle
    pub fn ref_count(&self) -> u32 {
        self.refs.ref_count()
    }

    /// Number of registered page handles
    pub fn registered_handles(&self) -> usize {
        self.ios.len()
    }

    /// Check whether the cache file has been physically closed
    pub fn is_closed(&self) -> bool {
        !self.refs.has_references()
    }

    /// Flush written pages to the device
    pub fn sync(&self) -> Result<()> {
        self.with_file(CacheFile::sync_data)
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Release the owner's claim
    ///
    /// The file is closed and deleted once every outstanding handle has been
    /// released as well. Calling this more than once has no further effect.
    pub fn close(&self) {
        if !self.owner_released.swap(true, Ordering::AcqRel) {
            self.release();
        }
    }

    fn release(&self) {
        if self.refs.dec_ref() {
            self.close_internal();
        }
    }

    fn close_internal(&self) {
        let file = self.file.write().take();
        drop(file);

        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => info!(path = %path.display(), "Deleted shared snapshot cache file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to delete shared snapshot cache file"
                ),
            }
        }
    }
}

impl Drop for SharedBytes {
    fn drop(&mut self) {
        if self.file.get_mut().is_some() {
            warn!("Shared snapshot cache dropped without being closed");
            self.close_internal();
        }
    }
}

impl std::fmt::Debug for SharedBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBytes")
            .field("configuration", &self.configuration)
            .field("path", &self.path)
            .field("ref_count", &self.ref_count())
            .field("registered_handles", &self.registered_handles())
            .finish()
    }
}

/// First candidate path whose filesystem can hold the cache file
///
/// Space taken by an existing cache file counts as usable since it is
/// resized in place.
fn find_cache_file_path(data_paths: &dyn DataPaths, total_size: u64) -> Result<PathBuf> {
    for dir in data_paths.candidate_paths() {
        fs::create_dir_all(&dir)?;
        let file = dir.join(CACHE_FILE_NAME);

        let mut usable = data_paths.usable_space(&dir)?;
        if let Ok(metadata) = fs::metadata(&file) {
            usable = usable.saturating_add(metadata.len());
        }

        if usable > total_size {
            return Ok(file);
        }
        warn!(
            path = %dir.display(),
            usable,
            required = total_size,
            "Not enough free space for shared snapshot cache file"
        );
    }
    Err(Error::NoAdequateSpace {
        required: total_size,
    })
}

fn delete_stale_cache_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!(path = %path.display(), "Deleted stale shared snapshot cache file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Tests
// =============================================================================
