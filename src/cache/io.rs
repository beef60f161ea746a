//! Shared Page I/O
//!
//! [`Io`] gives bounded positional access to one shared page of the cache
//! file. Callers hold it through [`IoRef`], an owned claim on the handle:
//! cloning takes another claim, dropping or closing releases one. When the
//! last claim goes away the handle unregisters itself and releases its own
//! claim on the [`SharedBytes`] parent.

use std::fmt;
use std::io;
use std::ops::Deref;
use std::sync::Arc;

use super::configuration::RegionType;
use super::ref_count::RefCount;
use super::shared_bytes::SharedBytes;
use super::TINY_REGION_SIZE;
use crate::error::{Error, Result};

/// Handle on one shared page of the cache file
pub struct Io {
    parent: Arc<SharedBytes>,
    page_index: usize,
    /// Absolute offset of the page in the cache file
    page_start: u64,
    region_type: RegionType,
    region_size: u64,
    refs: RefCount,
}

impl Io {
    /// Build a handle; the caller has already claimed `parent`
    pub(super) fn new(parent: Arc<SharedBytes>, page_index: usize) -> Result<Self> {
        let configuration = parent.configuration();
        let pages = configuration.num_regions();
        if page_index >= pages {
            return Err(Error::PageOutOfRange {
                page: page_index,
                pages,
            });
        }
        let page_start = configuration.physical_offset(page_index);
        let region_type = configuration.shared_region_type(page_index);
        let region_size = region_type.max_size(configuration);

        Ok(Self {
            parent,
            page_index,
            page_start,
            region_type,
            region_size,
            refs: RefCount::new(),
        })
    }

    pub(super) fn try_inc_ref(&self) -> bool {
        self.refs.try_inc_ref()
    }

    #[inline]
    pub fn page_index(&self) -> usize {
        self.page_index
    }

    #[inline]
    pub fn page_start(&self) -> u64 {
        self.page_start
    }

    #[inline]
    pub fn region_type(&self) -> RegionType {
        self.region_type
    }

    /// Maximum number of bytes the page holds
    #[inline]
    pub fn size(&self) -> u64 {
        self.region_size
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.ref_count()
    }

    /// Reject access to `[position, position + length)` outside the page
    ///
    /// Out-of-bounds access is a caller bug: debug builds panic, release
    /// builds return [`Error::OutOfBounds`].
    pub fn check_offsets(&self, position: u64, length: u64) -> Result<()> {
        let in_bounds = matches!(position.checked_add(length), Some(end) if end <= self.region_size);
        debug_assert!(
            in_bounds,
            "access at {} of {} bytes is out of bounds for page {} of {} bytes",
            position,
            length,
            self.page_index,
            self.region_size
        );
        if !in_bounds {
            return Err(Error::OutOfBounds {
                position,
                length,
                region_size: self.region_size,
            });
        }
        Ok(())
    }

    /// Read into `dst` from `position` within the page
    ///
    /// Like a positional read, this may fill less than `dst` and returns 0
    /// at the end of the file.
    pub fn read(&self, dst: &mut [u8], position: u64) -> Result<usize> {
        self.check_offsets(position, dst.len() as u64)?;
        let offset = self.page_start + position;
        let read = self
            .parent
            .with_file(|file| file.read_at(self.region_type, dst, offset))?;
        self.parent.metrics().record_read(read);
        Ok(read)
    }

    /// Fill `dst` completely from `position` within the page
    pub fn read_exact(&self, mut dst: &mut [u8], mut position: u64) -> Result<()> {
        self.check_offsets(position, dst.len() as u64)?;
        while !dst.is_empty() {
            let read = self.read(dst, position)?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "end of cache file reached while reading page",
                )
                .into());
            }
            dst = &mut dst[read..];
            position += read as u64;
        }
        Ok(())
    }

    /// Write `src` at `position` within the page, returning the bytes written
    pub fn write(&self, src: &[u8], position: u64) -> Result<usize> {
        self.check_offsets(position, src.len() as u64)?;
        let offset = self.page_start + position;
        let written = self
            .parent
            .with_file(|file| file.write_at(self.region_type, src, offset))?;
        self.parent.metrics().record_write(written);
        Ok(written)
    }

    /// Write all of `src` at `position` within the page
    pub fn write_all(&self, mut src: &[u8], mut position: u64) -> Result<()> {
        self.check_offsets(position, src.len() as u64)?;
        while !src.is_empty() {
            let written = self.write(src, position)?;
            if written == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write to cache file",
                )
                .into());
            }
            src = &src[written..];
            position += written as u64;
        }
        Ok(())
    }

    /// Write `src` at `position`, both aligned to the tiny region size
    pub fn write_aligned(&self, src: &[u8], position: u64) -> Result<usize> {
        debug_assert!(
            position % TINY_REGION_SIZE == 0,
            "position {} not aligned to {}",
            position,
            TINY_REGION_SIZE
        );
        debug_assert!(
            src.len() as u64 % TINY_REGION_SIZE == 0,
            "length {} not aligned to {}",
            src.len(),
            TINY_REGION_SIZE
        );
        self.write(src, position)
    }
}

impl fmt::Debug for Io {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Io")
            .field("page_index", &self.page_index)
            .field("page_start", &self.page_start)
            .field("region_type", &self.region_type)
            .field("refs", &self.refs.ref_count())
            .finish()
    }
}

// =============================================================================
// IoRef
// =============================================================================

/// One outstanding claim on an [`Io`]
pub struct IoRef {
    io: Arc<Io>,
}

impl IoRef {
    /// Wrap a handle whose claim the caller already took
    pub(super) fn new(io: Arc<Io>) -> Self {
        Self { io }
    }

    /// Release this claim
    pub fn close(self) {
        drop(self)
    }

    /// Check whether two claims refer to the same handle
    pub fn same_handle(&self, other: &IoRef) -> bool {
        Arc::ptr_eq(&self.io, &other.io)
    }
}

impl Deref for IoRef {
    type Target = Io;

    fn deref(&self) -> &Io {
        &self.io
    }
}

impl Clone for IoRef {
    fn clone(&self) -> Self {
        self.io.refs.inc_ref();
        Self {
            io: self.io.clone(),
        }
    }
}

impl Drop for IoRef {
    fn drop(&mut self) {
        if self.io.refs.dec_ref() {
            self.io.parent.release_io(&self.io);
        }
    }
}

impl fmt::Debug for IoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.io.fmt(f)
    }
}

// =============================================================================
// Tests
// =============================================================================
