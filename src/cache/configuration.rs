//! Shared Cache Configuration
//!
//! Sizes the three region pools of the shared cache file and translates
//! addresses in two directions:
//!
//! - shared page index → physical offset in the single cache file
//! - byte position in a cached source file → logical region of that file
//!
//! # File Layout
//!
//! ```text
//! +----------------------+----------------------+----------------------+
//! | LARGE x num_large    | SMALL x num_small    | TINY x num_tiny      |
//! +----------------------+----------------------+----------------------+
//! 0                                                          total_size()
//! ```
//!
//! # Source File Regions
//!
//! ```text
//! +--------+----------+----------+-----------+--------+
//! | header | large 0  | large 1  | large 2.. | footer |
//! +--------+----------+----------+-----------+--------+
//! ```
//!
//! The header band (TINY or SMALL) and footer band (TINY) are optional.

use std::fmt;
use std::ops::{Range, RangeInclusive};

use serde::Serialize;

use super::byte_range::ByteRange;
use super::settings::SharedCacheSettings;
use super::{SMALL_REGION_SIZE, TINY_REGION_SIZE};
use crate::error::{Error, Result};

// =============================================================================
// Region Type
// =============================================================================

/// Size class of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    /// Configurable body region
    Large,
    /// 64KB header region
    Small,
    /// 1KB header or footer region
    Tiny,
}

impl RegionType {
    /// All region types in on-disk order
    pub const ALL: [RegionType; 3] = [RegionType::Large, RegionType::Small, RegionType::Tiny];

    /// Maximum size of a region of this type
    pub fn max_size(&self, configuration: &SharedCacheConfiguration) -> u64 {
        match self {
            RegionType::Large => configuration.large_region_size,
            RegionType::Small => SMALL_REGION_SIZE,
            RegionType::Tiny => TINY_REGION_SIZE,
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionType::Large => write!(f, "LARGE"),
            RegionType::Small => write!(f, "SMALL"),
            RegionType::Tiny => write!(f, "TINY"),
        }
    }
}

// =============================================================================
// Shared Cache Configuration
// =============================================================================

/// Immutable sizing of the shared cache, computed once at node startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SharedCacheConfiguration {
    /// Size of a large region
    large_region_size: u64,
    /// Number of large regions
    num_large_regions: usize,
    /// Number of small regions
    num_small_regions: usize,
    /// Number of tiny regions
    num_tiny_regions: usize,
}

impl SharedCacheConfiguration {
    /// Size the region pools from node settings
    ///
    /// Fails with [`Error::InvalidArgument`] when the settings are invalid or
    /// a non-empty cache would end up without any large region.
    pub fn new(settings: &SharedCacheSettings) -> Result<Self> {
        settings.validate()?;

        let cache_size = settings.cache_size.bytes();
        let large_region_size = settings.region_size.bytes();

        if cache_size == 0 {
            return Ok(Self::with_regions(large_region_size, 0, 0, 0));
        }

        let cache_size = cache_size as f64;
        let large_share = 1.0 - settings.small_region_share - settings.tiny_region_share;
        let num_large_regions = ((cache_size / large_region_size as f64) * large_share).round() as usize;
        let num_small_regions =
            (((cache_size / SMALL_REGION_SIZE as f64) * settings.small_region_share).round() as usize).max(1);
        let num_tiny_regions =
            (((cache_size / TINY_REGION_SIZE as f64) * settings.tiny_region_share).round() as usize).max(1);

        if num_large_regions == 0 {
            return Err(Error::InvalidArgument(format!(
                "no large regions available: cache size [{}] leaves no room for regions of size [{}]",
                settings.cache_size, settings.region_size
            )));
        }

        Ok(Self::with_regions(
            large_region_size,
            num_large_regions,
            num_small_regions,
            num_tiny_regions,
        ))
    }

    /// Build a configuration from explicit pool sizes
    ///
    /// `large_region_size` must already be validated: at least the small
    /// region size and a multiple of the tiny region size.
    pub(crate) fn with_regions(
        large_region_size: u64,
        num_large_regions: usize,
        num_small_regions: usize,
        num_tiny_regions: usize,
    ) -> Self {
        debug_assert!(large_region_size >= SMALL_REGION_SIZE);
        debug_assert!(
            large_region_size % TINY_REGION_SIZE == 0,
            "large region size {} is not a multiple of {}",
            large_region_size,
            TINY_REGION_SIZE
        );
        Self {
            large_region_size,
            num_large_regions,
            num_small_regions,
            num_tiny_regions,
        }
    }

    #[inline]
    pub fn large_region_size(&self) -> u64 {
        self.large_region_size
    }

    /// Total size in bytes of the shared cache file
    pub fn total_size(&self) -> u64 {
        TINY_REGION_SIZE * self.num_tiny_regions as u64
            + SMALL_REGION_SIZE * self.num_small_regions as u64
            + self.large_region_size * self.num_large_regions as u64
    }

    /// Check whether the cache is disabled
    pub fn is_disabled(&self) -> bool {
        self.total_size() == 0
    }

    /// Total number of shared pages across all pools
    pub fn num_regions(&self) -> usize {
        self.num_large_regions + self.num_small_regions + self.num_tiny_regions
    }

    /// Number of shared pages of the given type
    pub fn num_regions_of(&self, region_type: RegionType) -> usize {
        match region_type {
            RegionType::Large => self.num_large_regions,
            RegionType::Small => self.num_small_regions,
            RegionType::Tiny => self.num_tiny_regions,
        }
    }

    /// Shared page indices belonging to the given pool
    pub fn page_range(&self, region_type: RegionType) -> Range<usize> {
        let small_start = self.num_large_regions;
        let tiny_start = small_start + self.num_small_regions;
        match region_type {
            RegionType::Large => 0..small_start,
            RegionType::Small => small_start..tiny_start,
            RegionType::Tiny => tiny_start..self.num_regions(),
        }
    }

    /// Byte offset of a shared page in the cache file
    pub fn physical_offset(&self, page: usize) -> u64 {
        debug_assert!(
            page < self.num_regions(),
            "page {} out of {}",
            page,
            self.num_regions()
        );
        let large_block = self.large_region_size * self.num_large_regions as u64;
        if page < self.num_large_regions {
            return page as u64 * self.large_region_size;
        }
        let page = page - self.num_large_regions;
        if page < self.num_small_regions {
            return large_block + page as u64 * SMALL_REGION_SIZE;
        }
        let page = page - self.num_small_regions;
        large_block + SMALL_REGION_SIZE * self.num_small_regions as u64 + page as u64 * TINY_REGION_SIZE
    }

    /// Pool a shared page belongs to
    pub fn shared_region_type(&self, page: usize) -> RegionType {
        debug_assert!(page < self.num_regions());
        if page < self.num_large_regions {
            RegionType::Large
        } else if page < self.num_large_regions + self.num_small_regions {
            RegionType::Small
        } else {
            RegionType::Tiny
        }
    }

    /// Size of a shared page
    pub fn region_size_by_shared_page(&self, page: usize) -> u64 {
        self.shared_region_type(page).max_size(self)
    }

    /// Snap a requested header length to a cacheable region size
    ///
    /// Headers larger than a small region are not cached separately.
    pub fn effective_header_cache_range(&self, requested: u64) -> u64 {
        if requested == 0 || requested > SMALL_REGION_SIZE {
            0
        } else if requested > TINY_REGION_SIZE {
            SMALL_REGION_SIZE
        } else {
            TINY_REGION_SIZE
        }
    }

    /// Snap a requested footer length to a cacheable region size
    pub fn effective_footer_cache_range(&self, requested: u64) -> u64 {
        if requested > 0 && requested <= TINY_REGION_SIZE {
            TINY_REGION_SIZE
        } else {
            0
        }
    }

    /// Region layout of one cached source file
    pub fn file_regions(&self, file_size: u64, header_len: u64, footer_len: u64) -> FileRegions {
        FileRegions::new(self.large_region_size, file_size, header_len, footer_len)
    }

    /// Region of a source file containing `position`
    pub fn get_region(&self, position: u64, file_size: u64, header_len: u64, footer_len: u64) -> usize {
        self.file_regions(file_size, header_len, footer_len).region(position)
    }

    /// Region containing the last byte of a range ending at `end` (exclusive)
    pub fn get_ending_region(&self, end: u64, file_size: u64, header_len: u64, footer_len: u64) -> usize {
        self.file_regions(file_size, header_len, footer_len).ending_region(end)
    }

    /// Offset in the source file where `region` begins
    pub fn get_region_start(&self, region: usize, file_size: u64, header_len: u64, footer_len: u64) -> u64 {
        self.file_regions(file_size, header_len, footer_len).region_start(region)
    }

    /// Offset of `position` relative to the start of its region
    pub fn get_region_relative_position(
        &self,
        position: u64,
        file_size: u64,
        header_len: u64,
        footer_len: u64,
    ) -> u64 {
        self.file_regions(file_size, header_len, footer_len)
            .relative_position(position)
    }

    /// Size class of a source file region
    pub fn region_type(&self, region: usize, file_size: u64, header_len: u64, footer_len: u64) -> RegionType {
        self.file_regions(file_size, header_len, footer_len).region_type(region)
    }

    /// Actual byte length of a source file region
    pub fn get_region_size(&self, file_length: u64, region: usize, header_len: u64, footer_len: u64) -> u64 {
        self.file_regions(file_length, header_len, footer_len).region_size(region)
    }

    /// Number of large regions needed for the body of a source file
    pub fn large_regions(&self, file_length: u64, header_len: u64, footer_len: u64) -> usize {
        self.file_regions(file_length, header_len, footer_len).large_regions()
    }
}

// =============================================================================
// File Regions
// =============================================================================

/// Header, body and footer bands of one cached source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRegions {
    large_region_size: u64,
    file_size: u64,
    /// Requested header class size (0, TINY or SMALL)
    header_class: u64,
    /// Bytes actually covered by the header region
    header_len: u64,
    /// Bytes actually covered by the footer region
    footer_len: u64,
    large_regions: usize,
}

impl FileRegions {
    pub(crate) fn new(large_region_size: u64, file_size: u64, header_len: u64, footer_len: u64) -> Self {
        debug_assert!(large_region_size > 0);
        debug_assert!(
            header_len == 0 || header_len == TINY_REGION_SIZE || header_len == SMALL_REGION_SIZE,
            "header length {} is not an effective header cache range",
            header_len
        );
        debug_assert!(footer_len == 0 || footer_len == TINY_REGION_SIZE);

        let header = header_len.min(file_size);
        let footer = footer_len.min(file_size - header);
        let body = file_size - header - footer;
        let large_regions = body.div_ceil(large_region_size) as usize;

        Self {
            large_region_size,
            file_size,
            header_class: header_len,
            header_len: header,
            footer_len: footer,
            large_regions,
        }
    }

    #[inline]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    #[inline]
    fn has_header(&self) -> bool {
        self.header_len > 0
    }

    #[inline]
    fn has_footer(&self) -> bool {
        self.footer_len > 0
    }

    #[inline]
    fn first_large_region(&self) -> usize {
        self.has_header() as usize
    }

    #[inline]
    fn footer_region(&self) -> usize {
        self.first_large_region() + self.large_regions
    }

    #[inline]
    fn is_header(&self, region: usize) -> bool {
        self.has_header() && region == 0
    }

    #[inline]
    fn is_footer(&self, region: usize) -> bool {
        self.has_footer() && region == self.footer_region()
    }

    /// Number of large regions in the body
    #[inline]
    pub fn large_regions(&self) -> usize {
        self.large_regions
    }

    /// Total number of regions, header and footer included
    pub fn region_count(&self) -> usize {
        self.first_large_region() + self.large_regions + self.has_footer() as usize
    }

    /// Region containing `position`; a region boundary belongs to the following region
    pub fn region(&self, position: u64) -> usize {
        debug_assert!(
            position < self.file_size || position == 0,
            "position {} beyond file of size {}",
            position,
            self.file_size
        );
        if self.has_header() && position < self.header_len {
            return 0;
        }
        if self.has_footer() && self.file_size - position <= self.footer_len {
            return self.footer_region();
        }
        let body_position = position.saturating_sub(self.header_len);
        self.first_large_region() + (body_position / self.large_region_size) as usize
    }

    /// Region containing the byte just before `end`
    pub fn ending_region(&self, end: u64) -> usize {
        self.region(end.saturating_sub(1))
    }

    /// Offset in the file where `region` begins
    pub fn region_start(&self, region: usize) -> u64 {
        debug_assert!(region < self.region_count().max(1));
        if region == 0 {
            return 0;
        }
        if self.is_footer(region) {
            return self.file_size - self.footer_len;
        }
        self.header_len + (region - self.first_large_region()) as u64 * self.large_region_size
    }

    /// Offset of `position` relative to the start of its region
    pub fn relative_position(&self, position: u64) -> u64 {
        position - self.region_start(self.region(position))
    }

    /// Size class of `region`
    pub fn region_type(&self, region: usize) -> RegionType {
        if self.is_header(region) {
            if self.header_class <= TINY_REGION_SIZE {
                RegionType::Tiny
            } else {
                RegionType::Small
            }
        } else if self.is_footer(region) {
            RegionType::Tiny
        } else {
            RegionType::Large
        }
    }

    /// Actual length of `region`, truncated at the end of the file and before the footer
    pub fn region_size(&self, region: usize) -> u64 {
        debug_assert!(region < self.region_count().max(1));
        if self.is_header(region) {
            return self.header_len;
        }
        if self.is_footer(region) {
            return self.footer_len;
        }
        let body = self.file_size - self.header_len - self.footer_len;
        let consumed = (region - self.first_large_region()) as u64 * self.large_region_size;
        self.large_region_size.min(body.saturating_sub(consumed))
    }

    /// Byte range of the file covered by `region`
    pub fn region_range(&self, region: usize) -> ByteRange {
        let start = self.region_start(region);
        ByteRange::of(start, start + self.region_size(region))
    }

    /// Regions touched by `range`
    pub fn regions_for_range(&self, range: ByteRange) -> RangeInclusive<usize> {
        let first = self.region(range.start());
        let last = if range.is_empty() {
            first
        } else {
            self.ending_region(range.end())
        };
        first..=last
    }

    /// Iterate over `(region, type, range)` for every region of the file
    pub fn iter(&self) -> impl Iterator<Item = (usize, RegionType, ByteRange)> + '_ {
        (0..self.region_count()).map(move |region| {
            (region, self.region_type(region), self.region_range(region))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
