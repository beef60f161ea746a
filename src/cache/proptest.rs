//! Property-Based Tests for Cache Addressing
//!
//! # Test Properties
//!
//! 1. **Range Arithmetic**: length, envelope containment, symmetric overlap
//! 2. **Physical Layout**: offsets strictly increase and tile the file
//! 3. **Region Coverage**: every byte of a source file lands in exactly one
//!    region, and regions tile the file in order

#![cfg(test)]

use proptest::prelude::*;

use super::byte_range::ByteRange;
use super::configuration::{RegionType, SharedCacheConfiguration};
use super::{SMALL_REGION_SIZE, TINY_REGION_SIZE};

// =============================================================================
// Property Strategies
// =============================================================================

fn range_strategy() -> impl Strategy<Value = ByteRange> {
    (0u64..1_000_000, 0u64..1_000_000).prop_map(|(start, len)| ByteRange::of(start, start + len))
}

/// Large region sizes from the small region size up to 1MB
fn large_region_strategy() -> impl Strategy<Value = u64> {
    (1u64..=16).prop_map(|n| n * SMALL_REGION_SIZE)
}

fn configuration_strategy() -> impl Strategy<Value = SharedCacheConfiguration> {
    (large_region_strategy(), 0usize..20, 0usize..20, 0usize..40).prop_map(
        |(large, num_large, num_small, num_tiny)| {
            SharedCacheConfiguration::with_regions(large, num_large, num_small, num_tiny)
        },
    )
}

fn header_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![Just(0), Just(TINY_REGION_SIZE), Just(SMALL_REGION_SIZE)]
}

fn footer_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![Just(0), Just(TINY_REGION_SIZE)]
}

// =============================================================================
// Range Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_length(start in 0u64..u32::MAX as u64, len in 0u64..u32::MAX as u64) {
        prop_assert_eq!(ByteRange::of(start, start + len).length(), len);
    }

    #[test]
    fn prop_envelope_contains_both(a in range_strategy(), b in range_strategy()) {
        let envelope = a.min_envelope(b);
        prop_assert!(a.is_sub_range_of(&envelope));
        prop_assert!(b.is_sub_range_of(&envelope));
        prop_assert_eq!(envelope, b.min_envelope(a));
    }

    #[test]
    fn prop_overlap_symmetric(a in range_strategy(), b in range_strategy()) {
        prop_assert_eq!(a.has_overlap(&b), b.has_overlap(&a));
        if a.has_overlap(&b) {
            let overlap = a.overlap(&b);
            prop_assert!(overlap.is_sub_range_of(&a));
            prop_assert!(overlap.is_sub_range_of(&b));
            prop_assert!(!overlap.is_empty());
        }
    }
}

// =============================================================================
// Physical Layout Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_physical_offsets_tile_file(config in configuration_strategy()) {
        let pages = config.num_regions();
        let mut expected = 0u64;
        for page in 0..pages {
            let offset = config.physical_offset(page);
            prop_assert_eq!(offset, expected);
            expected = offset + config.region_size_by_shared_page(page);
        }
        prop_assert_eq!(expected, config.total_size());
    }

    #[test]
    fn prop_pools_in_order(config in configuration_strategy()) {
        let mut previous: Option<RegionType> = None;
        for region_type in RegionType::ALL {
            for page in config.page_range(region_type) {
                prop_assert_eq!(config.shared_region_type(page), region_type);
            }
            if let Some(previous) = previous {
                prop_assert_eq!(config.page_range(previous).end, config.page_range(region_type).start);
            }
            previous = Some(region_type);
        }
    }
}

// =============================================================================
// Region Coverage Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_regions_tile_source_file(
        large in large_region_strategy(),
        file_size in 1u64..5_000_000,
        header in header_strategy(),
        footer in footer_strategy(),
    ) {
        let config = SharedCacheConfiguration::with_regions(large, 1, 1, 1);
        let regions = config.file_regions(file_size, header, footer);

        let mut expected_start = 0u64;
        for (region, region_type, range) in regions.iter() {
            prop_assert_eq!(range.start(), expected_start);
            prop_assert!(!range.is_empty());
            prop_assert!(range.length() <= region_type.max_size(&config));
            prop_assert_eq!(regions.region(range.start()), region);
            prop_assert_eq!(regions.region(range.end() - 1), region);
            prop_assert_eq!(regions.ending_region(range.end()), region);
            expected_start = range.end();
        }
        prop_assert_eq!(expected_start, file_size);
    }

    #[test]
    fn prop_position_in_its_region(
        large in large_region_strategy(),
        file_size in 1u64..5_000_000,
        position_seed in any::<u64>(),
        header in header_strategy(),
        footer in footer_strategy(),
    ) {
        let config = SharedCacheConfiguration::with_regions(large, 1, 1, 1);
        let position = position_seed % file_size;

        let region = config.get_region(position, file_size, header, footer);
        let start = config.get_region_start(region, file_size, header, footer);
        let size = config.get_region_size(file_size, region, header, footer);

        prop_assert!(start <= position && position < start + size);
        prop_assert_eq!(
            config.get_region_relative_position(position, file_size, header, footer),
            position - start
        );
    }
}
