//! Shared Snapshot Cache Integration Tests
//!
//! Tests for:
//! - Cache file placement, sizing and removal
//! - Concurrent acquisition and release of page handles
//! - End-to-end mapping of source file positions to shared pages

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use assert_matches::assert_matches;
use tempfile::tempdir;

use snapcache::cache::{CACHE_FILE_NAME, SMALL_REGION_SIZE, TINY_REGION_SIZE};
use snapcache::{
    ByteRange, ByteSize, DataPaths, Error, NodeDataPaths, RegionType, SharedBytes,
    SharedCacheConfiguration, SharedCacheSettings,
};

const MB: u64 = 1024 * 1024;

/// Data paths reporting a fixed amount of free space per directory
struct FixedSpaceDataPaths {
    paths: Vec<(PathBuf, u64)>,
}

impl DataPaths for FixedSpaceDataPaths {
    fn candidate_paths(&self) -> Vec<PathBuf> {
        self.paths.iter().map(|(path, _)| path.clone()).collect()
    }

    fn usable_space(&self, path: &Path) -> io::Result<u64> {
        self.paths
            .iter()
            .find(|(candidate, _)| candidate == path)
            .map(|(_, space)| *space)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown data path"))
    }
}

fn configuration(cache_size: ByteSize) -> SharedCacheConfiguration {
    let settings = SharedCacheSettings {
        cache_size,
        region_size: ByteSize::kib(256),
        small_region_share: 0.1,
        tiny_region_share: 0.01,
    };
    SharedCacheConfiguration::new(&settings).unwrap()
}

// =============================================================================
// Cache File Placement
// =============================================================================

mod placement_tests {
    use super::*;

    #[test]
    fn test_cache_file_is_zero_initialised() {
        let dir = tempdir().unwrap();
        let config = configuration(ByteSize::mib(4));
        let bytes = SharedBytes::new(config, &NodeDataPaths::new([dir.path()])).unwrap();

        let contents = std::fs::read(dir.path().join(CACHE_FILE_NAME)).unwrap();
        assert_eq!(contents.len() as u64, config.total_size());
        assert!(contents.iter().all(|&b| b == 0));

        bytes.close();
    }

    #[test]
    fn test_disabled_cache_removes_stale_files_on_all_paths() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        for dir in [&first, &second] {
            std::fs::write(dir.path().join(CACHE_FILE_NAME), b"stale").unwrap();
        }

        let config = configuration(ByteSize(0));
        assert_eq!(config.total_size(), 0);

        let bytes = SharedBytes::new(config, &NodeDataPaths::new([first.path(), second.path()])).unwrap();

        assert!(bytes.path().is_none());
        assert!(!first.path().join(CACHE_FILE_NAME).exists());
        assert!(!second.path().join(CACHE_FILE_NAME).exists());
        bytes.close();
    }

    #[test]
    fn test_insufficient_space_everywhere_fails() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let config = configuration(ByteSize::mib(4));
        let paths = FixedSpaceDataPaths {
            paths: vec![
                (first.path().to_path_buf(), config.total_size() - 1),
                (second.path().to_path_buf(), config.total_size()),
            ],
        };

        let err = SharedBytes::new(config, &paths).unwrap_err();
        assert!(err.is_io());
        assert_matches!(err, Error::NoAdequateSpace { required } if required == config.total_size());
        assert!(!first.path().join(CACHE_FILE_NAME).exists());
    }

    #[test]
    fn test_first_path_with_space_is_chosen() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        let config = configuration(ByteSize::mib(4));
        let paths = FixedSpaceDataPaths {
            paths: vec![
                (first.path().to_path_buf(), 1024),
                (second.path().to_path_buf(), 64 * MB),
            ],
        };

        let bytes = SharedBytes::new(config, &paths).unwrap();
        assert_eq!(bytes.path(), Some(second.path().join(CACHE_FILE_NAME).as_path()));
        bytes.close();
    }

    #[test]
    fn test_existing_cache_file_counts_as_free_space() {
        let dir = tempdir().unwrap();
        let config = configuration(ByteSize::mib(4));
        let existing = dir.path().join(CACHE_FILE_NAME);
        std::fs::write(&existing, vec![0u8; config.total_size() as usize]).unwrap();

        let paths = FixedSpaceDataPaths {
            paths: vec![(dir.path().to_path_buf(), 1)],
        };

        let bytes = SharedBytes::new(config, &paths).unwrap();
        assert_eq!(bytes.path(), Some(existing.as_path()));
        assert_eq!(std::fs::metadata(&existing).unwrap().len(), config.total_size());
        bytes.close();
    }

    #[test]
    fn test_missing_data_path_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nodes").join("0");
        let bytes = SharedBytes::new(configuration(ByteSize::mib(4)), &NodeDataPaths::new([&nested])).unwrap();

        assert!(nested.join(CACHE_FILE_NAME).exists());
        bytes.close();
        assert!(!nested.join(CACHE_FILE_NAME).exists());
    }
}

// =============================================================================
// Concurrent Handle Lifecycle
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_concurrent_get_io_and_close_on_same_page() {
        let dir = tempdir().unwrap();
        let bytes = SharedBytes::new(configuration(ByteSize::mib(4)), &NodeDataPaths::new([dir.path()])).unwrap();
        assert!(bytes.configuration().num_regions() > 7);

        for _ in 0..200 {
            let existing = bytes.get_io(7).unwrap();
            let barrier = Arc::new(Barrier::new(3));

            let acquirers: Vec<_> = (0..2)
                .map(|_| {
                    let bytes = bytes.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        let io = bytes.get_io(7).unwrap();
                        assert!(io.ref_count() > 0);
                        io.write_all(&[1u8; 16], 0).unwrap();
                        let mut buf = [0u8; 16];
                        io.read_exact(&mut buf, 0).unwrap();
                        assert!(io.ref_count() > 0);
                    })
                })
                .collect();

            let closer = {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    existing.close();
                })
            };

            for handle in acquirers {
                handle.join().unwrap();
            }
            closer.join().unwrap();

            // every claim was released: only the owner's remains
            assert_eq!(bytes.ref_count(), 1);
            assert_eq!(bytes.registered_handles(), 0);
        }
        bytes.close();
        assert!(bytes.is_closed());
    }

    #[test]
    fn test_many_threads_share_pages() {
        let dir = tempdir().unwrap();
        let config = configuration(ByteSize::mib(4));
        let bytes = SharedBytes::new(config, &NodeDataPaths::new([dir.path()])).unwrap();
        let pages = config.num_regions();
        let stop = Arc::new(AtomicBool::new(false));

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let bytes = bytes.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    let mut iterations = 0usize;
                    while !stop.load(Ordering::Relaxed) || iterations < 500 {
                        let page = (worker * 31 + iterations * 7) % pages;
                        let io = bytes.get_io(page).unwrap();
                        let held = io.clone();
                        assert!(held.same_handle(&io));
                        assert!(io.ref_count() >= 2);
                        drop(held);
                        iterations += 1;
                    }
                })
            })
            .collect();

        stop.store(true, Ordering::Relaxed);
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(bytes.ref_count(), 1);
        assert_eq!(bytes.registered_handles(), 0);
        assert_eq!(bytes.metrics_snapshot().live_handles, 0);
        bytes.close();
    }

    #[test]
    fn test_owner_close_waits_for_outstanding_handles() {
        let dir = tempdir().unwrap();
        let bytes = SharedBytes::new(configuration(ByteSize::mib(4)), &NodeDataPaths::new([dir.path()])).unwrap();
        let path = bytes.path().unwrap().to_path_buf();

        let handles: Vec<_> = (0..4).map(|page| bytes.get_io(page).unwrap()).collect();
        bytes.close();

        let readers: Vec<_> = handles
            .into_iter()
            .map(|io| {
                thread::spawn(move || {
                    let mut buf = [0xffu8; 64];
                    io.read_exact(&mut buf, 0).unwrap();
                    assert_eq!(buf, [0u8; 64]);
                })
            })
            .collect();
        for reader in readers {
            reader.join().unwrap();
        }

        assert!(bytes.is_closed());
        assert!(!path.exists());
    }
}

// =============================================================================
// Source File Mapping
// =============================================================================

mod mapping_tests {
    use super::*;

    #[test]
    fn test_source_file_roundtrip_through_shared_pages() {
        let dir = tempdir().unwrap();
        let config = configuration(ByteSize::mib(4));
        let bytes = SharedBytes::new(config, &NodeDataPaths::new([dir.path()])).unwrap();

        // 600KB source file with a small header and a tiny footer
        let file: Vec<u8> = (0..600 * 1024u32).map(|i| (i % 239) as u8).collect();
        let file_size = file.len() as u64;
        let header = config.effective_header_cache_range(4000);
        let footer = config.effective_footer_cache_range(16);
        assert_eq!(header, SMALL_REGION_SIZE);
        assert_eq!(footer, TINY_REGION_SIZE);

        let regions = config.file_regions(file_size, header, footer);
        let mut next_page = std::collections::HashMap::new();
        let mut assigned = Vec::new();

        // caller-side assignment: one free page of the right type per region
        for (region, region_type, range) in regions.iter() {
            let pool = config.page_range(region_type);
            let taken = next_page.entry(region_type).or_insert(pool.start);
            let page = *taken;
            *taken += 1;
            assert!(pool.contains(&page));

            let io = bytes.get_io(page).unwrap();
            io.write_all(&file[range.start() as usize..range.end() as usize], 0)
                .unwrap();
            assigned.push((region, page));
        }

        let expected_types: Vec<RegionType> = regions.iter().map(|(_, t, _)| t).collect();
        assert_eq!(expected_types.first(), Some(&RegionType::Small));
        assert_eq!(expected_types.last(), Some(&RegionType::Tiny));

        // read an arbitrary span back through region lookups
        let span = ByteRange::of(60_000, 590_000);
        let mut out = Vec::new();
        for region in regions.regions_for_range(span) {
            let page = assigned[region].1;
            let region_range = regions.region_range(region);
            let wanted = span.overlap(&region_range);

            let io = bytes.get_io(page).unwrap();
            let mut buf = vec![0u8; wanted.length() as usize];
            io.read_exact(&mut buf, wanted.start() - region_range.start())
                .unwrap();
            out.extend_from_slice(&buf);
        }
        assert_eq!(out, &file[60_000..590_000]);
        bytes.close();
    }
}
