//! Positional I/O Channels
//!
//! Access strategy for the shared cache file. Where the platform offers true
//! positional reads and writes (`pread`/`pwrite`), every page shares a
//! single handle. Elsewhere positional access moves the file cursor, so each
//! region type gets its own handle serialised by a mutex.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use parking_lot::Mutex;
use serde::Serialize;

use super::configuration::RegionType;

/// How pages of the cache file are mapped onto file handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStrategy {
    /// One handle shared by all pages
    Shared,
    /// One mutex-guarded handle per region type
    PerRegionType,
}

impl ChannelStrategy {
    /// Strategy suited to the current platform
    pub fn for_platform() -> Self {
        if cfg!(unix) {
            ChannelStrategy::Shared
        } else {
            ChannelStrategy::PerRegionType
        }
    }
}

impl Default for ChannelStrategy {
    fn default() -> Self {
        Self::for_platform()
    }
}

enum Channels {
    Shared(File),
    PerRegionType([Mutex<File>; 3]),
}

/// Open handles onto the shared cache file
pub(crate) struct CacheFile {
    channels: Channels,
}

impl CacheFile {
    /// Open an existing cache file with the given strategy
    pub(crate) fn open(path: &Path, strategy: ChannelStrategy) -> io::Result<Self> {
        let channels = match strategy {
            ChannelStrategy::Shared => Channels::Shared(open_rw(path)?),
            ChannelStrategy::PerRegionType => Channels::PerRegionType([
                Mutex::new(open_rw(path)?),
                Mutex::new(open_rw(path)?),
                Mutex::new(open_rw(path)?),
            ]),
        };
        Ok(Self { channels })
    }

    pub(crate) fn strategy(&self) -> ChannelStrategy {
        match self.channels {
            Channels::Shared(_) => ChannelStrategy::Shared,
            Channels::PerRegionType(_) => ChannelStrategy::PerRegionType,
        }
    }

    /// Read at an absolute file offset
    pub(crate) fn read_at(&self, region_type: RegionType, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        match &self.channels {
            Channels::Shared(file) => positional::read_at(file, buf, offset),
            Channels::PerRegionType(files) => {
                let file = files[slot(region_type)].lock();
                positional::read_at(&file, buf, offset)
            }
        }
    }

    /// Write at an absolute file offset
    pub(crate) fn write_at(&self, region_type: RegionType, buf: &[u8], offset: u64) -> io::Result<usize> {
        match &self.channels {
            Channels::Shared(file) => positional::write_at(file, buf, offset),
            Channels::PerRegionType(files) => {
                let file = files[slot(region_type)].lock();
                positional::write_at(&file, buf, offset)
            }
        }
    }

    /// Flush file contents to the device
    pub(crate) fn sync_data(&self) -> io::Result<()> {
        match &self.channels {
            Channels::Shared(file) => file.sync_data(),
            Channels::PerRegionType(files) => {
                for file in files {
                    file.lock().sync_data()?;
                }
                Ok(())
            }
        }
    }
}

fn slot(region_type: RegionType) -> usize {
    match region_type {
        RegionType::Large => 0,
        RegionType::Small => 1,
        RegionType::Tiny => 2,
    }
}

pub(crate) fn open_rw(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

#[cfg(unix)]
mod positional {
    use std::fs::File;
    use std::io;
    use std::os::unix::fs::FileExt;

    pub(super) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        file.read_at(buf, offset)
    }

    pub(super) fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.write_at(buf, offset)
    }
}

#[cfg(windows)]
mod positional {
    use std::fs::File;
    use std::io;
    use std::os::windows::fs::FileExt;

    pub(super) fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        file.seek_read(buf, offset)
    }

    pub(super) fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.seek_write(buf, offset)
    }
}

#[cfg(not(any(unix, windows)))]
mod positional {
    use std::fs::File;
    use std::io::{self, Read, Seek, SeekFrom, Write};

    pub(super) fn read_at(mut file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }

    pub(super) fn write_at(mut file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
        file.seek(SeekFrom::Start(offset))?;
        file.write(buf)
    }
}

// =============================================================================
// Tests
// =============================================================================
