//! Node Environment
//!
//! Collaborators the shared cache needs from the node: the ordered list of
//! data paths it may place the cache file on, free-space queries for those
//! paths, and a file preallocation primitive.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cache::channel::open_rw;

/// Chunk size used when zero-filling a cache file
pub const ZERO_FILL_CHUNK_SIZE: usize = 1024 * 1024;

// =============================================================================
// Data Paths
// =============================================================================

/// Source of candidate directories for the shared cache file
pub trait DataPaths: Send + Sync {
    /// Candidate directories, in order of preference
    fn candidate_paths(&self) -> Vec<PathBuf>;

    /// Bytes available to this process on the filesystem holding `path`
    fn usable_space(&self, path: &Path) -> io::Result<u64>;
}

/// Data paths of a node, backed by the real filesystem
#[derive(Debug, Clone, Default)]
pub struct NodeDataPaths {
    paths: Vec<PathBuf>,
}

impl NodeDataPaths {
    /// Create from a list of data directories
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl DataPaths for NodeDataPaths {
    fn candidate_paths(&self) -> Vec<PathBuf> {
        self.paths.clone()
    }

    fn usable_space(&self, path: &Path) -> io::Result<u64> {
        usable_space(path)
    }
}

/// Bytes available to unprivileged users on the filesystem holding `path`
#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
pub fn usable_space(path: &Path) -> io::Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"))?;

    // SAFETY: statvfs only writes into the zeroed struct we hand it
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(unix))]
pub fn usable_space(path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("cannot query free space of {}", path.display()),
    ))
}

// =============================================================================
// Preallocation
// =============================================================================

/// Size the file at `path` to exactly `len` bytes
///
/// Uses the platform's fast preallocation where available, then zero-fills
/// any remaining shortfall so every byte reads back as zero, or truncates a
/// file that is too long. Existing contents below `len` are kept.
pub fn preallocate(path: &Path, len: u64) -> io::Result<()> {
    let file = open_rw(path)?;

    if let Err(e) = fast_preallocate(&file, len) {
        warn!(
            path = %path.display(),
            error = %e,
            "Fast preallocation failed, falling back to zero-fill"
        );
    }

    let current = file.metadata()?.len();
    if current < len {
        debug!(path = %path.display(), from = current, to = len, "Zero-filling cache file");
        zero_fill(&file, current, len)?;
    } else if current > len {
        debug!(path = %path.display(), from = current, to = len, "Truncating cache file");
        file.set_len(len)?;
    }
    file.sync_all()
}

fn zero_fill(file: &File, from: u64, to: u64) -> io::Result<()> {
    use std::io::{Seek, SeekFrom, Write};

    let zeros = vec![0u8; ZERO_FILL_CHUNK_SIZE];
    let mut writer = file;
    writer.seek(SeekFrom::Start(from))?;

    let mut remaining = to - from;
    while remaining > 0 {
        let chunk = remaining.min(ZERO_FILL_CHUNK_SIZE as u64) as usize;
        writer.write_all(&zeros[..chunk])?;
        remaining -= chunk as u64;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn fast_preallocate(file: &File, len: u64) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    if file.metadata()?.len() >= len {
        return Ok(());
    }
    let len = libc::off_t::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "file too large"))?;
    // SAFETY: the descriptor stays open for the duration of the call
    let rc = unsafe { libc::posix_fallocate(file.as_raw_fd(), 0, len) };
    if rc != 0 {
        return Err(io::Error::from_raw_os_error(rc));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn fast_preallocate(_file: &File, _len: u64) -> io::Result<()> {
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
