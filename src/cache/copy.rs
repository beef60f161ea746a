//! Bulk Copy Helpers
//!
//! Stream data between shared pages and ordinary readers/writers. Writes go
//! out in whole tiny-region chunks so the page is always populated in
//! aligned blocks.

use std::io::{self, Read, Write};

use super::io::Io;
use super::TINY_REGION_SIZE;
use crate::error::{Error, Result};

/// Copy `length` bytes from `input` into `io` starting at `position`
///
/// `buf` is the scratch buffer and must be a non-empty multiple of the tiny
/// region size. `position` must be tiny-aligned. The final partial chunk is
/// zero-padded to alignment.
/// `progress` receives the running number of bytes copied after each chunk.
pub fn copy_to_cache_file_aligned<R: Read + ?Sized>(
    io: &Io,
    input: &mut R,
    position: u64,
    length: u64,
    buf: &mut [u8],
    mut progress: impl FnMut(u64),
) -> Result<u64> {
    assert!(
        !buf.is_empty() && buf.len() as u64 % TINY_REGION_SIZE == 0,
        "copy buffer of {} bytes is not a multiple of {}",
        buf.len(),
        TINY_REGION_SIZE
    );
    if position % TINY_REGION_SIZE != 0 {
        return Err(Error::InvalidArgument(format!(
            "copy position [{}] is not aligned to {}",
            position, TINY_REGION_SIZE
        )));
    }
    io.check_offsets(position, length)?;

    let mut copied = 0u64;
    while copied < length {
        let want = (length - copied).min(buf.len() as u64) as usize;
        let filled = fill(input, &mut buf[..want])?;
        if filled < want {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "input ended after {} of {} bytes",
                    copied + filled as u64,
                    length
                ),
            )
            .into());
        }

        let aligned = align_up(filled as u64) as usize;
        buf[filled..aligned].fill(0);
        write_all_aligned(io, &buf[..aligned], position + copied)?;

        copied += filled as u64;
        progress(copied);
    }
    Ok(copied)
}

/// Copy `length` bytes of `io` starting at `position` into `output`
pub fn read_cache_file<W: Write + ?Sized>(
    io: &Io,
    position: u64,
    length: u64,
    output: &mut W,
    buf: &mut [u8],
) -> Result<u64> {
    assert!(!buf.is_empty(), "copy buffer must not be empty");
    io.check_offsets(position, length)?;

    let mut copied = 0u64;
    while copied < length {
        let want = (length - copied).min(buf.len() as u64) as usize;
        io.read_exact(&mut buf[..want], position + copied)?;
        output.write_all(&buf[..want])?;
        copied += want as u64;
    }
    Ok(copied)
}

fn write_all_aligned(io: &Io, mut src: &[u8], mut position: u64) -> Result<()> {
    while !src.is_empty() {
        let written = io.write_aligned(src, position)?;
        if written == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "failed to write to cache file").into());
        }
        src = &src[written..];
        position += written as u64;
    }
    Ok(())
}

fn fill<R: Read + ?Sized>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[inline]
fn align_up(len: u64) -> u64 {
    len.div_ceil(TINY_REGION_SIZE) * TINY_REGION_SIZE
}

// =============================================================================
// Tests
// =============================================================================
