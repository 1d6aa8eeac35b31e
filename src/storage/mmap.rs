//! # Memory-Mapped Chunks
//!
//! The file is covered by one or more memory-mapped regions ("chunks"). The
//! first chunk is created at open, sized `max(file size, configured mmap
//! size)` rounded up to a power of two; it may extend past the end of the
//! file, which is harmless as long as nobody dereferences beyond the file's
//! last page. When the file outgrows the mapped range, a new chunk is
//! appended at the current mapping boundary — existing chunks are never
//! resized, moved, or unmapped before close, so a reader that captured the
//! chunk list keeps valid slices for its whole lifetime.
//!
//! ## Safety Model
//!
//! Chunks are shared between concurrent readers and the single writer, so
//! page access goes through a raw base pointer captured at map time rather
//! than through `MmapMut`'s `Deref`/`DerefMut` (which would demand exclusive
//! access for writes). The aliasing discipline is enforced one level up by
//! MVCC:
//!
//! - at most one writer exists ([`writer_mu`](crate::database::Database)),
//! - the writer only ever writes pages no reader snapshot can reach
//!   (fresh append-tail pages, or free-list pages whose freeing version
//!   precedes every live reader),
//! - readers only dereference pages reachable from their snapshot root.
//!
//! So a byte range is never written while any other thread may read it.

use std::fs::File;
use std::sync::Arc;

use eyre::{bail, ensure, Result, WrapErr};
use memmap2::{MmapMut, MmapOptions};

use crate::config::{DEFAULT_MMAP_SIZE, PAGE_SIZE};
use crate::storage::PageNum;

/// One mapped region of the file.
#[derive(Debug)]
struct Chunk {
    /// Keeps the mapping alive; all access goes through `base`.
    map: MmapMut,
    base: *mut u8,
}

// SAFETY: the raw base pointer refers to a MAP_SHARED region whose lifetime
// is tied to `map`. Cross-thread access is coordinated by the transaction
// layer (single serialized writer, readers confined to their snapshots), so
// no byte is concurrently written and read.
unsafe impl Send for Chunk {}
unsafe impl Sync for Chunk {}

impl Chunk {
    fn map(file: &File, offset: u64, len: usize) -> Result<Arc<Chunk>> {
        // SAFETY: mapping a file we hold open with exclusive write access
        // (enforced by the open-time file lock); the mapping is dropped
        // only when the last reader snapshot and the pager are gone.
        let map = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(len)
                .map_mut(file)
                .wrap_err_with(|| format!("failed to map {len} bytes at offset {offset}"))?
        };
        let base = map.as_ptr() as *mut u8;
        Ok(Arc::new(Chunk { map, base }))
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn slice(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.len());
        // SAFETY: within the mapping, and never aliased by a concurrent
        // write per the module safety model.
        unsafe { std::slice::from_raw_parts(self.base.add(offset), len) }
    }

    /// Writer-only. Copies `bytes` into the mapping.
    fn write(&self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= self.len());
        // SAFETY: the caller is the single writer and the target range is
        // unreachable from every reader snapshot (see module docs).
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.add(offset), bytes.len());
        }
    }

    fn flush(&self) -> Result<()> {
        self.map.flush().wrap_err("msync failed")
    }
}

/// Ordered list of mapping chunks covering the file from offset zero.
///
/// Cloning is cheap (one `Arc` bump per chunk) and is how reader snapshots
/// capture the mapping state at `begin_read`.
#[derive(Debug, Clone)]
pub struct ChunkList {
    chunks: Vec<Arc<Chunk>>,
    total: u64,
}

impl ChunkList {
    /// Creates the initial mapping covering at least the whole file.
    pub fn init(file: &File, file_size: u64, initial: usize) -> Result<Self> {
        let size = file_size
            .max(initial as u64)
            .max(PAGE_SIZE as u64)
            .next_power_of_two();
        ensure!(
            size % PAGE_SIZE as u64 == 0,
            "mmap size {size} is not a multiple of the page size"
        );
        let chunk = Chunk::map(file, 0, size as usize)?;
        Ok(ChunkList {
            chunks: vec![chunk],
            total: size,
        })
    }

    /// Bytes of address space currently mapped (may exceed the file size).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Ensures at least `need` bytes are mapped, appending a new chunk of at
    /// least the current total (doubled until sufficient).
    pub fn extend(&mut self, file: &File, need: u64) -> Result<()> {
        if need <= self.total {
            return Ok(());
        }
        let mut alloc = self.total.max(DEFAULT_MMAP_SIZE as u64);
        while self.total + alloc < need {
            alloc *= 2;
        }
        let chunk = Chunk::map(file, self.total, alloc as usize)?;
        self.chunks.push(chunk);
        self.total += alloc;
        Ok(())
    }

    /// Returns the page-sized slice behind `ptr`.
    pub fn page(&self, ptr: PageNum) -> Result<&[u8]> {
        let mut start: u64 = 0;
        for chunk in &self.chunks {
            let pages = (chunk.len() / PAGE_SIZE) as u64;
            if ptr < start + pages {
                let offset = (ptr - start) as usize * PAGE_SIZE;
                return Ok(chunk.slice(offset, PAGE_SIZE));
            }
            start += pages;
        }
        bail!("page {ptr} is beyond the mapped range ({start} pages mapped)");
    }

    /// Writer-only. Copies `bytes` to the start of page `ptr`.
    pub fn write_slice(&self, ptr: PageNum, bytes: &[u8]) -> Result<()> {
        ensure!(
            bytes.len() <= PAGE_SIZE,
            "write of {} bytes exceeds the page size",
            bytes.len()
        );
        let mut start: u64 = 0;
        for chunk in &self.chunks {
            let pages = (chunk.len() / PAGE_SIZE) as u64;
            if ptr < start + pages {
                let offset = (ptr - start) as usize * PAGE_SIZE;
                chunk.write(offset, bytes);
                return Ok(());
            }
            start += pages;
        }
        bail!("page {ptr} is beyond the mapped range ({start} pages mapped)");
    }

    /// Flushes every chunk with `msync`.
    pub fn flush(&self) -> Result<()> {
        for chunk in &self.chunks {
            chunk.flush()?;
        }
        Ok(())
    }

    /// Hints the kernel to fault in a page range ahead of use.
    pub fn prefetch(&self, start_page: PageNum, count: u64) {
        #[cfg(unix)]
        {
            let mut start: u64 = 0;
            for chunk in &self.chunks {
                let pages = (chunk.len() / PAGE_SIZE) as u64;
                if start_page < start + pages {
                    let first = (start_page - start) as usize;
                    let n = count.min(pages - (start_page - start)) as usize;
                    // SAFETY: the range lies inside this chunk's mapping;
                    // MADV_WILLNEED is advisory and has no effect on the
                    // mapping's contents.
                    unsafe {
                        libc::madvise(
                            chunk.base.add(first * PAGE_SIZE) as *mut libc::c_void,
                            n * PAGE_SIZE,
                            libc::MADV_WILLNEED,
                        );
                    }
                    return;
                }
                start += pages;
            }
        }
        #[cfg(not(unix))]
        {
            let _ = (start_page, count);
        }
    }
}
