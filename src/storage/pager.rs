//! # Pager
//!
//! Owns the database file and its mappings, and performs the I/O half of a
//! commit. The pager never decides *what* to write — the transaction layer
//! hands it finished page images — it only knows *how*: grow the file with
//! headroom, copy images into the mapping, fsync, publish the master page,
//! fsync again.
//!
//! Opening validates the file (size a whole number of pages, master-page
//! signature, in-bounds root and free-list head) and takes an exclusive
//! advisory lock so two handles cannot interleave commits on one file.

use std::fs::{File, OpenOptions};
use std::path::Path;

use eyre::{ensure, Result, WrapErr};

use crate::config::PAGE_SIZE;
use crate::error::StoreError;
use crate::storage::{ChunkList, MasterPage, PageNum, PageRead};

#[derive(Debug)]
pub struct Pager {
    file: File,
    chunks: ChunkList,
    file_size: u64,
    /// Pages durably part of the database as of the last commit.
    page_flushed: u64,
}

impl Pager {
    /// Opens or creates the database file, returning the pager and the
    /// master page it starts from.
    pub fn open(path: &Path, mmap_size: usize) -> Result<(Pager, MasterPage)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)
            .wrap_err_with(|| format!("failed to open database file '{}'", path.display()))?;
        lock_exclusive(&file)?;

        let metadata = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?;
        let mut file_size = metadata.len();
        let created = file_size == 0;
        if created {
            file.set_len(PAGE_SIZE as u64)
                .wrap_err("failed to size new database file")?;
            file_size = PAGE_SIZE as u64;
        }
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(StoreError::corrupt(format!(
                "file size {file_size} is not a multiple of the page size"
            ))
            .into());
        }

        let chunks = ChunkList::init(&file, file_size, mmap_size)?;
        let master = if created {
            let master = MasterPage::new();
            chunks.write_slice(0, zerocopy::IntoBytes::as_bytes(&master))?;
            chunks.flush()?;
            file.sync_all().wrap_err("fsync after database creation")?;
            master
        } else {
            let master = MasterPage::read_from(chunks.page(0)?)
                .wrap_err_with(|| format!("while opening '{}'", path.display()))?;
            master.validate(file_size / PAGE_SIZE as u64)?;
            master
        };

        chunks.prefetch(0, master.page_used().min(1024));

        let pager = Pager {
            file,
            chunks,
            file_size,
            page_flushed: master.page_used(),
        };
        Ok((pager, master))
    }

    pub fn page_flushed(&self) -> u64 {
        self.page_flushed
    }

    pub fn set_page_flushed(&mut self, pages: u64) {
        self.page_flushed = pages;
    }

    pub fn chunks(&self) -> &ChunkList {
        &self.chunks
    }

    /// Grows the file and the mapping to cover `npages`. The file jumps to
    /// `file_pages * 9/8 + 1` (~12.5% headroom), raised to `npages` when
    /// that alone does not cover the need. Growth is the writer's
    /// privilege; readers keep the chunk list they captured.
    pub fn grow_for(&mut self, npages: u64) -> Result<()> {
        let file_pages = self.file_size / PAGE_SIZE as u64;
        if file_pages < npages {
            let target = (file_pages + file_pages / 8 + 1).max(npages);
            let new_size = target * PAGE_SIZE as u64;
            self.file
                .set_len(new_size)
                .wrap_err_with(|| format!("failed to extend file to {new_size} bytes"))?;
            self.file_size = new_size;
        }
        self.chunks.extend(&self.file, npages * PAGE_SIZE as u64)
    }

    /// Copies a finished page image into the mapping.
    pub fn write_page(&self, ptr: PageNum, bytes: &[u8]) -> Result<()> {
        ensure!(
            bytes.len() == PAGE_SIZE,
            "page image is {} bytes, expected {}",
            bytes.len(),
            PAGE_SIZE
        );
        self.chunks.write_slice(ptr, bytes)
    }

    /// Hardens everything written so far. The fsync is the barrier between
    /// commit phases: data pages must be durable before the master page
    /// names them.
    pub fn sync(&self) -> Result<()> {
        self.chunks.flush()?;
        self.file.sync_all().wrap_err("fsync")
    }

    /// Phase 2: writes the master page and makes the commit durable.
    pub fn publish_master(&self, master: &MasterPage) -> Result<()> {
        self.chunks
            .write_slice(0, zerocopy::IntoBytes::as_bytes(master))?;
        self.sync()
    }
}

impl PageRead for Pager {
    fn page(&self, ptr: PageNum) -> Result<&[u8]> {
        ensure!(
            ptr < self.page_flushed,
            "page {} out of bounds (page_flushed={})",
            ptr,
            self.page_flushed
        );
        self.chunks.page(ptr)
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == std::io::ErrorKind::WouldBlock {
            return Err(StoreError::AlreadyOpen.into());
        }
        return Err(eyre::Report::new(err).wrap_err("flock"));
    }
    Ok(())
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> Result<()> {
    Ok(())
}
