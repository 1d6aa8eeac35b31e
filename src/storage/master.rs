//! # Master Page
//!
//! Page 0 holds the 48-byte master header, the single point the whole
//! database state hangs off:
//!
//! ```text
//! Offset  Size  Field       Description
//! ------  ----  ----------  ---------------------------------------
//! 0       16    signature   File format identifier
//! 16      8     root        B+tree root page (0 = empty tree)
//! 24      8     page_used   Allocation high-water mark, in pages
//! 32      8     free_head   Head of the free-list chain (0 = empty)
//! 40      8     version     Commit version, +1 per write commit
//! ```
//!
//! The header is rewritten (and fsynced) only as the second phase of a
//! commit, after the referenced pages are already durable, which is what
//! makes a commit atomic under the crash model.

use eyre::{ensure, Result};
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{MASTER_HEADER_SIZE, MASTER_SIG};
use crate::error::StoreError;
use crate::zerocopy_accessors;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MasterPage {
    signature: [u8; 16],
    root: U64,
    page_used: U64,
    free_head: U64,
    version: U64,
}

const _: () = assert!(std::mem::size_of::<MasterPage>() == MASTER_HEADER_SIZE);

impl MasterPage {
    /// Header for a freshly created database: empty tree, empty free list,
    /// version zero, only the master page itself allocated.
    pub fn new() -> Self {
        MasterPage {
            signature: *MASTER_SIG,
            root: U64::new(0),
            page_used: U64::new(1),
            free_head: U64::new(0),
            version: U64::new(0),
        }
    }

    /// Parses and signature-checks a header from the start of page 0.
    pub fn read_from(bytes: &[u8]) -> Result<Self> {
        ensure!(
            bytes.len() >= MASTER_HEADER_SIZE,
            "buffer too small for master page: {} < {}",
            bytes.len(),
            MASTER_HEADER_SIZE
        );
        let header = Self::ref_from_bytes(&bytes[..MASTER_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse master page: {e:?}"))?;
        if &header.signature != MASTER_SIG {
            return Err(StoreError::corrupt("bad signature in master page").into());
        }
        Ok(*header)
    }

    /// Structural checks against the actual file size.
    pub fn validate(&self, file_pages: u64) -> Result<()> {
        let fail = |reason: String| -> Result<()> { Err(StoreError::corrupt(reason).into()) };
        if self.page_used() == 0 || self.page_used() > file_pages {
            return fail(format!(
                "page_used {} outside file of {} pages",
                self.page_used(),
                file_pages
            ));
        }
        if self.root() >= self.page_used() && self.root() != 0 {
            return fail(format!(
                "root page {} beyond page_used {}",
                self.root(),
                self.page_used()
            ));
        }
        if self.free_head() >= self.page_used() && self.free_head() != 0 {
            return fail(format!(
                "free-list head {} beyond page_used {}",
                self.free_head(),
                self.page_used()
            ));
        }
        Ok(())
    }

    zerocopy_accessors! {
        root: u64,
        page_used: u64,
        free_head: u64,
        version: u64,
    }
}

impl Default for MasterPage {
    fn default() -> Self {
        Self::new()
    }
}
