//! # Storage Layer
//!
//! This module owns everything that touches the database file: the memory
//! mappings, the master page, the persistent free list, and the pager that
//! ties them together.
//!
//! ## Architecture Overview
//!
//! The file is an array of 4096-byte pages addressed by [`PageNum`] (the
//! byte offset is `PageNum × 4096`). Page 0 is the master page; it names the
//! current B+tree root, the allocation high-water mark, the free-list head,
//! and the commit version. Everything else is a B+tree node or a free-list
//! node.
//!
//! Reads are zero-copy: page lookups return `&[u8]` slices pointing straight
//! into the memory mapping. The mapping may be larger than the file; when
//! coverage runs out, a further mapping is appended rather than remapping,
//! so outstanding slices never move. A snapshot of the chunk list is cheap
//! (`Arc` per chunk) and stays valid for as long as a reader holds it.
//!
//! ## Copy-on-write and durability
//!
//! Committed pages are never modified. A write transaction accumulates new
//! page images in an overlay keyed by page number, then hardens them in two
//! phases: copy the images into the mapping and fsync, then rewrite the
//! master page and fsync again. A crash between the phases leaves the old
//! master pointing at the old tree; the partially written pages are
//! unreferenced garbage.
//!
//! Freed pages go to a persistent free list ([`FreeListData`]) and are only
//! handed out again once no live reader's snapshot can still reach them,
//! which is what makes lock-free snapshot reads sound.
//!
//! ## Module Organization
//!
//! - `mmap`: mapping chunks and the append-only growth policy
//! - `master`: master-page codec and validation
//! - `freelist`: versioned free-page list, in-memory cache + on-disk chain
//! - `pager`: file lifecycle, page lookup, growth, two-phase commit I/O

mod freelist;
mod master;
mod mmap;
mod pager;

pub use freelist::{ChainStore, FreeEntry, FreeListData};
pub use master::MasterPage;
pub use mmap::ChunkList;
pub use pager::Pager;

use eyre::Result;

/// 64-bit page index; multiplied by the page size it gives the file offset.
/// Zero is the master page and doubles as the null sentinel in references.
pub type PageNum = u64;

/// Read half of the pager capability the B+tree operates through.
pub trait PageRead {
    /// Returns the page-sized byte slice behind `ptr`.
    fn page(&self, ptr: PageNum) -> Result<&[u8]>;
}

/// Full pager capability: reads plus copy-on-write allocation.
///
/// The tree hands every page it produces to `alloc` and reports every page
/// it unreferences to `dealloc`; the transaction layer accounts for both at
/// commit time. Implementations decide where page numbers come from (the
/// free list, the append tail, or a plain counter in tests).
pub trait PageStore: PageRead {
    /// Stores a freshly built page and returns its page number.
    fn alloc(&mut self, page: Box<[u8]>) -> Result<PageNum>;

    /// Marks a page as unreferenced by the tree being built.
    fn dealloc(&mut self, ptr: PageNum);
}
