//! # Transactions
//!
//! One writer at a time, any number of snapshot readers.
//!
//! A [`ReadTransaction`] is three captured values — tree root, version, and
//! the mapping chunk list — plus a slot in the reader registry. The snapshot
//! stays coherent without any further locking: pages it can reach are either
//! still referenced by newer versions, or sit in the free list tagged with a
//! version the registry entry holds back from reuse.
//!
//! A [`WriteTransaction`] owns the writer mutex for its whole lifetime. Tree
//! operations run against a transient [`BTree`] whose pager capability is
//! routed through the transaction: reads consult the overlay before the
//! mapping, allocations pop the free list (guarded by the minimum reader
//! version) or reserve append-tail page numbers, and deallocations record
//! tombstones. Nothing touches the file until `commit`:
//!
//! 1. freed pages are pushed onto the free list under the new version and
//!    the list's chain is rewritten through the same overlay,
//! 2. file and mapping grow to cover the final page count,
//! 3. overlay pages are copied into the mapping and fsynced,
//! 4. the master page is rewritten and fsynced,
//! 5. the new root/version/free-list/chunk state is published under the
//!    registry lock.
//!
//! An error before step 4 rolls back by discarding the transaction — shared
//! state was never touched. After the data fsync, a failed master write is
//! surfaced as an error with the old version still durable on disk.

use eyre::{ensure, Result, WrapErr};
use hashbrown::HashMap;
use parking_lot::MutexGuard;

use crate::btree::{BTree, TreeIter};
use crate::config::PAGE_SIZE;
use crate::storage::{
    ChainStore, ChunkList, FreeListData, MasterPage, PageNum, PageRead, PageStore, Pager,
};

use super::readers::ReaderHandle;
use super::Shared;

/// Conflict policy for [`WriteTransaction::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Insert or replace.
    Upsert,
    /// Replace only; absent keys are left absent.
    UpdateOnly,
    /// Insert only; present keys are left untouched.
    InsertOnly,
}

/// Frozen view of one committed version.
pub struct ReadTransaction {
    pub(crate) shared: std::sync::Arc<Shared>,
    pub(crate) version: u64,
    pub(crate) tree: BTree,
    pub(crate) chunks: ChunkList,
    pub(crate) handle: Option<ReaderHandle>,
}

impl ReadTransaction {
    /// The commit version this snapshot observes.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn root(&self) -> PageNum {
        self.tree.root()
    }

    /// Point lookup against the snapshot.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.tree.get(self, key)
    }

    /// Positions a cursor at the greatest key ≤ `key`.
    pub fn seek_le(&self, key: &[u8]) -> Result<TreeIter<'_, Self>> {
        self.tree.seek_le(self, key)
    }
}

impl PageRead for ReadTransaction {
    fn page(&self, ptr: PageNum) -> Result<&[u8]> {
        self.chunks.page(ptr)
    }
}

impl Drop for ReadTransaction {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.shared.state.lock().readers.deregister(handle);
        }
    }
}

/// Exclusive writer. Holds the writer mutex until `commit` or drop; dropping
/// without committing aborts (shared state is untouched until publish).
pub struct WriteTransaction<'db> {
    pub(crate) shared: &'db Shared,
    pub(crate) pager: MutexGuard<'db, Pager>,
    pub(crate) tree: BTree,
    pub(crate) root_at_begin: PageNum,
    pub(crate) version: u64,
    pub(crate) min_reader: u64,
    pub(crate) free: FreeListData,
    pub(crate) overlay: HashMap<PageNum, Option<Box<[u8]>>>,
    pub(crate) nappend: u64,
}

impl WriteTransaction<'_> {
    /// The version this transaction started from; a successful commit
    /// publishes `version() + 1`.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Reads through this transaction's own uncommitted state.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.tree.get(self, key)
    }

    /// Cursor over this transaction's own uncommitted state.
    pub fn seek_le(&self, key: &[u8]) -> Result<TreeIter<'_, Self>> {
        self.tree.seek_le(self, key)
    }

    /// Inserts, replaces, or refuses according to `mode`; reports whether
    /// the tree was modified. Size limits are enforced up front and leave
    /// the transaction untouched on failure.
    pub fn put(&mut self, key: &[u8], val: &[u8], mode: PutMode) -> Result<bool> {
        crate::btree::check_limits(key, Some(val))?;
        match mode {
            PutMode::Upsert => {}
            PutMode::UpdateOnly => {
                if self.get(key)?.is_none() {
                    return Ok(false);
                }
            }
            PutMode::InsertOnly => {
                if self.get(key)?.is_some() {
                    return Ok(false);
                }
            }
        }
        let mut tree = self.tree;
        tree.insert(self, key, val)?;
        self.tree = tree;
        Ok(true)
    }

    /// Removes `key`, reporting whether it existed.
    pub fn del(&mut self, key: &[u8]) -> Result<bool> {
        let mut tree = self.tree;
        let existed = tree.delete(self, key)?;
        self.tree = tree;
        Ok(existed)
    }

    /// Discards the transaction. Equivalent to dropping it.
    pub fn abort(self) {}

    /// Two-phase commit. A no-op when the root never moved.
    pub fn commit(mut self) -> Result<()> {
        if self.tree.root() == self.root_at_begin {
            return Ok(());
        }
        let new_version = self.version + 1;

        // Phase 1: free-list update, then harden the data pages.
        let mut freed: Vec<PageNum> = self
            .overlay
            .iter()
            .filter_map(|(&ptr, page)| page.is_none().then_some(ptr))
            .collect();
        freed.sort_unstable();
        self.free.push_many(&freed, new_version);
        {
            let mut chain = CommitChainStore {
                overlay: &mut self.overlay,
                nappend: &mut self.nappend,
                base: self.pager.page_flushed(),
            };
            self.free
                .persist(self.min_reader, new_version, &mut chain)?;
        }

        let npages = self.pager.page_flushed() + self.nappend;
        let phase1 = (|| -> Result<()> {
            self.pager.grow_for(npages)?;
            let mut ptrs: Vec<PageNum> = self.overlay.keys().copied().collect();
            ptrs.sort_unstable();
            for ptr in ptrs {
                if let Some(Some(page)) = self.overlay.get(&ptr) {
                    ensure!(
                        ptr < npages,
                        "allocated page {ptr} beyond final page count {npages}"
                    );
                    self.pager.write_page(ptr, page)?;
                }
            }
            self.pager.sync()
        })();
        if let Err(e) = phase1 {
            // Shared state was never touched; dropping self is the rollback.
            return Err(e.wrap_err("commit aborted in phase 1; transaction rolled back"));
        }

        // Phase 2: publish on disk, then in memory. The data fsync above is
        // the barrier that makes the master-page update atomic.
        let mut master = MasterPage::new();
        master.set_root(self.tree.root());
        master.set_page_used(npages);
        master.set_free_head(self.free.head());
        master.set_version(new_version);
        self.pager.publish_master(&master).wrap_err(
            "master page update failed after data fsync; the previous version remains durable",
        )?;

        self.pager.set_page_flushed(npages);
        let mut state = self.shared.state.lock();
        state.version = new_version;
        state.root = self.tree.root();
        state.page_used = npages;
        state.free = std::mem::take(&mut self.free);
        state.chunks = self.pager.chunks().clone();
        Ok(())
    }
}

impl PageRead for WriteTransaction<'_> {
    fn page(&self, ptr: PageNum) -> Result<&[u8]> {
        match self.overlay.get(&ptr) {
            Some(Some(page)) => Ok(page),
            Some(None) => panic!("use-after-free: page {ptr} was deallocated in this transaction"),
            None => self.pager.page(ptr),
        }
    }
}

impl PageStore for WriteTransaction<'_> {
    fn alloc(&mut self, page: Box<[u8]>) -> Result<PageNum> {
        ensure!(
            page.len() == PAGE_SIZE,
            "allocated page image is {} bytes, expected {}",
            page.len(),
            PAGE_SIZE
        );
        let ptr = match self.free.pop(self.min_reader) {
            Some(ptr) => ptr,
            None => {
                let ptr = self.pager.page_flushed() + self.nappend;
                self.nappend += 1;
                ptr
            }
        };
        self.overlay.insert(ptr, Some(page));
        Ok(ptr)
    }

    fn dealloc(&mut self, ptr: PageNum) {
        self.overlay.insert(ptr, None);
    }
}

/// Routes free-list chain rewrites through the transaction overlay so chain
/// pages commit atomically with everything else.
struct CommitChainStore<'a> {
    overlay: &'a mut HashMap<PageNum, Option<Box<[u8]>>>,
    nappend: &'a mut u64,
    base: u64,
}

impl ChainStore for CommitChainStore<'_> {
    fn append(&mut self) -> PageNum {
        let ptr = self.base + *self.nappend;
        *self.nappend += 1;
        ptr
    }

    fn put(&mut self, ptr: PageNum, page: Box<[u8]>) {
        self.overlay.insert(ptr, Some(page));
    }
}
