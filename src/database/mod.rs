//! # Database Handle
//!
//! [`Database`] is the owning handle for one open file: it holds the pager
//! behind the writer mutex and the published state — current root, version,
//! free-list cache, mapping chunk list, reader registry — behind a second
//! short-section mutex. Cloning the handle is cheap; clones share the
//! underlying state, so one clone can write while others open snapshots.
//!
//! ## Lock discipline
//!
//! - `writer`: held for the whole lifetime of a [`WriteTransaction`];
//!   serializes writers and protects the pager (file growth, page writes).
//! - `state`: short critical sections only — snapshot capture, reader
//!   registration, commit publication. Never held across I/O.
//!
//! Lock order is writer → state; readers take only `state`.

mod readers;
mod transaction;

pub use transaction::{PutMode, ReadTransaction, WriteTransaction};

use std::path::Path;
use std::sync::Arc;

use eyre::Result;
use parking_lot::Mutex;

use crate::btree::{BTree, Node, NodeType};
use crate::config::DEFAULT_MMAP_SIZE;
use crate::error::StoreError;
use crate::storage::{ChunkList, FreeListData, PageNum, PageRead, Pager};

use readers::ReaderRegistry;

pub(crate) struct Shared {
    pub(crate) writer: Mutex<Pager>,
    pub(crate) state: Mutex<SharedState>,
}

pub(crate) struct SharedState {
    pub(crate) version: u64,
    pub(crate) root: PageNum,
    pub(crate) page_used: u64,
    pub(crate) free: FreeListData,
    pub(crate) chunks: ChunkList,
    pub(crate) readers: ReaderRegistry,
}

/// Open-time settings.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    mmap_size: usize,
}

impl DatabaseOptions {
    pub fn new() -> Self {
        DatabaseOptions {
            mmap_size: DEFAULT_MMAP_SIZE,
        }
    }

    /// Initial size of the memory mapping. The mapping grows on demand;
    /// a larger initial size just avoids extension chunks.
    pub fn mmap_size(mut self, bytes: usize) -> Self {
        self.mmap_size = bytes;
        self
    }

    /// Opens (or creates) the database at `path`.
    pub fn open(self, path: impl AsRef<Path>) -> Result<Database> {
        let (pager, master) = Pager::open(path.as_ref(), self.mmap_size)?;
        let free = FreeListData::load(&pager, master.free_head())?;
        let state = SharedState {
            version: master.version(),
            root: master.root(),
            page_used: master.page_used(),
            free,
            chunks: pager.chunks().clone(),
            readers: ReaderRegistry::new(),
        };
        Ok(Database {
            shared: Arc::new(Shared {
                writer: Mutex::new(pager),
                state: Mutex::new(state),
            }),
        })
    }
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// An open BurrowDB database. Clones share the same file and state.
///
/// [`close`](Database::close) flushes and releases the file explicitly and
/// refuses while transactions are live; dropping every handle and
/// transaction releases the same resources implicitly.
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Opens `path` with default options, creating the file if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Database> {
        DatabaseOptions::new().open(path)
    }

    /// Entry point for configured opens:
    /// `Database::options().mmap_size(..).open(path)`.
    pub fn options() -> DatabaseOptions {
        DatabaseOptions::new()
    }

    /// Captures a snapshot of the current version. O(log n) in the number
    /// of live readers; never blocks on the writer.
    pub fn begin_read(&self) -> ReadTransaction {
        let mut state = self.shared.state.lock();
        let version = state.version;
        let handle = state.readers.register(version);
        ReadTransaction {
            shared: self.shared.clone(),
            version: state.version,
            tree: BTree::new(state.root),
            chunks: state.chunks.clone(),
            handle: Some(handle),
        }
    }

    /// Starts the exclusive writer; blocks while another write transaction
    /// is active.
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        let pager = self.shared.writer.lock();
        let (root, version, free, min_reader) = {
            let state = self.shared.state.lock();
            let min_reader = state.readers.min_version().unwrap_or(state.version + 1);
            (state.root, state.version, state.free.clone(), min_reader)
        };
        WriteTransaction {
            shared: &*self.shared,
            pager,
            tree: BTree::new(root),
            root_at_begin: root,
            version,
            min_reader,
            free,
            overlay: hashbrown::HashMap::new(),
            nappend: 0,
        }
    }

    /// Auto-commit point lookup.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.begin_read().get(key)
    }

    /// Auto-commit upsert.
    pub fn set(&self, key: &[u8], val: &[u8]) -> Result<()> {
        let mut tx = self.begin_write();
        tx.put(key, val, PutMode::Upsert)?;
        tx.commit()
    }

    /// Auto-commit delete; reports whether the key existed.
    pub fn del(&self, key: &[u8]) -> Result<bool> {
        let mut tx = self.begin_write();
        let existed = tx.del(key)?;
        tx.commit()?;
        Ok(existed)
    }

    /// Flushes the file and closes it, unmapping every chunk and releasing
    /// the file lock.
    ///
    /// Requires that no transaction is live and no other handle is open:
    /// a live [`ReadTransaction`] keeps the shared state referenced, and a
    /// [`WriteTransaction`] borrows the handle it came from. A refused
    /// close fails with [`StoreError::TransactionsActive`](crate::StoreError)
    /// and changes nothing — readers keep their snapshots and other handles
    /// stay usable.
    pub fn close(self) -> Result<()> {
        let shared = match Arc::try_unwrap(self.shared) {
            Ok(shared) => shared,
            Err(_) => return Err(StoreError::TransactionsActive.into()),
        };
        let Shared { writer, state } = shared;
        drop(state);
        let pager = writer.into_inner();
        pager.sync()?;
        Ok(())
    }

    /// Page accounting and tree shape for the current version.
    pub fn stats(&self) -> Result<DatabaseStats> {
        let (tx, page_used, free_pages, free_chain_pages, live_readers) = {
            let mut state = self.shared.state.lock();
            let version = state.version;
            let handle = state.readers.register(version);
            let tx = ReadTransaction {
                shared: self.shared.clone(),
                version: state.version,
                tree: BTree::new(state.root),
                chunks: state.chunks.clone(),
                handle: Some(handle),
            };
            (
                tx,
                state.page_used,
                state.free.total(),
                state.free.chain_len(),
                state.readers.len() - 1,
            )
        };

        let (reachable_pages, tree_height) = if tx.root() == 0 {
            (0, 0)
        } else {
            walk_subtree(&tx, tx.root())?
        };

        Ok(DatabaseStats {
            version: tx.version(),
            page_used,
            free_pages,
            free_chain_pages,
            reachable_pages,
            tree_height,
            live_readers,
        })
    }
}

/// Counts pages and levels reachable from `ptr`.
fn walk_subtree<S: PageRead>(store: &S, ptr: PageNum) -> Result<(u64, usize)> {
    let node = Node::from_page(store.page(ptr)?)?;
    match node.node_type() {
        NodeType::Leaf => Ok((1, 1)),
        NodeType::Internal => {
            let mut pages = 1;
            let mut height = 0;
            for i in 0..node.nkeys() {
                let (p, h) = walk_subtree(store, node.child(i)?)?;
                pages += p;
                height = height.max(h);
            }
            Ok((pages, height + 1))
        }
    }
}

/// Snapshot of page accounting, taken under a reader registration so the
/// counts are mutually consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Version the counts describe.
    pub version: u64,
    /// Allocation high-water mark in pages, master page included.
    pub page_used: u64,
    /// Reusable entries in the free list.
    pub free_pages: usize,
    /// Pages housing the free list's persistent chain.
    pub free_chain_pages: usize,
    /// Pages reachable from the current root.
    pub reachable_pages: u64,
    /// Levels in the tree (0 when empty).
    pub tree_height: usize,
    /// Read transactions live at the time of the snapshot, this one
    /// excluded.
    pub live_readers: usize,
}
