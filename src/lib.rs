//! # BurrowDB - Embedded Transactional Key/Value Store
//!
//! BurrowDB stores opaque byte keys and values in a single file: a
//! copy-on-write B+tree over fixed 4096-byte pages, with multi-version
//! concurrency control. One writer proceeds concurrently with any number of
//! readers, each pinned to the snapshot it captured at begin.
//!
//! - **Zero-copy reads**: lookups and scans return slices straight out of
//!   the memory-mapped file
//! - **Crash safety without a log**: two fsyncs per commit — data pages,
//!   then the master page — make every commit atomic
//! - **Non-blocking readers**: snapshots never take the writer lock and are
//!   never invalidated; freed pages wait in a versioned free list until the
//!   oldest reader moves past them
//!
//! ## Quick Start
//!
//! ```ignore
//! use burrowdb::{Database, PutMode};
//!
//! let db = Database::open("my.db")?;
//!
//! let mut tx = db.begin_write();
//! tx.put(b"hello", b"world", PutMode::Upsert)?;
//! tx.commit()?;
//!
//! let snapshot = db.begin_read();
//! assert_eq!(snapshot.get(b"hello")?.as_deref(), Some(&b"world"[..]));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      Public API (Database)          │
//! ├─────────────────────────────────────┤
//! │  Transactions (writer mutex, MVCC   │
//! │  reader registry, commit overlay)   │
//! ├─────────────────────────────────────┤
//! │  Copy-on-write B+Tree (node codec,  │
//! │  split/merge, seek_le cursor)       │
//! ├─────────────────────────────────────┤
//! │  Storage (pager, versioned free     │
//! │  list, master page, mmap chunks)    │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## File Layout
//!
//! One file, no sidecars. Page 0 is the master page (signature, tree root,
//! page count, free-list head, version); every other page is a B+tree node
//! or a free-list node. The file only ever grows by whole pages, with
//! ~12.5% headroom per extension.
//!
//! ## Module Overview
//!
//! - [`storage`]: mmap chunks, master page, free list, pager
//! - [`btree`]: node codec, copy-on-write tree ops, cursor
//! - [`database`]: handle, transactions, reader registry
//! - [`config`]: page geometry and size-limit constants

mod macros;

pub mod btree;
pub mod config;
pub mod database;
mod error;
pub mod storage;

pub use database::{
    Database, DatabaseOptions, DatabaseStats, PutMode, ReadTransaction, WriteTransaction,
};
pub use error::StoreError;
