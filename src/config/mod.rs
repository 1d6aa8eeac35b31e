//! # BurrowDB Configuration Constants
//!
//! This module centralizes the on-disk geometry constants. Most of them are
//! interdependent: the node format caps key and value sizes so that a node
//! holding a single maximum-size entry still fits in one page, and the
//! free-list capacity is derived from the page size and free-list header.
//! Constants that depend on each other are co-located and the relationships
//! are enforced with compile-time assertions.
//!
//! ```text
//! PAGE_SIZE (4096 bytes)
//!       │
//!       ├─> NODE_HEADER (4 bytes: type + nkeys)
//!       │     A node is | type 2B | nkeys 2B | ptrs 8B×n | offsets 2B×n | kv |
//!       │
//!       ├─> MAX_KEY_SIZE / MAX_VALUE_SIZE
//!       │     NODE_HEADER + 8 + 2 + 4 + MAX_KEY_SIZE + MAX_VALUE_SIZE
//!       │     must be <= PAGE_SIZE so a single-entry node is storable.
//!       │
//!       └─> FREE_LIST_CAP (derived: (PAGE_SIZE - FREE_LIST_HEADER) / 8)
//!
//! MASTER_HEADER_SIZE (48 bytes)
//!       Master page layout: | sig 16B | root 8B | page_used 8B |
//!       | free_head 8B | version 8B |, all little-endian.
//! ```
//!
//! Import constants from this module rather than defining them locally.

/// Size of each database page in bytes. This is the unit of persistence,
/// allocation, and I/O.
pub const PAGE_SIZE: usize = 4096;

/// Fixed node header: 2-byte type tag plus 2-byte key count.
pub const NODE_HEADER: usize = 4;

/// Maximum key length accepted by `put`/`del`.
pub const MAX_KEY_SIZE: usize = 1000;

/// Maximum value length accepted by `put`.
pub const MAX_VALUE_SIZE: usize = 3000;

/// Free-list node header: type + size (4 bytes), next pointer (8 bytes),
/// total count (8 bytes, meaningful in the head node only).
pub const FREE_LIST_HEADER: usize = 4 + 8 + 8;

/// Number of 8-byte page numbers a free-list node can hold.
pub const FREE_LIST_CAP: usize = (PAGE_SIZE - FREE_LIST_HEADER) / 8;

/// Identifies the file format; the first 16 bytes of the master page.
pub const MASTER_SIG: &[u8; 16] = b"BurrowDB KV v1\x00\x00";

/// Size of the master-page header at the start of page 0.
pub const MASTER_HEADER_SIZE: usize = 48;

/// Default size of the initial memory mapping (64 MiB). The mapping may be
/// larger than the file; growth appends further mappings without remapping.
pub const DEFAULT_MMAP_SIZE: usize = 64 << 20;

// A node holding one maximum-size entry must fit in a page:
// header + one child pointer + one offset + two length fields + key + value.
const _: () = assert!(
    NODE_HEADER + 8 + 2 + 4 + MAX_KEY_SIZE + MAX_VALUE_SIZE <= PAGE_SIZE,
    "a single maximum-size entry must fit in one page"
);

const _: () = assert!(
    FREE_LIST_CAP == (PAGE_SIZE - FREE_LIST_HEADER) / 8,
    "FREE_LIST_CAP derivation mismatch"
);

const _: () = assert!(
    MASTER_HEADER_SIZE == 16 + 8 + 8 + 8 + 8,
    "master header layout mismatch"
);

const _: () = assert!(
    DEFAULT_MMAP_SIZE % PAGE_SIZE == 0,
    "mmap size must be a whole number of pages"
);
