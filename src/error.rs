//! Boundary error kinds.
//!
//! BurrowDB reports failures as `eyre::Result` with contextual messages, the
//! same way the rest of the crate composes errors. The handful of conditions
//! a caller is expected to branch on are carried as a typed [`StoreError`]
//! at the root of the report chain, recoverable with
//! `report.downcast_ref::<StoreError>()`:
//!
//! ```ignore
//! match tx.put(key, val, PutMode::Upsert) {
//!     Err(e) if matches!(e.downcast_ref(), Some(StoreError::KeyTooLarge { .. })) => ...,
//!     other => ...,
//! }
//! ```
//!
//! I/O failures keep their `std::io::Error` source and are wrapped with
//! operation context; internal invariant violations are assertions, not
//! recoverable errors.

use thiserror::Error;

/// Conditions the embedding layer is expected to distinguish.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Key exceeds the node format limit.
    #[error("key too large: {size} bytes (max {max})")]
    KeyTooLarge {
        /// Actual size of the key in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// Value exceeds the node format limit.
    #[error("value too large: {size} bytes (max {max})")]
    ValueTooLarge {
        /// Actual size of the value in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// The file is not a BurrowDB database or its structure is damaged.
    #[error("corrupt database file: {reason}")]
    CorruptFile {
        /// Description of what failed validation.
        reason: String,
    },

    /// Another handle (possibly in another process) holds the file open.
    #[error("database file is already open")]
    AlreadyOpen,

    /// `close` was refused because transactions or other handles are still
    /// live.
    #[error("database still has live transactions or open handles")]
    TransactionsActive,
}

impl StoreError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        StoreError::CorruptFile {
            reason: reason.into(),
        }
    }
}
