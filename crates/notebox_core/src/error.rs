//! Core error taxonomy.
//!
//! # Responsibility
//! - Provide one error type shared by store, index, query and persistence.
//! - Keep "no match" (empty result) distinct from failure at every boundary.
//!
//! # Invariants
//! - `CorruptIndex` never escapes `search_notes`; it is recovered by rebuild.
//! - `StorageIo` always carries the operation that failed.

use crate::model::note::NoteId;
use std::io;

/// Result type for core APIs.
pub type NoteResult<T> = Result<T, NoteError>;

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    /// Durable read/write failure. Fatal to the triggering call.
    #[error("storage I/O error during {context}: {source}")]
    StorageIo {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("note not found: {0}")]
    NotFound(NoteId),

    /// Index snapshot cannot be trusted; recovered by rebuilding from the log.
    #[error("corrupt index snapshot: {0}")]
    CorruptIndex(String),

    /// The note log itself is damaged beyond a torn tail.
    #[error("corrupt note log at byte {offset}: {reason}")]
    CorruptLog { offset: u64, reason: String },

    /// Content longer than the log record format can represent.
    #[error("note content is {len} bytes, maximum is {max}")]
    ContentTooLarge { len: usize, max: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Logging bootstrap failed or conflicts with an earlier init.
    #[error("logging error: {0}")]
    Logging(String),
}

impl NoteError {
    /// Wraps an I/O error with the name of the failed operation.
    pub fn io(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::StorageIo { context, source }
    }

    /// Short machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StorageIo { .. } => "storage_io",
            Self::NotFound(_) => "not_found",
            Self::CorruptIndex(_) => "corrupt_index",
            Self::CorruptLog { .. } => "corrupt_log",
            Self::ContentTooLarge { .. } => "content_too_large",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Logging(_) => "logging",
        }
    }
}
