//! Note domain model.
//!
//! # Responsibility
//! - Define the immutable note record owned by the note store.
//!
//! # Invariants
//! - `id` is assigned by the store, starts at 1 and is never reused.
//! - `created_at` is set once at append time and never changes.

use serde::{Deserialize, Serialize};

/// Monotonic note identifier assigned by the note store.
pub type NoteId = u64;

/// One committed note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Plain-text body, stored verbatim.
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Note {
    pub fn new(id: NoteId, content: impl Into<String>, created_at: i64) -> Self {
        Self {
            id,
            content: content.into(),
            created_at,
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
