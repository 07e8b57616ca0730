//! Note storage contracts and the log-backed implementation.
//!
//! # Responsibility
//! - Define the note repository contract used by query and service layers.
//! - Keep the on-disk record format inside the storage boundary.
//!
//! # Invariants
//! - Repositories own note content; other layers hold only `NoteId`s.
//! - `scan` always starts from the first note.

use crate::error::NoteResult;
use crate::model::note::{Note, NoteId};

pub mod note_store;
mod record;

/// Repository interface for append-only notes.
pub trait NoteRepository {
    /// Lazy, finite iterator over notes in id order.
    type Scan: Iterator<Item = NoteResult<Note>>;

    /// Durably appends one note and returns it with its assigned id.
    fn add(&self, content: &str) -> NoteResult<Note>;
    fn get(&self, id: NoteId) -> NoteResult<Note>;
    /// Starts a fresh scan from the first note.
    fn scan(&self) -> NoteResult<Self::Scan>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
