//! In-memory inverted index.
//!
//! # Responsibility
//! - Map each term to its posting list `(note_id, term_frequency)`.
//! - Track per-note document length for score normalization.
//!
//! # Invariants
//! - Posting lists are sorted by ascending `note_id`.
//! - The index is a pure function of the notes fed to it: rebuilding from
//!   the same notes in the same order yields an equal index.
//! - Duplicate `(note_id, term)` inserts are a caller error and are not
//!   detected here.

use crate::model::note::{Note, NoteId};
use crate::search::tokenizer::Tokenizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of a term's posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub note_id: NoteId,
    pub frequency: u32,
}

/// Term -> postings map plus document lengths.
///
/// `BTreeMap` keeps term order stable so serialized snapshots are
/// byte-identical for equal indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvertedIndex {
    terms: BTreeMap<String, Vec<Posting>>,
    doc_lengths: BTreeMap<NoteId, u32>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one posting, keeping the list ordered by note id.
    pub fn insert(&mut self, note_id: NoteId, term: &str, frequency: u32) {
        let postings = self.terms.entry(term.to_string()).or_default();
        let posting = Posting { note_id, frequency };
        match postings.last() {
            Some(last) if last.note_id > note_id => {
                let at = postings.partition_point(|p| p.note_id <= note_id);
                postings.insert(at, posting);
            }
            _ => postings.push(posting),
        }
    }

    /// Postings for `term`; empty when the term is unknown.
    pub fn postings_for(&self, term: &str) -> &[Posting] {
        self.terms.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tokenizes one note and inserts all its postings.
    pub fn index_note(&mut self, note: &Note, tokenizer: &Tokenizer) {
        let (freqs, doc_len) = tokenizer.term_frequencies(&note.content);
        for (term, frequency) in &freqs {
            self.insert(note.id, term, *frequency);
        }
        self.doc_lengths.insert(note.id, doc_len);
    }

    /// Clears all state and re-indexes `notes` in sequence order.
    pub fn rebuild<I>(&mut self, notes: I, tokenizer: &Tokenizer)
    where
        I: IntoIterator<Item = Note>,
    {
        self.clear();
        for note in notes {
            self.index_note(&note, tokenizer);
        }
    }

    /// Like [`InvertedIndex::rebuild`] for fallible note sources such as a
    /// log scan. Stops at the first error, leaving a partial index.
    pub fn try_rebuild<I, E>(&mut self, notes: I, tokenizer: &Tokenizer) -> Result<(), E>
    where
        I: IntoIterator<Item = Result<Note, E>>,
    {
        self.clear();
        for note in notes {
            self.index_note(&note?, tokenizer);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.terms.clear();
        self.doc_lengths.clear();
    }

    /// Number of terms the note produced when indexed.
    pub fn document_length(&self, note_id: NoteId) -> Option<u32> {
        self.doc_lengths.get(&note_id).copied()
    }

    /// Number of notes fed into the index, including notes with no terms.
    pub fn indexed_notes(&self) -> usize {
        self.doc_lengths.len()
    }

    pub fn last_indexed_id(&self) -> Option<NoteId> {
        self.doc_lengths.keys().next_back().copied()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Checks structural invariants after loading from an untrusted source.
    pub(crate) fn verify(&self) -> Result<(), String> {
        for (term, postings) in &self.terms {
            if term.is_empty() {
                return Err("empty term in index".to_string());
            }
            for pair in postings.windows(2) {
                if pair[0].note_id > pair[1].note_id {
                    return Err(format!("postings for `{term}` are out of order"));
                }
            }
            if let Some(orphan) = postings
                .iter()
                .find(|p| !self.doc_lengths.contains_key(&p.note_id))
            {
                return Err(format!(
                    "posting for `{term}` references unindexed note {}",
                    orphan.note_id
                ));
            }
        }
        Ok(())
    }
}
