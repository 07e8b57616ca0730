//! Ranked free-text queries over the inverted index.
//!
//! # Responsibility
//! - Tokenize queries with the indexing tokenizer.
//! - Score candidates with length-normalized term frequency.
//! - Fetch display content for ranked hits from the note repository.
//!
//! # Invariants
//! - Ordering is score descending, then note id descending (newest first).
//! - Empty or unmatched queries return an empty list, never an error.

use crate::error::NoteResult;
use crate::model::note::NoteId;
use crate::repo::NoteRepository;
use crate::search::index::InvertedIndex;
use crate::search::tokenizer::Tokenizer;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// One ranked candidate without content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredNote {
    pub id: NoteId,
    pub score: f64,
}

/// One ranked result with display content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: NoteId,
    pub content: String,
    pub score: f64,
    pub created_at: i64,
}

/// Per-term contribution: `tf / (1 + ln(1 + doc_len))`.
pub fn term_score(frequency: u32, doc_len: u32) -> f64 {
    f64::from(frequency) / (1.0 + (1.0 + f64::from(doc_len)).ln())
}

/// Query engine over explicitly supplied index, store and tokenizer.
pub struct QueryEngine<'a, R: NoteRepository> {
    index: &'a InvertedIndex,
    store: &'a R,
    tokenizer: &'a Tokenizer,
}

impl<'a, R: NoteRepository> QueryEngine<'a, R> {
    pub fn new(index: &'a InvertedIndex, store: &'a R, tokenizer: &'a Tokenizer) -> Self {
        Self {
            index,
            store,
            tokenizer,
        }
    }

    /// Returns at most `limit` `(id, score)` pairs in rank order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredNote> {
        if limit == 0 {
            return Vec::new();
        }
        // Repeated query terms count once; sorted order keeps float sums stable.
        let terms: BTreeSet<String> = self.tokenizer.tokenize(query).into_iter().collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scores: HashMap<NoteId, f64> = HashMap::new();
        for term in &terms {
            for posting in self.index.postings_for(term) {
                let doc_len = self.index.document_length(posting.note_id).unwrap_or(0);
                *scores.entry(posting.note_id).or_insert(0.0) +=
                    term_score(posting.frequency, doc_len);
            }
        }

        let mut ranked: Vec<ScoredNote> = scores
            .into_iter()
            .map(|(id, score)| ScoredNote { id, score })
            .collect();
        ranked.sort_by(rank_order);
        ranked.truncate(limit);
        ranked
    }

    /// Like [`QueryEngine::search`], with content fetched from the store.
    pub fn search_hits(&self, query: &str, limit: usize) -> NoteResult<Vec<SearchHit>> {
        self.search(query, limit)
            .into_iter()
            .map(|scored| {
                let note = self.store.get(scored.id)?;
                Ok(SearchHit {
                    id: note.id,
                    content: note.content,
                    score: scored.score,
                    created_at: note.created_at,
                })
            })
            .collect()
    }
}

fn rank_order(a: &ScoredNote, b: &ScoredNote) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::{term_score, QueryEngine};
    use crate::repo::note_store::NoteStore;
    use crate::repo::NoteRepository;
    use crate::search::index::InvertedIndex;
    use crate::search::tokenizer::Tokenizer;

    fn fixture(contents: &[&str]) -> (tempfile::TempDir, NoteStore, InvertedIndex) {
        let tmp = tempfile::tempdir().unwrap();
        let store = NoteStore::open(tmp.path().join("notes.log")).unwrap();
        let tokenizer = Tokenizer::default();
        let mut index = InvertedIndex::new();
        for content in contents {
            let note = store.add(content).unwrap();
            index.index_note(&note, &tokenizer);
        }
        (tmp, store, index)
    }

    #[test]
    fn empty_and_unmatched_queries_return_nothing() {
        let (_tmp, store, index) = fixture(&["hello world"]);
        let tokenizer = Tokenizer::default();
        let engine = QueryEngine::new(&index, &store, &tokenizer);

        assert!(engine.search("", 10).is_empty());
        assert!(engine.search(" ?! ", 10).is_empty());
        assert!(engine.search("zzzznotfound", 10).is_empty());
        assert!(engine.search("hello", 0).is_empty());
    }

    #[test]
    fn equal_scores_rank_newest_first() {
        let (_tmp, store, index) = fixture(&["rust notes", "rust notes", "other words"]);
        let tokenizer = Tokenizer::default();
        let engine = QueryEngine::new(&index, &store, &tokenizer);

        let ranked = engine.search("rust", 10);
        let ids: Vec<_> = ranked.iter().map(|hit| hit.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(ranked[0].score, ranked[1].score);
    }

    #[test]
    fn shorter_notes_outrank_longer_ones_at_same_frequency() {
        let (_tmp, store, index) = fixture(&[
            "search",
            "search among many many other filler words here",
        ]);
        let tokenizer = Tokenizer::default();
        let engine = QueryEngine::new(&index, &store, &tokenizer);

        let ranked = engine.search("search", 10);
        assert_eq!(ranked[0].id, 1);
        assert!((ranked[0].score - term_score(1, 1)).abs() < 1e-12);
    }

    #[test]
    fn matching_more_terms_scores_higher_and_repeats_count_once() {
        let (_tmp, store, index) = fixture(&["alpha beta", "alpha gamma"]);
        let tokenizer = Tokenizer::default();
        let engine = QueryEngine::new(&index, &store, &tokenizer);

        let ranked = engine.search("alpha beta beta", 10);
        assert_eq!(ranked[0].id, 1);
        let expected = term_score(1, 2) * 2.0;
        assert!((ranked[0].score - expected).abs() < 1e-12);
        assert!((ranked[1].score - term_score(1, 2)).abs() < 1e-12);
    }

    #[test]
    fn limit_truncates_and_hits_carry_content() {
        let (_tmp, store, index) = fixture(&["shared one", "shared two", "shared three"]);
        let tokenizer = Tokenizer::default();
        let engine = QueryEngine::new(&index, &store, &tokenizer);

        let hits = engine.search_hits("SHARED", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 3);
        assert_eq!(hits[0].content, "shared three");
    }
}
