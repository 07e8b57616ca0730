//! Text normalization into search terms.
//!
//! # Responsibility
//! - Turn raw note or query text into normalized terms.
//! - Be the single code path for both indexing and querying.
//!
//! # Invariants
//! - Pure and deterministic: same input, same output, no failures.
//! - Terms are lowercase runs of alphabetic/numeric chars, at least
//!   `min_len` chars long.

use crate::config::DEFAULT_MIN_TOKEN_LEN;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{Alphabetic}\p{N}]+").expect("valid word regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokenizer {
    min_len: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TOKEN_LEN)
    }
}

impl Tokenizer {
    /// `min_len` of 0 is treated as 1; empty tokens are never produced.
    pub fn new(min_len: usize) -> Self {
        Self {
            min_len: min_len.max(1),
        }
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// Splits `text` into ordered terms.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        WORD_RE
            .find_iter(text)
            .map(|word| word.as_str().to_lowercase())
            .filter(|term| term.chars().count() >= self.min_len)
            .collect()
    }

    /// Per-term frequencies plus total term count (document length).
    pub fn term_frequencies(&self, text: &str) -> (BTreeMap<String, u32>, u32) {
        let mut freqs = BTreeMap::new();
        let mut doc_len = 0u32;
        for term in self.tokenize(text) {
            *freqs.entry(term).or_insert(0) += 1;
            doc_len += 1;
        }
        (freqs, doc_len)
    }
}
