//! Full-text search: tokenizer, inverted index and ranked queries.
//!
//! # Responsibility
//! - Keep indexing and query tokenization on one code path.
//! - Expose ranking that is fully deterministic and testable.

pub mod index;
pub mod query;
pub mod tokenizer;
