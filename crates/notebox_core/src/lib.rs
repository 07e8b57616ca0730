//! Core note storage and search engine for Notebox.
//! This crate is the single source of truth for storage and ranking invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::NoteConfig;
pub use db::Recovery;
pub use error::{NoteError, NoteResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{Note, NoteId};
pub use repo::note_store::NoteStore;
pub use repo::NoteRepository;
pub use search::index::{InvertedIndex, Posting};
pub use search::query::{QueryEngine, ScoredNote, SearchHit};
pub use search::tokenizer::Tokenizer;
pub use service::note_service::{NoteService, NoteStatus};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
