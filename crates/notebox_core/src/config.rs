//! Runtime configuration for the note engine.
//!
//! # Responsibility
//! - Hold data-directory and tuning knobs in one validated struct.
//! - Normalize caller-provided search limits.
//!
//! # Invariants
//! - `min_token_len >= 1`.
//! - `1 <= default_search_limit <= max_search_limit`.

use crate::error::{NoteError, NoteResult};
use std::path::{Path, PathBuf};

pub const DEFAULT_MIN_TOKEN_LEN: usize = 2;
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;
pub const MAX_SEARCH_LIMIT: u32 = 100;
pub const DEFAULT_SNAPSHOT_QUEUE: usize = 16;

/// Environment variable consulted by front ends for the data directory.
pub const DATA_DIR_ENV: &str = "NOTEBOX_DATA_DIR";
const DEFAULT_DATA_DIR_NAME: &str = "notebox";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteConfig {
    /// Directory holding `notes.log` and `index.snapshot`.
    pub data_dir: PathBuf,
    /// Tokens shorter than this (in chars) are dropped.
    pub min_token_len: usize,
    pub default_search_limit: u32,
    pub max_search_limit: u32,
    /// Bounded queue between `add` and the background snapshot writer.
    pub snapshot_queue_capacity: usize,
}

impl NoteConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            min_token_len: DEFAULT_MIN_TOKEN_LEN,
            default_search_limit: DEFAULT_SEARCH_LIMIT,
            max_search_limit: MAX_SEARCH_LIMIT,
            snapshot_queue_capacity: DEFAULT_SNAPSHOT_QUEUE,
        }
    }

    /// Resolves the data directory from, in order of priority:
    /// 1. An explicit path
    /// 2. The `NOTEBOX_DATA_DIR` environment variable
    /// 3. `<temp_dir>/notebox`
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let data_dir = if let Some(path) = explicit {
            path.to_path_buf()
        } else {
            std::env::var(DATA_DIR_ENV)
                .ok()
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME))
        };
        Self::new(data_dir)
    }

    pub fn with_min_token_len(mut self, min_token_len: usize) -> Self {
        self.min_token_len = min_token_len;
        self
    }

    pub fn with_search_limits(mut self, default_limit: u32, max_limit: u32) -> Self {
        self.default_search_limit = default_limit;
        self.max_search_limit = max_limit;
        self
    }

    pub fn with_snapshot_queue_capacity(mut self, capacity: usize) -> Self {
        self.snapshot_queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> NoteResult<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(NoteError::InvalidConfig("data_dir cannot be empty".into()));
        }
        if self.min_token_len == 0 {
            return Err(NoteError::InvalidConfig(
                "min_token_len must be at least 1".into(),
            ));
        }
        if self.default_search_limit == 0 || self.default_search_limit > self.max_search_limit {
            return Err(NoteError::InvalidConfig(format!(
                "default_search_limit {} must be within 1..={}",
                self.default_search_limit, self.max_search_limit
            )));
        }
        if self.snapshot_queue_capacity == 0 {
            return Err(NoteError::InvalidConfig(
                "snapshot_queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Normalizes a caller limit: `None`/`0` use the default, large values clamp.
    pub fn normalize_limit(&self, limit: Option<u32>) -> u32 {
        match limit {
            Some(0) | None => self.default_search_limit,
            Some(value) if value > self.max_search_limit => self.max_search_limit,
            Some(value) => value,
        }
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("notes.log")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("index.snapshot")
    }
}
