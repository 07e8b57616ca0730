//! Note use-case service.
//!
//! # Responsibility
//! - Expose the typed boundary: `add_note`, `search_notes`, lifecycle.
//! - Wire store, index, tokenizer and snapshot writer as explicit
//!   dependencies of one process-scoped handle.
//!
//! # Invariants
//! - `add_note` returns only after the note is durable and indexed.
//! - Writers (`add_note`, `rebuild_index`) are serialized; searches see
//!   either the state before or after a write, never a partial index.
//! - `search_notes` never surfaces index corruption; only log read
//!   failures can fail it.

use crate::config::NoteConfig;
use crate::db::{
    open_store, rebuild_from_log, recover_index, Recovery, SnapshotJob, SnapshotWriter,
};
use crate::error::NoteResult;
use crate::model::note::{Note, NoteId};
use crate::repo::note_store::NoteStore;
use crate::repo::NoteRepository;
use crate::search::index::InvertedIndex;
use crate::search::query::{QueryEngine, SearchHit};
use crate::search::tokenizer::Tokenizer;
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// Snapshot of engine counters for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteStatus {
    pub data_dir: PathBuf,
    pub note_count: usize,
    pub indexed_notes: usize,
    pub term_count: usize,
    pub log_bytes: u64,
    pub recovery: Recovery,
}

/// Note engine facade.
pub struct NoteService {
    config: NoteConfig,
    tokenizer: Tokenizer,
    store: Arc<NoteStore>,
    index: RwLock<InvertedIndex>,
    write_lock: Mutex<()>,
    snapshot_job: SnapshotJob,
    snapshot_writer: SnapshotWriter,
    recovery: Recovery,
}

impl NoteService {
    /// Opens the data directory and recovers the index before returning.
    pub fn open(config: NoteConfig) -> NoteResult<Self> {
        config.validate()?;
        let started_at = Instant::now();
        let tokenizer = Tokenizer::new(config.min_token_len);

        let store = Arc::new(open_store(&config)?);
        let (index, recovery) = recover_index(&config, &store, &tokenizer)?;
        let snapshot_job = SnapshotJob::new(
            config.snapshot_path(),
            Arc::clone(&store),
            index.clone(),
            tokenizer,
        );
        let index = RwLock::new(index);
        if let Recovery::Snapshot { notes } = recovery {
            if let Some(checkpoint) = store.checkpoint(notes) {
                snapshot_job.mark_written(checkpoint);
            }
        }
        let snapshot_writer =
            SnapshotWriter::spawn(snapshot_job.clone(), config.snapshot_queue_capacity)?;

        let service = Self {
            config,
            tokenizer,
            store,
            index,
            write_lock: Mutex::new(()),
            snapshot_job,
            snapshot_writer,
            recovery,
        };
        if matches!(
            service.recovery,
            Recovery::Rebuilt { .. } | Recovery::CaughtUp { .. }
        ) {
            service.snapshot_writer.request();
        }

        info!(
            "event=service_open module=service status=ok notes={} duration_ms={}",
            service.store.len(),
            started_at.elapsed().as_millis()
        );
        Ok(service)
    }

    pub fn config(&self) -> &NoteConfig {
        &self.config
    }

    pub fn recovery(&self) -> &Recovery {
        &self.recovery
    }

    /// Durably stores `content`, indexes it and returns the new id.
    ///
    /// # Errors
    /// - `StorageIo` when the log write or fsync fails; nothing is stored
    ///   and the id is not consumed.
    pub fn add_note(&self, content: &str) -> NoteResult<NoteId> {
        let started_at = Instant::now();
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let note = match self.store.add(content) {
            Ok(note) => note,
            Err(err) => {
                error!(
                    "event=note_add module=service status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code(),
                    err
                );
                return Err(err);
            }
        };

        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .index_note(&note, &self.tokenizer);
        self.snapshot_writer.request();

        info!(
            "event=note_add module=service status=ok id={} duration_ms={}",
            note.id,
            started_at.elapsed().as_millis()
        );
        Ok(note.id)
    }

    /// Ranked search using the configured default limit.
    pub fn search_notes(&self, query: &str) -> NoteResult<Vec<SearchHit>> {
        self.search_notes_with_limit(query, None)
    }

    /// Ranked search; `limit` is normalized (`None`/`0` -> default, clamped).
    pub fn search_notes_with_limit(
        &self,
        query: &str,
        limit: Option<u32>,
    ) -> NoteResult<Vec<SearchHit>> {
        let started_at = Instant::now();
        let limit = self.config.normalize_limit(limit);
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        let engine = QueryEngine::new(&index, self.store.as_ref(), &self.tokenizer);

        let hits = engine.search_hits(query, limit as usize);
        match &hits {
            Ok(items) => info!(
                "event=note_search module=service status=ok hits={} limit={} duration_ms={}",
                items.len(),
                limit,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=note_search module=service status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        hits
    }

    /// Fetches one note by id.
    pub fn get_note(&self, id: NoteId) -> NoteResult<Note> {
        self.store.get(id)
    }

    /// Lists notes newest first.
    pub fn list_notes(&self, limit: Option<u32>, offset: u32) -> NoteResult<Vec<Note>> {
        let limit = u64::from(self.config.normalize_limit(limit));
        let newest = self.store.last_id().unwrap_or(0);
        let Some(first) = newest.checked_sub(u64::from(offset)) else {
            return Ok(Vec::new());
        };
        let last = first.saturating_sub(limit);
        ((last + 1)..=first)
            .rev()
            .map(|id| self.store.get(id))
            .collect()
    }

    /// Rebuilds the index from the log and swaps it in atomically.
    ///
    /// Returns the number of notes indexed.
    pub fn rebuild_index(&self) -> NoteResult<usize> {
        let started_at = Instant::now();
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let fresh = rebuild_from_log(&self.store, &self.tokenizer)?;
        let notes = fresh.indexed_notes();
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        self.snapshot_writer.request();

        info!(
            "event=index_rebuild module=service status=ok notes={} duration_ms={}",
            notes,
            started_at.elapsed().as_millis()
        );
        Ok(notes)
    }

    pub fn status(&self) -> NoteStatus {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        NoteStatus {
            data_dir: self.config.data_dir.clone(),
            note_count: self.store.len(),
            indexed_notes: index.indexed_notes(),
            term_count: index.term_count(),
            log_bytes: self.store.committed_bytes(),
            recovery: self.recovery.clone(),
        }
    }

    /// Stops the background writer and flushes a final snapshot.
    pub fn close(mut self) -> NoteResult<()> {
        self.snapshot_writer.shutdown();
        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.snapshot_job.write()?;
        info!(
            "event=service_close module=service status=ok notes={}",
            self.store.len()
        );
        Ok(())
    }

    /// Copy of the current in-memory index, for diagnostics and tests.
    pub fn index_snapshot(&self) -> InvertedIndex {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
