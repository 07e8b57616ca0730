//! Startup recovery for the note log and its index.
//!
//! # Responsibility
//! - Open the data directory and the note log.
//! - Load a trustworthy snapshot, catch it up, or rebuild from the log.
//!
//! # Invariants
//! - No index is returned before it reflects every committed note.
//! - Snapshot problems are logged and recovered, never returned.

use crate::config::NoteConfig;
use crate::db::snapshot::read_snapshot;
use crate::error::{NoteError, NoteResult};
use crate::repo::note_store::{LogCheckpoint, NoteStore};
use crate::repo::NoteRepository;
use crate::search::index::InvertedIndex;
use crate::search::tokenizer::Tokenizer;
use log::{error, info, warn};
use serde::Serialize;
use std::time::Instant;

/// How the in-memory index was obtained at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recovery {
    /// Empty log, no snapshot needed.
    Fresh,
    /// Snapshot matched the log exactly.
    Snapshot { notes: u64 },
    /// Snapshot was a valid prefix; the remaining notes were replayed.
    CaughtUp { from_snapshot: u64, replayed: u64 },
    /// Snapshot was unusable; index rebuilt from the full log.
    Rebuilt { notes: u64, reason: String },
}

/// Opens the note log under `config.data_dir`, creating the directory.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_store(config: &NoteConfig) -> NoteResult<NoteStore> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start");

    let opened = std::fs::create_dir_all(&config.data_dir)
        .map_err(NoteError::io("data_dir_create"))
        .and_then(|()| NoteStore::open(config.log_path()));

    match opened {
        Ok(store) => {
            info!(
                "event=db_open module=db status=ok notes={} duration_ms={}",
                store.len(),
                started_at.elapsed().as_millis()
            );
            Ok(store)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err)
        }
    }
}

/// Produces an index consistent with every note committed in `store`.
///
/// # Errors
/// - `StorageIo` / `CorruptLog` only when the log itself cannot be read
///   during replay or rebuild.
pub fn recover_index(
    config: &NoteConfig,
    store: &NoteStore,
    tokenizer: &Tokenizer,
) -> NoteResult<(InvertedIndex, Recovery)> {
    let started_at = Instant::now();

    let reason = match read_snapshot(&config.snapshot_path(), tokenizer.min_len()) {
        Ok(None) if store.is_empty() => {
            return Ok((InvertedIndex::new(), Recovery::Fresh));
        }
        Ok(None) => "missing".to_string(),
        Ok(Some(loaded)) => match store.checkpoint(loaded.checkpoint.note_count) {
            Some(current) if current == loaded.checkpoint => {
                let mut index = loaded.index;
                let replayed = replay_tail(&mut index, store, tokenizer, &loaded.checkpoint)?;
                let recovery = if replayed == 0 {
                    Recovery::Snapshot {
                        notes: loaded.checkpoint.note_count,
                    }
                } else {
                    Recovery::CaughtUp {
                        from_snapshot: loaded.checkpoint.note_count,
                        replayed,
                    }
                };
                info!(
                    "event=index_recover module=db status=ok mode=snapshot notes={} replayed={} duration_ms={}",
                    loaded.checkpoint.note_count,
                    replayed,
                    started_at.elapsed().as_millis()
                );
                return Ok((index, recovery));
            }
            Some(_) => "log_checksum_mismatch".to_string(),
            None => "snapshot_ahead_of_log".to_string(),
        },
        Err(err) => {
            warn!(
                "event=index_snapshot module=db status=corrupt error_code={} error={}",
                err.code(),
                err
            );
            err.code().to_string()
        }
    };

    let index = rebuild_from_log(store, tokenizer)?;
    let notes = index.indexed_notes() as u64;
    info!(
        "event=index_recover module=db status=ok mode=rebuild reason={} notes={} duration_ms={}",
        reason,
        notes,
        started_at.elapsed().as_millis()
    );
    Ok((index, Recovery::Rebuilt { notes, reason }))
}

/// Builds a fresh index from a full scan of the log.
pub fn rebuild_from_log(store: &NoteStore, tokenizer: &Tokenizer) -> NoteResult<InvertedIndex> {
    let mut index = InvertedIndex::new();
    index.try_rebuild(store.scan()?, tokenizer)?;
    Ok(index)
}

fn replay_tail(
    index: &mut InvertedIndex,
    store: &NoteStore,
    tokenizer: &Tokenizer,
    checkpoint: &LogCheckpoint,
) -> NoteResult<u64> {
    let mut replayed = 0;
    for note in store.scan_from(checkpoint.note_count + 1)? {
        index.index_note(&note?, tokenizer);
        replayed += 1;
    }
    Ok(replayed)
}
