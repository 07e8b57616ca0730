//! Background snapshot writer.
//!
//! # Responsibility
//! - Persist index snapshots off the `add`/`search` path.
//! - Coalesce bursts of requests into one write.
//!
//! # Invariants
//! - `request` never blocks; a full queue drops the request.
//! - The writer keeps its own replica of the index, caught up from the log,
//!   and never locks the live index. Since the index is a pure function of
//!   the log, the replica equals the live index at the same checkpoint.
//! - A snapshot always pairs an index state with the log checkpoint of
//!   exactly the notes it contains.
//! - Write failures are logged and never affect correctness.

use crate::db::snapshot::write_snapshot;
use crate::error::NoteResult;
use crate::repo::note_store::{LogCheckpoint, NoteStore};
use crate::search::index::InvertedIndex;
use crate::search::tokenizer::Tokenizer;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

struct Replica {
    index: InvertedIndex,
    last_written: Option<LogCheckpoint>,
}

/// Everything needed to write one snapshot.
#[derive(Clone)]
pub struct SnapshotJob {
    pub path: PathBuf,
    pub store: Arc<NoteStore>,
    tokenizer: Tokenizer,
    replica: Arc<Mutex<Replica>>,
}

impl SnapshotJob {
    /// `seed` must be an index over a prefix of `store`'s notes.
    pub fn new(
        path: PathBuf,
        store: Arc<NoteStore>,
        seed: InvertedIndex,
        tokenizer: Tokenizer,
    ) -> Self {
        Self {
            path,
            store,
            tokenizer,
            replica: Arc::new(Mutex::new(Replica {
                index: seed,
                last_written: None,
            })),
        }
    }

    /// Marks `checkpoint` as already persisted (e.g. a snapshot just loaded).
    pub fn mark_written(&self, checkpoint: LogCheckpoint) {
        self.replica
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_written = Some(checkpoint);
    }

    /// Catches the replica up with the log and writes a snapshot, unless
    /// that state was already written.
    ///
    /// Returns the checkpoint written, or `None` when skipped.
    pub fn write(&self) -> NoteResult<Option<LogCheckpoint>> {
        let started_at = Instant::now();
        let mut replica = self.replica.lock().unwrap_or_else(PoisonError::into_inner);

        let next_id = replica.index.indexed_notes() as u64 + 1;
        for note in self.store.scan_from(next_id)? {
            replica.index.index_note(&note?, &self.tokenizer);
        }
        let Some(checkpoint) = self.store.checkpoint(replica.index.indexed_notes() as u64) else {
            warn!("event=index_snapshot module=db status=skipped reason=index_ahead_of_log");
            return Ok(None);
        };
        if replica.last_written == Some(checkpoint) {
            return Ok(None);
        }

        write_snapshot(
            &self.path,
            &replica.index,
            checkpoint,
            self.tokenizer.min_len(),
        )?;
        replica.last_written = Some(checkpoint);
        info!(
            "event=index_snapshot module=db status=ok notes={} terms={} log_bytes={} duration_ms={}",
            checkpoint.note_count,
            replica.index.term_count(),
            checkpoint.log_bytes,
            started_at.elapsed().as_millis()
        );
        Ok(Some(checkpoint))
    }
}

enum WriterMessage {
    Write,
    Shutdown,
}

/// Handle to the snapshot thread.
pub struct SnapshotWriter {
    sender: Option<SyncSender<WriterMessage>>,
    handle: Option<JoinHandle<()>>,
}

impl SnapshotWriter {
    /// Spawns the writer thread with a bounded request queue.
    pub fn spawn(job: SnapshotJob, capacity: usize) -> NoteResult<Self> {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let handle = thread::Builder::new()
            .name("notebox-snapshot".to_string())
            .spawn(move || Self::runner(job, receiver))
            .map_err(crate::error::NoteError::io("snapshot_thread_spawn"))?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Asks for a snapshot. Returns `false` when the request was dropped.
    pub fn request(&self) -> bool {
        let Some(sender) = self.sender.as_ref() else {
            return false;
        };
        match sender.try_send(WriterMessage::Write) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("event=index_snapshot module=db status=skipped reason=queue_full");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("event=index_snapshot module=db status=skipped reason=writer_stopped");
                false
            }
        }
    }

    /// Stops the thread after it finishes queued work. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(WriterMessage::Shutdown);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("event=index_snapshot module=db status=error error_code=writer_panicked");
            }
        }
    }

    fn runner(job: SnapshotJob, receiver: Receiver<WriterMessage>) {
        while let Ok(message) = receiver.recv() {
            let mut stop = matches!(message, WriterMessage::Shutdown);
            let mut pending = !stop;
            while let Ok(next) = receiver.try_recv() {
                match next {
                    WriterMessage::Write => pending = true,
                    WriterMessage::Shutdown => stop = true,
                }
            }
            if pending {
                if let Err(err) = job.write() {
                    error!(
                        "event=index_snapshot module=db status=error error_code={} error={}",
                        err.code(),
                        err
                    );
                }
            }
            if stop {
                break;
            }
        }
    }
}

impl Drop for SnapshotWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::{SnapshotJob, SnapshotWriter};
    use crate::db::rebuild_from_log;
    use crate::db::snapshot::read_snapshot;
    use crate::repo::note_store::NoteStore;
    use crate::repo::NoteRepository;
    use crate::search::index::InvertedIndex;
    use crate::search::tokenizer::Tokenizer;
    use std::sync::Arc;

    fn job(dir: &std::path::Path) -> SnapshotJob {
        let store = Arc::new(NoteStore::open(dir.join("notes.log")).unwrap());
        let tokenizer = Tokenizer::default();
        let mut index = InvertedIndex::new();
        for content in ["first entry", "second entry"] {
            let note = store.add(content).unwrap();
            index.index_note(&note, &tokenizer);
        }
        SnapshotJob::new(dir.join("index.snapshot"), store, index, tokenizer)
    }

    #[test]
    fn write_skips_unchanged_state() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path());

        let first = job.write().unwrap().expect("first write should happen");
        assert_eq!(first.note_count, 2);
        assert!(job.write().unwrap().is_none());
    }

    #[test]
    fn write_catches_replica_up_with_the_log() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path());
        // Committed after the replica was seeded.
        job.store.add("third entry").unwrap();

        let written = job.write().unwrap().unwrap();
        assert_eq!(written.note_count, 3);
        assert_eq!(job.store.checkpoint(3), Some(written));

        let loaded = read_snapshot(&job.path, 2).unwrap().unwrap();
        let expected = rebuild_from_log(&job.store, &Tokenizer::default()).unwrap();
        assert_eq!(loaded.index, expected);
    }

    #[test]
    fn empty_seed_is_filled_from_the_log() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(NoteStore::open(tmp.path().join("notes.log")).unwrap());
        for content in ["alpha note", "beta note"] {
            store.add(content).unwrap();
        }
        let job = SnapshotJob::new(
            tmp.path().join("index.snapshot"),
            Arc::clone(&store),
            InvertedIndex::new(),
            Tokenizer::default(),
        );

        assert_eq!(job.write().unwrap().unwrap().note_count, 2);
        let loaded = read_snapshot(&job.path, 2).unwrap().unwrap();
        assert_eq!(loaded.index.postings_for("note").len(), 2);
    }

    #[test]
    fn background_writer_flushes_before_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let job = job(tmp.path());
        let path = job.path.clone();

        let mut writer = SnapshotWriter::spawn(job, 4).unwrap();
        assert!(writer.request());
        writer.shutdown();
        assert!(!writer.request());

        let loaded = read_snapshot(&path, 2).unwrap().unwrap();
        assert_eq!(loaded.checkpoint.note_count, 2);
    }
}
