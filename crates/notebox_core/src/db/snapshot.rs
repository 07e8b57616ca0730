//! Index snapshot file format.
//!
//! A snapshot is one JSON header line followed by the JSON-encoded index:
//!
//! ```text
//! {"format":"notebox-index","version":1,...,"body_checksum":123}\n
//! {"terms":{...},"doc_lengths":{...}}
//! ```
//!
//! The header records the note-log checkpoint the index was built from. A
//! snapshot is only a cache: any mismatch is reported as `CorruptIndex` and
//! the caller rebuilds from the log.

use crate::error::{NoteError, NoteResult};
use crate::repo::note_store::LogCheckpoint;
use crate::search::index::InvertedIndex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const SNAPSHOT_FORMAT: &str = "notebox-index";
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SnapshotHeader {
    format: String,
    version: u32,
    /// Tokenizer setting the index was built with.
    min_token_len: usize,
    note_count: u64,
    log_bytes: u64,
    log_checksum: u32,
    body_len: u64,
    body_checksum: u32,
}

/// A snapshot that passed format and integrity checks.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub index: InvertedIndex,
    pub checkpoint: LogCheckpoint,
}

/// Atomically replaces the snapshot at `path` (temp file + fsync + rename).
pub fn write_snapshot(
    path: &Path,
    index: &InvertedIndex,
    checkpoint: LogCheckpoint,
    min_token_len: usize,
) -> NoteResult<()> {
    let body = serde_json::to_vec(index)
        .map_err(|err| NoteError::CorruptIndex(format!("cannot encode index: {err}")))?;
    let header = SnapshotHeader {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        min_token_len,
        note_count: checkpoint.note_count,
        log_bytes: checkpoint.log_bytes,
        log_checksum: checkpoint.log_checksum,
        body_len: body.len() as u64,
        body_checksum: crc32fast::hash(&body),
    };
    let header_line = serde_json::to_vec(&header)
        .map_err(|err| NoteError::CorruptIndex(format!("cannot encode header: {err}")))?;

    let tmp_path = temp_path(path);
    let mut file = File::create(&tmp_path).map_err(NoteError::io("snapshot_write"))?;
    file.write_all(&header_line)
        .and_then(|()| file.write_all(b"\n"))
        .and_then(|()| file.write_all(&body))
        .and_then(|()| file.sync_all())
        .map_err(NoteError::io("snapshot_write"))?;
    drop(file);
    fs::rename(&tmp_path, path).map_err(NoteError::io("snapshot_rename"))?;
    Ok(())
}

/// Reads and validates the snapshot at `path`.
///
/// Returns `Ok(None)` when no snapshot exists.
///
/// # Errors
/// - `CorruptIndex` for truncation, checksum/version/format mismatch, or a
///   structurally invalid index.
/// - `StorageIo` when the file exists but cannot be read.
pub fn read_snapshot(path: &Path, min_token_len: usize) -> NoteResult<Option<LoadedSnapshot>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(NoteError::io("snapshot_read")(err)),
    };

    let newline = bytes
        .iter()
        .position(|byte| *byte == b'\n')
        .ok_or_else(|| NoteError::CorruptIndex("missing header line".into()))?;
    let (header_bytes, rest) = bytes.split_at(newline);
    let body = &rest[1..];

    let header: SnapshotHeader = serde_json::from_slice(header_bytes)
        .map_err(|err| NoteError::CorruptIndex(format!("unreadable header: {err}")))?;

    if header.format != SNAPSHOT_FORMAT {
        return Err(NoteError::CorruptIndex(format!(
            "unexpected format `{}`",
            header.format
        )));
    }
    if header.version != SNAPSHOT_VERSION {
        return Err(NoteError::CorruptIndex(format!(
            "snapshot version {} does not match {}",
            header.version, SNAPSHOT_VERSION
        )));
    }
    if header.min_token_len != min_token_len {
        return Err(NoteError::CorruptIndex(format!(
            "snapshot built with min_token_len {}, configured {}",
            header.min_token_len, min_token_len
        )));
    }
    if header.body_len != body.len() as u64 {
        return Err(NoteError::CorruptIndex(format!(
            "body is {} bytes, header says {}",
            body.len(),
            header.body_len
        )));
    }
    if crc32fast::hash(body) != header.body_checksum {
        return Err(NoteError::CorruptIndex("body checksum mismatch".into()));
    }

    let index: InvertedIndex = serde_json::from_slice(body)
        .map_err(|err| NoteError::CorruptIndex(format!("unreadable body: {err}")))?;
    index.verify().map_err(NoteError::CorruptIndex)?;

    // Ids are gap-free, so a snapshot over N notes indexes exactly 1..=N.
    let indexed = index.indexed_notes() as u64;
    let last = index.last_indexed_id().unwrap_or(0);
    if indexed != header.note_count || last != header.note_count {
        return Err(NoteError::CorruptIndex(format!(
            "index covers {indexed} notes (last {last}), header says {}",
            header.note_count
        )));
    }

    Ok(Some(LoadedSnapshot {
        index,
        checkpoint: LogCheckpoint {
            note_count: header.note_count,
            log_bytes: header.log_bytes,
            log_checksum: header.log_checksum,
        },
    }))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
