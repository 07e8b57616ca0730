//! Append-only note log with durable, gap-free identifiers.
//!
//! # Responsibility
//! - Append notes durably (`write` + `sync_data`) and assign ids.
//! - Serve point reads and restartable sequential scans.
//! - Recover a torn tail left by a crash during append.
//! - Hold an exclusive lock so one process-wide writer owns the log.
//!
//! # Invariants
//! - Ids start at 1 and increase by exactly 1 per committed note.
//! - A failed append does not advance the id counter and leaves no bytes
//!   behind.
//! - Record metadata is published only after `sync_data`; readers never see
//!   a partially written note.

use crate::error::{NoteError, NoteResult};
use crate::model::note::{now_epoch_ms, Note, NoteId};
use crate::repo::record::{
    checksum_matches, decode_payload, decode_record, encode_record, ensure_content_fits,
    parse_header, LOG_HEADER_LEN, LOG_MAGIC, RECORD_HEADER_LEN,
};
use crate::repo::NoteRepository;
use log::{error, info, warn};
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Instant;

/// Position and running checksum of one committed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordMeta {
    offset: u64,
    end: u64,
    /// CRC32 of every log byte from the first record through this one.
    running_crc: u32,
}

/// Log length and checksum covering the first `note_count` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogCheckpoint {
    pub note_count: u64,
    pub log_bytes: u64,
    pub log_checksum: u32,
}

struct LogWriter {
    file: File,
    next_id: NoteId,
    committed_len: u64,
    hasher: crc32fast::Hasher,
    /// Next write stops after this many bytes and fails.
    #[cfg(test)]
    fail_after: Option<usize>,
}

impl LogWriter {
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        #[cfg(test)]
        if let Some(limit) = self.fail_after.take() {
            self.file.write_all(&bytes[..limit.min(bytes.len())])?;
            return Err(io::Error::other("short write"));
        }
        self.file.write_all(bytes)?;
        self.file.sync_data()
    }
}

/// File-backed note store.
pub struct NoteStore {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    records: RwLock<Vec<RecordMeta>>,
    /// Exclusive lock on `<log>.lock`, released on drop.
    _lock: File,
}

impl NoteStore {
    /// Opens (or creates) the log at `path`, truncating a torn tail.
    ///
    /// # Errors
    /// - `StorageIo` when the file cannot be opened, read or repaired, or
    ///   another `NoteStore` (in this or another process) holds the log.
    /// - `CorruptLog` when a record header or a complete record fails its
    ///   checksum, or a record breaks the id sequence.
    pub fn open(path: impl AsRef<Path>) -> NoteResult<Self> {
        let path = path.as_ref().to_path_buf();
        let started_at = Instant::now();
        let lock = acquire_lock(&path)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(NoteError::io("log_open"))?;

        ensure_header(&mut file)?;
        let recovered = recover_records(&mut file)?;

        if let Some(torn_at) = recovered.torn_at {
            warn!(
                "event=log_recover module=store status=truncated kept_records={} torn_at={} dropped_bytes={}",
                recovered.records.len(),
                torn_at,
                recovered.file_len - torn_at
            );
            file.set_len(torn_at)
                .and_then(|()| file.sync_all())
                .map_err(NoteError::io("log_truncate_tail"))?;
        }

        let committed_len = recovered
            .records
            .last()
            .map_or(LOG_HEADER_LEN, |meta| meta.end);
        let next_id = recovered.records.len() as NoteId + 1;

        info!(
            "event=log_open module=store status=ok records={} bytes={} duration_ms={}",
            recovered.records.len(),
            committed_len,
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            path,
            writer: Mutex::new(LogWriter {
                file,
                next_id,
                committed_len,
                hasher: recovered.hasher,
                #[cfg(test)]
                fail_after: None,
            }),
            records: RwLock::new(recovered.records),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one note and returns it once it is durable.
    ///
    /// # Errors
    /// - `ContentTooLarge` before anything is written.
    /// - `StorageIo` when the write or fsync fails; partial bytes are
    ///   truncated and the id is not consumed.
    pub fn append(&self, content: &str) -> NoteResult<Note> {
        let started_at = Instant::now();
        ensure_content_fits(content.len())?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let note = Note::new(writer.next_id, content, now_epoch_ms());
        let bytes = encode_record(&note)?;
        let offset = writer.committed_len;

        if let Err(err) = writer.write_at(offset, &bytes) {
            // Drop any partial bytes so the next append reuses this id and offset.
            let rollback = writer.file.set_len(offset);
            error!(
                "event=note_append module=store status=error id={} duration_ms={} rollback_ok={} error={}",
                note.id,
                started_at.elapsed().as_millis(),
                rollback.is_ok(),
                err
            );
            return Err(NoteError::io("log_append")(err));
        }

        writer.hasher.update(&bytes);
        let meta = RecordMeta {
            offset,
            end: offset + bytes.len() as u64,
            running_crc: writer.hasher.clone().finalize(),
        };
        writer.committed_len = meta.end;
        writer.next_id += 1;
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(meta);

        info!(
            "event=note_append module=store status=ok id={} bytes={} duration_ms={}",
            note.id,
            bytes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(note)
    }

    /// Number of committed notes.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_id(&self) -> Option<NoteId> {
        match self.len() {
            0 => None,
            count => Some(count as NoteId),
        }
    }

    /// Bytes of the log covered by committed records (header included).
    pub fn committed_bytes(&self) -> u64 {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map_or(LOG_HEADER_LEN, |meta| meta.end)
    }

    /// Log length and checksum after the first `note_count` records.
    ///
    /// Returns `None` when fewer records are committed.
    pub fn checkpoint(&self, note_count: u64) -> Option<LogCheckpoint> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        if note_count == 0 {
            return Some(LogCheckpoint {
                note_count: 0,
                log_bytes: LOG_HEADER_LEN,
                log_checksum: 0,
            });
        }
        let meta = records.get(usize::try_from(note_count - 1).ok()?)?;
        Some(LogCheckpoint {
            note_count,
            log_bytes: meta.end,
            log_checksum: meta.running_crc,
        })
    }

    /// Scans committed notes starting at `first_id` (ids below 1 start at 1).
    pub fn scan_from(&self, first_id: NoteId) -> NoteResult<NoteScan> {
        let skip = usize::try_from(first_id.saturating_sub(1)).unwrap_or(usize::MAX);
        let (start, end, remaining) = {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            let end = records.last().map_or(LOG_HEADER_LEN, |meta| meta.end);
            let start = records.get(skip).map_or(end, |meta| meta.offset);
            (start, end, records.len().saturating_sub(skip))
        };
        let mut file = File::open(&self.path).map_err(NoteError::io("log_scan"))?;
        file.seek(SeekFrom::Start(start))
            .map_err(NoteError::io("log_scan"))?;
        Ok(NoteScan {
            reader: BufReader::new(file),
            offset: start,
            end,
            remaining,
            failed: false,
        })
    }

    fn meta_for(&self, id: NoteId) -> NoteResult<RecordMeta> {
        let index = id
            .checked_sub(1)
            .and_then(|index| usize::try_from(index).ok())
            .ok_or(NoteError::NotFound(id))?;
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .copied()
            .ok_or(NoteError::NotFound(id))
    }
}

impl NoteRepository for NoteStore {
    type Scan = NoteScan;

    fn add(&self, content: &str) -> NoteResult<Note> {
        self.append(content)
    }

    fn get(&self, id: NoteId) -> NoteResult<Note> {
        let meta = self.meta_for(id)?;
        let mut file = File::open(&self.path).map_err(NoteError::io("log_read"))?;
        let mut buf = vec![0u8; (meta.end - meta.offset) as usize];
        file.seek(SeekFrom::Start(meta.offset))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(NoteError::io("log_read"))?;
        let note = decode_record(&buf, meta.offset)?;
        if note.id != id {
            return Err(NoteError::CorruptLog {
                offset: meta.offset,
                reason: format!("expected note {id}, found {}", note.id),
            });
        }
        Ok(note)
    }

    fn scan(&self) -> NoteResult<NoteScan> {
        self.scan_from(1)
    }

    fn len(&self) -> usize {
        NoteStore::len(self)
    }
}

/// Sequential reader over the notes committed when the scan started.
///
/// Appends made after [`NoteRepository::scan`] returned are not visited.
pub struct NoteScan {
    reader: BufReader<File>,
    offset: u64,
    end: u64,
    remaining: usize,
    failed: bool,
}

impl NoteScan {
    fn read_next(&mut self) -> NoteResult<Note> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        self.reader
            .read_exact(&mut header)
            .map_err(NoteError::io("log_scan"))?;
        let len = parse_header(&header).map_or(0, |parsed| parsed.payload_len);
        let mut record = header.to_vec();
        record.resize(RECORD_HEADER_LEN + len as usize, 0);
        self.reader
            .read_exact(&mut record[RECORD_HEADER_LEN..])
            .map_err(NoteError::io("log_scan"))?;
        let note = decode_record(&record, self.offset)?;
        self.offset += record.len() as u64;
        Ok(note)
    }
}

impl Iterator for NoteScan {
    type Item = NoteResult<Note>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 || self.offset >= self.end {
            return None;
        }
        let item = self.read_next();
        match item {
            Ok(_) => self.remaining -= 1,
            Err(_) => self.failed = true,
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.remaining))
        }
    }
}

fn acquire_lock(log_path: &Path) -> NoteResult<File> {
    let mut name = log_path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    let lock_path = log_path.with_file_name(name);

    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(NoteError::io("log_lock"))?;
    match lock.try_lock() {
        Ok(()) => Ok(lock),
        Err(TryLockError::WouldBlock) => {
            warn!(
                "event=log_open module=store status=error error_code=log_locked path={}",
                log_path.display()
            );
            Err(NoteError::io("log_lock")(io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("`{}` is already open by another writer", log_path.display()),
            )))
        }
        Err(TryLockError::Error(err)) => Err(NoteError::io("log_lock")(err)),
    }
}

struct Recovered {
    records: Vec<RecordMeta>,
    hasher: crc32fast::Hasher,
    file_len: u64,
    torn_at: Option<u64>,
}

fn ensure_header(file: &mut File) -> NoteResult<()> {
    let len = file
        .metadata()
        .map_err(NoteError::io("log_open"))?
        .len();

    if len < LOG_HEADER_LEN {
        let mut existing = vec![0u8; len as usize];
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_exact(&mut existing))
            .map_err(NoteError::io("log_open"))?;
        if !LOG_MAGIC.starts_with(&existing) {
            return Err(NoteError::CorruptLog {
                offset: 0,
                reason: "unrecognized log header".to_string(),
            });
        }
        // Fresh file or a crash while writing the header.
        file.set_len(0)
            .and_then(|()| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.write_all(LOG_MAGIC))
            .and_then(|()| file.sync_all())
            .map_err(NoteError::io("log_init"))?;
        return Ok(());
    }

    let mut magic = [0u8; LOG_MAGIC.len()];
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_exact(&mut magic))
        .map_err(NoteError::io("log_open"))?;
    if &magic != LOG_MAGIC {
        return Err(NoteError::CorruptLog {
            offset: 0,
            reason: "unrecognized log header".to_string(),
        });
    }
    Ok(())
}

fn recover_records(file: &mut File) -> NoteResult<Recovered> {
    let file_len = file
        .metadata()
        .map_err(NoteError::io("log_open"))?
        .len();
    file.seek(SeekFrom::Start(LOG_HEADER_LEN))
        .map_err(NoteError::io("log_open"))?;
    let mut reader = BufReader::new(&*file);

    let mut records = Vec::new();
    let mut hasher = crc32fast::Hasher::new();
    let mut offset = LOG_HEADER_LEN;
    let mut torn_at = None;

    while offset < file_len {
        if file_len - offset < RECORD_HEADER_LEN as u64 {
            torn_at = Some(offset);
            break;
        }
        let mut header = [0u8; RECORD_HEADER_LEN];
        reader
            .read_exact(&mut header)
            .map_err(NoteError::io("log_open"))?;
        // A damaged length would otherwise pass for a torn tail and take
        // every later record with it.
        let Some(parsed) = parse_header(&header) else {
            return Err(NoteError::CorruptLog {
                offset,
                reason: "record header checksum mismatch".to_string(),
            });
        };
        let end = offset + RECORD_HEADER_LEN as u64 + u64::from(parsed.payload_len);
        if end > file_len {
            torn_at = Some(offset);
            break;
        }

        let mut payload = vec![0u8; parsed.payload_len as usize];
        reader
            .read_exact(&mut payload)
            .map_err(NoteError::io("log_open"))?;
        if !checksum_matches(&payload, parsed.payload_crc) {
            if end == file_len {
                torn_at = Some(offset);
                break;
            }
            return Err(NoteError::CorruptLog {
                offset,
                reason: "record checksum mismatch".to_string(),
            });
        }

        let note = decode_payload(&payload, offset)?;
        let expected = records.len() as NoteId + 1;
        if note.id != expected {
            return Err(NoteError::CorruptLog {
                offset,
                reason: format!("expected note {expected}, found {}", note.id),
            });
        }

        hasher.update(&header);
        hasher.update(&payload);
        records.push(RecordMeta {
            offset,
            end,
            running_crc: hasher.clone().finalize(),
        });
        offset = end;
    }

    Ok(Recovered {
        records,
        hasher,
        file_len,
        torn_at,
    })
}
