//! FFI use-case API for UI-facing calls.
//!
//! # Responsibility
//! - Expose `add_note` / `search_notes` and the store lifecycle to the UI
//!   layer via FRB.
//! - Hold the one process-scoped `NoteService` between `notes_open` and
//!   `notes_close`.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Note operations fail with a message until `notes_open` succeeds.

use log::warn;
use notebox_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Note, NoteConfig, NoteService, SearchHit,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

static NOTES: Mutex<Option<Arc<NoteService>>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Lifecycle response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleResponse {
    pub ok: bool,
    pub message: String,
}

/// Response for `add_note`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddNoteResponse {
    pub ok: bool,
    /// Assigned note id on success.
    pub id: Option<u64>,
    pub message: String,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSearchItem {
    pub id: u64,
    pub content: String,
    pub score: f64,
}

/// Response for `search_notes`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchNotesResponse {
    /// Ranked by score descending, newest first on ties.
    pub items: Vec<NoteSearchItem>,
    pub message: String,
    pub applied_limit: u32,
}

/// One stored note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteItem {
    pub id: u64,
    pub content: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Response for `get_note`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDetailResponse {
    pub ok: bool,
    pub note: Option<NoteItem>,
    pub message: String,
}

/// Response for `list_notes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotesListResponse {
    /// Newest first.
    pub items: Vec<NoteItem>,
    pub message: String,
    pub applied_limit: u32,
}

/// Opens the note store and recovers its index.
///
/// `data_dir` falls back to `NOTEBOX_DATA_DIR`, then the temp directory.
///
/// # FFI contract
/// - Idempotent for the same directory; a different directory is rejected
///   until `notes_close`.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_open(data_dir: Option<String>) -> LifecycleResponse {
    let explicit = data_dir
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from);
    let config = NoteConfig::resolve(explicit.as_deref());

    let mut slot = NOTES.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(service) = slot.as_ref() {
        if service.config().data_dir == config.data_dir {
            return LifecycleResponse::success("Notes already open.");
        }
        return LifecycleResponse::failure(format!(
            "notes_open failed: already open at `{}`",
            service.config().data_dir.display()
        ));
    }

    match NoteService::open(config) {
        Ok(service) => {
            *slot = Some(Arc::new(service));
            LifecycleResponse::success("Notes opened.")
        }
        Err(err) => LifecycleResponse::failure(format!("notes_open failed: {err}")),
    }
}

/// Flushes the index snapshot and releases the note store.
///
/// # FFI contract
/// - Returns `ok: false` and keeps the store open while another call is
///   still using it; the caller retries once that call has returned.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_close() -> LifecycleResponse {
    let mut slot = NOTES.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(service) = slot.take() else {
        return LifecycleResponse::success("Notes already closed.");
    };

    // Clones are only made under `NOTES`, so the count cannot grow here.
    match Arc::try_unwrap(service) {
        Ok(service) => match service.close() {
            Ok(()) => LifecycleResponse::success("Notes closed."),
            Err(err) => LifecycleResponse::failure(format!("notes_close failed: {err}")),
        },
        Err(shared) => {
            *slot = Some(shared);
            warn!("event=notes_close module=ffi status=busy reason=in_flight_call");
            LifecycleResponse::failure("notes_close failed: a call is still in flight; retry")
        }
    }
}

/// Stores one note durably.
///
/// # FFI contract
/// - Never panics; never partially succeeds.
/// - Returns the assigned id on success, an I/O message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn add_note(content: String) -> AddNoteResponse {
    match with_service(|service| service.add_note(&content).map_err(|err| err.to_string())) {
        Ok(id) => AddNoteResponse {
            ok: true,
            id: Some(id),
            message: "Note added.".to_string(),
        },
        Err(err) => AddNoteResponse {
            ok: false,
            id: None,
            message: format!("add_note failed: {err}"),
        },
    }
}

/// Ranked free-text search.
///
/// # FFI contract
/// - Empty query or no match yields empty `items` with `ok` semantics.
/// - `limit`: `None`/`0` -> default (10), clamped to 100.
#[flutter_rust_bridge::frb(sync)]
pub fn search_notes(query: String, limit: Option<u32>) -> SearchNotesResponse {
    let result = with_service(|service| {
        let applied_limit = service.config().normalize_limit(limit);
        service
            .search_notes_with_limit(&query, Some(applied_limit))
            .map(|hits| (hits, applied_limit))
            .map_err(|err| err.to_string())
    });

    match result {
        Ok((hits, applied_limit)) => {
            let items = hits.into_iter().map(to_search_item).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No results.".to_string()
            } else {
                format!("Found {} result(s).", items.len())
            };
            SearchNotesResponse {
                items,
                message,
                applied_limit,
            }
        }
        Err(err) => SearchNotesResponse {
            items: Vec::new(),
            message: format!("search_notes failed: {err}"),
            applied_limit: 0,
        },
    }
}

/// Fetches one note by id.
#[flutter_rust_bridge::frb(sync)]
pub fn get_note(id: u64) -> NoteDetailResponse {
    match with_service(|service| service.get_note(id).map_err(|err| err.to_string())) {
        Ok(note) => NoteDetailResponse {
            ok: true,
            note: Some(to_note_item(note)),
            message: String::new(),
        },
        Err(err) => NoteDetailResponse {
            ok: false,
            note: None,
            message: format!("get_note failed: {err}"),
        },
    }
}

/// Lists notes newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn list_notes(limit: Option<u32>, offset: u32) -> NotesListResponse {
    let result = with_service(|service| {
        let applied_limit = service.config().normalize_limit(limit);
        service
            .list_notes(Some(applied_limit), offset)
            .map(|notes| (notes, applied_limit))
            .map_err(|err| err.to_string())
    });

    match result {
        Ok((notes, applied_limit)) => NotesListResponse {
            message: format!("Listed {} note(s).", notes.len()),
            items: notes.into_iter().map(to_note_item).collect(),
            applied_limit,
        },
        Err(err) => NotesListResponse {
            items: Vec::new(),
            message: format!("list_notes failed: {err}"),
            applied_limit: 0,
        },
    }
}

impl LifecycleResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

fn with_service<T>(f: impl FnOnce(&NoteService) -> Result<T, String>) -> Result<T, String> {
    let service = NOTES
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or_else(|| "notes are not open; call notes_open first".to_string())?;
    f(&service)
}

fn to_search_item(hit: SearchHit) -> NoteSearchItem {
    NoteSearchItem {
        id: hit.id,
        content: hit.content,
        score: hit.score,
    }
}

fn to_note_item(note: Note) -> NoteItem {
    NoteItem {
        id: note.id,
        content: note.content,
        created_at: note.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        add_note, core_version, get_note, init_logging, list_notes, notes_close, notes_open, ping,
        search_notes, NOTES,
    };
    use std::sync::{Mutex, MutexGuard, PoisonError};

    // FFI state is process-wide; serialize tests that open/close it.
    static FFI_LOCK: Mutex<()> = Mutex::new(());

    fn lock() -> MutexGuard<'static, ()> {
        FFI_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_bad_input() {
        assert!(!init_logging("info".to_string(), String::new()).is_empty());
        assert!(!init_logging("verbose".to_string(), "tmp/logs".to_string()).is_empty());
    }

    #[test]
    fn calls_fail_cleanly_before_open() {
        let _guard = lock();
        notes_close();

        let added = add_note("orphan".to_string());
        assert!(!added.ok);
        assert!(added.message.contains("notes_open"));

        let searched = search_notes("orphan".to_string(), None);
        assert!(searched.items.is_empty());
        assert!(searched.message.contains("search_notes failed"));
    }

    #[test]
    fn add_then_search_round_trip() {
        let _guard = lock();
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap().to_string();

        assert!(notes_open(Some(dir.clone())).ok);
        assert!(notes_open(Some(dir)).ok);

        let first = add_note("hello world".to_string());
        assert!(first.ok, "{}", first.message);
        let second = add_note("hello again".to_string());
        assert_eq!(second.id, first.id.map(|id| id + 1));

        let response = search_notes("hello".to_string(), Some(500));
        assert_eq!(response.applied_limit, 100);
        assert_eq!(response.items.len(), 2);
        assert_eq!(response.items[0].id, second.id.unwrap());

        assert!(search_notes(String::new(), None).items.is_empty());
        assert_eq!(search_notes(String::new(), None).message, "No results.");

        let detail = get_note(first.id.unwrap());
        assert_eq!(detail.note.unwrap().content, "hello world");
        assert!(!get_note(999).ok);

        let listed = list_notes(None, 0);
        assert_eq!(listed.applied_limit, 10);
        assert_eq!(listed.items.len(), 2);

        assert!(notes_close().ok);
        assert!(!add_note("after close".to_string()).ok);
    }

    #[test]
    fn reopening_elsewhere_requires_close() {
        let _guard = lock();
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        assert!(notes_open(Some(first.path().to_str().unwrap().to_string())).ok);
        let conflict = notes_open(Some(second.path().to_str().unwrap().to_string()));
        assert!(!conflict.ok);
        assert!(notes_close().ok);
        assert!(notes_open(Some(second.path().to_str().unwrap().to_string())).ok);
        assert!(notes_close().ok);
    }

    #[test]
    fn close_waits_for_in_flight_calls() {
        let _guard = lock();
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap().to_string();
        assert!(notes_open(Some(dir.clone())).ok);

        // Stands in for a call that is still running on another thread.
        let in_flight = NOTES.lock().unwrap().clone().unwrap();
        let busy = notes_close();
        assert!(!busy.ok);
        assert!(add_note("still open".to_string()).ok);

        // Reopening the same directory reuses the live store.
        assert!(notes_open(Some(dir)).ok);

        drop(in_flight);
        assert!(notes_close().ok);
        assert!(!add_note("closed now".to_string()).ok);
    }
}
