use notebox_core::db::rebuild_from_log;
use notebox_core::{NoteConfig, NoteService, NoteStore, Recovery, SearchHit, Tokenizer};
use std::fs::OpenOptions;
use std::io::Write;

const CORPUS: &[&str] = &[
    "Rust ownership and borrowing notes",
    "grocery list: milk, eggs, bread",
    "borrowing books from the library",
    "meeting notes: rust workshop planning",
    "",
    "milk tea recipe with extra milk",
];

const QUERIES: &[&str] = &["rust", "milk", "notes", "borrowing library", "planning eggs", ""];

fn fill(service: &NoteService) {
    for content in CORPUS {
        service.add_note(content).unwrap();
    }
}

fn results(service: &NoteService) -> Vec<Vec<SearchHit>> {
    QUERIES
        .iter()
        .map(|query| service.search_notes(query).unwrap())
        .collect()
}

#[test]
fn rebuild_from_scan_matches_incremental_index() {
    let tmp = tempfile::tempdir().unwrap();
    let service = NoteService::open(NoteConfig::new(tmp.path())).unwrap();
    fill(&service);

    let incremental = service.index_snapshot();
    let before = results(&service);

    assert_eq!(service.rebuild_index().unwrap(), CORPUS.len());
    assert_eq!(service.index_snapshot(), incremental);
    assert_eq!(results(&service), before);
}

#[test]
fn restart_without_snapshot_reproduces_results() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NoteConfig::new(tmp.path());

    let before = {
        let service = NoteService::open(config.clone()).unwrap();
        fill(&service);
        let before = results(&service);
        // Simulated crash: drop without close, then discard any snapshot.
        drop(service);
        before
    };
    let _ = std::fs::remove_file(config.snapshot_path());

    let service = NoteService::open(config).unwrap();
    assert!(matches!(service.recovery(), Recovery::Rebuilt { .. }));
    assert_eq!(results(&service), before);
    assert_eq!(service.add_note("after restart").unwrap(), CORPUS.len() as u64 + 1);
}

#[test]
fn clean_close_reopens_from_snapshot() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NoteConfig::new(tmp.path());

    let before = {
        let service = NoteService::open(config.clone()).unwrap();
        fill(&service);
        let before = results(&service);
        service.close().unwrap();
        before
    };
    assert!(config.snapshot_path().exists());

    let service = NoteService::open(config).unwrap();
    assert_eq!(
        service.recovery(),
        &Recovery::Snapshot {
            notes: CORPUS.len() as u64
        }
    );
    assert_eq!(results(&service), before);
}

#[test]
fn notes_added_after_last_snapshot_are_replayed() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NoteConfig::new(tmp.path());
    {
        let service = NoteService::open(config.clone()).unwrap();
        service.add_note("snapshotted rust note").unwrap();
        service.close().unwrap();
    }

    // Commit directly to the log so no snapshot can cover it.
    {
        let store = NoteStore::open(config.log_path()).unwrap();
        assert_eq!(store.append("unsnapshotted rust note").unwrap().id, 2);
    }

    let service = NoteService::open(config).unwrap();
    assert_eq!(
        service.recovery(),
        &Recovery::CaughtUp {
            from_snapshot: 1,
            replayed: 1
        }
    );
    let ids: Vec<_> = service
        .search_notes("rust")
        .unwrap()
        .into_iter()
        .map(|hit| hit.id)
        .collect();
    assert_eq!(ids, vec![2, 1]);
}

#[test]
fn stale_snapshot_after_log_change_is_rebuilt() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NoteConfig::new(tmp.path());
    {
        let service = NoteService::open(config.clone()).unwrap();
        service.add_note("original content").unwrap();
        service.close().unwrap();
    }

    // Replace the log with a different history of the same length.
    std::fs::remove_file(config.log_path()).unwrap();
    {
        let store = NoteStore::open(config.log_path()).unwrap();
        store.append("replacement content").unwrap();
    }

    let service = NoteService::open(config).unwrap();
    assert!(matches!(service.recovery(), Recovery::Rebuilt { .. }));
    assert!(service.search_notes("original").unwrap().is_empty());
    assert_eq!(service.search_notes("replacement").unwrap().len(), 1);
}

#[test]
fn torn_log_tail_is_dropped_and_ids_continue() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NoteConfig::new(tmp.path());
    {
        let service = NoteService::open(config.clone()).unwrap();
        service.add_note("durable note").unwrap();
        service.close().unwrap();
    }

    let mut log = OpenOptions::new().append(true).open(config.log_path()).unwrap();
    log.write_all(&[0xFF, 0x00, 0x00, 0x00, 0xAB, 0xCD, 0xEF, 0x01, 0x02])
        .unwrap();
    drop(log);

    let service = NoteService::open(config).unwrap();
    assert_eq!(service.status().note_count, 1);
    assert_eq!(service.add_note("next note").unwrap(), 2);
    assert_eq!(service.search_notes("durable").unwrap()[0].id, 1);
}

#[test]
fn rebuild_from_log_matches_service_index() {
    let tmp = tempfile::tempdir().unwrap();
    let config = NoteConfig::new(tmp.path());
    let service = NoteService::open(config.clone()).unwrap();
    fill(&service);
    let live = service.index_snapshot();
    service.close().unwrap();

    let store = NoteStore::open(config.log_path()).unwrap();
    let rebuilt = rebuild_from_log(&store, &Tokenizer::new(config.min_token_len)).unwrap();
    assert_eq!(rebuilt, live);
}
