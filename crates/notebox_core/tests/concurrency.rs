use notebox_core::{NoteConfig, NoteError, NoteService};
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_writers_get_unique_gap_free_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(NoteService::open(NoteConfig::new(tmp.path())).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                (0..20)
                    .map(|i| service.add_note(&format!("worker{worker} item{i}")).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();
    ids.sort_unstable();
    let expected: Vec<u64> = (1..=80).collect();
    assert_eq!(ids, expected);
    assert_eq!(service.status().indexed_notes, 80);
}

#[test]
fn readers_only_see_committed_notes_during_writes() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(NoteService::open(NoteConfig::new(tmp.path())).unwrap());

    let writer = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for i in 0..50 {
                service.add_note(&format!("shared keyword entry{i}")).unwrap();
            }
        })
    };
    let reader = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            let mut last_seen = 0;
            for _ in 0..50 {
                let hits = service.search_notes_with_limit("keyword", Some(100)).unwrap();
                for hit in &hits {
                    assert!(hit.content.starts_with("shared keyword"));
                }
                assert!(hits.len() >= last_seen, "visible notes never shrink");
                last_seen = hits.len();
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(
        service
            .search_notes_with_limit("keyword", Some(100))
            .unwrap()
            .len(),
        50
    );
}

#[test]
fn searches_during_rebuild_see_a_complete_index() {
    let tmp = tempfile::tempdir().unwrap();
    let service = Arc::new(NoteService::open(NoteConfig::new(tmp.path())).unwrap());
    for i in 0..30 {
        service.add_note(&format!("stable corpus note {i}")).unwrap();
    }

    let rebuilder = {
        let service = Arc::clone(&service);
        thread::spawn(move || {
            for _ in 0..5 {
                assert_eq!(service.rebuild_index().unwrap(), 30);
            }
        })
    };
    for _ in 0..20 {
        let hits = service.search_notes_with_limit("corpus", Some(100)).unwrap();
        assert_eq!(hits.len(), 30);
    }
    rebuilder.join().unwrap();
}

#[test]
fn second_service_on_same_data_dir_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let first = NoteService::open(NoteConfig::new(tmp.path())).unwrap();
    first.add_note("owned by the first service").unwrap();

    let err = NoteService::open(NoteConfig::new(tmp.path()))
        .err()
        .expect("second open should fail");
    assert!(matches!(err, NoteError::StorageIo { context: "log_lock", .. }));
    assert_eq!(first.add_note("still writable").unwrap(), 2);

    first.close().unwrap();
    let reopened = NoteService::open(NoteConfig::new(tmp.path())).unwrap();
    assert_eq!(reopened.status().note_count, 2);
}
