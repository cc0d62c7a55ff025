use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

use rom_librarian_core::cache::IdentityCache;
use rom_librarian_core::hasher::hash_bytes;
use rom_librarian_core::progress::ProgressEvent;
use rom_librarian_core::{
    execute_deletions, spawn_duplicate_scan, AppConfig, CancelToken, Error, FileRecord,
    OperationStatus, ProgressReporter, ReferenceEntry, ReferenceIndex, ScanEngine, ScanRequest,
    ScanScope, SilentReporter, Strategy,
};

const SHARED: &[u8] = b"shared rom content xyz";

fn large_content() -> Vec<u8> {
    vec![0xAAu8; 4096]
}

/// Create a temp directory tree with known duplicates.
/// Layout:
///   root/
///     folder_a/
///       unique_a.sfc       ("unique content a")
///       shared.sfc         (SHARED)
///     folder_b/
///       unique_b.sfc       ("unique content b")
///       shared.sfc         (SHARED)                  <- duplicate of folder_a/shared.sfc
///     folder_c/
///       large.bin          (4KB of 0xAA)
///       Game (USA).zip     (large.bin zipped)        <- duplicate once unwrapped
///     media/
///       shared.sfc         (SHARED)                  <- excluded folder, never scanned
///     notes.txt                                      <- not a ROM extension
fn create_test_tree(root: &Path) {
    let folder_a = root.join("folder_a");
    let folder_b = root.join("folder_b");
    let folder_c = root.join("folder_c");
    let media = root.join("media");
    for dir in [&folder_a, &folder_b, &folder_c, &media] {
        fs::create_dir_all(dir).unwrap();
    }

    fs::write(folder_a.join("unique_a.sfc"), "unique content a").unwrap();
    fs::write(folder_b.join("unique_b.sfc"), "unique content b").unwrap();
    fs::write(folder_a.join("shared.sfc"), SHARED).unwrap();
    fs::write(folder_b.join("shared.sfc"), SHARED).unwrap();
    fs::write(media.join("shared.sfc"), SHARED).unwrap();
    fs::write(root.join("notes.txt"), SHARED).unwrap();

    fs::write(folder_c.join("large.bin"), large_content()).unwrap();
    let file = fs::File::create(folder_c.join("Game (USA).zip")).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    zip.start_file("Game (USA).bin", options).unwrap();
    zip.write_all(&large_content()).unwrap();
    zip.finish().unwrap();
}

fn test_config(cache_dir: &Path) -> AppConfig {
    AppConfig {
        cache_path: cache_dir.join("hash_cache.json"),
        ..AppConfig::default()
    }
}

fn paths_of(group: &rom_librarian_core::DuplicateGroup) -> Vec<PathBuf> {
    group.members.iter().map(|m| m.record.path.clone()).collect()
}

#[test]
fn test_full_scan_pipeline() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    // record paths come back resolved through the canonical root
    let root = fs::canonicalize(&root).unwrap();

    let mut engine = ScanEngine::new(test_config(tmp.path()));
    let request = ScanRequest::new(ScanScope::Recursive(root.clone()), Strategy::Largest);
    let result = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.status, OperationStatus::Completed);
    assert_eq!(result.files_scanned, 6, "media/ and notes.txt must be filtered out");
    assert!(result.errors.is_empty());
    assert_eq!(result.groups.len(), 2);

    // groups follow first appearance in path order
    assert_eq!(
        paths_of(&result.groups[0]),
        vec![
            root.join("folder_a").join("shared.sfc"),
            root.join("folder_b").join("shared.sfc")
        ]
    );
    assert_eq!(result.groups[0].identity, hash_bytes(SHARED));
    assert_eq!(result.groups[1].identity, hash_bytes(&large_content()));
    assert_eq!(result.groups[1].len(), 2);

    // equal sizes: lexicographically smaller path wins
    assert_eq!(
        result.groups[0].keeper().unwrap().path,
        root.join("folder_a").join("shared.sfc")
    );
    for group in &result.groups {
        assert_eq!(group.members.iter().filter(|m| m.keep).count(), 1);
    }
    // on-disk sizes are compared, and the deflated zip is far smaller than the raw image
    assert_eq!(
        result.groups[1].keeper().unwrap().path,
        root.join("folder_c").join("large.bin")
    );
}

#[test]
fn test_second_scan_served_from_persisted_cache() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let request = ScanRequest::new(ScanScope::Recursive(root.clone()), Strategy::Manual);

    let mut first = ScanEngine::new(test_config(tmp.path()));
    let result = first
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();
    assert_eq!(result.files_hashed, 6);
    assert_eq!(result.cache_hits, 0);
    assert!(result.cache_warning.is_none());
    drop(first);

    let mut second = ScanEngine::new(test_config(tmp.path()));
    assert_eq!(second.cache().len(), 6);
    let again = second
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();
    assert_eq!(again.files_hashed, 0);
    assert_eq!(again.cache_hits, 6);
    assert_eq!(again.groups, result.groups);
    assert_eq!(again.groups_requiring_input(), 2);
}

#[test]
fn test_scan_scopes() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let mut engine = ScanEngine::new(test_config(tmp.path()));
    let cancel = CancelToken::new();

    let folder_only =
        ScanRequest::new(ScanScope::FolderOnly(root.join("folder_a")), Strategy::Manual);
    let result = engine
        .scan_for_duplicates(&folder_only, &SilentReporter, &cancel)
        .unwrap();
    assert_eq!(result.files_scanned, 2);
    assert!(result.groups.is_empty());

    let top_level = ScanRequest::new(ScanScope::FolderOnly(root.clone()), Strategy::Manual);
    let result = engine
        .scan_for_duplicates(&top_level, &SilentReporter, &cancel)
        .unwrap();
    assert_eq!(result.files_scanned, 0, "folder-only scope must not descend");

    // nested roots are collapsed so nothing is counted twice
    let library = ScanRequest::new(
        ScanScope::Library(vec![root.join("folder_a"), root.clone()]),
        Strategy::Manual,
    );
    let result = engine
        .scan_for_duplicates(&library, &SilentReporter, &cancel)
        .unwrap();
    assert_eq!(result.files_scanned, 6);
    assert_eq!(result.groups.len(), 2);
}

#[test]
fn test_scan_with_ignore_patterns() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_ignore");
    create_test_tree(&root);

    let config = AppConfig {
        ignore_patterns: vec!["*/folder_c/*".to_string()],
        ..test_config(tmp.path())
    };
    let mut engine = ScanEngine::new(config);
    let request = ScanRequest::new(ScanScope::Recursive(root), Strategy::Manual);
    let result = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.groups.len(), 1, "only shared.sfc remains with folder_c ignored");
}

#[test]
fn test_missing_root_is_operation_error() {
    let tmp = tempdir().unwrap();
    let mut engine = ScanEngine::new(test_config(tmp.path()));
    let request = ScanRequest::new(
        ScanScope::Recursive(tmp.path().join("does_not_exist")),
        Strategy::Manual,
    );
    let err = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, Error::RootUnavailable { .. }));
}

#[test]
fn test_unreadable_file_reported_not_fatal() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("roms");
    fs::create_dir_all(&dir).unwrap();
    let mut records = Vec::new();
    for name in ["a.sfc", "b.sfc", "vanishing.sfc"] {
        let path = dir.join(name);
        fs::write(&path, SHARED).unwrap();
        records.push(FileRecord::from_path(&path).unwrap());
    }
    fs::remove_file(dir.join("vanishing.sfc")).unwrap();

    let mut engine = ScanEngine::with_cache(test_config(tmp.path()), IdentityCache::in_memory());
    let result = engine.scan_records(
        &records,
        Strategy::Oldest,
        &Default::default(),
        &SilentReporter,
        &CancelToken::new(),
    );

    assert_eq!(result.status, OperationStatus::Completed);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].path, dir.join("vanishing.sfc"));
}

struct CancelAfter {
    token: CancelToken,
    after: usize,
}

impl ProgressReporter for CancelAfter {
    fn on_hash_progress(&self, current: usize, _total: usize, _file_name: &str) {
        if current >= self.after {
            self.token.cancel();
        }
    }
}

#[test]
fn test_scan_cancellation_keeps_completed_identities() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_cancel");
    fs::create_dir_all(&root).unwrap();
    for i in 0..10 {
        // pairs of duplicates, so a completed scan would produce groups
        fs::write(root.join(format!("game_{:02}.sfc", i)), format!("rom {}", i / 2)).unwrap();
    }

    let config = AppConfig {
        hash_threads: 1,
        ..test_config(tmp.path())
    };
    let cache_path = config.cache_path.clone();
    let mut engine = ScanEngine::new(config);
    let cancel = CancelToken::new();
    let reporter = CancelAfter {
        token: cancel.clone(),
        after: 3,
    };

    let request = ScanRequest::new(ScanScope::Recursive(root), Strategy::Largest);
    let result = engine.scan_for_duplicates(&request, &reporter, &cancel).unwrap();

    assert_eq!(result.status, OperationStatus::Cancelled);
    assert!(result.is_cancelled());
    assert!(result.groups.is_empty());
    assert_eq!(result.files_hashed, 3);
    assert_eq!(engine.cache().len(), 3);

    // the completed identities were flushed
    assert_eq!(IdentityCache::load_all(&cache_path).len(), 3);
}

#[test]
fn test_spawned_worker_reports_progress_and_returns_engine() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);

    let engine = ScanEngine::new(test_config(tmp.path()));
    let request = ScanRequest::new(ScanScope::Recursive(root), Strategy::RegionPreference);
    let handle = spawn_duplicate_scan(engine, request).unwrap();
    let (engine, result) = handle.join().unwrap();
    let result = result.unwrap();

    assert_eq!(result.groups.len(), 2);
    assert_eq!(engine.cache().len(), 6);
}

#[test]
fn test_worker_events_arrive_in_order() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);

    let engine = ScanEngine::new(test_config(tmp.path()));
    let request = ScanRequest::new(ScanScope::Recursive(root), Strategy::Manual);
    let handle = spawn_duplicate_scan(engine, request).unwrap();
    let events: Vec<ProgressEvent> = handle.events().iter().collect();
    let (_, result) = handle.join().unwrap();
    assert!(result.is_ok());

    assert_eq!(events.first(), Some(&ProgressEvent::EnumerateStarted));
    assert!(events.contains(&ProgressEvent::Enumerated { total_files: 6 }));
    assert_eq!(
        events.iter().filter(|e| matches!(e, ProgressEvent::Hashed { .. })).count(),
        6
    );
    assert_eq!(events.last(), Some(&ProgressEvent::Grouped { groups: 2 }));
}

#[test]
fn test_reference_index_names_groups() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);

    let shared = hash_bytes(SHARED);
    let index = ReferenceIndex::build(vec![ReferenceEntry {
        crc32: shared.crc32,
        md5: Some(shared.md5),
        sha1: None,
        name: "Shared Game (USA)".to_string(),
    }]);
    let mut engine = ScanEngine::new(test_config(tmp.path())).with_reference_index(index);
    let request = ScanRequest::new(ScanScope::Recursive(root.clone()), Strategy::Manual);
    let result = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.groups[0].canonical_name.as_deref(), Some("Shared Game (USA)"));
    assert_eq!(result.groups[1].canonical_name, None);

    let report = engine
        .match_reference(
            &ScanScope::FolderOnly(root.join("folder_a")),
            &SilentReporter,
            &CancelToken::new(),
        )
        .unwrap();
    assert_eq!(report.matched.len(), 1);
    assert_eq!(report.matched[0].proposed_file_name, "Shared Game (USA).sfc");
    assert_eq!(report.unmatched.len(), 1);
}

#[test]
fn test_confirmed_deletion_leaves_only_keepers() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_delete");
    create_test_tree(&root);

    let mut engine = ScanEngine::new(test_config(tmp.path()));
    let request = ScanRequest::new(ScanScope::Recursive(root.clone()), Strategy::Smallest);
    let result = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();

    let outcome = execute_deletions(&result.groups, |plan| plan.len() == 2);
    assert!(outcome.confirmed);
    assert_eq!(outcome.deleted.len(), 2);
    assert!(outcome.errors.is_empty());

    for group in &result.groups {
        assert!(group.keeper().unwrap().path.exists());
    }
    assert!(root.join("folder_a").join("shared.sfc").exists());
    assert!(!root.join("folder_b").join("shared.sfc").exists());
    // rescanning finds nothing left to dedupe
    let rescan = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();
    assert!(rescan.groups.is_empty());
}

#[test]
fn test_cache_persist_failure_is_a_warning() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();

    let config = AppConfig {
        cache_path: blocker.join("cache.json"),
        ..AppConfig::default()
    };
    let mut engine = ScanEngine::new(config);
    let request = ScanRequest::new(ScanScope::Recursive(root), Strategy::Manual);
    let result = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.groups.len(), 2);
    assert!(result.cache_warning.is_some());
    assert!(matches!(engine.flush_cache(), Err(Error::CachePersist { .. })));
}

#[cfg(unix)]
#[test]
fn test_symlinked_root_never_pairs_a_file_with_itself() {
    let tmp = tempdir().unwrap();
    let real = tmp.path().join("real");
    fs::create_dir_all(&real).unwrap();
    let rom = real.join("Only Copy (USA).sfc");
    fs::write(&rom, SHARED).unwrap();
    let alias = tmp.path().join("alias");
    std::os::unix::fs::symlink(&real, &alias).unwrap();

    let mut engine = ScanEngine::new(test_config(tmp.path()));
    let request = ScanRequest::new(ScanScope::Library(vec![real, alias]), Strategy::Largest);
    let result = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.files_scanned, 1);
    assert!(result.groups.is_empty());

    let outcome = execute_deletions(&result.groups, |_| true);
    assert!(outcome.deleted.is_empty());
    assert!(rom.exists());
}

#[test]
fn test_relative_root_next_to_absolute_form_is_scanned_once() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("scan_root");
    create_test_tree(&root);
    let absolute = fs::canonicalize(&root).unwrap();
    let cwd = fs::canonicalize(std::env::current_dir().unwrap()).unwrap();

    // spell the same root relative to the working directory
    let shared = absolute
        .components()
        .zip(cwd.components())
        .take_while(|(a, b)| a == b)
        .count();
    let mut relative = PathBuf::new();
    for _ in shared..cwd.components().count() {
        relative.push("..");
    }
    for component in absolute.components().skip(shared) {
        relative.push(component.as_os_str());
    }

    let mut engine = ScanEngine::new(test_config(tmp.path()));
    let request = ScanRequest::new(
        ScanScope::Library(vec![relative, absolute.clone()]),
        Strategy::Largest,
    );
    let result = engine
        .scan_for_duplicates(&request, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.files_scanned, 6);
    assert_eq!(result.groups.len(), 2);
    for group in &result.groups {
        for path in paths_of(group) {
            assert!(path.starts_with(&absolute));
        }
    }
}
