use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

use rom_librarian_core::cache::IdentityCache;
use rom_librarian_core::{
    AppConfig, CancelToken, CompareMode, CompareOptions, Error, NameNormalization,
    OperationStatus, ScanEngine, SilentReporter,
};

fn engine() -> ScanEngine {
    ScanEngine::with_cache(AppConfig::default(), IdentityCache::in_memory())
}

fn write_all(dir: &Path, files: &[(&str, &[u8])]) {
    fs::create_dir_all(dir).unwrap();
    for (name, data) in files {
        fs::write(dir.join(name), data).unwrap();
    }
}

fn names(records: &[rom_librarian_core::FileRecord]) -> Vec<String> {
    records.iter().map(|r| r.file_name()).collect()
}

#[test]
fn test_quick_compare_by_name() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    write_all(&a, &[("a.zip", b"1"), ("b.zip", b"2")]);
    write_all(&b, &[("a.zip", b"different bytes"), ("c.zip", b"3")]);

    let options = CompareOptions::default();
    let result = engine()
        .compare_collections(&a, &b, &options, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.status, OperationStatus::Completed);
    assert_eq!(names(&result.only_in_a), vec!["b.zip"]);
    assert_eq!(names(&result.only_in_b), vec!["c.zip"]);
    assert_eq!(result.in_both.len(), 1);
    assert_eq!(names(&result.in_both[0].a), vec!["a.zip"]);
    assert_eq!(names(&result.in_both[0].b), vec!["a.zip"]);
    assert!(result.mismatched.is_empty());
}

#[test]
fn test_quick_compare_case_and_extension_options() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    write_all(&a, &[("Game (USA).sfc", b"x")]);
    write_all(&b, &[("game (usa).zip", b"x")]);

    let mut options = CompareOptions::default();
    let loose = engine()
        .compare_collections(&a, &b, &options, &SilentReporter, &CancelToken::new())
        .unwrap();
    assert_eq!(loose.in_both.len(), 1);

    options.normalization = NameNormalization {
        case_insensitive: true,
        ignore_extension: false,
    };
    let strict = engine()
        .compare_collections(&a, &b, &options, &SilentReporter, &CancelToken::new())
        .unwrap();
    assert!(strict.in_both.is_empty());
    assert_eq!(strict.only_in_a.len(), 1);
    assert_eq!(strict.only_in_b.len(), 1);
}

#[test]
fn test_quick_compare_verify_reports_mismatches() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    write_all(&a, &[("same.sfc", b"identical"), ("game.sfc", b"good dump")]);
    write_all(&b, &[("same.sfc", b"identical"), ("game.sfc", b"bad dump!")]);

    let options = CompareOptions {
        verify: true,
        ..CompareOptions::default()
    };
    let result = engine()
        .compare_collections(&a, &b, &options, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.in_both.len(), 1);
    assert_eq!(result.in_both[0].key, "same");
    assert_eq!(result.mismatched.len(), 1);
    assert_eq!(result.mismatched[0].key, "game");
}

#[test]
fn test_deep_compare_by_content() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    write_all(&a, &[("one.sfc", b"content one"), ("two.sfc", b"content two")]);
    write_all(&b, &[("renamed.sfc", b"content one"), ("two.sfc", b"not content two")]);

    let options = CompareOptions {
        mode: CompareMode::Deep,
        ..CompareOptions::default()
    };
    let result = engine()
        .compare_collections(&a, &b, &options, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.in_both.len(), 1);
    assert_eq!(names(&result.in_both[0].a), vec!["one.sfc"]);
    assert_eq!(names(&result.in_both[0].b), vec!["renamed.sfc"]);
    assert_eq!(names(&result.only_in_a), vec!["two.sfc"]);
    assert_eq!(names(&result.only_in_b), vec!["two.sfc"]);
    assert!(result.errors.is_empty());
}

#[test]
fn test_deep_compare_sees_through_single_rom_zip() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    let rom = b"raw cartridge image".repeat(64);
    write_all(&a, &[("Game (Europe).md", rom.as_slice())]);

    fs::create_dir_all(&b).unwrap();
    let mut zip = zip::ZipWriter::new(fs::File::create(b.join("Game (Europe).zip")).unwrap());
    zip.start_file("Game (Europe).md", SimpleFileOptions::default()).unwrap();
    zip.write_all(&rom).unwrap();
    zip.finish().unwrap();

    let options = CompareOptions {
        mode: CompareMode::Deep,
        ..CompareOptions::default()
    };
    let result = engine()
        .compare_collections(&a, &b, &options, &SilentReporter, &CancelToken::new())
        .unwrap();

    assert_eq!(result.in_both.len(), 1);
    assert!(result.only_in_a.is_empty());
    assert!(result.only_in_b.is_empty());
}

#[test]
fn test_deep_compare_cancelled() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a");
    let b = tmp.path().join("b");
    write_all(&a, &[("one.sfc", b"1")]);
    write_all(&b, &[("one.sfc", b"1")]);

    let cancel = CancelToken::new();
    cancel.cancel();
    let options = CompareOptions {
        mode: CompareMode::Deep,
        ..CompareOptions::default()
    };
    let result = engine()
        .compare_collections(&a, &b, &options, &SilentReporter, &cancel)
        .unwrap();

    assert!(result.is_cancelled());
    assert!(result.in_both.is_empty());
}

#[test]
fn test_missing_root_fails_compare() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a");
    write_all(&a, &[("one.sfc", b"1")]);

    let err = engine()
        .compare_collections(
            &a,
            &tmp.path().join("missing"),
            &CompareOptions::default(),
            &SilentReporter,
            &CancelToken::new(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::RootUnavailable { .. }));
}
