use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use super::filter::FileFilter;
use crate::config::non_overlapping_directories;
use crate::error::Error;
use crate::model::FileRecord;

/// Breadth of a scan. The grouping engine never sees this, only the flat record list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanScope {
    FolderOnly(PathBuf),
    Recursive(PathBuf),
    Library(Vec<PathBuf>),
}

impl ScanScope {
    /// Canonical roots to walk. Library roots nested in another root, or
    /// naming the same directory through a symlink or a relative path, collapse
    /// into one so no file is enumerated twice.
    pub fn roots(&self) -> Vec<PathBuf> {
        match self {
            ScanScope::FolderOnly(dir) | ScanScope::Recursive(dir) => vec![canonical_root(dir)],
            ScanScope::Library(roots) => {
                let as_strings = roots
                    .iter()
                    .map(|r| canonical_root(r).to_string_lossy().into_owned())
                    .collect();
                non_overlapping_directories(as_strings)
                    .into_iter()
                    .map(PathBuf::from)
                    .collect()
            }
        }
    }
}

/// Unresolvable roots come back unchanged so `check_root` reports them.
fn canonical_root(dir: &Path) -> PathBuf {
    fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

/// Enumerates scan candidates for `scope`, sorted by path.
///
/// Record paths are absolute and resolved through the canonical root. An
/// unreadable root is an operation-level failure; unreadable entries below
/// it are logged and skipped.
pub fn enumerate(scope: &ScanScope, filter: &FileFilter) -> Result<Vec<FileRecord>, Error> {
    let mut records = Vec::new();

    for root in scope.roots() {
        match scope {
            ScanScope::FolderOnly(_) => list_folder(&root, filter, &mut records)?,
            ScanScope::Recursive(_) | ScanScope::Library(_) => {
                walk_tree(&root, filter, &mut records)?
            }
        }
    }

    records.sort_by(|a, b| a.path.cmp(&b.path));
    records.dedup_by(|a, b| a.path == b.path);
    debug!("Enumerated {} candidate files", records.len());
    Ok(records)
}

fn check_root(dir: &Path) -> Result<(), Error> {
    let metadata = fs::metadata(dir).map_err(|source| Error::RootUnavailable {
        path: dir.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(Error::RootUnavailable {
            path: dir.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        });
    }
    Ok(())
}

fn list_folder(dir: &Path, filter: &FileFilter, out: &mut Vec<FileRecord>) -> Result<(), Error> {
    check_root(dir)?;
    let entries = fs::read_dir(dir).map_err(|source| Error::RootUnavailable {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Error reading entry in directory {}: {}", dir.display(), err);
                continue;
            }
        };
        let path = entry.path();
        push_if_candidate(&path, filter, out);
    }
    Ok(())
}

fn walk_tree(root: &Path, filter: &FileFilter, out: &mut Vec<FileRecord>) -> Result<(), Error> {
    check_root(root)?;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_type().is_dir() || !filter.skips_directory(entry.path())
        });

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                push_if_candidate(entry.path(), filter, out);
            }
            Ok(_) => {}
            Err(err) => {
                error!("Error walking {}: {}", root.display(), err);
            }
        }
    }
    Ok(())
}

fn push_if_candidate(path: &Path, filter: &FileFilter, out: &mut Vec<FileRecord>) {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(err) => {
            warn!("Error getting metadata for {}: {}", path.display(), err);
            return;
        }
    };
    if !metadata.file_type().is_file() || !filter.includes(path) {
        return;
    }
    match FileRecord::from_metadata(path, &metadata) {
        Ok(record) => out.push(record),
        Err(err) => warn!("Error reading timestamps for {}: {}", path.display(), err),
    }
}
