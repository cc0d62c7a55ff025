use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::cache::FileStamp;
use crate::error::{FileError, FileErrorKind};
use crate::grouping::DuplicateGroup;

/// One non-keep member queued for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeletion {
    pub path: PathBuf,
    pub size: u64,
    pub keeper: PathBuf,
    stamp: FileStamp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    pub entries: Vec<PlannedDeletion>,
    /// Groups still waiting for the user to pick a keeper.
    pub undecided_groups: usize,
}

impl DeletionPlan {
    /// Non-keep members of every group that has exactly one keeper.
    pub fn from_groups(groups: &[DuplicateGroup]) -> Self {
        let mut plan = DeletionPlan::default();
        for group in groups {
            let Some(keeper) = group.keeper() else {
                plan.undecided_groups += 1;
                continue;
            };
            for record in group.deletion_candidates() {
                plan.entries.push(PlannedDeletion {
                    path: record.path.clone(),
                    size: record.size,
                    keeper: keeper.path.clone(),
                    stamp: FileStamp::new(record.size, record.modified),
                });
            }
        }
        plan
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

#[derive(Debug, Default)]
pub struct DeletionOutcome {
    pub confirmed: bool,
    pub deleted: Vec<PathBuf>,
    /// Already gone before we got to them.
    pub missing: Vec<PathBuf>,
    pub errors: Vec<FileError>,
    pub undecided_groups: usize,
}

/// Deletes every non-keep member once `confirm` approves the plan.
///
/// Nothing is touched without approval, in groups lacking a keeper, or when
/// the keeper itself has vanished. A candidate whose size or mtime changed
/// since the scan is left alone and reported.
pub fn execute_deletions<F>(groups: &[DuplicateGroup], confirm: F) -> DeletionOutcome
where
    F: FnOnce(&DeletionPlan) -> bool,
{
    let plan = DeletionPlan::from_groups(groups);
    let mut outcome = DeletionOutcome {
        undecided_groups: plan.undecided_groups,
        ..DeletionOutcome::default()
    };

    if plan.is_empty() {
        debug!("Nothing to delete");
        return outcome;
    }
    if !confirm(&plan) {
        info!("Deletion of {} files declined", plan.len());
        return outcome;
    }
    outcome.confirmed = true;

    for entry in &plan.entries {
        if !entry.keeper.exists() {
            warn!(
                "Keeper {} no longer exists, not deleting {}",
                entry.keeper.display(),
                entry.path.display()
            );
            outcome.errors.push(FileError::new(
                &entry.path,
                FileErrorKind::Delete,
                format!("keeper {} is missing", entry.keeper.display()),
            ));
            continue;
        }

        if is_same_file(&entry.path, &entry.keeper) {
            warn!(
                "{} resolves to its keeper {}, not deleting",
                entry.path.display(),
                entry.keeper.display()
            );
            outcome.errors.push(FileError::new(
                &entry.path,
                FileErrorKind::Delete,
                format!("same file as keeper {}", entry.keeper.display()),
            ));
            continue;
        }

        let current = match fs::metadata(&entry.path) {
            Ok(metadata) => FileStamp::from_metadata(&metadata).ok(),
            Err(_) => {
                warn!("File '{}' no longer exists, skipping", entry.path.display());
                outcome.missing.push(entry.path.clone());
                continue;
            }
        };
        if current != Some(entry.stamp) {
            warn!("File '{}' changed since the scan, skipping", entry.path.display());
            outcome.errors.push(FileError::new(
                &entry.path,
                FileErrorKind::Delete,
                "file changed since the scan",
            ));
            continue;
        }

        match fs::remove_file(&entry.path) {
            Ok(()) => {
                debug!("deleted: {}", entry.path.display());
                outcome.deleted.push(entry.path.clone());
            }
            Err(e) => {
                error!("Failed to remove '{}': {}", entry.path.display(), e);
                outcome
                    .errors
                    .push(FileError::new(&entry.path, FileErrorKind::Delete, e.to_string()));
            }
        }
    }

    info!(
        "Deletion executed: {} succeeded, {} failed, {} already missing",
        outcome.deleted.len(),
        outcome.errors.len(),
        outcome.missing.len()
    );
    outcome
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
