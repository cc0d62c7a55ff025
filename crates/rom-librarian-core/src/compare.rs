//! Set differences between two collections.
//!
//! Quick mode keys files by normalized name, deep mode by full content
//! identity. Both reduce to the same keyed diff; the engine supplies the
//! enumerated records and, for deep mode, their resolved identities.

use ahash::AHashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::FileError;
use crate::hasher::ContentIdentity;
use crate::model::{FileRecord, OperationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMode {
    #[default]
    Quick,
    Deep,
}

/// How file names are folded into quick-compare keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameNormalization {
    pub case_insensitive: bool,
    pub ignore_extension: bool,
}

impl Default for NameNormalization {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            ignore_extension: true,
        }
    }
}

impl NameNormalization {
    pub fn key(&self, path: &Path) -> String {
        let name = if self.ignore_extension {
            path.file_stem()
        } else {
            path.file_name()
        };
        let name = name.map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompareOptions {
    pub mode: CompareMode,
    pub normalization: NameNormalization,
    /// Quick mode only: hash both sides of every name match.
    pub verify: bool,
}

/// Files from both collections that share one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonEntry {
    /// Normalized name in quick mode, identity hex in deep mode.
    pub key: String,
    pub a: Vec<FileRecord>,
    pub b: Vec<FileRecord>,
}

#[derive(Debug, Default)]
pub struct ComparisonResult {
    pub only_in_a: Vec<FileRecord>,
    pub only_in_b: Vec<FileRecord>,
    pub in_both: Vec<CommonEntry>,
    /// Name matches whose contents differ (quick mode with verification).
    pub mismatched: Vec<CommonEntry>,
    pub errors: Vec<FileError>,
    pub status: OperationStatus,
}

impl ComparisonResult {
    pub fn is_cancelled(&self) -> bool {
        self.status == OperationStatus::Cancelled
    }
}

pub fn quick_diff(
    a: &[FileRecord],
    b: &[FileRecord],
    normalization: &NameNormalization,
) -> ComparisonResult {
    let keyed = |records: &[FileRecord]| -> Vec<(String, FileRecord)> {
        records
            .iter()
            .map(|r| (normalization.key(&r.path), r.clone()))
            .collect()
    };
    diff_by_key(keyed(a), keyed(b), |key: &String| key.clone())
}

/// Records without an identity (unreadable) must already be filtered out.
pub fn deep_diff(
    a: Vec<(FileRecord, ContentIdentity)>,
    b: Vec<(FileRecord, ContentIdentity)>,
) -> ComparisonResult {
    let flip = |pairs: Vec<(FileRecord, ContentIdentity)>| -> Vec<(ContentIdentity, FileRecord)> {
        pairs
            .into_iter()
            .map(|(record, identity)| (identity, record))
            .collect()
    };
    diff_by_key(flip(a), flip(b), |identity: &ContentIdentity| identity.to_string())
}

/// Moves name matches whose first files differ in content to `mismatched`.
///
/// Entries where either side has no identity stay in `in_both`; the caller
/// reports those files as errors.
pub fn split_mismatched(
    result: &mut ComparisonResult,
    identities: &AHashMap<PathBuf, ContentIdentity>,
) {
    let entries = std::mem::take(&mut result.in_both);
    for entry in entries {
        let pair = entry
            .a
            .first()
            .zip(entry.b.first())
            .and_then(|(x, y)| Some((identities.get(&x.path)?, identities.get(&y.path)?)));
        match pair {
            Some((x, y)) if x != y => {
                debug!("Content differs for name match '{}'", entry.key);
                result.mismatched.push(entry);
            }
            _ => result.in_both.push(entry),
        }
    }
}

/// Records sharing a key collapse into one entry. Entries come out in order of
/// first appearance in `a`; unmatched records keep their input order.
fn diff_by_key<K, F>(
    a: Vec<(K, FileRecord)>,
    b: Vec<(K, FileRecord)>,
    label: F,
) -> ComparisonResult
where
    K: Hash + Eq,
    F: Fn(&K) -> String,
{
    let mut b_index: AHashMap<&K, Vec<usize>> = AHashMap::new();
    for (i, (key, _)) in b.iter().enumerate() {
        b_index.entry(key).or_default().push(i);
    }

    let mut common_of: AHashMap<&K, usize> = AHashMap::new();
    let mut in_both: Vec<CommonEntry> = Vec::new();
    let mut only_in_a = Vec::new();
    let mut b_matched = vec![false; b.len()];

    for (key, record) in &a {
        if let Some(&slot) = common_of.get(key) {
            in_both[slot].a.push(record.clone());
            continue;
        }
        match b_index.get(key) {
            Some(b_rows) => {
                for &i in b_rows {
                    b_matched[i] = true;
                }
                common_of.insert(key, in_both.len());
                in_both.push(CommonEntry {
                    key: label(key),
                    a: vec![record.clone()],
                    b: b_rows.iter().map(|&i| b[i].1.clone()).collect(),
                });
            }
            None => only_in_a.push(record.clone()),
        }
    }

    let only_in_b: Vec<FileRecord> = b
        .iter()
        .zip(&b_matched)
        .filter(|(_, matched)| !**matched)
        .map(|((_, record), _)| record.clone())
        .collect();

    debug!(
        "Compare: {} only in A, {} only in B, {} in both",
        only_in_a.len(),
        only_in_b.len(),
        in_both.len()
    );

    ComparisonResult {
        only_in_a,
        only_in_b,
        in_both,
        ..ComparisonResult::default()
    }
}
