//! On-disk layout of the identity cache.
//!
//! ```json
//! { "version": 1,
//!   "entries": { "/abs/path/Game (USA).sfc":
//!       { "size": 524288, "modified_secs": 1700000000, "modified_nanos": 0,
//!         "crc32": "…", "md5": "…", "sha1": "…" } } }
//! ```
//!
//! Unknown fields are ignored so later versions can add to a record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::warn;

use super::{CacheEntry, FileStamp};
use crate::error::Error;
use crate::hasher::ContentIdentity;

pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    size: u64,
    modified_secs: i64,
    #[serde(default)]
    modified_nanos: u32,
    crc32: String,
    md5: String,
    sha1: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, CacheRecord>,
}

fn default_version() -> u32 {
    CACHE_FORMAT_VERSION
}

pub(super) fn read_entries(path: &Path) -> Result<Vec<(String, CacheEntry)>, Error> {
    let corrupt = |reason: String| Error::CacheCorruption {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| corrupt(e.to_string()))?;
    let document: CacheDocument =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;

    if document.version > CACHE_FORMAT_VERSION {
        warn!(
            "Hash cache {} has newer format version {}, reading known fields only",
            path.display(),
            document.version
        );
    }

    let mut entries = Vec::with_capacity(document.entries.len());
    for (key, record) in document.entries {
        match ContentIdentity::from_hex(&record.crc32, &record.md5, &record.sha1) {
            Ok(identity) => entries.push((
                key,
                CacheEntry {
                    stamp: FileStamp {
                        size: record.size,
                        modified_secs: record.modified_secs,
                        modified_nanos: record.modified_nanos,
                    },
                    identity,
                },
            )),
            Err(reason) => warn!("Dropping malformed cache entry for {}: {}", key, reason),
        }
    }
    Ok(entries)
}

/// Writes the whole store to a sibling temp file, then renames it over `path`.
pub(super) fn write_entries<'a>(
    path: &Path,
    entries: impl Iterator<Item = (&'a String, &'a CacheEntry)>,
) -> Result<(), Error> {
    let persist = |source: io::Error| Error::CachePersist {
        path: path.to_path_buf(),
        source,
    };

    let document = CacheDocument {
        version: CACHE_FORMAT_VERSION,
        entries: entries
            .map(|(key, entry)| {
                (
                    key.clone(),
                    CacheRecord {
                        size: entry.stamp.size,
                        modified_secs: entry.stamp.modified_secs,
                        modified_nanos: entry.stamp.modified_nanos,
                        crc32: entry.identity.crc32_hex(),
                        md5: entry.identity.md5_hex(),
                        sha1: entry.identity.sha1_hex(),
                    },
                )
            })
            .collect(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist)?;
    }

    let tmp = path.with_extension("json.tmp");
    let file = File::create(&tmp).map_err(persist)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &document).map_err(|e| persist(e.into()))?;
    writer.flush().map_err(persist)?;
    let file = writer.into_inner().map_err(|e| persist(e.into_error()))?;
    file.sync_all().map_err(persist)?;
    drop(file);

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(persist(e));
    }
    sync_parent_dir(path).map_err(persist)
}

/// Makes the rename itself durable.
#[cfg(unix)]
pub(super) fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    File::open(parent)?.sync_all()
}

#[cfg(not(unix))]
pub(super) fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
