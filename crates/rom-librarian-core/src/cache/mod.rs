mod store;

use ahash::AHashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, trace, warn};

pub use store::CACHE_FORMAT_VERSION;

use crate::error::Error;
use crate::hasher::ContentIdentity;

/// Size and modification time a cached identity was computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub size: u64,
    pub modified_secs: i64,
    pub modified_nanos: u32,
}

impl FileStamp {
    pub fn new(size: u64, modified: SystemTime) -> Self {
        // sub-second precision so a rewrite within the same second still misses
        let (modified_secs, modified_nanos) = match modified.duration_since(UNIX_EPOCH) {
            Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
            // floor to whole seconds so nanos always counts forward
            Err(e) => {
                let before = e.duration();
                match before.subsec_nanos() {
                    0 => (-(before.as_secs() as i64), 0),
                    nanos => (-(before.as_secs() as i64) - 1, 1_000_000_000 - nanos),
                }
            }
        };
        Self {
            size,
            modified_secs,
            modified_nanos,
        }
    }

    pub fn from_metadata(metadata: &fs::Metadata) -> io::Result<Self> {
        Ok(Self::new(metadata.len(), metadata.modified()?))
    }
}

/// Cache key and current on-disk stamp of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub key: String,
    pub stamp: FileStamp,
}

impl Probe {
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            key: cache_key(path)?,
            stamp: FileStamp::from_metadata(&metadata)?,
        })
    }
}

/// Normalized absolute path used as the store key.
pub fn cache_key(path: &Path) -> io::Result<String> {
    Ok(fs::canonicalize(path)?.to_string_lossy().into_owned())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub stamp: FileStamp,
    pub identity: ContentIdentity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Persistent identity store keyed by (path, size, mtime).
///
/// Advisory only: every lookup re-reads the file's current stamp and treats a
/// mismatch as a miss. Owned by one scan at a time; writes are not shared.
#[derive(Debug, Default)]
pub struct IdentityCache {
    path: Option<PathBuf>,
    entries: AHashMap<String, CacheEntry>,
    dirty: bool,
    stats: CacheStats,
}

impl IdentityCache {
    /// A cache that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads `path`, degrading to an empty cache if it is missing or unreadable.
    pub fn load_all(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("{}; starting with an empty hash cache", e);
                Self::empty_at(path)
            }
        }
    }

    /// Like [`load_all`](Self::load_all) but reports corruption to the caller.
    /// A missing store is not corruption.
    pub fn try_load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            debug!("No hash cache at {}, starting fresh", path.display());
            return Ok(Self::empty_at(path));
        }

        let entries: AHashMap<String, CacheEntry> = store::read_entries(path)?.into_iter().collect();
        info!(
            "Loaded hash cache with {} entries from {}",
            entries.len(),
            path.display()
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            entries,
            dirty: false,
            stats: CacheStats::default(),
        })
    }

    fn empty_at(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Cached identity if the file on disk still matches the stored stamp.
    pub fn lookup(&mut self, path: &Path) -> Option<ContentIdentity> {
        match Probe::of(path) {
            Ok(probe) => self.lookup_probe(&probe),
            Err(e) => {
                trace!("Cannot probe {} for cache lookup: {}", path.display(), e);
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn lookup_probe(&mut self, probe: &Probe) -> Option<ContentIdentity> {
        match self.entries.get(&probe.key) {
            Some(entry) if entry.stamp == probe.stamp => {
                self.stats.hits += 1;
                Some(entry.identity)
            }
            Some(_) => {
                trace!("Stale cache entry for {}", probe.key);
                self.stats.misses += 1;
                None
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Upserts the identity for `path` against its current stamp.
    pub fn store(&mut self, path: &Path, identity: ContentIdentity) -> io::Result<()> {
        let probe = Probe::of(path)?;
        self.insert(probe, identity);
        Ok(())
    }

    /// Upserts using a stamp captured before hashing started.
    pub fn insert(&mut self, probe: Probe, identity: ContentIdentity) {
        self.entries.insert(
            probe.key,
            CacheEntry {
                stamp: probe.stamp,
                identity,
            },
        );
        self.dirty = true;
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = CacheStats::default();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
        info!("Hash cache cleared");
    }

    /// Drops entries whose file no longer exists. Returns how many were removed.
    pub fn prune_missing(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| Path::new(key).exists());
        let removed = before - self.entries.len();
        if removed > 0 {
            self.dirty = true;
        }
        debug!("Pruned {} cache entries for missing files", removed);
        removed
    }

    /// Durably writes every entry. In-memory entries survive a failed flush and
    /// the next flush rewrites them all.
    pub fn flush(&mut self) -> Result<(), Error> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        if !self.dirty {
            trace!("Hash cache unchanged, skipping flush");
            return Ok(());
        }

        store::write_entries(&path, self.entries.iter())?;
        self.dirty = false;
        debug!(
            "Saved hash cache with {} entries to {}",
            self.entries.len(),
            path.display()
        );
        Ok(())
    }
}
