pub mod archive;
pub mod identity;

use ahash::AHashSet;
use std::path::Path;
use tracing::{trace, warn};

pub use archive::{hash_source, resolve_source, HashSource};
pub use identity::{hash_bytes, hash_reader, ContentIdentity, CHUNK_SIZE};

use crate::config::{AppConfig, DEFAULT_ROM_EXTENSIONS};
use crate::error::Error;
use crate::model::FileRecord;

/// Computes content identities, unwrapping single-ROM ZIP containers.
#[derive(Debug, Clone)]
pub struct IdentityHasher {
    rom_extensions: AHashSet<String>,
}

impl Default for IdentityHasher {
    fn default() -> Self {
        Self {
            rom_extensions: DEFAULT_ROM_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl IdentityHasher {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rom_extensions: config
                .rom_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn source_for(&self, path: &Path) -> HashSource {
        match resolve_source(path, &self.rom_extensions) {
            Ok(source) => source,
            Err(e) => {
                warn!("{}; hashing as an opaque file", e);
                HashSource::PlainFile
            }
        }
    }

    /// Fails only with `Error::Io`. Archive problems fall back to the container bytes.
    pub fn compute(&self, path: &Path) -> Result<ContentIdentity, Error> {
        self.compute_from(path, self.source_for(path))
    }

    /// Hashes an enumerated record. Only records flagged as containers are
    /// opened as archives; everything else is read as plain bytes.
    pub fn compute_record(&self, record: &FileRecord) -> Result<ContentIdentity, Error> {
        let source = if record.is_container {
            self.source_for(&record.path)
        } else {
            HashSource::PlainFile
        };
        self.compute_from(&record.path, source)
    }

    fn compute_from(&self, path: &Path, source: HashSource) -> Result<ContentIdentity, Error> {
        match hash_source(path, &source) {
            Err(e @ Error::ArchiveFormat { .. }) => {
                warn!("{}; hashing as an opaque file", e);
                hash_source(path, &HashSource::PlainFile)
            }
            other => {
                if other.is_ok() {
                    trace!("Hashed {} ({:?})", path.display(), source);
                }
                other
            }
        }
    }
}

/// Identity of a single file using the default ROM extension list.
pub fn compute_identity(path: &Path) -> Result<ContentIdentity, Error> {
    IdentityHasher::default().compute(path)
}
