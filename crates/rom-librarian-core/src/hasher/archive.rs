use ahash::AHashSet;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::{debug, trace};
use zip::ZipArchive;

use super::identity::{hash_reader, ContentIdentity};
use crate::config::ARCHIVE_EXTENSIONS;
use crate::error::Error;
use crate::model::lowercase_extension;

/// What byte stream stands for a path's logical content. Resolved once per path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashSource {
    PlainFile,
    SingleMemberArchive { index: usize, member: String },
}

/// Decides whether `path` is a ZIP wrapping exactly one ROM-like member.
///
/// Containers with zero or several ROM-like members resolve to `PlainFile`.
/// A `.zip` that cannot be opened as an archive is an `ArchiveFormat` error.
pub fn resolve_source(path: &Path, rom_extensions: &AHashSet<String>) -> Result<HashSource, Error> {
    if lowercase_extension(path).as_deref() != Some("zip") {
        return Ok(HashSource::PlainFile);
    }

    let file = File::open(path)?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| Error::archive(path, e.to_string()))?;

    let mut candidates = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| Error::archive(path, e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        if is_rom_member(entry.name(), rom_extensions) {
            candidates.push((index, entry.name().to_string()));
        }
    }

    if candidates.len() == 1 {
        let (index, member) = candidates.remove(0);
        trace!("{} wraps single member '{}'", path.display(), member);
        Ok(HashSource::SingleMemberArchive { index, member })
    } else {
        debug!(
            "{} has {} ROM-like members, hashing container bytes",
            path.display(),
            candidates.len()
        );
        Ok(HashSource::PlainFile)
    }
}

fn is_rom_member(name: &str, rom_extensions: &AHashSet<String>) -> bool {
    match lowercase_extension(Path::new(name)) {
        Some(ext) => rom_extensions.contains(&ext) && !ARCHIVE_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Hashes the stream `source` designates.
pub fn hash_source(path: &Path, source: &HashSource) -> Result<ContentIdentity, Error> {
    match source {
        HashSource::PlainFile => {
            let file = File::open(path)?;
            Ok(hash_reader(BufReader::new(file))?)
        }
        HashSource::SingleMemberArchive { index, member } => {
            let file = File::open(path)?;
            let mut archive = ZipArchive::new(BufReader::new(file))
                .map_err(|e| Error::archive(path, e.to_string()))?;
            let entry = archive
                .by_index(*index)
                .map_err(|e| Error::archive(path, e.to_string()))?;
            if entry.name() != member {
                return Err(Error::archive(
                    path,
                    format!("expected member '{}', found '{}'", member, entry.name()),
                ));
            }
            hash_reader(entry).map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
                    Error::archive(path, format!("member '{}': {}", member, e))
                }
                _ => Error::Io(e),
            })
        }
    }
}
