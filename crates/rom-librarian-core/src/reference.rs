use ahash::AHashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::FileError;
use crate::hasher::ContentIdentity;
use crate::model::FileRecord;

/// One known dump from a reference database. CRC32 is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub crc32: u32,
    pub md5: Option<[u8; 16]>,
    pub sha1: Option<[u8; 20]>,
    pub name: String,
}

impl ReferenceEntry {
    /// Builds an entry from DAT-style lowercase or uppercase hex strings.
    pub fn from_hex(
        name: &str,
        crc32: &str,
        md5: Option<&str>,
        sha1: Option<&str>,
    ) -> Result<Self, String> {
        let crc32 =
            u32::from_str_radix(crc32.trim(), 16).map_err(|e| format!("crc32 '{}': {}", crc32, e))?;

        let md5 = match md5.map(str::trim).filter(|s| !s.is_empty()) {
            Some(hex_str) => {
                let mut out = [0u8; 16];
                hex::decode_to_slice(hex_str, &mut out).map_err(|e| format!("md5 '{}': {}", hex_str, e))?;
                Some(out)
            }
            None => None,
        };
        let sha1 = match sha1.map(str::trim).filter(|s| !s.is_empty()) {
            Some(hex_str) => {
                let mut out = [0u8; 20];
                hex::decode_to_slice(hex_str, &mut out)
                    .map_err(|e| format!("sha1 '{}': {}", hex_str, e))?;
                Some(out)
            }
            None => None,
        };

        Ok(Self {
            crc32,
            md5,
            sha1,
            name: name.to_string(),
        })
    }

    /// No recorded checksum contradicts `identity`.
    fn agrees_with(&self, identity: &ContentIdentity) -> bool {
        self.crc32 == identity.crc32
            && self.md5.map_or(true, |md5| md5 == identity.md5)
            && self.sha1.map_or(true, |sha1| sha1 == identity.sha1)
    }
}

/// Read-only reverse index: checksum -> canonical name.
///
/// Several entries may share a name (regional variants). Lookups go through the
/// strongest checksum available: SHA1, then MD5, then CRC32.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    entries: Vec<ReferenceEntry>,
    by_sha1: AHashMap<[u8; 20], usize>,
    by_md5: AHashMap<[u8; 16], usize>,
    by_crc32: AHashMap<u32, Vec<usize>>,
}

impl ReferenceIndex {
    pub fn build(entries: impl IntoIterator<Item = ReferenceEntry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            let i = index.entries.len();
            if let Some(sha1) = entry.sha1 {
                index.by_sha1.entry(sha1).or_insert(i);
            }
            if let Some(md5) = entry.md5 {
                index.by_md5.entry(md5).or_insert(i);
            }
            index.by_crc32.entry(entry.crc32).or_default().push(i);
            index.entries.push(entry);
        }
        info!("Reference index built with {} entries", index.entries.len());
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, identity: &ContentIdentity) -> Option<&str> {
        let by_strong = self
            .by_sha1
            .get(&identity.sha1)
            .or_else(|| self.by_md5.get(&identity.md5))
            .map(|&i| &self.entries[i])
            .filter(|entry| entry.agrees_with(identity));
        if let Some(entry) = by_strong {
            return Some(entry.name.as_str());
        }

        // CRC32 alone only counts when no stronger recorded checksum disagrees.
        self.by_crc32
            .get(&identity.crc32)?
            .iter()
            .map(|&i| &self.entries[i])
            .find(|entry| entry.agrees_with(identity))
            .map(|entry| entry.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch {
    pub record: FileRecord,
    pub identity: ContentIdentity,
    pub canonical_name: String,
    /// Canonical name plus the record's original extension.
    pub proposed_file_name: String,
    pub already_named: bool,
}

#[derive(Debug, Default)]
pub struct NameMatchReport {
    pub matched: Vec<NameMatch>,
    pub unmatched: Vec<FileRecord>,
    pub errors: Vec<FileError>,
}

impl NameMatchReport {
    pub fn renames_needed(&self) -> usize {
        self.matched.iter().filter(|m| !m.already_named).count()
    }
}

/// Proposes canonical file names for identified records.
pub fn match_records(
    identified: &[(FileRecord, ContentIdentity)],
    index: &ReferenceIndex,
) -> NameMatchReport {
    let mut report = NameMatchReport::default();

    for (record, identity) in identified {
        match index.lookup(identity) {
            Some(name) => {
                let proposed_file_name = proposed_name(&record.path, name);
                let already_named = record.file_name() == proposed_file_name;
                report.matched.push(NameMatch {
                    record: record.clone(),
                    identity: *identity,
                    canonical_name: name.to_string(),
                    proposed_file_name,
                    already_named,
                });
            }
            None => report.unmatched.push(record.clone()),
        }
    }

    debug!(
        "{} matched, {} unmatched against reference index",
        report.matched.len(),
        report.unmatched.len()
    );
    report
}

fn proposed_name(path: &Path, canonical: &str) -> String {
    match path.extension() {
        Some(ext) => format!("{}.{}", canonical, ext.to_string_lossy()),
        None => canonical.to_string(),
    }
}
