use ahash::AHashMap;
use tracing::{debug, warn};

use crate::cache::{IdentityCache, Probe};
use crate::error::{Error, FileError};
use crate::hasher::{ContentIdentity, IdentityHasher};
use crate::model::FileRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub record: FileRecord,
    pub keep: bool,
}

/// Two or more files with exactly the same (CRC32, MD5, SHA1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub identity: ContentIdentity,
    pub members: Vec<GroupMember>,
    /// Name from the reference index, when one was supplied and matched.
    pub canonical_name: Option<String>,
}

impl DuplicateGroup {
    pub fn new(identity: ContentIdentity, records: Vec<FileRecord>) -> Self {
        Self {
            identity,
            members: records
                .into_iter()
                .map(|record| GroupMember { record, keep: false })
                .collect(),
            canonical_name: None,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn keep_index(&self) -> Option<usize> {
        self.members.iter().position(|m| m.keep)
    }

    pub fn keeper(&self) -> Option<&FileRecord> {
        self.members.iter().find(|m| m.keep).map(|m| &m.record)
    }

    /// Marks `index` as the only keeper. Returns false if out of range.
    pub fn set_keep(&mut self, index: usize) -> bool {
        if index >= self.members.len() {
            return false;
        }
        for (i, member) in self.members.iter_mut().enumerate() {
            member.keep = i == index;
        }
        true
    }

    pub fn clear_keep(&mut self) {
        for member in &mut self.members {
            member.keep = false;
        }
    }

    /// No keeper chosen yet; the caller has to ask the user.
    pub fn requires_input(&self) -> bool {
        self.keep_index().is_none()
    }

    /// Members to delete. Empty until a keeper exists.
    pub fn deletion_candidates(&self) -> Vec<&FileRecord> {
        if self.requires_input() {
            return Vec::new();
        }
        self.members
            .iter()
            .filter(|m| !m.keep)
            .map(|m| &m.record)
            .collect()
    }

    pub fn file_size(&self) -> u64 {
        self.members.first().map(|m| m.record.size).unwrap_or(0)
    }

    pub fn wasted_bytes(&self) -> u64 {
        let copies = self.members.len().saturating_sub(1) as u64;
        self.members
            .iter()
            .map(|m| m.record.size)
            .max()
            .unwrap_or(0)
            .saturating_mul(copies)
    }
}

/// Resolves a record to its content identity.
pub trait IdentityProvider {
    fn identify(&mut self, record: &FileRecord) -> Result<ContentIdentity, Error>;
}

impl<F> IdentityProvider for F
where
    F: FnMut(&FileRecord) -> Result<ContentIdentity, Error>,
{
    fn identify(&mut self, record: &FileRecord) -> Result<ContentIdentity, Error> {
        self(record)
    }
}

/// Cache first, compute on miss, store the result against the pre-hash stamp.
pub struct CachedProvider<'a> {
    cache: &'a mut IdentityCache,
    hasher: &'a IdentityHasher,
}

impl<'a> CachedProvider<'a> {
    pub fn new(cache: &'a mut IdentityCache, hasher: &'a IdentityHasher) -> Self {
        Self { cache, hasher }
    }
}

impl IdentityProvider for CachedProvider<'_> {
    fn identify(&mut self, record: &FileRecord) -> Result<ContentIdentity, Error> {
        let probe = Probe::of(&record.path)?;
        if let Some(identity) = self.cache.lookup_probe(&probe) {
            return Ok(identity);
        }
        let identity = self.hasher.compute_record(record)?;
        self.cache.insert(probe, identity);
        Ok(identity)
    }
}

#[derive(Debug, Default)]
pub struct GroupingOutcome {
    pub groups: Vec<DuplicateGroup>,
    pub errors: Vec<FileError>,
}

/// Resolves every record through `provider` and partitions by identity.
///
/// Unreadable files are left out of grouping and reported in `errors`.
pub fn group_by_identity<P: IdentityProvider + ?Sized>(
    records: &[FileRecord],
    provider: &mut P,
) -> GroupingOutcome {
    let mut identified = Vec::with_capacity(records.len());
    let mut errors = Vec::new();

    for record in records {
        match provider.identify(record) {
            Ok(identity) => identified.push((record.clone(), identity)),
            Err(e) => {
                warn!("Excluding {} from grouping: {}", record.path.display(), e);
                errors.push(FileError::from_error(&record.path, &e));
            }
        }
    }

    GroupingOutcome {
        groups: partition(identified),
        errors,
    }
}

/// Buckets by the full identity triple and drops singletons.
///
/// Groups come out in order of each identity's first appearance; members keep
/// input order. Same input order, same output.
pub fn partition(identified: Vec<(FileRecord, ContentIdentity)>) -> Vec<DuplicateGroup> {
    let mut bucket_of: AHashMap<ContentIdentity, usize> = AHashMap::new();
    let mut buckets: Vec<(ContentIdentity, Vec<FileRecord>)> = Vec::new();

    for (record, identity) in identified {
        match bucket_of.get(&identity) {
            Some(&i) => buckets[i].1.push(record),
            None => {
                bucket_of.insert(identity, buckets.len());
                buckets.push((identity, vec![record]));
            }
        }
    }

    let groups: Vec<DuplicateGroup> = buckets
        .into_iter()
        .filter(|(_, records)| records.len() > 1)
        .map(|(identity, records)| DuplicateGroup::new(identity, records))
        .collect();

    debug!("{} duplicate groups", groups.len());
    groups
}
