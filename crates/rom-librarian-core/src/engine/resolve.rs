use rayon::prelude::*;
use rayon::ThreadPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::cache::{IdentityCache, Probe};
use crate::error::{Error, FileError};
use crate::hasher::{ContentIdentity, IdentityHasher};
use crate::model::FileRecord;
use crate::progress::{CancelToken, ProgressReporter};

/// Identities aligned with the input records. `None` means the file failed
/// (see `errors`) or was never reached because of cancellation.
pub(crate) struct Resolution {
    pub identities: Vec<Option<ContentIdentity>>,
    pub errors: Vec<FileError>,
    pub hashed: usize,
    pub cache_hits: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

impl Resolution {
    pub fn identified(&self, records: &[FileRecord]) -> Vec<(FileRecord, ContentIdentity)> {
        records
            .iter()
            .zip(&self.identities)
            .filter_map(|(record, identity)| identity.map(|id| (record.clone(), id)))
            .collect()
    }
}

/// Cache hits are served sequentially, misses are hashed on `pool` (or the
/// global rayon pool), and new identities are folded into the cache on the
/// calling thread afterwards. Cancellation is checked before each file.
pub(crate) fn resolve_identities(
    records: &[FileRecord],
    cache: &mut IdentityCache,
    hasher: &IdentityHasher,
    pool: Option<&ThreadPool>,
    reporter: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Resolution {
    let start = Instant::now();
    let total = records.len();
    reporter.on_hash_start(total);

    let mut identities: Vec<Option<ContentIdentity>> = vec![None; total];
    let mut errors = Vec::new();
    let mut pending: Vec<(usize, Probe)> = Vec::new();
    let completed = AtomicUsize::new(0);
    let mut cache_hits = 0;

    for (i, record) in records.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        match Probe::of(&record.path) {
            Ok(probe) => match cache.lookup_probe(&probe) {
                Some(identity) => {
                    identities[i] = Some(identity);
                    cache_hits += 1;
                    let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    reporter.on_hash_progress(current, total, &record.file_name());
                }
                None => pending.push((i, probe)),
            },
            Err(e) => {
                warn!("Cannot stat {}: {}", record.path.display(), e);
                errors.push(FileError::from_error(&record.path, &Error::Io(e)));
            }
        }
    }

    debug!(
        "{} cache hits, {} files to hash",
        cache_hits,
        pending.len()
    );

    let compute = || -> Vec<Option<Result<ContentIdentity, Error>>> {
        pending
            .par_iter()
            .map(|(i, _)| {
                if cancel.is_cancelled() {
                    return None;
                }
                let record = &records[*i];
                let result = hasher.compute_record(record);
                let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
                reporter.on_hash_progress(current, total, &record.file_name());
                Some(result)
            })
            .collect()
    };
    let computed = match pool {
        Some(pool) => pool.install(compute),
        None => compute(),
    };

    let mut hashed = 0;
    for ((i, probe), outcome) in pending.into_iter().zip(computed) {
        let record = &records[i];
        match outcome {
            Some(Ok(identity)) => {
                cache.insert(probe, identity);
                identities[i] = Some(identity);
                hashed += 1;
            }
            Some(Err(e)) => {
                warn!("Excluding {}: {}", record.path.display(), e);
                errors.push(FileError::from_error(&record.path, &e));
            }
            None => {}
        }
    }

    let duration = start.elapsed();
    reporter.on_hash_complete(hashed, cache_hits, duration.as_secs_f64());

    Resolution {
        identities,
        errors,
        hashed,
        cache_hits,
        cancelled: cancel.is_cancelled(),
        duration,
    }
}
