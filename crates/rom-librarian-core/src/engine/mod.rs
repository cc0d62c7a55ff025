mod resolve;
pub mod worker;

use ahash::AHashMap;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::cache::IdentityCache;
use crate::compare::{self, CompareMode, CompareOptions, ComparisonResult};
use crate::config::AppConfig;
use crate::error::{Error, FileError};
use crate::grouping::{self, DuplicateGroup};
use crate::hasher::{ContentIdentity, IdentityHasher};
use crate::model::{FileRecord, OperationStatus};
use crate::progress::{CancelToken, ProgressReporter};
use crate::reference::{self, NameMatchReport, ReferenceIndex};
use crate::scanner::{self, FileFilter, ScanScope};
use crate::selection::{self, SelectionParams, Strategy};

use resolve::{resolve_identities, Resolution};

pub use worker::{spawn_duplicate_scan, ScanHandle};

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub scope: ScanScope,
    pub strategy: Strategy,
    pub params: SelectionParams,
}

impl ScanRequest {
    pub fn new(scope: ScanScope, strategy: Strategy) -> Self {
        Self {
            scope,
            strategy,
            params: SelectionParams::default(),
        }
    }

    pub fn with_params(mut self, params: SelectionParams) -> Self {
        self.params = params;
        self
    }
}

#[derive(Debug, Default)]
pub struct ScanResult {
    pub groups: Vec<DuplicateGroup>,
    pub errors: Vec<FileError>,
    pub status: OperationStatus,
    pub files_scanned: usize,
    pub files_hashed: usize,
    pub cache_hits: usize,
    pub enumerate_duration: Duration,
    pub hash_duration: Duration,
    pub wasted_bytes: u64,
    /// Set when the cache could not be persisted after the scan.
    pub cache_warning: Option<String>,
}

impl ScanResult {
    pub fn is_cancelled(&self) -> bool {
        self.status == OperationStatus::Cancelled
    }

    pub fn duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    pub fn groups_requiring_input(&self) -> usize {
        self.groups.iter().filter(|g| g.requires_input()).count()
    }
}

/// Owns the identity cache for its lifetime and runs scans, comparisons and
/// single-file identity lookups against it.
pub struct ScanEngine {
    config: AppConfig,
    filter: FileFilter,
    hasher: IdentityHasher,
    cache: IdentityCache,
    reference: Option<ReferenceIndex>,
    pool: Option<ThreadPool>,
}

impl ScanEngine {
    /// Loads the persisted cache from `config.cache_path`. A corrupt store
    /// starts empty.
    pub fn new(config: AppConfig) -> Self {
        let cache = IdentityCache::load_all(&config.cache_path);
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: AppConfig, cache: IdentityCache) -> Self {
        let pool = build_pool(config.hash_threads);
        Self {
            filter: FileFilter::from_config(&config),
            hasher: IdentityHasher::from_config(&config),
            cache,
            reference: None,
            pool,
            config,
        }
    }

    pub fn with_reference_index(mut self, index: ReferenceIndex) -> Self {
        self.reference = Some(index);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut IdentityCache {
        &mut self.cache
    }

    pub fn flush_cache(&mut self) -> Result<(), Error> {
        self.cache.flush()
    }

    /// Cache-aware identity of one file.
    pub fn compute_identity(&mut self, path: &Path) -> Result<ContentIdentity, Error> {
        let record = FileRecord::from_path(path)?;
        let mut provider = grouping::CachedProvider::new(&mut self.cache, &self.hasher);
        grouping::IdentityProvider::identify(&mut provider, &record)
    }

    /// Enumerates `request.scope`, then groups and ranks the records.
    ///
    /// Only an unreadable root is an `Err`; per-file failures land in
    /// `ScanResult::errors`.
    pub fn scan_for_duplicates(
        &mut self,
        request: &ScanRequest,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<ScanResult, Error> {
        info!("Scanning {:?} with strategy '{}'", request.scope, request.strategy);
        reporter.on_enumerate_start();
        let enumerate_start = Instant::now();
        let records = scanner::enumerate(&request.scope, &self.filter)?;
        let enumerate_duration = enumerate_start.elapsed();
        reporter.on_enumerate_complete(records.len(), enumerate_duration.as_secs_f64());
        debug!(
            "Enumerated {} files in {:.2}s",
            records.len(),
            enumerate_duration.as_secs_f64()
        );

        let mut result = self.scan_records(
            &records,
            request.strategy,
            &request.params,
            reporter,
            cancel,
        );
        result.enumerate_duration = enumerate_duration;
        Ok(result)
    }

    /// Groups an already enumerated record list. Records are sorted by path
    /// first so the outcome does not depend on the caller's order.
    pub fn scan_records(
        &mut self,
        records: &[FileRecord],
        strategy: Strategy,
        params: &SelectionParams,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> ScanResult {
        let mut sorted = records.to_vec();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let resolution = self.resolve(&sorted, reporter, cancel);
        let mut result = ScanResult {
            files_scanned: sorted.len(),
            files_hashed: resolution.hashed,
            cache_hits: resolution.cache_hits,
            hash_duration: resolution.duration,
            ..ScanResult::default()
        };

        if resolution.cancelled {
            info!(
                "Scan cancelled after {} of {} files",
                resolution.hashed + resolution.cache_hits,
                sorted.len()
            );
            result.status = OperationStatus::Cancelled;
            result.errors = resolution.errors;
            result.cache_warning = self.flush_after_operation();
            return result;
        }

        let mut groups = grouping::partition(resolution.identified(&sorted));
        for group in &mut groups {
            selection::apply_policy(group, strategy, params);
            if let Some(index) = &self.reference {
                group.canonical_name = index.lookup(&group.identity).map(str::to_string);
            }
        }
        reporter.on_group_complete(groups.len());

        result.wasted_bytes = groups.iter().map(|g| g.wasted_bytes()).sum();
        result.groups = groups;
        result.errors = resolution.errors;
        result.cache_warning = self.flush_after_operation();

        info!(
            "Scan complete: {} files, {} duplicate groups, {} bytes reclaimable, {} errors",
            result.files_scanned,
            result.groups.len(),
            result.wasted_bytes,
            result.errors.len()
        );
        result
    }

    /// Diffs two roots recursively. Quick mode only hashes when verifying.
    pub fn compare_collections(
        &mut self,
        root_a: &Path,
        root_b: &Path,
        options: &CompareOptions,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<ComparisonResult, Error> {
        info!(
            "Comparing {} with {} ({:?})",
            root_a.display(),
            root_b.display(),
            options.mode
        );
        reporter.on_enumerate_start();
        let enumerate_start = Instant::now();
        let a = scanner::enumerate(&ScanScope::Recursive(root_a.to_path_buf()), &self.filter)?;
        let b = scanner::enumerate(&ScanScope::Recursive(root_b.to_path_buf()), &self.filter)?;
        reporter.on_enumerate_complete(a.len() + b.len(), enumerate_start.elapsed().as_secs_f64());

        let mut result = match options.mode {
            CompareMode::Quick => {
                let mut result = compare::quick_diff(&a, &b, &options.normalization);
                if options.verify && !cancel.is_cancelled() {
                    self.verify_name_matches(&mut result, reporter, cancel);
                }
                result
            }
            CompareMode::Deep => {
                let res_a = self.resolve(&a, reporter, cancel);
                let res_b = if res_a.cancelled {
                    None
                } else {
                    Some(self.resolve(&b, reporter, cancel))
                };
                match res_b {
                    Some(res_b) if !res_b.cancelled => {
                        let mut result =
                            compare::deep_diff(res_a.identified(&a), res_b.identified(&b));
                        result.errors = res_a.errors;
                        result.errors.extend(res_b.errors);
                        result
                    }
                    _ => ComparisonResult {
                        status: OperationStatus::Cancelled,
                        ..ComparisonResult::default()
                    },
                }
            }
        };

        if cancel.is_cancelled() {
            result.status = OperationStatus::Cancelled;
        }
        if let Some(warning) = self.flush_after_operation() {
            warn!("{}", warning);
        }
        Ok(result)
    }

    /// Identifies every file under `scope` and proposes canonical names from
    /// the attached reference index.
    pub fn match_reference(
        &mut self,
        scope: &ScanScope,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Result<NameMatchReport, Error> {
        if self.reference.is_none() {
            return Err(Error::Other("no reference index loaded".to_string()));
        }
        reporter.on_enumerate_start();
        let enumerate_start = Instant::now();
        let records = scanner::enumerate(scope, &self.filter)?;
        reporter.on_enumerate_complete(records.len(), enumerate_start.elapsed().as_secs_f64());
        let resolution = self.resolve(&records, reporter, cancel);
        if let Some(warning) = self.flush_after_operation() {
            warn!("{}", warning);
        }
        if resolution.cancelled {
            return Err(Error::Cancelled);
        }

        let mut report = match &self.reference {
            Some(index) => reference::match_records(&resolution.identified(&records), index),
            None => NameMatchReport::default(),
        };
        report.errors = resolution.errors;
        Ok(report)
    }

    fn verify_name_matches(
        &mut self,
        result: &mut ComparisonResult,
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) {
        let pairs: Vec<FileRecord> = result
            .in_both
            .iter()
            .filter_map(|entry| Some([entry.a.first()?.clone(), entry.b.first()?.clone()]))
            .flatten()
            .collect();
        let resolution = self.resolve(&pairs, reporter, cancel);

        let identities: AHashMap<PathBuf, ContentIdentity> = pairs
            .iter()
            .zip(&resolution.identities)
            .filter_map(|(record, identity)| identity.map(|id| (record.path.clone(), id)))
            .collect();
        compare::split_mismatched(result, &identities);
        result.errors.extend(resolution.errors);
    }

    fn resolve(
        &mut self,
        records: &[FileRecord],
        reporter: &dyn ProgressReporter,
        cancel: &CancelToken,
    ) -> Resolution {
        resolve_identities(
            records,
            &mut self.cache,
            &self.hasher,
            self.pool.as_ref(),
            reporter,
            cancel,
        )
    }

    fn flush_after_operation(&mut self) -> Option<String> {
        match self.cache.flush() {
            Ok(()) => None,
            Err(e) => {
                warn!("{}", e);
                Some(e.to_string())
            }
        }
    }
}

fn build_pool(threads: usize) -> Option<ThreadPool> {
    if threads == 0 {
        return None;
    }
    match ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("rom-hash-{}", i))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(
                "Could not build a {}-thread hash pool ({}), using the global pool",
                threads, e
            );
            None
        }
    }
}
