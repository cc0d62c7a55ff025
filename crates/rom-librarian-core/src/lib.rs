pub mod cache;
pub mod compare;
pub mod config;
pub mod deletion;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod hasher;
pub mod model;
pub mod progress;
pub mod reference;
pub mod report;
pub mod scanner;
pub mod selection;

pub use cache::IdentityCache;
pub use compare::{CompareMode, CompareOptions, ComparisonResult, NameNormalization};
pub use config::{AppConfig, FilterMode};
pub use deletion::{execute_deletions, DeletionOutcome, DeletionPlan};
pub use engine::{spawn_duplicate_scan, ScanEngine, ScanHandle, ScanRequest, ScanResult};
pub use error::{Error, FileError, FileErrorKind};
pub use grouping::{group_by_identity, DuplicateGroup, GroupMember, IdentityProvider};
pub use hasher::{compute_identity, ContentIdentity};
pub use model::{FileRecord, OperationStatus};
pub use progress::{CancelToken, ChannelReporter, ProgressEvent, ProgressReporter, SilentReporter};
pub use reference::{ReferenceEntry, ReferenceIndex};
pub use scanner::ScanScope;
pub use selection::{apply_policy, Region, SelectionParams, Strategy};
