use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

/// Trait for reporting scan and compare progress.
///
/// CLI implements with indicatif, GUI front ends poll a [`ChannelReporter`].
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_enumerate_start(&self) {}
    fn on_enumerate_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_hash_start(&self, _total_files: usize) {}
    /// `current` is 1-based and counts files whose identity is resolved.
    fn on_hash_progress(&self, _current: usize, _total: usize, _file_name: &str) {}
    fn on_hash_complete(&self, _hashed: usize, _cache_hits: usize, _duration_secs: f64) {}
    fn on_group_complete(&self, _groups: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    EnumerateStarted,
    Enumerated { total_files: usize },
    HashStarted { total_files: usize },
    Hashed { current: usize, total: usize, file_name: String },
    HashFinished { hashed: usize, cache_hits: usize },
    Grouped { groups: usize },
}

/// Forwards progress as [`ProgressEvent`]s over a channel.
pub struct ChannelReporter {
    tx: Mutex<Sender<ProgressEvent>>,
}

impl ChannelReporter {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx: Mutex::new(tx) }
    }

    fn send(&self, event: ProgressEvent) {
        if let Ok(tx) = self.tx.lock() {
            // receiver gone means nobody is listening any more
            let _ = tx.send(event);
        }
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_enumerate_start(&self) {
        self.send(ProgressEvent::EnumerateStarted);
    }

    fn on_enumerate_complete(&self, total_files: usize, _duration_secs: f64) {
        self.send(ProgressEvent::Enumerated { total_files });
    }

    fn on_hash_start(&self, total_files: usize) {
        self.send(ProgressEvent::HashStarted { total_files });
    }

    fn on_hash_progress(&self, current: usize, total: usize, file_name: &str) {
        self.send(ProgressEvent::Hashed {
            current,
            total,
            file_name: file_name.to_string(),
        });
    }

    fn on_hash_complete(&self, hashed: usize, cache_hits: usize, _duration_secs: f64) {
        self.send(ProgressEvent::HashFinished { hashed, cache_hits });
    }

    fn on_group_complete(&self, groups: usize) {
        self.send(ProgressEvent::Grouped { groups });
    }
}

/// Cooperative cancellation flag, checked between files.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
