use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use tracing::error;

use super::{ScanEngine, ScanRequest, ScanResult};
use crate::error::Error;
use crate::progress::{CancelToken, ChannelReporter, ProgressEvent};

/// A duplicate scan running on its own thread.
///
/// The engine moves into the worker and comes back from [`join`](Self::join),
/// so the cache stays single-owner the whole time.
pub struct ScanHandle {
    cancel: CancelToken,
    events: Receiver<ProgressEvent>,
    thread: JoinHandle<(ScanEngine, Result<ScanResult, Error>)>,
}

impl ScanHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    /// Events queued so far, without blocking.
    pub fn drain_events(&self) -> Vec<ProgressEvent> {
        self.events.try_iter().collect()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> Result<(ScanEngine, Result<ScanResult, Error>), Error> {
        self.thread.join().map_err(|_| {
            error!("Scan worker panicked");
            Error::Other("scan worker panicked".to_string())
        })
    }
}

pub fn spawn_duplicate_scan(engine: ScanEngine, request: ScanRequest) -> Result<ScanHandle, Error> {
    let cancel = CancelToken::new();
    let (tx, events) = mpsc::channel();

    let worker_cancel = cancel.clone();
    let thread = thread::Builder::new()
        .name("rom-scan".to_string())
        .spawn(move || {
            let mut engine = engine;
            let reporter = ChannelReporter::new(tx);
            let result = engine.scan_for_duplicates(&request, &reporter, &worker_cancel);
            (engine, result)
        })?;

    Ok(ScanHandle {
        cancel,
        events,
        thread,
    })
}
