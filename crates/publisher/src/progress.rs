//! Periodic upload progress reporting.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// How many in-flight file names a snapshot carries.
pub const ACTIVE_SAMPLE_LIMIT: usize = 3;

/// Default interval between progress reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Point-in-time view of an upload run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    /// Up to [`ACTIVE_SAMPLE_LIMIT`] in-flight files, longest running first.
    pub active_sample: Vec<String>,
    /// In-flight files not included in the sample.
    pub active_more: usize,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }
}

/// Receives progress reports.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);

    /// Called exactly once, when every file has completed.
    fn on_complete(&self, total: usize);
}

/// Tracks in-flight and completed uploads.
pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    active: DashMap<String, Instant>,
    observer: Arc<dyn ProgressObserver>,
    finished: AtomicBool,
    interval: Duration,
    reporter: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressTracker {
    pub fn new(total: usize, observer: Arc<dyn ProgressObserver>) -> Arc<Self> {
        Self::with_interval(total, observer, DEFAULT_REPORT_INTERVAL)
    }

    pub fn with_interval(
        total: usize,
        observer: Arc<dyn ProgressObserver>,
        interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            total,
            completed: AtomicUsize::new(0),
            active: DashMap::new(),
            observer,
            finished: AtomicBool::new(false),
            interval,
            reporter: Mutex::new(None),
        })
    }

    pub fn start_upload(&self, name: &str) {
        self.active.insert(name.to_string(), Instant::now());
    }

    /// Mark a file finished, whatever its outcome.
    pub fn complete_upload(&self, name: &str) {
        self.active.remove(name);
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if completed >= self.total {
            self.finish();
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let mut active: Vec<(String, Instant)> = self
            .active
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        active.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let active_more = active.len().saturating_sub(ACTIVE_SAMPLE_LIMIT);
        ProgressSnapshot {
            completed: self.completed().min(self.total),
            total: self.total,
            active_sample: active
                .into_iter()
                .take(ACTIVE_SAMPLE_LIMIT)
                .map(|(name, _)| name)
                .collect(),
            active_more,
        }
    }

    /// Start the periodic reporter. An empty run completes immediately.
    pub fn start_reporting(self: &Arc<Self>) {
        if self.total == 0 {
            self.finish();
            return;
        }

        let tracker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tracker.interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tracker.finished.load(Ordering::SeqCst) {
                    break;
                }
                tracker.observer.on_progress(&tracker.snapshot());
            }
        });

        if let Ok(mut slot) = self.reporter.lock()
            && let Some(previous) = slot.replace(handle)
        {
            previous.abort();
        }
    }

    /// Stop the periodic reporter, if running.
    pub fn stop_reporting(&self) {
        if let Ok(mut slot) = self.reporter.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
        }
    }

    fn finish(&self) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.observer.on_complete(self.total);
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.stop_reporting();
    }
}
