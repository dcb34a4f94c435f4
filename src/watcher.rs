//! DOM watcher - coalesces bursts of structural mutations into a single rescan.
//!
//! Every mutation batch that adds nodes re-arms a quiet-period timer (trailing-edge debounce):
//! the pending timer is cancelled and a new one is started, so at most one rescan is pending.
//! Stopping the watcher cancels the pending timer and makes it ignore further batches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dom::MutationRecord;
use crate::lock_or_recover;

/// Callback run when the quiet period elapses.
pub type RescanCallback = Arc<dyn Fn() + Send + Sync + 'static>;

pub struct DomWatcher {
    quiet_period: Duration,
    rescan: RescanCallback,
    active: Arc<AtomicBool>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DomWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomWatcher")
            .field("quiet_period", &self.quiet_period)
            .field("active", &self.is_active())
            .field("pending", &self.has_pending())
            .finish()
    }
}

impl DomWatcher {
    pub fn new(quiet_period: Duration, rescan: RescanCallback) -> Self {
        Self {
            quiet_period,
            rescan,
            active: Arc::new(AtomicBool::new(false)),
            pending: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        if self.active.swap(true, Ordering::SeqCst) {
            debug!("DomWatcher already active");
        }
    }

    /// Cancels any pending rescan and ignores further mutations until restarted.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(handle) = lock_or_recover(&self.pending).take() {
            handle.abort();
            debug!("Pending rescan cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Whether a rescan is scheduled and has not run yet.
    pub fn has_pending(&self) -> bool {
        lock_or_recover(&self.pending)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Handles one mutation batch. Only batches that add nodes can bring new code blocks.
    pub fn on_mutation(&self, record: &MutationRecord) {
        if !self.is_active() || record.added.is_empty() {
            return;
        }
        self.rearm();
    }

    fn rearm(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, mutation ignored");
            return;
        };

        let mut pending = lock_or_recover(&self.pending);
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let quiet_period = self.quiet_period;
        let rescan = Arc::clone(&self.rescan);
        let active = Arc::clone(&self.active);
        *pending = Some(runtime.spawn(async move {
            tokio::time::sleep(quiet_period).await;
            if active.load(Ordering::SeqCst) {
                debug!("Quiet period elapsed, rescanning");
                rescan();
            }
        }));
    }
}

impl Drop for DomWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
