use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::Notify;

use crate::types::TicketVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    pub started_at: Instant,
    pub deadline: Instant,
}

/// Per-run state shared between the poll loop, its fetch tasks and the
/// reservation tiers. Flags only ever go from false to true within a run;
/// the variant slot is overwritten whole.
#[derive(Debug, Default)]
pub struct PollingSession {
    variants: RwLock<Option<Vec<TicketVariant>>>,
    available: AtomicBool,
    reserved: AtomicBool,
    window: Mutex<Option<PollWindow>>,
    found: Notify,
}

impl PollingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh non-empty snapshot. Returns true for the write that
    /// flipped the session to available.
    pub fn publish_variants(&self, variants: Vec<TicketVariant>) -> bool {
        if variants.is_empty() {
            return false;
        }
        *self.variants.write() = Some(variants);
        let first = !self.available.swap(true, Ordering::SeqCst);
        if first {
            self.found.notify_one();
        }
        first
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn discovered_variants(&self) -> Option<Vec<TicketVariant>> {
        self.variants.read().clone()
    }

    /// Resolves once a fetch has published variants. May also wake once
    /// spuriously, callers re-check `is_available`.
    pub async fn wait_found(&self) {
        self.found.notified().await;
    }

    pub fn mark_reserved(&self) {
        self.reserved.store(true, Ordering::SeqCst);
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved.load(Ordering::SeqCst)
    }

    pub fn begin_window(&self, started_at: Instant, deadline: Instant) {
        *self.window.lock() = Some(PollWindow {
            started_at,
            deadline,
        });
    }

    pub fn window(&self) -> Option<PollWindow> {
        *self.window.lock()
    }

    pub fn reset(&self) {
        *self.variants.write() = None;
        self.available.store(false, Ordering::SeqCst);
        self.reserved.store(false, Ordering::SeqCst);
        *self.window.lock() = None;
    }

    pub fn is_pristine(&self) -> bool {
        !self.is_available()
            && !self.is_reserved()
            && self.variants.read().is_none()
            && self.window.lock().is_none()
    }
}
