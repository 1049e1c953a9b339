//! At-most-once response delivery.

use crate::event::PlatformResponse;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Guard ensuring at most one response is ever delivered per invocation.
///
/// Every emission operation on the facade funnels through [`deliver`]
/// (`ResponseSentinel::deliver`), the single delivery primitive. A second
/// delivery attempt is a silent no-op rather than an error; `ended` is a
/// separate signal that tells the runner to stop dispatching steps.
#[derive(Debug, Default)]
pub struct ResponseSentinel {
    sent: AtomicBool,
    ended: AtomicBool,
    slot: Mutex<Option<PlatformResponse>>,
}

impl ResponseSentinel {
    /// Creates a fresh sentinel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a response through the single primitive.
    ///
    /// Returns false when a response was already delivered; the attempt is
    /// dropped.
    pub fn deliver(&self, response: PlatformResponse) -> bool {
        let mut slot = self.slot.lock();
        if self.sent.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.store(true, Ordering::SeqCst);
        *slot = Some(response);
        true
    }

    /// Marks the invocation as ended.
    pub fn mark_ended(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    /// Returns true once a response has been delivered.
    #[must_use]
    pub fn was_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    /// Returns true once the end-of-processing signal was issued.
    #[must_use]
    pub fn was_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    /// Takes the delivered response, if any.
    #[must_use]
    pub fn take(&self) -> Option<PlatformResponse> {
        self.slot.lock().take()
    }
}
