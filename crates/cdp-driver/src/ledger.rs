//! Responses waiting for `loadingFinished`, scoped to one navigation.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use response_tap::{ResponseEvent, ResponseObserver};
use tracing::trace;

#[derive(Debug, Default)]
pub struct ResponseLedger {
    generation: AtomicU64,
    pending: DashMap<String, (u64, ResponseEvent)>,
}

impl ResponseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new navigation: everything still pending belongs to the
    /// previous page and is forgotten.
    pub fn begin_navigation(&self) -> u64 {
        self.pending.clear();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    pub fn received(&self, request_id: &str, event: ResponseEvent) {
        self.pending
            .insert(request_id.to_string(), (self.generation(), event));
    }

    /// Removes a pending response, yielding it only if it belongs to the
    /// current navigation.
    pub fn take(&self, request_id: &str) -> Option<(u64, ResponseEvent)> {
        let (_, (generation, event)) = self.pending.remove(request_id)?;
        if !self.is_current(generation) {
            trace!(target: "cdp-driver", url = %event.url, "stale response dropped");
            return None;
        }
        Some((generation, event))
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Hands `event` to `observer` unless a newer navigation has started.
    pub async fn deliver(
        &self,
        observer: &dyn ResponseObserver,
        generation: u64,
        event: ResponseEvent,
    ) -> bool {
        if !self.is_current(generation) {
            trace!(target: "cdp-driver", url = %event.url, generation, "late response dropped");
            return false;
        }
        observer.observe(event).await;
        true
    }
}
