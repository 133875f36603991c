use std::time::{Duration, Instant};

use dashmap::DashSet;
use parking_lot::Mutex;

/// Tracks requests in flight so navigation can wait for the network to settle.
///
/// The quiet window only restarts when the in-flight count rises above the
/// threshold; churn at or below it keeps counting toward idle.
#[derive(Debug)]
pub struct NetworkIdle {
    inflight: DashSet<String>,
    max_inflight: usize,
    /// When the count last dropped to `max_inflight` or below; `None` while above.
    quiet_since: Mutex<Option<Instant>>,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        Self::new(2)
    }
}

impl NetworkIdle {
    pub fn new(max_inflight: usize) -> Self {
        Self {
            inflight: DashSet::new(),
            max_inflight,
            quiet_since: Mutex::new(Some(Instant::now())),
        }
    }

    pub fn max_inflight(&self) -> usize {
        self.max_inflight
    }

    pub fn started(&self, request_id: &str) {
        let mut quiet_since = self.quiet_since.lock();
        self.inflight.insert(request_id.to_string());
        if self.inflight.len() > self.max_inflight {
            *quiet_since = None;
        }
    }

    pub fn finished(&self, request_id: &str) {
        let mut quiet_since = self.quiet_since.lock();
        self.inflight.remove(request_id);
        if quiet_since.is_none() && self.inflight.len() <= self.max_inflight {
            *quiet_since = Some(Instant::now());
        }
    }

    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    /// Forget everything in flight, e.g. when a new navigation starts.
    pub fn reset(&self) {
        let mut quiet_since = self.quiet_since.lock();
        self.inflight.clear();
        *quiet_since = Some(Instant::now());
    }

    pub fn is_idle(&self, quiet: Duration) -> bool {
        self.quiet_since
            .lock()
            .map(|since| since.elapsed() >= quiet)
            .unwrap_or(false)
    }

    /// Resolves once the count has stayed at or below the threshold for `quiet`.
    /// Callers bound this with their own timeout.
    pub async fn wait(&self, quiet: Duration, poll: Duration) {
        let poll = poll.max(Duration::from_millis(1));
        while !self.is_idle(quiet) {
            tokio::time::sleep(poll).await;
        }
    }
}
