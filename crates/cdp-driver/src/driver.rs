use std::time::Duration;

use async_trait::async_trait;
use visibility_core::PageTimingSnapshot;

use crate::error::DriverError;

/// Browser session used by the crawler, one page at a time.
///
/// Responses observed while a page loads are pushed to the
/// [`response_tap::ResponseObserver`] the driver was built with; the driver
/// itself keeps no per-page response state.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Loads `url` and waits for the load event plus network quiet, bounded by `deadline`.
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), DriverError>;

    /// Runs the timing gatherer in the current document.
    async fn gather_timing(&self) -> Result<PageTimingSnapshot, DriverError>;

    async fn shutdown(&self);
}
