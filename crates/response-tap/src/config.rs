//! Configuration types for the response tap.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Statuses treated as redirects: skipped, and followed when they answer the page itself.
    pub redirect_statuses: Vec<u16>,
    /// Width URLs are cut to in per-response log lines.
    pub url_log_width: usize,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            redirect_statuses: vec![301, 302],
            url_log_width: 80,
        }
    }
}
