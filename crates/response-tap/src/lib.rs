//! Response tap: the active collection window of the page being crawled.
//!
//! The driver pushes every completed response into the tap. Only one page
//! window is open at a time; responses that arrive while no window is open
//! (late requests of the previous page, unload beacons) are dropped. Inside a
//! window each response is filtered, sized and classified into a
//! [`ResponseRecord`].

pub mod config;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, trace};
use url::Url;
use uuid::Uuid;
use visibility_core::{AssetClassifier, ResponseRecord};

use crate::config::TapConfig;

/// Identifier of one page visit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

/// One completed response as reported by the browser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseEvent {
    pub url: String,
    pub status: u16,
    /// Header names are lower-case, in the order the browser reported them.
    pub headers: Vec<(String, String)>,
    /// Body length when the body was read; `None` if it was not read or reading failed.
    pub body_bytes: Option<u64>,
}

impl ResponseEvent {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Per-window counters, returned when the window closes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub seen: u64,
    pub recorded: u64,
    pub skipped_self: u64,
    pub skipped_redirect: u64,
    pub skipped_scheme: u64,
    pub skipped_invalid: u64,
}

/// How the tap handled one response inside an open window.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Admission {
    Recorded,
    SelfNavigation,
    Redirect,
    NonHttp,
    InvalidUrl,
}

/// Errors emitted by the tap surface.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TapError {
    #[error("a window is already open for page {0:?}")]
    WindowBusy(PageId),
    #[error("no window is open")]
    WindowClosed,
    #[error("window belongs to page {open:?}, not {requested:?}")]
    StalePage { open: PageId, requested: PageId },
}

/// Everything collected while a window was open.
#[derive(Clone, Debug)]
pub struct WindowCapture {
    pub page: PageId,
    /// Final URL of the page after followed redirects.
    pub target_url: String,
    pub records: Vec<ResponseRecord>,
    pub stats: WindowStats,
}

/// Seam the driver pushes completed responses into.
#[async_trait]
pub trait ResponseObserver: Send + Sync {
    async fn observe(&self, event: ResponseEvent);
}

struct PageWindow {
    page: PageId,
    state: Mutex<WindowState>,
}

struct WindowState {
    target: String,
    records: Vec<ResponseRecord>,
    stats: WindowStats,
    closed: bool,
}

pub struct ResponseTap {
    window: RwLock<Option<Arc<PageWindow>>>,
    classifier: AssetClassifier,
    config: TapConfig,
}

impl ResponseTap {
    pub fn new(classifier: AssetClassifier) -> Self {
        Self::with_config(TapConfig::default(), classifier)
    }

    pub fn with_config(config: TapConfig, classifier: AssetClassifier) -> Self {
        Self {
            window: RwLock::new(None),
            classifier,
            config,
        }
    }

    pub async fn active_page(&self) -> Option<PageId> {
        self.window.read().await.as_ref().map(|window| window.page)
    }

    /// Start collecting for `page`, navigated at `url`.
    pub async fn open(&self, page: PageId, url: &str) -> Result<(), TapError> {
        let mut slot = self.window.write().await;
        if let Some(existing) = slot.as_ref() {
            return Err(TapError::WindowBusy(existing.page));
        }
        *slot = Some(Arc::new(PageWindow {
            page,
            state: Mutex::new(WindowState {
                target: url.to_string(),
                records: Vec::new(),
                stats: WindowStats::default(),
                closed: false,
            }),
        }));
        debug!(target: "response-tap", ?page, url, "window opened");
        Ok(())
    }

    /// Stop collecting and hand back what the window gathered.
    pub async fn close(&self, page: PageId) -> Result<WindowCapture, TapError> {
        let window = self.take(page).await?;
        let mut state = window.state.lock().await;
        state.closed = true;
        let capture = WindowCapture {
            page,
            target_url: state.target.clone(),
            records: std::mem::take(&mut state.records),
            stats: state.stats,
        };
        debug!(
            target: "response-tap",
            ?page,
            recorded = capture.stats.recorded,
            seen = capture.stats.seen,
            "window closed"
        );
        Ok(capture)
    }

    /// Drop the window and everything it gathered.
    pub async fn discard(&self, page: PageId) -> Result<(), TapError> {
        let window = self.take(page).await?;
        let mut state = window.state.lock().await;
        state.closed = true;
        let dropped = state.records.len();
        state.records.clear();
        debug!(target: "response-tap", ?page, dropped, "window discarded");
        Ok(())
    }

    async fn take(&self, page: PageId) -> Result<Arc<PageWindow>, TapError> {
        let mut slot = self.window.write().await;
        match slot.as_ref() {
            None => Err(TapError::WindowClosed),
            Some(window) if window.page != page => Err(TapError::StalePage {
                open: window.page,
                requested: page,
            }),
            Some(_) => slot.take().ok_or(TapError::WindowClosed),
        }
    }

    pub async fn ingest(&self, event: ResponseEvent) -> Result<Admission, TapError> {
        let window = self
            .window
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(TapError::WindowClosed)?;

        let mut state = window.state.lock().await;
        if state.closed {
            return Err(TapError::WindowClosed);
        }
        state.stats.seen += 1;

        let redirect = self.config.redirect_statuses.contains(&event.status);

        if is_self_navigation(&state.target, &event.url) {
            if redirect {
                if let Some(location) = event.header("location") {
                    let next = resolve_location(&state.target, location);
                    info!(target: "response-tap", from = %state.target, to = %next, "redirect");
                    state.target = next;
                }
            }
            state.stats.skipped_self += 1;
            return Ok(Admission::SelfNavigation);
        }

        if redirect {
            state.stats.skipped_redirect += 1;
            return Ok(Admission::Redirect);
        }

        if !event.url.starts_with("http") {
            state.stats.skipped_scheme += 1;
            return Ok(Admission::NonHttp);
        }

        match self.build_record(&event) {
            Some(record) => {
                state.records.push(record);
                state.stats.recorded += 1;
                Ok(Admission::Recorded)
            }
            None => {
                state.stats.skipped_invalid += 1;
                Ok(Admission::InvalidUrl)
            }
        }
    }

    fn build_record(&self, event: &ResponseEvent) -> Option<ResponseRecord> {
        let host = match Url::parse(&event.url) {
            Ok(parsed) => host_with_port(&parsed)?,
            Err(err) => {
                debug!(target: "response-tap", url = %event.url, %err, "unparseable response url");
                return None;
            }
        };

        let content_length = event
            .header("content-length")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|len| *len > 0)
            .or(event.body_bytes)
            .unwrap_or(0);
        let content_type = event.header("content-type").map(str::to_string);
        let content_encoding = event.header("content-encoding").map(str::to_string);
        let header_size = serialized_header_size(&event.headers);
        let transfer_size = content_length + header_size;
        let asset_type =
            self.classifier
                .classify(&event.url, content_type.as_deref(), content_length);

        if asset_type.is_none() {
            debug!(target: "response-tap", url = %event.url, "no asset type");
        }
        debug!(
            target: "response-tap",
            url = %truncate(&event.url, self.config.url_log_width),
            content_length,
            header_size,
            transfer_size,
            asset_type = asset_type.map(|a| a.as_str()).unwrap_or("-"),
            "response recorded"
        );

        Some(ResponseRecord {
            url: event.url.clone(),
            content_length,
            content_type,
            content_encoding,
            header_size,
            transfer_size,
            asset_type,
            host,
            frame_depth: None,
            visibility_state: None,
        })
    }
}

#[async_trait]
impl ResponseObserver for ResponseTap {
    async fn observe(&self, event: ResponseEvent) {
        if let Err(err) = self.ingest(event).await {
            trace!(target: "response-tap", %err, "response outside active window dropped");
        }
    }
}

fn is_self_navigation(target: &str, url: &str) -> bool {
    url == target || url.strip_suffix('/') == Some(target)
}

fn resolve_location(base: &str, location: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(location))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| location.to_string())
}

fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Byte length of the headers serialized as `name: value\n` lines.
pub fn serialized_header_size(headers: &[(String, String)]) -> u64 {
    headers
        .iter()
        .map(|(name, value)| (name.len() + 2 + value.len() + 1) as u64)
        .sum()
}

fn truncate(url: &str, width: usize) -> String {
    if url.chars().count() <= width {
        url.to_string()
    } else {
        url.chars().take(width).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visibility_core::AssetType;

    fn event(url: &str, status: u16, headers: &[(&str, &str)]) -> ResponseEvent {
        ResponseEvent {
            url: url.to_string(),
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body_bytes: None,
        }
    }

    #[test]
    fn header_size_counts_serialized_lines() {
        let headers = vec![("a".to_string(), "bc".to_string())];
        // "a: bc\n"
        assert_eq!(serialized_header_size(&headers), 6);
    }

    #[test]
    fn self_navigation_matches_trailing_slash_only_one_way() {
        assert!(is_self_navigation("http://x.com", "http://x.com/"));
        assert!(is_self_navigation("http://x.com/", "http://x.com/"));
        assert!(!is_self_navigation("http://x.com/", "http://x.com"));
    }

    #[test]
    fn relative_location_resolves_against_target() {
        assert_eq!(
            resolve_location("http://x.com/", "/home"),
            "http://x.com/home"
        );
        assert_eq!(
            resolve_location("http://x.com/", "https://www.x.com/"),
            "https://www.x.com/"
        );
    }

    #[tokio::test]
    async fn record_uses_header_length_then_body_then_zero() {
        let tap = ResponseTap::new(AssetClassifier::default());
        let page = PageId::new();
        tap.open(page, "http://site.test/").await.unwrap();

        tap.ingest(event(
            "https://cdn.test/a.css",
            200,
            &[("content-type", "text/css"), ("content-length", "500")],
        ))
        .await
        .unwrap();

        let mut bodied = event("https://cdn.test/b.js", 200, &[("content-length", "0")]);
        bodied.body_bytes = Some(1234);
        tap.ingest(bodied).await.unwrap();

        tap.ingest(event("https://cdn.test/beacon", 204, &[])).await.unwrap();

        let capture = tap.close(page).await.unwrap();
        let lengths: Vec<u64> = capture.records.iter().map(|r| r.content_length).collect();
        assert_eq!(lengths, vec![500, 1234, 0]);
        assert_eq!(capture.records[0].asset_type, Some(AssetType::Css));
        assert_eq!(capture.records[2].asset_type, Some(AssetType::Pixel));
        assert_eq!(capture.records[2].transfer_size, 0);
        let first = &capture.records[0];
        assert_eq!(first.transfer_size, first.content_length + first.header_size);
    }

    #[tokio::test]
    async fn host_keeps_non_default_port() {
        let tap = ResponseTap::new(AssetClassifier::default());
        let page = PageId::new();
        tap.open(page, "http://site.test/").await.unwrap();
        tap.ingest(event("https://cdn.test:8443/x.js", 200, &[]))
            .await
            .unwrap();
        tap.ingest(event("https://cdn.test:443/y.js", 200, &[]))
            .await
            .unwrap();
        let capture = tap.close(page).await.unwrap();
        assert_eq!(capture.records[0].host, "cdn.test:8443");
        assert_eq!(capture.records[1].host, "cdn.test");
    }
}
