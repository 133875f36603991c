//! The sequential per-page crawl loop.
//!
//! Every page walks `Idle → Navigating → Collecting → Correlating →
//! Aggregating → Reported`. A failure at any step moves it to `Abandoned`:
//! its response window is discarded and nothing is written for it. Sink
//! failures are the only errors that stop the run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cdp_driver::{BrowserDriver, DriverError};
use record_sink::{append, AppendSink, SinkError};
use response_tap::{PageId, ResponseTap, TapError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use visibility_core::{
    annotate, summarize_page, AnalysisError, PageCapture, PageReport, VisibilityStats,
};

use crate::config::CrawlSettings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PagePhase {
    Idle,
    Navigating,
    Collecting,
    Correlating,
    Aggregating,
    Reported,
    Abandoned,
}

impl PagePhase {
    /// Next phase on the success path. Terminal phases stay put.
    pub fn advance(self) -> Self {
        match self {
            Self::Idle => Self::Navigating,
            Self::Navigating => Self::Collecting,
            Self::Collecting => Self::Correlating,
            Self::Correlating => Self::Aggregating,
            Self::Aggregating => Self::Reported,
            Self::Reported => Self::Reported,
            Self::Abandoned => Self::Abandoned,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reported | Self::Abandoned)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Navigating => "navigating",
            Self::Collecting => "collecting",
            Self::Correlating => "correlating",
            Self::Aggregating => "aggregating",
            Self::Reported => "reported",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for PagePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a page was abandoned.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("response window: {0}")]
    Window(#[from] TapError),
    #[error("driver: {0}")]
    Driver(#[from] DriverError),
    #[error("timing gather exceeded {0:?}")]
    GatherTimeout(Duration),
    #[error("analysis: {0}")]
    Analysis(#[from] AnalysisError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrawlOptions {
    pub navigation_timeout: Duration,
    pub gather_timeout: Duration,
    pub blank_timeout: Duration,
    pub settle: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from(&CrawlSettings::default())
    }
}

impl From<&CrawlSettings> for CrawlOptions {
    fn from(settings: &CrawlSettings) -> Self {
        Self {
            navigation_timeout: settings.navigation_timeout(),
            gather_timeout: settings.gather_timeout(),
            blank_timeout: settings.blank_timeout(),
            settle: settings.settle(),
        }
    }
}

/// The output streams a crawl writes to.
pub struct PageSinks {
    sites: Box<dyn AppendSink>,
    urls: Box<dyn AppendSink>,
    captures: Option<Box<dyn AppendSink>>,
}

impl PageSinks {
    pub fn new(sites: Box<dyn AppendSink>, urls: Box<dyn AppendSink>) -> Self {
        Self {
            sites,
            urls,
            captures: None,
        }
    }

    pub fn with_captures(mut self, captures: Box<dyn AppendSink>) -> Self {
        self.captures = Some(captures);
        self
    }

    /// Writes one page: the site report, then every URL record. The whole
    /// page is serialized before either stream is touched, and a failed
    /// append discards what this page had buffered.
    pub fn persist(&mut self, report: &PageReport) -> Result<(), SinkError> {
        let site = serde_json::to_value(&report.site)?;
        let urls = report
            .urls
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;

        let written = self.write_page(&site, &urls);
        if written.is_err() {
            self.sites.discard();
            self.urls.discard();
        }
        written
    }

    fn write_page(&mut self, site: &Value, urls: &[Value]) -> Result<(), SinkError> {
        self.sites.append_json(site)?;
        for record in urls {
            self.urls.append_json(record)?;
        }
        self.sites.flush()?;
        self.urls.flush()
    }

    pub fn record_capture(&mut self, capture: &PageCapture) -> Result<(), SinkError> {
        if let Some(captures) = self.captures.as_mut() {
            append(captures, capture)?;
            captures.flush()?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum PageOutcome {
    Reported {
        url: String,
        responses: usize,
        all: VisibilityStats,
    },
    Abandoned {
        url: String,
        phase: PagePhase,
        reason: String,
    },
}

impl PageOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Reported { url, .. } | Self::Abandoned { url, .. } => url,
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Reported { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlSummary {
    pub pages: usize,
    pub reported: usize,
    pub abandoned: usize,
    pub responses: usize,
    pub outcomes: Vec<PageOutcome>,
}

impl CrawlSummary {
    fn push(&mut self, outcome: PageOutcome) {
        self.pages += 1;
        match &outcome {
            PageOutcome::Reported { responses, .. } => {
                self.reported += 1;
                self.responses += responses;
            }
            PageOutcome::Abandoned { .. } => self.abandoned += 1,
        }
        self.outcomes.push(outcome);
    }
}

pub struct Crawler<D> {
    driver: D,
    tap: Arc<ResponseTap>,
    sinks: PageSinks,
    options: CrawlOptions,
}

impl<D: BrowserDriver> Crawler<D> {
    /// `driver` must deliver its responses to `tap`.
    pub fn new(driver: D, tap: Arc<ResponseTap>, sinks: PageSinks, options: CrawlOptions) -> Self {
        Self {
            driver,
            tap,
            sinks,
            options,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Crawls `sites` in order, one page at a time.
    pub async fn run(&mut self, sites: &[String]) -> Result<CrawlSummary, SinkError> {
        let mut summary = CrawlSummary::default();
        for (index, site) in sites.iter().enumerate() {
            info!(target: "crawler", page = index + 1, total = sites.len(), url = %site, "crawling");
            let outcome = self.crawl_page(site).await?;
            summary.push(outcome);
        }
        info!(
            target: "crawler",
            pages = summary.pages,
            reported = summary.reported,
            abandoned = summary.abandoned,
            "crawl finished"
        );
        Ok(summary)
    }

    pub async fn crawl_page(&mut self, url: &str) -> Result<PageOutcome, SinkError> {
        let page = PageId::new();
        let mut phase = PagePhase::Idle;

        let collected = self.collect(page, url, &mut phase).await;
        let outcome = match collected {
            Ok(capture) => {
                self.sinks.record_capture(&capture)?;
                match self.analyze(capture, &mut phase) {
                    Ok(report) => {
                        self.sinks.persist(&report)?;
                        phase = phase.advance();
                        info!(target: "crawler", url, all = ?report.site.all, "page reported");
                        PageOutcome::Reported {
                            url: url.to_string(),
                            responses: report.urls.len(),
                            all: report.site.all,
                        }
                    }
                    Err(err) => self.abandon(page, url, &mut phase, err).await,
                }
            }
            Err(err) => self.abandon(page, url, &mut phase, err).await,
        };
        debug_assert!(phase.is_terminal());

        self.between_pages().await;
        Ok(outcome)
    }

    async fn collect(
        &self,
        page: PageId,
        url: &str,
        phase: &mut PagePhase,
    ) -> Result<PageCapture, PageError> {
        self.enter(phase, url);
        self.tap.open(page, url).await?;
        self.driver
            .navigate(url, self.options.navigation_timeout)
            .await?;

        self.enter(phase, url);
        let timing = tokio::time::timeout(self.options.gather_timeout, self.driver.gather_timing())
            .await
            .map_err(|_| PageError::GatherTimeout(self.options.gather_timeout))??;
        let window = self.tap.close(page).await?;
        debug!(
            target: "crawler",
            url,
            recorded = window.stats.recorded,
            seen = window.stats.seen,
            entries = timing.resources.len(),
            "collection finished"
        );

        Ok(PageCapture {
            url: url.to_string(),
            responses: window.records,
            timing,
        })
    }

    fn analyze(&self, capture: PageCapture, phase: &mut PagePhase) -> Result<PageReport, PageError> {
        let PageCapture {
            url,
            mut responses,
            timing,
        } = capture;

        self.enter(phase, &url);
        annotate(&mut responses, &timing)?;

        self.enter(phase, &url);
        Ok(summarize_page(&url, &responses, timing.meta())?)
    }

    async fn abandon(
        &self,
        page: PageId,
        url: &str,
        phase: &mut PagePhase,
        err: PageError,
    ) -> PageOutcome {
        let failed_in = *phase;
        *phase = PagePhase::Abandoned;
        if let Err(err) = self.tap.discard(page).await {
            trace!(target: "crawler", url, %err, "no window to discard");
        }
        warn!(target: "crawler", url, phase = %failed_in, error = %err, "page abandoned");
        PageOutcome::Abandoned {
            url: url.to_string(),
            phase: failed_in,
            reason: err.to_string(),
        }
    }

    fn enter(&self, phase: &mut PagePhase, url: &str) {
        *phase = phase.advance();
        debug!(target: "crawler", url, phase = %phase, "phase");
    }

    async fn between_pages(&self) {
        if let Err(err) = self
            .driver
            .navigate("about:blank", self.options.blank_timeout)
            .await
        {
            debug!(target: "crawler", error = %err, "about:blank navigation failed");
        }
        if !self.options.settle.is_zero() {
            tokio::time::sleep(self.options.settle).await;
        }
    }

    pub async fn shutdown(self) {
        self.driver.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_sink::{JsonLinesSink, MemorySink, OpenMode};
    use visibility_core::{
        flatten_records, CategoryBreakdown, ResponseRecord, SiteReport, TimingMeta,
        VisibilityState,
    };

    #[test]
    fn phases_follow_the_success_path() {
        let mut phase = PagePhase::Idle;
        let mut seen = vec![phase];
        while !phase.is_terminal() {
            phase = phase.advance();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                PagePhase::Idle,
                PagePhase::Navigating,
                PagePhase::Collecting,
                PagePhase::Correlating,
                PagePhase::Aggregating,
                PagePhase::Reported,
            ]
        );
        assert_eq!(PagePhase::Abandoned.advance(), PagePhase::Abandoned);
    }

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = CrawlSummary::default();
        summary.push(PageOutcome::Reported {
            url: "http://a.test/".into(),
            responses: 4,
            all: VisibilityStats::default(),
        });
        summary.push(PageOutcome::Abandoned {
            url: "http://b.test/".into(),
            phase: PagePhase::Navigating,
            reason: "timeout".into(),
        });
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.reported, 1);
        assert_eq!(summary.abandoned, 1);
        assert_eq!(summary.responses, 4);
        assert_eq!(summary.outcomes[1].url(), "http://b.test/");
    }

    /// Accepts `budget` appends, then fails every write.
    struct FailingSink {
        budget: usize,
        accepted: Vec<Value>,
    }

    impl AppendSink for FailingSink {
        fn append_json(&mut self, record: &Value) -> Result<(), SinkError> {
            if self.budget == 0 {
                let err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
                return Err(SinkError::new(record_sink::SinkErrorKind::Write(err)));
            }
            self.budget -= 1;
            self.accepted.push(record.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<(), SinkError> {
            Ok(())
        }

        fn discard(&mut self) {
            self.accepted.clear();
        }
    }

    fn three_url_page() -> PageReport {
        let records: Vec<ResponseRecord> = ["a.js", "b.css", "c.png"]
            .iter()
            .map(|name| ResponseRecord {
                url: format!("https://cdn.test/{name}"),
                content_length: 10,
                content_type: None,
                content_encoding: None,
                header_size: 5,
                transfer_size: 15,
                asset_type: None,
                host: "cdn.test".into(),
                frame_depth: None,
                visibility_state: Some(VisibilityState::Visible),
            })
            .collect();
        PageReport {
            site: SiteReport::assemble(
                "http://a.test/",
                VisibilityStats::default(),
                CategoryBreakdown::default(),
                TimingMeta {
                    buffer_size: 150,
                    exceeded_default_buffer: false,
                    main_frame_entries: 3,
                },
            ),
            urls: flatten_records("http://a.test/", &records),
        }
    }

    #[test]
    fn failed_url_write_leaves_no_partial_page_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let sites_path = dir.path().join("sites.json");
        let sites = JsonLinesSink::open(&sites_path, OpenMode::Append).unwrap();
        let urls = FailingSink {
            budget: 1,
            accepted: Vec::new(),
        };
        let mut sinks = PageSinks::new(Box::new(sites), Box::new(urls));

        assert!(sinks.persist(&three_url_page()).is_err());
        drop(sinks);

        assert_eq!(std::fs::read_to_string(&sites_path).unwrap(), "");
    }

    #[test]
    fn failed_page_does_not_disturb_earlier_pages() {
        let sites = MemorySink::new();
        let urls = MemorySink::new();
        let mut sinks = PageSinks::new(Box::new(sites.clone()), Box::new(urls.clone()));
        sinks.persist(&three_url_page()).unwrap();

        let mut failing = PageSinks::new(
            Box::new(sites.clone()),
            Box::new(FailingSink {
                budget: 2,
                accepted: Vec::new(),
            }),
        );
        assert!(failing.persist(&three_url_page()).is_err());

        assert_eq!(sites.lines().len(), 1);
        assert_eq!(sites.flushed(), 1);
        assert_eq!(urls.lines().len(), 3);
    }
}
