//! Page report assembly and the end-to-end analysis of one captured page.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::{CategoryBreakdown, VisibilityStats};
use crate::correlate::annotate;
use crate::error::AnalysisError;
use crate::model::{PageCapture, ResponseRecord, TimingMeta, VisibilityState};

/// One line of the sites stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteReport {
    pub url: String,
    pub all: VisibilityStats,
    #[serde(flatten)]
    pub categories: CategoryBreakdown,
    pub buffer_size: u64,
    pub exceeded_default_buffer: bool,
    pub main_frame_entries: u64,
}

impl SiteReport {
    pub fn assemble(
        url: impl Into<String>,
        all: VisibilityStats,
        categories: CategoryBreakdown,
        meta: TimingMeta,
    ) -> Self {
        Self {
            url: url.into(),
            all,
            categories,
            buffer_size: meta.buffer_size,
            exceeded_default_buffer: meta.exceeded_default_buffer,
            main_frame_entries: meta.main_frame_entries,
        }
    }
}

/// One line of the URLs stream: a response tagged with the page it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlRecord {
    #[serde(flatten)]
    pub response: ResponseRecord,
    pub site: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub missing: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_tao: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

pub fn flatten_records(site: &str, records: &[ResponseRecord]) -> Vec<UrlRecord> {
    records
        .iter()
        .map(|record| UrlRecord {
            response: record.clone(),
            site: site.to_string(),
            missing: record.visibility_state == Some(VisibilityState::Missing),
            no_tao: record.visibility_state == Some(VisibilityState::Restricted),
        })
        .collect()
}

/// Both outputs for one page, ready for the sinks.
#[derive(Clone, Debug, PartialEq)]
pub struct PageReport {
    pub site: SiteReport,
    pub urls: Vec<UrlRecord>,
}

/// Correlate, aggregate and assemble one captured page.
pub fn analyze_page(capture: PageCapture) -> Result<PageReport, AnalysisError> {
    let PageCapture {
        url,
        mut responses,
        timing,
    } = capture;

    annotate(&mut responses, &timing)?;
    debug!(
        target: "assembler",
        url = %url,
        responses = responses.len(),
        entries = timing.resources.len(),
        "page correlated"
    );
    summarize_page(&url, &responses, timing.meta())
}

/// Aggregate already-correlated records and assemble both outputs.
///
/// Both accounting invariants are checked before anything is returned; a
/// page that violates either is rejected as a whole.
pub fn summarize_page(
    url: &str,
    records: &[ResponseRecord],
    meta: TimingMeta,
) -> Result<PageReport, AnalysisError> {
    let all = VisibilityStats::aggregate(records, None)?;
    let categories = CategoryBreakdown::aggregate(records)?;
    check_invariants(records, &all, &categories)?;

    let site = SiteReport::assemble(url, all, categories, meta);
    let urls = flatten_records(url, records);
    Ok(PageReport { site, urls })
}

fn check_invariants(
    records: &[ResponseRecord],
    all: &VisibilityStats,
    categories: &CategoryBreakdown,
) -> Result<(), AnalysisError> {
    if !all.is_balanced() {
        return Err(AnalysisError::Unbalanced {
            scope: "all".into(),
        });
    }
    if let Some((asset, _)) = categories.iter().find(|(_, stats)| !stats.is_balanced()) {
        return Err(AnalysisError::Unbalanced {
            scope: asset.report_key().into(),
        });
    }

    let mut unclassified = VisibilityStats::default();
    for record in records.iter().filter(|r| r.asset_type.is_none()) {
        if let Some(state) = record.visibility_state {
            unclassified.record(state, record.transfer_size);
        }
    }
    if categories.total() + unclassified != *all {
        return Err(AnalysisError::PartitionMismatch);
    }
    Ok(())
}
