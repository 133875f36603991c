//! Resource timing visibility analysis.
//!
//! Classifies every network response of a page into an asset type, matches it
//! against the resource timing entries the page reported, and aggregates how
//! many responses (and bytes) were visible, restricted or missing.

pub mod aggregate;
pub mod classify;
pub mod correlate;
pub mod error;
pub mod model;
pub mod report;

pub use aggregate::{CategoryBreakdown, VisibilityStats};
pub use classify::{AssetClassifier, ContentTypeRule, CONTENT_TYPE_RULES, DEFAULT_PIXEL_SIZES};
pub use correlate::{annotate, correlate, Correlation, TimingIndex};
pub use error::AnalysisError;
pub use model::{
    AssetType, PageCapture, PageTimingSnapshot, ResponseRecord, TimingEntry, TimingMeta,
    VisibilityState, DEFAULT_BUFFER_SIZE,
};
pub use report::{
    analyze_page, flatten_records, summarize_page, PageReport, SiteReport, UrlRecord,
};
