//! Data model shared by the classifier, correlator, aggregator and assembler.
//!
//! Field names serialize in camelCase so the emitted JSON lines match the
//! streams produced by earlier crawler runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource timing buffer capacity browsers use unless a page asks for more.
pub const DEFAULT_BUFFER_SIZE: u64 = 150;

/// Reporting bucket assigned to a response. "undefined" is modelled as `None`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Javascript,
    Css,
    Xhr,
    Font,
    Image,
    Html,
    Video,
    Audio,
    Pixel,
}

impl AssetType {
    /// Every known category, in report order.
    pub const ALL: [AssetType; 9] = [
        AssetType::Javascript,
        AssetType::Css,
        AssetType::Image,
        AssetType::Xhr,
        AssetType::Font,
        AssetType::Video,
        AssetType::Audio,
        AssetType::Pixel,
        AssetType::Html,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Javascript => "javascript",
            AssetType::Css => "css",
            AssetType::Xhr => "xhr",
            AssetType::Font => "font",
            AssetType::Image => "image",
            AssetType::Html => "html",
            AssetType::Video => "video",
            AssetType::Audio => "audio",
            AssetType::Pixel => "pixel",
        }
    }

    /// Field name used for this category in a site report.
    pub fn report_key(&self) -> &'static str {
        match self {
            AssetType::Javascript => "javascripts",
            AssetType::Css => "css",
            AssetType::Xhr => "xhrs",
            AssetType::Font => "fonts",
            AssetType::Image => "images",
            AssetType::Html => "html",
            AssetType::Video => "videos",
            AssetType::Audio => "audios",
            AssetType::Pixel => "pixels",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a response could be observed through the page's telemetry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityState {
    /// No telemetry entry carries the response URL.
    Missing,
    /// An entry exists but the browser withheld its details (no Timing-Allow-Origin).
    Restricted,
    Visible,
}

impl fmt::Display for VisibilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VisibilityState::Missing => "missing",
            VisibilityState::Restricted => "restricted",
            VisibilityState::Visible => "visible",
        };
        f.write_str(label)
    }
}

/// One network response observed during a page's active window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub url: String,
    pub content_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    pub header_size: u64,
    pub transfer_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<AssetType>,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_state: Option<VisibilityState>,
}

/// One resource timing entry as reported by the in-page gatherer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingEntry {
    pub name: String,
    pub initiator_type: String,
    pub transfer_size: u64,
    pub decoded_body_size: u64,
    pub no_tao: bool,
    pub response_start: f64,
    pub frame_depth: u32,
}

impl TimingEntry {
    /// Browsers zero `responseStart` for cross-origin entries without Timing-Allow-Origin.
    pub fn is_restricted(&self) -> bool {
        self.no_tao || self.response_start == 0.0
    }
}

/// Telemetry collected from one page: entries from every accessible frame plus
/// the buffer metadata summarized by the page instrumentation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageTimingSnapshot {
    pub resources: Vec<TimingEntry>,
    pub buffer_size: u64,
    pub exceeded_default_buffer: bool,
    pub main_frame_entries: u64,
}

impl Default for PageTimingSnapshot {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            exceeded_default_buffer: false,
            main_frame_entries: 0,
        }
    }
}

impl PageTimingSnapshot {
    pub fn meta(&self) -> TimingMeta {
        TimingMeta {
            buffer_size: self.buffer_size,
            exceeded_default_buffer: self.exceeded_default_buffer,
            main_frame_entries: self.main_frame_entries,
        }
    }
}

/// Buffer metadata carried into the site report.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimingMeta {
    pub buffer_size: u64,
    pub exceeded_default_buffer: bool,
    pub main_frame_entries: u64,
}

/// Everything collected for one page before analysis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCapture {
    pub url: String,
    pub responses: Vec<ResponseRecord>,
    pub timing: PageTimingSnapshot,
}
