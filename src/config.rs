//! Application configuration loaded from YAML.

use std::path::PathBuf;
use std::time::Duration;

use cdp_driver::DriverConfig;
use response_tap::config::TapConfig;
use serde::{Deserialize, Serialize};
use visibility_core::{AssetClassifier, DEFAULT_PIXEL_SIZES};

pub const DEFAULT_SITES_FILE: &str = "sites-1000.csv";
pub const DEFAULT_SITES_OUTPUT: &str = "output-sites.json";
pub const DEFAULT_URLS_OUTPUT: &str = "output-urls.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub browser: DriverConfig,
    pub crawl: CrawlSettings,
    pub output: OutputSettings,
    pub classifier: ClassifierSettings,
    pub tap: TapConfig,
    /// Site list used when the crawl target is a count.
    pub sites_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            browser: DriverConfig::default(),
            crawl: CrawlSettings::default(),
            output: OutputSettings::default(),
            classifier: ClassifierSettings::default(),
            tap: TapConfig::default(),
            sites_file: PathBuf::from(DEFAULT_SITES_FILE),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub navigation_timeout_ms: u64,
    pub gather_timeout_ms: u64,
    /// Bound on the `about:blank` hop between pages.
    pub blank_timeout_ms: u64,
    /// Pause after each page so trailing beacons land outside any window.
    pub settle_ms: u64,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            gather_timeout_ms: 10_000,
            blank_timeout_ms: 5_000,
            settle_ms: 2_000,
        }
    }
}

impl CrawlSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.gather_timeout_ms)
    }

    pub fn blank_timeout(&self) -> Duration {
        Duration::from_millis(self.blank_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub sites: PathBuf,
    pub urls: PathBuf,
    /// Raw per-page captures, replayable with `analyze`.
    pub captures: Option<PathBuf>,
    /// Truncate the streams when the run starts instead of appending.
    pub fresh: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            sites: PathBuf::from(DEFAULT_SITES_OUTPUT),
            urls: PathBuf::from(DEFAULT_URLS_OUTPUT),
            captures: None,
            fresh: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub pixel_sizes: Vec<u64>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            pixel_sizes: DEFAULT_PIXEL_SIZES.to_vec(),
        }
    }
}

impl ClassifierSettings {
    pub fn build(&self) -> AssetClassifier {
        AssetClassifier::new().with_pixel_sizes(self.pixel_sizes.iter().copied())
    }
}
