//! rt-visibility library
//!
//! Crawl loop, configuration and site list handling behind the
//! `rt-visibility` binary. Analysis itself lives in `visibility-core`.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod sites;

pub use config::AppConfig;
pub use crawler::{CrawlOptions, CrawlSummary, Crawler, PageOutcome, PagePhase, PageSinks};
pub use sites::{normalize_site, read_sites, CrawlTarget};
