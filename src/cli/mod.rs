pub mod analyze;
pub mod app;
pub mod commands;
pub mod crawl;
pub mod env;
pub mod output;
pub mod runtime;

pub use analyze::{cmd_analyze, AnalyzeArgs};
pub use crawl::{cmd_crawl, CrawlArgs};
