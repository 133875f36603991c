use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_driver::ChromiumDriver;
use clap::Args;
use response_tap::{ResponseObserver, ResponseTap};
use tracing::info;

use super::output::{open_sinks, print_summary, OutputArgs};
use crate::config::AppConfig;
use crate::crawler::{CrawlOptions, Crawler};
use crate::sites::CrawlTarget;

#[derive(Args, Clone, Debug)]
pub struct CrawlArgs {
    /// A URL, or N to crawl the first N sites of the site list
    pub target: String,

    /// Site list used when the target is a count
    #[arg(long, value_name = "FILE")]
    pub sites_file: Option<PathBuf>,

    /// Also write each page's raw capture here
    #[arg(long, value_name = "FILE")]
    pub captures: Option<PathBuf>,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,

    /// Browser executable
    #[arg(long, value_name = "PATH")]
    pub chrome: Option<PathBuf>,

    /// Pause between pages in milliseconds
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Per-page navigation timeout in milliseconds
    #[arg(long)]
    pub navigation_timeout_ms: Option<u64>,
}

impl CrawlArgs {
    fn apply(&self, config: &mut AppConfig) {
        self.output.apply(&mut config.output);
        if let Some(path) = &self.captures {
            config.output.captures = Some(path.clone());
        }
        if let Some(path) = &self.sites_file {
            config.sites_file = path.clone();
        }
        if self.headful {
            config.browser.headless = false;
        }
        if let Some(path) = &self.chrome {
            config.browser.executable = Some(path.clone());
        }
        if let Some(ms) = self.settle_ms {
            config.crawl.settle_ms = ms;
        }
        if let Some(ms) = self.navigation_timeout_ms {
            config.crawl.navigation_timeout_ms = ms;
        }
    }
}

pub async fn cmd_crawl(args: CrawlArgs, mut config: AppConfig) -> Result<()> {
    args.apply(&mut config);

    let target = CrawlTarget::parse(&args.target)?;
    let sites = target
        .resolve(&config.sites_file)
        .context("Failed to resolve crawl target")?;
    info!(target: "crawler", sites = sites.len(), "site list resolved");

    let sinks = open_sinks(&config.output)?;
    let tap = Arc::new(ResponseTap::with_config(
        config.tap.clone(),
        config.classifier.build(),
    ));
    let observer: Arc<dyn ResponseObserver> = tap.clone();
    let driver = ChromiumDriver::launch(config.browser.clone(), observer)
        .await
        .context("Failed to launch browser")?;

    let mut crawler = Crawler::new(driver, tap, sinks, CrawlOptions::from(&config.crawl));
    let result = crawler.run(&sites).await;
    crawler.shutdown().await;

    let summary = result.context("Failed to persist crawl output")?;
    print_summary(&summary)
}
