use clap::Subcommand;

use super::analyze::AnalyzeArgs;
use super::crawl::CrawlArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Crawl one URL or the top N sites and record timing visibility
    Crawl(CrawlArgs),

    /// Re-analyze recorded page captures without a browser
    Analyze(AnalyzeArgs),
}
