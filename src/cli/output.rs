use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use record_sink::{JsonLinesSink, OpenMode};
use serde::Serialize;

use crate::config::OutputSettings;
use crate::crawler::PageSinks;

/// Output flags shared by `crawl` and `analyze`.
#[derive(Args, Clone, Debug, Default)]
pub struct OutputArgs {
    /// Sites stream (one report per page)
    #[arg(long, value_name = "FILE")]
    pub sites_out: Option<PathBuf>,

    /// URLs stream (one record per response)
    #[arg(long, value_name = "FILE")]
    pub urls_out: Option<PathBuf>,

    /// Truncate both streams before writing
    #[arg(long)]
    pub fresh: bool,
}

impl OutputArgs {
    pub fn apply(&self, output: &mut OutputSettings) {
        if let Some(path) = &self.sites_out {
            output.sites = path.clone();
        }
        if let Some(path) = &self.urls_out {
            output.urls = path.clone();
        }
        if self.fresh {
            output.fresh = true;
        }
    }
}

pub fn open_sinks(output: &OutputSettings) -> Result<PageSinks> {
    let mode = if output.fresh {
        OpenMode::Fresh
    } else {
        OpenMode::Append
    };
    let sites = JsonLinesSink::open(&output.sites, mode)
        .with_context(|| format!("Failed to open {}", output.sites.display()))?;
    let urls = JsonLinesSink::open(&output.urls, mode)
        .with_context(|| format!("Failed to open {}", output.urls.display()))?;
    let mut sinks = PageSinks::new(Box::new(sites), Box::new(urls));

    if let Some(path) = &output.captures {
        let captures = JsonLinesSink::open(path, mode)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        sinks = sinks.with_captures(Box::new(captures));
    }
    Ok(sinks)
}

/// Prints a run summary to stdout as pretty JSON.
pub fn print_summary<T: Serialize>(summary: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to render summary")?;
    println!("{json}");
    Ok(())
}
