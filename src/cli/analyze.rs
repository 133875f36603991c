use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use visibility_core::{analyze_page, PageCapture};

use super::output::{open_sinks, print_summary, OutputArgs};
use crate::config::AppConfig;

#[derive(Args, Clone, Debug)]
pub struct AnalyzeArgs {
    /// Capture stream written by `crawl --captures`
    pub captures: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeSummary {
    pub pages: usize,
    pub reported: usize,
    pub abandoned: usize,
    pub malformed: usize,
    pub responses: usize,
}

pub async fn cmd_analyze(args: AnalyzeArgs, mut config: AppConfig) -> Result<()> {
    args.output.apply(&mut config.output);
    // replaying never re-records captures
    config.output.captures = None;

    let file = File::open(&args.captures)
        .await
        .with_context(|| format!("Failed to open {}", args.captures.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut sinks = open_sinks(&config.output)?;
    let mut summary = AnalyzeSummary::default();

    let mut line_no = 0usize;
    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("Failed to read {}", args.captures.display()))?
    {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let capture: PageCapture = match serde_json::from_str(&line) {
            Ok(capture) => capture,
            Err(err) => {
                warn!(line = line_no, error = %err, "skipping malformed capture");
                summary.malformed += 1;
                continue;
            }
        };

        summary.pages += 1;
        let url = capture.url.clone();
        match analyze_page(capture) {
            Ok(report) => {
                sinks
                    .persist(&report)
                    .context("Failed to persist analysis output")?;
                info!(url = %url, all = ?report.site.all, "page reported");
                summary.reported += 1;
                summary.responses += report.urls.len();
            }
            Err(err) => {
                warn!(url = %url, error = %err, "page abandoned");
                summary.abandoned += 1;
            }
        }
    }

    print_summary(&summary)
}
