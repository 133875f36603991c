//! Resolving the crawl target into an ordered list of page URLs.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SitesError {
    #[error("cannot open site list {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed site list {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("'{0}' is neither a URL nor a site count")]
    InvalidTarget(String),
}

/// What the user asked to crawl.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CrawlTarget {
    /// One page.
    Url(String),
    /// The first N entries of the site list.
    Top(usize),
}

impl CrawlTarget {
    pub fn parse(raw: &str) -> Result<Self, SitesError> {
        let trimmed = raw.trim();
        if trimmed.starts_with("http") {
            return Ok(Self::Url(trimmed.to_string()));
        }
        trimmed
            .parse::<usize>()
            .map(Self::Top)
            .map_err(|_| SitesError::InvalidTarget(raw.to_string()))
    }

    pub fn resolve(&self, sites_file: &Path) -> Result<Vec<String>, SitesError> {
        match self {
            Self::Url(url) => Ok(vec![url.clone()]),
            Self::Top(count) => {
                let file = File::open(sites_file).map_err(|source| SitesError::Open {
                    path: sites_file.to_path_buf(),
                    source,
                })?;
                read_sites(file, *count).map_err(|source| SitesError::Parse {
                    path: sites_file.to_path_buf(),
                    source,
                })
            }
        }
    }
}

/// Reads up to `limit` sites. Each record's last non-empty field is the site,
/// so both `rank,host` and bare `host` lists work.
pub fn read_sites<R: Read>(reader: R, limit: usize) -> Result<Vec<String>, csv::Error> {
    let mut rows = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut sites = Vec::new();
    for record in rows.records() {
        if sites.len() >= limit {
            break;
        }
        let record = record?;
        if let Some(site) = record.iter().rev().find(|field| !field.is_empty()) {
            sites.push(normalize_site(site));
        }
    }
    Ok(sites)
}

/// `example.com` → `http://example.com/`; absolute URLs pass through.
pub fn normalize_site(site: &str) -> String {
    let site = site.trim();
    if site.starts_with("http://") || site.starts_with("https://") {
        return site.to_string();
    }
    let candidate = format!("http://{}/", site.trim_end_matches('/'));
    match Url::parse(&candidate) {
        Ok(url) => url.to_string(),
        Err(_) => candidate,
    }
}
