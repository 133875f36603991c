use thiserror::Error;

/// Failures that abandon the analysis of one page.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("response {url} was already correlated")]
    AlreadyCorrelated { url: String },
    #[error("response {url} has not been correlated")]
    Uncorrelated { url: String },
    #[error("visibility buckets do not add up for {scope}")]
    Unbalanced { scope: String },
    #[error("category totals diverge from the all-responses totals")]
    PartitionMismatch,
}
