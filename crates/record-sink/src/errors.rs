use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkErrorKind {
    #[error("open {path} failed: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("flush failed: {0}")]
    Flush(#[source] io::Error),
}

#[derive(Debug, Error)]
#[error(transparent)]
pub struct SinkError(pub SinkErrorKind);

impl SinkError {
    pub fn new(kind: SinkErrorKind) -> Self {
        Self(kind)
    }

    pub fn kind(&self) -> &SinkErrorKind {
        &self.0
    }
}

impl From<SinkErrorKind> for SinkError {
    fn from(kind: SinkErrorKind) -> Self {
        SinkError(kind)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError(SinkErrorKind::Encode(err))
    }
}
