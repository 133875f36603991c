use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level error categories surfaced by a driver.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq, Serialize, Deserialize)]
pub enum DriverErrorKind {
    #[error("browser launch failed")]
    Launch,
    #[error("navigation timed out")]
    NavTimeout,
    #[error("navigation failed")]
    Navigation,
    #[error("script evaluation failed")]
    Evaluate,
    #[error("telemetry decode failed")]
    Decode,
    #[error("cdp i/o failure")]
    Cdp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

impl DriverError {
    pub fn new(kind: DriverErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == DriverErrorKind::NavTimeout
    }
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        DriverError::new(DriverErrorKind::Cdp).with_hint(err.to_string())
    }
}
