//! A browserless [`BrowserDriver`] that replays canned pages.
//!
//! Used by the crawler tests and by anyone who wants to exercise the pipeline
//! without a Chromium install.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use response_tap::{ResponseEvent, ResponseObserver};
use tracing::debug;
use visibility_core::PageTimingSnapshot;

use crate::driver::BrowserDriver;
use crate::error::{DriverError, DriverErrorKind};

#[derive(Clone, Debug, Default)]
pub enum ScriptedNavigation {
    #[default]
    Load,
    Timeout,
    Fail(String),
}

#[derive(Clone, Debug, Default)]
pub struct ScriptedPage {
    /// Delivered while the page navigates.
    pub responses: Vec<ResponseEvent>,
    /// Delivered at the start of the next navigation, after this page is done.
    pub trailing: Vec<ResponseEvent>,
    /// `None` makes `gather_timing` fail.
    pub timing: Option<PageTimingSnapshot>,
    pub navigation: ScriptedNavigation,
}

impl ScriptedPage {
    pub fn loaded(responses: Vec<ResponseEvent>, timing: PageTimingSnapshot) -> Self {
        Self {
            responses,
            timing: Some(timing),
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct ScriptState {
    current: Option<String>,
    trailing: Vec<ResponseEvent>,
    visits: Vec<String>,
    shut_down: bool,
}

pub struct ScriptedDriver {
    observer: Arc<dyn ResponseObserver>,
    pages: HashMap<String, ScriptedPage>,
    state: Mutex<ScriptState>,
}

impl ScriptedDriver {
    pub fn new(observer: Arc<dyn ResponseObserver>) -> Self {
        Self {
            observer,
            pages: HashMap::new(),
            state: Mutex::new(ScriptState::default()),
        }
    }

    pub fn with_page(mut self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Every URL passed to `navigate`, in order.
    pub fn visits(&self) -> Vec<String> {
        self.state.lock().visits.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), DriverError> {
        let trailing = {
            let mut state = self.state.lock();
            state.visits.push(url.to_string());
            state.current = Some(url.to_string());
            std::mem::take(&mut state.trailing)
        };
        for event in trailing {
            self.observer.observe(event).await;
        }

        let Some(page) = self.pages.get(url) else {
            if url == "about:blank" {
                return Ok(());
            }
            return Err(DriverError::new(DriverErrorKind::Navigation)
                .with_hint(format!("no scripted page for {url}")));
        };

        for event in page.responses.iter().cloned() {
            self.observer.observe(event).await;
        }
        self.state.lock().trailing = page.trailing.clone();
        debug!(target: "cdp-driver", url, responses = page.responses.len(), "scripted navigation");

        match &page.navigation {
            ScriptedNavigation::Load => Ok(()),
            ScriptedNavigation::Timeout => Err(DriverError::new(DriverErrorKind::NavTimeout)
                .with_hint(format!("{url} after {}ms", deadline.as_millis()))),
            ScriptedNavigation::Fail(reason) => {
                Err(DriverError::new(DriverErrorKind::Navigation).with_hint(reason.clone()))
            }
        }
    }

    async fn gather_timing(&self) -> Result<PageTimingSnapshot, DriverError> {
        let current = self.state.lock().current.clone();
        current
            .as_deref()
            .and_then(|url| self.pages.get(url))
            .and_then(|page| page.timing.clone())
            .ok_or_else(|| {
                DriverError::new(DriverErrorKind::Evaluate).with_hint("no timing scripted")
            })
    }

    async fn shutdown(&self) {
        self.state.lock().shut_down = true;
    }
}
