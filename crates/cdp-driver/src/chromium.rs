//! Chromium-backed [`BrowserDriver`] speaking CDP through chromiumoxide.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, EventResponseReceived, GetResponseBodyParams, RequestId, Response,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::js_protocol::runtime::{
    EnableParams as RuntimeEnableParams, EvaluateParams, EventConsoleApiCalled, RemoteObject,
};
use chromiumoxide::Page;
use futures::StreamExt;
use response_tap::{ResponseEvent, ResponseObserver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use visibility_core::PageTimingSnapshot;

use crate::config::DriverConfig;
use crate::driver::BrowserDriver;
use crate::error::{DriverError, DriverErrorKind};
use crate::idle::NetworkIdle;
use crate::ledger::ResponseLedger;
use crate::scripts::{BUFFER_WIDENING, GATHER_TIMING};

pub struct ChromiumDriver {
    browser: tokio::sync::Mutex<Browser>,
    page: Page,
    idle: Arc<NetworkIdle>,
    ledger: Arc<ResponseLedger>,
    config: DriverConfig,
    cancel: CancellationToken,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl ChromiumDriver {
    /// Starts the browser, opens the working page and wires its network events
    /// into `observer`.
    pub async fn launch(
        config: DriverConfig,
        observer: Arc<dyn ResponseObserver>,
    ) -> Result<Self, DriverError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_millis(config.request_timeout_ms));
        if !config.headless {
            builder = builder.with_head();
        }
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = config.resolve_executable() {
            debug!(target: "cdp-driver", path = %executable.display(), "using browser executable");
            builder = builder.chrome_executable(executable);
        }
        if let Some(dir) = &config.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let browser_config = builder
            .build()
            .map_err(|err| DriverError::new(DriverErrorKind::Launch).with_hint(err))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|err| DriverError::new(DriverErrorKind::Launch).with_hint(err.to_string()))?;
        info!(target: "cdp-driver", headless = config.headless, "browser launched");

        let cancel = CancellationToken::new();
        let handler_cancel = cancel.clone();
        let handler_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = handler_cancel.cancelled() => break,
                    next = handler.next() => match next {
                        Some(Ok(())) => {}
                        Some(Err(err)) => {
                            debug!(target: "cdp-driver", error = %err, "handler event error");
                        }
                        None => break,
                    },
                }
            }
        });

        let page = browser.new_page("about:blank").await?;
        page.execute(NetworkEnableParams::default()).await?;
        page.execute(RuntimeEnableParams::default()).await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(BUFFER_WIDENING))
            .await?;

        let idle = Arc::new(NetworkIdle::new(config.idle_max_inflight));
        let ledger = Arc::new(ResponseLedger::new());
        let event_task = spawn_network_listener(
            page.clone(),
            Arc::clone(&idle),
            Arc::clone(&ledger),
            observer,
            cancel.clone(),
        )
        .await?;

        Ok(Self {
            browser: tokio::sync::Mutex::new(browser),
            page,
            idle,
            ledger,
            config,
            cancel,
            tasks: parking_lot::Mutex::new(vec![handler_task, event_task]),
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), DriverError> {
        let generation = self.ledger.begin_navigation();
        self.idle.reset();
        debug!(target: "cdp-driver", url, generation, "navigating");
        let quiet = Duration::from_millis(self.config.idle_quiet_ms);
        let poll = Duration::from_millis(self.config.idle_poll_ms);

        let load = async {
            self.page.goto(url).await.map_err(|err| {
                DriverError::new(DriverErrorKind::Navigation).with_hint(err.to_string())
            })?;
            self.idle.wait(quiet, poll).await;
            Ok::<(), DriverError>(())
        };

        match tokio::time::timeout(deadline, load).await {
            Ok(result) => result,
            Err(_) => {
                warn!(target: "cdp-driver", url, inflight = self.idle.inflight(), "navigation timed out");
                Err(DriverError::new(DriverErrorKind::NavTimeout)
                    .with_hint(format!("{url} after {}ms", deadline.as_millis())))
            }
        }
    }

    async fn gather_timing(&self) -> Result<PageTimingSnapshot, DriverError> {
        let params = EvaluateParams::builder()
            .expression(GATHER_TIMING)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(|err| DriverError::new(DriverErrorKind::Evaluate).with_hint(err))?;
        let returns = self.page.execute(params).await?;

        if let Some(details) = &returns.exception_details {
            return Err(DriverError::new(DriverErrorKind::Evaluate).with_hint(details.text.clone()));
        }
        let value = returns.result.result.value.clone().ok_or_else(|| {
            DriverError::new(DriverErrorKind::Evaluate).with_hint("gatherer returned no value")
        })?;
        serde_json::from_value(value)
            .map_err(|err| DriverError::new(DriverErrorKind::Decode).with_hint(err.to_string()))
    }

    async fn shutdown(&self) {
        self.cancel.cancel();
        let mut browser = self.browser.lock().await;
        if let Err(err) = browser.close().await {
            debug!(target: "cdp-driver", error = %err, "browser close failed");
        }
        if let Err(err) = browser.wait().await {
            debug!(target: "cdp-driver", error = %err, "browser wait failed");
        }
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        info!(target: "cdp-driver", "browser shut down");
    }
}

async fn spawn_network_listener(
    page: Page,
    idle: Arc<NetworkIdle>,
    ledger: Arc<ResponseLedger>,
    observer: Arc<dyn ResponseObserver>,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, DriverError> {
    let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
    let mut responses = page.event_listener::<EventResponseReceived>().await?;
    let mut finished = page.event_listener::<EventLoadingFinished>().await?;
    let mut failed = page.event_listener::<EventLoadingFailed>().await?;
    let mut console = page.event_listener::<EventConsoleApiCalled>().await?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(event) = requests.next() => {
                    let id = event.request_id.inner().clone();
                    // a redirect reuses the request id; the hop's response arrives here
                    if let Some(redirect) = &event.redirect_response {
                        let generation = ledger.generation();
                        ledger
                            .deliver(observer.as_ref(), generation, response_event(redirect, Some(0)))
                            .await;
                    }
                    idle.started(&id);
                }
                Some(event) = responses.next() => {
                    let id = event.request_id.inner().clone();
                    ledger.received(&id, response_event(&event.response, None));
                }
                Some(event) = finished.next() => {
                    let id = event.request_id.inner().clone();
                    let Some((generation, response)) = ledger.take(&id) else {
                        idle.finished(&id);
                        continue;
                    };
                    if declared_length(&response).is_some() {
                        ledger.deliver(observer.as_ref(), generation, response).await;
                        idle.finished(&id);
                        continue;
                    }
                    let body_key = format!("body:{id}");
                    idle.started(&body_key);
                    idle.finished(&id);
                    let page = page.clone();
                    let idle = Arc::clone(&idle);
                    let ledger = Arc::clone(&ledger);
                    let observer = Arc::clone(&observer);
                    let request_id = event.request_id.clone();
                    tokio::spawn(async move {
                        let mut response = response;
                        response.body_bytes = fetch_body_len(&page, request_id).await;
                        ledger.deliver(observer.as_ref(), generation, response).await;
                        idle.finished(&body_key);
                    });
                }
                Some(event) = failed.next() => {
                    let id = event.request_id.inner().clone();
                    if let Some((generation, response)) = ledger.take(&id) {
                        ledger.deliver(observer.as_ref(), generation, response).await;
                    }
                    idle.finished(&id);
                }
                Some(event) = console.next() => {
                    debug!(target: "cdp-driver", kind = ?event.r#type, "console: {}", console_text(&event.args));
                }
                else => break,
            }
        }
        debug!(target: "cdp-driver", "network listener stopped");
    }))
}

/// Renders console arguments the way devtools prints them: strings bare,
/// other values as JSON, objects by description.
fn console_text(args: &[RemoteObject]) -> String {
    args.iter()
        .map(|arg| match &arg.value {
            Some(serde_json::Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => arg.description.clone().unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn response_event(response: &Response, body_bytes: Option<u64>) -> ResponseEvent {
    let headers = response
        .headers
        .inner()
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(name, value)| {
                    let value = match value.as_str() {
                        Some(text) => text.to_string(),
                        None => value.to_string(),
                    };
                    (name.to_ascii_lowercase(), value)
                })
                .collect()
        })
        .unwrap_or_default();
    ResponseEvent {
        url: response.url.clone(),
        status: u16::try_from(response.status).unwrap_or(0),
        headers,
        body_bytes,
    }
}

fn declared_length(event: &ResponseEvent) -> Option<u64> {
    event
        .header("content-length")
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|len| *len > 0)
}

async fn fetch_body_len(page: &Page, request_id: RequestId) -> Option<u64> {
    match page.execute(GetResponseBodyParams::new(request_id)).await {
        Ok(body) => {
            if body.base64_encoded {
                base64::engine::general_purpose::STANDARD
                    .decode(body.body.as_bytes())
                    .ok()
                    .map(|bytes| bytes.len() as u64)
            } else {
                Some(body.body.len() as u64)
            }
        }
        Err(err) => {
            debug!(target: "cdp-driver", error = %err, "response body unavailable");
            None
        }
    }
}
