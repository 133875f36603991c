use std::sync::Arc;
use std::time::Duration;

use cdp_driver::{ScriptedDriver, ScriptedNavigation, ScriptedPage};
use record_sink::MemorySink;
use response_tap::{serialized_header_size, ResponseEvent, ResponseTap};
use rt_visibility::{CrawlOptions, Crawler, PageOutcome, PagePhase, PageSinks};
use serde_json::Value;
use visibility_core::{AssetClassifier, PageTimingSnapshot, TimingEntry};

fn response(url: &str, content_type: &str, len: u64) -> ResponseEvent {
    ResponseEvent {
        url: url.to_string(),
        status: 200,
        headers: vec![
            ("content-type".into(), content_type.into()),
            ("content-length".into(), len.to_string()),
        ],
        body_bytes: None,
    }
}

fn entry(name: &str, response_start: f64) -> TimingEntry {
    TimingEntry {
        name: name.to_string(),
        initiator_type: "script".into(),
        no_tao: response_start == 0.0,
        response_start,
        ..TimingEntry::default()
    }
}

fn options() -> CrawlOptions {
    CrawlOptions {
        navigation_timeout: Duration::from_secs(30),
        gather_timeout: Duration::from_secs(5),
        blank_timeout: Duration::from_secs(5),
        settle: Duration::ZERO,
    }
}

struct Harness {
    sites: MemorySink,
    urls: MemorySink,
    captures: MemorySink,
    crawler: Crawler<ScriptedDriver>,
}

fn harness(pages: Vec<(&str, ScriptedPage)>) -> Harness {
    let tap = Arc::new(ResponseTap::new(AssetClassifier::default()));
    let mut driver = ScriptedDriver::new(tap.clone());
    for (url, page) in pages {
        driver = driver.with_page(url, page);
    }
    let sites = MemorySink::new();
    let urls = MemorySink::new();
    let captures = MemorySink::new();
    let sinks = PageSinks::new(Box::new(sites.clone()), Box::new(urls.clone()))
        .with_captures(Box::new(captures.clone()));
    Harness {
        sites,
        urls,
        captures,
        crawler: Crawler::new(driver, tap, sinks, options()),
    }
}

fn reported_page() -> ScriptedPage {
    ScriptedPage {
        responses: vec![
            response("http://a.test/", "text/html", 5000),
            response("http://a.test/app.js", "application/javascript", 100),
            response("http://cdn.test/site.css", "text/css", 100),
            response("http://img.test/hero.png", "image/png", 100),
        ],
        trailing: vec![response("http://beacon.test/collect", "image/gif", 43)],
        timing: Some(PageTimingSnapshot {
            resources: vec![
                entry("http://a.test/app.js", 40.0),
                entry("http://cdn.test/site.css", 0.0),
            ],
            buffer_size: 150,
            exceeded_default_buffer: false,
            main_frame_entries: 2,
        }),
        navigation: ScriptedNavigation::Load,
    }
}

#[tokio::test]
async fn reported_and_abandoned_pages() {
    let slow = ScriptedPage {
        responses: vec![response("http://b.test/partial.js", "text/javascript", 10)],
        navigation: ScriptedNavigation::Timeout,
        ..ScriptedPage::default()
    };
    let mut h = harness(vec![("http://a.test/", reported_page()), ("http://b.test/", slow)]);

    let sites = vec!["http://a.test/".to_string(), "http://b.test/".to_string()];
    let summary = h.crawler.run(&sites).await.unwrap();

    assert_eq!(summary.pages, 2);
    assert_eq!(summary.reported, 1);
    assert_eq!(summary.abandoned, 1);
    assert_eq!(summary.responses, 3);
    match &summary.outcomes[1] {
        PageOutcome::Abandoned { phase, .. } => assert_eq!(*phase, PagePhase::Navigating),
        other => panic!("unexpected outcome {other:?}"),
    }

    assert_eq!(
        h.crawler.driver().visits(),
        vec!["http://a.test/", "about:blank", "http://b.test/", "about:blank"]
    );

    let site_lines = h.sites.lines();
    assert_eq!(site_lines.len(), 1);
    let site = &site_lines[0];
    let header = serialized_header_size(&response("x", "text/css", 100).headers);
    assert_eq!(site["url"], "http://a.test/");
    assert_eq!(site["all"]["totalEntries"], 3);
    assert_eq!(site["all"]["visibleEntries"], 1);
    assert_eq!(site["all"]["noTaoEntries"], 1);
    assert_eq!(site["all"]["missingEntries"], 1);
    assert_eq!(site["css"]["noTaoEntries"], 1);
    assert_eq!(site["css"]["noTaoBytes"], 100 + header);
    assert_eq!(site["images"]["missingEntries"], 1);
    assert_eq!(site["bufferSize"], 150);
    assert_eq!(site["mainFrameEntries"], 2);

    // the beacon arrived after the window closed and the slow page left nothing
    let url_lines = h.urls.lines();
    let urls: Vec<&str> = url_lines
        .iter()
        .map(|line| line["url"].as_str().unwrap())
        .collect();
    assert_eq!(
        urls,
        vec![
            "http://a.test/app.js",
            "http://cdn.test/site.css",
            "http://img.test/hero.png"
        ]
    );
    assert!(url_lines.iter().all(|line| line["site"] == "http://a.test/"));
    assert_eq!(url_lines[1]["noTao"], Value::Bool(true));
    assert_eq!(url_lines[2]["missing"], Value::Bool(true));
    assert!(url_lines[0].get("missing").is_none());

    assert_eq!(h.sites.flushed(), 1);
    assert_eq!(h.urls.flushed(), 3);
    assert_eq!(h.captures.lines().len(), 1);
}

#[tokio::test]
async fn gather_failure_discards_collected_responses() {
    let page = ScriptedPage {
        timing: None,
        ..reported_page()
    };
    let mut h = harness(vec![("http://a.test/", page)]);

    let outcome = h.crawler.crawl_page("http://a.test/").await.unwrap();
    match outcome {
        PageOutcome::Abandoned { phase, url, .. } => {
            assert_eq!(phase, PagePhase::Collecting);
            assert_eq!(url, "http://a.test/");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(h.sites.lines().is_empty());
    assert!(h.urls.lines().is_empty());
    assert!(h.captures.lines().is_empty());

    // the window was discarded, so the next page can open one
    let summary = h.crawler.run(&["http://a.test/".to_string()]).await.unwrap();
    assert_eq!(summary.abandoned, 1);
}

#[tokio::test]
async fn redirected_landing_page_is_not_recorded() {
    let page = ScriptedPage {
        responses: vec![
            ResponseEvent {
                url: "http://r.test/".into(),
                status: 301,
                headers: vec![("location".into(), "https://www.r.test/".into())],
                body_bytes: Some(0),
            },
            response("https://www.r.test/", "text/html", 900),
            response("https://www.r.test/main.js", "text/javascript", 300),
        ],
        timing: Some(PageTimingSnapshot {
            resources: vec![entry("https://www.r.test/main.js", 12.5)],
            ..PageTimingSnapshot::default()
        }),
        ..ScriptedPage::default()
    };
    let mut h = harness(vec![("http://r.test/", page)]);

    let outcome = h.crawler.crawl_page("http://r.test/").await.unwrap();
    assert!(outcome.is_reported());

    let url_lines = h.urls.lines();
    assert_eq!(url_lines.len(), 1);
    assert_eq!(url_lines[0]["url"], "https://www.r.test/main.js");
    assert_eq!(url_lines[0]["site"], "http://r.test/");
    assert_eq!(url_lines[0]["visibilityState"], "visible");
    assert_eq!(h.sites.lines()[0]["javascripts"]["visibleEntries"], 1);
}
