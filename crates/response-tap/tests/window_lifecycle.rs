use std::sync::Arc;

use response_tap::{
    Admission, PageId, ResponseEvent, ResponseObserver, ResponseTap, TapError,
};
use visibility_core::AssetClassifier;

fn event(url: &str, status: u16) -> ResponseEvent {
    ResponseEvent {
        url: url.to_string(),
        status,
        headers: vec![
            ("content-type".into(), "application/javascript".into()),
            ("content-length".into(), "100".into()),
        ],
        body_bytes: None,
    }
}

fn redirect(url: &str, location: &str) -> ResponseEvent {
    ResponseEvent {
        url: url.to_string(),
        status: 301,
        headers: vec![("location".into(), location.into())],
        body_bytes: None,
    }
}

fn tap() -> ResponseTap {
    ResponseTap::new(AssetClassifier::default())
}

#[tokio::test]
async fn open_and_close_track_the_active_page() {
    let tap = tap();
    let page = PageId::new();

    tap.open(page, "http://site.test/").await.unwrap();
    assert_eq!(tap.active_page().await, Some(page));

    tap.close(page).await.unwrap();
    assert_eq!(tap.active_page().await, None);
}

#[tokio::test]
async fn only_one_window_at_a_time() {
    let tap = tap();
    let first = PageId::new();
    tap.open(first, "http://a.test/").await.unwrap();

    let err = tap.open(PageId::new(), "http://b.test/").await.unwrap_err();
    assert_eq!(err, TapError::WindowBusy(first));
}

#[tokio::test]
async fn closing_a_stale_page_is_rejected() {
    let tap = tap();
    let open = PageId::new();
    let other = PageId::new();
    tap.open(open, "http://a.test/").await.unwrap();

    assert!(matches!(
        tap.close(other).await,
        Err(TapError::StalePage { .. })
    ));
    assert_eq!(tap.active_page().await, Some(open));
}

#[tokio::test]
async fn responses_outside_a_window_are_dropped() {
    let tap = tap();
    assert_eq!(
        tap.ingest(event("https://cdn.test/early.js", 200)).await,
        Err(TapError::WindowClosed)
    );

    let page = PageId::new();
    tap.open(page, "http://site.test/").await.unwrap();
    tap.ingest(event("https://cdn.test/in.js", 200)).await.unwrap();
    let capture = tap.close(page).await.unwrap();
    assert_eq!(capture.records.len(), 1);

    // late beacon from the page that was just closed
    tap.observe(event("https://cdn.test/late.js", 200)).await;
    let next = PageId::new();
    tap.open(next, "http://other.test/").await.unwrap();
    let capture = tap.close(next).await.unwrap();
    assert!(capture.records.is_empty());
}

#[tokio::test]
async fn self_redirect_and_scheme_filters() {
    let tap = tap();
    let page = PageId::new();
    tap.open(page, "http://site.test").await.unwrap();

    assert_eq!(
        tap.ingest(redirect("http://site.test/", "https://www.site.test/"))
            .await
            .unwrap(),
        Admission::SelfNavigation
    );
    assert_eq!(
        tap.ingest(event("https://www.site.test/", 200)).await.unwrap(),
        Admission::SelfNavigation
    );
    assert_eq!(
        tap.ingest(redirect("https://cdn.test/old.js", "/new.js"))
            .await
            .unwrap(),
        Admission::Redirect
    );
    assert_eq!(
        tap.ingest(event("data:image/png;base64,AAAA", 200))
            .await
            .unwrap(),
        Admission::NonHttp
    );
    assert_eq!(
        tap.ingest(event("https://cdn.test/new.js", 200)).await.unwrap(),
        Admission::Recorded
    );

    let capture = tap.close(page).await.unwrap();
    assert_eq!(capture.target_url, "https://www.site.test/");
    assert_eq!(capture.records.len(), 1);
    assert_eq!(capture.stats.seen, 5);
    assert_eq!(capture.stats.skipped_self, 2);
    assert_eq!(capture.stats.skipped_redirect, 1);
    assert_eq!(capture.stats.skipped_scheme, 1);
    assert_eq!(capture.stats.recorded, 1);
}

#[tokio::test]
async fn discard_drops_collected_records() {
    let tap = tap();
    let page = PageId::new();
    tap.open(page, "http://site.test/").await.unwrap();
    tap.ingest(event("https://cdn.test/a.js", 200)).await.unwrap();

    tap.discard(page).await.unwrap();
    assert_eq!(tap.active_page().await, None);
    assert_eq!(tap.close(page).await.unwrap_err(), TapError::WindowClosed);
}

#[tokio::test]
async fn concurrent_observers_append_every_record() {
    let tap = Arc::new(tap());
    let page = PageId::new();
    tap.open(page, "http://site.test/").await.unwrap();

    let mut handles = Vec::new();
    for i in 0..64 {
        let tap = Arc::clone(&tap);
        handles.push(tokio::spawn(async move {
            tap.observe(event(&format!("https://cdn.test/{i}.js"), 200))
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let capture = tap.close(page).await.unwrap();
    assert_eq!(capture.records.len(), 64);
    assert_eq!(capture.stats.recorded, 64);
}
