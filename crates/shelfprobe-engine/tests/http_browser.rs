//! Integration tests for `HttpBrowser` against local `wiremock` servers.
//!
//! Covers plain pages, status codes whose bodies are still classified, hard
//! failures and the 429 retry path, plus one full run through the
//! `Orchestrator` to show a static page exhausts on its first scroll.

use std::sync::Arc;

use shelfprobe_core::{PageState, RunBounds, RunTarget, TerminalStatus};
use shelfprobe_engine::{
    classify, BrowseError, Browser, HttpBrowser, NoCache, Orchestrator, SiteProfile, TracingSink,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LISTING: &str = r#"<html><head>
<script type="application/ld+json">{"@type":"Product","name":"Olijfolie 500 ml","offers":{"price":"4.99","priceCurrency":"EUR"}}</script>
</head><body><ul class="product-list"><li class="product-tile" data-product="1">Olijfolie</li></ul></body></html>"#;

const CHALLENGE: &str = r#"<html><head><title>Just a moment...</title></head><body>
<div id="challenge-stage"></div>
<script src="/cdn-cgi/challenge-platform/h/g/orchestrate/jsch/v1"></script>
</body></html>"#;

/// No retries, so error tests finish immediately.
fn test_browser() -> HttpBrowser {
    HttpBrowser::new(5, "shelfprobe-test/0.1")
        .expect("failed to build test HttpBrowser")
        .with_retry_policy(0, 0)
}

async fn serve(route: &str, template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn captures_page_body_and_final_url() {
    let server = serve(
        "/olie",
        ResponseTemplate::new(200).set_body_string(LISTING),
    )
    .await;
    let url = format!("{}/olie", server.uri());

    let mut browser = test_browser();
    browser.navigate(&url).await.expect("navigate");
    let capture = browser.snapshot().await.expect("snapshot");

    assert_eq!(capture.url, url);
    assert!(capture.html.contains("Olijfolie"));
    assert_eq!(capture.scroll_height, None);
}

#[tokio::test]
async fn snapshot_before_navigate_fails() {
    let mut browser = test_browser();
    assert!(matches!(
        browser.snapshot().await,
        Err(BrowseError::NotNavigated)
    ));
}

#[tokio::test]
async fn forbidden_challenge_body_is_classified_not_failed() {
    let server = serve(
        "/olie",
        ResponseTemplate::new(403).set_body_string(CHALLENGE),
    )
    .await;
    let url = format!("{}/olie", server.uri());

    let mut browser = test_browser();
    browser.navigate(&url).await.expect("403 body should be captured");
    let capture = browser.snapshot().await.expect("snapshot");
    let snapshot = shelfprobe_core::PageSnapshot::from_capture(capture, 0);

    assert_eq!(
        classify(&snapshot, &SiteProfile::default(), &url),
        PageState::CfChallenge
    );
}

#[tokio::test]
async fn not_found_is_unexpected_status() {
    let server = serve("/olie", ResponseTemplate::new(404)).await;
    let url = format!("{}/olie", server.uri());

    let result = test_browser().navigate(&url).await;
    assert!(
        matches!(result, Err(BrowseError::UnexpectedStatus { status: 404, .. })),
        "expected UnexpectedStatus(404), got: {result:?}"
    );
}

#[tokio::test]
async fn rate_limit_without_retries_reports_retry_after() {
    let server = serve(
        "/olie",
        ResponseTemplate::new(429).insert_header("Retry-After", "7"),
    )
    .await;
    let url = format!("{}/olie", server.uri());

    let result = test_browser().navigate(&url).await;
    assert!(
        matches!(
            result,
            Err(BrowseError::RateLimited {
                retry_after_secs: 7,
                ..
            })
        ),
        "expected RateLimited, got: {result:?}"
    );
}

#[tokio::test]
async fn rate_limit_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/olie"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/olie"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(&server)
        .await;
    let url = format!("{}/olie", server.uri());

    let mut browser = HttpBrowser::new(5, "shelfprobe-test/0.1")
        .expect("failed to build test HttpBrowser")
        .with_retry_policy(2, 0);
    browser.navigate(&url).await.expect("second attempt succeeds");
    assert!(browser.snapshot().await.expect("snapshot").html.contains("Olijfolie"));
}

#[tokio::test]
async fn static_page_run_completes_after_one_step() {
    let server = serve(
        "/olie",
        ResponseTemplate::new(200).set_body_string(LISTING),
    )
    .await;
    let url = format!("{}/olie", server.uri());
    let target = RunTarget::with_run_id("run-http", "shop_nl", "NL", &url).expect("valid target");

    let mut orchestrator = Orchestrator::new(
        test_browser(),
        Arc::new(NoCache),
        Arc::new(TracingSink),
        SiteProfile::default(),
        RunBounds::default(),
    );
    let result = orchestrator.execute(&target).await;

    assert_eq!(result.terminal_status, TerminalStatus::Completed);
    assert_eq!(result.step_count, 1);
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].name, "Olijfolie 500 ml");
}

async fn serve_with_robots(robots: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(robots))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/olie"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn robots_disallowed_path_is_refused_before_fetching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /olie\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/olie"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
        .expect(0)
        .mount(&server)
        .await;
    let url = format!("{}/olie", server.uri());

    let mut browser = test_browser();
    for _ in 0..2 {
        let result = browser.navigate(&url).await;
        assert!(
            matches!(result, Err(BrowseError::Navigation { ref reason, .. }) if reason.contains("robots.txt")),
            "expected robots refusal, got: {result:?}"
        );
    }
}

#[tokio::test]
async fn robots_group_for_our_agent_takes_precedence() {
    let server = serve_with_robots(
        "User-agent: *\nDisallow: /\n\nUser-agent: shelfprobe-test\nAllow: /olie\n",
    )
    .await;
    let url = format!("{}/olie", server.uri());

    let mut browser = test_browser();
    browser.navigate(&url).await.expect("allowed for our agent");
    assert!(browser.snapshot().await.expect("snapshot").html.contains("Olijfolie"));
}

#[tokio::test]
async fn robots_check_can_be_turned_off() {
    let server = serve_with_robots("User-agent: *\nDisallow: /olie\n").await;
    let url = format!("{}/olie", server.uri());

    let mut browser = test_browser().with_robots(false);
    browser.navigate(&url).await.expect("robots ignored");
    assert!(browser.snapshot().await.is_ok());
}

#[tokio::test]
async fn robots_refusal_ends_run_with_timeout() {
    let server = serve_with_robots("User-agent: *\nDisallow: /olie\n").await;
    let url = format!("{}/olie", server.uri());
    let target = RunTarget::with_run_id("run-robots", "shop_nl", "NL", &url).expect("valid target");

    let mut orchestrator = Orchestrator::new(
        test_browser(),
        Arc::new(NoCache),
        Arc::new(TracingSink),
        SiteProfile::default(),
        RunBounds::default(),
    );
    let result = orchestrator.execute(&target).await;

    assert_eq!(result.terminal_status, TerminalStatus::Timeout);
    assert!(result.records.is_empty());
    assert!(result
        .failure
        .as_deref()
        .is_some_and(|f| f.contains("robots.txt")));
}
