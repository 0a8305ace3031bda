//! Integration tests for the HTTP fetch strategies.
//!
//! Uses `wiremock` to stand up a local HTTP server so no real network
//! traffic is made. The browser strategy needs a live `WebDriver` endpoint
//! and is not exercised here.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bidboard_scraper::{FetchError, FetchSettings, FetchStrategy, fetch_pages};

const PAGE: &str = "<html><body><table id=\"t\"><tr><td>1</td></tr></table></body></html>";

#[tokio::test]
async fn direct_fetch_returns_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/listings"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/listings", server.uri());
    let fetched = fetch_pages(&url, &FetchStrategy::Direct, &FetchSettings::default(), None)
        .await
        .expect("direct fetch should succeed");

    assert_eq!(fetched.pages, vec![PAGE.to_string()]);
    assert!(!fetched.best_effort);
    assert!(fetched.stopped_early.is_none());
}

#[tokio::test]
async fn direct_fetch_reports_non_success_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/gone", server.uri());
    let result = fetch_pages(&url, &FetchStrategy::Direct, &FetchSettings::default(), None).await;

    match result {
        Err(FetchError::Status { status, url: failed }) => {
            assert_eq!(status, 404);
            assert_eq!(failed, url);
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn render_proxy_passes_key_and_target() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/"))
        .and(query_param("api_key", "secret"))
        .and(query_param("url", "https://example.org/bids"))
        .and(query_param("render_js", "true"))
        .and(query_param("wait", "5000"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let settings = FetchSettings::default()
        .with_render_api_key("secret")
        .with_render_endpoint(&format!("{}/api/v1/", server.uri()));

    let fetched = fetch_pages(
        "https://example.org/bids",
        &FetchStrategy::RenderProxy {
            wait_ms: Some(5000),
        },
        &settings,
        None,
    )
    .await
    .expect("proxy fetch should succeed");

    assert_eq!(fetched.pages.len(), 1);
    assert!(fetched.best_effort);
}

#[tokio::test]
async fn render_proxy_without_key_is_a_config_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
        .expect(0)
        .mount(&server)
        .await;

    let settings = FetchSettings::default().with_render_endpoint(&server.uri());

    let result = fetch_pages(
        "https://example.org/bids",
        &FetchStrategy::RenderProxy { wait_ms: None },
        &settings,
        None,
    )
    .await;

    assert!(
        matches!(result, Err(FetchError::MissingApiKey(var)) if var == "BIDBOARD_RENDER_API_KEY"),
        "expected MissingApiKey, got {result:?}"
    );
}

#[tokio::test]
async fn render_proxy_surfaces_service_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let settings = FetchSettings::default()
        .with_render_api_key("secret")
        .with_render_endpoint(&server.uri());

    let result = fetch_pages(
        "https://example.org/bids",
        &FetchStrategy::RenderProxy { wait_ms: None },
        &settings,
        None,
    )
    .await;

    assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
}
