//! Integration tests for the HTTP fetcher against a mock server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fetch_core::{FetchError, Fetcher, HttpFetcher, RetryPolicy};

const PAGE: &str = r#"<html><body><a href="/">home</a><img src="logo.png"></body></html>"#;

fn html(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

fn fetcher(max_attempts: u32) -> HttpFetcher {
    HttpFetcher::new(RetryPolicy::with_max_attempts(max_attempts).base_delay(Duration::from_millis(1)))
        .unwrap()
}

#[tokio::test]
async fn test_server_errors_are_retried_until_attempts_run_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(html(503, "unavailable"))
        .expect(5)
        .mount(&mock_server)
        .await;

    let result = fetcher(5)
        .fetch(
            &format!("{}/flaky", mock_server.uri()),
            &CancellationToken::new(),
        )
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, FetchError::ServerStatus { .. }));
    assert_eq!(err.http_status(), Some(503));
}

#[tokio::test]
async fn test_single_attempt_policy_does_not_retry() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(500, "boom"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = fetcher(1)
        .fetch(&mock_server.uri(), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(FetchError::ServerStatus { .. })));
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(502, "bad gateway"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(html(200, PAGE))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut fetched = fetcher(5)
        .fetch(&mock_server.uri(), &CancellationToken::new())
        .await
        .unwrap();

    let mut body = String::new();
    fetched.content.read_to_string(&mut body).await.unwrap();
    assert_eq!(body, PAGE);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(404, "missing"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = fetcher(5)
        .fetch(&mock_server.uri(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::UnexpectedStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_non_html_content_is_rejected_without_retry() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"ok":true}"#, "application/json"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = fetcher(5)
        .fetch(&mock_server.uri(), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        FetchError::UnexpectedContentType { content_type, .. } => {
            assert_eq!(content_type, "application/json");
        }
        other => panic!("expected content type error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_identity_follows_redirects() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", mock_server.uri())),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html(200, PAGE))
        .mount(&mock_server)
        .await;

    let fetched = fetcher(1)
        .fetch(
            &format!("{}/old", mock_server.uri()),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(fetched.page.id(), format!("{}/new", mock_server.uri()));
}

#[tokio::test]
async fn test_cancellation_interrupts_backoff() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html(503, "unavailable"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher =
        HttpFetcher::new(RetryPolicy::with_max_attempts(5).base_delay(Duration::from_secs(30)))
            .unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = fetcher.fetch(&mock_server.uri(), &cancel).await;
    assert!(matches!(result, Err(FetchError::Cancelled { .. })));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_connection_failures_are_retried_until_attempts_run_out() {
    // Accepts every connection and hangs up before answering.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    let result = fetcher(5)
        .fetch(&format!("http://{addr}/"), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(FetchError::Transport { .. })));
    assert_eq!(accepted.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_refused_connection_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let started = Instant::now();
    let result = fetcher(3)
        .fetch(&format!("http://{addr}/"), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(FetchError::Transport { .. })));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_redirect_loop_is_not_retried() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&mock_server)
        .await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(1))
        .build()
        .unwrap();
    let fetcher = HttpFetcher::from_client(
        client,
        RetryPolicy::with_max_attempts(5).base_delay(Duration::from_millis(1)),
    );

    let result = fetcher
        .fetch(
            &format!("{}/loop", mock_server.uri()),
            &CancellationToken::new(),
        )
        .await;

    assert!(matches!(result, Err(FetchError::Request { .. })));
    // One attempt follows at most a couple of hops; a retry would need more.
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.len() <= 3, "got {} requests", requests.len());
}
