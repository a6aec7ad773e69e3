//! Status classification and transport retries of the API client

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use analytics_core::{
    AnalyticsConfig, AnalyticsError, ApiEndpoint, RetryConfig, RetryingHttpClient,
};
use reqwest::Method;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stats() -> ApiEndpoint {
    ApiEndpoint::BotStats {
        bot_id: common::BOT_ID.to_string(),
    }
}

async fn mount_status(server: &MockServer, status: u16, counter: Arc<AtomicUsize>) {
    Mock::given(method("POST"))
        .and(path(format!("/bots/{}/stats", common::BOT_ID)))
        .respond_with(move |_req: &wiremock::Request| {
            counter.fetch_add(1, Ordering::SeqCst);
            ResponseTemplate::new(status)
        })
        .expect(1)
        .mount(server)
        .await;
}

/// Every request carries the bot token and the JSON body
#[tokio::test]
async fn test_success_sends_bot_authorization() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bots/1010/stats"))
        .and(header("Authorization", "Bot test-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(serde_json::json!({ "hello": "world" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = RetryingHttpClient::new(&common::test_config(&mock_server)).expect("client");
    let response = client
        .send(
            Method::POST,
            &stats(),
            Some(&serde_json::json!({ "hello": "world" })),
        )
        .await
        .expect("request succeeds");

    assert_eq!(response.status(), 200);
}

/// 401 fails fast with InvalidApiToken
#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let mock_server = MockServer::start().await;
    let counter = Arc::new(AtomicUsize::new(0));
    mount_status(&mock_server, 401, counter.clone()).await;

    let client = RetryingHttpClient::new(&common::test_config(&mock_server)).expect("client");
    let result = client.send::<()>(Method::POST, &stats(), None).await;

    assert!(matches!(result, Err(AnalyticsError::InvalidApiToken)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

/// 423 fails fast with SuspendedBot
#[tokio::test]
async fn test_locked_means_suspended_bot() {
    let mock_server = MockServer::start().await;
    let counter = Arc::new(AtomicUsize::new(0));
    mount_status(&mock_server, 423, counter.clone()).await;

    let client = RetryingHttpClient::new(&common::test_config(&mock_server)).expect("client");
    let result = client.send::<()>(Method::POST, &stats(), None).await;

    assert!(matches!(result, Err(AnalyticsError::SuspendedBot)));
}

/// Server errors are terminal for the call; the next flush is the retry
#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;
    let counter = Arc::new(AtomicUsize::new(0));
    mount_status(&mock_server, 503, counter.clone()).await;

    let client = RetryingHttpClient::new(&common::test_config(&mock_server)).expect("client");
    let result = client.send::<()>(Method::POST, &stats(), None).await;

    assert!(matches!(
        result,
        Err(AnalyticsError::InvalidResponse { status: 503 })
    ));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

/// 404 means an unknown key on event routes, and a plain bad response elsewhere
#[tokio::test]
async fn test_not_found_on_event_route() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = RetryingHttpClient::new(&common::test_config(&mock_server)).expect("client");

    let event = ApiEndpoint::Event {
        bot_id: common::BOT_ID.to_string(),
        key: "missing".to_string(),
    };
    let result = client.send::<()>(Method::GET, &event, None).await;
    assert!(matches!(result, Err(AnalyticsError::InvalidEventKey(key)) if key == "missing"));

    let settings = ApiEndpoint::BotSettings {
        bot_id: common::BOT_ID.to_string(),
    };
    let result = client.send::<()>(Method::GET, &settings, None).await;
    assert!(matches!(
        result,
        Err(AnalyticsError::InvalidResponse { status: 404 })
    ));
}

/// Connection failures are retried and end in MaxRetriesExceeded
#[tokio::test]
async fn test_transport_failure_exhausts_retries() {
    // Nothing listens on port 1.
    let config = AnalyticsConfig::new("test-key")
        .with_api_base("http://127.0.0.1:1")
        .with_retry(RetryConfig {
            max_retries: 2,
            backoff_base_ms: 1,
        });
    let client = RetryingHttpClient::new(&config).expect("client");

    let result = client.send::<()>(Method::POST, &stats(), None).await;

    assert!(matches!(result, Err(AnalyticsError::MaxRetriesExceeded(_))));
}

/// Timeouts count as transport failures; `max_retries` bounds the total attempts
#[tokio::test]
async fn test_timeouts_stop_after_max_retries_attempts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(400)))
        .mount(&mock_server)
        .await;

    let mut config = common::test_config(&mock_server).with_retry(RetryConfig {
        max_retries: 3,
        backoff_base_ms: 1,
    });
    config.request_timeout_ms = 50;
    let client = RetryingHttpClient::new(&config).expect("client");

    let result = client.send::<()>(Method::POST, &stats(), None).await;

    assert!(matches!(result, Err(AnalyticsError::MaxRetriesExceeded(_))));
    let attempts = mock_server
        .received_requests()
        .await
        .unwrap_or_default()
        .len();
    assert_eq!(attempts, 3);
}
