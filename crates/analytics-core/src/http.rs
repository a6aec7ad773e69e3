use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{Jitter, RetryTransientMiddleware, Retryable, RetryableStrategy};
use serde::Serialize;

use crate::config::{AnalyticsConfig, RetryConfig};
use crate::error::{AnalyticsError, Result};

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Routes of the collection API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiEndpoint {
    /// `PATCH /bots/{id}`: identity registration.
    BotSettings { bot_id: String },
    /// `POST /bots/{id}/stats`: snapshot delivery.
    BotStats { bot_id: String },
    /// `GET /bots/{id}/events/{key}`: custom event lookup.
    Event { bot_id: String, key: String },
}

impl ApiEndpoint {
    pub fn path(&self) -> String {
        match self {
            Self::BotSettings { bot_id } => format!("/bots/{bot_id}"),
            Self::BotStats { bot_id } => format!("/bots/{bot_id}/stats"),
            Self::Event { bot_id, key } => format!("/bots/{bot_id}/events/{key}"),
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, Self::Event { .. })
    }
}

/// Retries only requests that never produced a response. A response with a
/// bad status is final for that call.
struct TransportOnlyStrategy;

impl RetryableStrategy for TransportOnlyStrategy {
    fn handle(
        &self,
        res: &std::result::Result<Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(_) => None,
            Err(e) => {
                warn!("analytics request failed, will retry: {}", e);
                Some(Retryable::Transient)
            }
        }
    }
}

/// HTTP client for the collection API with bounded retry on transport errors.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient {
    client: Arc<ClientWithMiddleware>,
    api_base: String,
    debug: bool,
}

impl RetryingHttpClient {
    pub fn new(config: &AnalyticsConfig) -> Result<Self> {
        let client = Client::builder()
            .default_headers(Self::default_headers(&config.api_key)?)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client: Arc::new(Self::build_retry_client(client, &config.retry)),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            debug: config.debug,
        })
    }

    fn build_retry_client(client: Client, retry: &RetryConfig) -> ClientWithMiddleware {
        // `max_retries` is the total number of attempts, the middleware counts
        // retries after the first one. Waits base * 2^n before attempt n + 1.
        let first_wait = retry.backoff_base() * 2;
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(first_wait, MAX_BACKOFF.max(first_wait))
            .jitter(Jitter::None)
            .base(2)
            .build_with_max_retries(retry.max_retries.saturating_sub(1));

        ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry_policy,
                TransportOnlyStrategy,
            ))
            .build()
    }

    fn default_headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&format!("Bot {api_key}")).map_err(|_| {
            AnalyticsError::InvalidConfig("api_key is not a valid header value".to_string())
        })?;
        headers.insert(AUTHORIZATION, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub fn url(&self, endpoint: &ApiEndpoint) -> String {
        format!("{}{}", self.api_base, endpoint.path())
    }

    /// Sends one logical request and classifies the outcome.
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &ApiEndpoint,
        body: Option<&T>,
    ) -> Result<Response> {
        let url = self.url(endpoint);
        if self.debug {
            debug!("[analytics] {} {}", method, url);
        }

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("analytics request {} {} gave up: {}", method, url, e);
            AnalyticsError::MaxRetriesExceeded(e)
        })?;

        let status = response.status();
        if self.debug {
            debug!("[analytics] {} {} -> {}", method, url, status);
        }
        Self::classify(status, endpoint)?;
        Ok(response)
    }

    fn classify(status: StatusCode, endpoint: &ApiEndpoint) -> Result<()> {
        if status.is_success() {
            return Ok(());
        }
        Err(match status {
            StatusCode::UNAUTHORIZED => AnalyticsError::InvalidApiToken,
            StatusCode::LOCKED => AnalyticsError::SuspendedBot,
            StatusCode::NOT_FOUND => match endpoint {
                ApiEndpoint::Event { key, .. } => AnalyticsError::InvalidEventKey(key.clone()),
                _ => AnalyticsError::InvalidResponse {
                    status: status.as_u16(),
                },
            },
            _ => AnalyticsError::InvalidResponse {
                status: status.as_u16(),
            },
        })
    }
}
