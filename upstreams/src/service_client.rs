//! Shared request plumbing for the external services: URL building, bearer
//! auth, and bounded retries with exponential backoff.

use crate::config::ServiceConfig;
use crate::errors::UpstreamError;
use crate::metrics_defs::{UPSTREAM_REQUEST_DURATION, UPSTREAM_RETRIES};
use reqwest::{RequestBuilder, Response, StatusCode};
use shared::{counter, histogram};
use std::time::Instant;
use tokio::time::{Duration, sleep};
use url::Url;

const RETRIABLE_STATUS_CODES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,     // 429
    StatusCode::INTERNAL_SERVER_ERROR, // 500
    StatusCode::BAD_GATEWAY,           // 502
    StatusCode::SERVICE_UNAVAILABLE,   // 503
    StatusCode::GATEWAY_TIMEOUT,       // 504
];

#[derive(Clone)]
pub struct ServiceClient {
    service: &'static str,
    client: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
    max_retries: u32,
    base_delay_ms: u64,
}

impl ServiceClient {
    pub fn new(
        service: &'static str,
        config: &ServiceConfig,
        bearer_token: Option<String>,
    ) -> Result<Self, UpstreamError> {
        if config.url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(config.url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|source| UpstreamError::Request { service, source })?;

        Ok(ServiceClient {
            service,
            client,
            base_url: config.url.clone(),
            bearer_token,
            max_retries: config.max_retries,
            base_delay_ms: config.retry_base_delay_ms,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// The base URL with `segments` appended as percent-encoded path segments.
    pub fn url(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends the request built by `build`, retrying retriable statuses.
    /// A 404 becomes `UpstreamError::NotFound` for `id`.
    pub async fn send<F>(&self, id: &str, build: F) -> Result<Response, UpstreamError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut retries = 0;

        loop {
            let mut request = build(&self.client);
            if let Some(token) = &self.bearer_token {
                request = request.bearer_auth(token);
            }

            let started = Instant::now();
            let response = request.send().await.map_err(|source| UpstreamError::Request {
                service: self.service,
                source,
            })?;
            histogram!(UPSTREAM_REQUEST_DURATION, "service" => self.service)
                .record(started.elapsed().as_secs_f64());

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status == StatusCode::NOT_FOUND {
                return Err(UpstreamError::not_found(self.service, id));
            }
            if !RETRIABLE_STATUS_CODES.contains(&status) {
                return Err(UpstreamError::Status {
                    service: self.service,
                    status,
                });
            }
            if retries >= self.max_retries {
                return Err(UpstreamError::RetriesExceeded {
                    service: self.service,
                    attempts: retries + 1,
                });
            }

            let retry_millis = backoff_millis(self.base_delay_ms, retries);
            tracing::warn!(
                service = self.service,
                %status,
                retry_millis,
                "retrying upstream request"
            );
            counter!(UPSTREAM_RETRIES, "service" => self.service).increment(1);
            sleep(Duration::from_millis(retry_millis)).await;
            retries += 1;
        }
    }

    pub async fn json<T: serde::de::DeserializeOwned>(
        &self,
        response: Response,
    ) -> Result<T, UpstreamError> {
        response
            .json::<T>()
            .await
            .map_err(|source| UpstreamError::Request {
                service: self.service,
                source,
            })
    }
}

/// Doubles per retry, saturating instead of overflowing on large retry counts.
fn backoff_millis(base_delay_ms: u64, retries: u32) -> u64 {
    base_delay_ms.saturating_mul(2_u64.saturating_pow(retries))
}
