//! HTTP transport used to talk to the portal.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::BackendConfig;
use crate::portal::ScrapeError;

/// A fixed set of request headers
pub type HeaderSet = &'static [(&'static str, &'static str)];

/// Headers sent with plain GETs and list requests
pub const FORM_HEADERS: HeaderSet = &[("content-type", "application/x-www-form-urlencoded")];

/// Headers of the search form submission
pub const SEARCH_HEADERS: HeaderSet = &[
    ("accept", "text/html"),
    ("cache-control", "no-cache"),
    ("content-type", "application/x-www-form-urlencoded"),
    ("upgrade-insecure-requests", "1"),
    ("Referer", "https://www.ejustice.just.fgov.be/cgi/rech.pl"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
];

/// Headers of the detail view request; the backend serves frames to browsers only
pub const ARTICLE_HEADERS: HeaderSet = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    ),
    (
        "accept-language",
        "nl-BE,nl;q=0.9,en-BE;q=0.8,en;q=0.7,nl-NL;q=0.6,en-US;q=0.5",
    ),
    ("cache-control", "no-cache"),
    ("content-type", "application/x-www-form-urlencoded"),
    ("pragma", "no-cache"),
    (
        "sec-ch-ua",
        "\"Google Chrome\";v=\"113\", \"Chromium\";v=\"113\", \"Not-A.Brand\";v=\"24\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"macOS\""),
    ("sec-fetch-dest", "frame"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-user", "?1"),
    ("upgrade-insecure-requests", "1"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
];

/// Issues GET and form POST requests and returns the response text.
///
/// `stage` names the pipeline step and ends up in errors and logs.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn get(
        &self,
        stage: &'static str,
        url: &str,
        headers: HeaderSet,
    ) -> Result<String, ScrapeError>;

    /// POST an already form-encoded body
    async fn post_form(
        &self,
        stage: &'static str,
        url: &str,
        headers: HeaderSet,
        body: String,
    ) -> Result<String, ScrapeError>;
}

/// Shared HTTP client with timeouts and request pacing
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpClient {
    /// Create a client with the default backend settings
    pub fn new() -> Result<Self, ScrapeError> {
        Self::from_config(&BackendConfig::default())
    }

    /// Create a client from backend settings
    pub fn from_config(config: &BackendConfig) -> Result<Self, ScrapeError> {
        let user_agent = config.user_agent.clone().unwrap_or_else(|| {
            concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
        });

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| ScrapeError::request("build_client", err))?;

        let limiter = NonZeroU32::new(config.requests_per_second)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self { client, limiter })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn send(
        &self,
        stage: &'static str,
        request: reqwest::RequestBuilder,
        headers: HeaderSet,
    ) -> Result<String, ScrapeError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let request = headers
            .iter()
            .fold(request, |req, (name, value)| req.header(*name, *value));

        let response = request
            .send()
            .await
            .map_err(|err| ScrapeError::request(stage, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                stage,
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|err| ScrapeError::request(stage, err))?;
        debug!(stage, bytes = text.len(), "response received");
        Ok(text)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get(
        &self,
        stage: &'static str,
        url: &str,
        headers: HeaderSet,
    ) -> Result<String, ScrapeError> {
        debug!(stage, url, "GET");
        self.send(stage, self.client.get(url), headers).await
    }

    async fn post_form(
        &self,
        stage: &'static str,
        url: &str,
        headers: HeaderSet,
        body: String,
    ) -> Result<String, ScrapeError> {
        debug!(stage, url, body_len = body.len(), "POST");
        self.send(stage, self.client.post(url).body(body), headers)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_defaults() {
        assert!(HttpClient::new().is_ok());
    }

    #[test]
    fn test_zero_rate_disables_limiter() {
        let config = BackendConfig {
            requests_per_second: 0,
            ..Default::default()
        };
        let client = HttpClient::from_config(&config).unwrap();
        assert!(client.limiter.is_none());
    }

    #[test]
    fn test_header_sets_are_form_encoded() {
        for set in [FORM_HEADERS, SEARCH_HEADERS, ARTICLE_HEADERS] {
            assert!(set
                .iter()
                .any(|(name, value)| name.eq_ignore_ascii_case("content-type")
                    && *value == "application/x-www-form-urlencoded"));
        }
    }
}
