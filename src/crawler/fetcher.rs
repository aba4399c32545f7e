//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the HTTP client with the configured user agent and headers
//! - Per-host concurrency and politeness through the [`HostScheduler`]
//! - Retry with backoff for transient failures
//! - Reporting requested and final URL so callers can spot redirects

use crate::config::{Config, CrawlerConfig, SiteConfig};
use crate::crawler::frontier::Stage;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::HostScheduler;
use crate::url::{extract_domain, normalize_url};
use crate::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9,en;q=0.8";
const MAX_REDIRECTS: usize = 10;

/// Who a request is made for, used in log fields
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub stage: Stage,

    /// Recipe id the request belongs to, if any
    pub owner: Option<String>,
}

impl FetchContext {
    pub fn new(stage: Stage) -> Self {
        Self { stage, owner: None }
    }

    pub fn owned_by(stage: Stage, owner: impl Into<String>) -> Self {
        Self {
            stage,
            owner: Some(owner.into()),
        }
    }
}

/// A successful response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub requested_url: Url,

    /// URL after following redirects
    pub final_url: Url,

    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// True if the server sent us somewhere other than the requested page
    pub fn was_redirected(&self) -> bool {
        match (
            normalize_url(self.requested_url.as_str()),
            normalize_url(self.final_url.as_str()),
        ) {
            (Ok(requested), Ok(landed)) => requested != landed,
            _ => self.requested_url != self.final_url,
        }
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// Builds an HTTP client with the site's user agent and default headers
pub fn build_http_client(site: &SiteConfig, crawler: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DEFAULT_ACCEPT));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE));

    Client::builder()
        .user_agent(site.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// HTTP fetcher shared by all workers
pub struct Fetcher {
    client: Client,
    scheduler: HostScheduler,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(client: Client, scheduler: HostScheduler, retry: RetryPolicy) -> Self {
        Self {
            client,
            scheduler,
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.site, &config.crawler)?;
        Ok(Self::new(
            client,
            HostScheduler::from_config(&config.crawler),
            RetryPolicy::with_budget(config.crawler.retry_budget),
        ))
    }

    /// Fetches a URL, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Timeout, connection error | Retry with backoff |
    /// | HTTP 5xx, HTTP 429 | Retry with backoff |
    /// | HTTP 404 and other 4xx | Immediate `Terminal` |
    /// | Body cut short, connection reset mid-body | Retry with backoff |
    /// | Redirect loop, > 10 hops | Immediate `TooManyRedirects` |
    /// | Retry budget used up | `Exhausted` with the attempt count |
    pub async fn fetch(
        &self,
        url: &Url,
        headers: HeaderMap,
        context: &FetchContext,
    ) -> Result<FetchedPage, FetchError> {
        let host = extract_domain(url).ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        let owner = context.owner.as_deref().unwrap_or("-");
        let mut attempt = 1;

        loop {
            match self.attempt(url, &host, &headers).await {
                Ok(page) => {
                    tracing::debug!(
                        url = %url,
                        stage = %context.stage,
                        recipe_id = owner,
                        attempt,
                        status = page.status,
                        "Fetched"
                    );
                    return Ok(page);
                }
                Err(err) if err.is_transient() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            url = %url,
                            stage = %context.stage,
                            recipe_id = owner,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Transient failure, retrying: {}",
                            err
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        return Err(FetchError::Exhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            last: err.to_string(),
                        });
                    }
                },
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt(&self, url: &Url, host: &str, headers: &HeaderMap) -> Result<FetchedPage, FetchError> {
        let _permit = self
            .scheduler
            .acquire(host)
            .await
            .ok_or_else(|| FetchError::Transient {
                url: url.to_string(),
                reason: "host slot unavailable".to_string(),
            })?;

        let response = self
            .client
            .get(url.clone())
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Transient {
                url: url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Terminal {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_body_error(url, e))?;

        Ok(FetchedPage {
            requested_url: url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        })
    }
}

/// Classifies an error raised while reading the response body
///
/// A body that stops short of its declared length is retried like a reset
/// connection. Only bodies that arrived but cannot be decoded are malformed.
fn classify_body_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Transient {
            url: url.to_string(),
            reason: "timed out reading body".to_string(),
        }
    } else if error.is_decode() {
        FetchError::Malformed {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        FetchError::Transient {
            url: url.to_string(),
            reason: format!("body cut short: {}", error),
        }
    }
}

/// Classifies an error raised before a response arrived
fn classify_send_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_redirect() {
        FetchError::TooManyRedirects {
            url: url.to_string(),
        }
    } else if error.is_builder() {
        FetchError::InvalidUrl(url.to_string())
    } else {
        let reason = if error.is_timeout() {
            "request timeout".to_string()
        } else if error.is_connect() {
            "connection failed".to_string()
        } else {
            error.to_string()
        };
        FetchError::Transient {
            url: url.to_string(),
            reason,
        }
    }
}
