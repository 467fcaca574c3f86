//! HTTP fetcher implementation
//!
//! This module performs the single proxied request for a crawl job:
//! - Building the HTTP client with the configured proxy, user agent, and referer
//! - An apparent-address probe before the real request (diagnostic only)
//! - GET requests without cookies, POST form submissions with the fixed cookie set
//! - Status-code and transport error classification

use crate::config::ClientConfig;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, REFERER};
use reqwest::{Client, Proxy};
use std::time::Duration;
use thiserror::Error;

/// Errors from a fetch operation
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Server returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("Request timed out")]
    Timeout,
}

/// HTTP request method for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One named fetch target, immutable once constructed
#[derive(Debug, Clone)]
pub struct Target {
    /// URL for GET, form action for POST
    pub url: String,

    pub method: Method,

    /// Form fields sent as the POST body; ignored for GET
    pub form_data: Vec<(String, String)>,

    /// Run identifier, used as the output directory name
    pub title: String,
}

/// Result of a successful fetch
#[derive(Debug)]
pub struct FetchResult {
    /// Response body, byte-for-byte
    pub body: Vec<u8>,

    /// Whether the Content-Type declared HTML
    pub is_html: bool,
}

/// Issues one proxied request per target
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    cookie_header: Option<HeaderValue>,
    probe_url: String,
}

impl HttpFetcher {
    /// Builds a fetcher from the client configuration
    ///
    /// All requests route through the configured proxy and carry the fixed
    /// User-Agent and Referer headers. The cookie set is held back until a
    /// POST request is issued.
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Successfully built fetcher
    /// * `Err(FetchError::Client)` - Invalid proxy URL or client build failure
    pub fn new(config: &ClientConfig) -> Result<Self, FetchError> {
        let proxy = Proxy::all(&config.proxy_url).map_err(FetchError::Client)?;

        let mut headers = HeaderMap::new();
        if let Ok(referer) = HeaderValue::from_str(&config.referer) {
            headers.insert(REFERER, referer);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .proxy(proxy)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(FetchError::Client)?;

        let cookie_header = build_cookie_header(config);

        Ok(HttpFetcher {
            client,
            cookie_header,
            probe_url: config.probe_url.clone(),
        })
    }

    /// Fetches the target through the proxy
    ///
    /// # Request Flow
    ///
    /// 1. Probe the echo endpoint for the apparent address (never fatal)
    /// 2. GET `target.url`, or POST `target.form_data` to it with the cookie set
    /// 3. Classify non-2xx statuses and transport failures
    ///
    /// # Returns
    ///
    /// * `Ok(FetchResult)` - 2xx response; body returned byte-for-byte
    /// * `Err(FetchError)` - Network failure, timeout, or non-2xx status
    pub async fn fetch(&self, target: &Target) -> Result<FetchResult, FetchError> {
        self.probe_apparent_address().await;

        let request = match target.method {
            Method::Get => self.client.get(&target.url),
            Method::Post => {
                let mut request = self.client.post(&target.url).form(&target.form_data);
                if let Some(cookie) = &self.cookie_header {
                    request = request.header(COOKIE, cookie.clone());
                }
                request
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(&target.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(&target.url, e))?
            .to_vec();

        Ok(FetchResult { body, is_html })
    }

    /// Reports the apparent address for this crawl via the echo endpoint
    ///
    /// Purely diagnostic; any failure is logged and swallowed.
    async fn probe_apparent_address(&self) {
        match self.client.get(&self.probe_url).send().await {
            Ok(response) => match response.text().await {
                Ok(address) => {
                    tracing::info!(address = %address.trim(), "apparent address for this crawl");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "apparent-address probe failed");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "apparent-address probe failed");
            }
        }
    }
}

/// Joins the configured cookies into a single Cookie header value
fn build_cookie_header(config: &ClientConfig) -> Option<HeaderValue> {
    if config.cookies.is_empty() {
        return None;
    }

    let joined = config
        .cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ");

    HeaderValue::from_str(&joined).ok()
}

/// Classifies a reqwest transport error into the fetch taxonomy
fn classify_transport_error(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}
