//! Minimal JSON-over-HTTP client with safe logging.
//!
//! - One request per call; retry policy belongs to callers
//! - Absolute URLs (pagination cursors) are accepted as-is, relative paths join the base
//! - Secret query params (`token`, `api_key`, ...) are redacted in every log line
//! - Optional raw response logging via `LINKRANK_HTTP_RAW=1` (target `http.raw`)
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), linkrank_http::HttpError> {
//! let client = linkrank_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", linkrank_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;

pub use reqwest::{StatusCode, Url};

const RAW_ENV: &str = "LINKRANK_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;

const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}")]
    Api { status: StatusCode, message: String },
}

/// Per-request knobs.
///
/// ```
/// use linkrank_http::RequestOpts;
///
/// assert!(!RequestOpts::default().allow_absolute);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestOpts {
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    /// `None` leaves the request timeout to reqwest's defaults.
    pub default_timeout: Option<Duration>,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```
    /// use linkrank_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert!(client.default_timeout.is_none());
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: None,
        })
    }

    pub fn with_timeout(mut self, dur: Option<Duration>) -> Self {
        self.default_timeout = dur;
        self
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    /// GET `path` once and decode the JSON body of a 2xx response.
    ///
    /// Non-2xx responses become [`HttpError::Api`] carrying the status and the best
    /// error message found in the body.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let url = self.resolve(path, opts.allow_absolute)?;
        let mut rb = self.inner.get(url.clone());

        let timeout = self.default_timeout;
        if let Some(t) = timeout {
            rb = rb.timeout(t);
        }

        let (host_path, redacted_q) = redact_query(&url);
        tracing::debug!(
            host_path=%host_path,
            query=?redacted_q,
            timeout_ms=?timeout.map(|t| t.as_millis() as u64),
            "http.request.start"
        );

        let t0 = Instant::now();
        let resp = rb.send().await.map_err(|err| {
            tracing::warn!(host_path=%host_path, message=%err, "http.network_error.send");
            HttpError::Network(err.to_string())
        })?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.bytes().await.map_err(|err| {
            tracing::warn!(host_path=%host_path, message=%err, "http.network_error.body");
            HttpError::Network(err.to_string())
        })?;
        let dur_ms = t0.elapsed().as_millis() as u64;

        tracing::debug!(
            %status,
            duration_ms=dur_ms,
            body_len=bytes.len(),
            "http.response.headers"
        );

        if raw_enabled() {
            let end = bytes.len().min(RAW_MAX_BODY);
            let text = String::from_utf8_lossy(&bytes[..end]);
            tracing::info!(
                target: "http.raw",
                %status,
                duration_ms=dur_ms,
                content_length=content_len(&headers, bytes.len()),
                body=%text,
                truncated=bytes.len() > RAW_MAX_BODY
            );
        }

        let snippet = snip_body(&bytes);

        if status.is_success() {
            return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                tracing::warn!(
                    serde_line=%e.line(),
                    serde_col=%e.column(),
                    serde_err=%e,
                    body_snippet=%snippet,
                    "http.response.decode_error"
                );
                HttpError::Decode(e.to_string(), snippet)
            });
        }

        let message = extract_error_message(&bytes);
        tracing::warn!(
            %status,
            message=%message,
            body_snippet=%snippet,
            "http.error"
        );
        Err(HttpError::Api { status, message })
    }
}

/// Render `url` for logs with secret query values replaced by `<redacted>`.
///
/// Unparseable input is not echoed back, since it may still contain a secret.
///
/// ```
/// let shown = linkrank_http::redacted_url(
///     "https://api.example.com/posts/search?token=s3cr3t&searchTerm=vote",
/// );
/// assert!(!shown.contains("s3cr3t"));
/// assert!(shown.contains("searchTerm=vote"));
/// assert_eq!(linkrank_http::redacted_url("not a url"), "<invalid url>");
/// ```
pub fn redacted_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "<invalid url>".to_string();
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| redact_pair(&k, &v))
        .collect();
    if pairs.is_empty() {
        return parsed.to_string();
    }
    let mut shown = parsed.clone();
    shown.query_pairs_mut().clear().extend_pairs(pairs);
    shown.to_string()
}

fn is_secret(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SECRET_PARAMS.contains(&lower.as_str())
}

fn redact_pair(k: &str, v: &str) -> (String, String) {
    let shown = if is_secret(k) { "<redacted>" } else { v };
    (k.to_string(), shown.to_string())
}

fn redact_query(url: &Url) -> (String, Vec<(String, String)>) {
    let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
    let redacted = url
        .query_pairs()
        .map(|(k, v)| redact_pair(&k, &v))
        .collect::<Vec<_>>();
    (host_path, redacted)
}

fn extract_error_message(body: &[u8]) -> String {
    // {"status":429,"message":"..."} or {"error":"..."}
    #[derive(Deserialize)]
    struct Msg {
        #[serde(default)]
        message: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(m) = serde_json::from_slice::<Msg>(body) {
        if !m.message.is_empty() {
            return m.message;
        }
        if !m.error.is_empty() {
            return m.error;
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > 500 {
        let mut cut = 500;
        while !snip.is_char_boundary(cut) {
            cut -= 1;
        }
        snip.truncate(cut);
        snip.push_str("...");
    }
    snip
}

fn content_len(headers: &HeaderMap, body_len: usize) -> usize {
    headers
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(body_len)
}
