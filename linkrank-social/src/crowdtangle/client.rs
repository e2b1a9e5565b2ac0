//! Thin wrapper around the CrowdTangle `posts/search` endpoint.
//!
//! [`CrowdTangleApi`] builds the first-page URL for a search and fetches one page per
//! call, classifying failures into [`FetchError`] so the caller can decide whether to
//! wait, stop, or keep going. Nothing here retries.
use async_trait::async_trait;
use chrono::NaiveDate;
use linkrank_http::{HttpClient, HttpError, RequestOpts, StatusCode, Url};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

use crate::crowdtangle::extract::{Page, Post, extract_post};
use crate::crowdtangle::types::{RawPost, SearchEnvelope};

/// Results requested per call, independent of the caller's target count.
pub const PAGE_SIZE: u32 = 100;
pub const SORT_BY: &str = "total_interactions";

#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP or envelope status 429. Wait and retry the same URL.
    #[error("rate limited by the search API")]
    RateLimited,
    /// Any other non-200 status, a missing result payload, or an undecodable body.
    #[error("malformed response (status {status:?}): {message}")]
    MalformedResponse {
        status: Option<u16>,
        message: String,
    },
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid search URL: {0}")]
    InvalidUrl(String),
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Api { status, .. } if status == StatusCode::TOO_MANY_REQUESTS => {
                FetchError::RateLimited
            }
            HttpError::Api { status, message } => FetchError::MalformedResponse {
                status: Some(status.as_u16()),
                message,
            },
            HttpError::Decode(message, _) => FetchError::MalformedResponse {
                status: None,
                message,
            },
            HttpError::Network(message) => FetchError::Network(message),
            HttpError::Url(message) | HttpError::Build(message) => FetchError::InvalidUrl(message),
        }
    }
}

/// One page of normalized results.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub posts: Vec<Post>,
    /// Unique by id within this page; empty unless pages were requested.
    pub pages: Vec<Page>,
    /// Absolute URL of the next page, if the API has more.
    pub next_page: Option<String>,
}

/// Parameters for the first page of one search.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub search_term: &'a str,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Something that can answer paginated post searches.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Fully formed URL of the first result page for `req`.
    fn search_url(&self, req: &SearchRequest<'_>) -> Result<String, FetchError>;

    /// Fetch and normalize the page at `url`, resolving links against `domains`.
    async fn fetch_page(
        &self,
        url: &str,
        domains: &[String],
        include_pages: bool,
    ) -> Result<FetchedPage, FetchError>;
}

#[derive(Clone)]
pub struct CrowdTangleApi {
    http: HttpClient,
    endpoint: Url,
    token: String,
    platforms: String,
    language: String,
}

impl CrowdTangleApi {
    pub fn new(endpoint: &str, token: String) -> Result<Self, FetchError> {
        let http = HttpClient::new(endpoint)?;
        let endpoint = Url::parse(endpoint).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            http,
            endpoint,
            token,
            platforms: "facebook".into(),
            language: "en".into(),
        })
    }

    pub fn with_platforms(mut self, platforms: impl Into<String>) -> Self {
        self.platforms = platforms.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }
}

#[async_trait]
impl PostSource for CrowdTangleApi {
    fn search_url(&self, req: &SearchRequest<'_>) -> Result<String, FetchError> {
        let start = req.start_date.format("%Y-%m-%d").to_string();
        let end = req.end_date.format("%Y-%m-%d").to_string();
        let count = PAGE_SIZE.to_string();
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("token", &self.token)
            .append_pair("searchTerm", req.search_term)
            .append_pair("startDate", &start)
            .append_pair("endDate", &end)
            .append_pair("count", &count)
            .append_pair("language", &self.language)
            .append_pair("platforms", &self.platforms)
            .append_pair("sortBy", SORT_BY);
        Ok(url.to_string())
    }

    async fn fetch_page(
        &self,
        url: &str,
        domains: &[String],
        include_pages: bool,
    ) -> Result<FetchedPage, FetchError> {
        let envelope: SearchEnvelope = self
            .http
            .get_json(
                url,
                RequestOpts {
                    allow_absolute: true,
                },
            )
            .await?;

        parse_envelope(envelope, domains, include_pages)
    }
}

/// Turn a decoded envelope into a [`FetchedPage`], classifying application-level errors.
pub fn parse_envelope(
    envelope: SearchEnvelope,
    domains: &[String],
    include_pages: bool,
) -> Result<FetchedPage, FetchError> {
    if envelope.status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        return Err(FetchError::RateLimited);
    }
    let result = match envelope.result {
        Some(result) if envelope.status == 200 => result,
        Some(_) => {
            return Err(FetchError::MalformedResponse {
                status: Some(envelope.status),
                message: "non-200 status in response envelope".into(),
            });
        }
        None => {
            return Err(FetchError::MalformedResponse {
                status: Some(envelope.status),
                message: "response has no result payload".into(),
            });
        }
    };

    let mut page = FetchedPage {
        next_page: result.pagination.and_then(|p| p.next_page),
        ..Default::default()
    };
    let mut seen_pages = HashSet::new();

    for value in result.posts {
        let raw: RawPost = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "crowdtangle.post.decode_skipped");
                continue;
            }
        };
        let (post, account) = extract_post(&raw, domains, include_pages);
        page.posts.push(post);
        if let Some(account) = account {
            if seen_pages.insert(account.id.clone()) {
                page.pages.push(account);
            }
        }
    }

    tracing::debug!(
        posts = page.posts.len(),
        pages = page.pages.len(),
        has_next = page.next_page.is_some(),
        "crowdtangle.page.parsed"
    );
    Ok(page)
}
