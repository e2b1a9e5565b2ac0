//! Pagination driver for a single query and date window.
use linkrank_social::crowdtangle::{FetchError, Page, Post, PostSource, SearchRequest};
use std::time::Duration;
use tokio::time::sleep;

use crate::window::QueryWindow;

/// What to do when the API answers "rate limited".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed pause before retrying the same URL.
    pub delay: Duration,
    /// Consecutive rate-limited answers tolerated per URL; `None` waits indefinitely.
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

/// Posts (and pages, when requested) gathered for one window, in API order.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub posts: Vec<Post>,
    pub pages: Vec<Page>,
}

pub struct WindowCollector<'a, S: ?Sized> {
    source: &'a S,
    retry: RetryPolicy,
}

impl<'a, S: PostSource + ?Sized> WindowCollector<'a, S> {
    pub fn new(source: &'a S, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Follow result pages for `search_term` until the cursor runs out, the window's
    /// fetch cap is reached, or the API returns something unusable.
    ///
    /// Failures never escape: whatever was gathered before the failure is returned.
    pub async fn collect(
        &self,
        search_term: &str,
        domains: &[String],
        window: &QueryWindow,
    ) -> Collected {
        let cap = window.fetch_cap();
        let mut out = Collected::default();

        let request = SearchRequest {
            search_term,
            start_date: window.start_date,
            end_date: window.end_date,
        };
        let mut next = match self.source.search_url(&request) {
            Ok(url) => Some(url),
            Err(err) => {
                tracing::warn!(error = %err, search_term, "collector.search_url.failed");
                return out;
            }
        };

        let mut rate_limited = 0u32;
        while let Some(url) = next.take() {
            if out.posts.len() >= cap {
                tracing::debug!(collected = out.posts.len(), cap, "collector.cap_reached");
                break;
            }

            tracing::info!(url = %linkrank_http::redacted_url(&url), "Querying URL");
            match self
                .source
                .fetch_page(&url, domains, window.include_pages)
                .await
            {
                Ok(page) => {
                    rate_limited = 0;
                    out.posts.extend(page.posts);
                    if window.include_pages {
                        out.pages.extend(page.pages);
                    }
                    next = page.next_page;
                }
                Err(FetchError::RateLimited) => {
                    rate_limited += 1;
                    if self.retry.max_retries.is_some_and(|max| rate_limited > max) {
                        tracing::warn!(
                            attempts = rate_limited,
                            collected = out.posts.len(),
                            "collector.rate_limit.gave_up"
                        );
                        break;
                    }
                    tracing::warn!(
                        delay_secs = self.retry.delay.as_secs(),
                        attempt = rate_limited,
                        "Hit rate limit, sleeping before retrying the same page"
                    );
                    sleep(self.retry.delay).await;
                    next = Some(url);
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        collected = out.posts.len(),
                        "collector.window_ended_early"
                    );
                    break;
                }
            }
        }

        out
    }
}
