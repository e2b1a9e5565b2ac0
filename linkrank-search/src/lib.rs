//! Top-engagement link posts for a set of news domains.
//!
//! Layers, bottom to top:
//! - [`collector`]: paginates one search term over one date window, sleeping on rate limits
//! - [`batcher`]: splits the domain list into OR-groups and ranks the merged results
//! - [`balancer`]: caps posts per domain by retiring saturated domains and re-querying
//!
//! [`search`] picks the balanced or unbalanced path depending on [`QueryWindow::limit`].
use linkrank_social::crowdtangle::{Page, Post, PostSource};

pub mod balancer;
pub mod batcher;
pub mod collector;
pub mod window;

pub use balancer::{BalanceState, DomainBalancer, Phase};
pub use batcher::{Batch, DomainBatcher, MAX_DOMAINS_PER_QUERY};
pub use collector::{Collected, RetryPolicy, WindowCollector};
pub use window::{FETCH_MULTIPLIER, QueryWindow};

/// Final ranked posts and the pages that own them.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub posts: Vec<Post>,
    pub pages: Vec<Page>,
    /// How balancing ended; `None` when no per-domain limit was set.
    pub phase: Option<Phase>,
}

/// Run one search end to end. Never fails: API trouble shortens the result instead.
pub async fn search<S: PostSource + ?Sized>(
    source: &S,
    window: &QueryWindow,
    retry: RetryPolicy,
) -> SearchOutcome {
    tracing::info!(
        query = %window.query,
        domains = window.domains.len(),
        start = %window.start_date,
        end = %window.end_date,
        count = window.count,
        limit = ?window.limit,
        "search.start"
    );

    let outcome = match window.limit {
        Some(limit) => DomainBalancer::new(source, retry).run(window, limit).await,
        None => {
            let batch = DomainBatcher::new(source, retry)
                .collect(window, &window.domains)
                .await;
            SearchOutcome {
                posts: batch.posts,
                pages: batch.pages,
                phase: None,
            }
        }
    };

    tracing::info!(
        posts = outcome.posts.len(),
        pages = outcome.pages.len(),
        "search.done"
    );
    outcome
}
