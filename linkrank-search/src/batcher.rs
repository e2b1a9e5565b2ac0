//! Splits large domain lists into API-sized OR-groups and merges their results.
//!
//! The search API bounds how many OR-ed terms one query may carry, so domains are queried
//! in groups of [`MAX_DOMAINS_PER_QUERY`]. The union across groups is then reduced to a
//! single ranking: link posts only, one post per resolved link, highest engagement first.
use linkrank_social::crowdtangle::{Page, Post, PostSource};
use std::collections::HashSet;

use crate::collector::{RetryPolicy, WindowCollector};
use crate::window::QueryWindow;

pub const MAX_DOMAINS_PER_QUERY: usize = 100;

/// Ranked, deduplicated posts and the pages they reference.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub posts: Vec<Post>,
    pub pages: Vec<Page>,
}

/// `(query) AND (d1 OR d2 ...)`, or just the domain clause for a blank query.
///
/// ```
/// use linkrank_search::batcher::group_query;
///
/// let group = vec!["cnn.com".to_string(), "nytimes.com".to_string()];
/// assert_eq!(group_query("vote", &group), "(vote) AND (cnn.com OR nytimes.com)");
/// assert_eq!(group_query("  ", &group), "(cnn.com OR nytimes.com)");
/// ```
pub fn group_query(query: &str, group: &[String]) -> String {
    let domains = group.join(" OR ");
    if query.trim().is_empty() {
        format!("({domains})")
    } else {
        format!("({query}) AND ({domains})")
    }
}

/// Keep link posts on a tracked domain, drop repeated links, sort by engagement
/// (descending, stable) and cut to `target`.
pub fn rank_posts(posts: Vec<Post>, target: usize) -> Vec<Post> {
    let mut seen_links = HashSet::new();
    let mut ranked: Vec<Post> = posts
        .into_iter()
        .filter(|p| p.is_link() && p.domain.is_some())
        .filter(|p| match p.link.as_deref() {
            Some(link) => seen_links.insert(link.to_string()),
            None => false,
        })
        .collect();
    ranked.sort_by(|a, b| b.engagement.cmp(&a.engagement));
    ranked.truncate(target);
    ranked
}

/// Unique pages (first occurrence wins) that own at least one of `posts`.
pub fn pages_for_posts(pages: Vec<Page>, posts: &[Post]) -> Vec<Page> {
    let wanted: HashSet<&str> = posts.iter().filter_map(|p| p.page_id.as_deref()).collect();
    let mut seen = HashSet::new();
    pages
        .into_iter()
        .filter(|page| wanted.contains(page.id.as_str()) && seen.insert(page.id.clone()))
        .collect()
}

pub struct DomainBatcher<'a, S: ?Sized> {
    collector: WindowCollector<'a, S>,
}

impl<'a, S: PostSource + ?Sized> DomainBatcher<'a, S> {
    pub fn new(source: &'a S, retry: RetryPolicy) -> Self {
        Self {
            collector: WindowCollector::new(source, retry),
        }
    }

    /// Query every group of `domains` in order and rank the union.
    pub async fn collect(&self, window: &QueryWindow, domains: &[String]) -> Batch {
        let mut posts = Vec::new();
        let mut pages = Vec::new();

        for (idx, group) in domains.chunks(MAX_DOMAINS_PER_QUERY).enumerate() {
            let search_term = group_query(&window.query, group);
            tracing::debug!(group = idx, domains = group.len(), "batcher.group.start");
            let collected = self.collector.collect(&search_term, group, window).await;
            tracing::debug!(
                group = idx,
                posts = collected.posts.len(),
                pages = collected.pages.len(),
                "batcher.group.done"
            );
            posts.extend(collected.posts);
            pages.extend(collected.pages);
        }

        if posts.is_empty() {
            return Batch::default();
        }

        let gathered = posts.len();
        let posts = rank_posts(posts, window.count);
        let pages = pages_for_posts(pages, &posts);
        tracing::info!(
            gathered,
            ranked = posts.len(),
            pages = pages.len(),
            "batcher.ranked"
        );
        Batch { posts, pages }
    }
}
