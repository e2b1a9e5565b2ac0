//! Normalization of raw `posts/search` records into output rows.
//!
//! A [`Post`] carries the first of its links that points at a tracked domain, plus an
//! aggregate engagement score. A [`Page`] is the publishing account. Free-text fields are
//! flattened onto one line so the rows stay valid in tab-separated output.
use serde::Serialize;

use crate::crowdtangle::types::{Account, RawPost, Statistics};

/// Output column order for posts; matches the field order of [`Post`].
pub const POST_COLUMNS: [&str; 14] = [
    "id",
    "platformId",
    "platform",
    "date",
    "type",
    "message",
    "description",
    "link",
    "domain",
    "postUrl",
    "score",
    "subscriberCount",
    "engagement",
    "page_id",
];

/// Output column order for pages; matches the field order of [`Page`].
pub const PAGE_COLUMNS: [&str; 13] = [
    "id",
    "platformId",
    "name",
    "handle",
    "subscriberCount",
    "url",
    "platform",
    "accountType",
    "pageAdminTopCountry",
    "pageDescription",
    "pageCreatedDate",
    "pageCategory",
    "verified",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub platform_id: Option<String>,
    pub platform: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
    pub description: Option<String>,
    /// Resolved link: always on one of the tracked domains when present.
    pub link: Option<String>,
    pub domain: Option<String>,
    pub post_url: Option<String>,
    pub score: Option<f64>,
    pub subscriber_count: Option<u64>,
    pub engagement: u64,
    #[serde(rename = "page_id")]
    pub page_id: Option<String>,
}

impl Post {
    /// Link posts are the only content type that survives ranking.
    pub fn is_link(&self) -> bool {
        self.kind.as_deref() == Some("link")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub platform_id: Option<String>,
    pub name: Option<String>,
    pub handle: Option<String>,
    pub subscriber_count: Option<u64>,
    pub url: Option<String>,
    pub platform: Option<String>,
    pub account_type: Option<String>,
    pub page_admin_top_country: Option<String>,
    pub page_description: Option<String>,
    pub page_created_date: Option<String>,
    pub page_category: Option<String>,
    pub verified: Option<bool>,
}

/// First tracked domain (in `domains` order) that occurs anywhere in `link`.
///
/// ```
/// use linkrank_social::crowdtangle::extract::match_domain;
///
/// let domains = vec!["nytimes.com".to_string(), "cnn.com".to_string()];
/// assert_eq!(match_domain("https://www.nytimes.com/a", &domains), Some("nytimes.com"));
/// assert_eq!(match_domain("https://example.org/", &domains), None);
/// ```
pub fn match_domain<'a>(link: &str, domains: &'a [String]) -> Option<&'a str> {
    domains
        .iter()
        .map(String::as_str)
        .find(|d| !d.is_empty() && link.contains(d))
}

/// Sum of every numeric reaction count; a missing breakdown counts as zero.
pub fn engagement(stats: Option<&Statistics>) -> u64 {
    stats
        .map(|s| {
            s.actual
                .values()
                .filter_map(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
                .sum()
        })
        .unwrap_or(0)
}

/// Replace line breaks and tabs with single spaces.
pub fn sanitize(s: &str) -> String {
    s.replace(['\n', '\r', '\t'], " ")
}

fn clean(field: &Option<String>) -> Option<String> {
    field.as_deref().map(sanitize)
}

/// Candidate links in priority order: the direct link, then expanded links.
fn candidate_links(raw: &RawPost) -> impl Iterator<Item = &str> {
    raw.link
        .as_deref()
        .filter(|l| !l.is_empty())
        .into_iter()
        .chain(raw.expanded_links.iter().filter_map(|l| l.expanded.as_deref()))
}

/// Resolve the first candidate link on a tracked domain.
pub fn resolve_link<'a>(raw: &RawPost, domains: &'a [String]) -> Option<(String, &'a str)> {
    candidate_links(raw).find_map(|link| match_domain(link, domains).map(|d| (link.to_string(), d)))
}

pub fn extract_page(account: &Account) -> Page {
    Page {
        id: account.id.clone(),
        platform_id: clean(&account.platform_id),
        name: clean(&account.name),
        handle: clean(&account.handle),
        subscriber_count: account.subscriber_count,
        url: clean(&account.url),
        platform: clean(&account.platform),
        account_type: clean(&account.account_type),
        page_admin_top_country: clean(&account.page_admin_top_country),
        page_description: clean(&account.page_description),
        page_created_date: clean(&account.page_created_date),
        page_category: clean(&account.page_category),
        verified: account.verified,
    }
}

/// Map one raw post (and, when requested, its account) into output rows.
///
/// The page is `None` when it was not requested or the post has no account.
pub fn extract_post(raw: &RawPost, domains: &[String], include_page: bool) -> (Post, Option<Page>) {
    let (link, domain) = match resolve_link(raw, domains) {
        Some((link, domain)) => (Some(link), Some(domain.to_string())),
        None => (None, None),
    };

    let post = Post {
        id: raw.id.clone(),
        platform_id: raw.platform_id.clone(),
        platform: raw.platform.clone(),
        date: raw.date.clone(),
        kind: raw.kind.clone(),
        message: clean(&raw.message),
        description: clean(&raw.description),
        link,
        domain,
        post_url: raw.post_url.clone(),
        score: raw.score,
        subscriber_count: raw.subscriber_count,
        engagement: engagement(raw.statistics.as_ref()),
        page_id: raw.account.as_ref().map(|a| a.id.clone()),
    };

    let page = if include_page {
        raw.account.as_ref().map(extract_page)
    } else {
        None
    };

    (post, page)
}
