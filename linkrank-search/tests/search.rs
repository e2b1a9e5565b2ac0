mod common;

use chrono::NaiveDate;
use common::{CatalogSource, init_test_tracing, link_post};
use linkrank_search::{MAX_DOMAINS_PER_QUERY, Phase, QueryWindow, RetryPolicy, search};
use linkrank_social::crowdtangle::Post;
use std::collections::{HashMap, HashSet};

fn window(domains: &[&str], count: usize) -> QueryWindow {
    QueryWindow::new(
        "election",
        domains.iter().map(|d| d.to_string()).collect(),
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 10, 8).unwrap(),
        count,
    )
    .unwrap()
}

fn engagements(posts: &[Post]) -> Vec<u64> {
    posts.iter().map(|p| p.engagement).collect()
}

fn per_domain(posts: &[Post]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for d in posts.iter().filter_map(|p| p.domain.clone()) {
        *counts.entry(d).or_default() += 1;
    }
    counts
}

#[tokio::test]
async fn single_domain_limit_stops_at_the_cap() {
    init_test_tracing();
    let catalog: Vec<Post> = (1..=10)
        .map(|i| link_post(&format!("c{i}"), "cnn.com", i * 10))
        .collect();
    let source = CatalogSource::new(catalog);

    let w = window(&["cnn.com"], 5).with_limit(Some(2));
    let outcome = search(&source, &w, RetryPolicy::default()).await;

    assert_eq!(engagements(&outcome.posts), vec![100, 90]);
    assert_eq!(outcome.phase, Some(Phase::Stalled));
    assert_eq!(source.terms().len(), 1);
}

#[tokio::test]
async fn requery_fills_target_from_unsaturated_domains() {
    init_test_tracing();
    let mut catalog = Vec::new();
    for (i, e) in [100, 99, 98, 97, 96].into_iter().enumerate() {
        catalog.push(link_post(&format!("a{i}"), "a.com", e));
    }
    for (i, e) in [50, 49, 48].into_iter().enumerate() {
        catalog.push(link_post(&format!("b{i}"), "b.com", e));
    }
    for (i, e) in [30, 29, 28].into_iter().enumerate() {
        catalog.push(link_post(&format!("c{i}"), "c.com", e));
    }
    let source = CatalogSource::new(catalog);

    let w = window(&["a.com", "b.com", "c.com"], 4).with_limit(Some(2));
    let outcome = search(&source, &w, RetryPolicy::default()).await;

    assert_eq!(outcome.phase, Some(Phase::Done));
    assert_eq!(engagements(&outcome.posts), vec![100, 99, 50, 49]);
    assert!(per_domain(&outcome.posts).values().all(|n| *n <= 2));

    let terms = source.terms();
    assert_eq!(terms.len(), 2);
    assert_eq!(terms[0], "(election) AND (a.com OR b.com OR c.com)");
    assert_eq!(terms[1], "(election) AND (b.com OR c.com)");
}

#[tokio::test]
async fn results_never_repeat_links_or_exceed_domain_cap() {
    init_test_tracing();
    let mut catalog = Vec::new();
    for d in ["a.com", "b.com", "c.com", "d.com"] {
        for i in 0..6u64 {
            catalog.push(link_post(&format!("{d}-{i}"), d, 1000 - i * 7 - d.len() as u64));
        }
    }
    // same story shared by two pages
    let mut repost = link_post("repost", "a.com", 2000);
    repost.link = Some("https://www.a.com/story/a.com-0".into());
    catalog.push(repost);
    let source = CatalogSource::new(catalog);

    let w = window(&["a.com", "b.com", "c.com", "d.com"], 8).with_limit(Some(3));
    let outcome = search(&source, &w, RetryPolicy::default()).await;

    assert!(outcome.posts.len() <= 8);
    assert!(per_domain(&outcome.posts).values().all(|n| *n <= 3));
    let links: HashSet<_> = outcome.posts.iter().filter_map(|p| p.link.clone()).collect();
    assert_eq!(links.len(), outcome.posts.len());
    let ids: HashSet<_> = outcome.posts.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids.len(), outcome.posts.len());

    let ranked = engagements(&outcome.posts);
    assert!(ranked.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn large_domain_lists_are_split_into_groups() {
    init_test_tracing();
    let domains: Vec<String> = (0..250).map(|i| format!("site{i}.com")).collect();
    let catalog: Vec<Post> = domains
        .iter()
        .enumerate()
        .map(|(i, d)| link_post(&format!("p{i}"), d, i as u64))
        .collect();
    let source = CatalogSource::new(catalog);

    let refs: Vec<&str> = domains.iter().map(String::as_str).collect();
    let w = window(&refs, 10);
    let outcome = search(&source, &w, RetryPolicy::default()).await;

    let terms = source.terms();
    assert_eq!(terms.len(), 3);
    assert_eq!(terms[0].matches(" OR ").count(), MAX_DOMAINS_PER_QUERY - 1);
    assert_eq!(terms[2].matches(" OR ").count(), 49);
    assert!(terms[2].contains("site249.com"));

    assert_eq!(outcome.phase, None);
    assert_eq!(outcome.posts.len(), 10);
    assert_eq!(outcome.posts[0].engagement, 249);
}

#[tokio::test]
async fn unlimited_search_paginates_and_ranks() {
    init_test_tracing();
    let catalog: Vec<Post> = (0..12)
        .map(|i| link_post(&format!("n{i}"), "nytimes.com", 5 + i))
        .collect();
    let source = CatalogSource::new(catalog).with_page_size(4);

    let w = window(&["nytimes.com"], 3).with_pages(true);
    let outcome = search(&source, &w, RetryPolicy::default()).await;

    // cap of 9 is crossed after the third page
    assert_eq!(source.fetches(), 3);
    assert_eq!(engagements(&outcome.posts), vec![16, 15, 14]);
    assert_eq!(outcome.pages.len(), 1);
    assert_eq!(outcome.pages[0].id, "page-nytimes.com");
}

#[tokio::test]
async fn empty_domain_list_returns_nothing() {
    init_test_tracing();
    let source = CatalogSource::new(vec![link_post("x", "cnn.com", 1)]);

    let balanced = search(&source, &window(&[], 5).with_limit(Some(2)), RetryPolicy::default()).await;
    assert!(balanced.posts.is_empty());
    assert_eq!(balanced.phase, Some(Phase::Stalled));

    let plain = search(&source, &window(&[], 5), RetryPolicy::default()).await;
    assert!(plain.posts.is_empty());
    assert_eq!(source.fetches(), 0);
}
