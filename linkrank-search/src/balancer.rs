//! Per-domain cap enforcement by repeated querying.
//!
//! Each round ranks the pool for the still-active domains, keeps at most `limit` posts
//! per domain, and retires every domain that filled its quota. The next round re-queries
//! only the remaining domains, so their lower-engagement posts get a chance to surface.
//! Rounds are bounded by the number of domains, since every requery retires at least one.
//!
//! The round logic is [`BalanceState::step`], a pure function of the previous state and
//! the new pool; [`DomainBalancer`] only feeds it batches.
use linkrank_social::crowdtangle::{Page, Post, PostSource};
use std::collections::{HashMap, HashSet};

use crate::SearchOutcome;
use crate::batcher::{Batch, DomainBatcher, pages_for_posts};
use crate::collector::RetryPolicy;
use crate::window::QueryWindow;

/// Where the balancing loop stands. Trimming happens inside [`BalanceState::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No pool has been examined yet.
    Collecting,
    /// Some domains were retired; query the rest again.
    Requery,
    /// The target count was reached.
    Done,
    /// No further progress is possible: the API ran dry or every domain was retired.
    Stalled,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Stalled)
    }
}

#[derive(Debug, Clone)]
pub struct BalanceState {
    pub phase: Phase,
    /// Domains still eligible for querying.
    pub domains: Vec<String>,
    /// Posts accepted so far, in acceptance order.
    pub accepted: Vec<Post>,
    /// Every page seen in any round, unique by id.
    pub pages: Vec<Page>,
    pub rounds: usize,
}

impl BalanceState {
    pub fn new(domains: Vec<String>, target: usize) -> Self {
        let phase = if target == 0 {
            Phase::Done
        } else if domains.is_empty() {
            Phase::Stalled
        } else {
            Phase::Collecting
        };
        Self {
            phase,
            domains,
            accepted: Vec::new(),
            pages: Vec::new(),
            rounds: 0,
        }
    }

    /// Fold one ranked pool into the state.
    pub fn step(self, batch: Batch, limit: usize, target: usize) -> Self {
        let Batch { posts: pool, pages } = batch;
        let mut next = self;
        next.rounds += 1;
        next.merge_pages(pages);

        let trimmed = trim_per_domain(&pool, limit);
        let saturated = saturated_domains(&pool, limit);

        if saturated.is_empty() {
            next.accept(trimmed, limit);
            next.phase = if next.accepted.len() >= target {
                Phase::Done
            } else {
                Phase::Stalled
            };
            tracing::info!(
                round = next.rounds,
                accepted = next.accepted.len(),
                "balancer.no_saturated_domains"
            );
            return next;
        }

        next.domains.retain(|d| !saturated.contains(d.as_str()));

        // One threshold for the whole round: the weakest post any saturated domain kept.
        let threshold = trimmed
            .iter()
            .filter(|p| p.domain.as_deref().is_some_and(|d| saturated.contains(d)))
            .map(|p| p.engagement)
            .min()
            .unwrap_or(0);
        let admitted = trimmed
            .into_iter()
            .filter(|p| p.engagement >= threshold)
            .collect();
        next.accept(admitted, limit);

        next.phase = if next.accepted.len() >= target {
            Phase::Done
        } else if pool.len() < target || next.domains.is_empty() {
            Phase::Stalled
        } else {
            Phase::Requery
        };

        tracing::info!(
            round = next.rounds,
            saturated = ?saturated,
            threshold,
            pool = pool.len(),
            accepted = next.accepted.len(),
            remaining_domains = next.domains.len(),
            phase = ?next.phase,
            "balancer.round"
        );
        next
    }

    /// Append posts that are new by id and by link and whose domain still has room.
    fn accept(&mut self, posts: Vec<Post>, limit: usize) {
        let mut ids: HashSet<String> = self.accepted.iter().map(|p| p.id.clone()).collect();
        let mut links: HashSet<String> =
            self.accepted.iter().filter_map(|p| p.link.clone()).collect();
        let mut per_domain: HashMap<String, usize> = HashMap::new();
        for d in self.accepted.iter().filter_map(|p| p.domain.clone()) {
            *per_domain.entry(d).or_default() += 1;
        }

        for post in posts {
            let Some(domain) = post.domain.clone() else {
                continue;
            };
            if ids.contains(&post.id) {
                continue;
            }
            if post.link.as_ref().is_some_and(|l| links.contains(l)) {
                continue;
            }
            let used = per_domain.entry(domain).or_default();
            if *used >= limit {
                continue;
            }
            *used += 1;
            ids.insert(post.id.clone());
            if let Some(link) = &post.link {
                links.insert(link.clone());
            }
            self.accepted.push(post);
        }
    }

    fn merge_pages(&mut self, pages: Vec<Page>) {
        let mut seen: HashSet<String> = self.pages.iter().map(|p| p.id.clone()).collect();
        for page in pages {
            if seen.insert(page.id.clone()) {
                self.pages.push(page);
            }
        }
    }

    /// Rank accepted posts, cut to `target` and keep only their pages.
    pub fn finish(self, target: usize) -> SearchOutcome {
        let mut posts = self.accepted;
        posts.sort_by(|a, b| b.engagement.cmp(&a.engagement));
        posts.truncate(target);
        let pages = pages_for_posts(self.pages, &posts);
        SearchOutcome {
            posts,
            pages,
            phase: Some(self.phase),
        }
    }
}

/// The first `limit` posts of each domain, preserving pool order.
pub fn trim_per_domain(pool: &[Post], limit: usize) -> Vec<Post> {
    let mut taken: HashMap<&str, usize> = HashMap::new();
    pool.iter()
        .filter(|p| match p.domain.as_deref() {
            Some(d) => {
                let n = taken.entry(d).or_default();
                *n += 1;
                *n <= limit
            }
            None => false,
        })
        .cloned()
        .collect()
}

/// Domains contributing at least `limit` posts to `pool`.
pub fn saturated_domains(pool: &[Post], limit: usize) -> HashSet<&str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for d in pool.iter().filter_map(|p| p.domain.as_deref()) {
        *counts.entry(d).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n >= limit)
        .map(|(d, _)| d)
        .collect()
}

pub struct DomainBalancer<'a, S: ?Sized> {
    batcher: DomainBatcher<'a, S>,
}

impl<'a, S: PostSource + ?Sized> DomainBalancer<'a, S> {
    pub fn new(source: &'a S, retry: RetryPolicy) -> Self {
        Self {
            batcher: DomainBatcher::new(source, retry),
        }
    }

    /// Run rounds until the target is met or no more progress is possible.
    pub async fn run(&self, window: &QueryWindow, limit: usize) -> SearchOutcome {
        let mut state = BalanceState::new(window.domains.clone(), window.count);

        while !state.phase.is_terminal() {
            let batch = self.batcher.collect(window, &state.domains).await;
            tracing::debug!(
                round = state.rounds + 1,
                domains = state.domains.len(),
                pool = batch.posts.len(),
                "balancer.pool"
            );
            state = state.step(batch, limit, window.count);
        }

        tracing::info!(
            rounds = state.rounds,
            accepted = state.accepted.len(),
            phase = ?state.phase,
            "balancer.finished"
        );
        state.finish(window.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, domain: &str, engagement: u64) -> Post {
        Post {
            id: id.into(),
            kind: Some("link".into()),
            link: Some(format!("https://{domain}/{id}")),
            domain: Some(domain.into()),
            engagement,
            ..Default::default()
        }
    }

    fn batch(posts: Vec<Post>) -> Batch {
        Batch {
            posts,
            pages: Vec::new(),
        }
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn trim_keeps_head_of_each_domain() {
        let pool = vec![
            post("a1", "a.com", 9),
            post("b1", "b.com", 8),
            post("a2", "a.com", 7),
            post("a3", "a.com", 6),
            post("b2", "b.com", 5),
        ];
        assert_eq!(ids(&trim_per_domain(&pool, 2)), vec!["a1", "b1", "a2", "b2"]);

        let sat = saturated_domains(&pool, 3);
        assert_eq!(sat.len(), 1);
        assert!(sat.contains("a.com"));
    }

    #[test]
    fn unsaturated_round_accepts_everything_and_stops() {
        let state = BalanceState::new(vec!["a.com".into(), "b.com".into()], 4);
        let next = state.step(
            batch(vec![post("a1", "a.com", 9), post("b1", "b.com", 8)]),
            2,
            4,
        );
        assert_eq!(next.phase, Phase::Stalled);
        assert_eq!(ids(&next.accepted), vec!["a1", "b1"]);
    }

    #[test]
    fn saturated_domain_is_retired_and_threshold_applied() {
        let state = BalanceState::new(vec!["a.com".into(), "b.com".into()], 4);
        let pool = vec![
            post("a1", "a.com", 90),
            post("a2", "a.com", 80),
            post("b1", "b.com", 70),
            post("a3", "a.com", 60),
        ];
        let next = state.step(batch(pool), 2, 4);

        assert_eq!(next.domains, vec!["b.com".to_string()]);
        // b1 sits below a2 (the weakest kept a.com post) and must wait for the next round.
        assert_eq!(ids(&next.accepted), vec!["a1", "a2"]);
        assert_eq!(next.phase, Phase::Requery);
    }

    #[test]
    fn global_minimum_is_used_when_several_domains_saturate() {
        let state = BalanceState::new(vec!["a.com".into(), "b.com".into(), "c.com".into()], 4);
        let pool = vec![
            post("a1", "a.com", 100),
            post("b1", "b.com", 95),
            post("c1", "c.com", 50),
            post("b2", "b.com", 40),
        ];
        let next = state.step(batch(pool), 1, 4);

        assert_eq!(next.domains, Vec::<String>::new());
        assert_eq!(ids(&next.accepted), vec!["a1", "b1", "c1"]);
        assert_eq!(next.phase, Phase::Stalled);
    }

    #[test]
    fn later_rounds_never_exceed_domain_cap_or_repeat_posts() {
        let state = BalanceState::new(vec!["a.com".into(), "b.com".into()], 3);
        let round1 = state.step(
            batch(vec![
                post("b1", "b.com", 90),
                post("a1", "a.com", 80),
                post("b2", "b.com", 70),
            ]),
            1,
            3,
        );
        assert_eq!(ids(&round1.accepted), vec!["b1", "a1"]);
        assert_eq!(round1.phase, Phase::Stalled);

        let mut carried = round1.clone();
        carried.phase = Phase::Requery;
        carried.domains = vec!["a.com".into()];
        let round2 = carried.step(
            batch(vec![post("a1", "a.com", 80), post("a2", "a.com", 75), post("a3", "a.com", 10)]),
            1,
            3,
        );
        assert_eq!(ids(&round2.accepted), vec!["b1", "a1"]);
    }

    #[test]
    fn reaching_target_is_done() {
        let state = BalanceState::new(vec!["a.com".into(), "b.com".into()], 2);
        let next = state.step(
            batch(vec![post("a1", "a.com", 10), post("b1", "b.com", 5)]),
            1,
            2,
        );
        assert_eq!(next.phase, Phase::Done);
        let outcome = next.finish(2);
        assert_eq!(ids(&outcome.posts), vec!["a1", "b1"]);
        assert_eq!(outcome.phase, Some(Phase::Done));
    }

    #[test]
    fn empty_domain_list_is_terminal_immediately() {
        let state = BalanceState::new(Vec::new(), 5);
        assert_eq!(state.phase, Phase::Stalled);
        let outcome = state.finish(5);
        assert!(outcome.posts.is_empty());
        assert!(outcome.pages.is_empty());
    }

    #[test]
    fn finish_keeps_only_pages_of_surviving_posts() {
        let mut state = BalanceState::new(vec!["a.com".into()], 1);
        let mut top = post("a1", "a.com", 10);
        top.page_id = Some("p1".into());
        let mut low = post("a2", "a.com", 5);
        low.page_id = Some("p2".into());
        state.accepted = vec![low, top];
        state.pages = vec![
            Page { id: "p1".into(), ..Default::default() },
            Page { id: "p2".into(), ..Default::default() },
        ];

        let outcome = state.finish(1);
        assert_eq!(ids(&outcome.posts), vec!["a1"]);
        assert_eq!(outcome.pages.len(), 1);
        assert_eq!(outcome.pages[0].id, "p1");
    }
}
