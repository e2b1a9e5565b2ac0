#![allow(dead_code)]

use async_trait::async_trait;
use linkrank_common::observability::{LogConfig, init_logging};
use linkrank_social::crowdtangle::{FetchError, FetchedPage, Page, Post, PostSource, SearchRequest};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, OnceLock};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "linkrank-tests",
            log_dir: Some(std::env::temp_dir().join("linkrank-tests")),
            emit_stderr: false,
            default_filter: "debug".to_string(),
            ..LogConfig::default()
        };
        init_logging(config).unwrap_or_default()
    });
}

pub fn link_post(id: &str, domain: &str, engagement: u64) -> Post {
    Post {
        id: id.into(),
        kind: Some("link".into()),
        link: Some(format!("https://www.{domain}/story/{id}")),
        domain: Some(domain.into()),
        engagement,
        page_id: Some(format!("page-{domain}")),
        ..Default::default()
    }
}

pub fn page(id: &str) -> Page {
    Page {
        id: id.into(),
        name: Some(id.to_uppercase()),
        ..Default::default()
    }
}

/// Replays canned answers per URL and records every URL it was asked for.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<String, VecDeque<Result<FetchedPage, FetchError>>>>,
    calls: Mutex<Vec<String>>,
}

pub const FIRST_URL: &str = "mock://search/first";

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, answer: Result<FetchedPage, FetchError>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(answer);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PostSource for ScriptedSource {
    fn search_url(&self, _req: &SearchRequest<'_>) -> Result<String, FetchError> {
        Ok(FIRST_URL.to_string())
    }

    async fn fetch_page(
        &self,
        url: &str,
        _domains: &[String],
        _include_pages: bool,
    ) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(FetchError::MalformedResponse {
                    status: None,
                    message: format!("no scripted answer for {url}"),
                })
            })
    }
}

pub fn answer(posts: Vec<Post>, next: Option<&str>) -> Result<FetchedPage, FetchError> {
    Ok(FetchedPage {
        posts,
        pages: Vec::new(),
        next_page: next.map(str::to_string),
    })
}

/// A fixed post catalog that answers any search by filtering on the requested domains,
/// highest engagement first, `page_size` posts per page.
pub struct CatalogSource {
    posts: Vec<Post>,
    page_size: usize,
    terms: Mutex<Vec<String>>,
    fetches: Mutex<usize>,
}

impl CatalogSource {
    pub fn new(mut posts: Vec<Post>) -> Self {
        posts.sort_by(|a, b| b.engagement.cmp(&a.engagement));
        Self {
            posts,
            page_size: 100,
            terms: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Search terms in the order they were issued.
    pub fn terms(&self) -> Vec<String> {
        self.terms.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl PostSource for CatalogSource {
    fn search_url(&self, req: &SearchRequest<'_>) -> Result<String, FetchError> {
        self.terms.lock().unwrap().push(req.search_term.to_string());
        Ok("catalog://search?offset=0".to_string())
    }

    async fn fetch_page(
        &self,
        url: &str,
        domains: &[String],
        include_pages: bool,
    ) -> Result<FetchedPage, FetchError> {
        *self.fetches.lock().unwrap() += 1;
        let offset: usize = url
            .rsplit('=')
            .next()
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        let matching: Vec<&Post> = self
            .posts
            .iter()
            .filter(|p| p.domain.as_ref().is_some_and(|d| domains.contains(d)))
            .collect();
        let posts: Vec<Post> = matching
            .iter()
            .skip(offset)
            .take(self.page_size)
            .map(|p| (*p).clone())
            .collect();
        let pages = if include_pages {
            let mut ids: Vec<String> = posts.iter().filter_map(|p| p.page_id.clone()).collect();
            let mut seen = HashSet::new();
            ids.retain(|id| seen.insert(id.clone()));
            ids.iter().map(|id| page(id)).collect()
        } else {
            Vec::new()
        };
        let next = offset + self.page_size;
        Ok(FetchedPage {
            posts,
            pages,
            next_page: (next < matching.len()).then(|| format!("catalog://search?offset={next}")),
        })
    }
}
