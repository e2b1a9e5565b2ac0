use chrono::NaiveDate;
use linkrank_common::{LinkrankError, Result};

/// Over-fetch factor applied per date window so filtering and dedup still leave enough posts.
pub const FETCH_MULTIPLIER: usize = 3;

/// Everything one invocation searches for. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryWindow {
    pub query: String,
    /// Tracked domains in caller order; order decides domain-group membership and match priority.
    pub domains: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Number of posts wanted in the final output.
    pub count: usize,
    /// Maximum posts per domain; `None` disables balancing.
    pub limit: Option<usize>,
    pub include_pages: bool,
}

impl QueryWindow {
    /// Validate the date range; an end before the start is a configuration error.
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use linkrank_search::QueryWindow;
    ///
    /// let start = NaiveDate::from_ymd_opt(2024, 10, 8).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
    /// assert!(QueryWindow::new("vote", vec![], start, end, 20).is_err());
    /// ```
    pub fn new(
        query: impl Into<String>,
        domains: Vec<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        count: usize,
    ) -> Result<Self> {
        if end_date < start_date {
            return Err(LinkrankError::Config(format!(
                "end date {end_date} is before start date {start_date}"
            )));
        }
        Ok(Self {
            query: query.into(),
            domains,
            start_date,
            end_date,
            count,
            limit: None,
            include_pages: false,
        })
    }

    /// A limit of zero is treated as no limit.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.filter(|l| *l > 0);
        self
    }

    pub fn with_pages(mut self, include_pages: bool) -> Self {
        self.include_pages = include_pages;
        self
    }

    /// Posts to gather per date window before pagination stops.
    pub fn fetch_cap(&self) -> usize {
        self.count.saturating_mul(FETCH_MULTIPLIER)
    }
}
