use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use clap::Parser;
use linkrank_common::{LinkrankError, Result};
use std::path::{Path, PathBuf};

/// Top-engagement link posts for a set of news domains.
#[derive(Parser, Debug)]
#[command(name = "linkrank", author, version, about)]
pub struct Cli {
    /// Window start, YYYY-MM-DD (default: a week before today)
    #[arg(short = 's', long = "start_date")]
    pub start_date: Option<NaiveDate>,

    /// Window end, YYYY-MM-DD (default: today)
    #[arg(short = 'e', long = "end_date")]
    pub end_date: Option<NaiveDate>,

    /// Boolean search expression, AND-ed with the domain list
    #[arg(short = 'q', long = "query", default_value = "")]
    pub query: String,

    /// Comma-separated domains
    #[arg(short = 'd', long = "domains")]
    pub domains: Option<String>,

    /// File with one domain per line
    #[arg(short = 'f', long = "domain_file")]
    pub domain_file: Option<PathBuf>,

    /// Post output path (default: posts_<query>_<timestamp>.tsv)
    #[arg(short = 'o', long = "output_file")]
    pub output_file: Option<PathBuf>,

    /// Also write page metadata
    #[arg(short = 'p', long = "include_page_info", default_value_t = false)]
    pub include_page_info: bool,

    /// Page output path (default: pages_<query>_<timestamp>.tsv)
    #[arg(short = 'r', long = "page_file")]
    pub page_file: Option<PathBuf>,

    /// Number of posts to return
    #[arg(short = 'c', long = "count", default_value_t = 20)]
    pub count: usize,

    /// Maximum posts per domain
    #[arg(short = 'l', long = "limit")]
    pub limit: Option<usize>,

    /// Configuration file; skipped when absent
    #[arg(long = "config", default_value = "linkrank.yaml")]
    pub config: PathBuf,
}

impl Cli {
    /// Resolve the date window against `today`.
    pub fn dates(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = self
            .start_date
            .unwrap_or_else(|| today.checked_sub_days(Days::new(7)).unwrap_or(today));
        let end = self.end_date.unwrap_or(today);
        (start, end)
    }

    /// `-d` domains followed by `-f` domains, blanks removed.
    pub fn domain_list(&self) -> Result<Vec<String>> {
        let mut domains: Vec<String> = self
            .domains
            .as_deref()
            .map(|raw| split_domains(raw.split(',')))
            .unwrap_or_default();
        if let Some(path) = &self.domain_file {
            domains.extend(read_domain_file(path)?);
        }
        Ok(domains)
    }

    pub fn post_path(&self, now: NaiveDateTime) -> PathBuf {
        self.output_file
            .clone()
            .unwrap_or_else(|| default_output("posts", &self.query, now))
    }

    pub fn page_path(&self, now: NaiveDateTime) -> PathBuf {
        self.page_file
            .clone()
            .unwrap_or_else(|| default_output("pages", &self.query, now))
    }
}

fn split_domains<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_domain_file(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| LinkrankError::io(path.display().to_string(), e))?;
    Ok(split_domains(raw.lines()))
}

fn default_output(kind: &str, query: &str, now: NaiveDateTime) -> PathBuf {
    PathBuf::from(format!(
        "{kind}_{query}_{}.tsv",
        now.format("%Y-%m-%d_%H:%M:%S")
    ))
}

pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
