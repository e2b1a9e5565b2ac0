use anyhow::{Context, Result};
use clap::Parser;
use linkrank_common::observability::init_logging;
use linkrank_config::{LinkrankConfig, LinkrankConfigLoader};
use linkrank_search::{QueryWindow, RetryPolicy, search};
use linkrank_social::crowdtangle::CrowdTangleApi;
use std::time::Duration;

use cli::Cli;
mod cli;
mod output;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Config: optional file, env wins
    let cfg: LinkrankConfig = LinkrankConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;

    init_logging(cfg.logging.to_log_config())?;

    // 2) Everything that can be rejected is checked before the first request
    let (start, end) = cli.dates(chrono::Local::now().date_naive());
    let window = QueryWindow::new(cli.query.clone(), cli.domain_list()?, start, end, cli.count)?
        .with_limit(cli.limit)
        .with_pages(cli.include_page_info);
    let token = cfg.crowdtangle.require_token()?;

    let api = CrowdTangleApi::new(&cfg.crowdtangle.endpoint, token.to_string())?
        .with_platforms(cfg.crowdtangle.platforms.as_str())
        .with_language(cfg.crowdtangle.language.as_str())
        .with_timeout(cfg.http.timeout_secs.map(Duration::from_secs));
    let retry = RetryPolicy {
        delay: cfg.crowdtangle.rate_limit.delay(),
        max_retries: cfg.crowdtangle.rate_limit.max_retries,
    };

    // 3) Search and write
    let outcome = search(&api, &window, retry).await;

    let now = cli::now();
    output::write_posts(&cli.post_path(now), &outcome.posts)?;
    if cli.include_page_info {
        output::write_pages(&cli.page_path(now), &outcome.pages)?;
    }

    tracing::info!(
        posts = outcome.posts.len(),
        pages = outcome.pages.len(),
        phase = ?outcome.phase,
        "linkrank.finished"
    );
    Ok(())
}
