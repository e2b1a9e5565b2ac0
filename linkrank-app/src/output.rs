use linkrank_common::{LinkrankError, Result};
use linkrank_social::crowdtangle::{PAGE_COLUMNS, POST_COLUMNS, Page, Post};
use serde::Serialize;
use std::fs::File;
use std::path::Path;

pub fn write_posts(path: &Path, posts: &[Post]) -> Result<()> {
    write_tsv(path, &POST_COLUMNS, posts)
}

pub fn write_pages(path: &Path, pages: &[Page]) -> Result<()> {
    write_tsv(path, &PAGE_COLUMNS, pages)
}

/// Header row, then one row per record in field order. An empty slice still yields the header.
fn write_tsv<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    let display = path.display().to_string();
    let file = File::create(path).map_err(|e| LinkrankError::io(display.clone(), e))?;
    let mut w = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);

    w.write_record(columns)
        .map_err(|e| LinkrankError::Output(format!("{display}: {e}")))?;
    for row in rows {
        w.serialize(row)
            .map_err(|e| LinkrankError::Output(format!("{display}: {e}")))?;
    }
    w.flush().map_err(|e| LinkrankError::io(display.clone(), e))?;

    tracing::info!(path = %path.display(), rows = rows.len(), "output.written");
    Ok(())
}
