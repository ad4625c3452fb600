use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::api::ParladataClient;
use crate::models::TranscriptPage;
use crate::stages::parse_transcript_html;

/// Read a saved transcript document into a page
pub fn read_transcript_file(path: &Path) -> Result<TranscriptPage> {
    let html =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let page = parse_transcript_html(&path.display().to_string(), &html);
    debug!(source = %page.source, lines = page.lines.len(), "Loaded transcript file");
    Ok(page)
}

/// Read the pages of one session, keeping the given order
pub fn read_transcript_files(paths: &[PathBuf]) -> Result<Vec<TranscriptPage>> {
    paths.iter().map(|path| read_transcript_file(path)).collect()
}

/// Download the pages of one session, one after another
pub async fn fetch_transcript_pages(
    client: &ParladataClient,
    urls: &[String],
) -> Result<Vec<TranscriptPage>> {
    let mut pages = Vec::with_capacity(urls.len());
    for url in urls {
        info!("Fetching {}", url);
        let html = client.fetch_page(url).await?;
        pages.push(parse_transcript_html(url, &html));
    }
    Ok(pages)
}
