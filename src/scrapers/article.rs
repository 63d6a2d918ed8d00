//! Single-page and batch article scraping.
//!
//! Ties the [`Fetcher`] to the content and metadata extractors:
//!
//! 1. Validate the URL (absolute http/https)
//! 2. Fetch with retries
//! 3. Reject non-HTML responses
//! 4. Extract title, content, author and image
//!
//! Batch scraping fans every URL out as its own future and joins them; one
//! failing URL never affects the others and results keep input order.

use super::{content, metadata};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, Transport};
use crate::models::{ScrapeOutcome, ScrapedArticle};
use crate::utils::{parse_http_url, truncate_for_log};
use chrono::Utc;
use futures::future::join_all;
use scraper::Html;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Fetch and extract one article page.
///
/// # Arguments
/// * `fetcher` - Shared fetcher with its retry policy
/// * `raw_url` - Must parse as an absolute http(s) URL
///
/// # Returns
/// The extracted article, or [`Error::InvalidInput`] for a bad URL or a
/// non-HTML response, and [`Error::NoContentExtracted`] when no text
/// survives extraction.
#[instrument(level = "info", skip_all, fields(url = %raw_url))]
pub async fn scrape_article<T: Transport>(fetcher: &Fetcher<T>, raw_url: &str) -> Result<ScrapedArticle> {
    let url = parse_http_url(raw_url)?;
    let page = fetcher.fetch(&url).await?;
    info!(status = page.status, "Received response");

    if !page.is_html() {
        warn!(content_type = ?page.content_type, "Not an HTML page");
        return Err(Error::InvalidInput(
            "The URL does not appear to be an HTML page".to_string(),
        ));
    }

    let article = parse_article(&page.body, &url)?;
    info!(
        title = %truncate_for_log(&article.title, 60),
        chars = article.content.chars().count(),
        "Successfully scraped article"
    );
    Ok(article)
}

/// Extract a [`ScrapedArticle`] from HTML already in hand.
pub fn parse_article(html: &str, url: &Url) -> Result<ScrapedArticle> {
    let document = Html::parse_document(html);

    let title = metadata::extract_title(&document);
    let author = metadata::extract_author(&document);
    let image = metadata::extract_image(&document, url);
    let content = content::extract_content(&document);

    if content.is_empty() {
        return Err(Error::NoContentExtracted(format!(
            "No content could be extracted from {url}"
        )));
    }

    let article = ScrapedArticle {
        title,
        content,
        author,
        image,
        source_url: url.to_string(),
        scraped_at: Utc::now(),
    };
    if article.is_suspect() {
        warn!(%url, chars = article.content.chars().count(), "Extracted content seems too short");
    }
    Ok(article)
}

/// Scrape many URLs concurrently. Output order matches `urls`.
#[instrument(level = "info", skip_all, fields(count = urls.len()))]
pub async fn scrape_many<T: Transport>(fetcher: &Fetcher<T>, urls: &[String]) -> Vec<ScrapeOutcome> {
    let outcomes = join_all(urls.iter().map(|url| async move {
        match scrape_article(fetcher, url).await {
            Ok(article) => ScrapeOutcome::ok(url.as_str(), article),
            Err(e) => {
                error!(%url, error = %e, "Scrape failed");
                ScrapeOutcome::failed(url.as_str(), format!("Failed to scrape article: {e}"))
            }
        }
    }))
    .await;

    let ok = outcomes.iter().filter(|o| o.success).count();
    info!(ok, failed = outcomes.len() - ok, "Batch scrape finished");
    outcomes
}

/// Main text of a related page, for use as LLM context.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn scrape_reference_text<T: Transport>(
    fetcher: &Fetcher<T>,
    url: &Url,
    timeout: Duration,
) -> Result<String> {
    let page = fetcher.fetch_with_timeout(url, timeout).await?;
    let text = content::extract_content(&Html::parse_document(&page.body));
    Ok(text)
}
