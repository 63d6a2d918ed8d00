//! Turning a URL into stored articles.
//!
//! A blog listing URL (`/blog`, `/blogs/page/2`, ...) is expanded into its
//! article links, of which the first `listing_limit` are scraped
//! concurrently. Any other URL is treated as a single article. URLs already
//! in the store are returned as they are, without fetching again.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, ReqwestTransport, Transport};
use crate::models::{Article, NewArticle};
use crate::scrapers::{discover_links, scrape_article};
use crate::store::ArticleStore;
use crate::utils::{is_listing_url, parse_http_url};
use futures::future::join_all;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

pub struct Ingestor<'a, S, T = ReqwestTransport> {
    store: &'a S,
    fetcher: &'a Fetcher<T>,
    listing_limit: usize,
}

impl<'a, S, T> Ingestor<'a, S, T>
where
    S: ArticleStore,
    T: Transport,
{
    /// Borrow the shared store and fetcher; only `listing_limit` is read from `config`.
    pub fn new(store: &'a S, fetcher: &'a Fetcher<T>, config: &AppConfig) -> Self {
        Self {
            store,
            fetcher,
            listing_limit: config.listing_limit,
        }
    }

    /// Scrape and store everything `raw_url` points at.
    ///
    /// # Arguments
    /// * `raw_url` - An article page, or a blog listing whose first
    ///   `listing_limit` links are scraped concurrently
    ///
    /// # Returns
    /// The stored articles. URLs already in the store are returned as they
    /// are, not scraped again. A listing where every article fails yields
    /// [`Error::NoContentExtracted`].
    #[instrument(level = "info", skip_all, fields(url = %raw_url))]
    pub async fn ingest(&self, raw_url: &str) -> Result<Vec<Article>> {
        let url = parse_http_url(raw_url)?;
        if is_listing_url(&url) {
            info!("Detected blog listing page");
            self.ingest_listing(&url).await
        } else {
            Ok(vec![self.ingest_page(&url).await?])
        }
    }

    async fn ingest_listing(&self, url: &Url) -> Result<Vec<Article>> {
        let links = discover_links(self.fetcher, url).await?;
        if links.is_empty() {
            return Err(Error::NoContentExtracted(
                "No article links found on the page".to_string(),
            ));
        }

        let selected: Vec<Url> = links.into_iter().take(self.listing_limit).collect();
        info!(count = selected.len(), "Scraping listing articles");

        let results = join_all(selected.iter().map(|link| self.ingest_page(link))).await;
        let stored: Vec<Article> = selected
            .iter()
            .zip(results)
            .filter_map(|(link, res)| match res {
                Ok(article) => Some(article),
                Err(e) => {
                    error!(%link, error = %e, "Failed to ingest listing article");
                    None
                }
            })
            .collect();

        if stored.is_empty() {
            return Err(Error::NoContentExtracted(
                "Failed to scrape any articles from the listing".to_string(),
            ));
        }
        info!(stored = stored.len(), "Listing ingested");
        Ok(stored)
    }

    async fn ingest_page(&self, url: &Url) -> Result<Article> {
        if let Some(existing) = self.store.find_by_url(url.as_str()).await? {
            debug!(%url, id = %existing.id, "Article already stored");
            return Ok(existing);
        }

        let scraped = scrape_article(self.fetcher, url.as_str()).await?;
        let new = NewArticle::from_scraped(&scraped, url.host_str().map(str::to_string));
        let lookup_url = new.url.clone().unwrap_or_else(|| url.to_string());

        match self.store.create(new).await {
            Ok(article) => {
                info!(id = %article.id, "Stored new article");
                Ok(article)
            }
            Err(Error::Duplicate(dup)) => {
                warn!(url = %dup, "Article stored concurrently; reusing existing record");
                self.store
                    .find_by_url(&lookup_url)
                    .await?
                    .ok_or(Error::Duplicate(dup))
            }
            Err(e) => Err(e),
        }
    }
}
