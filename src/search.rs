//! Related-article search.
//!
//! [`SearchProvider`] is the seam the enhancement orchestrator depends on.
//! [`GoogleSearch`] queries the Google Custom Search JSON API and keeps only
//! results whose link plausibly points at a blog post or article.

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::models::Reference;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

pub trait SearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<Reference>>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Clone)]
pub struct GoogleSearch {
    client: Client,
    config: SearchConfig,
}

impl GoogleSearch {
    /// Credentials are checked per search, so a client without them can
    /// still be built.
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("cannot build search client: {e}")))?;
        Ok(Self { client, config })
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.config.api_key.as_deref(), self.config.cse_id.as_deref()) {
            (Some(key), Some(cx)) if !key.is_empty() && !cx.is_empty() => Ok((key, cx)),
            _ => Err(Error::Config(
                "GOOGLE_API_KEY and GOOGLE_CSE_ID must be set to search".to_string(),
            )),
        }
    }
}

/// Keep links that look like blog posts or articles, up to `max`.
pub fn filter_article_results(references: Vec<Reference>, max: usize) -> Vec<Reference> {
    references
        .into_iter()
        .filter(|r| {
            let link = r.link.to_ascii_lowercase();
            (link.starts_with("http://") || link.starts_with("https://"))
                && (link.contains("blog") || link.contains("article"))
        })
        .take(max)
        .collect()
}

fn classify_status(status: StatusCode, body: &str) -> Error {
    let message = format!("search API returned {status}: {}", body.trim());
    match status.as_u16() {
        401 | 403 => Error::Auth(message),
        429 => Error::RateLimited {
            message,
            retry_after: None,
        },
        s if s >= 500 => Error::ServerUnavailable {
            status: s,
            url: "customsearch".to_string(),
        },
        _ => Error::InvalidInput(message),
    }
}

impl SearchProvider for GoogleSearch {
    #[instrument(level = "info", skip_all, fields(%query))]
    async fn search(&self, query: &str) -> Result<Vec<Reference>> {
        let (key, cx) = self.credentials()?;
        let t0 = Instant::now();
        let num = self.config.num.to_string();

        let response = self
            .client
            .get(&self.config.api_base)
            .query(&[("key", key), ("cx", cx), ("q", query), ("num", num.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("search timed out: {e}"))
                } else {
                    Error::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Search request failed");
            return Err(classify_status(status, &body));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("invalid search response: {e}")))?;

        let raw: Vec<Reference> = parsed
            .items
            .into_iter()
            .filter_map(|item| {
                item.link.map(|link| Reference {
                    title: item.title,
                    link,
                    snippet: item.snippet,
                })
            })
            .collect();
        debug!(raw = raw.len(), "Raw search results");

        let kept = filter_article_results(raw, self.config.max_results);
        info!(
            count = kept.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Search finished"
        );
        Ok(kept)
    }
}
