//! Enhancement orchestration.
//!
//! One run takes a stored article through
//! `pending | error | enhanced → processing → enhanced | error`:
//!
//! 1. Load the article (unknown id: [`Error::NotFound`], nothing persisted)
//! 2. Persist `processing`
//! 3. Search related pages by title; a failing search counts as no results
//! 4. Scrape the first [`MAX_REFERENCES`] results concurrently; failed or
//!    blank ones are dropped
//! 5. Build the prompt from the original text and the reference blocks
//! 6. Call the generator under the configured deadline
//! 7. Persist `enhanced` with the new text, or `error` with the message
//!
//! Whatever fails after step 1, the article never stays in `processing`.
//! [`Enhancer::enhance_many`] runs a batch one article at a time and reports
//! each outcome as an [`EnhancementReport`].
//! Two runs on the same id at once are not guarded against; callers must
//! serialize them.

use crate::api::{CompletionRequest, Generate, complete_with_deadline};
use crate::config::{AppConfig, GenerationConfig};
use crate::error::{Error, Result};
use crate::fetcher::{Fetcher, ReqwestTransport, Transport};
use crate::models::{Article, ArticleId, ArticleUpdate, EnhancementStatus, Reference};
use crate::scrapers::scrape_reference_text;
use crate::search::SearchProvider;
use crate::status::ArticleStatus;
use crate::store::ArticleStore;
use crate::utils::{truncate_chars, truncate_for_log};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// `last_error` is cut to this many characters.
pub const MAX_ERROR_LEN: usize = 500;

/// At most this many search results are scraped per run.
pub const MAX_REFERENCES: usize = 2;

pub const REFERENCE_SEPARATOR: &str = "\n\n---\n\n";

const PROMPT_HEADER: &str = "Enhance the following article while maintaining its core message and style.
Improve formatting, structure, and clarity. Add relevant subheadings where appropriate.

CRITICAL REQUIREMENT: At the very bottom of the enhanced article, you MUST add a \"References\" section.
List the reference articles provided below with their URLs if available.";

/// One reference as it appears in the prompt.
pub fn format_reference(link: &str, text: &str) -> String {
    format!("SOURCE URL: {link}\nCONTENT: {text}")
}

/// Prompt for one enhancement call. Without blocks the `REFERENCES:`
/// section is left out entirely.
pub fn build_prompt(original: &str, reference_blocks: &[String]) -> String {
    let mut prompt = String::with_capacity(original.len() + 512);
    prompt.push_str(PROMPT_HEADER);
    prompt.push_str("\n\nORIGINAL ARTICLE:\n");
    prompt.push_str(original);
    prompt.push_str("\n\n");
    if !reference_blocks.is_empty() {
        prompt.push_str("REFERENCES:\n");
        prompt.push_str(&reference_blocks.join(REFERENCE_SEPARATOR));
        prompt.push_str("\n\n");
    }
    prompt.push_str("ENHANCED ARTICLE:");
    prompt
}

/// Outcome of one article in a batch run, as printed by the CLI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementReport {
    pub id: ArticleId,
    pub title: String,
    pub url: Option<String>,
    #[serde(flatten)]
    pub status: EnhancementStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub enhanced_content: String,
}

impl From<&Article> for EnhancementReport {
    fn from(article: &Article) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            url: article.url.clone(),
            status: article.enhancement_status(),
            enhanced_content: article.enhanced_content.clone(),
        }
    }
}

/// Drives one article through search, reference scraping and generation.
///
/// All collaborators are borrowed; build them once at startup and share
/// them between runs.
pub struct Enhancer<'a, S, P, G, T = ReqwestTransport> {
    store: &'a S,
    search: &'a P,
    generator: &'a G,
    fetcher: &'a Fetcher<T>,
    generation: &'a GenerationConfig,
    reference_timeout: Duration,
}

impl<'a, S, P, G, T> Enhancer<'a, S, P, G, T>
where
    S: ArticleStore,
    P: SearchProvider,
    G: Generate,
    T: Transport,
{
    /// Create an enhancer over shared collaborators.
    ///
    /// # Arguments
    /// * `store` - Where articles are read and every status change is persisted
    /// * `search` - Finds related pages by title
    /// * `generator` - LLM backend for the rewrite
    /// * `fetcher` - Fetches reference pages
    /// * `config` - Supplies the generation settings, the deadline and the
    ///   per-reference timeout
    pub fn new(store: &'a S, search: &'a P, generator: &'a G, fetcher: &'a Fetcher<T>, config: &'a AppConfig) -> Self {
        Self {
            store,
            search,
            generator,
            fetcher,
            generation: &config.generation,
            reference_timeout: config.fetch.reference_timeout(),
        }
    }

    /// Enhance the article with this id. Articles already in `processing`
    /// are refused.
    ///
    /// # Returns
    /// The stored article in `enhanced` state. On failure the article is
    /// left in `error` with the message in `last_error`, and the error is
    /// returned unchanged; [`Error::http_status`] maps it for a caller.
    pub async fn enhance(&self, id: ArticleId) -> Result<Article> {
        self.run(id, false).await
    }

    /// Like [`Enhancer::enhance`], but also restarts an article left in
    /// `processing` by an interrupted run.
    pub async fn force_enhance(&self, id: ArticleId) -> Result<Article> {
        self.run(id, true).await
    }

    /// Enhance each id in order, one at a time. A failed article is logged
    /// and reported with its recorded error; the batch carries on.
    ///
    /// # Returns
    /// One report per id found in the store. Ids that vanished are skipped.
    /// Only a storage failure while re-reading aborts the batch.
    #[instrument(level = "info", skip_all, fields(count = ids.len(), force))]
    pub async fn enhance_many(&self, ids: &[ArticleId], force: bool) -> Result<Vec<EnhancementReport>> {
        let mut reports = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Err(e) = self.run(id, force).await {
                warn!(%id, status = e.http_status(), error = %e, "Article not enhanced");
            }
            match self.store.find_by_id(id).await? {
                Some(article) => reports.push(EnhancementReport::from(&article)),
                None => warn!(%id, "Article disappeared before it could be reported"),
            }
        }
        let enhanced = reports.iter().filter(|r| r.status.is_enhanced).count();
        info!(enhanced, failed = reports.len() - enhanced, "Batch finished");
        Ok(reports)
    }

    #[instrument(level = "info", skip_all, fields(%id, force))]
    async fn run(&self, id: ArticleId, force: bool) -> Result<Article> {
        let t0 = Instant::now();
        let article = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Article {id} not found")))?;

        if !force && !article.status.can_transition_to(ArticleStatus::Processing) {
            warn!(status = %article.status, "Refusing to start a second run");
            return Err(Error::InvalidInput(format!(
                "Article {id} is already being enhanced"
            )));
        }

        match self.process(&article).await {
            Ok(updated) => {
                info!(
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    references = updated.references.len(),
                    "Article enhanced"
                );
                Ok(updated)
            }
            Err(e) => {
                error!(error = %e, elapsed_ms = t0.elapsed().as_millis() as u64, "Enhancement failed");
                self.record_failure(id, &e).await;
                Err(e)
            }
        }
    }

    async fn process(&self, article: &Article) -> Result<Article> {
        self.persist(article.id, ArticleUpdate::status(ArticleStatus::Processing))
            .await?;

        let candidates = self.find_references(&article.title).await;
        let (used, blocks) = self.scrape_references(candidates).await;

        if article.content.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Invalid or missing original content".to_string(),
            ));
        }

        let prompt = build_prompt(&article.content, &blocks);
        debug!(
            original_chars = article.content.chars().count(),
            prompt_chars = prompt.chars().count(),
            references = blocks.len(),
            "Built prompt"
        );
        let request = CompletionRequest::from_config(self.generation, prompt);
        let enhanced = complete_with_deadline(self.generator, &request, self.generation.deadline()).await?;
        if enhanced.trim().is_empty() {
            return Err(Error::EnhancementFailed(
                "Received empty content from API".to_string(),
            ));
        }
        info!(preview = %truncate_for_log(&enhanced, 80), "Received enhanced content");

        self.persist(
            article.id,
            ArticleUpdate {
                status: Some(ArticleStatus::Enhanced),
                enhanced_content: Some(enhanced.trim().to_string()),
                last_enhanced: Some(Utc::now()),
                last_error: Some(String::new()),
                references: Some(used),
            },
        )
        .await
    }

    async fn find_references(&self, title: &str) -> Vec<Reference> {
        match self.search.search(title).await {
            Ok(mut found) => {
                info!(count = found.len(), "Found reference candidates");
                found.truncate(MAX_REFERENCES);
                found
            }
            Err(e) => {
                warn!(error = %e, "Search failed; continuing without references");
                Vec::new()
            }
        }
    }

    /// Scrape candidates concurrently; returns the references that yielded
    /// text and their prompt blocks, in candidate order.
    async fn scrape_references(&self, candidates: Vec<Reference>) -> (Vec<Reference>, Vec<String>) {
        let texts = join_all(candidates.iter().map(|r| self.reference_text(&r.link))).await;

        candidates
            .into_iter()
            .zip(texts)
            .filter_map(|(reference, text)| {
                let text = text?;
                let block = format_reference(&reference.link, &text);
                Some((reference, block))
            })
            .unzip()
    }

    async fn reference_text(&self, link: &str) -> Option<String> {
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(e) => {
                warn!(%link, error = %e, "Skipping reference with invalid URL");
                return None;
            }
        };
        let scrape = scrape_reference_text(self.fetcher, &url, self.reference_timeout);
        match tokio::time::timeout(self.reference_timeout, scrape).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                debug!(%link, "Reference has no text");
                None
            }
            Ok(Err(e)) => {
                warn!(%link, error = %e, "Reference scrape failed");
                None
            }
            Err(_) => {
                warn!(%link, "Reference scrape timed out");
                None
            }
        }
    }

    async fn persist(&self, id: ArticleId, update: ArticleUpdate) -> Result<Article> {
        self.store
            .update_by_id(id, update)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Article {id} not found")))
    }

    async fn record_failure(&self, id: ArticleId, err: &Error) {
        let update = ArticleUpdate {
            status: Some(ArticleStatus::Error),
            last_error: Some(truncate_chars(&err.to_string(), MAX_ERROR_LEN)),
            ..Default::default()
        };
        if let Err(e) = self.persist(id, update).await {
            error!(error = %e, "Could not record enhancement failure");
        }
    }
}
