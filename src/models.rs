//! Data models for scraped pages, search references and stored articles.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ScrapedArticle`]: Transient result of extracting one fetched page
//! - [`Reference`]: A related page returned by search, used as LLM context
//! - [`Article`]: The persisted record, including its enhancement status
//! - [`NewArticle`] / [`ArticleUpdate`]: Create and partial-update payloads
//! - [`ScrapeOutcome`]: Per-URL result of a batch scrape

use crate::status::ArticleStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier assigned by the store.
pub type ArticleId = Uuid;

/// Extracted content below this many characters is flagged as suspect.
pub const SUSPECT_CONTENT_LEN: usize = 50;

pub const UNTITLED: &str = "Untitled Article";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// A single page as scraped from the web.
///
/// Produced by the scrape pipeline and either returned to the caller or
/// folded into a stored [`Article`]; never retained across calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedArticle {
    pub title: String,
    /// Trimmed, whitespace-collapsed main text.
    pub content: String,
    pub author: String,
    /// Absolute image URL (or the placeholder).
    pub image: String,
    pub source_url: String,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedArticle {
    /// Content short enough that extraction probably picked the wrong node.
    pub fn is_suspect(&self) -> bool {
        self.content.chars().count() < SUSPECT_CONTENT_LEN
    }
}

/// A related page found by search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    /// Absolute http(s) URL.
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

/// The persisted article record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub enhanced_content: String,
    pub status: ArticleStatus,
    #[serde(default)]
    pub last_error: String,
    pub author: Option<String>,
    pub image: Option<String>,
    /// Unique when present.
    pub url: Option<String>,
    /// Host the article was scraped from.
    pub source: Option<String>,
    pub published_at: DateTime<Utc>,
    pub last_enhanced: Option<DateTime<Utc>>,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-only view of where an article is in its enhancement lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementStatus {
    pub is_enhanced: bool,
    pub last_enhanced: Option<DateTime<Utc>>,
    pub status: ArticleStatus,
    pub has_error: bool,
    pub error: String,
}

impl Article {
    pub fn is_enhanced(&self) -> bool {
        self.status == ArticleStatus::Enhanced && !self.enhanced_content.is_empty()
    }

    pub fn enhancement_status(&self) -> EnhancementStatus {
        EnhancementStatus {
            is_enhanced: self.is_enhanced(),
            last_enhanced: self.last_enhanced,
            status: self.status,
            has_error: self.status == ArticleStatus::Error,
            error: self.last_error.clone(),
        }
    }

    /// Apply a partial update in place (last write wins).
    pub fn apply(&mut self, update: ArticleUpdate) {
        let ArticleUpdate {
            status,
            enhanced_content,
            last_enhanced,
            last_error,
            references,
        } = update;
        if let Some(status) = status {
            self.status = status;
        }
        if let Some(content) = enhanced_content {
            self.enhanced_content = content;
        }
        if let Some(at) = last_enhanced {
            self.last_enhanced = Some(at);
        }
        if let Some(err) = last_error {
            self.last_error = err;
        }
        if let Some(refs) = references {
            self.references = refs;
        }
        self.updated_at = Utc::now();
    }
}

/// Fields needed to create an [`Article`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author: Option<String>,
    pub image: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl NewArticle {
    /// Build a record from a scraped page; `source` is the host it came from.
    pub fn from_scraped(scraped: &ScrapedArticle, source: Option<String>) -> Self {
        let title = scraped.title.trim();
        let author = scraped.author.trim();
        Self {
            title: if title.is_empty() { UNTITLED } else { title }.to_string(),
            content: scraped.content.trim().to_string(),
            author: Some(if author.is_empty() { UNKNOWN_AUTHOR } else { author }.to_string()),
            image: Some(scraped.image.clone()),
            url: Some(scraped.source_url.clone()),
            source,
            published_at: Some(scraped.scraped_at),
        }
    }
}

/// Partial update applied by the store. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleUpdate {
    pub status: Option<ArticleStatus>,
    pub enhanced_content: Option<String>,
    pub last_enhanced: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub references: Option<Vec<Reference>>,
}

impl ArticleUpdate {
    pub fn status(status: ArticleStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Result of scraping one URL out of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOutcome {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ScrapedArticle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScrapeOutcome {
    pub fn ok(url: impl Into<String>, data: ScrapedArticle) -> Self {
        Self {
            url: url.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraped(content: &str) -> ScrapedArticle {
        ScrapedArticle {
            title: "  A title  ".to_string(),
            content: content.to_string(),
            author: "".to_string(),
            image: "https://example.com/a.png".to_string(),
            source_url: "https://example.com/blog/a".to_string(),
            scraped_at: Utc::now(),
        }
    }

    fn article() -> Article {
        let now = Utc::now();
        Article {
            id: Uuid::new_v4(),
            title: "Title".to_string(),
            content: "Body".to_string(),
            enhanced_content: String::new(),
            status: ArticleStatus::Pending,
            last_error: String::new(),
            author: None,
            image: None,
            url: None,
            source: None,
            published_at: now,
            last_enhanced: None,
            references: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_suspect_content() {
        assert!(scraped("short").is_suspect());
        assert!(!scraped(&"x".repeat(60)).is_suspect());
    }

    #[test]
    fn test_new_article_from_scraped_defaults() {
        let new = NewArticle::from_scraped(&scraped("body"), Some("example.com".into()));
        assert_eq!(new.title, "A title");
        assert_eq!(new.author.as_deref(), Some(UNKNOWN_AUTHOR));
        assert_eq!(new.url.as_deref(), Some("https://example.com/blog/a"));
        assert_eq!(new.source.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_apply_partial_update() {
        let mut a = article();
        a.apply(ArticleUpdate::status(ArticleStatus::Processing));
        assert_eq!(a.status, ArticleStatus::Processing);
        assert!(a.enhanced_content.is_empty());

        a.apply(ArticleUpdate {
            status: Some(ArticleStatus::Enhanced),
            enhanced_content: Some("Better body".into()),
            last_enhanced: Some(Utc::now()),
            ..Default::default()
        });
        assert!(a.is_enhanced());
        let summary = a.enhancement_status();
        assert!(summary.is_enhanced);
        assert!(!summary.has_error);
        assert!(summary.last_enhanced.is_some());
    }

    #[test]
    fn test_enhanced_without_content_is_not_enhanced() {
        let mut a = article();
        a.status = ArticleStatus::Enhanced;
        assert!(!a.is_enhanced());
    }

    #[test]
    fn test_article_serialization_camel_case() {
        let json = serde_json::to_string(&article()).unwrap();
        assert!(json.contains("\"enhancedContent\""));
        assert!(json.contains("\"lastError\""));
        assert!(json.contains("\"status\":\"pending\""));
    }

    #[test]
    fn test_scrape_outcome_serialization() {
        let failed = ScrapeOutcome::failed("https://example.com/x", "boom");
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(!json.contains("\"data\""));
    }
}
