//! Article persistence boundary.
//!
//! [`ArticleStore`] is the contract the pipeline needs from storage. Updates
//! are last-write-wins and there are no transactions. [`MemoryStore`] is the
//! in-process implementation used by the CLI and tests; it enforces URL
//! uniqueness at `create`, so racing inserts of the same URL surface as
//! [`Error::Duplicate`] instead of two records.

use crate::error::{Error, Result};
use crate::models::{Article, ArticleId, ArticleUpdate, NewArticle};
use crate::status::ArticleStatus;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub trait ArticleStore {
    async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>>;
    /// Exact match on the stored source URL.
    async fn find_by_url(&self, url: &str) -> Result<Option<Article>>;
    /// Insert a new `pending` article.
    ///
    /// # Returns
    /// The stored record with its generated id and timestamps.
    /// [`Error::InvalidInput`] when title or content is blank, and
    /// [`Error::Duplicate`] when another article already has this URL.
    async fn create(&self, new: NewArticle) -> Result<Article>;
    /// Apply `update`; `None` when no article has this id.
    async fn update_by_id(&self, id: ArticleId, update: ArticleUpdate) -> Result<Option<Article>>;
    /// All articles, newest first.
    async fn list(&self) -> Result<Vec<Article>>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: RwLock<HashMap<ArticleId, Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArticleStore for MemoryStore {
    async fn find_by_id(&self, id: ArticleId) -> Result<Option<Article>> {
        Ok(self.articles.read().await.get(&id).cloned())
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        Ok(self
            .articles
            .read()
            .await
            .values()
            .find(|a| a.url.as_deref() == Some(url))
            .cloned())
    }

    async fn create(&self, new: NewArticle) -> Result<Article> {
        if new.title.trim().is_empty() {
            return Err(Error::InvalidInput("Title is required".to_string()));
        }
        if new.content.trim().is_empty() {
            return Err(Error::InvalidInput("Content is required".to_string()));
        }

        let mut articles = self.articles.write().await;
        if let Some(url) = new.url.as_deref() {
            if articles.values().any(|a| a.url.as_deref() == Some(url)) {
                return Err(Error::Duplicate(url.to_string()));
            }
        }

        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            title: new.title.trim().to_string(),
            content: new.content,
            enhanced_content: String::new(),
            status: ArticleStatus::Pending,
            last_error: String::new(),
            author: new.author.map(|a| a.trim().to_string()),
            image: new.image,
            url: new.url,
            source: new.source,
            published_at: new.published_at.unwrap_or(now),
            last_enhanced: None,
            references: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        debug!(id = %article.id, url = ?article.url, "Created article");
        articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update_by_id(&self, id: ArticleId, update: ArticleUpdate) -> Result<Option<Article>> {
        let mut articles = self.articles.write().await;
        Ok(articles.get_mut(&id).map(|article| {
            article.apply(update);
            article.clone()
        }))
    }

    async fn list(&self) -> Result<Vec<Article>> {
        let mut all: Vec<Article> = self.articles.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_article(url: Option<&str>) -> NewArticle {
        NewArticle {
            title: "A perfectly fine title".to_string(),
            content: "Some body text".to_string(),
            author: Some(" Ferris ".to_string()),
            image: None,
            url: url.map(str::to_string),
            source: Some("example.com".to_string()),
            published_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryStore::new();
        let created = store.create(new_article(Some("https://example.com/a"))).await.unwrap();
        assert_eq!(created.status, ArticleStatus::Pending);
        assert_eq!(created.author.as_deref(), Some("Ferris"));

        let by_id = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id, created);
        let by_url = store.find_by_url("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(by_url.id, created.id);
        assert!(store.find_by_url("https://example.com/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_url_is_rejected() {
        let store = MemoryStore::new();
        store.create(new_article(Some("https://example.com/a"))).await.unwrap();
        let err = store
            .create(new_article(Some("https://example.com/a")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));
        // articles without a URL never conflict
        store.create(new_article(None)).await.unwrap();
        store.create(new_article(None)).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_of_same_url_yield_one_record() {
        let store = MemoryStore::new();
        let (a, b) = tokio::join!(
            store.create(new_article(Some("https://example.com/race"))),
            store.create(new_article(Some("https://example.com/race")))
        );
        assert!(a.is_ok() != b.is_ok());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_by_id() {
        let store = MemoryStore::new();
        let created = store.create(new_article(None)).await.unwrap();
        let updated = store
            .update_by_id(created.id, ArticleUpdate::status(ArticleStatus::Processing))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ArticleStatus::Processing);

        assert!(store
            .update_by_id(Uuid::new_v4(), ArticleUpdate::default())
            .await
            .unwrap()
            .is_none());

        let reread = store.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(reread.status, ArticleStatus::Processing);
    }

    #[tokio::test]
    async fn test_create_validates_required_fields() {
        let store = MemoryStore::new();
        let mut blank = new_article(None);
        blank.content = "   ".to_string();
        assert!(matches!(store.create(blank).await, Err(Error::InvalidInput(_))));
    }
}
