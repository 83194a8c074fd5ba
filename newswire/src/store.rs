//! File-backed record store for the news document.
//!
//! The whole collection lives in one JSON document. Every mutation runs a
//! read-entire-document, mutate-in-memory, write-entire-document cycle while
//! holding a single async mutex, so one writer is active at a time and id
//! assignment never observes stale state. Reads do not lock; they may trail
//! a concurrent writer by at most one in-flight write.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::error::{PortalError, PortalResult};
use crate::types::{Article, ArticleUpdate, Comment, Document, NewArticle};

pub struct NewsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl NewsStore {
    /// Open a store over `path`. The file is created on first save; a
    /// missing or unreadable file loads as the empty document.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Read and parse the full document. Load failures degrade to the empty
    /// document rather than erroring: the store's callers treat the file as
    /// a cache of record state, and a fresh deployment has no file at all.
    pub async fn load(&self) -> Document {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "news document unparsable, starting empty");
                    Document::default()
                }
            },
            Err(_) => Document::default(),
        }
    }

    /// Persist the full document atomically: write a sibling temp file, then
    /// rename over the target so readers never observe a torn write.
    async fn save(&self, doc: &Document) -> PortalResult<()> {
        let json = serde_json::to_string_pretty(doc)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self
            .path
            .with_file_name(format!(".{}.tmp", uuid::Uuid::new_v4()));
        if let Err(err) = tokio::fs::write(&tmp, json.as_bytes()).await {
            error!(path = %self.path.display(), %err, "failed writing news document");
            return Err(err.into());
        }
        if let Err(err) = tokio::fs::rename(&tmp, &self.path).await {
            error!(path = %self.path.display(), %err, "failed committing news document");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    pub async fn find_all(&self) -> Vec<Article> {
        self.load().await.news
    }

    pub async fn find_by_id(&self, id: u64) -> Option<Article> {
        self.load().await.news.into_iter().find(|n| n.id == id)
    }

    pub async fn find_by_category(&self, category: &str) -> Vec<Article> {
        self.load()
            .await
            .news
            .into_iter()
            .filter(|n| n.category.eq_ignore_ascii_case(category))
            .collect()
    }

    pub async fn find_featured(&self) -> Vec<Article> {
        self.load()
            .await
            .news
            .into_iter()
            .filter(|n| n.featured)
            .collect()
    }

    pub async fn breaking_news(&self) -> String {
        self.load().await.breaking_news
    }

    /// Insert a new article at the head of the collection. The id is
    /// `max(existing) + 1` (1 for an empty store), computed under the write
    /// lock so concurrent creates cannot collide.
    pub async fn create(&self, input: NewArticle) -> PortalResult<Article> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await;
        let id = doc.news.iter().map(|n| n.id).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let article = Article {
            id,
            title: input.title,
            category: input.category,
            author: input.author,
            image: input.image,
            excerpt: input.excerpt,
            content: input.content,
            date: now,
            views: 0,
            featured: false,
            likes: 0,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        doc.news.insert(0, article.clone());
        self.save(&doc).await?;
        Ok(article)
    }

    /// Merge the provided fields into an existing record and refresh its
    /// updated-timestamp. `Ok(None)` when the id does not resolve.
    pub async fn update(&self, id: u64, updates: ArticleUpdate) -> PortalResult<Option<Article>> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await;
        let article = match doc.news.iter_mut().find(|n| n.id == id) {
            Some(article) => article,
            None => return Ok(None),
        };
        if let Some(title) = updates.title {
            article.title = title;
        }
        if let Some(category) = updates.category {
            article.category = category;
        }
        if let Some(excerpt) = updates.excerpt {
            article.excerpt = excerpt;
        }
        if let Some(content) = updates.content {
            article.content = content;
        }
        if let Some(image) = updates.image {
            article.image = image;
        }
        if let Some(author) = updates.author {
            article.author = author;
        }
        article.updated_at = Utc::now();
        let updated = article.clone();
        self.save(&doc).await?;
        Ok(Some(updated))
    }

    /// Remove the record and every comment it owns. `Ok(false)` when the id
    /// does not resolve.
    pub async fn delete(&self, id: u64) -> PortalResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await;
        let before = doc.news.len();
        doc.news.retain(|n| n.id != id);
        if doc.news.len() == before {
            return Ok(false);
        }
        self.save(&doc).await?;
        Ok(true)
    }

    pub async fn increment_views(&self, id: u64) -> PortalResult<Option<Article>> {
        self.bump_counter(id, |article| article.views += 1).await
    }

    pub async fn add_like(&self, id: u64) -> PortalResult<Option<Article>> {
        self.bump_counter(id, |article| article.likes += 1).await
    }

    async fn bump_counter<F>(&self, id: u64, bump: F) -> PortalResult<Option<Article>>
    where
        F: FnOnce(&mut Article),
    {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await;
        let article = match doc.news.iter_mut().find(|n| n.id == id) {
            Some(article) => article,
            None => return Ok(None),
        };
        bump(article);
        article.updated_at = Utc::now();
        let updated = article.clone();
        self.save(&doc).await?;
        Ok(Some(updated))
    }

    /// Append a comment to an article. Comment ids are time-derived (epoch
    /// millis) and bumped past any collision within the same article.
    pub async fn add_comment(
        &self,
        id: u64,
        author: String,
        text: String,
    ) -> PortalResult<Option<Comment>> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await;
        let article = match doc.news.iter_mut().find(|n| n.id == id) {
            Some(article) => article,
            None => return Ok(None),
        };
        let now = Utc::now();
        let mut comment_id = now.timestamp_millis();
        while article.comments.iter().any(|c| c.id == comment_id) {
            comment_id += 1;
        }
        let comment = Comment {
            id: comment_id,
            author,
            text,
            created_at: now,
        };
        article.comments.push(comment.clone());
        article.updated_at = now;
        self.save(&doc).await?;
        Ok(Some(comment))
    }

    /// Remove exactly one comment. `Ok(None)` when either the article or the
    /// comment does not resolve.
    pub async fn delete_comment(&self, id: u64, comment_id: i64) -> PortalResult<Option<Article>> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await;
        let article = match doc.news.iter_mut().find(|n| n.id == id) {
            Some(article) => article,
            None => return Ok(None),
        };
        let before = article.comments.len();
        article.comments.retain(|c| c.id != comment_id);
        if article.comments.len() == before {
            return Ok(None);
        }
        article.updated_at = Utc::now();
        let updated = article.clone();
        self.save(&doc).await?;
        Ok(Some(updated))
    }

    pub async fn set_featured(&self, id: u64, featured: bool) -> PortalResult<Option<Article>> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await;
        let article = match doc.news.iter_mut().find(|n| n.id == id) {
            Some(article) => article,
            None => return Ok(None),
        };
        article.featured = featured;
        article.updated_at = Utc::now();
        let updated = article.clone();
        self.save(&doc).await?;
        Ok(Some(updated))
    }

    /// Replace the global banner. Last write wins, no versioning.
    pub async fn set_breaking_news(&self, text: String) -> PortalResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await;
        doc.breaking_news = text;
        self.save(&doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(title: &str, category: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            category: category.to_string(),
            author: "Newsroom".to_string(),
            image: "https://picsum.photos/800/450".to_string(),
            excerpt: "excerpt".to_string(),
            content: "content".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_document() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        let doc = store.load().await;
        assert!(doc.news.is_empty());
        assert!(doc.breaking_news.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_as_empty_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("news-data.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = NewsStore::open(&path);
        assert!(store.find_all().await.is_empty());
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids_and_inserts_at_head() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));

        let first = store.create(sample("first", "Technology")).await.unwrap();
        let second = store.create(sample("second", "Marketing")).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.views, 0);
        assert_eq!(first.likes, 0);
        assert!(!first.featured);
        assert!(first.comments.is_empty());

        let all = store.find_all().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, 2, "newest article sits at the head");
    }

    #[tokio::test]
    async fn id_assignment_survives_deleting_the_max() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        store.create(sample("a", "Technology")).await.unwrap();
        let b = store.create(sample("b", "Technology")).await.unwrap();
        assert!(store.delete(b.id).await.unwrap());
        let c = store.create(sample("c", "Technology")).await.unwrap();
        // max(existing)+1 over the remaining record, id reuse is accepted
        assert_eq!(c.id, 2);
    }

    #[tokio::test]
    async fn update_merges_partial_fields() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        let created = store.create(sample("original", "Technology")).await.unwrap();

        let updated = store
            .update(
                created.id,
                ArticleUpdate {
                    title: Some("edited".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("article exists");

        assert_eq!(updated.title, "edited");
        assert_eq!(updated.excerpt, created.excerpt);
        assert_eq!(updated.content, created.content);
        assert_eq!(updated.category, created.category);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn update_of_absent_id_is_none() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        let result = store.update(42, ArticleUpdate::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn delete_removes_record_and_owned_comments() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        let created = store.create(sample("doomed", "Technology")).await.unwrap();
        store
            .add_comment(created.id, "A".to_string(), "hi".to_string())
            .await
            .unwrap()
            .expect("comment added");

        assert!(store.delete(created.id).await.unwrap());
        assert!(store.find_by_id(created.id).await.is_none());
        // Comment operations against the deleted article resolve to None.
        let gone = store
            .add_comment(created.id, "B".to_string(), "late".to_string())
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn counters_are_monotone() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        let created = store.create(sample("counted", "Technology")).await.unwrap();

        let after_view = store.increment_views(created.id).await.unwrap().unwrap();
        assert_eq!(after_view.views, 1);
        let after_like = store.add_like(created.id).await.unwrap().unwrap();
        assert_eq!(after_like.likes, 1);
        let again = store.add_like(created.id).await.unwrap().unwrap();
        assert_eq!(again.likes, 2);
    }

    #[tokio::test]
    async fn comment_ids_are_unique_within_an_article() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        let created = store.create(sample("discussed", "Technology")).await.unwrap();

        let c1 = store
            .add_comment(created.id, "A".to_string(), "one".to_string())
            .await
            .unwrap()
            .unwrap();
        let c2 = store
            .add_comment(created.id, "B".to_string(), "two".to_string())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(c1.id, c2.id);

        let after = store.delete_comment(created.id, c1.id).await.unwrap().unwrap();
        assert_eq!(after.comments.len(), 1);
        assert_eq!(after.comments[0].id, c2.id);
    }

    #[tokio::test]
    async fn delete_comment_of_absent_comment_is_none() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        let created = store.create(sample("quiet", "Technology")).await.unwrap();
        let result = store.delete_comment(created.id, 123).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn featured_and_breaking_news_roundtrip() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        let created = store.create(sample("big", "Technology")).await.unwrap();

        let flagged = store.set_featured(created.id, true).await.unwrap().unwrap();
        assert!(flagged.featured);
        assert_eq!(store.find_featured().await.len(), 1);

        store
            .set_breaking_news("storm warning".to_string())
            .await
            .unwrap();
        assert_eq!(store.breaking_news().await, "storm warning");

        // Reopening the store sees the persisted state.
        let reopened = NewsStore::open(dir.path().join("news-data.json"));
        assert_eq!(reopened.breaking_news().await, "storm warning");
        assert_eq!(reopened.find_all().await.len(), 1);
    }

    #[tokio::test]
    async fn category_filter_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let store = NewsStore::open(dir.path().join("news-data.json"));
        store.create(sample("tech", "Technology")).await.unwrap();
        store.create(sample("mkt", "Marketing")).await.unwrap();

        let hits = store.find_by_category("technology").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "tech");
    }
}
