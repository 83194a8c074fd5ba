//! Article service: validated, policy-checked mutations over the record
//! store, each producing one typed change event.
//!
//! Pipeline per mutation: validate input, consult the access policy, touch
//! the store, publish, return the record. Validation and policy failures
//! short-circuit before any store access. A publish-order mutex wraps each
//! store-call + publish pair so one article's events reach every observer
//! in mutation order even when request handlers race.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::{PortalError, PortalResult};
use crate::events::{EventBroadcaster, NewsEvent};
use crate::policy::{authorize, Actor, NewsAction};
use crate::store::NewsStore;
use crate::types::{Article, ArticleUpdate, Comment, NewArticle};

/// Create-request fields as received from the gateway; author is already
/// resolved (explicit value or the acting editor's name), image may still
/// need the placeholder default.
#[derive(Debug, Clone)]
pub struct CreateArticle {
    pub title: String,
    pub category: String,
    pub excerpt: String,
    pub content: String,
    pub image: Option<String>,
    pub author: String,
}

pub struct NewsService {
    store: Arc<NewsStore>,
    events: Arc<EventBroadcaster>,
    publish_order: Mutex<()>,
}

fn required(value: &str, field: &str) -> PortalResult<()> {
    if value.trim().is_empty() {
        Err(PortalError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

fn placeholder_image() -> String {
    format!(
        "https://picsum.photos/800/450?random={}",
        chrono::Utc::now().timestamp_millis()
    )
}

impl NewsService {
    pub fn new(store: Arc<NewsStore>, events: Arc<EventBroadcaster>) -> Self {
        Self {
            store,
            events,
            publish_order: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &NewsStore {
        &self.store
    }

    /// List articles, optionally filtered by category (case-insensitive
    /// exact match) and by a case-insensitive substring search over title,
    /// excerpt and content.
    pub async fn list(&self, category: Option<&str>, search: Option<&str>) -> Vec<Article> {
        let mut news = self.store.find_all().await;
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            news.retain(|n| n.category.eq_ignore_ascii_case(category));
        }
        if let Some(search) = search.filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            news.retain(|n| {
                n.title.to_lowercase().contains(&needle)
                    || n.excerpt.to_lowercase().contains(&needle)
                    || n.content.to_lowercase().contains(&needle)
            });
        }
        news
    }

    pub async fn get(&self, id: u64) -> PortalResult<Article> {
        self.store
            .find_by_id(id)
            .await
            .ok_or_else(|| PortalError::NotFound(format!("article {}", id)))
    }

    pub async fn breaking_news(&self) -> String {
        self.store.breaking_news().await
    }

    /// Public view counter; mutates but deliberately emits no event.
    pub async fn increment_views(&self, id: u64) -> PortalResult<Article> {
        self.store
            .increment_views(id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("article {}", id)))
    }

    pub async fn create(&self, actor: Option<&Actor>, input: CreateArticle) -> PortalResult<Article> {
        required(&input.title, "title")?;
        required(&input.category, "category")?;
        required(&input.excerpt, "excerpt")?;
        required(&input.content, "content")?;
        authorize(actor, &NewsAction::Create { category: &input.category })?;

        let article = NewArticle {
            title: input.title,
            category: input.category,
            author: input.author,
            image: input.image.unwrap_or_else(placeholder_image),
            excerpt: input.excerpt,
            content: input.content,
        };

        let _order = self.publish_order.lock().await;
        let created = self.store.create(article).await?;
        info!(id = created.id, category = %created.category, "article created");
        self.events.publish(NewsEvent::NewsCreated {
            news: created.clone(),
        });
        Ok(created)
    }

    /// Partial update. Resource existence is checked before authorization
    /// (404 before 403) so a missing id never leaks as a policy denial.
    pub async fn update(
        &self,
        actor: Option<&Actor>,
        id: u64,
        updates: ArticleUpdate,
    ) -> PortalResult<Article> {
        let existing = self.get(id).await?;
        authorize(actor, &NewsAction::Edit { category: &existing.category })?;

        let _order = self.publish_order.lock().await;
        let updated = self
            .store
            .update(id, updates)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("article {}", id)))?;
        info!(id, "article updated");
        self.events.publish(NewsEvent::NewsUpdated {
            news: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn delete(&self, actor: Option<&Actor>, id: u64) -> PortalResult<()> {
        let existing = self.get(id).await?;
        authorize(actor, &NewsAction::Delete { category: &existing.category })?;

        let _order = self.publish_order.lock().await;
        if !self.store.delete(id).await? {
            return Err(PortalError::NotFound(format!("article {}", id)));
        }
        info!(id, "article deleted");
        self.events.publish(NewsEvent::NewsDeleted { id });
        Ok(())
    }

    /// Featured flag, chief-editor only. Role is checked before existence
    /// here: the route is gated as a whole, matching the original surface.
    pub async fn set_featured(
        &self,
        actor: Option<&Actor>,
        id: u64,
        featured: bool,
    ) -> PortalResult<Article> {
        authorize(actor, &NewsAction::SetFeatured)?;

        let _order = self.publish_order.lock().await;
        let updated = self
            .store
            .set_featured(id, featured)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("article {}", id)))?;
        info!(id, featured, "featured flag set");
        self.events.publish(NewsEvent::NewsFeatured {
            news: updated.clone(),
        });
        Ok(updated)
    }

    pub async fn set_breaking_news(
        &self,
        actor: Option<&Actor>,
        text: String,
    ) -> PortalResult<String> {
        authorize(actor, &NewsAction::SetBreakingNews)?;

        let _order = self.publish_order.lock().await;
        self.store.set_breaking_news(text.clone()).await?;
        info!("breaking news banner set");
        self.events
            .publish(NewsEvent::BreakingNewsUpdated { text: text.clone() });
        Ok(text)
    }

    /// Public like counter.
    pub async fn like(&self, id: u64) -> PortalResult<Article> {
        authorize(None, &NewsAction::Like)?;

        let _order = self.publish_order.lock().await;
        let updated = self
            .store
            .add_like(id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("article {}", id)))?;
        self.events.publish(NewsEvent::NewsLiked {
            id,
            likes: updated.likes,
        });
        Ok(updated)
    }

    /// Public comment path; author and text are both required.
    pub async fn add_comment(
        &self,
        id: u64,
        author: String,
        text: String,
    ) -> PortalResult<Comment> {
        required(&author, "author")?;
        required(&text, "text")?;

        let _order = self.publish_order.lock().await;
        let comment = self
            .store
            .add_comment(id, author, text)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("article {}", id)))?;
        self.events.publish(NewsEvent::CommentAdded {
            id,
            comment: comment.clone(),
        });
        Ok(comment)
    }

    /// Moderated comment removal: authenticated, chief anywhere, sectorial
    /// editors within their own sector. Existence first (404 before 403).
    pub async fn delete_comment(
        &self,
        actor: Option<&Actor>,
        id: u64,
        comment_id: i64,
    ) -> PortalResult<()> {
        let existing = self.get(id).await?;
        authorize(actor, &NewsAction::ModerateComment { category: &existing.category })?;

        let _order = self.publish_order.lock().await;
        if self.store.delete_comment(id, comment_id).await?.is_none() {
            return Err(PortalError::NotFound(format!(
                "comment {} on article {}",
                comment_id, id
            )));
        }
        info!(id, comment_id, "comment removed");
        self.events
            .publish(NewsEvent::CommentDeleted { id, comment_id });
        Ok(())
    }
}
