//! Core domain records persisted in the news document and exchanged with
//! clients. Field names serialize in camelCase to match the on-disk layout
//! `{ breakingNews, news: [...] }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published news item, the central record of the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Unique, monotonically assigned, immutable once set.
    pub id: u64,
    pub title: String,
    /// Partition key for sectorial ownership.
    pub category: String,
    pub author: String,
    pub image: String,
    pub excerpt: String,
    pub content: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reader comment, owned by its parent article and deleted with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Time-derived (epoch millis), unique within the parent article.
    pub id: i64,
    pub author: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// The single on-disk unit: global breaking-news banner plus all articles
/// in display order (newest-created first).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub breaking_news: String,
    #[serde(default)]
    pub news: Vec<Article>,
}

/// Editor role. The sector travels with the role so a sectorial editor can
/// never exist without one and a chief editor can never carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "kebab-case")]
pub enum Role {
    ChiefEditor,
    SectorialEditor { sector: String },
}

impl Role {
    pub fn sector(&self) -> Option<&str> {
        match self {
            Role::ChiefEditor => None,
            Role::SectorialEditor { sector } => Some(sector),
        }
    }

    pub fn is_chief(&self) -> bool {
        matches!(self, Role::ChiefEditor)
    }
}

/// Registered editor account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(flatten)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User shape exposed over the API; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub role: Role,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// Fields accepted when creating an article. Counters, flags, comment list
/// and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub category: String,
    pub author: String,
    pub image: String,
    pub excerpt: String,
    pub content: String,
}

/// Partial update: absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub author: Option<String>,
}

impl ArticleUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.category.is_none()
            && self.excerpt.is_none()
            && self.content.is_none()
            && self.image.is_none()
            && self.author.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_with_kebab_case_tag() {
        let chief = serde_json::to_value(&Role::ChiefEditor).unwrap();
        assert_eq!(chief["role"], "chief-editor");

        let sectorial = serde_json::to_value(&Role::SectorialEditor {
            sector: "Technology".to_string(),
        })
        .unwrap();
        assert_eq!(sectorial["role"], "sectorial-editor");
        assert_eq!(sectorial["sector"], "Technology");
    }

    #[test]
    fn user_view_hides_password_hash() {
        let user = User {
            id: 7,
            name: "Chief".to_string(),
            email: "chief@newswire.local".to_string(),
            password_hash: "salt$deadbeef".to_string(),
            role: Role::ChiefEditor,
            created_at: Utc::now(),
        };
        let view = UserView::from(&user);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "chief@newswire.local");
        assert_eq!(json["role"], "chief-editor");
    }

    #[test]
    fn document_defaults_cover_legacy_articles() {
        // Articles written before likes/comments existed must still load.
        let raw = r#"{
            "breakingNews": "",
            "news": [{
                "id": 1,
                "title": "t",
                "category": "Technology",
                "author": "a",
                "image": "i",
                "excerpt": "e",
                "content": "c",
                "date": "2024-01-01T00:00:00Z",
                "views": 3,
                "featured": false,
                "createdAt": "2024-01-01T00:00:00Z",
                "updatedAt": "2024-01-01T00:00:00Z"
            }]
        }"#;
        let doc: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.news[0].likes, 0);
        assert!(doc.news[0].comments.is_empty());
    }
}
