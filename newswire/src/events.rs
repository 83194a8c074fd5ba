//! Change-event fan-out to connected observers.
//!
//! Every mutation publishes one typed event; observers reconcile their local
//! collection by id (idempotent upsert/remove), never by re-fetching the
//! whole document. Delivery is fire-and-forget: an observer offline at
//! publish time never sees that event and catches up over the read path.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{Article, Comment};

/// Events streamed to connected clients. Serialized as
/// `{"event": "<name>", "data": {...}}` with kebab-case event names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum NewsEvent {
    NewsCreated {
        news: Article,
    },
    NewsUpdated {
        news: Article,
    },
    NewsDeleted {
        id: u64,
    },
    NewsFeatured {
        news: Article,
    },
    BreakingNewsUpdated {
        text: String,
    },
    NewsLiked {
        id: u64,
        likes: u64,
    },
    CommentAdded {
        id: u64,
        comment: Comment,
    },
    CommentDeleted {
        id: u64,
        #[serde(rename = "commentId")]
        comment_id: i64,
    },
}

/// Fan-out over a single broadcast channel.
///
/// `subscribe` hands back a receiver; dropping it unsubscribes. `publish`
/// delivers at most once per currently-connected receiver and ignores the
/// no-receiver case.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<NewsEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NewsEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: NewsEvent) {
        // Send errors only mean nobody is listening right now.
        let _ = self.tx.send(event);
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
