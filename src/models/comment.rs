use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub event_id: i64,
    pub posted_at: DateTime<Utc>,
}

/// Comment with its author's display name, as listed on the detail page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommentView {
    pub id: i64,
    pub content: String,
    pub posted_at: DateTime<Utc>,
    pub author_id: i64,
    pub author_name: String,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub user_id: i64,
    pub event_id: i64,
    pub content: String,
}
