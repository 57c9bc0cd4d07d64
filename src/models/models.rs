use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    /// argon2 PHC string, never the plaintext.
    pub password: String,
    #[serde(default)]
    pub status: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A discussion thread. Children are not stored here; they are looked up
/// through `parent_topic` (see `topics::child_topics`).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Topic {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub parent_topic: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub author: String,
    pub topic: String,
    #[serde(default)]
    pub status: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SessionData {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
