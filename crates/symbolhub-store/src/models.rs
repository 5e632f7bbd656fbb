//! Domain model structs read from the catalog database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as a response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use symbolhub_shared::AssetProperties;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account. The credential hash never leaves the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The public face of a [`User`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// Asset fields carried by every post projection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetSummary {
    /// Object store key of the binary file.
    pub storage_key: String,
    /// Where the preview image can be fetched.
    pub preview_url: String,
    #[serde(flatten)]
    pub properties: AssetProperties,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A post as shown to clients: metadata, owner name, asset and tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub title: String,
    /// Empty when the post has no description.
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub asset: AssetSummary,
    /// Tag names in association order.
    pub tags: Vec<String>,
}

/// Posts of one user, nested under their profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPosts {
    pub user: UserProfile,
    pub posts: Vec<Post>,
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(flatten)]
    pub post: Post,
    pub rank: f64,
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A vocabulary entry with the number of posts currently using it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagUsage {
    pub name: String,
    pub posts: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fixed-width RFC 3339 so that text order matches time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, reporting failures against column `idx`.
pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
