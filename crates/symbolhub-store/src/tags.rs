//! Tag vocabulary and post/tag associations.

use std::collections::HashMap;

use rusqlite::{params, Connection};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::TagUsage;

/// Aggregate producing a post's tag names as a JSON array, in association
/// order. Used with `LEFT JOIN taggings tg ... GROUP BY p.id` so untagged
/// posts yield `[]`.
pub(crate) const TAGS_JSON: &str = "COALESCE(json_group_array(tg.tag_name ORDER BY tg.rowid) \
     FILTER (WHERE tg.tag_name IS NOT NULL), '[]')";

/// Aggregate flattening a post's tags into one space-separated string for
/// ranking. NULL for untagged posts.
pub(crate) const TAGS_TEXT: &str = "group_concat(tg.tag_name, ' ' ORDER BY tg.rowid)";

/// Upsert `tags` into the vocabulary and associate each with `post_id`.
///
/// `tags` must already be normalized. Runs on whatever transaction `conn`
/// belongs to; an existing tag name is left untouched.
pub(crate) fn attach_tags(conn: &Connection, post_id: i32, tags: &[String]) -> Result<()> {
    let mut upsert = conn.prepare_cached(
        "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
    )?;
    let mut link =
        conn.prepare_cached("INSERT INTO taggings (post_id, tag_name) VALUES (?1, ?2)")?;

    for tag in tags {
        upsert.execute(params![tag])?;
    }
    for tag in tags {
        link.execute(params![post_id, tag])?;
    }

    Ok(())
}

/// Decode the [`TAGS_JSON`] column at `idx`.
pub(crate) fn decode_tags(idx: usize, raw: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl Database {
    /// Tag names of each requested post. Every existing post in `post_ids`
    /// gets an entry, untagged ones with an empty list; unknown ids are
    /// skipped.
    pub fn tags_for_posts(&self, post_ids: &[i32]) -> Result<HashMap<i32, Vec<String>>> {
        let ids = serde_json::to_string(post_ids)?;
        let sql = format!(
            "SELECT p.id, {TAGS_JSON}
             FROM posts p
             LEFT JOIN taggings tg ON tg.post_id = p.id
             WHERE p.id IN (SELECT value FROM json_each(?1))
             GROUP BY p.id"
        );

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params![ids], |row| {
            let id: i32 = row.get(0)?;
            let raw: String = row.get(1)?;
            Ok((id, decode_tags(1, &raw)?))
        })?;

        rows.collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(StoreError::from)
    }

    /// The whole vocabulary with usage counts, ordered by name. Tags no
    /// longer used by any post are still listed.
    pub fn list_tags(&self) -> Result<Vec<TagUsage>> {
        let mut stmt = self.conn().prepare(
            "SELECT t.name, COUNT(tg.post_id)
             FROM tags t
             LEFT JOIN taggings tg ON tg.tag_name = t.name
             GROUP BY t.name
             ORDER BY t.name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(TagUsage {
                name: row.get(0)?,
                posts: row.get(1)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::from)
    }
}
