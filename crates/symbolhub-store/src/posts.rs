//! Post write transaction, edit and read projections.

use chrono::Utc;
use rusqlite::{params, Connection};

use symbolhub_shared::constants::PAGE_SIZE;
use symbolhub_shared::{AssetProperties, NewAsset, NewPost, PostEdit};

use crate::database::Database;
use crate::error::{not_found, Result, StoreError};
use crate::models::{format_timestamp, parse_timestamp, AssetSummary, Post, UserPosts};
use crate::tags::{attach_tags, decode_tags, TAGS_JSON};
use crate::users::row_id;

/// Joined sources every post projection reads from.
pub(crate) const POST_SOURCES: &str = "posts p
     JOIN users u  ON u.id = p.user_id
     JOIN assets a ON a.id = p.asset_id
     LEFT JOIN taggings tg ON tg.post_id = p.id";

/// Column list matching [`row_to_post`]. Needs `GROUP BY p.id`.
pub(crate) fn post_columns() -> String {
    format!(
        "p.id AS id, p.user_id, u.username, p.title, p.description, p.created_at,
         a.storage_key, a.preview_url, a.display_name, a.sound, a.layers,
         {TAGS_JSON} AS tags"
    )
}

/// Number of columns produced by [`post_columns`].
pub(crate) const POST_COLUMN_COUNT: usize = 12;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create a post together with its asset and tag associations.
    ///
    /// Everything happens in one transaction: the asset row, the post row,
    /// the tag vocabulary upsert and the taggings either all land or none do.
    /// The returned post is read back inside the same transaction.
    pub fn create_post(&mut self, user_id: i32, new_post: &NewPost) -> Result<Post> {
        new_post.validate()?;
        let tags = new_post.tags.normalize();
        let description = new_post.description.as_deref().unwrap_or("");

        let tx = self.conn_mut().transaction()?;

        let asset_id = insert_asset(&tx, &new_post.asset)?;

        tx.execute(
            "INSERT INTO posts (asset_id, user_id, title, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                asset_id,
                user_id,
                new_post.title.trim(),
                description,
                format_timestamp(Utc::now()),
            ],
        )?;
        let post_id = row_id(tx.last_insert_rowid())?;

        attach_tags(&tx, post_id, &tags)?;

        let post = fetch_post(&tx, post_id)?;
        tx.commit()?;

        tracing::info!(
            post_id,
            user_id,
            asset_id,
            tags = tags.len(),
            "post created"
        );
        Ok(post)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a post's title, description and full tag set.
    ///
    /// The asset and owner are never touched. An unknown `post_id` is
    /// `NotFound` and nothing is written.
    pub fn edit_post(&mut self, post_id: i32, edit: &PostEdit) -> Result<Post> {
        edit.validate()?;
        let tags = edit.tags.normalize();

        let tx = self.conn_mut().transaction()?;

        let updated = tx.execute(
            "UPDATE posts SET title = ?1, description = ?2 WHERE id = ?3",
            params![
                edit.title.trim(),
                edit.description.as_deref().unwrap_or(""),
                post_id
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound("post"));
        }

        let removed = tx.execute("DELETE FROM taggings WHERE post_id = ?1", params![post_id])?;
        attach_tags(&tx, post_id, &tags)?;

        let post = fetch_post(&tx, post_id)?;
        tx.commit()?;

        tracing::info!(post_id, removed, added = tags.len(), "post edited");
        Ok(post)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single post by identity.
    pub fn get_post(&self, post_id: i32) -> Result<Post> {
        fetch_post(self.conn(), post_id)
    }

    /// List posts.
    ///
    /// Without an offset every post is returned, newest first. With an
    /// offset one page of [`PAGE_SIZE`] posts is returned, oldest first.
    pub fn list_posts(&self, offset: Option<u32>) -> Result<Vec<Post>> {
        let columns = post_columns();
        match offset {
            None => {
                let sql = format!(
                    "SELECT {columns} FROM {POST_SOURCES}
                     GROUP BY p.id
                     ORDER BY p.created_at DESC, p.id DESC"
                );
                collect_posts(self.conn(), &sql, params![])
            }
            Some(offset) => {
                let sql = format!(
                    "SELECT {columns} FROM {POST_SOURCES}
                     GROUP BY p.id
                     ORDER BY p.created_at ASC, p.id ASC
                     LIMIT ?1 OFFSET ?2"
                );
                collect_posts(self.conn(), &sql, params![PAGE_SIZE, offset])
            }
        }
    }

    /// All posts of one user, newest first, under their public profile.
    pub fn list_posts_by_user(&self, user_id: i32) -> Result<UserPosts> {
        let user = self.get_user_profile(user_id)?;

        let sql = format!(
            "SELECT {} FROM {POST_SOURCES}
             WHERE p.user_id = ?1
             GROUP BY p.id
             ORDER BY p.created_at DESC, p.id DESC",
            post_columns()
        );
        let posts = collect_posts(self.conn(), &sql, params![user_id])?;

        Ok(UserPosts { user, posts })
    }

    /// Owner of a post.
    pub fn post_owner(&self, post_id: i32) -> Result<i32> {
        self.conn()
            .query_row(
                "SELECT user_id FROM posts WHERE id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .map_err(not_found("post"))
    }

    /// Storage key of the asset attached to a post.
    pub fn asset_key_for_post(&self, post_id: i32) -> Result<String> {
        self.conn()
            .query_row(
                "SELECT a.storage_key FROM posts p JOIN assets a ON a.id = p.asset_id
                 WHERE p.id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .map_err(not_found("post"))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn insert_asset(conn: &Connection, asset: &NewAsset) -> Result<i64> {
    conn.execute(
        "INSERT INTO assets (storage_key, preview_url, display_name, sound, layers)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            asset.storage_key,
            asset.preview_url,
            asset.properties.name,
            asset.properties.sound,
            asset.properties.layers,
        ],
    )
    .map_err(|e| match StoreError::from(e) {
        StoreError::Conflict(_) => {
            StoreError::Conflict(format!("storage key {} is already in use", asset.storage_key))
        }
        other => other,
    })?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn fetch_post(conn: &Connection, post_id: i32) -> Result<Post> {
    let sql = format!(
        "SELECT {} FROM {POST_SOURCES} WHERE p.id = ?1 GROUP BY p.id",
        post_columns()
    );
    conn.query_row(&sql, params![post_id], row_to_post)
        .map_err(not_found("post"))
}

fn collect_posts(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Post>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, row_to_post)?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

/// Map a projection row (see [`post_columns`]) to a [`Post`].
pub(crate) fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let created_str: String = row.get(5)?;
    let tags_json: String = row.get(11)?;

    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        created_at: parse_timestamp(5, &created_str)?,
        asset: AssetSummary {
            storage_key: row.get(6)?,
            preview_url: row.get(7)?,
            properties: AssetProperties {
                name: row.get(8)?,
                sound: row.get(9)?,
                layers: row.get(10)?,
            },
        },
        tags: decode_tags(11, &tags_json)?,
    })
}
