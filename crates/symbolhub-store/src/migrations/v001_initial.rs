//! v001 -- Initial schema creation.
//!
//! Creates the five core tables: `users`, `assets`, `posts`, `tags` and
//! `taggings`, and seeds the anonymous user that unauthenticated writes are
//! attributed to.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,              -- argon2 PHC string
    created_at    TEXT NOT NULL               -- RFC-3339, microsecond precision
);

-- ----------------------------------------------------------------
-- Assets (one per post, written before the post)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS assets (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    storage_key  TEXT NOT NULL UNIQUE,        -- object store key
    preview_url  TEXT NOT NULL,
    display_name TEXT,
    sound        INTEGER,                     -- index into the sound catalog
    layers       INTEGER CHECK (layers IS NULL OR layers >= 0)
);

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id    INTEGER NOT NULL UNIQUE,      -- FK -> assets(id)
    user_id     INTEGER NOT NULL,             -- FK -> users(id)
    title       TEXT NOT NULL CHECK (title <> ''),
    description TEXT NOT NULL DEFAULT '',
    created_at  TEXT NOT NULL,

    FOREIGN KEY (asset_id) REFERENCES assets(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)  REFERENCES users(id)
);

-- ----------------------------------------------------------------
-- Tag vocabulary (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tags (
    name TEXT PRIMARY KEY NOT NULL
);

-- ----------------------------------------------------------------
-- Taggings (post <-> tag)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS taggings (
    post_id  INTEGER NOT NULL,                -- FK -> posts(id)
    tag_name TEXT NOT NULL,                   -- FK -> tags(name)

    PRIMARY KEY (post_id, tag_name),
    FOREIGN KEY (post_id)  REFERENCES posts(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_name) REFERENCES tags(name)
);

-- Anonymous user. '!' is not a valid PHC string, so it never verifies.
INSERT OR IGNORE INTO users (id, username, password_hash, created_at)
    VALUES (1, 'anonymous', '!', '1970-01-01T00:00:00.000000Z');
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
