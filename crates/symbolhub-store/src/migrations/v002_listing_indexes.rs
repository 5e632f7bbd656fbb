use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at, id);
CREATE INDEX IF NOT EXISTS idx_posts_user_created ON posts(user_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_taggings_tag_name ON taggings(tag_name);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
