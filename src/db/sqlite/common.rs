use std::time::Duration;

use chrono::Utc;
use sqlx::{Row, sqlite::SqliteRow};

use crate::{
    db::error::{DbError, DbResult},
    models::Post,
};

/// Columns selected for every `Post` read, in the order `post_from_row` expects.
pub const POST_COLUMNS: &str =
    "id, author_id, post_type, post_parent, mime_type, title, file_path, created_at";

/// Build a `Post` from a row selected with [`POST_COLUMNS`].
pub fn post_from_row(row: &SqliteRow) -> DbResult<Post> {
    let post_type_str: String = row.get("post_type");

    Ok(Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        post_type: post_type_str
            .parse()
            .map_err(|e: String| DbError::Internal(e))?,
        post_parent: row.get("post_parent"),
        mime_type: row.get("mime_type"),
        title: row.get("title"),
        file_path: row.get("file_path"),
        created_at: row.get("created_at"),
    })
}

/// Current time in unix milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Lease deadline `ttl` from `now_ms`, saturating on overflow.
pub fn expiry_millis(now_ms: i64, ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(ttl_ms)
}
