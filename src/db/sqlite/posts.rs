use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use super::common::{POST_COLUMNS, post_from_row};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::PostRepo,
    },
    models::{
        CreatePost, DeletedPost, IMAGE_MIME_PATTERN, META_IMAGE_SIZE_PATH, Post, PostId,
        PostMeta, PostType,
    },
};

pub struct SqlitePostRepo {
    pool: SqlitePool,
}

impl SqlitePostRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepo for SqlitePostRepo {
    async fn create(&self, input: CreatePost) -> DbResult<Post> {
        let post_type = input
            .post_type
            .ok_or_else(|| DbError::Validation("post_type is required".into()))?;
        if input.author_id.is_empty() {
            return Err(DbError::Validation("author_id cannot be empty".into()));
        }

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO posts (author_id, post_type, post_parent, mime_type, title, file_path, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&input.author_id)
        .bind(post_type.as_str())
        .bind(input.post_parent)
        .bind(&input.mime_type)
        .bind(&input.title)
        .bind(&input.file_path)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Post {
            id: result.last_insert_rowid(),
            author_id: input.author_id,
            post_type,
            post_parent: input.post_parent,
            mime_type: input.mime_type,
            title: input.title,
            file_path: input.file_path,
            created_at: now,
        })
    }

    async fn get(&self, id: PostId) -> DbResult<Option<Post>> {
        let query = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_ids_by_owner_and_type(
        &self,
        author_id: &str,
        post_type: PostType,
        limit: u32,
        after_id: PostId,
    ) -> DbResult<Vec<PostId>> {
        let ids = sqlx::query_scalar::<_, PostId>(
            r#"
            SELECT id
            FROM posts
            WHERE author_id = ?
            AND post_type = ?
            AND id > ?
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(author_id)
        .bind(post_type.as_str())
        .bind(after_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn list_image_attachment_ids(&self, parent_id: PostId) -> DbResult<Vec<PostId>> {
        let ids = sqlx::query_scalar::<_, PostId>(
            r#"
            SELECT id
            FROM posts
            WHERE post_type = ?
            AND mime_type LIKE ?
            AND post_parent = ?
            "#,
        )
        .bind(PostType::Attachment.as_str())
        .bind(IMAGE_MIME_PATTERN)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn hard_delete(&self, id: PostId) -> DbResult<Option<DeletedPost>> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let Some(row) = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let post = post_from_row(&row)?;

        let size_paths: Vec<String> = sqlx::query_scalar(
            "SELECT meta_value FROM post_meta WHERE post_id = ? AND meta_key = ?",
        )
        .bind(id)
        .bind(META_IMAGE_SIZE_PATH)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM post_meta WHERE post_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        // Surviving children move up one level instead of dangling.
        sqlx::query("UPDATE posts SET post_parent = ? WHERE post_parent = ?")
            .bind(post.post_parent)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        tx.commit().await?;

        let file_paths = post
            .file_path
            .iter()
            .cloned()
            .chain(size_paths)
            .filter(|path| !path.is_empty())
            .collect();

        Ok(Some(DeletedPost { post, file_paths }))
    }

    async fn add_meta(&self, post_id: PostId, key: &str, value: &str) -> DbResult<()> {
        sqlx::query("INSERT INTO post_meta (post_id, meta_key, meta_value) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_meta(&self, post_id: PostId) -> DbResult<Vec<PostMeta>> {
        let rows = sqlx::query(
            "SELECT post_id, meta_key, meta_value FROM post_meta WHERE post_id = ? ORDER BY id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PostMeta {
                post_id: row.get("post_id"),
                meta_key: row.get("meta_key"),
                meta_value: row.get("meta_value"),
            })
            .collect())
    }

    async fn count_by_owner_and_type(
        &self,
        author_id: &str,
        post_type: PostType,
    ) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ? AND post_type = ?")
                .bind(author_id)
                .bind(post_type.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
