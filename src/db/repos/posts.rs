use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{CreatePost, DeletedPost, Post, PostId, PostMeta, PostType},
};

/// Repository trait for catalog records (products, attachments and their meta).
#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Insert a record.
    async fn create(&self, input: CreatePost) -> DbResult<Post>;

    /// Get a record by ID.
    async fn get(&self, id: PostId) -> DbResult<Option<Post>>;

    /// List up to `limit` record IDs of the given type owned by `author_id`,
    /// in ascending ID order, starting after `after_id`.
    ///
    /// Pass `0` to start from the beginning.
    async fn list_ids_by_owner_and_type(
        &self,
        author_id: &str,
        post_type: PostType,
        limit: u32,
        after_id: PostId,
    ) -> DbResult<Vec<PostId>>;

    /// List IDs of attachments under `parent_id` whose MIME type is an image.
    async fn list_image_attachment_ids(&self, parent_id: PostId) -> DbResult<Vec<PostId>>;

    /// Permanently delete a record and its meta in one transaction.
    ///
    /// Returns `None` when no record with that ID existed.
    async fn hard_delete(&self, id: PostId) -> DbResult<Option<DeletedPost>>;

    /// Attach a meta value to a record.
    async fn add_meta(&self, post_id: PostId, key: &str, value: &str) -> DbResult<()>;

    /// List all meta rows of a record.
    async fn list_meta(&self, post_id: PostId) -> DbResult<Vec<PostMeta>>;

    /// Count records of the given type owned by `author_id`.
    async fn count_by_owner_and_type(&self, author_id: &str, post_type: PostType)
    -> DbResult<i64>;
}
