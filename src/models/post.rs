use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row identifier shared by products, attachments and meta owners.
pub type PostId = i64;

/// MIME pattern (SQL `LIKE`) selecting image attachments.
pub const IMAGE_MIME_PATTERN: &str = "image/%";

/// Meta key listing an extra rendered size of an attachment's image file.
pub const META_IMAGE_SIZE_PATH: &str = "_image_size_path";

/// Kind of catalog record stored in the `posts` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    /// A sellable item owned by a merchant.
    Product,
    /// A media file attached to a parent record.
    Attachment,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostType::Product => "product",
            PostType::Attachment => "attachment",
        }
    }
}

impl std::str::FromStr for PostType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(PostType::Product),
            "attachment" => Ok(PostType::Attachment),
            _ => Err(format!("Invalid post type: {}", s)),
        }
    }
}

impl std::fmt::Display for PostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Merchant that owns the record.
    pub author_id: String,
    pub post_type: PostType,
    /// Parent record ID, `0` when the record has no parent.
    pub post_parent: PostId,
    /// Empty for non-media records.
    pub mime_type: String,
    pub title: String,
    /// Media file location relative to the media root.
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for inserting a catalog record.
#[derive(Debug, Clone, Default)]
pub struct CreatePost {
    pub author_id: String,
    pub post_type: Option<PostType>,
    pub post_parent: PostId,
    pub mime_type: String,
    pub title: String,
    pub file_path: Option<String>,
}

impl CreatePost {
    /// A product owned by `author_id`.
    pub fn product(author_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author_id: author_id.into(),
            post_type: Some(PostType::Product),
            title: title.into(),
            ..Default::default()
        }
    }

    /// An attachment of `parent` with the given MIME type.
    pub fn attachment(
        author_id: impl Into<String>,
        parent: PostId,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            post_type: Some(PostType::Attachment),
            post_parent: parent,
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }
}

/// A record removed by a hard delete, with the media files it referenced.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedPost {
    pub post: Post,
    /// Primary file plus any rendered sizes, relative to the media root.
    pub file_paths: Vec<String>,
}

/// A key/value pair attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMeta {
    pub post_id: PostId,
    pub meta_key: String,
    pub meta_value: String,
}
