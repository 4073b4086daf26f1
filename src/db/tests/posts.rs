//! Shared tests for PostRepo implementations

use crate::{
    db::{error::DbError, repos::PostRepo},
    models::{CreatePost, META_IMAGE_SIZE_PATH, PostType},
};

// ============================================================================
// Create / Get
// ============================================================================

pub async fn test_create_and_get(repo: &dyn PostRepo) {
    let product = repo
        .create(CreatePost::product("7", "Blue Mug"))
        .await
        .expect("Failed to create product");

    assert_eq!(product.author_id, "7");
    assert_eq!(product.post_type, PostType::Product);
    assert_eq!(product.post_parent, 0);

    let fetched = repo
        .get(product.id)
        .await
        .expect("Failed to get product")
        .expect("Product should exist");
    assert_eq!(fetched.id, product.id);
    assert_eq!(fetched.title, "Blue Mug");
    assert_eq!(fetched.post_type, PostType::Product);
}

pub async fn test_get_not_found(repo: &dyn PostRepo) {
    let result = repo.get(999_999).await.expect("Query should succeed");
    assert!(result.is_none());
}

pub async fn test_create_requires_type_and_author(repo: &dyn PostRepo) {
    let missing_type = CreatePost {
        author_id: "7".into(),
        ..Default::default()
    };
    assert!(matches!(
        repo.create(missing_type).await,
        Err(DbError::Validation(_))
    ));

    assert!(matches!(
        repo.create(CreatePost::product("", "No owner")).await,
        Err(DbError::Validation(_))
    ));
}

// ============================================================================
// Listing
// ============================================================================

pub async fn test_list_ids_filters_owner_and_type(repo: &dyn PostRepo) {
    let mine = repo.create(CreatePost::product("7", "a")).await.unwrap();
    let theirs = repo.create(CreatePost::product("8", "b")).await.unwrap();
    let attachment = repo
        .create(CreatePost::attachment("7", mine.id, "image/png"))
        .await
        .unwrap();

    let ids = repo
        .list_ids_by_owner_and_type("7", PostType::Product, 10, 0)
        .await
        .expect("Failed to list ids");

    assert_eq!(ids, vec![mine.id]);
    assert!(!ids.contains(&theirs.id));
    assert!(!ids.contains(&attachment.id));
}

pub async fn test_list_ids_respects_limit(repo: &dyn PostRepo) {
    for i in 0..5 {
        repo.create(CreatePost::product("7", format!("p{}", i)))
            .await
            .unwrap();
    }

    let ids = repo
        .list_ids_by_owner_and_type("7", PostType::Product, 3, 0)
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);
}

pub async fn test_list_ids_pages_after_cursor(repo: &dyn PostRepo) {
    let a = repo.create(CreatePost::product("7", "a")).await.unwrap();
    let b = repo.create(CreatePost::product("7", "b")).await.unwrap();
    let c = repo.create(CreatePost::product("7", "c")).await.unwrap();

    let first = repo
        .list_ids_by_owner_and_type("7", PostType::Product, 2, 0)
        .await
        .unwrap();
    assert_eq!(first, vec![a.id, b.id]);

    // `a` is still present, but lies behind the cursor.
    let second = repo
        .list_ids_by_owner_and_type("7", PostType::Product, 2, b.id)
        .await
        .unwrap();
    assert_eq!(second, vec![c.id]);

    let done = repo
        .list_ids_by_owner_and_type("7", PostType::Product, 2, c.id)
        .await
        .unwrap();
    assert!(done.is_empty());
}

pub async fn test_list_image_attachment_ids(repo: &dyn PostRepo) {
    let product = repo.create(CreatePost::product("7", "p")).await.unwrap();
    let other = repo.create(CreatePost::product("7", "q")).await.unwrap();

    let png = repo
        .create(CreatePost::attachment("7", product.id, "image/png"))
        .await
        .unwrap();
    let jpeg = repo
        .create(CreatePost::attachment("7", product.id, "image/jpeg"))
        .await
        .unwrap();
    // Not images, or not ours
    repo.create(CreatePost::attachment("7", product.id, "application/pdf"))
        .await
        .unwrap();
    repo.create(CreatePost::attachment("7", other.id, "image/png"))
        .await
        .unwrap();

    let mut ids = repo.list_image_attachment_ids(product.id).await.unwrap();
    ids.sort();
    assert_eq!(ids, vec![png.id, jpeg.id]);
}

// ============================================================================
// Hard delete
// ============================================================================

pub async fn test_hard_delete_removes_post_and_meta(repo: &dyn PostRepo) {
    let product = repo.create(CreatePost::product("7", "p")).await.unwrap();
    let attachment = repo
        .create(CreatePost::attachment("7", product.id, "image/png").with_file_path("2024/01/a.png"))
        .await
        .unwrap();
    repo.add_meta(attachment.id, META_IMAGE_SIZE_PATH, "2024/01/a-150x150.png")
        .await
        .unwrap();
    repo.add_meta(attachment.id, "_alt_text", "A mug")
        .await
        .unwrap();

    let deleted = repo
        .hard_delete(attachment.id)
        .await
        .expect("Delete should succeed")
        .expect("Attachment should have been deleted");

    assert_eq!(deleted.post.id, attachment.id);
    assert_eq!(
        deleted.file_paths,
        vec![
            "2024/01/a.png".to_string(),
            "2024/01/a-150x150.png".to_string()
        ]
    );
    assert!(repo.get(attachment.id).await.unwrap().is_none());
    assert!(repo.list_meta(attachment.id).await.unwrap().is_empty());
}

pub async fn test_hard_delete_missing_returns_none(repo: &dyn PostRepo) {
    let result = repo.hard_delete(424_242).await.expect("Query should succeed");
    assert!(result.is_none());
}

pub async fn test_hard_delete_twice(repo: &dyn PostRepo) {
    let product = repo.create(CreatePost::product("7", "p")).await.unwrap();
    assert!(repo.hard_delete(product.id).await.unwrap().is_some());
    assert!(repo.hard_delete(product.id).await.unwrap().is_none());
}

pub async fn test_hard_delete_reparents_children(repo: &dyn PostRepo) {
    let product = repo.create(CreatePost::product("7", "p")).await.unwrap();
    let manual = repo
        .create(CreatePost::attachment("7", product.id, "application/pdf"))
        .await
        .unwrap();

    repo.hard_delete(product.id).await.unwrap();

    let manual = repo.get(manual.id).await.unwrap().expect("pdf survives");
    assert_eq!(manual.post_parent, 0);
}

pub async fn test_count_by_owner_and_type(repo: &dyn PostRepo) {
    assert_eq!(
        repo.count_by_owner_and_type("7", PostType::Product)
            .await
            .unwrap(),
        0
    );
    let product = repo.create(CreatePost::product("7", "p")).await.unwrap();
    repo.create(CreatePost::attachment("7", product.id, "image/png"))
        .await
        .unwrap();

    assert_eq!(
        repo.count_by_owner_and_type("7", PostType::Product)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        repo.count_by_owner_and_type("7", PostType::Attachment)
            .await
            .unwrap(),
        1
    );
}

mod sqlite_tests {
    use crate::db::{
        sqlite::SqlitePostRepo,
        tests::harness::{create_sqlite_pool, run_sqlite_migrations},
    };

    async fn create_repo() -> SqlitePostRepo {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        SqlitePostRepo::new(pool)
    }

    macro_rules! sqlite_test {
        ($name:ident) => {
            #[tokio::test]
            async fn $name() {
                let repo = create_repo().await;
                super::$name(&repo).await;
            }
        };
    }

    sqlite_test!(test_create_and_get);
    sqlite_test!(test_get_not_found);
    sqlite_test!(test_create_requires_type_and_author);
    sqlite_test!(test_list_ids_filters_owner_and_type);
    sqlite_test!(test_list_ids_respects_limit);
    sqlite_test!(test_list_ids_pages_after_cursor);
    sqlite_test!(test_list_image_attachment_ids);
    sqlite_test!(test_hard_delete_removes_post_and_meta);
    sqlite_test!(test_hard_delete_missing_returns_none);
    sqlite_test!(test_hard_delete_twice);
    sqlite_test!(test_hard_delete_reparents_children);
    sqlite_test!(test_count_by_owner_and_type);
}
