use crate::db::{DbPool, tests::harness::create_migrated_pool};

#[tokio::test]
async fn test_pool_health_check() {
    let pool = create_migrated_pool().await;
    let db = DbPool::from_sqlite(pool);
    db.health_check().await.expect("health check should pass");
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let pool = create_migrated_pool().await;
    let db = DbPool::from_sqlite(pool);
    db.run_migrations()
        .await
        .expect("re-running migrations should be a no-op");
}
