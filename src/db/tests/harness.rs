//! Test harness for database repository testing
//!
//! SQLite databases are in-memory and run the real migrations, so tests
//! exercise the production schema.

use sqlx::SqlitePool;

/// Create an in-memory SQLite pool for testing
pub async fn create_sqlite_pool() -> SqlitePool {
    sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool")
}

/// Run SQLite migrations on the pool
///
/// Uses the actual migration files to ensure tests match production schema
pub async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations_sqlx/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}

/// Create a migrated in-memory pool.
pub async fn create_migrated_pool() -> SqlitePool {
    let pool = create_sqlite_pool().await;
    run_sqlite_migrations(&pool).await;
    pool
}
