mod common;
mod job_locks;
mod posts;

pub use job_locks::SqliteJobLockRepo;
pub use posts::SqlitePostRepo;
