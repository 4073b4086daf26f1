mod job_locks;
mod posts;

pub use job_locks::*;
pub use posts::*;
