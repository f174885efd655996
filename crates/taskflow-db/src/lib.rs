//! Taskflow persistence layer
//!
//! Store traits consumed by the services, plus the Postgres and in-memory
//! backends that implement them.

pub mod db;

pub use db::store::{DirectoryStore, LockStore, Precondition, TaskStore, WriteBatch, WriteOp};

#[cfg(feature = "postgres")]
pub use db::postgres::{
    setup_database, PgDirectoryStore, PgLockStore, PgTaskStore, TransactionGuard, MIGRATOR,
};

#[cfg(feature = "memory")]
pub use db::memory::InMemoryStore;
