//! Store traits and their implementations.
//
// Persistence seams shared by every backend
pub mod store;
//
// Postgres backend (sqlx)
#[cfg(feature = "postgres")]
pub mod postgres;
//
// In-process backend
#[cfg(feature = "memory")]
pub mod memory;
