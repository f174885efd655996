//! Data models for the application
//!
//! Each sub-module represents one record family of the company namespace.

mod company;
mod decision;
mod department;
mod lock;
mod role;
mod task;
mod user;

// Re-export all models for convenient imports
pub use company::*;
pub use decision::*;
pub use department::*;
pub use lock::*;
pub use role::*;
pub use task::*;
pub use user::*;
