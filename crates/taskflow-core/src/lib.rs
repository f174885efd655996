//! Taskflow Core Library
//!
//! This crate provides the domain models, error types, configuration and hook
//! traits shared by every Taskflow component: the organisational hierarchy,
//! the closed permission catalog, departments, tasks and advisory locks.

pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod models;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, IntegrityViolation, LogLevel};
pub use hooks::{
    AuditAction, AuditEvent, AuditSink, NoOpAuditSink, NoOpNotificationDispatcher,
    NotificationDispatcher, NotificationEvent, TracingAuditSink,
};

/// Result type used across the Taskflow crates.
pub type AppResult<T> = Result<T, AppError>;
