//! Taskflow Infrastructure Library
//!
//! Shared infrastructure for processes embedding the engine:
//! - Telemetry initialization
//! - Client-facing error responses

#[cfg(feature = "observability-basic")]
pub mod telemetry;

pub mod error;

#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry};

pub use error::{log_app_error, ErrorResponse};
