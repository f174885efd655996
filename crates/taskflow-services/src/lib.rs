//! Taskflow Services Layer
//!
//! Business services of the authorization and hierarchy engine: the
//! materialized hierarchy, the authorization policy with its escalation walk,
//! and the task orchestrator that applies allowed decisions. Storage is
//! reached only through the traits in `taskflow-db`.

pub mod authorization;
pub mod engine;
pub mod hierarchy;
pub mod orchestrator;
pub mod permissions;

#[cfg(feature = "maintenance")]
pub mod maintenance;

pub use authorization::{AuthContext, AuthorizationService, EscalationOutcome, TaskCreationRequest};
pub use engine::Engine;
pub use hierarchy::{
    DeactivationReport, HierarchyIssue, HierarchyPath, HierarchyService, HierarchyValidation,
    PathRepairReport,
};
#[cfg(feature = "maintenance")]
pub use maintenance::LockMaintenanceService;
pub use orchestrator::{NewTask, ReassignTask, TaskOrchestrator};
pub use permissions::PermissionCatalog;
