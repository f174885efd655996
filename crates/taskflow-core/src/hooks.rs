//! Hooks for external collaborators
//!
//! The engine appends escalation and hierarchy events to an audit log and
//! tells a notification dispatcher about task assignment and movement. Both
//! collaborators live outside this workspace; these traits are the interface
//! they implement. Calls are fire-and-forget: callers log a failure and move on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    EscalationSucceeded,
    EscalationFailed,
    UserDeactivated,
    UserReparented,
    DepartmentLeaderChanged,
    DepartmentDeactivated,
}

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub company_id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub subject_id: Uuid,
    pub details: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        company_id: Uuid,
        actor_id: Uuid,
        action: AuditAction,
        subject_id: Uuid,
        details: serde_json::Value,
    ) -> Self {
        Self {
            company_id,
            actor_id,
            action,
            subject_id,
            details,
            occurred_at: Utc::now(),
        }
    }
}

/// Append-only sink for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<(), String>;
}

/// Sink that discards every event
pub struct NoOpAuditSink;

#[async_trait]
impl AuditSink for NoOpAuditSink {
    async fn record(&self, _event: AuditEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Sink that writes events to the `taskflow::audit` tracing target.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), String> {
        tracing::info!(
            target: "taskflow::audit",
            company_id = %event.company_id,
            actor_id = %event.actor_id,
            subject_id = %event.subject_id,
            action = ?event.action,
            details = %event.details,
            "Audit event"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    TaskAssigned,
    TaskMoved,
    TaskReassigned,
}

/// One-way notification channel invoked by the orchestrator.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, event: NotificationEvent, payload: serde_json::Value)
        -> Result<(), String>;
}

pub struct NoOpNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for NoOpNotificationDispatcher {
    async fn notify(
        &self,
        _event: NotificationEvent,
        _payload: serde_json::Value,
    ) -> Result<(), String> {
        Ok(())
    }
}
