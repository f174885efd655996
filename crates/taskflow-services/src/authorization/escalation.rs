use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use taskflow_core::constants::MAX_ESCALATION_HOPS;
use taskflow_core::models::{Permission, User};
use taskflow_core::{AppError, AuditAction, AuditEvent};
use uuid::Uuid;

use super::AuthorizationService;

/// Result of walking a creator's superior chain for an approver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationOutcome {
    pub approver_id: Option<Uuid>,
    /// Creator at index 0, then every active ancestor visited.
    pub path: Vec<Uuid>,
    /// Copied from the communication rule that let the approver reach the department.
    pub requires_approval: bool,
}

impl EscalationOutcome {
    pub fn succeeded(&self) -> bool {
        self.approver_id.is_some()
    }
}

impl AuthorizationService {
    /// Find the nearest ancestor of `creator_id` able to send work to `target_department_id`.
    #[tracing::instrument(skip(self))]
    pub async fn escalate_to_find_permission(
        &self,
        creator_id: Uuid,
        target_department_id: Uuid,
    ) -> Result<EscalationOutcome, AppError> {
        let creator = self
            .directory
            .get_user(creator_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", creator_id)))?;
        self.escalate(&creator, target_department_id).await
    }

    pub(super) async fn escalate(
        &self,
        creator: &User,
        target_department_id: Uuid,
    ) -> Result<EscalationOutcome, AppError> {
        let mut outcome = EscalationOutcome {
            approver_id: None,
            path: vec![creator.id],
            requires_approval: false,
        };
        let mut seen = HashSet::from([creator.id]);
        let mut current = creator.superior_id;
        let mut hops = 0usize;

        while let Some(superior_id) = current {
            if hops >= MAX_ESCALATION_HOPS {
                tracing::warn!(
                    creator_id = %creator.id,
                    max_hops = MAX_ESCALATION_HOPS,
                    "Escalation walk hit its hop bound"
                );
                break;
            }
            if !seen.insert(superior_id) {
                tracing::warn!(
                    creator_id = %creator.id,
                    revisited = %superior_id,
                    "Cycle detected during escalation"
                );
                break;
            }
            let ancestor = match self.directory.get_user(superior_id).await? {
                Some(ancestor) if ancestor.is_active() => ancestor,
                _ => break,
            };

            outcome.path.push(ancestor.id);
            hops += 1;

            if self
                .catalog
                .grants(ancestor.role_id, Permission::TaskCreateToDepartment)
            {
                let rule = self
                    .communication_rule(
                        ancestor.company_id,
                        ancestor.department_id,
                        target_department_id,
                    )
                    .await?;
                if rule.allowed {
                    outcome.approver_id = Some(ancestor.id);
                    outcome.requires_approval = rule.requires_approval;
                    break;
                }
            }
            current = ancestor.superior_id;
        }

        let action = if outcome.succeeded() {
            AuditAction::EscalationSucceeded
        } else {
            AuditAction::EscalationFailed
        };
        tracing::debug!(
            creator_id = %creator.id,
            hops,
            approver_id = ?outcome.approver_id,
            "Escalation finished"
        );

        let event = AuditEvent::new(
            creator.company_id,
            creator.id,
            action,
            target_department_id,
            json!({
                "path": outcome.path,
                "approver_id": outcome.approver_id,
            }),
        );
        if let Err(e) = self.audit.record(event).await {
            tracing::warn!(error = %e, "Failed to record escalation audit event");
        }

        Ok(outcome)
    }
}
