//! Authorization service
//!
//! Read-only policy decisions. Every `authorize_*` call returns an
//! [`AuthorizationDecision`]; `Err` is reserved for store failures.

mod context;
mod escalation;

pub use context::AuthContext;
pub use escalation::EscalationOutcome;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskflow_core::models::{
    AuthorizationDecision, Department, DenialReason, FlowType, Permission, Task, TaskAssignee,
    User,
};
use taskflow_core::{AppError, AuditSink, Config};
use taskflow_db::{DirectoryStore, TaskStore};
use uuid::Uuid;

use crate::permissions::PermissionCatalog;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreationRequest {
    pub creator_id: Uuid,
    pub flow_type: FlowType,
    pub target_user_id: Option<Uuid>,
    pub target_department_id: Option<Uuid>,
}

/// Effective communication rule between two departments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CommunicationRule {
    pub allowed: bool,
    pub requires_approval: bool,
}

/// Short-circuit on a denial while resolving the parties of a request.
type Resolved<T> = Result<T, AuthorizationDecision>;

#[derive(Clone)]
pub struct AuthorizationService {
    directory: Arc<dyn DirectoryStore>,
    tasks: Arc<dyn TaskStore>,
    catalog: Arc<PermissionCatalog>,
    audit: Arc<dyn AuditSink>,
    default_allow_cross_dept_comm: bool,
}

impl AuthorizationService {
    pub fn new(
        directory: Arc<dyn DirectoryStore>,
        tasks: Arc<dyn TaskStore>,
        catalog: Arc<PermissionCatalog>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            directory,
            tasks,
            catalog,
            audit,
            default_allow_cross_dept_comm: false,
        }
    }

    /// Build the service with the cross-department default taken from `config`.
    pub fn from_config(
        directory: Arc<dyn DirectoryStore>,
        tasks: Arc<dyn TaskStore>,
        catalog: Arc<PermissionCatalog>,
        audit: Arc<dyn AuditSink>,
        config: &Config,
    ) -> Self {
        Self::new(directory, tasks, catalog, audit)
            .with_default_cross_department(config.default_allow_cross_dept_comm)
    }

    /// Cross-department default applied when the company record is missing.
    pub fn with_default_cross_department(mut self, allow: bool) -> Self {
        self.default_allow_cross_dept_comm = allow;
        self
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    async fn active_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self
            .directory
            .get_user(user_id)
            .await?
            .filter(|u| u.is_active()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn has_permission(
        &self,
        user_id: Uuid,
        permission: Permission,
    ) -> Result<bool, AppError> {
        Ok(self
            .active_user(user_id)
            .await?
            .is_some_and(|u| self.catalog.grants(u.role_id, permission)))
    }

    #[tracing::instrument(skip(self))]
    pub async fn has_any_permission(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
    ) -> Result<bool, AppError> {
        Ok(self.active_user(user_id).await?.is_some_and(|u| {
            permissions
                .iter()
                .any(|p| self.catalog.grants(u.role_id, *p))
        }))
    }

    #[tracing::instrument(skip(self))]
    pub async fn has_all_permissions(
        &self,
        user_id: Uuid,
        permissions: &[Permission],
    ) -> Result<bool, AppError> {
        Ok(self.active_user(user_id).await?.is_some_and(|u| {
            self.catalog
                .permissions(u.role_id)
                .is_some_and(|set| permissions.iter().all(|p| set.contains(p)))
        }))
    }

    /// Load the actor of a request, denying when missing or not active.
    async fn resolve_actor(&self, user_id: Uuid) -> Result<Resolved<User>, AppError> {
        Ok(match self.directory.get_user(user_id).await? {
            None => Err(AuthorizationDecision::deny(DenialReason::ActorNotFound)),
            Some(user) if !user.is_active() => {
                Err(AuthorizationDecision::deny(DenialReason::ActorInactive))
            }
            Some(user) => Ok(user),
        })
    }

    async fn resolve_target(
        &self,
        creator: &User,
        target_id: Option<Uuid>,
    ) -> Result<Resolved<User>, AppError> {
        let Some(target_id) = target_id else {
            return Ok(Err(AuthorizationDecision::deny(DenialReason::TargetRequired)));
        };
        if target_id == creator.id {
            return Ok(Err(AuthorizationDecision::deny(DenialReason::SelfTarget)));
        }
        Ok(match self.directory.get_user(target_id).await? {
            None => Err(AuthorizationDecision::deny(DenialReason::TargetNotFound)),
            Some(target) if !target.is_active() => {
                Err(AuthorizationDecision::deny(DenialReason::TargetInactive))
            }
            Some(target) if target.company_id != creator.company_id => {
                Err(AuthorizationDecision::deny(DenialReason::TargetInOtherCompany))
            }
            Some(target) => Ok(target),
        })
    }

    /// Active primary leader, else active fallback leader.
    async fn usable_leader(&self, department: &Department) -> Result<Option<Uuid>, AppError> {
        for candidate in [department.leader_id, department.fallback_leader_id]
            .into_iter()
            .flatten()
        {
            if self.active_user(candidate).await?.is_some() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    async fn resolve_department(
        &self,
        creator: &User,
        department_id: Uuid,
    ) -> Result<Resolved<Department>, AppError> {
        let department = match self.directory.get_department(department_id).await? {
            None => return Ok(Err(AuthorizationDecision::deny(DenialReason::DepartmentNotFound))),
            Some(d) if d.company_id != creator.company_id => {
                return Ok(Err(AuthorizationDecision::deny(
                    DenialReason::DepartmentInOtherCompany,
                )))
            }
            Some(d) if !d.is_active => {
                return Ok(Err(AuthorizationDecision::deny(DenialReason::DepartmentInactive)))
            }
            Some(d) => d,
        };
        if self.usable_leader(&department).await?.is_none() {
            return Ok(Err(AuthorizationDecision::deny(
                DenialReason::DepartmentWithoutLeader,
            )));
        }
        Ok(Ok(department))
    }

    fn require(&self, user: &User, permission: Permission) -> Resolved<()> {
        if self.catalog.grants(user.role_id, permission) {
            Ok(())
        } else {
            Err(AuthorizationDecision::deny(DenialReason::MissingPermission(
                permission,
            )))
        }
    }

    /// Decide whether `creator_id` may create a task along `flow_type`.
    ///
    /// The hierarchical relationship is checked before the permission, so a
    /// wrong-direction request is reported as such even without the permission.
    #[tracing::instrument(skip(self), fields(creator_id = %request.creator_id, flow_type = %request.flow_type))]
    pub async fn authorize_task_creation(
        &self,
        request: &TaskCreationRequest,
    ) -> Result<AuthorizationDecision, AppError> {
        let creator = match self.resolve_actor(request.creator_id).await? {
            Ok(creator) => creator,
            Err(denied) => return Ok(denied),
        };

        let decision = match request.flow_type {
            FlowType::Descendant => {
                match self.resolve_target(&creator, request.target_user_id).await? {
                    Err(denied) => denied,
                    Ok(target) if !target.has_ancestor(creator.id) => {
                        AuthorizationDecision::deny(DenialReason::NotSubordinate)
                    }
                    Ok(_) => self.permitted(&creator, Permission::TaskCreateDown),
                }
            }
            FlowType::Ascendant => {
                let target_id = request.target_user_id.or(creator.superior_id);
                if target_id.is_none() {
                    return Ok(AuthorizationDecision::deny(DenialReason::NoSuperior));
                }
                match self.resolve_target(&creator, target_id).await? {
                    Err(denied) => denied,
                    Ok(target) if !creator.has_ancestor(target.id) => {
                        AuthorizationDecision::deny(DenialReason::NotSuperior)
                    }
                    Ok(_) => self.permitted(&creator, Permission::TaskCreateUp),
                }
            }
            FlowType::SameLevel => {
                match self.resolve_target(&creator, request.target_user_id).await? {
                    Err(denied) => denied,
                    Ok(target) if target.hierarchy_level != creator.hierarchy_level => {
                        AuthorizationDecision::deny(DenialReason::NotSameLevel)
                    }
                    Ok(_) => self.permitted(&creator, Permission::TaskCreateSameLevel),
                }
            }
            FlowType::ToDepartment => {
                let Some(department_id) = request.target_department_id else {
                    return Ok(AuthorizationDecision::deny(DenialReason::DepartmentRequired));
                };
                if self
                    .catalog
                    .grants(creator.role_id, Permission::TaskCreateToDepartment)
                {
                    self.department_decision(&creator, department_id).await?
                } else {
                    match self.resolve_department(&creator, department_id).await? {
                        Err(denied) => denied,
                        Ok(department) => {
                            let outcome = self.escalate(&creator, department.id).await?;
                            if outcome.succeeded() {
                                AuthorizationDecision::escalated(outcome.path)
                                    .with_approval(outcome.requires_approval)
                            } else {
                                AuthorizationDecision::escalation_denied(
                                    DenialReason::EscalationExhausted,
                                    outcome.path,
                                )
                            }
                        }
                    }
                }
            }
        };

        tracing::debug!(
            allowed = decision.allowed,
            reason = ?decision.reason,
            escalated = decision.requires_escalation,
            "Task creation authorized"
        );
        Ok(decision)
    }

    fn permitted(&self, creator: &User, permission: Permission) -> AuthorizationDecision {
        match self.require(creator, permission) {
            Ok(()) => AuthorizationDecision::allow(),
            Err(denied) => denied,
        }
    }

    /// Direct department delegation by a creator holding the department permission.
    #[tracing::instrument(skip(self))]
    pub async fn authorize_department_task(
        &self,
        creator_id: Uuid,
        department_id: Uuid,
    ) -> Result<AuthorizationDecision, AppError> {
        match self.resolve_actor(creator_id).await? {
            Ok(creator) => self.department_decision(&creator, department_id).await,
            Err(denied) => Ok(denied),
        }
    }

    async fn department_decision(
        &self,
        creator: &User,
        department_id: Uuid,
    ) -> Result<AuthorizationDecision, AppError> {
        let department = match self.resolve_department(creator, department_id).await? {
            Ok(department) => department,
            Err(denied) => return Ok(denied),
        };

        let rule = self
            .communication_rule(creator.company_id, creator.department_id, department.id)
            .await?;
        if !rule.allowed {
            return Ok(AuthorizationDecision::deny(
                DenialReason::CommunicationNotAllowed,
            ));
        }
        Ok(AuthorizationDecision::allow().with_approval(rule.requires_approval))
    }

    /// Whether work may flow from `from_department_id` to `to_department_id`.
    #[tracing::instrument(skip(self))]
    pub async fn check_department_communication(
        &self,
        company_id: Uuid,
        from_department_id: Option<Uuid>,
        to_department_id: Uuid,
    ) -> Result<bool, AppError> {
        Ok(self
            .communication_rule(company_id, from_department_id, to_department_id)
            .await?
            .allowed)
    }

    pub(crate) async fn communication_rule(
        &self,
        company_id: Uuid,
        from_department_id: Option<Uuid>,
        to_department_id: Uuid,
    ) -> Result<CommunicationRule, AppError> {
        if from_department_id == Some(to_department_id) {
            return Ok(CommunicationRule {
                allowed: true,
                requires_approval: false,
            });
        }

        if let Some(from) = from_department_id {
            if let Some(edge) = self
                .directory
                .get_department_communication(company_id, from, to_department_id)
                .await?
            {
                return Ok(CommunicationRule {
                    allowed: edge.allowed,
                    requires_approval: edge.requires_approval,
                });
            }
        }

        let allowed = match self.directory.get_company(company_id).await? {
            Some(company) => company.allow_cross_dept_comm,
            None => self.default_allow_cross_dept_comm,
        };
        Ok(CommunicationRule {
            allowed,
            requires_approval: false,
        })
    }

    /// Decide whether `user_id` may move `task_id` on the board.
    #[tracing::instrument(skip(self))]
    pub async fn authorize_board_move(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<AuthorizationDecision, AppError> {
        let mover = match self.resolve_actor(user_id).await? {
            Ok(mover) => mover,
            Err(denied) => return Ok(denied),
        };
        match self.tasks.get_task(mover.company_id, task_id).await? {
            Some(task) => self.board_move_decision(&mover, &task).await,
            None => Ok(AuthorizationDecision::deny(DenialReason::TaskNotFound)),
        }
    }

    pub(crate) async fn board_move_decision(
        &self,
        mover: &User,
        task: &Task,
    ) -> Result<AuthorizationDecision, AppError> {
        let decision = match task.assignee() {
            None => AuthorizationDecision::deny(DenialReason::InvalidAssignment),
            Some(TaskAssignee::User(assignee_id)) if assignee_id != mover.id => {
                AuthorizationDecision::deny(DenialReason::NotAssignee)
            }
            Some(TaskAssignee::User(_)) => self.permitted(mover, Permission::BoardMoveOwn),
            Some(TaskAssignee::Department(department_id)) => {
                match self.directory.get_department(department_id).await? {
                    None => AuthorizationDecision::deny(DenialReason::DepartmentNotFound),
                    Some(department) if !department.is_led_by(mover.id) => {
                        AuthorizationDecision::deny(DenialReason::NotDepartmentLeader)
                    }
                    Some(_) => self.permitted(mover, Permission::BoardMoveDepartment),
                }
            }
        };
        Ok(decision)
    }

    /// Bundle the caller's identity, permissions and position.
    #[tracing::instrument(skip(self))]
    pub async fn create_auth_context(&self, user_id: Uuid) -> Result<AuthContext, AppError> {
        let user = self
            .directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        if !user.is_active() {
            return Err(AppError::Unauthorized(format!("user {} is not active", user_id)));
        }
        let permissions = self
            .catalog
            .permissions(user.role_id)
            .cloned()
            .unwrap_or_default();
        Ok(AuthContext::new(&user, permissions))
    }
}
