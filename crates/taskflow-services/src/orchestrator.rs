//! Task orchestrator
//!
//! Creates, moves and reassigns tasks after the authorization service allows
//! it. Moves and reassignments run under the task's advisory lock and an
//! optimistic version check.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use taskflow_core::constants::{DEFAULT_LOCK_TTL_SECS, TASK_LOCK_RESOURCE};
use taskflow_core::models::{
    AuthorizationDecision, DenialReason, DistributedLock, FlowType, LockAcquisition, Permission,
    Task, TaskAction, TaskAssignee, TaskStatus, User,
};
use taskflow_core::{AppError, Config, NotificationDispatcher, NotificationEvent};
use taskflow_db::{DirectoryStore, LockStore, TaskStore};
use uuid::Uuid;
use validator::Validate;

use crate::authorization::{AuthorizationService, TaskCreationRequest};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTask {
    pub creator_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub flow_type: String,
    pub target_user_id: Option<Uuid>,
    pub target_department_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReassignTask {
    pub actor_id: Uuid,
    pub task_id: Uuid,
    pub flow_type: String,
    pub target_user_id: Option<Uuid>,
    pub target_department_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub expected_version: i64,
}

fn parse_flow_type(raw: &str) -> Result<FlowType, AppError> {
    raw.parse::<FlowType>().map_err(|_| {
        AppError::from(AuthorizationDecision::deny(DenialReason::InvalidFlowType(
            raw.to_string(),
        )))
    })
}

fn ensure_allowed(decision: AuthorizationDecision) -> Result<AuthorizationDecision, AppError> {
    if decision.allowed {
        Ok(decision)
    } else {
        Err(decision.into())
    }
}

/// Reject callers working from a stale copy before any write is attempted.
fn check_version(task: &Task, expected_version: i64) -> Result<(), AppError> {
    if task.version == expected_version {
        Ok(())
    } else {
        Err(AppError::VersionConflict {
            task_id: task.id,
            expected: expected_version,
            actual: task.version,
        })
    }
}

pub struct TaskOrchestrator {
    authorization: Arc<AuthorizationService>,
    directory: Arc<dyn DirectoryStore>,
    tasks: Arc<dyn TaskStore>,
    locks: Arc<dyn LockStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    lock_ttl: Duration,
}

impl TaskOrchestrator {
    pub fn new(
        authorization: Arc<AuthorizationService>,
        directory: Arc<dyn DirectoryStore>,
        tasks: Arc<dyn TaskStore>,
        locks: Arc<dyn LockStore>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            authorization,
            directory,
            tasks,
            locks,
            notifier,
            lock_ttl: Duration::from_secs(DEFAULT_LOCK_TTL_SECS),
        }
    }

    pub fn from_config(
        authorization: Arc<AuthorizationService>,
        directory: Arc<dyn DirectoryStore>,
        tasks: Arc<dyn TaskStore>,
        locks: Arc<dyn LockStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: &Config,
    ) -> Self {
        Self::new(authorization, directory, tasks, locks, notifier).with_lock_ttl(config.lock_ttl())
    }

    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    async fn actor(&self, actor_id: Uuid) -> Result<User, AppError> {
        match self.directory.get_user(actor_id).await? {
            Some(user) if user.is_active() => Ok(user),
            Some(_) => Err(AuthorizationDecision::deny(DenialReason::ActorInactive).into()),
            None => Err(AuthorizationDecision::deny(DenialReason::ActorNotFound).into()),
        }
    }

    async fn notify(&self, event: NotificationEvent, task: &Task) {
        let payload = json!({
            "task_id": task.id,
            "company_id": task.company_id,
            "status": task.status,
            "version": task.version,
            "assigned_to_user_id": task.assigned_to_user_id,
            "assigned_to_department_id": task.assigned_to_department_id,
        });
        if let Err(e) = self.notifier.notify(event, payload).await {
            tracing::warn!(error = %e, task_id = %task.id, event = ?event, "Failed to dispatch notification");
        }
    }

    /// Assignee implied by an allowed creation request.
    fn resolve_assignee(
        flow_type: FlowType,
        request: &TaskCreationRequest,
        creator: &User,
    ) -> Result<TaskAssignee, AppError> {
        let assignee = match flow_type {
            FlowType::Descendant | FlowType::SameLevel => {
                request.target_user_id.map(TaskAssignee::User)
            }
            FlowType::Ascendant => request
                .target_user_id
                .or(creator.superior_id)
                .map(TaskAssignee::User),
            FlowType::ToDepartment => request.target_department_id.map(TaskAssignee::Department),
        };
        assignee.ok_or_else(|| AppError::InvalidInput("task target is required".to_string()))
    }

    fn record_escalation(task: &mut Task, actor_id: Uuid, decision: &AuthorizationDecision) {
        task.escalation_path = decision.escalation_path.clone();
        if decision.requires_escalation {
            task.record(
                TaskAction::Escalated,
                actor_id,
                json!({
                    "path": decision.escalation_path,
                    "approver_id": decision.escalation_path.last(),
                    "requires_approval": decision.requires_approval,
                }),
            );
        }
    }

    #[tracing::instrument(skip(self, input), fields(creator_id = %input.creator_id))]
    pub async fn create_task(&self, input: NewTask) -> Result<Task, AppError> {
        input.validate()?;
        let flow_type = parse_flow_type(&input.flow_type)?;

        let request = TaskCreationRequest {
            creator_id: input.creator_id,
            flow_type,
            target_user_id: input.target_user_id,
            target_department_id: input.target_department_id,
        };
        let decision =
            ensure_allowed(self.authorization.authorize_task_creation(&request).await?)?;

        let creator = self.actor(input.creator_id).await?;
        let assignee = Self::resolve_assignee(flow_type, &request, &creator)?;

        let mut task = Task::new(
            creator.company_id,
            creator.id,
            input.title,
            input.description,
            flow_type,
            assignee,
        );
        task.record(
            TaskAction::Created,
            creator.id,
            json!({
                "flow_type": flow_type,
                "assigned_to_user_id": task.assigned_to_user_id,
                "assigned_to_department_id": task.assigned_to_department_id,
            }),
        );
        Self::record_escalation(&mut task, creator.id, &decision);

        self.tasks.insert_task(&task).await?;

        tracing::info!(
            task_id = %task.id,
            company_id = %task.company_id,
            flow_type = %flow_type,
            escalated = decision.requires_escalation,
            "Task created"
        );

        self.notify(NotificationEvent::TaskAssigned, &task).await;
        Ok(task)
    }

    async fn acquire_task_lock(&self, actor: &User, task_id: Uuid) -> Result<String, AppError> {
        let resource = DistributedLock::resource_key(TASK_LOCK_RESOURCE, task_id);
        match self
            .locks
            .try_acquire(actor.company_id, &resource, actor.id, self.lock_ttl)
            .await?
        {
            LockAcquisition::Acquired(_) => Ok(resource),
            LockAcquisition::HeldBy { owner_id, .. } => {
                tracing::debug!(
                    resource = %resource,
                    holder = %owner_id,
                    "Task is being modified by another user"
                );
                Err(AppError::ResourceLocked {
                    resource,
                    holder: owner_id,
                })
            }
        }
    }

    async fn release_task_lock(&self, actor: &User, resource: &str) {
        match self
            .locks
            .release(actor.company_id, resource, actor.id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(resource = %resource, "Task lock was no longer held on release")
            }
            Err(e) => tracing::warn!(error = %e, resource = %resource, "Failed to release task lock"),
        }
    }

    async fn load_task(&self, actor: &User, task_id: Uuid) -> Result<Task, AppError> {
        self.tasks
            .get_task(actor.company_id, task_id)
            .await?
            .ok_or_else(|| AppError::from(AuthorizationDecision::deny(DenialReason::TaskNotFound)))
    }

    /// Move a task to another board column.
    #[tracing::instrument(skip(self))]
    pub async fn move_task(
        &self,
        actor_id: Uuid,
        task_id: Uuid,
        to_status: TaskStatus,
        expected_version: i64,
    ) -> Result<Task, AppError> {
        let actor = self.actor(actor_id).await?;
        let resource = self.acquire_task_lock(&actor, task_id).await?;
        let result = self
            .move_locked(&actor, task_id, to_status, expected_version)
            .await;
        self.release_task_lock(&actor, &resource).await;

        let task = result?;
        tracing::info!(
            task_id = %task.id,
            status = %task.status,
            version = task.version,
            "Task moved"
        );
        self.notify(NotificationEvent::TaskMoved, &task).await;
        Ok(task)
    }

    async fn move_locked(
        &self,
        actor: &User,
        task_id: Uuid,
        to_status: TaskStatus,
        expected_version: i64,
    ) -> Result<Task, AppError> {
        let mut task = self.load_task(actor, task_id).await?;
        ensure_allowed(self.authorization.board_move_decision(actor, &task).await?)?;
        check_version(&task, expected_version)?;

        if !task.status.can_transition_to(to_status) {
            return Err(AppError::InvalidInput(format!(
                "Transição de status inválida: {} → {}",
                task.status, to_status
            )));
        }

        let from_status = task.status;
        task.status = to_status;
        task.record(
            TaskAction::Moved,
            actor.id,
            json!({ "from": from_status, "to": to_status }),
        );
        self.tasks
            .update_task_versioned(&task, expected_version)
            .await
    }

    /// Point a task at a new assignee, authorized like a fresh creation by the actor.
    #[tracing::instrument(skip(self, input), fields(actor_id = %input.actor_id, task_id = %input.task_id))]
    pub async fn reassign_task(&self, input: ReassignTask) -> Result<Task, AppError> {
        input.validate()?;
        let flow_type = parse_flow_type(&input.flow_type)?;

        let actor = self.actor(input.actor_id).await?;
        let resource = self.acquire_task_lock(&actor, input.task_id).await?;
        let result = self.reassign_locked(&actor, flow_type, &input).await;
        self.release_task_lock(&actor, &resource).await;

        let task = result?;
        tracing::info!(
            task_id = %task.id,
            version = task.version,
            assigned_to_user_id = ?task.assigned_to_user_id,
            assigned_to_department_id = ?task.assigned_to_department_id,
            "Task reassigned"
        );
        self.notify(NotificationEvent::TaskReassigned, &task).await;
        Ok(task)
    }

    async fn reassign_locked(
        &self,
        actor: &User,
        flow_type: FlowType,
        input: &ReassignTask,
    ) -> Result<Task, AppError> {
        let mut task = self.load_task(actor, input.task_id).await?;

        let owns_task =
            task.created_by_id == actor.id || task.assigned_to_user_id == Some(actor.id);
        if !owns_task
            && !self
                .authorization
                .catalog()
                .grants(actor.role_id, Permission::TaskEditAll)
        {
            return Err(AuthorizationDecision::deny(DenialReason::NotTaskOwner).into());
        }
        check_version(&task, input.expected_version)?;

        let request = TaskCreationRequest {
            creator_id: actor.id,
            flow_type,
            target_user_id: input.target_user_id,
            target_department_id: input.target_department_id,
        };
        let decision =
            ensure_allowed(self.authorization.authorize_task_creation(&request).await?)?;
        let assignee = Self::resolve_assignee(flow_type, &request, actor)?;

        let previous = json!({
            "assigned_to_user_id": task.assigned_to_user_id,
            "assigned_to_department_id": task.assigned_to_department_id,
        });
        task.assign(assignee);
        task.flow_type = flow_type;
        task.record(
            TaskAction::Reassigned,
            actor.id,
            json!({
                "from": previous,
                "flow_type": flow_type,
                "assigned_to_user_id": task.assigned_to_user_id,
                "assigned_to_department_id": task.assigned_to_department_id,
            }),
        );
        Self::record_escalation(&mut task, actor.id, &decision);

        self.tasks
            .update_task_versioned(&task, input.expected_version)
            .await
    }
}
