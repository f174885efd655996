mod helpers;

use helpers::{seed_chain, Chain, TestCompany};
use std::time::Duration;
use taskflow_core::constants::TASK_LOCK_RESOURCE;
use taskflow_core::models::{
    DenialReason, DistributedLock, FlowType, SystemRole, Task, TaskAction, TaskAssignee,
    TaskStatus, UserStatus,
};
use taskflow_core::{AppError, NotificationEvent};
use taskflow_db::{LockStore, TaskStore};
use taskflow_services::{NewTask, ReassignTask};
use uuid::Uuid;

fn new_task(creator_id: Uuid, flow_type: &str, target_user_id: Option<Uuid>) -> NewTask {
    NewTask {
        creator_id,
        title: "Preparar relatório trimestral".to_string(),
        description: Some("Consolidar números de vendas".to_string()),
        flow_type: flow_type.to_string(),
        target_user_id,
        target_department_id: None,
    }
}

fn denial(result: &Result<Task, AppError>) -> Option<DenialReason> {
    match result {
        Err(AppError::Denied(decision)) => decision.reason.clone(),
        _ => None,
    }
}

async fn delegated_task(company: &TestCompany, chain: &Chain) -> Task {
    company
        .orchestrator()
        .create_task(new_task(
            chain.manager.id,
            "DESCENDANT",
            Some(chain.analyst.id),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_create_task_assigns_and_notifies() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;

    let task = delegated_task(&company, &chain).await;
    assert_eq!(task.assignee(), Some(TaskAssignee::User(chain.analyst.id)));
    assert_eq!(task.created_by_id, chain.manager.id);
    assert_eq!(task.flow_type, FlowType::Descendant);
    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(task.version, 1);
    assert_eq!(task.history.len(), 1);
    assert_eq!(task.history[0].action, TaskAction::Created);

    let stored = company
        .store
        .get_task(company.company.id, task.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, task);
    assert_eq!(company.notifier.events(), vec![NotificationEvent::TaskAssigned]);
}

#[tokio::test]
async fn test_create_task_rejects_bad_input_and_denials() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let orchestrator = company.orchestrator();

    let mut blank = new_task(chain.manager.id, "DESCENDANT", Some(chain.analyst.id));
    blank.title = String::new();
    let result = orchestrator.create_task(blank).await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));

    let result = orchestrator
        .create_task(new_task(chain.manager.id, "SIDEWAYS", Some(chain.analyst.id)))
        .await;
    assert_eq!(
        denial(&result),
        Some(DenialReason::InvalidFlowType("SIDEWAYS".to_string()))
    );

    let result = orchestrator
        .create_task(new_task(chain.analyst.id, "DESCENDANT", Some(chain.manager.id)))
        .await;
    assert_eq!(denial(&result), Some(DenialReason::NotSubordinate));

    assert!(company.notifier.events().is_empty());
}

#[tokio::test]
async fn test_escalated_department_task_keeps_path() {
    let company = TestCompany::with_cross_department(true).await;
    let chain = seed_chain(&company).await;
    let ops = company.add_department("Operações", Some(&chain.ceo)).await;

    let task = company
        .orchestrator()
        .create_task(NewTask {
            target_department_id: Some(ops.id),
            ..new_task(chain.analyst.id, "to_department", None)
        })
        .await
        .unwrap();

    assert_eq!(task.assignee(), Some(TaskAssignee::Department(ops.id)));
    assert_eq!(task.escalation_path, vec![chain.analyst.id, chain.manager.id]);
    let actions: Vec<TaskAction> = task.history.iter().map(|h| h.action).collect();
    assert_eq!(actions, vec![TaskAction::Created, TaskAction::Escalated]);
}

#[tokio::test]
async fn test_assignee_moves_task_through_board() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let task = delegated_task(&company, &chain).await;
    let orchestrator = company.orchestrator();

    let moved = orchestrator
        .move_task(chain.analyst.id, task.id, TaskStatus::InProgress, 1)
        .await
        .unwrap();
    assert_eq!(moved.status, TaskStatus::InProgress);
    assert_eq!(moved.version, 2);
    assert_eq!(moved.history.last().unwrap().action, TaskAction::Moved);
    assert_eq!(company.store.lock_count().await, 0);

    let result = orchestrator
        .move_task(chain.analyst.id, task.id, TaskStatus::Done, 2)
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));

    let result = orchestrator
        .move_task(chain.manager.id, task.id, TaskStatus::Review, 2)
        .await;
    assert_eq!(denial(&result), Some(DenialReason::NotAssignee));

    let result = orchestrator
        .move_task(chain.analyst.id, Uuid::new_v4(), TaskStatus::Review, 1)
        .await;
    assert_eq!(denial(&result), Some(DenialReason::TaskNotFound));

    assert_eq!(
        company.notifier.events(),
        vec![NotificationEvent::TaskAssigned, NotificationEvent::TaskMoved]
    );
    assert_eq!(company.store.lock_count().await, 0);
}

#[tokio::test]
async fn test_stale_version_is_rejected_not_overwritten() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let mut sales = company.add_department("Vendas", Some(&chain.manager)).await;
    sales.fallback_leader_id = Some(chain.ceo.id);
    company.store.insert_department(sales.clone()).await;

    let task = Task::new(
        company.company.id,
        chain.analyst.id,
        "Revisar contrato",
        None,
        FlowType::ToDepartment,
        TaskAssignee::Department(sales.id),
    );
    company.store.insert_task(&task).await.unwrap();
    let orchestrator = company.orchestrator();

    let first = orchestrator
        .move_task(chain.manager.id, task.id, TaskStatus::InProgress, 1)
        .await
        .unwrap();
    assert_eq!(first.version, 2);

    let second = orchestrator
        .move_task(chain.ceo.id, task.id, TaskStatus::Blocked, 1)
        .await;
    assert!(matches!(
        second,
        Err(AppError::VersionConflict { expected: 1, actual: 2, .. })
    ));

    let stored = company
        .store
        .get_task(company.company.id, task.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, TaskStatus::InProgress);
    assert_eq!(stored.version, 2);
    assert_eq!(company.store.lock_count().await, 0);
}

#[tokio::test]
async fn test_move_rejected_while_locked_until_expiry() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let task = delegated_task(&company, &chain).await;
    let key = DistributedLock::resource_key(TASK_LOCK_RESOURCE, task.id);
    let orchestrator = company.orchestrator();

    company
        .store
        .try_acquire(company.company.id, &key, chain.manager.id, Duration::from_secs(60))
        .await
        .unwrap();
    let result = orchestrator
        .move_task(chain.analyst.id, task.id, TaskStatus::InProgress, 1)
        .await;
    assert!(matches!(
        result,
        Err(AppError::ResourceLocked { holder, .. }) if holder == chain.manager.id
    ));
    assert!(result.unwrap_err().is_concurrency_conflict());

    // An expired lease can be taken over.
    company
        .store
        .try_acquire(company.company.id, &key, chain.manager.id, Duration::ZERO)
        .await
        .unwrap();
    let moved = orchestrator
        .move_task(chain.analyst.id, task.id, TaskStatus::InProgress, 1)
        .await
        .unwrap();
    assert_eq!(moved.version, 2);
    assert_eq!(company.store.lock_count().await, 0);
}

#[tokio::test]
async fn test_inactive_actor_cannot_move() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let task = delegated_task(&company, &chain).await;

    let mut analyst = chain.analyst.clone();
    analyst.status = UserStatus::Inactive;
    company.put_user(&analyst).await;

    let result = company
        .orchestrator()
        .move_task(analyst.id, task.id, TaskStatus::InProgress, 1)
        .await;
    assert_eq!(denial(&result), Some(DenialReason::ActorInactive));

    let decision = company
        .authorization()
        .authorize_board_move(analyst.id, task.id)
        .await
        .unwrap();
    assert_eq!(decision.reason, Some(DenialReason::ActorInactive));
}

#[tokio::test]
async fn test_creator_reassigns_task() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let peer = company
        .add_user("Paulo", SystemRole::Analyst, Some(&chain.manager))
        .await;
    let task = delegated_task(&company, &chain).await;

    let reassigned = company
        .orchestrator()
        .reassign_task(ReassignTask {
            actor_id: chain.manager.id,
            task_id: task.id,
            flow_type: "DESCENDANT".to_string(),
            target_user_id: Some(peer.id),
            target_department_id: None,
            expected_version: 1,
        })
        .await
        .unwrap();

    assert_eq!(reassigned.assignee(), Some(TaskAssignee::User(peer.id)));
    assert_eq!(reassigned.version, 2);
    assert_eq!(
        reassigned.history.last().unwrap().action,
        TaskAction::Reassigned
    );
    assert_eq!(
        company.notifier.events(),
        vec![
            NotificationEvent::TaskAssigned,
            NotificationEvent::TaskReassigned
        ]
    );
    assert_eq!(company.store.lock_count().await, 0);
}

#[tokio::test]
async fn test_unrelated_user_cannot_reassign() {
    let company = TestCompany::new().await;
    let chain = seed_chain(&company).await;
    let outsider = company
        .add_user("Otávio", SystemRole::Coordinator, Some(&chain.ceo))
        .await;
    let task = delegated_task(&company, &chain).await;

    let result = company
        .orchestrator()
        .reassign_task(ReassignTask {
            actor_id: outsider.id,
            task_id: task.id,
            flow_type: "ASCENDANT".to_string(),
            target_user_id: None,
            target_department_id: None,
            expected_version: 1,
        })
        .await;
    assert_eq!(denial(&result), Some(DenialReason::NotTaskOwner));
    assert_eq!(company.store.lock_count().await, 0);

    let stored = company
        .store
        .get_task(company.company.id, task.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 1);
}
