//! Hierarchy service
//!
//! Sole writer of `hierarchy_path` / `hierarchy_level`. Handles path repair,
//! safe deactivation with subordinate reparenting, reparenting, and the
//! company-wide integrity sweep.

mod report;

pub use report::{
    DeactivationReport, HierarchyIssue, HierarchyPath, HierarchyValidation, PathRepairReport,
};

use chrono::Utc;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use taskflow_core::constants::{MAX_HIERARCHY_DEPTH, MAX_INTEGRITY_WALK};
use taskflow_core::models::{Department, User, UserStatus};
use taskflow_core::{AppError, AuditAction, AuditEvent, AuditSink, IntegrityViolation};
use taskflow_db::{DirectoryStore, Precondition, WriteBatch, WriteOp};
use uuid::Uuid;

#[derive(Clone)]
pub struct HierarchyService {
    directory: Arc<dyn DirectoryStore>,
    audit: Arc<dyn AuditSink>,
}

impl HierarchyService {
    pub fn new(directory: Arc<dyn DirectoryStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { directory, audit }
    }

    async fn require_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.directory.get_user(user_id).await?.ok_or_else(|| {
            AppError::Integrity(IntegrityViolation::MissingEntity {
                kind: "user",
                id: user_id,
            })
        })
    }

    async fn emit(&self, event: AuditEvent) {
        let action = event.action;
        if let Err(e) = self.audit.record(event).await {
            tracing::warn!(error = %e, action = ?action, "Failed to record audit event");
        }
    }

    /// Walk `superior_id` upward from `user_id` and build the root-first path.
    #[tracing::instrument(skip(self))]
    pub async fn calculate_hierarchy_path(&self, user_id: Uuid) -> Result<HierarchyPath, AppError> {
        let user = self
            .directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;

        let mut reversed = vec![user.id];
        let mut seen = HashSet::from([user.id]);
        let mut current = user.superior_id;
        let mut truncated = false;

        while let Some(superior_id) = current {
            if reversed.len() > MAX_HIERARCHY_DEPTH {
                tracing::warn!(
                    user_id = %user_id,
                    max_depth = MAX_HIERARCHY_DEPTH,
                    "Hierarchy walk hit the depth bound"
                );
                truncated = true;
                break;
            }
            if !seen.insert(superior_id) {
                tracing::warn!(
                    user_id = %user_id,
                    revisited = %superior_id,
                    "Cycle detected while walking the hierarchy"
                );
                truncated = true;
                break;
            }
            match self.directory.get_user(superior_id).await? {
                Some(superior) => {
                    reversed.push(superior.id);
                    current = superior.superior_id;
                }
                None => {
                    tracing::warn!(
                        user_id = %user_id,
                        missing = %superior_id,
                        "Superior referenced in chain does not exist"
                    );
                    break;
                }
            }
        }

        reversed.reverse();
        let level = (reversed.len() - 1) as i32;
        Ok(HierarchyPath {
            path: reversed,
            level,
            truncated,
        })
    }

    /// Recompute and persist the path of `user_id` and of its whole subtree.
    ///
    /// Breadth-first over direct subordinates with a visited set, so a corrupted
    /// graph terminates. Only records whose path or level changed are written.
    #[tracing::instrument(skip(self))]
    pub async fn update_hierarchy_path(&self, user_id: Uuid) -> Result<PathRepairReport, AppError> {
        let mut report = PathRepairReport::default();
        let computed = self.calculate_hierarchy_path(user_id).await?;
        if computed.truncated {
            report
                .anomalies
                .push(format!("caminho truncado para o usuário {}", user_id));
        }

        let user = self.require_user(user_id).await?;
        if self.persist_path(&user, &computed.path).await? {
            report.updated += 1;
        }
        report.visited += 1;

        let mut visited = HashSet::from([user_id]);
        let mut frontier = VecDeque::from([(user_id, computed.path)]);

        while let Some((parent_id, parent_path)) = frontier.pop_front() {
            for child in self.directory.list_users_by_superior(parent_id).await? {
                if !visited.insert(child.id) {
                    tracing::warn!(
                        user_id = %child.id,
                        superior_id = %parent_id,
                        "Cycle detected during path repair"
                    );
                    report
                        .anomalies
                        .push(format!("ciclo detectado no usuário {}", child.id));
                    continue;
                }

                let mut child_path = parent_path.clone();
                child_path.push(child.id);
                if self.persist_path(&child, &child_path).await? {
                    report.updated += 1;
                }
                report.visited += 1;
                frontier.push_back((child.id, child_path));
            }
        }

        tracing::debug!(
            user_id = %user_id,
            visited = report.visited,
            updated = report.updated,
            "Hierarchy paths repaired"
        );
        Ok(report)
    }

    async fn persist_path(&self, user: &User, path: &[Uuid]) -> Result<bool, AppError> {
        let level = (path.len() - 1) as i32;
        if user.hierarchy_path == path && user.hierarchy_level == level {
            return Ok(false);
        }
        self.directory
            .update_hierarchy_path(user.id, path, level)
            .await?;
        Ok(true)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_direct_subordinates(&self, user_id: Uuid) -> Result<Vec<User>, AppError> {
        self.directory.list_users_by_superior(user_id).await
    }

    /// Transitive subordinates by stored path membership.
    #[tracing::instrument(skip(self))]
    pub async fn get_all_subordinates(&self, user_id: Uuid) -> Result<Vec<User>, AppError> {
        self.directory.list_users_with_path_containing(user_id).await
    }

    /// True when `target` appears on the live superior chain starting at `start`.
    async fn chain_contains(&self, start: Uuid, target: Uuid) -> Result<bool, AppError> {
        let mut current = Some(start);
        let mut seen = HashSet::new();
        while let Some(id) = current {
            if id == target {
                return Ok(true);
            }
            if !seen.insert(id) || seen.len() > MAX_HIERARCHY_DEPTH {
                break;
            }
            current = match self.directory.get_user(id).await? {
                Some(user) => user.superior_id,
                None => None,
            };
        }
        Ok(false)
    }

    /// Check that `candidate` may become the superior of `user`.
    async fn validate_new_superior(&self, user: &User, candidate_id: Uuid) -> Result<User, AppError> {
        if candidate_id == user.id {
            return Err(IntegrityViolation::SelfSuperior(user.id).into());
        }
        let candidate = self.require_user(candidate_id).await?;
        if !candidate.is_active() {
            return Err(IntegrityViolation::InactiveSuperior(candidate_id).into());
        }
        if candidate.company_id != user.company_id {
            return Err(IntegrityViolation::CrossCompany {
                user_id: user.id,
                other_id: candidate_id,
            }
            .into());
        }
        if candidate.has_ancestor(user.id) || self.chain_contains(candidate_id, user.id).await? {
            tracing::warn!(
                user_id = %user.id,
                superior_id = %candidate_id,
                "Rejected reparent that would create a cycle"
            );
            return Err(IntegrityViolation::CycleDetected {
                user_id: user.id,
                superior_id: candidate_id,
            }
            .into());
        }
        Ok(candidate)
    }

    /// Deactivate a user, reparenting its direct subordinates and handing over
    /// any department it led, in one atomic batch.
    #[tracing::instrument(skip(self, reason))]
    pub async fn deactivate_user_safely(
        &self,
        user_id: Uuid,
        actor_id: Uuid,
        reason: Option<String>,
        new_superior_id: Option<Uuid>,
    ) -> Result<DeactivationReport, AppError> {
        let user = self.require_user(user_id).await?;
        if user.status == UserStatus::Inactive {
            return Err(IntegrityViolation::AlreadyInactive(user_id).into());
        }

        let subordinates = self.directory.list_users_by_superior(user_id).await?;
        let replacement = match new_superior_id {
            Some(candidate_id) => Some(self.validate_new_superior(&user, candidate_id).await?.id),
            None => user.superior_id,
        };

        if !subordinates.is_empty() {
            match replacement {
                None => {
                    return Err(IntegrityViolation::OrphanedSubtree {
                        user_id,
                        subordinates: subordinates.len(),
                    }
                    .into());
                }
                Some(superior_id) if new_superior_id.is_none() => {
                    // Subordinates only inherit an active superior.
                    let superior = self.require_user(superior_id).await?;
                    if !superior.is_active() {
                        return Err(IntegrityViolation::InactiveSuperior(superior_id).into());
                    }
                }
                Some(_) => {}
            }
        }

        let mut batch = WriteBatch::new();
        batch.expect(Precondition::UserStatus {
            user_id,
            status: user.status,
        });
        if let (Some(superior_id), false) = (replacement, subordinates.is_empty()) {
            batch.expect(Precondition::UserStatus {
                user_id: superior_id,
                status: UserStatus::Active,
            });
        }
        for subordinate in &subordinates {
            batch
                .expect(Precondition::SuperiorIs {
                    user_id: subordinate.id,
                    superior_id: Some(user_id),
                })
                .push(WriteOp::SetSuperior {
                    user_id: subordinate.id,
                    superior_id: replacement,
                });
        }
        batch.push(WriteOp::DeactivateUser {
            user_id,
            actor_id,
            reason: reason.clone(),
            at: Utc::now(),
        });

        let departments = self.directory.list_departments_led_by(user_id).await?;
        let mut handovers = Vec::with_capacity(departments.len());
        for department in &departments {
            handovers.push(
                self.plan_department_handover(&mut batch, department, user_id, actor_id)
                    .await?,
            );
        }

        self.directory.commit(batch).await?;

        tracing::info!(
            user_id = %user_id,
            actor_id = %actor_id,
            reallocated = subordinates.len(),
            departments = departments.len(),
            "User deactivated"
        );

        self.emit(AuditEvent::new(
            user.company_id,
            actor_id,
            AuditAction::UserDeactivated,
            user_id,
            json!({
                "reason": reason,
                "new_superior_id": replacement,
                "reallocated_subordinates": subordinates.iter().map(|s| s.id).collect::<Vec<_>>(),
            }),
        ))
        .await;
        for event in handovers {
            self.emit(event).await;
        }

        let mut errors = Vec::new();
        for subordinate in &subordinates {
            if let Err(e) = self.update_hierarchy_path(subordinate.id).await {
                tracing::warn!(
                    error = %e,
                    user_id = %subordinate.id,
                    "Failed to repair path after deactivation"
                );
                errors.push(format!("{}: {}", subordinate.id, e));
            }
        }

        Ok(DeactivationReport {
            success: true,
            reallocated_subordinates: subordinates.len(),
            errors,
        })
    }

    /// Append the leadership change for one department the departing user
    /// leads. Returns the audit event to emit once the batch is committed.
    async fn plan_department_handover(
        &self,
        batch: &mut WriteBatch,
        department: &Department,
        departing_id: Uuid,
        actor_id: Uuid,
    ) -> Result<AuditEvent, AppError> {
        let leadership_event = |leader_id: Option<Uuid>| {
            AuditEvent::new(
                department.company_id,
                actor_id,
                AuditAction::DepartmentLeaderChanged,
                department.id,
                json!({
                    "previous_leader_id": department.leader_id,
                    "previous_fallback_leader_id": department.fallback_leader_id,
                    "leader_id": leader_id,
                    "departing_user_id": departing_id,
                }),
            )
        };

        if department.leader_id != Some(departing_id) {
            // Only the fallback slot is vacated.
            batch.push(WriteOp::SetDepartmentLeadership {
                department_id: department.id,
                leader_id: department.leader_id,
                fallback_leader_id: None,
            });
            return Ok(leadership_event(department.leader_id));
        }

        if let Some(fallback_id) = department.fallback_leader_id {
            if fallback_id != departing_id {
                if let Some(fallback) = self.directory.get_user(fallback_id).await? {
                    if fallback.is_active() {
                        tracing::info!(
                            department_id = %department.id,
                            leader_id = %fallback_id,
                            "Fallback leader promoted"
                        );
                        batch.push(WriteOp::SetDepartmentLeadership {
                            department_id: department.id,
                            leader_id: Some(fallback_id),
                            fallback_leader_id: None,
                        });
                        return Ok(leadership_event(Some(fallback_id)));
                    }
                }
            }
        }

        let most_tenured = self
            .directory
            .list_users_by_department(department.id)
            .await?
            .into_iter()
            .filter(|member| member.id != departing_id && member.is_active())
            .min_by_key(|member| (member.created_at, member.id));

        match most_tenured {
            Some(member) => {
                tracing::info!(
                    department_id = %department.id,
                    leader_id = %member.id,
                    "Most tenured member promoted to department leader"
                );
                batch.push(WriteOp::SetDepartmentLeadership {
                    department_id: department.id,
                    leader_id: Some(member.id),
                    fallback_leader_id: None,
                });
                Ok(leadership_event(Some(member.id)))
            }
            None => {
                tracing::info!(
                    department_id = %department.id,
                    "No replacement leader found, deactivating department"
                );
                batch
                    .push(WriteOp::SetDepartmentLeadership {
                        department_id: department.id,
                        leader_id: None,
                        fallback_leader_id: None,
                    })
                    .push(WriteOp::DeactivateDepartment {
                        department_id: department.id,
                    });
                Ok(AuditEvent::new(
                    department.company_id,
                    actor_id,
                    AuditAction::DepartmentDeactivated,
                    department.id,
                    json!({
                        "previous_leader_id": department.leader_id,
                        "departing_user_id": departing_id,
                    }),
                ))
            }
        }
    }

    /// Reparent `user_id` under `new_superior_id` and repair the moved subtree.
    #[tracing::instrument(skip(self))]
    pub async fn move_user_to_new_superior(
        &self,
        user_id: Uuid,
        new_superior_id: Uuid,
        actor_id: Uuid,
    ) -> Result<PathRepairReport, AppError> {
        let user = self.require_user(user_id).await?;
        self.validate_new_superior(&user, new_superior_id).await?;

        if user.superior_id != Some(new_superior_id) {
            let mut batch = WriteBatch::new();
            batch
                .expect(Precondition::SuperiorIs {
                    user_id,
                    superior_id: user.superior_id,
                })
                .expect(Precondition::UserStatus {
                    user_id: new_superior_id,
                    status: UserStatus::Active,
                })
                .push(WriteOp::SetSuperior {
                    user_id,
                    superior_id: Some(new_superior_id),
                });
            self.directory.commit(batch).await?;

            tracing::info!(
                user_id = %user_id,
                actor_id = %actor_id,
                previous_superior_id = ?user.superior_id,
                new_superior_id = %new_superior_id,
                "User reparented"
            );

            self.emit(AuditEvent::new(
                user.company_id,
                actor_id,
                AuditAction::UserReparented,
                user_id,
                json!({
                    "previous_superior_id": user.superior_id,
                    "new_superior_id": new_superior_id,
                }),
            ))
            .await;
        }

        self.update_hierarchy_path(user_id).await
    }

    /// Sweep every active user of the company. Never fails.
    #[tracing::instrument(skip(self))]
    pub async fn validate_company_hierarchy(&self, company_id: Uuid) -> HierarchyValidation {
        let users = match self.directory.list_users_by_company(company_id, None).await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(error = %e, company_id = %company_id, "Hierarchy validation could not load users");
                return HierarchyValidation::from_issues(vec![HierarchyIssue::StoreUnavailable {
                    message: e.to_string(),
                }]);
            }
        };

        let index: HashMap<Uuid, &User> = users.iter().map(|u| (u.id, u)).collect();
        let active: Vec<&User> = users.iter().filter(|u| u.is_active()).collect();
        let mut issues = Vec::new();

        let roots: Vec<Uuid> = active
            .iter()
            .filter(|u| u.superior_id.is_none())
            .map(|u| u.id)
            .collect();
        if roots.len() > 1 {
            issues.push(HierarchyIssue::MultipleRoots { roots });
        }

        for user in &active {
            if let Some(superior_id) = user.superior_id {
                match index.get(&superior_id) {
                    None => issues.push(HierarchyIssue::MissingSuperior {
                        user_id: user.id,
                        superior_id,
                    }),
                    Some(superior) if !superior.is_active() => {
                        issues.push(HierarchyIssue::InactiveSuperior {
                            user_id: user.id,
                            superior_id,
                        })
                    }
                    Some(_) => {}
                }
            }

            match walk_chain(user, &index) {
                ChainEnd::Root(mut chain) => {
                    chain.reverse();
                    if user.hierarchy_path != chain
                        || user.hierarchy_level != (chain.len() - 1) as i32
                    {
                        issues.push(HierarchyIssue::StalePath { user_id: user.id });
                    }
                }
                ChainEnd::Broken => {}
                ChainEnd::Cycle => {
                    tracing::warn!(user_id = %user.id, "Cycle found during hierarchy validation");
                    issues.push(HierarchyIssue::Cycle { user_id: user.id });
                }
                ChainEnd::TooDeep => {
                    tracing::warn!(
                        user_id = %user.id,
                        max_hops = MAX_INTEGRITY_WALK,
                        "Hierarchy validation walk hit its bound"
                    );
                    issues.push(HierarchyIssue::ExcessiveDepth {
                        user_id: user.id,
                        hops: MAX_INTEGRITY_WALK,
                    });
                }
            }
        }

        let validation = HierarchyValidation::from_issues(issues);
        tracing::debug!(
            company_id = %company_id,
            users = active.len(),
            issues = validation.issues.len(),
            "Hierarchy validated"
        );
        validation
    }

    /// Repair paths from every root of the company.
    #[tracing::instrument(skip(self))]
    pub async fn repair_company_paths(&self, company_id: Uuid) -> Result<PathRepairReport, AppError> {
        let users = self.directory.list_users_by_company(company_id, None).await?;
        let ids: HashSet<Uuid> = users.iter().map(|u| u.id).collect();

        let mut report = PathRepairReport::default();
        for root in users
            .iter()
            .filter(|u| u.superior_id.map_or(true, |s| !ids.contains(&s)))
        {
            report.merge(self.update_hierarchy_path(root.id).await?);
        }

        tracing::info!(
            company_id = %company_id,
            visited = report.visited,
            updated = report.updated,
            "Company hierarchy paths repaired"
        );
        Ok(report)
    }
}

enum ChainEnd {
    /// Reached a root; carries the chain from the user upward.
    Root(Vec<Uuid>),
    /// A superior in the chain is missing.
    Broken,
    Cycle,
    TooDeep,
}

fn walk_chain<'a>(user: &'a User, index: &HashMap<Uuid, &'a User>) -> ChainEnd {
    let mut chain = vec![user.id];
    let mut seen = HashSet::from([user.id]);
    let mut current = user;

    loop {
        let Some(superior_id) = current.superior_id else {
            return ChainEnd::Root(chain);
        };
        if chain.len() > MAX_INTEGRITY_WALK {
            return ChainEnd::TooDeep;
        }
        if !seen.insert(superior_id) {
            return ChainEnd::Cycle;
        }
        match index.get(&superior_id) {
            Some(superior) => {
                chain.push(superior_id);
                current = *superior;
            }
            None => return ChainEnd::Broken,
        }
    }
}
