use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

use super::Permission;

/// Why an authorization request was refused.
///
/// `Display` yields the user-facing message, rendered verbatim by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialReason {
    ActorNotFound,
    ActorInactive,
    MissingPermission(Permission),
    InvalidFlowType(String),
    TargetRequired,
    TargetNotFound,
    TargetInactive,
    TargetInOtherCompany,
    SelfTarget,
    NoSuperior,
    NotSubordinate,
    NotSuperior,
    NotSameLevel,
    DepartmentRequired,
    DepartmentNotFound,
    DepartmentInactive,
    DepartmentInOtherCompany,
    DepartmentWithoutLeader,
    CommunicationNotAllowed,
    EscalationExhausted,
    TaskNotFound,
    InvalidAssignment,
    NotAssignee,
    NotDepartmentLeader,
    NotTaskOwner,
}

impl Display for DenialReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DenialReason::ActorNotFound => write!(f, "Usuário não encontrado"),
            DenialReason::ActorInactive => write!(f, "Usuário inativo"),
            DenialReason::MissingPermission(p) => {
                write!(f, "Usuário não possui a permissão {}", p)
            }
            DenialReason::InvalidFlowType(raw) => write!(f, "Tipo de fluxo inválido: {}", raw),
            DenialReason::TargetRequired => write!(f, "Usuário alvo é obrigatório"),
            DenialReason::TargetNotFound => write!(f, "Usuário alvo não encontrado"),
            DenialReason::TargetInactive => write!(f, "Usuário alvo está inativo"),
            DenialReason::TargetInOtherCompany => {
                write!(f, "Usuário alvo pertence a outra empresa")
            }
            DenialReason::SelfTarget => write!(f, "O usuário alvo não pode ser o próprio criador"),
            DenialReason::NoSuperior => write!(f, "Usuário não possui superior imediato"),
            DenialReason::NotSubordinate => {
                write!(f, "O usuário alvo não é subordinado do criador")
            }
            DenialReason::NotSuperior => write!(f, "O usuário alvo não é superior do criador"),
            DenialReason::NotSameLevel => {
                write!(f, "O usuário alvo não está no mesmo nível hierárquico")
            }
            DenialReason::DepartmentRequired => write!(f, "Departamento alvo é obrigatório"),
            DenialReason::DepartmentNotFound => write!(f, "Departamento não encontrado"),
            DenialReason::DepartmentInactive => write!(f, "Departamento inativo"),
            DenialReason::DepartmentInOtherCompany => {
                write!(f, "Departamento pertence a outra empresa")
            }
            DenialReason::DepartmentWithoutLeader => {
                write!(f, "Departamento não possui líder ativo")
            }
            DenialReason::CommunicationNotAllowed => {
                write!(f, "Comunicação entre os departamentos não é permitida")
            }
            DenialReason::EscalationExhausted => write!(
                f,
                "Nenhum superior com permissão foi encontrado na cadeia hierárquica"
            ),
            DenialReason::TaskNotFound => write!(f, "Tarefa não encontrada"),
            DenialReason::InvalidAssignment => write!(f, "Tarefa sem atribuição válida"),
            DenialReason::NotAssignee => {
                write!(f, "Apenas o responsável pela tarefa pode movê-la")
            }
            DenialReason::NotDepartmentLeader => {
                write!(f, "Apenas o líder do departamento pode mover a tarefa")
            }
            DenialReason::NotTaskOwner => {
                write!(f, "Sem permissão para reatribuir esta tarefa")
            }
        }
    }
}

/// Result of a policy decision. A denial is a normal value, not a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: Option<DenialReason>,
    /// Set when the decision involved walking up the creator's superior chain.
    pub requires_escalation: bool,
    /// Creator first, then every active ancestor visited.
    pub escalation_path: Vec<Uuid>,
    /// Copied from the department communication rule that permitted the request.
    pub requires_approval: bool,
}

impl AuthorizationDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            requires_escalation: false,
            escalation_path: Vec::new(),
            requires_approval: false,
        }
    }

    pub fn deny(reason: DenialReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            requires_escalation: false,
            escalation_path: Vec::new(),
            requires_approval: false,
        }
    }

    pub fn escalated(path: Vec<Uuid>) -> Self {
        Self {
            requires_escalation: true,
            escalation_path: path,
            ..Self::allow()
        }
    }

    pub fn escalation_denied(reason: DenialReason, path: Vec<Uuid>) -> Self {
        Self {
            requires_escalation: true,
            escalation_path: path,
            ..Self::deny(reason)
        }
    }

    pub fn with_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval;
        self
    }

    pub fn reason_text(&self) -> Option<String> {
        self.reason.as_ref().map(|r| r.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_keeps_escalation_path() {
        let path = vec![Uuid::new_v4(), Uuid::new_v4()];
        let decision =
            AuthorizationDecision::escalation_denied(DenialReason::EscalationExhausted, path.clone());
        assert!(!decision.allowed);
        assert!(decision.requires_escalation);
        assert_eq!(decision.escalation_path, path);
        assert!(decision.reason_text().unwrap().contains("cadeia"));
    }

    #[test]
    fn test_reason_serializes_with_code() {
        let decision = AuthorizationDecision::deny(DenialReason::MissingPermission(
            Permission::TaskCreateDown,
        ));
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["reason"]["code"], "MISSING_PERMISSION");
        assert_eq!(json["reason"]["detail"], "TASK_CREATE_DOWN");
    }
}
