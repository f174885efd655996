use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use uuid::Uuid;

/// Materialized path computed from the live superior chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyPath {
    /// Root first, the user last.
    pub path: Vec<Uuid>,
    pub level: i32,
    /// The walk stopped on the depth bound or on a revisited id.
    pub truncated: bool,
}

/// Outcome of a path repair over a user and its subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathRepairReport {
    /// Users visited by the repair, the starting user included.
    pub visited: usize,
    /// Users whose stored path or level actually changed.
    pub updated: usize,
    pub anomalies: Vec<String>,
}

impl PathRepairReport {
    pub fn merge(&mut self, other: PathRepairReport) {
        self.visited += other.visited;
        self.updated += other.updated;
        self.anomalies.extend(other.anomalies);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeactivationReport {
    pub success: bool,
    pub reallocated_subordinates: usize,
    /// Post-commit path repairs that failed. The deactivation itself stands.
    pub errors: Vec<String>,
}

/// Finding of a company-wide hierarchy sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HierarchyIssue {
    MultipleRoots { roots: Vec<Uuid> },
    MissingSuperior { user_id: Uuid, superior_id: Uuid },
    InactiveSuperior { user_id: Uuid, superior_id: Uuid },
    Cycle { user_id: Uuid },
    ExcessiveDepth { user_id: Uuid, hops: usize },
    StalePath { user_id: Uuid },
    StoreUnavailable { message: String },
}

impl HierarchyIssue {
    /// Multiple roots are tolerated; everything else is an error.
    pub fn is_warning(&self) -> bool {
        matches!(self, HierarchyIssue::MultipleRoots { .. })
    }
}

impl Display for HierarchyIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            HierarchyIssue::MultipleRoots { roots } => {
                write!(f, "Múltiplos usuários raiz encontrados: {}", roots.len())
            }
            HierarchyIssue::MissingSuperior {
                user_id,
                superior_id,
            } => write!(
                f,
                "Usuário {} tem superior inexistente: {}",
                user_id, superior_id
            ),
            HierarchyIssue::InactiveSuperior {
                user_id,
                superior_id,
            } => write!(
                f,
                "Usuário {} tem superior inativo: {}",
                user_id, superior_id
            ),
            HierarchyIssue::Cycle { user_id } => {
                write!(f, "Ciclo detectado na hierarquia do usuário {}", user_id)
            }
            HierarchyIssue::ExcessiveDepth { user_id, hops } => write!(
                f,
                "Hierarquia do usuário {} excede {} níveis",
                user_id, hops
            ),
            HierarchyIssue::StalePath { user_id } => {
                write!(f, "Caminho hierárquico desatualizado para o usuário {}", user_id)
            }
            HierarchyIssue::StoreUnavailable { message } => {
                write!(f, "Não foi possível validar a hierarquia: {}", message)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HierarchyValidation {
    pub valid: bool,
    pub issues: Vec<HierarchyIssue>,
}

impl HierarchyValidation {
    pub fn from_issues(issues: Vec<HierarchyIssue>) -> Self {
        Self {
            valid: issues.is_empty(),
            issues,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_valid_only_without_issues() {
        assert!(HierarchyValidation::from_issues(Vec::new()).valid);

        let validation = HierarchyValidation::from_issues(vec![HierarchyIssue::MultipleRoots {
            roots: vec![Uuid::new_v4(), Uuid::new_v4()],
        }]);
        assert!(!validation.valid);
        assert!(validation.issues[0].is_warning());
        assert!(validation.messages()[0].contains("raiz"));
    }

    #[test]
    fn test_merge_accumulates_counts() {
        let mut report = PathRepairReport {
            visited: 2,
            updated: 1,
            anomalies: vec![],
        };
        report.merge(PathRepairReport {
            visited: 3,
            updated: 0,
            anomalies: vec!["ciclo".into()],
        });
        assert_eq!(report.visited, 5);
        assert_eq!(report.updated, 1);
        assert_eq!(report.anomalies.len(), 1);
    }
}
