use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant-scoped advisory lock on a single resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DistributedLock {
    pub company_id: Uuid,
    /// `resourceType:resourceId`
    pub resource_key: String,
    pub owner_id: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DistributedLock {
    pub fn resource_key(resource_type: &str, resource_id: Uuid) -> String {
        format!("{}:{}", resource_type, resource_id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Outcome of a lock acquisition attempt. Contention is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LockAcquisition {
    Acquired(DistributedLock),
    HeldBy {
        owner_id: Uuid,
        expires_at: DateTime<Utc>,
    },
}

impl LockAcquisition {
    pub fn is_acquired(&self) -> bool {
        matches!(self, LockAcquisition::Acquired(_))
    }
}
