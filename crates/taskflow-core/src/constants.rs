//! Named bounds and defaults.
//!
//! The hop limits guarantee termination of every walk over the superior graph,
//! even when stored data contains a cycle. Reaching one of them is logged as a
//! hierarchy anomaly by the caller.

/// Maximum number of superior hops followed when computing a materialized path.
pub const MAX_HIERARCHY_DEPTH: usize = 20;

/// Maximum number of ancestors visited while searching for an escalation approver.
pub const MAX_ESCALATION_HOPS: usize = 10;

/// Maximum number of superior hops followed by the integrity sweep.
pub const MAX_INTEGRITY_WALK: usize = 50;

/// Default lifetime of a distributed advisory lock.
pub const DEFAULT_LOCK_TTL_SECS: u64 = 30;

/// Default interval between stale lock sweeps.
pub const DEFAULT_LOCK_SWEEP_INTERVAL_SECS: u64 = 300;

/// Resource type prefix used in task lock keys (`task:<id>`).
pub const TASK_LOCK_RESOURCE: &str = "task";
