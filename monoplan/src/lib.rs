//! Planning core of a monorepo task orchestrator.
//!
//! Given named tasks scattered across packages, this crate builds an
//! execution plan: a graph of calls, hard ordering edges, and
//! parallel-eligible groups. It never runs anything itself; a downstream
//! executor consumes the plan through the [`jobs`] boundary.
//!
//! Planning revolves around a few rules:
//!
//! - one [`Call`](plan::Call) exists per task per plan; repeated calls
//!   widen parameters instead of duplicating nodes;
//! - a task's prerequisite list is walked in declaration order,
//!   accumulating sequential groups and parallel-eligibility qualifiers;
//! - prerequisite names expand through named batches
//!   ([`batches`]) before resolving to concrete tasks;
//! - group tasks delegate to sub-tasks across member packages while acting
//!   as synchronization points.

pub mod batches;
pub mod error;
pub mod jobs;
pub mod packages;
pub mod plan;
pub mod tasks;

pub use batches::{BatchStrategy, Batching, NamedBatches};
pub use error::{PlanError, Result};
pub use jobs::{ExecError, ExecResult, Job, Shell};
pub use packages::{select_all, Package, PackageSet, TargetSelector, TreePackage};
pub use plan::{
    Attrs, Call, CallDetails, CallPlanner, Plan, PlanFn, Planner, Qualifier, TaskId, TaskParams,
};
pub use tasks::{Action, PreSpec, Task, TaskBuilder, TaskSpec};
