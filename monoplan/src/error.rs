//! Planning errors.
//!
//! Errors are cloneable so a task's planning future can be shared between
//! re-entrant callers; every variant aborts the whole plan.

use thiserror::Error;

/// Errors raised while building an execution plan.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    /// A referenced or batch-expanded task name is absent from a resolved
    /// target package.
    #[error("unknown task `{task}` in package `{target}`")]
    UnknownTask { target: String, task: String },

    /// A target-selector-reuse probe contributed zero targets.
    #[error("prerequisite `{task}` of `{dependent}` resolved no targets")]
    TargetReuse { dependent: String, task: String },

    /// A package or package-set collaborator failed to resolve.
    #[error("target resolution failed: {0}")]
    Resolution(String),
}

/// Result of a planning operation.
pub type Result<T> = std::result::Result<T, PlanError>;
