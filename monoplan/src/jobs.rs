//! Execution boundary.
//!
//! Planning never spawns anything. At run time a task's action is handed to
//! a [`Shell`], which returns a cancellable [`Job`] handle. Execution
//! failures are a separate error domain from planning failures.

use async_trait::async_trait;
use thiserror::Error;

use crate::plan::TaskParams;
use crate::tasks::Task;

/// Errors of a running job.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    /// The job was aborted before completing.
    #[error("execution aborted: {0}")]
    Aborted(String),
    /// The process exited with a failure code.
    #[error("process exited with code {0}")]
    Failed(i32),
    /// The process could not be started.
    #[error("failed to spawn process: {0}")]
    Spawn(String),
}

/// Result of a job.
pub type ExecResult<T> = std::result::Result<T, ExecError>;

/// A started, cancellable unit of execution.
#[async_trait]
pub trait Job: Send + Sync {
    /// Waits for the job to finish.
    async fn when_done(&self) -> ExecResult<()>;

    /// Requests the job to stop. Idempotent.
    fn abort(&self);
}

/// Spawns task actions.
pub trait Shell: Send + Sync {
    /// Executes a shell command with the call's parameters.
    fn exec_command(&self, task: &Task, command: &str, params: &TaskParams) -> Box<dyn Job>;

    /// Executes the package script the task is named after.
    fn exec_script(&self, task: &Task, params: &TaskParams) -> Box<dyn Job>;
}

struct NoopJob;

#[async_trait]
impl Job for NoopJob {
    async fn when_done(&self) -> ExecResult<()> {
        Ok(())
    }

    fn abort(&self) {}
}

/// An already-done job, the execution of group tasks.
pub fn noop_job() -> Box<dyn Job> {
    Box::new(NoopJob)
}
