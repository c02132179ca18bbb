//! Task specifications, the task builder, and task planning.

pub mod builder;
pub mod spec;
pub mod task;

pub use builder::TaskBuilder;
pub use spec::{Action, PreSpec, TaskSpec};
pub use task::Task;
