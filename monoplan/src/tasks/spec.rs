//! Immutable task specifications.

use serde::{Deserialize, Serialize};

use crate::batches::NamedBatches;
use crate::packages::TargetSelector;
use crate::plan::Attrs;

/// What a task does when executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Spawns a shell command.
    Command {
        command: String,
        /// Whether the command may run concurrently with its prerequisites.
        #[serde(default)]
        parallel: bool,
        #[serde(default)]
        args: Vec<String>,
    },
    /// Runs the package script this task is named after.
    Script {
        #[serde(default)]
        args: Vec<String>,
    },
    /// A no-op pseudo-task delegating to sub-tasks across member targets.
    Group {
        #[serde(default)]
        targets: Vec<TargetSelector>,
    },
}

impl Default for Action {
    fn default() -> Self {
        Action::Group {
            targets: Vec::new(),
        }
    }
}

/// One entry in a task's ordered prerequisite list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreSpec {
    /// Target selectors resolved against the owning package. Empty means the
    /// owning package itself.
    #[serde(default)]
    pub targets: Vec<TargetSelector>,
    /// Name of the prerequisite task, or of a batch expanding to tasks.
    pub task: String,
    /// Whether this prerequisite may run in parallel with the preceding one.
    #[serde(default)]
    pub parallel: bool,
    /// Annex prerequisites borrow target selection without participating in
    /// sequential gating.
    #[serde(default)]
    pub annex: bool,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub args: Vec<String>,
    /// Batch rules overriding the plan-wide ones for this resolution only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batching: Option<NamedBatches>,
}

impl PreSpec {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Self::default()
        }
    }

    pub fn target(mut self, selector: impl Into<TargetSelector>) -> Self {
        self.targets.push(selector.into());
        self
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn annex(mut self) -> Self {
        self.annex = true;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn batching(mut self, rules: NamedBatches) -> Self {
        self.batching = Some(rules);
        self
    }
}

/// Complete immutable specification of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub pre: Vec<PreSpec>,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub action: Action,
}
