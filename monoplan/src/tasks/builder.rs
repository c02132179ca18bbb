//! Incremental task assembly for upstream layers.

use std::sync::Arc;

use crate::packages::Package;
use crate::plan::Attrs;
use crate::tasks::spec::{Action, PreSpec, TaskSpec};
use crate::tasks::Task;

/// Builds a [`TaskSpec`] incrementally.
///
/// The action defaults to an empty group, so a builder finalized without
/// `set_action` yields a pure prerequisite container.
#[derive(Debug, Clone, Default)]
pub struct TaskBuilder {
    name: String,
    spec: TaskSpec,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: TaskSpec::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_pre(mut self, pre: PreSpec) -> Self {
        self.spec.pre.push(pre);
        self
    }

    pub fn add_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec
            .attrs
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn add_attrs(mut self, attrs: Attrs) -> Self {
        for (name, values) in attrs {
            self.spec.attrs.entry(name).or_default().extend(values);
        }
        self
    }

    pub fn add_arg(mut self, arg: impl Into<String>) -> Self {
        self.spec.args.push(arg.into());
        self
    }

    pub fn add_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn set_action(mut self, action: Action) -> Self {
        self.spec.action = action;
        self
    }

    /// Finalizes the assembled specification.
    pub fn spec(self) -> TaskSpec {
        self.spec
    }

    /// Finalizes into a task owned by the given package.
    pub fn task(self, target: Arc<dyn Package>) -> Arc<Task> {
        Task::new(target, self.name, self.spec)
    }
}
