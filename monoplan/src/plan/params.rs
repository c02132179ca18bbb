//! Task execution parameters and their append-merge model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Task attributes: named, ordered value lists. Duplicate values are kept.
pub type Attrs = HashMap<String, Vec<String>>;

/// Lazily evaluated parameter provider.
///
/// Providers are closures rather than values so a prerequisite call can keep
/// observing its dependent's parameters as the dependent is extended by later
/// calls within the same plan.
pub type ParamsFn = Arc<dyn Fn() -> TaskParams + Send + Sync>;

/// Parameters of a planned task call.
///
/// Produced by folding a call's provider chain left-to-right over the task's
/// own spec parameters. Merging `a` then `b` appends `b`'s attribute values
/// per key after `a`'s, and concatenates `args`/`action_args` with `a` first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskParams {
    /// Task attributes.
    pub attrs: Attrs,
    /// Positional command-line arguments.
    pub args: Vec<String>,
    /// Arguments of the task action itself (e.g. the command's own args).
    pub action_args: Vec<String>,
}

impl TaskParams {
    pub fn new(attrs: Attrs, args: Vec<String>, action_args: Vec<String>) -> Self {
        Self {
            attrs,
            args,
            action_args,
        }
    }

    /// Appends all of `other` to these parameters.
    pub fn extend(&mut self, other: &TaskParams) {
        self.extend_attrs(&other.attrs);
        self.args.extend(other.args.iter().cloned());
        self.action_args.extend(other.action_args.iter().cloned());
    }

    /// Appends attribute values only, leaving args untouched.
    pub fn extend_attrs(&mut self, attrs: &Attrs) {
        for (name, values) in attrs {
            self.attrs
                .entry(name.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    /// Appends attributes and positional args, the prerequisite extension.
    pub fn extend_with(&mut self, attrs: &Attrs, args: &[String]) {
        self.extend_attrs(attrs);
        self.args.extend(args.iter().cloned());
    }

    /// The most recently appended value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .and_then(|values| values.last())
            .map(String::as_str)
    }

    /// All values appended for an attribute, in append order.
    pub fn attr_values(&self, name: &str) -> &[String] {
        self.attrs.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}
