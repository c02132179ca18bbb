//! Batch name resolution.
//!
//! A batch is a named subset of tasks a package exposes under
//! `batch/task`-shaped task names (`build/lint`, `build/*`). Resolving a
//! requested task name against a target package expands it to every
//! surviving batch entry of the nearest batch home, falling back to the
//! bare name when no batches apply.

pub mod named;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::packages::Package;
use crate::plan::{CallDetails, PrePlanner};
use crate::tasks::PreSpec;

pub use named::NamedBatches;

/// Where batch entries are looked up relative to a target package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    /// The topmost package up the parent chain carrying matching entries.
    #[default]
    Topmost,
    /// The target package itself only.
    Direct,
}

/// Per-plan batching configuration: a lookup strategy plus selection rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batching {
    strategy: BatchStrategy,
    rules: NamedBatches,
}

impl Batching {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: BatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// This configuration with the selection rules replaced, for a single
    /// prerequisite resolution. The original is left untouched.
    pub fn with_rules(&self, rules: NamedBatches) -> Self {
        Self {
            strategy: self.strategy,
            rules,
        }
    }

    pub fn strategy(&self) -> BatchStrategy {
        self.strategy
    }

    pub fn rules(&self) -> &NamedBatches {
        &self.rules
    }
}

/// One `batch/selector` task name, split.
struct BatchName<'a> {
    default_disabled: bool,
    batch: &'a str,
    selector: &'a str,
}

fn split_batch(name: &str) -> Option<BatchName<'_>> {
    let (default_disabled, rest) = match name.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, name),
    };
    let (batch, selector) = rest.split_once('/')?;
    if batch.is_empty() || selector.is_empty() {
        return None;
    }
    Some(BatchName {
        default_disabled,
        batch,
        selector,
    })
}

/// Batch entries of one package matching `task_name`, in registration
/// order, filtered by the selection rules.
///
/// `None` means the package has no matching entries at all, so resolution
/// should look elsewhere. `Some(empty)` means entries exist but none
/// survived selection, which suppresses the bare-name fallback.
fn batch_entries(
    target: &Arc<dyn Package>,
    task_name: &str,
    rules: &NamedBatches,
) -> Option<Vec<String>> {
    struct Entry {
        name: String,
        specific: bool,
        enabled: bool,
    }

    let mut order: Vec<String> = Vec::new();
    let mut chosen: HashMap<String, Entry> = HashMap::new();
    for name in target.task_names() {
        let Some(split) = split_batch(&name) else {
            continue;
        };
        let specific = split.selector == task_name;
        if !specific && split.selector != "*" {
            continue;
        }
        let keep = match chosen.get(split.batch) {
            None => {
                order.push(split.batch.to_string());
                true
            }
            // A specific entry shadows the batch's wildcard one.
            Some(existing) => !existing.specific && specific,
        };
        if keep {
            chosen.insert(
                split.batch.to_string(),
                Entry {
                    name: name.clone(),
                    specific,
                    enabled: rules.is_enabled(split.batch, split.default_disabled),
                },
            );
        }
    }

    if chosen.is_empty() {
        return None;
    }
    Some(
        order
            .iter()
            .filter_map(|batch| {
                let entry = &chosen[batch];
                entry.enabled.then(|| entry.name.clone())
            })
            .collect(),
    )
}

/// Finds the batch home for `task_name` starting at `target`.
///
/// Returns the home package and its surviving entry names, or the target
/// itself with `None` when no package on the lookup path carries entries.
fn resolve_batches(
    batching: &Batching,
    target: &Arc<dyn Package>,
    task_name: &str,
) -> (Arc<dyn Package>, Option<Vec<String>>) {
    let mut found: Option<(Arc<dyn Package>, Vec<String>)> = None;
    let mut current = Some(Arc::clone(target));
    while let Some(package) = current {
        if let Some(names) = batch_entries(&package, task_name, batching.rules()) {
            found = Some((Arc::clone(&package), names));
        }
        current = match batching.strategy() {
            BatchStrategy::Topmost => package.parent(),
            BatchStrategy::Direct => None,
        };
    }
    match found {
        Some((home, names)) => (home, Some(names)),
        None => (Arc::clone(target), None),
    }
}

/// Expands `task_name` against every target and registers one prerequisite
/// call per (package, surviving name) pair, in target order then entry
/// registration order.
///
/// Completes once every resulting call is durably recorded, though their
/// own planning may still be queued.
pub(crate) async fn batch_all(
    planner: &PrePlanner,
    targets: &[Arc<dyn Package>],
    task_name: &str,
    pre: &PreSpec,
    details: &CallDetails,
) -> Result<()> {
    let batching = planner.batching().clone();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for target in targets {
        let (home, names) = resolve_batches(&batching, target, task_name);
        match names {
            None => {
                if seen.insert((target.name().to_string(), task_name.to_string())) {
                    let task = Arc::clone(target).task(task_name).await?;
                    task.call_as_pre(planner, pre, details.clone()).await?;
                }
            }
            Some(names) => {
                debug!(
                    target = target.name(),
                    home = home.name(),
                    task = task_name,
                    entries = names.len(),
                    "batch resolved"
                );
                for name in names {
                    if seen.insert((home.name().to_string(), name.clone())) {
                        let task = Arc::clone(&home).task(&name).await?;
                        task.call_as_pre(planner, pre, details.clone()).await?;
                    }
                }
            }
        }
    }
    Ok(())
}
