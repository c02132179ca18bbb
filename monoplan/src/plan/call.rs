//! Call handles over the per-plan call arena.
//!
//! A [`Call`] is a cheap handle (plan pointer plus arena index) to the unique
//! planned invocation of one task. All graph state lives in the plan arena,
//! so edges and parallel groups are index tables rather than pointers
//! scattered between calls.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::plan::params::TaskParams;
use crate::plan::planner::{CallId, PlanCore, PlanState};
use crate::tasks::Task;

/// Identity of a task within a plan: owning package name plus task name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId {
    /// Name of the package the task belongs to.
    pub target: String,
    /// Task name within that package.
    pub task: String,
}

impl TaskId {
    pub fn new(target: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            task: task.into(),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target, self.task)
    }
}

/// Grouping identity used by ordering and parallel declarations.
///
/// Either a real call's task identity, or a synthetic identity standing for
/// all calls a multi-target prerequisite resolved to. Synthetic groups have
/// no call behind them; their display names live in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qualifier {
    /// The call planned for this task.
    Task(TaskId),
    /// A synthetic group of calls, identified per plan.
    Group(u64),
}

/// The unique planned invocation of one task within one plan.
///
/// Two `Call` values compare equal when they refer to the same call of the
/// same plan.
#[derive(Clone)]
pub struct Call {
    core: Arc<PlanCore>,
    id: CallId,
}

impl Call {
    pub(crate) fn new(core: Arc<PlanCore>, id: CallId) -> Self {
        Self { core, id }
    }

    pub(crate) fn id(&self) -> CallId {
        self.id
    }

    pub(crate) fn downgrade(&self) -> WeakCall {
        WeakCall {
            core: Arc::downgrade(&self.core),
            id: self.id,
        }
    }

    /// The plan this call belongs to.
    pub fn plan(&self) -> Plan {
        Plan {
            core: Arc::clone(&self.core),
        }
    }

    /// The task this call invokes.
    pub fn task(&self) -> Arc<Task> {
        Arc::clone(&self.core.state().calls[self.id].task)
    }

    /// Identity of the called task.
    pub fn task_id(&self) -> TaskId {
        self.core.state().calls[self.id].task.id()
    }

    /// Parameters of this call.
    ///
    /// Folds the call's provider chain over the task's own spec parameters.
    /// The result is memoized: repeated reads return the same value until the
    /// provider chain is extended by another call to the same task, which
    /// invalidates the cache. Recomputation happens lazily here, outside the
    /// plan lock, since providers may read other calls' parameters. When the
    /// plan is cyclic such a read may come back to this call; it then
    /// resolves to the task's own parameters instead of recursing.
    pub fn params(&self) -> Arc<TaskParams> {
        let (task, providers) = {
            let mut state = self.core.state();
            let record = &mut state.calls[self.id];
            if let Some(cached) = &record.cached {
                return Arc::clone(cached);
            }
            if record.evaluating {
                // A provider is reading this call back through a dependency
                // cycle. Cut the loop with the task's own parameters; the
                // outer read finishes the full fold.
                return Arc::new(record.task.call_params());
            }
            record.evaluating = true;
            (Arc::clone(&record.task), record.providers.clone())
        };
        let mut params = task.call_params();
        for provider in &providers {
            params.extend(&provider());
        }
        let params = Arc::new(params);

        let mut state = self.core.state();
        let record = &mut state.calls[self.id];
        record.evaluating = false;
        match &record.cached {
            // Another reader may have cached concurrently. Keep the first.
            Some(cached) => Arc::clone(cached),
            None => {
                record.cached = Some(Arc::clone(&params));
                params
            }
        }
    }

    /// Direct predecessor calls, in arena order.
    pub fn prerequisites(&self) -> Vec<Call> {
        let mut preds: Vec<CallId> = {
            let state = self.core.state();
            state
                .edges
                .iter()
                .filter(|(_, to)| *to == self.id)
                .map(|&(from, _)| from)
                .collect()
        };
        preds.sort_unstable();
        preds.dedup();
        preds
            .into_iter()
            .map(|id| Call::new(Arc::clone(&self.core), id))
            .collect()
    }

    /// Whether the given task precedes this call, directly or transitively.
    pub fn has_prerequisite(&self, id: &TaskId) -> bool {
        let state = self.core.state();
        let mut visited = vec![false; state.calls.len()];
        let mut stack = vec![self.id];
        while let Some(next) = stack.pop() {
            for &(from, to) in &state.edges {
                if to == next && !visited[from] {
                    visited[from] = true;
                    if state.calls[from].task.id() == *id {
                        return true;
                    }
                    stack.push(from);
                }
            }
        }
        false
    }

    /// Whether this call and `other` are eligible to run concurrently.
    ///
    /// True when some declared parallel group contains a qualifier of each.
    pub fn is_parallel_to(&self, other: &Call) -> bool {
        if !Arc::ptr_eq(&self.core, &other.core) {
            return false;
        }
        let state = self.core.state();
        let own = qualifiers_of(&state, self.id);
        let others = qualifiers_of(&state, other.id);
        state.parallel.iter().any(|group| {
            group.iter().any(|q| own.contains(q)) && group.iter().any(|q| others.contains(q))
        })
    }
}

fn qualifiers_of(state: &PlanState, id: CallId) -> HashSet<Qualifier> {
    let record = &state.calls[id];
    let mut qualifiers = record.qualifiers.clone();
    qualifiers.insert(Qualifier::Task(record.task.id()));
    qualifiers
}

impl PartialEq for Call {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for Call {}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Call").field(&self.task_id()).finish()
    }
}

/// Non-owning call handle for parameter providers.
///
/// Providers are stored inside the plan they read from, so holding a strong
/// handle there would keep the plan alive forever.
#[derive(Clone)]
pub(crate) struct WeakCall {
    core: Weak<PlanCore>,
    id: CallId,
}

impl WeakCall {
    /// Current parameters of the referenced call, or empty once the plan is
    /// gone.
    pub(crate) fn params(&self) -> TaskParams {
        match self.core.upgrade() {
            Some(core) => (*Call::new(core, self.id).params()).clone(),
            None => TaskParams::default(),
        }
    }
}

/// A completed execution plan: the call graph, ordering edges, and
/// parallel-eligible groups built for one root task.
#[derive(Clone)]
pub struct Plan {
    core: Arc<PlanCore>,
}

impl Plan {
    pub(crate) fn new(core: Arc<PlanCore>) -> Self {
        Self { core }
    }

    /// The call planned for the given task, if any.
    pub fn call_of(&self, id: &TaskId) -> Option<Call> {
        let call_id = *self.core.state().index.get(id)?;
        Some(Call::new(Arc::clone(&self.core), call_id))
    }

    /// All calls of this plan, in planning order.
    pub fn calls(&self) -> Vec<Call> {
        let len = self.core.state().calls.len();
        (0..len)
            .map(|id| Call::new(Arc::clone(&self.core), id))
            .collect()
    }

    /// All recorded ordering edges as (first, second) task pairs, sorted.
    ///
    /// Contradictory pairs may both be present. Cycle detection is the
    /// executor's concern.
    pub fn order_edges(&self) -> Vec<(TaskId, TaskId)> {
        let state = self.core.state();
        let mut edges: Vec<(TaskId, TaskId)> = state
            .edges
            .iter()
            .map(|&(from, to)| (state.calls[from].task.id(), state.calls[to].task.id()))
            .collect();
        drop(state);
        edges.sort();
        edges
    }

    /// All declared parallel groups, each sorted.
    pub fn parallel_groups(&self) -> Vec<Vec<Qualifier>> {
        self.core
            .state()
            .parallel
            .iter()
            .map(|group| {
                let mut group: Vec<Qualifier> = group.iter().cloned().collect();
                group.sort();
                group
            })
            .collect()
    }

    /// Display name of a synthetic group qualifier.
    pub fn group_name(&self, qualifier: &Qualifier) -> Option<String> {
        match qualifier {
            Qualifier::Task(id) => Some(id.to_string()),
            Qualifier::Group(group) => self.core.state().group_names.get(group).cloned(),
        }
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("calls", &self.core.state().calls.len())
            .finish()
    }
}
