//! Plan construction: the call registry, planning queue, and the planner
//! surfaces handed to tasks while they plan.
//!
//! Planning is logically single-threaded per plan. Registering a call only
//! records it and queues its planning step; a drain loop awaits queued steps
//! one at a time until the graph stops growing. Re-entrant calls to an
//! already registered task extend its parameters instead of re-planning it,
//! so each task's planning runs exactly once per plan.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::batches::Batching;
use crate::error::Result;
use crate::plan::call::{Call, Plan, Qualifier, TaskId};
use crate::plan::params::ParamsFn;
use crate::tasks::Task;

pub(crate) type CallId = usize;

type PlanStep = BoxFuture<'static, Result<()>>;

/// Extension hook run against a call's planner after the call is recorded.
pub type PlanFn = Arc<dyn for<'a> Fn(&'a CallPlanner) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Optional per-call details: an extra parameter provider and a planning
/// extension hook.
#[derive(Clone, Default)]
pub struct CallDetails {
    /// Additional parameters appended to the call's provider chain.
    pub params: Option<ParamsFn>,
    /// Extra planning step run with the call's planner.
    pub plan: Option<PlanFn>,
}

impl CallDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Details carrying fixed extra parameters.
    pub fn with_params(params: crate::plan::params::TaskParams) -> Self {
        Self {
            params: Some(Arc::new(move || params.clone())),
            plan: None,
        }
    }
}

/// Per-call record in the plan arena.
pub(crate) struct CallRecord {
    pub(crate) task: Arc<Task>,
    pub(crate) providers: Vec<ParamsFn>,
    pub(crate) cached: Option<Arc<crate::plan::params::TaskParams>>,
    // Set while this record's provider chain is being folded, so a cyclic
    // read through a provider can be cut short instead of recursing.
    pub(crate) evaluating: bool,
    pub(crate) qualifiers: HashSet<Qualifier>,
}

/// Mutable state of a plan under construction.
pub(crate) struct PlanState {
    pub(crate) calls: Vec<CallRecord>,
    pub(crate) index: HashMap<TaskId, CallId>,
    pub(crate) edges: HashSet<(CallId, CallId)>,
    pub(crate) parallel: Vec<HashSet<Qualifier>>,
    pub(crate) group_names: HashMap<u64, String>,
    next_group: u64,
    pending: VecDeque<PlanStep>,
}

/// Shared core of one plan.
pub(crate) struct PlanCore {
    batching: Batching,
    state: Mutex<PlanState>,
}

impl PlanCore {
    fn new(batching: Batching) -> Self {
        Self {
            batching,
            state: Mutex::new(PlanState {
                calls: Vec::new(),
                index: HashMap::new(),
                edges: HashSet::new(),
                parallel: Vec::new(),
                group_names: HashMap::new(),
                next_group: 0,
                pending: VecDeque::new(),
            }),
        }
    }

    pub(crate) fn batching(&self) -> &Batching {
        &self.batching
    }

    // The lock is only held across plain map/vec operations, never across an
    // await, so a poisoned lock still carries consistent state.
    pub(crate) fn state(&self) -> MutexGuard<'_, PlanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a call of `task`, creating it on first sight and extending
    /// it otherwise. Planning work is queued, not awaited here.
    pub(crate) fn record_call(self: Arc<Self>, task: Arc<Task>, details: CallDetails) -> Call {
        let task_id = task.id();
        let mut state = self.state();

        if let Some(&call_id) = state.index.get(&task_id) {
            debug!(task = %task_id, "extending planned call");
            let record = &mut state.calls[call_id];
            if let Some(params) = details.params {
                record.providers.push(params);
                record.cached = None;
            }
            let call = Call::new(Arc::clone(&self), call_id);
            if let Some(plan) = details.plan {
                let planner = CallPlanner {
                    core: Arc::clone(&self),
                    call: call.clone(),
                };
                state
                    .pending
                    .push_back(async move { plan(&planner).await }.boxed());
            }
            return call;
        }

        debug!(task = %task_id, "planning new call");
        let call_id = state.calls.len();
        let mut providers = Vec::new();
        if let Some(params) = details.params {
            providers.push(params);
        }
        state.calls.push(CallRecord {
            task: Arc::clone(&task),
            providers,
            cached: None,
            evaluating: false,
            qualifiers: HashSet::new(),
        });
        state.index.insert(task_id, call_id);

        let call = Call::new(Arc::clone(&self), call_id);
        let planner = CallPlanner {
            core: Arc::clone(&self),
            call: call.clone(),
        };
        let plan = details.plan;
        state.pending.push_back(
            async move {
                task.plan_call(&planner).await?;
                if let Some(plan) = plan {
                    plan(&planner).await?;
                }
                Ok(())
            }
            .boxed(),
        );
        call
    }

    /// Awaits queued planning steps until none remain. Steps registered
    /// while a step runs are picked up by later iterations.
    async fn drain(&self) -> Result<()> {
        loop {
            let next = self.state().pending.pop_front();
            match next {
                Some(step) => step.await?,
                None => return Ok(()),
            }
        }
    }

    /// Drops any unfinished planning steps. Queued steps hold strong plan
    /// handles, so this is what lets a finished or failed plan be freed.
    fn settle(&self) {
        self.state().pending.clear();
    }

    pub(crate) fn new_group_qualifier(&self, name: String) -> Qualifier {
        let mut state = self.state();
        let group = state.next_group;
        state.next_group += 1;
        state.group_names.insert(group, name);
        Qualifier::Group(group)
    }
}

/// Builds execution plans.
#[derive(Debug, Clone, Default)]
pub struct Planner {
    batching: Batching,
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    /// A planner whose plans resolve prerequisite names through the given
    /// batching configuration.
    pub fn with_batching(batching: Batching) -> Self {
        Self { batching }
    }

    /// Plans a call of `task` and everything it transitively requires.
    ///
    /// Any failure in the recursive planning chain fails the whole plan.
    pub async fn plan(&self, task: Arc<Task>, details: CallDetails) -> Result<Plan> {
        let task_id = task.id();
        debug!(task = %task_id, "planning");
        let core = Arc::new(PlanCore::new(self.batching.clone()));
        Arc::clone(&core).record_call(task, details);
        let outcome = core.drain().await;
        core.settle();
        outcome?;
        debug!(task = %task_id, calls = core.state().calls.len(), "plan complete");
        Ok(Plan::new(core))
    }
}

/// Planner surface handed to a task while its call is planned.
#[derive(Clone)]
pub struct CallPlanner {
    core: Arc<PlanCore>,
    call: Call,
}

impl CallPlanner {
    /// The call being planned.
    pub fn planned_call(&self) -> Call {
        self.call.clone()
    }

    /// Registers a call of another task within the same plan.
    pub fn call(&self, task: Arc<Task>, details: CallDetails) -> Call {
        Arc::clone(&self.core).record_call(task, details)
    }

    /// Attaches an additional qualifier identity to a call.
    pub fn qualify(&self, call: &Call, qualifier: Qualifier) {
        self.core.state().calls[call.id()]
            .qualifiers
            .insert(qualifier);
    }

    /// Records that `first` must complete before `second` starts.
    ///
    /// Edges accumulate monotonically. Contradictory pairs are accepted;
    /// cycle detection belongs to the execution consumer.
    pub fn order(&self, first: &Call, second: &Call) {
        if first.id() == second.id() {
            return;
        }
        self.core.state().edges.insert((first.id(), second.id()));
    }

    /// Declares the given qualifiers mutually eligible for concurrent
    /// execution. Pure permission: previously recorded edges stay.
    pub fn make_parallel(&self, qualifiers: Vec<Qualifier>) {
        if qualifiers.is_empty() {
            return;
        }
        let group: HashSet<Qualifier> = qualifiers.into_iter().collect();
        let mut state = self.core.state();
        if state.parallel.iter().any(|existing| *existing == group) {
            return;
        }
        debug!(group = ?group, "parallel group declared");
        state.parallel.push(group);
    }

    pub(crate) fn batching(&self) -> &Batching {
        self.core.batching()
    }

    pub(crate) fn new_group_qualifier(&self, name: String) -> Qualifier {
        self.core.new_group_qualifier(name)
    }
}

/// Planner surface for resolving one prerequisite of a dependent call.
///
/// Collects the calls the prerequisite resolves to and, unless the
/// prerequisite is an annex, orders each of them after the dependent's
/// preceding sequential group.
pub(crate) struct PrePlanner {
    dependent: CallPlanner,
    batching: Batching,
    annex: bool,
    previous: Vec<Call>,
    called: Mutex<Vec<Call>>,
    delegated: Mutex<HashSet<TaskId>>,
}

impl PrePlanner {
    pub(crate) fn new(
        dependent: &CallPlanner,
        batching: Batching,
        annex: bool,
        previous: Vec<Call>,
    ) -> Self {
        Self {
            dependent: dependent.clone(),
            batching,
            annex,
            previous,
            called: Mutex::new(Vec::new()),
            delegated: Mutex::new(HashSet::new()),
        }
    }

    /// Marks a group as delegating within this prerequisite resolution.
    ///
    /// False when the group is already delegating higher up the chain, which
    /// means its member resolution reached the group itself.
    pub(crate) fn enter_delegation(&self, id: TaskId) -> bool {
        self.delegated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id)
    }

    pub(crate) fn dependent(&self) -> &CallPlanner {
        &self.dependent
    }

    pub(crate) fn batching(&self) -> &Batching {
        &self.batching
    }

    /// Registers one resolved prerequisite call.
    pub(crate) fn call_pre(&self, task: Arc<Task>, details: CallDetails) -> Call {
        let call = self.dependent.call(task, details);
        if !self.annex {
            for previous in &self.previous {
                self.dependent.order(previous, &call);
            }
        }
        self.called
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());
        call
    }

    /// Takes the calls registered so far, in registration order.
    pub(crate) fn take_called(&self) -> Vec<Call> {
        std::mem::take(&mut *self.called.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
