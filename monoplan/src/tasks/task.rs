//! Tasks and the prerequisite-walking planning algorithm.

use std::mem;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tracing::debug;

use crate::batches::batch_all;
use crate::error::{PlanError, Result};
use crate::jobs::{self, Job, Shell};
use crate::packages::{select_all, Package};
use crate::plan::planner::PlanFn;
use crate::plan::{Call, CallDetails, CallPlanner, ParamsFn, PrePlanner, Qualifier, TaskId, TaskParams};
use crate::tasks::spec::{Action, PreSpec, TaskSpec};

/// An immutable named unit of work owned by a package.
pub struct Task {
    target: Arc<dyn Package>,
    name: String,
    spec: TaskSpec,
}

/// Fold state of the prerequisite walk.
///
/// `parallel` collects qualifiers since the last sequential boundary;
/// `previous` holds the sequential group every new call must be ordered
/// after; `current` holds the group being accumulated, promoted to
/// `previous` at the next boundary.
#[derive(Default)]
struct PreWalk {
    parallel: Vec<Qualifier>,
    previous: Vec<Call>,
    current: Vec<Call>,
}

impl Task {
    pub fn new(target: Arc<dyn Package>, name: impl Into<String>, spec: TaskSpec) -> Arc<Self> {
        Arc::new(Self {
            target,
            name: name.into(),
            spec,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Arc<dyn Package> {
        &self.target
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    pub fn action(&self) -> &Action {
        &self.spec.action
    }

    /// Identity of this task within a plan.
    pub fn id(&self) -> TaskId {
        TaskId::new(self.target.name(), &self.name)
    }

    /// Parameters declared by the task specification itself, the base of
    /// every call's provider chain.
    pub fn call_params(&self) -> TaskParams {
        let action_args = match &self.spec.action {
            Action::Command { args, .. } | Action::Script { args } => args.clone(),
            Action::Group { .. } => Vec::new(),
        };
        TaskParams::new(self.spec.attrs.clone(), self.spec.args.clone(), action_args)
    }

    /// Whether this task's action permits running concurrently with its own
    /// prerequisites.
    pub fn is_parallel(&self) -> bool {
        matches!(self.spec.action, Action::Command { parallel: true, .. })
    }

    /// Plans this task's call: walks the prerequisite list in declaration
    /// order, then orders the call itself after the last sequential group.
    pub(crate) async fn plan_call(&self, planner: &CallPlanner) -> Result<()> {
        let mut walk = PreWalk::default();
        for pre in &self.spec.pre {
            walk = self.plan_pre_step(planner, walk, pre).await?;
        }

        let planned = planner.planned_call();
        for previous in &walk.current {
            planner.order(previous, &planned);
        }
        if self.is_parallel() {
            walk.parallel.push(Qualifier::Task(self.id()));
        }
        planner.make_parallel(walk.parallel);
        Ok(())
    }

    /// One step of the prerequisite fold.
    async fn plan_pre_step(
        &self,
        planner: &CallPlanner,
        mut walk: PreWalk,
        pre: &PreSpec,
    ) -> Result<PreWalk> {
        if !pre.parallel {
            // Sequential boundary: close the parallel bunch and promote the
            // accumulated group to the one new calls are ordered after.
            planner.make_parallel(mem::take(&mut walk.parallel));
            if !walk.current.is_empty() {
                walk.previous = mem::take(&mut walk.current);
            }
        }

        let set = select_all(&self.target, &pre.targets);
        let targets = set.packages().await?;
        if pre.annex && targets.is_empty() {
            return Err(PlanError::TargetReuse {
                dependent: self.id().to_string(),
                task: pre.task.clone(),
            });
        }

        let batching = match &pre.batching {
            Some(rules) => planner.batching().with_rules(rules.clone()),
            None => planner.batching().clone(),
        };
        let pre_planner = PrePlanner::new(planner, batching, pre.annex, walk.previous.clone());
        batch_all(&pre_planner, &targets, &pre.task, pre, &CallDetails::default()).await?;
        let called = pre_planner.take_called();

        if pre.annex {
            // Annexes attach at the current position without gating it.
            return Ok(walk);
        }

        match called.as_slice() {
            [] => {}
            [only] => walk.parallel.push(Qualifier::Task(only.task_id())),
            _ => {
                let qualifier = planner
                    .new_group_qualifier(format!("{} */{}", set.display_name(), pre.task));
                for call in &called {
                    planner.qualify(call, qualifier.clone());
                }
                walk.parallel.push(qualifier);
            }
        }
        walk.current.extend(called);
        Ok(walk)
    }

    /// Registers this task as a prerequisite call of the planner's
    /// dependent. Group tasks delegate instead of being called directly.
    pub(crate) fn call_as_pre<'a>(
        self: Arc<Self>,
        planner: &'a PrePlanner,
        pre: &'a PreSpec,
        details: CallDetails,
    ) -> BoxFuture<'a, Result<Call>> {
        if matches!(self.spec.action, Action::Group { .. }) {
            self.delegate_as_pre(planner, pre, details).boxed()
        } else {
            self.call_as_pre_default(planner, pre, details).boxed()
        }
    }

    async fn call_as_pre_default(
        self: Arc<Self>,
        planner: &PrePlanner,
        pre: &PreSpec,
        details: CallDetails,
    ) -> Result<Call> {
        let dependent = planner.dependent().planned_call().downgrade();
        let attrs = pre.attrs.clone();
        let args = pre.args.clone();
        let base = details.params;
        // The prerequisite keeps observing its base parameters as the plan
        // grows, so the provider re-reads them on every evaluation.
        let params: ParamsFn = Arc::new(move || {
            let mut params = match &base {
                Some(base) => base(),
                None => dependent.params(),
            };
            params.extend_with(&attrs, &args);
            params
        });
        Ok(planner.call_pre(
            self,
            CallDetails {
                params: Some(params),
                plan: details.plan,
            },
        ))
    }

    /// Group delegation: the group records its own call, then calls the
    /// delegated sub-task across member targets as prerequisites of the
    /// original dependent, ordered after the group's call.
    async fn delegate_as_pre(
        self: Arc<Self>,
        planner: &PrePlanner,
        pre: &PreSpec,
        details: CallDetails,
    ) -> Result<Call> {
        if !planner.enter_delegation(self.id()) {
            // Member resolution came back to a group already delegating in
            // this chain. Its call is recorded; delegating again would
            // recurse forever.
            return Ok(planner.dependent().call(self, CallDetails::default()));
        }

        let (sub_name, sub_args) = self.delegated_task(pre);
        debug!(group = %self.id(), sub_task = %sub_name, "delegating group prerequisite");

        // The group's own call inherits attributes only, never args.
        let dependent = planner.dependent().planned_call().downgrade();
        let attrs = pre.attrs.clone();
        let base = details.params;
        let group_params: ParamsFn = Arc::new(move || {
            let mut params = dependent.params();
            params.extend_attrs(&attrs);
            if let Some(base) = &base {
                params.extend_attrs(&base().attrs);
            }
            params
        });
        let group_call = planner.dependent().call(
            Arc::clone(&self),
            CallDetails {
                params: Some(group_params),
                plan: None,
            },
        );

        let member_selectors = match &self.spec.action {
            Action::Group { targets } => targets.clone(),
            _ => Vec::new(),
        };
        let members = select_all(&self.target, &member_selectors).packages().await?;

        let group = group_call.downgrade();
        let sub_params: ParamsFn = Arc::new(move || group.params());
        let ordered = group_call.clone();
        let outer_plan = details.plan;
        let sub_plan: PlanFn = Arc::new(move |sub_planner: &CallPlanner| {
            sub_planner.order(&ordered, &sub_planner.planned_call());
            match &outer_plan {
                Some(plan) => plan(sub_planner),
                None => future::ready(Ok(())).boxed(),
            }
        });

        // The group's attrs already flow through its call parameters, so the
        // sub-task prerequisite carries args only.
        let sub_pre = PreSpec {
            task: sub_name.clone(),
            args: sub_args,
            attrs: Default::default(),
            ..pre.clone()
        };
        batch_all(
            planner,
            &members,
            &sub_name,
            &sub_pre,
            &CallDetails {
                params: Some(sub_params),
                plan: Some(sub_plan),
            },
        )
        .await?;
        Ok(group_call)
    }

    /// Sub-task name and args a group prerequisite delegates to. A
    /// prerequisite stating the group's own name names the sub-task in its
    /// first plain argument; absent one, the group's own name is delegated.
    fn delegated_task(&self, pre: &PreSpec) -> (String, Vec<String>) {
        if pre.task == self.name {
            if let Some((first, rest)) = pre.args.split_first() {
                if is_plain_value(first) {
                    return (first.clone(), rest.to_vec());
                }
            }
            (self.name.clone(), pre.args.clone())
        } else {
            (pre.task.clone(), pre.args.clone())
        }
    }

    /// Starts execution of this task's call through the given shell.
    pub fn exec(&self, shell: &dyn Shell, call: &Call) -> Box<dyn Job> {
        match &self.spec.action {
            Action::Command { command, .. } => shell.exec_command(self, command, &call.params()),
            Action::Script { .. } => shell.exec_script(self, &call.params()),
            Action::Group { .. } => jobs::noop_job(),
        }
    }
}

fn is_plain_value(arg: &str) -> bool {
    !arg.is_empty() && !arg.starts_with('-')
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("target", &self.target.name())
            .field("name", &self.name)
            .finish()
    }
}
