//! Call graph construction: calls, parameters, and the planner.

pub mod call;
pub mod params;
pub mod planner;

pub use call::{Call, Plan, Qualifier, TaskId};
pub use params::{Attrs, ParamsFn, TaskParams};
pub use planner::{CallDetails, CallPlanner, PlanFn, Planner};

pub(crate) use planner::PrePlanner;
