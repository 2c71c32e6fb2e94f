//! Plan orchestration.
//!
//! - [`Params`] - flat request parameters
//! - [`PageRequest`] - window selection
//! - [`QueryPlanner`] - per-query state composing filter, select, sort and
//!   paginate into a [`QueryPlan`](queryget_proto::QueryPlan)

mod pagination;
mod params;
mod planner;

pub use pagination::PageRequest;
pub use params::Params;
pub use planner::QueryPlanner;
