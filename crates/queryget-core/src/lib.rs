//! queryget core - declaration-driven request-to-plan compiler.
//!
//! Entities declare once which fields and relations are filterable,
//! sortable and selectable under public aliases. At request time a flat
//! parameter map is compiled into a [`QueryPlan`](queryget_proto::QueryPlan):
//! predicates, a projection tree spanning relations, orderings and a window.
//!
//! # Modules
//!
//! - [`catalog`] - Entity and relation descriptors, declarations, hooks, schema files
//! - [`normalize`] - Declaration normalization
//! - [`registry`] - Entity registry and normalized table cache
//! - [`filter`] - Filter key compilation
//! - [`select`] - Selection expansion and projection
//! - [`sort`] - Sort token compilation
//! - [`join`] - Memoized left joins for relation paths
//! - [`plan`] - Request parameters, pagination and the [`QueryPlanner`]
//! - [`sql`] - Parameterized SQL rendering of a plan
//! - [`config`] - Planner configuration

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod join;
pub mod normalize;
pub mod plan;
pub mod registry;
pub mod select;
pub mod sort;
pub mod sql;

pub use catalog::{Declaration, EntityDef, RelationDef, RelationKind, Schema};
pub use config::{PlanConfig, RequestKeys};
pub use error::{Error, Result};
pub use filter::{CompiledFilter, FilterMode, FilterScope};
pub use join::{JoinScope, JoinState, JoinedPath};
pub use plan::{PageRequest, Params, QueryPlanner};
pub use registry::{CacheStats, EntityRegistry};
pub use select::{SelectionScope, SelectionTree};
pub use sort::SortScope;
pub use sql::{SqlBuilder, SqlStatement};

/// Re-export plan types.
pub use queryget_proto as proto;
