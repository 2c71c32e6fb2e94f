//! Data-access seam.
//!
//! The planner never talks to a database. A [`QueryBuilder`] receives the
//! compiled plan piece by piece through [`QueryPlan::apply`](crate::QueryPlan::apply)
//! and translates it for whatever data-access layer sits behind it.

use crate::error::Error;
use crate::predicate::Predicate;
use crate::projection::ColumnSelect;
use crate::query::{JoinClause, OrderSpec, Window};
use crate::relation::RelationLink;

/// Receiver for a compiled query plan.
pub trait QueryBuilder {
    /// Add a left join.
    fn left_join(&mut self, join: &JoinClause) -> Result<(), Error>;

    /// Add a filter. Successive filters are combined with AND.
    fn filter(&mut self, predicate: &Predicate) -> Result<(), Error>;

    /// Set the select list for the current level.
    fn select(&mut self, columns: &[ColumnSelect]) -> Result<(), Error>;

    /// Eager-load a relation. `load` narrows the nested query.
    fn with_relation(
        &mut self,
        link: &RelationLink,
        load: &mut dyn FnMut(&mut dyn QueryBuilder) -> Result<(), Error>,
    ) -> Result<(), Error>;

    /// Add an ordering.
    fn order_by(&mut self, order: &OrderSpec) -> Result<(), Error>;

    /// Restrict the returned rows.
    fn window(&mut self, window: Window) -> Result<(), Error>;
}
