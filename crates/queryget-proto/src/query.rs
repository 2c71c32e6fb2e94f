//! Query plan IR.
//!
//! A [`QueryPlan`] is the complete output of compiling one request against
//! one entity. It references storage identifiers only through names taken
//! from declarations; every request value sits in a [`Value`](crate::Value)
//! slot inside a [`Predicate`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::builder::QueryBuilder;
use crate::error::Error;
use crate::predicate::Predicate;
use crate::projection::Projection;

/// A `LEFT JOIN <table> AS <alias> ON <left> = <right>` clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinClause {
    /// Joined table.
    pub table: String,
    /// Alias the joined table is visible under.
    pub alias: String,
    /// Qualified column on the joined side.
    pub left: String,
    /// Qualified column on the already-joined side.
    pub right: String,
}

impl JoinClause {
    /// Create a join clause.
    pub fn new(
        table: impl Into<String>,
        alias: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            left: left.into(),
            right: right.into(),
        }
    }
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LEFT JOIN {} AS {} ON {} = {}",
            self.table, self.alias, self.left, self.right
        )
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    /// Ascending order.
    #[default]
    Asc,
    /// Descending order.
    Desc,
}

impl OrderDirection {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }

    /// Split a trailing `_asc` / `_desc` off a sort token.
    ///
    /// Tokens without a suffix sort ascending.
    pub fn split_token(token: &str) -> (&str, OrderDirection) {
        if let Some(stripped) = token.strip_suffix("_desc") {
            (stripped, OrderDirection::Desc)
        } else if let Some(stripped) = token.strip_suffix("_asc") {
            (stripped, OrderDirection::Asc)
        } else {
            (token, OrderDirection::Asc)
        }
    }
}

/// Ordering on a column or hook-authored expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Qualified column or expression to order by.
    pub column: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Create an order spec.
    pub fn new(column: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    /// Create an ascending order spec.
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, OrderDirection::Asc)
    }

    /// Create a descending order spec.
    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, OrderDirection::Desc)
    }
}

/// Row window: rows to skip and rows to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    /// Rows skipped before the first returned row.
    pub skip: u64,
    /// Maximum number of rows returned.
    pub take: u64,
}

impl Window {
    /// Create a window from explicit skip and take.
    pub fn new(skip: u64, take: u64) -> Self {
        Self { skip, take }
    }

    /// Create a window for a one-based page number. Pages below 1 clamp to 1.
    pub fn from_page(page: i64, size: u64) -> Result<Self, Error> {
        let page = page.max(1) as u64;
        let skip = (page - 1)
            .checked_mul(size)
            .ok_or(Error::WindowOverflow { page, size })?;
        Ok(Self { skip, take: size })
    }
}

/// Compiled query plan for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Entity the plan was compiled for.
    pub entity: String,
    /// Root storage table.
    pub table: String,
    /// Left joins, in the order they were first requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinClause>,
    /// Filters, all of which must hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<Predicate>,
    /// Projection tree. `None` leaves the builder's default select list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<Projection>,
    /// Orderings, in application order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderSpec>,
    /// Row window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<Window>,
}

impl QueryPlan {
    /// Create an empty plan over a table.
    pub fn new(entity: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
            joins: vec![],
            filters: vec![],
            projection: None,
            order_by: vec![],
            window: None,
        }
    }

    /// All filters combined into a single predicate.
    pub fn predicate(&self) -> Option<Predicate> {
        Predicate::all(self.filters.clone())
    }

    /// Look up a join by alias.
    pub fn join(&self, alias: &str) -> Option<&JoinClause> {
        self.joins.iter().find(|j| j.alias == alias)
    }

    /// Hand the plan to a data-access builder.
    ///
    /// Joins are applied first so filters and orderings can reference join
    /// aliases, then filters, the projection with its relation loaders,
    /// orderings and finally the window.
    pub fn apply(&self, builder: &mut dyn QueryBuilder) -> Result<(), Error> {
        for join in &self.joins {
            builder.left_join(join)?;
        }
        for filter in &self.filters {
            builder.filter(filter)?;
        }
        if let Some(projection) = &self.projection {
            apply_projection(projection, builder)?;
        }
        for order in &self.order_by {
            builder.order_by(order)?;
        }
        if let Some(window) = self.window {
            builder.window(window)?;
        }
        Ok(())
    }
}

fn apply_projection(projection: &Projection, builder: &mut dyn QueryBuilder) -> Result<(), Error> {
    builder.select(&projection.columns)?;
    for relation in projection.relations.values() {
        let child = &relation.projection;
        builder.with_relation(&relation.link, &mut |nested| apply_projection(child, nested))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ColumnSelect;
    use crate::relation::RelationLink;

    #[test]
    fn test_split_token() {
        assert_eq!(OrderDirection::split_token("name"), ("name", OrderDirection::Asc));
        assert_eq!(
            OrderDirection::split_token("buyer.name_desc"),
            ("buyer.name", OrderDirection::Desc)
        );
        assert_eq!(
            OrderDirection::split_token("created_at_asc"),
            ("created_at", OrderDirection::Asc)
        );
    }

    #[test]
    fn test_window_from_page() {
        assert_eq!(Window::from_page(3, 10).unwrap(), Window::new(20, 10));
        assert_eq!(Window::from_page(0, 10).unwrap(), Window::new(0, 10));
        assert_eq!(Window::from_page(-4, 25).unwrap(), Window::new(0, 25));
        assert!(Window::from_page(i64::MAX, u64::MAX).is_err());
    }

    #[test]
    fn test_join_display() {
        let join = JoinClause::new(
            "customers",
            "orders_buyer_join",
            "orders_buyer_join.id",
            "orders.customer_id",
        );
        assert_eq!(
            join.to_string(),
            "LEFT JOIN customers AS orders_buyer_join ON orders_buyer_join.id = orders.customer_id"
        );
    }

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl QueryBuilder for Recorder {
        fn left_join(&mut self, join: &JoinClause) -> Result<(), Error> {
            self.calls.push(format!("join {}", join.alias));
            Ok(())
        }

        fn filter(&mut self, predicate: &Predicate) -> Result<(), Error> {
            self.calls.push(format!("filter {}", predicate.leaf_count()));
            Ok(())
        }

        fn select(&mut self, columns: &[ColumnSelect]) -> Result<(), Error> {
            self.calls.push(format!("select {}", columns.len()));
            Ok(())
        }

        fn with_relation(
            &mut self,
            link: &RelationLink,
            load: &mut dyn FnMut(&mut dyn QueryBuilder) -> Result<(), Error>,
        ) -> Result<(), Error> {
            self.calls.push(format!("with {}", link.name));
            let mut nested = Recorder::default();
            load(&mut nested)?;
            self.calls
                .extend(nested.calls.into_iter().map(|c| format!("  {c}")));
            Ok(())
        }

        fn order_by(&mut self, order: &OrderSpec) -> Result<(), Error> {
            self.calls.push(format!("order {}", order.column));
            Ok(())
        }

        fn window(&mut self, window: Window) -> Result<(), Error> {
            self.calls.push(format!("window {} {}", window.skip, window.take));
            Ok(())
        }
    }

    #[test]
    fn test_apply_order() {
        let mut plan = QueryPlan::new("Post", "posts");
        plan.joins.push(JoinClause::new(
            "users",
            "posts_author_join",
            "posts_author_join.id",
            "posts.author_id",
        ));
        plan.filters.push(Predicate::eq("posts.status", "live"));
        plan.projection = Some(
            Projection::new()
                .with_column(ColumnSelect::aliased("posts.title", "title"))
                .with_relation(
                    RelationLink::new("author", "users", "posts.author_id", "users.id"),
                    Projection::new().with_column(ColumnSelect::raw("users.id")),
                ),
        );
        plan.order_by.push(OrderSpec::desc("posts_author_join.name"));
        plan.window = Some(Window::new(0, 10));

        let mut recorder = Recorder::default();
        plan.apply(&mut recorder).unwrap();

        assert_eq!(
            recorder.calls,
            vec![
                "join posts_author_join",
                "filter 1",
                "select 1",
                "with author",
                "  select 1",
                "order posts_author_join.name",
                "window 0 10",
            ]
        );
    }
}
