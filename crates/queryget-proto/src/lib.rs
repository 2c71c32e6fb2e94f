//! Query plan types for queryget.
//!
//! This crate defines the intermediate representation produced by the
//! planner in `queryget-core` and consumed by data-access layers.
//!
//! # Modules
//!
//! - [`value`] - Runtime values carried from request parameters into predicates
//! - [`predicate`] - Predicate trees
//! - [`relation`] - Key links between a parent entity and a related entity
//! - [`projection`] - Select lists and eager-loaded relation projections
//! - [`query`] - Joins, orderings, windows and the [`QueryPlan`] itself
//! - [`builder`] - The [`QueryBuilder`] seam a plan is applied through
//! - [`error`] - Plan error types
//!
//! # Serialization
//!
//! Every type derives serde `Serialize` and `Deserialize` so a plan can be
//! printed as JSON for inspection:
//!
//! ```
//! use queryget_proto::{OrderSpec, Predicate, QueryPlan};
//!
//! let mut plan = QueryPlan::new("Order", "orders");
//! plan.filters.push(Predicate::eq("orders.status", "open"));
//! plan.order_by.push(OrderSpec::desc("orders.created_at"));
//!
//! let json = serde_json::to_string(&plan).unwrap();
//! let back: QueryPlan = serde_json::from_str(&json).unwrap();
//! assert_eq!(back.order_by, plan.order_by);
//! ```

pub mod builder;
pub mod error;
pub mod predicate;
pub mod projection;
pub mod query;
pub mod relation;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use builder::QueryBuilder;
pub use predicate::{CompareOp, Predicate};
pub use projection::{ColumnSelect, Projection, RelationProjection};
pub use query::{JoinClause, OrderDirection, OrderSpec, QueryPlan, Window};
pub use relation::{MorphConstraint, RelationLink};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_json_shape() {
        let mut plan = QueryPlan::new("Order", "orders");
        plan.filters.push(Predicate::exists(
            RelationLink::new("buyer", "customers", "orders.customer_id", "customers.id"),
            Some(Predicate::ilike("customers.name", "%acme%")),
        ));
        plan.window = Some(Window::new(10, 10));

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["entity"], "Order");
        assert_eq!(json["filters"][0]["op"], "exists");
        assert_eq!(json["filters"][0]["args"]["relation"]["table"], "customers");
        assert_eq!(json["window"]["skip"], 10);
        assert!(json.get("joins").is_none());
    }

    #[test]
    fn test_plan_roundtrip() {
        let mut plan = QueryPlan::new("Post", "posts");
        plan.filters.push(Predicate::in_values(
            "posts.status",
            vec![Value::from("draft"), Value::from("live")],
        ));
        plan.projection = Some(
            Projection::new().with_column(ColumnSelect::aliased("posts.title", "title")),
        );
        plan.order_by.push(OrderSpec::asc("posts.id"));

        let json = serde_json::to_string(&plan).unwrap();
        let back: QueryPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
