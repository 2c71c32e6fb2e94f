//! Parameterized SQL rendering of a query plan.
//!
//! [`SqlBuilder`] is a [`QueryBuilder`] that turns a plan into PostgreSQL
//! statements with numbered `$n` placeholders: one for the root query and
//! one per eager-loaded relation. Identifiers come from declarations;
//! request values only ever land in the parameter list.

use std::fmt::Write as _;

use queryget_proto::{
    ColumnSelect, Error as PlanError, JoinClause, OrderSpec, Predicate, QueryBuilder, QueryPlan,
    RelationLink, Value, Window,
};
use serde::Serialize;

use crate::error::Result;

/// One rendered statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    /// Dotted relation path; empty for the root query.
    pub path: String,
    /// SQL text.
    pub sql: String,
    /// Values for `$1..$n`, in order.
    pub params: Vec<Value>,
    /// For relation statements, the parent column whose values fill `$1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_column: Option<String>,
}

/// Render every statement a plan needs, root first.
pub fn render(plan: &QueryPlan) -> Result<Vec<SqlStatement>> {
    let mut builder = SqlBuilder::new(&plan.table);
    plan.apply(&mut builder)?;
    Ok(builder.finish())
}

/// Collects a plan through the [`QueryBuilder`] seam and renders SQL.
#[derive(Debug)]
pub struct SqlBuilder {
    table: String,
    path: String,
    parent: Option<RelationLink>,
    columns: Vec<ColumnSelect>,
    joins: Vec<JoinClause>,
    conditions: Vec<String>,
    orders: Vec<OrderSpec>,
    window: Option<Window>,
    params: Vec<Value>,
    nested: Vec<SqlStatement>,
}

impl SqlBuilder {
    /// Create a builder for a root table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            path: String::new(),
            parent: None,
            columns: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            orders: Vec::new(),
            window: None,
            params: Vec::new(),
            nested: Vec::new(),
        }
    }

    fn for_relation(path: String, link: &RelationLink) -> Self {
        let mut builder = Self::new(&link.table);
        builder.path = path;
        // $1 is the parent key list, bound by the data-access layer
        builder.params.push(Value::List(Vec::new()));
        let mut condition = format!("{} = ANY($1)", link.related_column);
        if let Some(morph) = &link.morph {
            let slot = builder.bind(Value::String(morph.value.clone()));
            let _ = write!(condition, " AND {} = {slot}", morph.column);
        }
        builder.conditions.push(condition);
        builder.parent = Some(link.clone());
        builder
    }

    /// Finish rendering: the statement for this level, then every nested
    /// relation statement.
    pub fn finish(mut self) -> Vec<SqlStatement> {
        let sql = self.statement();
        let mut out = Vec::with_capacity(1 + self.nested.len());
        out.push(SqlStatement {
            path: self.path,
            sql,
            params: self.params,
            parent_column: self.parent.map(|link| link.parent_column),
        });
        out.append(&mut self.nested);
        out
    }

    fn statement(&mut self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {columns} FROM {}", self.table);
        for join in &self.joins {
            let _ = write!(sql, " {join}");
        }
        if !self.conditions.is_empty() {
            let _ = write!(sql, " WHERE {}", self.conditions.join(" AND "));
        }
        if !self.orders.is_empty() {
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|o| format!("{} {}", o.column, o.direction.as_sql()))
                .collect();
            let _ = write!(sql, " ORDER BY {}", orders.join(", "));
        }
        if let Some(window) = self.window {
            let take = self.bind(Value::Int(clamp_i64(window.take)));
            let skip = self.bind(Value::Int(clamp_i64(window.skip)));
            let _ = write!(sql, " LIMIT {take} OFFSET {skip}");
        }
        sql
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn condition(&mut self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Compare { column, cmp, value } => {
                let slot = self.bind(value.clone());
                format!("{column} {} {slot}", cmp.as_sql())
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    return "FALSE".to_string();
                }
                let slots: Vec<String> = values.iter().map(|v| self.bind(v.clone())).collect();
                format!("{column} IN ({})", slots.join(", "))
            }
            Predicate::IsNull { column } => format!("{column} IS NULL"),
            Predicate::IsNotNull { column } => format!("{column} IS NOT NULL"),
            Predicate::ILike {
                column,
                pattern,
                negated,
            } => {
                let slot = self.bind(Value::String(pattern.clone()));
                let not = if *negated { "NOT " } else { "" };
                format!("LOWER({column}) {not}LIKE {slot}")
            }
            Predicate::Exists {
                relation,
                predicate,
            } => {
                let mut sub = self.correlated(relation);
                if let Some(inner) = predicate {
                    let _ = write!(sub, " AND {}", self.condition(inner));
                }
                format!("EXISTS ({sub})")
            }
            Predicate::NotExists { relation } => {
                format!("NOT EXISTS ({})", self.correlated(relation))
            }
            Predicate::And(items) => self.group(items, " AND ", "TRUE"),
            Predicate::Or(items) => self.group(items, " OR ", "FALSE"),
        }
    }

    fn correlated(&mut self, link: &RelationLink) -> String {
        let mut sub = format!(
            "SELECT 1 FROM {} WHERE {} = {}",
            link.table, link.related_column, link.parent_column
        );
        if let Some(morph) = &link.morph {
            let slot = self.bind(Value::String(morph.value.clone()));
            let _ = write!(sub, " AND {} = {slot}", morph.column);
        }
        sub
    }

    fn group(&mut self, items: &[Predicate], separator: &str, empty: &str) -> String {
        match items {
            [] => empty.to_string(),
            [single] => self.condition(single),
            _ => {
                let parts: Vec<String> = items.iter().map(|p| self.condition(p)).collect();
                format!("({})", parts.join(separator))
            }
        }
    }
}

impl QueryBuilder for SqlBuilder {
    fn left_join(&mut self, join: &JoinClause) -> std::result::Result<(), PlanError> {
        self.joins.push(join.clone());
        Ok(())
    }

    fn filter(&mut self, predicate: &Predicate) -> std::result::Result<(), PlanError> {
        let condition = self.condition(predicate);
        self.conditions.push(condition);
        Ok(())
    }

    fn select(&mut self, columns: &[ColumnSelect]) -> std::result::Result<(), PlanError> {
        self.columns = columns.to_vec();
        Ok(())
    }

    fn with_relation(
        &mut self,
        link: &RelationLink,
        load: &mut dyn FnMut(&mut dyn QueryBuilder) -> std::result::Result<(), PlanError>,
    ) -> std::result::Result<(), PlanError> {
        let path = if self.path.is_empty() {
            link.name.clone()
        } else {
            format!("{}.{}", self.path, link.name)
        };
        let mut child = SqlBuilder::for_relation(path, link);
        load(&mut child)?;
        self.nested.extend(child.finish());
        Ok(())
    }

    fn order_by(&mut self, order: &OrderSpec) -> std::result::Result<(), PlanError> {
        self.orders.push(order.clone());
        Ok(())
    }

    fn window(&mut self, window: Window) -> std::result::Result<(), PlanError> {
        self.window = Some(window);
        Ok(())
    }
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use queryget_proto::{CompareOp, Projection};

    use super::*;

    fn buyer() -> RelationLink {
        RelationLink::new("buyer", "customers", "orders.customer_id", "customers.id")
    }

    #[test]
    fn test_root_statement() {
        let mut plan = QueryPlan::new("Order", "orders");
        plan.joins.push(JoinClause::new(
            "customers",
            "orders_buyer_join",
            "orders_buyer_join.id",
            "orders.customer_id",
        ));
        plan.filters.push(Predicate::compare("orders.total", CompareOp::Ge, 100));
        plan.filters.push(Predicate::Or(vec![
            Predicate::ilike("orders.note", "rush"),
            Predicate::in_values("orders.status", vec!["open".into(), "held".into()]),
        ]));
        plan.order_by.push(OrderSpec::desc("orders_buyer_join.name"));
        plan.window = Some(Window::new(20, 10));

        let statements = render(&plan).unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(
            statements[0].sql,
            "SELECT * FROM orders \
             LEFT JOIN customers AS orders_buyer_join ON orders_buyer_join.id = orders.customer_id \
             WHERE orders.total >= $1 AND (LOWER(orders.note) LIKE $2 OR orders.status IN ($3, $4)) \
             ORDER BY orders_buyer_join.name DESC LIMIT $5 OFFSET $6"
        );
        assert_eq!(
            statements[0].params,
            vec![
                Value::Int(100),
                "rush".into(),
                "open".into(),
                "held".into(),
                Value::Int(10),
                Value::Int(20),
            ]
        );
    }

    #[test]
    fn test_exists_and_empty_in() {
        let mut plan = QueryPlan::new("Order", "orders");
        plan.filters.push(Predicate::exists(
            buyer(),
            Some(Predicate::not_ilike("customers.name", "acme")),
        ));
        plan.filters.push(Predicate::not_exists(
            RelationLink::new("notes", "notes", "orders.id", "notes.noteable_id")
                .with_morph("notes.noteable_type", "Order"),
        ));
        plan.filters.push(Predicate::in_values("orders.id", vec![]));

        let statements = render(&plan).unwrap();
        assert_eq!(
            statements[0].sql,
            "SELECT * FROM orders WHERE \
             EXISTS (SELECT 1 FROM customers WHERE customers.id = orders.customer_id \
             AND LOWER(customers.name) NOT LIKE $1) \
             AND NOT EXISTS (SELECT 1 FROM notes WHERE notes.noteable_id = orders.id \
             AND notes.noteable_type = $2) \
             AND FALSE"
        );
        assert_eq!(statements[0].params, vec!["acme".into(), "Order".into()]);
    }

    #[test]
    fn test_relation_statements() {
        let mut plan = QueryPlan::new("Order", "orders");
        plan.projection = Some(
            Projection::new()
                .with_column(ColumnSelect::aliased("orders.status", "status"))
                .with_column(ColumnSelect::raw("orders.customer_id"))
                .with_relation(
                    buyer(),
                    Projection::new()
                        .with_column(ColumnSelect::aliased("customers.name", "name"))
                        .with_column(ColumnSelect::raw("customers.id")),
                ),
        );

        let statements = render(&plan).unwrap();
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].sql,
            "SELECT orders.status AS status, orders.customer_id FROM orders"
        );
        assert_eq!(statements[1].path, "buyer");
        assert_eq!(
            statements[1].sql,
            "SELECT customers.name AS name, customers.id FROM customers \
             WHERE customers.id = ANY($1)"
        );
        assert_eq!(
            statements[1].parent_column.as_deref(),
            Some("orders.customer_id")
        );
    }
}
