//! Predicate tree produced by compiled filters.

use serde::{Deserialize, Serialize};

use crate::relation::RelationLink;
use crate::value::Value;

/// Comparison operator for a column predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// A predicate over one query level.
///
/// Column names are always qualified references built from declarations
/// (`table.column`); request values only ever appear in value slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Predicate {
    /// `column <op> value`.
    Compare {
        column: String,
        cmp: CompareOp,
        value: Value,
    },
    /// Column is one of the values.
    In { column: String, values: Vec<Value> },
    /// Column is null.
    IsNull { column: String },
    /// Column is not null.
    IsNotNull { column: String },
    /// Case-insensitive pattern match on the lowercased column.
    #[serde(rename = "ilike")]
    ILike {
        column: String,
        pattern: String,
        negated: bool,
    },
    /// A related row exists, optionally narrowed by a predicate on the related entity.
    Exists {
        relation: RelationLink,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        predicate: Option<Box<Predicate>>,
    },
    /// No related row exists.
    NotExists { relation: RelationLink },
    /// All predicates hold.
    And(Vec<Predicate>),
    /// At least one predicate holds.
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Create an equality predicate.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    /// Create a comparison predicate.
    pub fn compare(column: impl Into<String>, cmp: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            cmp,
            value: value.into(),
        }
    }

    /// Create a membership predicate.
    pub fn in_values(column: impl Into<String>, values: Vec<Value>) -> Self {
        Predicate::In {
            column: column.into(),
            values,
        }
    }

    /// Create an IS NULL predicate.
    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull {
            column: column.into(),
        }
    }

    /// Create an IS NOT NULL predicate.
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Predicate::IsNotNull {
            column: column.into(),
        }
    }

    /// Create a case-insensitive pattern match.
    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::ILike {
            column: column.into(),
            pattern: pattern.into(),
            negated: false,
        }
    }

    /// Create a negated case-insensitive pattern match.
    pub fn not_ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::ILike {
            column: column.into(),
            pattern: pattern.into(),
            negated: true,
        }
    }

    /// Related rows must exist.
    pub fn exists(relation: RelationLink, predicate: Option<Predicate>) -> Self {
        Predicate::Exists {
            relation,
            predicate: predicate.map(Box::new),
        }
    }

    /// Related rows must not exist.
    pub fn not_exists(relation: RelationLink) -> Self {
        Predicate::NotExists { relation }
    }

    /// Combine with AND, collapsing single-element groups.
    pub fn all(mut predicates: Vec<Predicate>) -> Option<Self> {
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Predicate::And(predicates)),
        }
    }

    /// Combine with OR, collapsing single-element groups.
    pub fn any(mut predicates: Vec<Predicate>) -> Option<Self> {
        match predicates.len() {
            0 => None,
            1 => predicates.pop(),
            _ => Some(Predicate::Or(predicates)),
        }
    }

    /// Distinct top-level columns referenced by this tree, sorted.
    ///
    /// Columns inside relation predicates belong to the related entity and
    /// are not included.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { column, .. }
            | Predicate::In { column, .. }
            | Predicate::IsNull { column }
            | Predicate::IsNotNull { column }
            | Predicate::ILike { column, .. } => out.push(column),
            Predicate::And(items) | Predicate::Or(items) => {
                for item in items {
                    item.collect_columns(out);
                }
            }
            Predicate::Exists { .. } | Predicate::NotExists { .. } => {}
        }
    }

    /// Number of leaf predicates in this tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::And(items) | Predicate::Or(items) => {
                items.iter().map(Predicate::leaf_count).sum()
            }
            Predicate::Exists {
                predicate: Some(inner),
                ..
            } => 1 + inner.leaf_count(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinators_collapse() {
        assert_eq!(Predicate::all(vec![]), None);
        assert_eq!(
            Predicate::any(vec![Predicate::is_null("users.email")]),
            Some(Predicate::is_null("users.email"))
        );

        let both = Predicate::any(vec![
            Predicate::eq("users.id", 1),
            Predicate::eq("users.id", 2),
        ])
        .unwrap();
        assert!(matches!(both, Predicate::Or(ref items) if items.len() == 2));
    }

    #[test]
    fn test_leaf_count() {
        let p = Predicate::And(vec![
            Predicate::eq("orders.status", "open"),
            Predicate::exists(
                RelationLink::new("buyer", "customers", "orders.customer_id", "customers.id"),
                Some(Predicate::ilike("customers.name", "%acme%")),
            ),
            Predicate::Or(vec![
                Predicate::is_null("orders.note"),
                Predicate::is_not_null("orders.paid_at"),
            ]),
        ]);
        assert_eq!(p.leaf_count(), 5);
    }

    #[test]
    fn test_columns_collected() {
        let p = Predicate::And(vec![
            Predicate::eq("orders.status", "open"),
            Predicate::Or(vec![
                Predicate::is_null("orders.note"),
                Predicate::eq("orders.status", "held"),
            ]),
        ]);
        assert_eq!(p.columns(), vec!["orders.note", "orders.status"]);
    }

    #[test]
    fn test_serialized_shape() {
        let p = Predicate::not_ilike("users.name", "bob");
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["op"], "ilike");
        assert_eq!(json["args"]["negated"], true);
    }
}
