//! Projection tree: selected columns per level plus eager-loaded relations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::relation::RelationLink;

/// One entry of a select list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSelect {
    /// A qualified storage column, optionally renamed to its public alias.
    Column {
        column: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
    /// A raw expression supplied by a registered select hook.
    Expression {
        expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    },
}

impl ColumnSelect {
    /// Select a column under its public alias.
    pub fn aliased(column: impl Into<String>, alias: impl Into<String>) -> Self {
        ColumnSelect::Column {
            column: column.into(),
            alias: Some(alias.into()),
        }
    }

    /// Select a column under its own name. Used for relation key columns.
    pub fn raw(column: impl Into<String>) -> Self {
        ColumnSelect::Column {
            column: column.into(),
            alias: None,
        }
    }

    /// Select a hook-authored expression.
    pub fn expression(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        ColumnSelect::Expression {
            expr: expr.into(),
            alias: Some(alias.into()),
        }
    }

    /// Name of the column in the result row.
    pub fn output_name(&self) -> &str {
        match self {
            ColumnSelect::Column { column, alias } => alias
                .as_deref()
                .unwrap_or_else(|| column.rsplit('.').next().unwrap_or(column)),
            ColumnSelect::Expression { expr, alias } => alias.as_deref().unwrap_or(expr),
        }
    }

    /// Public alias, if one was given.
    pub fn alias(&self) -> Option<&str> {
        match self {
            ColumnSelect::Column { alias, .. } | ColumnSelect::Expression { alias, .. } => {
                alias.as_deref()
            }
        }
    }
}

impl fmt::Display for ColumnSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (body, alias) = match self {
            ColumnSelect::Column { column, alias } => (column, alias),
            ColumnSelect::Expression { expr, alias } => (expr, alias),
        };
        match alias {
            Some(alias) => write!(f, "{body} AS {alias}"),
            None => write!(f, "{body}"),
        }
    }
}

/// Columns selected at one level and the relations loaded beneath it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Select list, without duplicates, in insertion order.
    pub columns: Vec<ColumnSelect>,
    /// Eager-loaded relations keyed by accessor name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, RelationProjection>,
}

/// A relation to eager-load together with its own projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationProjection {
    /// Key columns joining the relation to its parent.
    pub link: RelationLink,
    /// What to select from the related entity.
    pub projection: Projection,
}

impl Projection {
    /// Create an empty projection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column, ignoring exact duplicates.
    pub fn push_column(&mut self, column: ColumnSelect) {
        if !self.columns.contains(&column) {
            self.columns.push(column);
        }
    }

    /// Builder form of [`Projection::push_column`].
    pub fn with_column(mut self, column: ColumnSelect) -> Self {
        self.push_column(column);
        self
    }

    /// Attach a relation projection.
    pub fn with_relation(mut self, link: RelationLink, projection: Projection) -> Self {
        self.relations
            .insert(link.name.clone(), RelationProjection { link, projection });
        self
    }

    /// Look up a loaded relation by accessor name.
    pub fn relation(&self, name: &str) -> Option<&RelationProjection> {
        self.relations.get(name)
    }

    /// Public aliases selected at this level.
    pub fn aliases(&self) -> Vec<&str> {
        self.columns.iter().filter_map(ColumnSelect::alias).collect()
    }

    /// Check whether nothing is selected at this level or below.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.relations.is_empty()
    }

    /// Deepest relation nesting below this level.
    pub fn depth(&self) -> usize {
        self.relations
            .values()
            .map(|r| 1 + r.projection.depth())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_display() {
        assert_eq!(
            ColumnSelect::aliased("posts.title", "headline").to_string(),
            "posts.title AS headline"
        );
        assert_eq!(ColumnSelect::raw("posts.author_id").to_string(), "posts.author_id");
        assert_eq!(ColumnSelect::raw("posts.author_id").output_name(), "author_id");
    }

    #[test]
    fn test_push_column_dedups() {
        let mut p = Projection::new();
        p.push_column(ColumnSelect::raw("posts.id"));
        p.push_column(ColumnSelect::raw("posts.id"));
        p.push_column(ColumnSelect::aliased("posts.title", "title"));
        assert_eq!(p.columns.len(), 2);
        assert_eq!(p.aliases(), vec!["title"]);
    }

    #[test]
    fn test_depth() {
        let inner = Projection::new().with_column(ColumnSelect::aliased("users.bio", "bio"));
        let p = Projection::new()
            .with_column(ColumnSelect::aliased("posts.title", "title"))
            .with_relation(
                RelationLink::new("author", "users", "posts.author_id", "users.id"),
                inner,
            );
        assert_eq!(p.depth(), 1);
        assert!(p.relation("author").is_some());
        assert!(!p.is_empty());
    }
}
