//! Sort token compilation.
//!
//! Tokens are `alias`, `alias_asc` or `alias_desc`. Declared aliases order on
//! their storage column or through the entity's sort override. Dotted tokens
//! that are not declared join their relation prefix and order on the joined
//! table.

use std::sync::Arc;

use queryget_proto::{OrderDirection, OrderSpec};
use tracing::trace;

use crate::catalog::{DeclarationKind, EntityDef};
use crate::error::{Error, Result};
use crate::join::{ensure_left_join, JoinScope, JoinState, JoinedPath};
use crate::registry::EntityRegistry;
use crate::select::SelectionScope;

/// Handle given to sort overrides.
///
/// Overrides may join relation paths to order on related columns; the joins
/// land in the plan being built.
pub struct SortScope<'a> {
    entity: &'a Arc<EntityDef>,
    joins: JoinScope<'a>,
    alias: &'a str,
    key: &'a str,
}

impl<'a> SortScope<'a> {
    /// Entity being sorted.
    pub fn entity(&self) -> &EntityDef {
        self.entity
    }

    /// Storage table of the entity.
    pub fn table(&self) -> &str {
        &self.entity.table
    }

    /// Public alias from the sort token.
    pub fn alias(&self) -> &str {
        self.alias
    }

    /// Declared storage key the override is registered for.
    pub fn key(&self) -> &str {
        self.key
    }

    /// Qualified column for the key.
    pub fn column(&self) -> String {
        self.entity.column(self.key)
    }

    /// Left-join a relation path and return its alias.
    pub fn left_join(&mut self, path: &str) -> Result<Option<String>> {
        self.joins.left_join(path)
    }

    /// Left-join a relation path and return its alias and entity.
    pub fn left_join_entity(&mut self, path: &str) -> Result<Option<JoinedPath>> {
        self.joins.left_join_entity(path)
    }
}

/// Compile sort tokens into orderings.
///
/// Tokens outside `scope`, unknown aliases and unresolvable paths are
/// dropped. Joins needed by dotted tokens are recorded in `joins`.
pub fn resolve_sort<S: AsRef<str>>(
    registry: &EntityRegistry,
    entity: &Arc<EntityDef>,
    tokens: &[S],
    scope: &SelectionScope,
    joins: &mut JoinState,
) -> Result<Vec<OrderSpec>> {
    let table = registry.table(&entity.name, DeclarationKind::Sortable)?;
    let mut orders = Vec::new();

    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        let (path, direction) = OrderDirection::split_token(token);
        if !path_allowed(scope, path) {
            trace!(entity = %entity.name, token, "sort outside scope");
            continue;
        }

        if let Some(entry) = table.get(path) {
            match entity.hooks.sort(&entry.key) {
                Some(hook) => {
                    let mut sort_scope = SortScope {
                        entity,
                        joins: JoinScope::new(registry, entity, &mut *joins),
                        alias: path,
                        key: &entry.key,
                    };
                    orders.extend(hook(&mut sort_scope, direction)?);
                }
                None => orders.push(OrderSpec::new(entity.column(&entry.key), direction)),
            }
            continue;
        }

        let Some((prefix, suffix)) = path.rsplit_once('.') else {
            trace!(entity = %entity.name, token, "not a sortable alias");
            continue;
        };
        let Some(joined) = ensure_left_join(registry, entity, joins, prefix)? else {
            continue;
        };
        match related_column(registry, &joined, suffix)? {
            Some(column) => orders.push(OrderSpec::new(column, direction)),
            None => trace!(entity = %entity.name, token, "not a sortable related column"),
        }
    }

    Ok(orders)
}

/// Column on a joined table for a sort suffix.
///
/// A suffix declared sortable on the joined entity maps to its key; any
/// other plain identifier is used as the column name.
fn related_column(
    registry: &EntityRegistry,
    joined: &JoinedPath,
    suffix: &str,
) -> Result<Option<String>> {
    let key = match registry.table(&joined.entity.name, DeclarationKind::Sortable) {
        Ok(table) => table.get(suffix).map(|e| e.key.clone()),
        Err(Error::NotSortable(_)) => None,
        Err(e) => return Err(e),
    };
    let key = match key {
        Some(key) if is_identifier(&key) => key,
        Some(_) => return Ok(None),
        None if is_identifier(suffix) => suffix.to_string(),
        None => return Ok(None),
    };
    Ok(Some(format!("{}.{}", joined.alias, key)))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn path_allowed(scope: &SelectionScope, path: &str) -> bool {
    let mut scope = scope.clone();
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !scope.allows(segment) {
            return false;
        }
        if segments.peek().is_some() {
            scope = scope.child(segment);
        }
    }
    true
}
