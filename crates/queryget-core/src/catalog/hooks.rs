//! Per-entity hook registry.
//!
//! Hooks customize how individual aliases compile. They are registered
//! together with the entity and never change afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use queryget_proto::{ColumnSelect, JoinClause, OrderDirection, OrderSpec, Predicate, Value};

use crate::error::Result;
use crate::filter::FilterScope;
use crate::sort::SortScope;

/// What a select hook knows about the alias it selects.
#[derive(Debug, Clone, Copy)]
pub struct SelectContext<'a> {
    /// Storage table of the entity.
    pub table: &'a str,
    /// Public alias the column is returned under.
    pub alias: &'a str,
    /// Declared storage key.
    pub key: &'a str,
}

/// What a custom join hook knows about the path segment it resolves.
#[derive(Debug, Clone, Copy)]
pub struct JoinContext<'a> {
    /// Alias (or table) the join attaches to.
    pub prior: &'a str,
    /// Alias the join should use.
    pub alias: &'a str,
}

/// A join supplied by a custom join hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomJoin {
    /// Clause to emit.
    pub clause: JoinClause,
    /// Entity reached through the join. `None` keeps resolving against the
    /// entity that registered the hook.
    pub entity: Option<String>,
}

impl CustomJoin {
    /// Create a custom join that stays on the current entity.
    pub fn new(clause: JoinClause) -> Self {
        Self {
            clause,
            entity: None,
        }
    }

    /// Continue resolving the path against another entity.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

/// Compiles a request value into a predicate. `None` applies nothing.
pub type FilterHook =
    Arc<dyn Fn(&mut FilterScope<'_, '_>, &Value) -> Result<Option<Predicate>> + Send + Sync>;

/// Produces the select entry for an alias.
pub type SelectHook = Arc<dyn Fn(&SelectContext<'_>) -> Result<ColumnSelect> + Send + Sync>;

/// Produces orderings for a sort key, joining through the scope as needed.
pub type SortHook =
    Arc<dyn Fn(&mut SortScope<'_>, OrderDirection) -> Result<Vec<OrderSpec>> + Send + Sync>;

/// Resolves a join path segment that is not a relation accessor.
pub type JoinHook = Arc<dyn Fn(&JoinContext<'_>) -> Result<Option<CustomJoin>> + Send + Sync>;

/// Hooks registered on one entity.
#[derive(Clone, Default)]
pub struct EntityHooks {
    modes: HashMap<String, FilterHook>,
    filters: HashMap<String, FilterHook>,
    selects: HashMap<String, SelectHook>,
    sorts: HashMap<String, SortHook>,
    joins: HashMap<String, JoinHook>,
}

impl EntityHooks {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter builder for a custom mode.
    pub fn add_mode_filter<F>(&mut self, mode: &str, hook: F)
    where
        F: Fn(&mut FilterScope<'_, '_>, &Value) -> Result<Option<Predicate>> + Send + Sync + 'static,
    {
        self.modes.insert(mode_key(mode), Arc::new(hook));
    }

    /// Register a filter for one alias.
    pub fn add_custom_filter<F>(&mut self, alias: impl Into<String>, hook: F)
    where
        F: Fn(&mut FilterScope<'_, '_>, &Value) -> Result<Option<Predicate>> + Send + Sync + 'static,
    {
        self.filters.insert(alias.into(), Arc::new(hook));
    }

    /// Register a select hook for a storage key.
    pub fn add_select<F>(&mut self, key: impl Into<String>, hook: F)
    where
        F: Fn(&SelectContext<'_>) -> Result<ColumnSelect> + Send + Sync + 'static,
    {
        self.selects.insert(key.into(), Arc::new(hook));
    }

    /// Register a sort override for a storage key.
    pub fn add_sort<F>(&mut self, key: impl Into<String>, hook: F)
    where
        F: Fn(&mut SortScope<'_>, OrderDirection) -> Result<Vec<OrderSpec>> + Send + Sync + 'static,
    {
        self.sorts.insert(key.into(), Arc::new(hook));
    }

    /// Register a custom join for a path segment.
    pub fn add_join<F>(&mut self, segment: impl Into<String>, hook: F)
    where
        F: Fn(&JoinContext<'_>) -> Result<Option<CustomJoin>> + Send + Sync + 'static,
    {
        self.joins.insert(segment.into(), Arc::new(hook));
    }

    /// Filter builder for a mode.
    pub fn mode_filter(&self, mode: &str) -> Option<&FilterHook> {
        self.modes.get(&mode_key(mode))
    }

    /// Custom filter for an alias.
    pub fn custom_filter(&self, alias: &str) -> Option<&FilterHook> {
        self.filters.get(alias)
    }

    /// Select hook for a key.
    pub fn select(&self, key: &str) -> Option<&SelectHook> {
        self.selects.get(key)
    }

    /// Sort override for a key.
    pub fn sort(&self, key: &str) -> Option<&SortHook> {
        self.sorts.get(key)
    }

    /// Custom join for a segment.
    pub fn join(&self, segment: &str) -> Option<&JoinHook> {
        self.joins.get(segment)
    }

    /// Check if no hook is registered.
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
            && self.filters.is_empty()
            && self.selects.is_empty()
            && self.sorts.is_empty()
            && self.joins.is_empty()
    }
}

/// Canonical spelling of a mode name: lowercase, without `_` and `-`.
///
/// `date_max`, `dateMax` and `date-max` all name the same mode.
pub fn mode_key(mode: &str) -> String {
    mode.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Debug for EntityHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
            let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys
        }

        f.debug_struct("EntityHooks")
            .field("modes", &keys(&self.modes))
            .field("filters", &keys(&self.filters))
            .field("selects", &keys(&self.selects))
            .field("sorts", &keys(&self.sorts))
            .field("joins", &keys(&self.joins))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_key() {
        assert_eq!(mode_key("date_max"), "datemax");
        assert_eq!(mode_key("dateMax"), "datemax");
        assert_eq!(mode_key("Date-Max"), "datemax");
    }

    #[test]
    fn test_mode_filter_lookup_is_normalized() {
        let mut hooks = EntityHooks::new();
        hooks.add_mode_filter("geo_hash", |scope, value| {
            Ok(Some(Predicate::eq(scope.column(), value.clone())))
        });

        assert!(hooks.mode_filter("geoHash").is_some());
        assert!(hooks.mode_filter("geo").is_none());
        assert!(!hooks.is_empty());
    }

    #[test]
    fn test_debug_lists_keys() {
        let mut hooks = EntityHooks::new();
        hooks.add_select("score", |ctx| Ok(ColumnSelect::expression("1", ctx.alias)));
        let debug = format!("{hooks:?}");
        assert!(debug.contains("score"));
    }
}
