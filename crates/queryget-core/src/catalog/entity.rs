//! Entity descriptors.

use std::collections::BTreeMap;

use queryget_proto::{ColumnSelect, OrderDirection, OrderSpec, Predicate, Value};

use super::declaration::{Declaration, DeclarationKind};
use super::hooks::{CustomJoin, EntityHooks, JoinContext, SelectContext};
use super::relation::RelationDef;
use crate::error::Result;
use crate::filter::FilterScope;
use crate::sort::SortScope;

/// An entity as seen by the planner: storage table, key column, relation
/// accessors and capability declarations.
#[derive(Debug, Clone)]
pub struct EntityDef {
    /// Entity name (unique within a registry).
    pub name: String,
    /// Storage table.
    pub table: String,
    /// Primary key column.
    pub key: String,
    /// Relation accessors keyed by name.
    pub relations: BTreeMap<String, RelationDef>,
    /// Shared declarations for every table.
    pub queryable: Option<Vec<Declaration>>,
    /// Filter declarations.
    pub filterable: Option<Vec<Declaration>>,
    /// Sort declarations.
    pub sortable: Option<Vec<Declaration>>,
    /// Selection declarations.
    pub selectable: Option<Vec<Declaration>>,
    /// Registered hooks.
    pub hooks: EntityHooks,
}

impl EntityDef {
    /// Create a new entity over a table, keyed by `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            key: "id".to_string(),
            relations: BTreeMap::new(),
            queryable: None,
            filterable: None,
            sortable: None,
            selectable: None,
            hooks: EntityHooks::new(),
        }
    }

    /// Set the primary key column.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Add a relation accessor.
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Set the queryable declarations.
    pub fn with_queryable(mut self, decls: impl IntoIterator<Item = Declaration>) -> Self {
        self.queryable = Some(decls.into_iter().collect());
        self
    }

    /// Set the filterable declarations.
    pub fn with_filterable(mut self, decls: impl IntoIterator<Item = Declaration>) -> Self {
        self.filterable = Some(decls.into_iter().collect());
        self
    }

    /// Set the sortable declarations.
    pub fn with_sortable(mut self, decls: impl IntoIterator<Item = Declaration>) -> Self {
        self.sortable = Some(decls.into_iter().collect());
        self
    }

    /// Set the selectable declarations.
    pub fn with_selectable(mut self, decls: impl IntoIterator<Item = Declaration>) -> Self {
        self.selectable = Some(decls.into_iter().collect());
        self
    }

    /// Register a filter builder for a custom mode.
    pub fn with_mode_filter<F>(mut self, mode: &str, hook: F) -> Self
    where
        F: Fn(&mut FilterScope<'_, '_>, &Value) -> Result<Option<Predicate>> + Send + Sync + 'static,
    {
        self.hooks.add_mode_filter(mode, hook);
        self
    }

    /// Register a filter for one alias.
    pub fn with_custom_filter<F>(mut self, alias: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut FilterScope<'_, '_>, &Value) -> Result<Option<Predicate>> + Send + Sync + 'static,
    {
        self.hooks.add_custom_filter(alias, hook);
        self
    }

    /// Register a select hook for a storage key.
    pub fn with_select_hook<F>(mut self, key: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&SelectContext<'_>) -> Result<ColumnSelect> + Send + Sync + 'static,
    {
        self.hooks.add_select(key, hook);
        self
    }

    /// Register a sort override for a storage key.
    pub fn with_sort_override<F>(mut self, key: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut SortScope<'_>, OrderDirection) -> Result<Vec<OrderSpec>> + Send + Sync + 'static,
    {
        self.hooks.add_sort(key, hook);
        self
    }

    /// Register a custom join for a path segment that is not a relation.
    pub fn with_custom_join<F>(mut self, segment: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&JoinContext<'_>) -> Result<Option<CustomJoin>> + Send + Sync + 'static,
    {
        self.hooks.add_join(segment, hook);
        self
    }

    /// Get a relation accessor by name.
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    /// Declarations of one kind, if the entity declares that kind at all.
    pub fn declarations(&self, kind: DeclarationKind) -> Option<&[Declaration]> {
        match kind {
            DeclarationKind::Queryable => self.queryable.as_deref(),
            DeclarationKind::Filterable => self.filterable.as_deref(),
            DeclarationKind::Sortable => self.sortable.as_deref(),
            DeclarationKind::Selectable => self.selectable.as_deref(),
        }
    }

    /// Qualify a column with this entity's table.
    ///
    /// Keys that already contain a `.` are returned unchanged.
    pub fn column(&self, key: &str) -> String {
        if key.contains('.') {
            key.to_string()
        } else {
            format!("{}.{}", self.table, key)
        }
    }
}
