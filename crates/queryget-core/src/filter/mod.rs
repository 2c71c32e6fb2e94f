//! Filter compilation.
//!
//! A request key such as `customer$name` is compiled once per entity into a
//! [`CompiledFilter`]. Applying a compiled filter to a request value yields
//! a predicate, or nothing when the value filters nothing.

mod compiler;
mod modes;

use std::fmt;
use std::sync::Arc;

use queryget_proto::{Predicate, RelationLink, Value};
use tracing::trace;

use crate::catalog::FilterHook;
use crate::config::PlanConfig;
use crate::error::Result;
use crate::join::{JoinScope, JoinedPath};

pub(crate) use compiler::canonical_key;
pub use compiler::compile_filter;
pub use modes::FilterMode;

/// Handle given to filter hooks.
///
/// Hooks on the planned entity may join relation paths into the plan being
/// filtered. Inside a relation filter the predicate lands in a correlated
/// subquery, so joins there resolve to `None`.
pub struct FilterScope<'a, 'j> {
    entity: &'a str,
    table: &'a str,
    alias: &'a str,
    column: &'a str,
    joins: Option<&'a mut JoinScope<'j>>,
}

impl<'a, 'j> FilterScope<'a, 'j> {
    /// Entity the filter belongs to.
    pub fn entity(&self) -> &str {
        self.entity
    }

    /// Storage table of the entity.
    pub fn table(&self) -> &str {
        self.table
    }

    /// Public alias from the request key.
    pub fn alias(&self) -> &str {
        self.alias
    }

    /// Qualified storage column (`table.key`).
    pub fn column(&self) -> &str {
        self.column
    }

    /// Left-join a relation path and return its alias.
    pub fn left_join(&mut self, path: &str) -> Result<Option<String>> {
        Ok(self.left_join_entity(path)?.map(|joined| joined.alias))
    }

    /// Left-join a relation path and return its alias and entity.
    pub fn left_join_entity(&mut self, path: &str) -> Result<Option<JoinedPath>> {
        match self.joins.as_deref_mut() {
            Some(joins) => joins.left_join_entity(path),
            None => {
                trace!(entity = self.entity, path, "no join scope inside relation filter");
                Ok(None)
            }
        }
    }
}

/// A filter key compiled against one entity.
#[derive(Clone)]
pub struct CompiledFilter {
    /// Entity the key was compiled against.
    pub entity: String,
    /// Canonical request key, relation segments included.
    pub key: String,
    step: FilterStep,
}

#[derive(Clone)]
enum FilterStep {
    /// Built-in column mode.
    Column {
        mode: FilterMode,
        target: FilterTarget,
    },
    /// Mode or alias hook.
    Hook {
        name: String,
        hook: FilterHook,
        target: FilterTarget,
    },
    /// Relation traversal; no child means an existence test.
    Relation {
        link: RelationLink,
        child: Option<Arc<CompiledFilter>>,
    },
}

#[derive(Debug, Clone)]
struct FilterTarget {
    table: String,
    alias: String,
    column: String,
}

impl CompiledFilter {
    /// Compile the value into a predicate. `None` applies nothing.
    ///
    /// `joins` is handed to hooks of the planned entity; relation steps
    /// apply their child without it.
    pub fn apply(
        &self,
        value: &Value,
        config: &PlanConfig,
        joins: Option<&mut JoinScope<'_>>,
    ) -> Result<Option<Predicate>> {
        match &self.step {
            FilterStep::Column { mode, target } => {
                let column = target.column.as_str();
                Ok(match mode {
                    FilterMode::Plain | FilterMode::Default | FilterMode::Custom(_) => {
                        modes::plain(column, value)
                    }
                    FilterMode::In => modes::membership(column, value),
                    FilterMode::Text => modes::text(column, value),
                    FilterMode::Number => modes::number(column, value),
                    FilterMode::Flag => {
                        return modes::flag(column, value, &self.key, config.strict_flags)
                    }
                    FilterMode::Date(op) => return modes::date(column, *op, value, &self.key),
                    FilterMode::Point => modes::point(column, value),
                    // Relation keys always compile to a relation step.
                    FilterMode::Relation => None,
                })
            }
            FilterStep::Hook { hook, target, .. } => {
                let mut scope = FilterScope {
                    entity: &self.entity,
                    table: &target.table,
                    alias: &target.alias,
                    column: &target.column,
                    joins,
                };
                hook(&mut scope, value)
            }
            FilterStep::Relation { link, child: None } => {
                if requires_existence(value) {
                    Ok(Some(Predicate::exists(link.clone(), None)))
                } else {
                    Ok(Some(Predicate::not_exists(link.clone())))
                }
            }
            FilterStep::Relation {
                link,
                child: Some(child),
            } => {
                let inner = child.apply(value, config, None)?;
                Ok(Some(Predicate::exists(link.clone(), inner)))
            }
        }
    }

    /// Check if the filter traverses a relation.
    pub fn is_relation(&self) -> bool {
        matches!(self.step, FilterStep::Relation { .. })
    }

    /// Mode of the leaf column filter, following relation steps.
    pub fn mode(&self) -> Option<&FilterMode> {
        match &self.step {
            FilterStep::Column { mode, .. } => Some(mode),
            FilterStep::Hook { .. } => None,
            FilterStep::Relation { child, .. } => child.as_ref().and_then(|c| c.mode()),
        }
    }
}

/// Only `true` and `"true"` ask for related rows to exist.
fn requires_existence(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CompiledFilter");
        s.field("entity", &self.entity).field("key", &self.key);
        match &self.step {
            FilterStep::Column { mode, target } => {
                s.field("mode", mode).field("column", &target.column)
            }
            FilterStep::Hook { name, target, .. } => {
                s.field("hook", name).field("column", &target.column)
            }
            FilterStep::Relation { link, child } => {
                s.field("relation", &link.name).field("child", child)
            }
        };
        s.finish()
    }
}
