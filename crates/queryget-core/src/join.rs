//! Left-join resolution for dotted relation paths.
//!
//! Each prefix of a path is joined at most once per plan. Join aliases are
//! derived from the path, so the same path always yields the same clauses.

use std::collections::HashMap;
use std::sync::Arc;

use queryget_proto::JoinClause;
use tracing::{debug, trace};

use crate::catalog::{EntityDef, JoinContext, RelationKind};
use crate::error::Result;
use crate::registry::EntityRegistry;

/// A joined relation path.
#[derive(Debug, Clone)]
pub struct JoinedPath {
    /// Alias the joined table is visible under.
    pub alias: String,
    /// Entity reached by the path.
    pub entity: Arc<EntityDef>,
}

/// Joins emitted for one plan, memoized by full path prefix.
#[derive(Debug, Default)]
pub struct JoinState {
    memo: HashMap<String, JoinedPath>,
    clauses: Vec<JoinClause>,
}

impl JoinState {
    /// Create an empty join state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Already joined path.
    pub fn get(&self, path: &str) -> Option<&JoinedPath> {
        self.memo.get(path)
    }

    /// Emitted clauses, in order.
    pub fn clauses(&self) -> &[JoinClause] {
        &self.clauses
    }

    /// Take the emitted clauses.
    pub fn into_clauses(self) -> Vec<JoinClause> {
        self.clauses
    }

    /// Number of emitted clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Check if nothing was joined.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Join access into the plan being built, rooted at the planned entity.
pub struct JoinScope<'a> {
    registry: &'a EntityRegistry,
    root: &'a Arc<EntityDef>,
    state: &'a mut JoinState,
}

impl<'a> JoinScope<'a> {
    /// Create a scope over a plan's join state.
    pub fn new(
        registry: &'a EntityRegistry,
        root: &'a Arc<EntityDef>,
        state: &'a mut JoinState,
    ) -> Self {
        Self {
            registry,
            root,
            state,
        }
    }

    /// Left-join a relation path and return its alias.
    pub fn left_join(&mut self, path: &str) -> Result<Option<String>> {
        Ok(self.left_join_entity(path)?.map(|joined| joined.alias))
    }

    /// Left-join a relation path and return its alias and entity.
    pub fn left_join_entity(&mut self, path: &str) -> Result<Option<JoinedPath>> {
        ensure_left_join(self.registry, self.root, self.state, path)
    }
}

/// Left-join every segment of `path`, starting at `root`.
///
/// Owning relations join `related AS <prior>_<segment>_join` on the related
/// owner key. A segment that is not a relation accessor may be resolved by
/// the entity's custom join hook. Any other segment fails the path and
/// yields `Ok(None)`; prefixes joined before the failing segment stay
/// joined. Errors are reserved for hook failures and unregistered entities.
pub fn ensure_left_join(
    registry: &EntityRegistry,
    root: &Arc<EntityDef>,
    state: &mut JoinState,
    path: &str,
) -> Result<Option<JoinedPath>> {
    if let Some(joined) = state.memo.get(path) {
        return Ok(Some(joined.clone()));
    }

    let mut prior = root.table.clone();
    let mut entity = Arc::clone(root);
    let mut end = 0;

    for segment in path.split('.') {
        end += if end == 0 { segment.len() } else { segment.len() + 1 };
        let prefix = &path[..end];

        if let Some(joined) = state.memo.get(prefix) {
            prior = joined.alias.clone();
            entity = Arc::clone(&joined.entity);
            continue;
        }

        let alias = format!("{prior}_{segment}_join");
        let Some((clause, next)) = join_segment(registry, &entity, segment, &prior, &alias)? else {
            trace!(entity = %root.name, path, segment, "join path not resolvable");
            return Ok(None);
        };

        debug!(path = prefix, join = %clause, "left join");
        let joined = JoinedPath {
            alias: clause.alias.clone(),
            entity: next,
        };
        state.clauses.push(clause);
        state.memo.insert(prefix.to_string(), joined.clone());
        prior = joined.alias;
        entity = joined.entity;
    }

    Ok(state.memo.get(path).cloned())
}

fn join_segment(
    registry: &EntityRegistry,
    entity: &Arc<EntityDef>,
    segment: &str,
    prior: &str,
    alias: &str,
) -> Result<Option<(JoinClause, Arc<EntityDef>)>> {
    if let Some(relation) = entity.relation(segment) {
        if relation.kind != RelationKind::Owning {
            return Ok(None);
        }
        let related = registry.get(&relation.related_entity)?;
        let clause = JoinClause::new(
            &related.table,
            alias,
            format!("{alias}.{}", relation.owner_column(&related)),
            format!("{prior}.{}", relation.foreign_key),
        );
        return Ok(Some((clause, related)));
    }

    let Some(hook) = entity.hooks.join(segment) else {
        return Ok(None);
    };
    let Some(custom) = hook(&JoinContext { prior, alias })? else {
        return Ok(None);
    };
    let next = match &custom.entity {
        Some(name) => registry.get(name)?,
        None => Arc::clone(entity),
    };
    Ok(Some((custom.clause, next)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::catalog::{CustomJoin, RelationDef};

    fn registry() -> EntityRegistry {
        let registry = EntityRegistry::new();
        registry
            .register(
                EntityDef::new("Order", "orders")
                    .with_relation(RelationDef::owning("buyer", "Customer", "customer_id", "id"))
                    .with_relation(RelationDef::owned("lines", "Line", "order_id", "id"))
                    .with_custom_join("latest_payment", |ctx| {
                        Ok(Some(
                            CustomJoin::new(JoinClause::new(
                                "payments",
                                "latest_payment",
                                "latest_payment.order_id",
                                format!("{}.id", ctx.prior),
                            ))
                            .with_entity("Payment"),
                        ))
                    }),
            )
            .unwrap();
        registry
            .register(
                EntityDef::new("Customer", "customers")
                    .with_relation(RelationDef::owning("region", "Region", "region_code", "code")),
            )
            .unwrap();
        registry.register(EntityDef::new("Region", "regions")).unwrap();
        registry.register(EntityDef::new("Line", "order_lines")).unwrap();
        registry.register(EntityDef::new("Payment", "payments")).unwrap();
        registry
    }

    #[test]
    fn test_nested_join() {
        let registry = registry();
        let root = registry.get("Order").unwrap();
        let mut state = JoinState::new();

        let joined = ensure_left_join(&registry, &root, &mut state, "buyer.region")
            .unwrap()
            .unwrap();
        assert_eq!(joined.alias, "orders_buyer_join_region_join");
        assert_eq!(joined.entity.name, "Region");
        assert_eq!(
            state.clauses(),
            &[
                JoinClause::new(
                    "customers",
                    "orders_buyer_join",
                    "orders_buyer_join.id",
                    "orders.customer_id",
                ),
                JoinClause::new(
                    "regions",
                    "orders_buyer_join_region_join",
                    "orders_buyer_join_region_join.code",
                    "orders_buyer_join.region_code",
                ),
            ]
        );
    }

    #[test]
    fn test_join_is_idempotent() {
        let registry = registry();
        let root = registry.get("Order").unwrap();
        let mut state = JoinState::new();

        let first = ensure_left_join(&registry, &root, &mut state, "buyer").unwrap().unwrap();
        let second = ensure_left_join(&registry, &root, &mut state, "buyer").unwrap().unwrap();
        ensure_left_join(&registry, &root, &mut state, "buyer.region").unwrap();
        ensure_left_join(&registry, &root, &mut state, "buyer.region").unwrap();

        assert_eq!(first.alias, second.alias);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_unresolvable_paths() {
        let registry = registry();
        let root = registry.get("Order").unwrap();
        let mut state = JoinState::new();

        assert!(ensure_left_join(&registry, &root, &mut state, "lines").unwrap().is_none());
        assert!(ensure_left_join(&registry, &root, &mut state, "nothing").unwrap().is_none());
        assert!(state.is_empty());

        // the resolvable prefix stays joined
        assert!(ensure_left_join(&registry, &root, &mut state, "buyer.nothing")
            .unwrap()
            .is_none());
        assert_eq!(state.len(), 1);
        assert!(state.get("buyer").is_some());
    }

    #[test]
    fn test_custom_join() {
        let registry = registry();
        let root = registry.get("Order").unwrap();
        let mut state = JoinState::new();

        let joined = ensure_left_join(&registry, &root, &mut state, "latest_payment")
            .unwrap()
            .unwrap();
        assert_eq!(joined.alias, "latest_payment");
        assert_eq!(joined.entity.name, "Payment");
        assert_eq!(state.clauses()[0].right, "orders.id");
    }
}
