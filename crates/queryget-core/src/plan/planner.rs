use std::sync::Arc;

use queryget_proto::{OrderSpec, Predicate, QueryPlan, Value, Window};
use tracing::{debug, instrument, trace};

use super::pagination::PageRequest;
use super::params::{string_list, Params};
use crate::catalog::{DeclarationKind, EntityDef};
use crate::config::PlanConfig;
use crate::error::Result;
use crate::join::{ensure_left_join, JoinScope, JoinState};
use crate::registry::EntityRegistry;
use crate::select::{expand_selection, project_selection, PatternTree, SelectionScope, SelectionTree};
use crate::sort::resolve_sort;

/// Compiles requests into a [`QueryPlan`] for one entity.
///
/// A planner owns the state of a single query: accumulated filters,
/// selection, orderings, joins and window. Calls mutate that state in
/// place and [`build`](QueryPlanner::build) consumes it.
///
/// ```
/// use queryget_core::catalog::{Declaration, EntityDef, RelationDef};
/// use queryget_core::{EntityRegistry, Params, QueryPlanner};
///
/// let registry = EntityRegistry::new();
/// registry.register(
///     EntityDef::new("Order", "orders")
///         .with_relation(RelationDef::owning("buyer", "Customer", "customer_id", "id"))
///         .with_queryable([Declaration::bare("status"), Declaration::bare("created_at")])
///         .with_filterable([Declaration::entry("customer", "relation:buyer")]),
/// )?;
/// registry.register(
///     EntityDef::new("Customer", "customers")
///         .with_queryable([Declaration::entry("name", "string:name")]),
/// )?;
///
/// let params = Params::from_query_str("customer$name=Acme&sortby=buyer.name_desc&page=2");
/// let mut planner = QueryPlanner::new(&registry, "Order")?;
/// planner.apply(&params)?;
/// let plan = planner.build()?;
///
/// assert_eq!(plan.filters.len(), 1);
/// assert_eq!(plan.joins[0].alias, "orders_buyer_join");
/// assert_eq!(plan.window.map(|w| w.skip), Some(10));
/// # Ok::<(), queryget_core::Error>(())
/// ```
pub struct QueryPlanner<'r> {
    registry: &'r EntityRegistry,
    entity: Arc<EntityDef>,
    config: PlanConfig,
    filters: Vec<Predicate>,
    selection: Option<SelectionTree>,
    joins: JoinState,
    order_by: Vec<OrderSpec>,
    window: Option<Window>,
    default_filter: Params,
    default_select: Vec<String>,
    default_sort: Vec<String>,
}

impl<'r> QueryPlanner<'r> {
    /// Create a planner for a registered entity.
    pub fn new(registry: &'r EntityRegistry, entity: &str) -> Result<Self> {
        Ok(Self {
            registry,
            entity: registry.get(entity)?,
            config: PlanConfig::default(),
            filters: Vec::new(),
            selection: None,
            joins: JoinState::new(),
            order_by: Vec::new(),
            window: None,
            default_filter: Params::new(),
            default_select: Vec::new(),
            default_sort: Vec::new(),
        })
    }

    /// Use a specific configuration.
    pub fn with_config(mut self, config: PlanConfig) -> Self {
        self.config = config;
        self
    }

    /// Entity being planned.
    pub fn entity(&self) -> &EntityDef {
        &self.entity
    }

    /// Active configuration.
    pub fn config(&self) -> &PlanConfig {
        &self.config
    }

    /// Filters used when a filter call carries no filter key.
    pub fn default_filter(&mut self, params: Params) -> &mut Self {
        self.default_filter = params;
        self
    }

    /// Selection used when a select call names no path.
    pub fn default_select<S: AsRef<str>>(&mut self, paths: &[S]) -> &mut Self {
        self.default_select = paths.iter().map(|p| p.as_ref().to_string()).collect();
        self
    }

    /// Sort used when a sort call names no token.
    pub fn default_sort<S: AsRef<str>>(&mut self, tokens: &[S]) -> &mut Self {
        self.default_sort = tokens.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    /// Add filters for every parameter that names a filterable alias.
    ///
    /// Null values are skipped. Reserved keys (selection, sort, pagination)
    /// are skipped unless the entity declares a filter under that alias.
    /// A key `a_or_b` compiles each branch on its own and keeps the branches
    /// that apply, OR-ed together. Without any filter key the default
    /// filters apply.
    pub fn filter(&mut self, params: &Params) -> Result<&mut Self> {
        let mut requested = false;
        for (key, value) in params.iter() {
            if self.config.keys.is_reserved(key) && !self.declares_filter(key)? {
                continue;
            }
            requested = true;
            self.filter_key(key, value)?;
        }

        if !requested && !self.default_filter.is_empty() {
            let defaults = self.default_filter.clone();
            for (key, value) in defaults.iter() {
                self.filter_key(key, value)?;
            }
        }
        Ok(self)
    }

    fn declares_filter(&self, alias: &str) -> Result<bool> {
        let entity = &self.entity;
        if entity.declarations(DeclarationKind::Filterable).is_none()
            && entity.declarations(DeclarationKind::Queryable).is_none()
        {
            return Ok(false);
        }
        let table = self.registry.table(&entity.name, DeclarationKind::Filterable)?;
        Ok(table.get(alias).is_some())
    }

    /// Add the filter for a single key.
    pub fn filter_key(&mut self, key: &str, value: &Value) -> Result<&mut Self> {
        if value.is_null() {
            return Ok(self);
        }

        let mut branches = Vec::new();
        for branch in key.split("_or_") {
            let Some(filter) = self.registry.filter(&self.entity.name, branch)? else {
                continue;
            };
            let mut joins = JoinScope::new(self.registry, &self.entity, &mut self.joins);
            branches.extend(filter.apply(value, &self.config, Some(&mut joins))?);
        }

        match Predicate::any(branches) {
            Some(predicate) => {
                debug!(entity = %self.entity.name, key, "filter added");
                self.filters.push(predicate);
            }
            None => trace!(entity = %self.entity.name, key, "filter skipped"),
        }
        Ok(self)
    }

    /// Select alias paths.
    ///
    /// With no path, the default selection applies, else `*`. Repeated
    /// selects accumulate.
    pub fn select<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<&mut Self> {
        self.select_scoped(paths, &SelectionScope::All)
    }

    /// Select alias paths restricted by a scope.
    pub fn select_scoped<S: AsRef<str>>(
        &mut self,
        paths: &[S],
        scope: &SelectionScope,
    ) -> Result<&mut Self> {
        let mut requested: Vec<String> = paths
            .iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if requested.is_empty() {
            requested = if self.default_select.is_empty() {
                vec!["*".to_string()]
            } else {
                self.default_select.clone()
            };
        }
        requested.dedup();

        let tree = expand_selection(
            self.registry,
            &self.entity.name,
            &requested,
            scope,
            self.config.select_depth,
        )?;
        self.selection.get_or_insert_with(SelectionTree::new).merge(tree);
        Ok(self)
    }

    /// Select the default paths, keeping only aliases matching `patterns`.
    pub fn select_only<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<&mut Self> {
        let scope = SelectionScope::only(patterns)?;
        self.select_scoped::<&str>(&[], &scope)
    }

    /// Select the default paths, leaving out aliases matching `patterns`.
    pub fn select_except<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<&mut Self> {
        let scope = SelectionScope::except(patterns)?;
        self.select_scoped::<&str>(&[], &scope)
    }

    /// Remove selected aliases matching glob paths.
    ///
    /// Relations left without any selected alias are no longer loaded.
    pub fn unselect<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<&mut Self> {
        let patterns = PatternTree::parse(patterns)?;
        if let Some(selection) = self.selection.as_mut() {
            selection.remove(&patterns);
        }
        Ok(self)
    }

    /// Order by sort tokens. With no token the default sort applies.
    pub fn sort<S: AsRef<str>>(&mut self, tokens: &[S]) -> Result<&mut Self> {
        self.sort_scoped(tokens, &SelectionScope::All)
    }

    /// Order by sort tokens restricted by a scope.
    pub fn sort_scoped<S: AsRef<str>>(
        &mut self,
        tokens: &[S],
        scope: &SelectionScope,
    ) -> Result<&mut Self> {
        let mut requested: Vec<String> = tokens
            .iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if requested.is_empty() {
            requested = self.default_sort.clone();
        }
        if requested.is_empty() {
            return Ok(self);
        }

        let orders = resolve_sort(
            self.registry,
            &self.entity,
            &requested,
            scope,
            &mut self.joins,
        )?;
        self.order_by.extend(orders);
        Ok(self)
    }

    /// Window by one-based page. Pages below 1 clamp to 1; the size is
    /// clamped by the configuration.
    pub fn paginate(&mut self, page: i64, size: Option<u64>) -> Result<&mut Self> {
        self.window = Some(PageRequest::Page { page, size }.window(&self.config)?);
        Ok(self)
    }

    /// Window by row offset.
    pub fn skip_take(&mut self, skip: u64, size: Option<u64>) -> Result<&mut Self> {
        self.window = Some(PageRequest::Offset { skip, size }.window(&self.config)?);
        Ok(self)
    }

    /// Window from pagination parameters.
    pub fn paginate_from(&mut self, params: &Params) -> Result<&mut Self> {
        let request = PageRequest::from_params(params, &self.config);
        self.window = Some(request.window(&self.config)?);
        Ok(self)
    }

    /// Left-join a relation path and return its alias.
    pub fn left_join(&mut self, path: &str) -> Result<Option<String>> {
        Ok(ensure_left_join(self.registry, &self.entity, &mut self.joins, path)?
            .map(|joined| joined.alias))
    }

    /// Left-join a relation path and return the entity it reaches.
    pub fn left_join_entity(&mut self, path: &str) -> Result<Option<Arc<EntityDef>>> {
        Ok(ensure_left_join(self.registry, &self.entity, &mut self.joins, path)?
            .map(|joined| joined.entity))
    }

    /// Run the whole pipeline from request parameters: filter, select,
    /// sort, paginate.
    #[instrument(skip(self, params), fields(entity = %self.entity.name))]
    pub fn apply(&mut self, params: &Params) -> Result<&mut Self> {
        let keys = self.config.keys.clone();

        self.filter(params)?;

        let props = params.first_of(&keys.select).map(string_list).unwrap_or_default();
        self.select(&props)?;

        let sorts = params.first_of(&keys.sort).map(string_list).unwrap_or_default();
        self.sort(&sorts)?;

        self.paginate_from(params)?;
        Ok(self)
    }

    /// Finish the plan.
    pub fn build(self) -> Result<QueryPlan> {
        let projection = match &self.selection {
            Some(tree) => Some(project_selection(self.registry, &self.entity.name, tree)?),
            None => None,
        };

        let mut plan = QueryPlan::new(&self.entity.name, &self.entity.table);
        plan.joins = self.joins.into_clauses();
        plan.filters = self.filters;
        plan.projection = projection;
        plan.order_by = self.order_by;
        plan.window = self.window;
        debug!(
            entity = %plan.entity,
            joins = plan.joins.len(),
            filters = plan.filters.len(),
            orders = plan.order_by.len(),
            "plan built"
        );
        Ok(plan)
    }
}
