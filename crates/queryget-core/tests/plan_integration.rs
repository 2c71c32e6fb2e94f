//! End-to-end planning tests over a small shop schema.

use pretty_assertions::assert_eq;
use queryget_core::catalog::{Declaration, DeclarationKind, EntityDef, RelationDef, Schema};
use queryget_core::proto::{
    ColumnSelect, JoinClause, OrderSpec, Predicate, RelationLink, Value, Window,
};
use queryget_core::{sql, EntityRegistry, Error, Params, PlanConfig, QueryPlanner};

const SCHEMA: &str = r#"{
  "entities": [
    {
      "name": "Order",
      "table": "orders",
      "relations": [
        {"name": "buyer", "related_entity": "Customer", "kind": "owning", "foreign_key": "customer_id"},
        {"name": "lines", "related_entity": "Line", "kind": "owned", "foreign_key": "order_id"}
      ],
      "queryable": ["id", {"status": "plain:status", "placed": "date:placed_at|filter|sort"}],
      "filterable": {"customer": "relation:buyer", "note": "string:note", "total": "number:total_cents"},
      "sortable": ["total_cents"],
      "selectable": ["id", "status", "note", "buyer", "lines"]
    },
    {
      "name": "Customer",
      "table": "customers",
      "relations": [
        {"name": "region", "related_entity": "Region", "kind": "owning", "foreign_key": "region_code", "owner_key": "code"}
      ],
      "queryable": {"name": "string:name", "bio": "string:bio", "email": "string:email"},
      "selectable": ["name", "bio", "email", "region"]
    },
    {
      "name": "Region",
      "table": "regions",
      "queryable": ["code", "label"]
    },
    {
      "name": "Line",
      "table": "order_lines",
      "queryable": ["sku", "qty"]
    }
  ]
}"#;

fn registry() -> EntityRegistry {
    EntityRegistry::from_schema(Schema::from_json(SCHEMA).unwrap()).unwrap()
}

fn buyer() -> RelationLink {
    RelationLink::new("buyer", "customers", "orders.customer_id", "customers.id")
}

fn plan(registry: &EntityRegistry, query: &str) -> queryget_core::proto::QueryPlan {
    let mut planner = QueryPlanner::new(registry, "Order").unwrap();
    planner.apply(&Params::from_query_str(query)).unwrap();
    planner.build().unwrap()
}

#[test]
fn normalized_tables_are_deterministic() {
    let first = registry();
    let second = registry();
    for kind in [
        DeclarationKind::Filterable,
        DeclarationKind::Sortable,
        DeclarationKind::Selectable,
    ] {
        let a = first.table("Order", kind).unwrap();
        let b = second.table("Order", kind).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, first.table("Order", kind).unwrap());
    }
    assert!(first.stats().table_hits() >= 3);

    let filters = first.table("Order", DeclarationKind::Filterable).unwrap();
    let aliases: Vec<&str> = filters.aliases().collect();
    assert_eq!(aliases, vec!["customer", "id", "note", "placed", "status", "total"]);

    // `placed` is restricted to filter and sort
    let selects = first.table("Order", DeclarationKind::Selectable).unwrap();
    assert!(selects.get("placed").is_none());
}

#[test]
fn relation_filter_scenario() {
    let registry = registry();
    let plan = plan(&registry, "customer$name=Acme");
    assert_eq!(
        plan.filters,
        vec![Predicate::exists(
            buyer(),
            Some(Predicate::ilike("customers.name", "acme"))
        )]
    );
}

#[test]
fn text_operators_are_case_insensitive() {
    let registry = registry();
    let upper = plan(&registry, "note=NOT:Foo");
    let lower = plan(&registry, "note=not:foo");
    assert_eq!(upper.filters, lower.filters);
    assert_eq!(upper.filters, vec![Predicate::not_ilike("orders.note", "foo")]);
}

#[test]
fn single_branch_disjunction_equals_plain_filter() {
    let registry = registry();
    let disjunction = plan(&registry, "nothing_or_total=gt:100");
    let direct = plan(&registry, "total=gt:100");
    assert_eq!(disjunction.filters, direct.filters);
    assert_eq!(disjunction.filters.len(), 1);

    let none = plan(&registry, "nothing_or_missing=1");
    assert!(none.filters.is_empty());
}

#[test]
fn null_values_skip_filters() {
    let registry = registry();
    let mut planner = QueryPlanner::new(&registry, "Order").unwrap();
    planner
        .filter(&Params::new().with("status", Value::Null).with("note", ":null"))
        .unwrap();
    assert_eq!(
        planner.build().unwrap().filters,
        vec![Predicate::is_null("orders.note")]
    );
}

#[test]
fn star_with_nested_relation_path() {
    let registry = registry();
    let mut planner = QueryPlanner::new(&registry, "Order").unwrap();
    planner.select(&["*", "buyer.bio"]).unwrap();
    let projection = planner.build().unwrap().projection.unwrap();

    assert_eq!(
        projection.columns,
        vec![
            ColumnSelect::aliased("orders.id", "id"),
            ColumnSelect::aliased("orders.note", "note"),
            ColumnSelect::aliased("orders.status", "status"),
            ColumnSelect::raw("orders.customer_id"),
        ]
    );
    let buyer = projection.relation("buyer").unwrap();
    assert_eq!(buyer.link, self::buyer());
    assert_eq!(
        buyer.projection.columns,
        vec![
            ColumnSelect::aliased("customers.bio", "bio"),
            ColumnSelect::raw("customers.id"),
        ]
    );
    assert!(projection.relation("lines").is_none());
}

#[test]
fn unselecting_a_whole_relation_detaches_it() {
    let registry = registry();
    let mut planner = QueryPlanner::new(&registry, "Order").unwrap();
    planner.select(&["id", "buyer.name", "buyer.email", "lines"]).unwrap();
    planner.unselect(&["buyer.name", "buyer.email"]).unwrap();
    let projection = planner.build().unwrap().projection.unwrap();

    assert!(projection.relation("buyer").is_none());
    assert!(projection.relation("lines").is_some());
    assert!(!projection
        .columns
        .contains(&ColumnSelect::raw("orders.customer_id")));
}

#[test]
fn depth_zero_expands_no_relation() {
    let registry = registry();
    let mut planner = QueryPlanner::new(&registry, "Order")
        .unwrap()
        .with_config(PlanConfig::default().with_select_depth(0));
    planner.select(&["id", "buyer", "lines.sku"]).unwrap();
    let projection = planner.build().unwrap().projection.unwrap();

    assert!(projection.relations.is_empty());
    assert_eq!(projection.columns, vec![ColumnSelect::aliased("orders.id", "id")]);
}

#[test]
fn depth_budget_limits_nesting() {
    let registry = registry();
    let mut planner = QueryPlanner::new(&registry, "Order")
        .unwrap()
        .with_config(PlanConfig::default().with_select_depth(1));
    planner.select(&["buyer.region.label"]).unwrap();
    let projection = planner.build().unwrap().projection.unwrap();
    assert_eq!(projection.depth(), 1);
}

#[test]
fn pages_below_one_clamp() {
    let registry = registry();
    assert_eq!(plan(&registry, "page=0").window, Some(Window::new(0, 10)));
    assert_eq!(plan(&registry, "page=-2&pagesize=25").window, Some(Window::new(0, 25)));
    assert_eq!(plan(&registry, "page=4&pagesize=25").window, Some(Window::new(75, 25)));
}

#[test]
fn dotted_sort_joins_deterministically() {
    let registry = registry();
    let first = plan(&registry, "sortby=buyer.name_desc");
    let second = plan(&registry, "sortby=buyer.name_desc");

    let join = JoinClause::new(
        "customers",
        "orders_buyer_join",
        "orders_buyer_join.id",
        "orders.customer_id",
    );
    assert_eq!(first.joins, vec![join]);
    assert_eq!(first.order_by, vec![OrderSpec::desc("orders_buyer_join.name")]);
    assert_eq!(first.joins, second.joins);
}

#[test]
fn repeated_join_paths_are_joined_once() {
    let registry = registry();
    let mut planner = QueryPlanner::new(&registry, "Order").unwrap();
    let alias = planner.left_join("buyer.region").unwrap().unwrap();
    assert_eq!(alias, "orders_buyer_join_region_join");
    assert_eq!(planner.left_join("buyer.region").unwrap().unwrap(), alias);
    planner.sort(&["buyer.name", "buyer.region.label_desc"]).unwrap();

    let plan = planner.build().unwrap();
    assert_eq!(plan.joins.len(), 2);
    assert_eq!(
        plan.order_by,
        vec![
            OrderSpec::asc("orders_buyer_join.name"),
            OrderSpec::desc("orders_buyer_join_region_join.label"),
        ]
    );
}

#[test]
fn unknown_sort_tokens_are_dropped() {
    let registry = registry();
    let plan = plan(&registry, "sortby=total_cents_desc,lines.qty,missing,placed");
    assert_eq!(
        plan.order_by,
        vec![
            OrderSpec::desc("orders.total_cents"),
            OrderSpec::asc("orders.placed_at"),
        ]
    );
    assert!(plan.joins.is_empty());
}

#[test]
fn fatal_errors_fail_the_call() {
    let registry = registry();
    registry
        .register(
            EntityDef::new("Tag", "tags")
                .with_relation(RelationDef::many_to_many("orders", "Order"))
                .with_filterable([
                    Declaration::entry("order", "relation:orders"),
                    Declaration::entry("broken", "relation:label"),
                ])
                .with_selectable([Declaration::bare("orders")]),
        )
        .unwrap();

    let mut planner = QueryPlanner::new(&registry, "Tag").unwrap();
    assert!(matches!(
        planner.filter(&Params::new().with("order$status", "open")),
        Err(Error::UnsupportedRelation { .. })
    ));
    assert!(matches!(
        planner.filter(&Params::new().with("broken", "x")),
        Err(Error::UnknownRelation { .. })
    ));
    assert!(matches!(
        planner.select(&["orders"]),
        Err(Error::UnsupportedRelation { .. })
    ));
    assert!(matches!(planner.sort(&["name"]), Err(Error::NotSortable(_))));
}

#[test]
fn compiled_filters_are_cached() {
    let registry = registry();
    plan(&registry, "customer$name=a");
    let misses = registry.stats().filter_misses();
    plan(&registry, "customer$name=b");
    assert_eq!(registry.stats().filter_misses(), misses);
    assert!(registry.stats().filter_hits() > 0);
}

#[test]
fn plan_renders_to_sql() {
    let registry = registry();
    let plan = plan(&registry, "status=open&props=id,buyer.name&sortby=buyer.name&page=2");
    let statements = sql::render(&plan).unwrap();

    assert_eq!(statements.len(), 2);
    assert_eq!(
        statements[0].sql,
        "SELECT orders.id AS id, orders.customer_id FROM orders \
         LEFT JOIN customers AS orders_buyer_join ON orders_buyer_join.id = orders.customer_id \
         WHERE orders.status = $1 ORDER BY orders_buyer_join.name ASC LIMIT $2 OFFSET $3"
    );
    assert_eq!(
        statements[0].params,
        vec![Value::from("open"), Value::Int(10), Value::Int(10)]
    );
    assert_eq!(statements[1].path, "buyer");
}
