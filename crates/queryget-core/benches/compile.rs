//! Filter compilation and full planning benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use queryget_core::catalog::{Declaration, EntityDef, RelationDef};
use queryget_core::{EntityRegistry, Params, QueryPlanner};

fn registry() -> EntityRegistry {
    let registry = EntityRegistry::new();
    registry
        .register(
            EntityDef::new("Order", "orders")
                .with_relation(RelationDef::owning("buyer", "Customer", "customer_id", "id"))
                .with_queryable([
                    Declaration::bare("id"),
                    Declaration::entry("status", "plain:status"),
                    Declaration::entry("placed", "date:placed_at"),
                    Declaration::entry("note", "string:note"),
                    Declaration::entry("total", "number:total_cents"),
                ])
                .with_filterable([Declaration::entry("customer", "relation:buyer")])
                .with_selectable([Declaration::bare("buyer")]),
        )
        .unwrap();
    registry
        .register(EntityDef::new("Customer", "customers").with_queryable([
            Declaration::entry("name", "string:name"),
            Declaration::entry("email", "string:email"),
        ]))
        .unwrap();
    registry
}

fn bench_filter_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/filter");
    let registry = registry();

    for key in ["status", "note", "customer$name", "nothing_or_total"] {
        group.bench_with_input(BenchmarkId::new("cold", key), &key, |b, key| {
            b.iter(|| {
                registry.clear_cache();
                black_box(registry.filter("Order", key).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("cached", key), &key, |b, key| {
            registry.filter("Order", key).unwrap();
            b.iter(|| {
                black_box(registry.filter("Order", key).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile/plan");
    let registry = registry();

    let queries = [
        ("filter_only", "status=open,held&total=gt:100"),
        ("relation", "customer$name=like:acme%&note=notnull:"),
        (
            "full",
            "status=open&props=id,note,buyer.name&sortby=buyer.name_desc,total&page=3&pagesize=25",
        ),
    ];

    for (name, query) in queries {
        let params = Params::from_query_str(query);
        group.bench_with_input(BenchmarkId::from_parameter(name), &params, |b, params| {
            b.iter(|| {
                let mut planner = QueryPlanner::new(&registry, "Order").unwrap();
                planner.apply(params).unwrap();
                black_box(planner.build().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter_compile, bench_plan);
criterion_main!(benches);
