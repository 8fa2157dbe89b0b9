use std::{sync::Arc, time::Duration};

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ormgraph::{
    BatchConfig, CommandPlanner, Dialect, EntityEntry, Model, ModelBuilder, Query, QueryCompiler,
    SqlGenerator, ValueGeneratorCache, ValueType,
    sql::DdlGenerator,
};

const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);
const DDL_WIDTHS: [usize; 3] = [10, 50, 200];

fn bench_scales() -> &'static [usize] {
    #[cfg(feature = "bench-ci")]
    {
        &[10, 100]
    }
    #[cfg(not(feature = "bench-ci"))]
    {
        &[100, 1_000, 5_000]
    }
}

/// A chain of `width` entities, each referencing the previous one.
fn chain_model(width: usize) -> Arc<Model> {
    let mut builder = ModelBuilder::default();
    let mut previous = None;
    for i in 0..width {
        let entity = builder.entity(&format!("Table{i}")).expect("entity");
        builder.property(entity, "Id", ValueType::Int32).expect("id");
        builder.property(entity, "Label", ValueType::Text).expect("label");
        if let Some(principal) = previous {
            builder
                .relationship(entity, principal, Some("Parent"), Some("Children"), false)
                .expect("relationship");
        }
        previous = Some(entity);
    }
    builder.build().expect("model")
}

fn shop_model() -> Arc<Model> {
    let mut builder = ModelBuilder::default();
    let customer = builder.entity("Customer").expect("customer");
    builder.property(customer, "Id", ValueType::Int32).expect("id");
    builder.property(customer, "Name", ValueType::Text).expect("name");
    let order = builder.entity("Order").expect("order");
    builder.property(order, "Id", ValueType::Int32).expect("id");
    builder.property(order, "Total", ValueType::Float64).expect("total");
    builder
        .relationship(order, customer, Some("Customer"), Some("Orders"), false)
        .expect("relationship");
    builder.build().expect("model")
}

fn bench_ddl(c: &mut Criterion) {
    let mut group = c.benchmark_group("ddl_script");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    let dialect = Dialect::sqlite();
    for width in DDL_WIDTHS {
        let model = chain_model(width);
        group.bench_function(BenchmarkId::from_parameter(width), |b| {
            b.iter(|| DdlGenerator::new(&dialect).create_script(&model).expect("ddl"));
        });
    }
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_with_include");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    let model = shop_model();
    for dialect in [Dialect::sqlite(), Dialect::sql_server()] {
        let query = Query::from("Customer")
            .order_by("Name")
            .take(50)
            .include("Orders")
            .expect("include");
        group.bench_function(BenchmarkId::from_parameter(dialect.name().to_string()), |b| {
            b.iter(|| {
                QueryCompiler::new(&model)
                    .compile(&query)
                    .expect("compile")
                    .generate(&SqlGenerator::new(&dialect))
                    .expect("generate")
            });
        });
    }
    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_save");
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    let model = shop_model();
    let customer = model.entity_by_name("Customer").expect("customer").id;
    let order = model.entity_by_name("Order").expect("order").id;
    let fk = model.foreign_keys(order)[0].id;
    for &rows in bench_scales() {
        group.bench_function(BenchmarkId::from_parameter(rows), |b| {
            b.iter(|| {
                let mut entries = Vec::with_capacity(rows * 2);
                for i in 0..rows {
                    let mut principal = EntityEntry::added(customer);
                    principal
                        .set(&model, "Name", format!("customer {i}"))
                        .expect("name");
                    entries.push(principal);
                    let mut dependent = EntityEntry::added(order).relate(fk, entries.len() - 1);
                    dependent.set(&model, "Total", i as f64).expect("total");
                    entries.push(dependent);
                }
                let cache = ValueGeneratorCache::new();
                CommandPlanner::new(&model, &cache, BatchConfig::default())
                    .plan(&mut entries)
                    .expect("plan")
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = generation_benches;
    config = Criterion::default();
    targets = bench_ddl, bench_select, bench_plan
);
criterion_main!(generation_benches);
