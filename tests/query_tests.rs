use std::sync::Arc;

use ormgraph::metadata::{Model, ValueType};
use ormgraph::query::{IncludePipeline, IncludeNode, Query, QueryCompiler};
use ormgraph::sql::{BinaryOperator, Dialect, SqlGenerator, SqlValue};
use ormgraph::{ModelBuilder, OrmGraphError};

fn shop() -> Arc<Model> {
    let mut builder = ModelBuilder::default();
    let customer = builder.entity("Customer").expect("customer");
    builder.property(customer, "Id", ValueType::Int32).expect("id");
    builder.property(customer, "Name", ValueType::Text).expect("name");
    let order = builder.entity("Order").expect("order");
    builder.property(order, "Id", ValueType::Int32).expect("id");
    builder.property(order, "Total", ValueType::Float64).expect("total");
    let line = builder.entity("OrderLine").expect("line");
    builder.property(line, "Id", ValueType::Int32).expect("id");
    builder.property(line, "Quantity", ValueType::Int32).expect("quantity");
    builder
        .relationship(order, customer, Some("Customer"), Some("Orders"), false)
        .expect("orders");
    builder
        .relationship(line, order, Some("Order"), Some("Lines"), true)
        .expect("lines");
    builder.build().expect("model")
}

fn sql(model: &Model, query: &Query) -> Vec<String> {
    let dialect = Dialect::sqlite();
    QueryCompiler::new(model)
        .compile(query)
        .expect("compile")
        .generate(&SqlGenerator::new(&dialect))
        .expect("generate")
        .into_iter()
        .map(|generated| generated.text)
        .collect()
}

#[test]
fn test_root_query_projects_every_column() {
    let model = shop();
    assert_eq!(
        sql(&model, &Query::from("Customer")),
        vec![r#"SELECT "c"."Id", "c"."Name" FROM "Customer" AS "c""#]
    );
}

#[test]
fn test_filters_ordering_and_paging() {
    let model = shop();
    let query = Query::from("Customer")
        .filter("Name", BinaryOperator::Equal, "Ann")
        .order_by("Name")
        .skip(5)
        .take(10);
    assert_eq!(
        sql(&model, &query),
        vec![
            r#"SELECT "c"."Id", "c"."Name" FROM "Customer" AS "c" WHERE "c"."Name" = @p0 ORDER BY "c"."Name" LIMIT 10 OFFSET 5"#
        ]
    );

    let nulls = Query::from("Customer")
        .filter("Name", BinaryOperator::Equal, SqlValue::Null)
        .order_by_descending("Id");
    assert_eq!(
        sql(&model, &nulls),
        vec![
            r#"SELECT "c"."Id", "c"."Name" FROM "Customer" AS "c" WHERE "c"."Name" IS NULL ORDER BY "c"."Id" DESC"#
        ]
    );
}

#[test]
fn test_reference_include_becomes_left_join() {
    let model = shop();
    let query = Query::from("Order").include("Customer").expect("include");
    assert_eq!(
        sql(&model, &query),
        vec![
            r#"SELECT "o"."Id", "o"."Total", "o"."CustomerId", "c"."Id", "c"."Name" FROM "Order" AS "o" LEFT JOIN "Customer" AS "c" ON "o"."CustomerId" = "c"."Id""#
        ]
    );
}

#[test]
fn test_collection_include_gets_its_own_select() {
    let model = shop();
    let query = Query::from("Customer").include("Orders").expect("include");
    assert_eq!(
        sql(&model, &query),
        vec![
            r#"SELECT "c"."Id", "c"."Name" FROM "Customer" AS "c""#.to_string(),
            r#"SELECT "o"."Id", "o"."Total", "o"."CustomerId" FROM "Order" AS "o" INNER JOIN (SELECT "c"."Id" FROM "Customer" AS "c") AS "t" ON "t"."Id" = "o"."CustomerId" ORDER BY "t"."Id", "o"."Id""#.to_string(),
        ]
    );
}

#[test]
fn test_paged_root_keeps_ordering_in_key_subquery() {
    let model = shop();
    let query = Query::from("Customer")
        .order_by("Name")
        .take(2)
        .include("Orders")
        .expect("include");
    let statements = sql(&model, &query);
    assert_eq!(
        statements[0],
        r#"SELECT "c"."Id", "c"."Name" FROM "Customer" AS "c" ORDER BY "c"."Name" LIMIT 2"#
    );
    assert_eq!(
        statements[1],
        r#"SELECT "o"."Id", "o"."Total", "o"."CustomerId" FROM "Order" AS "o" INNER JOIN (SELECT "c"."Id" FROM "Customer" AS "c" ORDER BY "c"."Name" LIMIT 2) AS "t" ON "t"."Id" = "o"."CustomerId" ORDER BY "t"."Id", "o"."Id""#
    );
}

#[test]
fn test_collection_behind_reference_reads_distinct_keys() {
    let model = shop();
    let query = Query::from("Order").include("Customer.Orders").expect("include");
    let statements = sql(&model, &query);
    assert_eq!(statements.len(), 2);
    assert!(
        statements[1].contains(
            r#"INNER JOIN (SELECT DISTINCT "o"."CustomerId" FROM "Order" AS "o") AS "t" ON "t"."CustomerId" = "c"."Id""#
        ),
        "{}",
        statements[1]
    );
    assert!(statements[1].ends_with(r#"ORDER BY "t"."CustomerId", "o1"."Id""#));

    let paged = Query::from("Order")
        .order_by("Total")
        .take(2)
        .include("Customer.Orders")
        .expect("include");
    let statements = sql(&model, &paged);
    assert!(
        statements[1].contains(
            r#"(SELECT DISTINCT "t1"."CustomerId" FROM (SELECT "o"."CustomerId" FROM "Order" AS "o" ORDER BY "o"."Total" LIMIT 2) AS "t1") AS "t""#
        ),
        "{}",
        statements[1]
    );

    let by_key = sql(&model, &Query::from("Customer").include("Orders").expect("include"));
    assert!(!by_key[1].contains("DISTINCT"));
}

#[test]
fn test_nested_collection_joins_back_to_root() {
    let model = shop();
    let query = Query::from("Customer")
        .include("Orders")
        .and_then(|q| q.then_include("Lines"))
        .expect("include");
    let compiled = QueryCompiler::new(&model).compile(&query).expect("compile");
    assert_eq!(compiled.plan.nodes.len(), 2);
    assert_eq!(compiled.plan.nodes[1].path, "Orders.Lines");
    assert_eq!(compiled.plan.nodes[1].parent, Some(0));
    assert!(compiled.plan.nodes.iter().all(|node| node.collection));

    let statements = sql(&model, &query);
    assert_eq!(statements.len(), 3);
    assert_eq!(
        statements[2],
        r#"SELECT "o1"."Id", "o1"."Quantity", "o1"."OrderId" FROM "OrderLine" AS "o1" INNER JOIN "Order" AS "o" ON "o"."Id" = "o1"."OrderId" INNER JOIN (SELECT "c"."Id" FROM "Customer" AS "c") AS "t1" ON "t1"."Id" = "o"."CustomerId" ORDER BY "t1"."Id", "o1"."Id""#
    );
}

#[test]
fn test_include_errors() {
    let err = Query::from("Customer").then_include("Orders").expect_err("no include");
    assert!(matches!(err, OrmGraphError::DanglingIncludeChain(_)));

    let model = shop();
    let query = Query::from("Customer").include("Invoices").expect("include");
    let err = QueryCompiler::new(&model).compile(&query).expect_err("unknown");
    assert!(matches!(err, OrmGraphError::NotFound(_)));

    let err = QueryCompiler::new(&model)
        .compile(&Query::from("Supplier"))
        .expect_err("unknown entity");
    assert!(matches!(err, OrmGraphError::NotFound(_)));
}

#[test]
fn test_pipeline_merges_repeated_requests() {
    let mut pipeline = IncludePipeline::new();
    pipeline.add_include("first", "Orders").expect("first");
    pipeline.add_include("second", "Orders").expect("second");
    assert_eq!(pipeline.annotations().len(), 1);

    pipeline.append_chain("first", &["Lines"]).expect("chain");
    let annotations = pipeline.annotations();
    assert_eq!(annotations.len(), 2);
    assert_eq!(annotations[0].full_path(), vec!["Orders", "Lines"]);
    assert_eq!(
        pipeline.navigation_tree(),
        vec![IncludeNode {
            name: "Orders".to_string(),
            children: vec![IncludeNode {
                name: "Lines".to_string(),
                children: Vec::new(),
            }],
        }]
    );

    let err = pipeline.append_chain("missing", &["Lines"]).expect_err("dangling");
    assert!(matches!(err, OrmGraphError::DanglingIncludeChain(_)));
    let err = pipeline.add_include(" ", "Orders").expect_err("context");
    assert!(matches!(err, OrmGraphError::InvalidArgument(_)));
}

#[test]
fn test_chained_steps_extend_one_annotation() {
    let mut pipeline = IncludePipeline::new();
    pipeline.add_include("ctx", "Orders").expect("include");
    pipeline.append_chain("ctx", &["Lines"]).expect("lines");
    pipeline.append_chain("ctx", &["Product"]).expect("product");
    let annotations = pipeline.annotations();
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0].path, vec!["Orders"]);
    assert_eq!(annotations[0].chain, vec!["Lines", "Product"]);
}

#[test]
fn test_derived_query_filters_on_discriminator() {
    let mut builder = ModelBuilder::default();
    let animal = builder.entity("Animal").expect("animal");
    builder.property(animal, "Id", ValueType::Int32).expect("id");
    let cat = builder.entity("Cat").expect("cat");
    builder.property(cat, "Lives", ValueType::Int32).expect("lives");
    builder.base_type(cat, Some(animal)).expect("base");
    let model = builder.build().expect("model");

    assert_eq!(
        sql(&model, &Query::from("Animal")),
        vec![r#"SELECT "a"."Id", "a"."Discriminator", "a"."Lives" FROM "Animal" AS "a""#]
    );
    assert_eq!(
        sql(&model, &Query::from("Cat")),
        vec![
            r#"SELECT "a"."Id", "a"."Discriminator", "a"."Lives" FROM "Animal" AS "a" WHERE "a"."Discriminator" = 'Cat'"#
        ]
    );
}
