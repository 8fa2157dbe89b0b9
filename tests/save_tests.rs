#![cfg(feature = "sqlite-backend")]

use std::sync::Arc;

use ormgraph::cache::ValueGeneratorCache;
use ormgraph::connection::{Connection, SqliteConnection};
use ormgraph::metadata::{EntityId, Model, PropertyId, ValueType};
use ormgraph::query::{Query, QueryCompiler};
use ormgraph::sql::{
    BinaryOperator, DdlGenerator, Dialect, SqlExpression, SqlGenerator, SqlValue,
};
use ormgraph::update::{BatchExecutor, CommandPlanner, EntityEntry, SaveResult};
use ormgraph::{ModelBuilder, OrmGraphError};

struct Store {
    model: Arc<Model>,
    dialect: Dialect,
    connection: SqliteConnection,
    generators: ValueGeneratorCache,
    customer: EntityId,
    order: EntityId,
}

impl Store {
    fn new() -> Self {
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
        let model = builder.build().expect("model");

        let dialect = Dialect::sqlite();
        let mut connection = SqliteConnection::open_in_memory().expect("open");
        let script = DdlGenerator::new(&dialect).create_script(&model).expect("ddl");
        connection.execute_script(&script).expect("schema");
        Self {
            model,
            dialect,
            connection,
            generators: ValueGeneratorCache::new(),
            customer,
            order,
        }
    }

    fn property(&self, entity: EntityId, name: &str) -> PropertyId {
        self.model.find_property(entity, name).expect("property").id
    }

    fn save(&mut self, entries: &mut [EntityEntry]) -> Result<SaveResult, OrmGraphError> {
        let planner = CommandPlanner::new(&self.model, &self.generators, self.dialect.batch_config());
        let batches = planner.plan(entries)?;
        let result = BatchExecutor::new(&self.model, &self.dialect)
            .with_sensitive_data_logging(true)
            .execute(&batches, &mut self.connection)?;
        result.apply(entries);
        Ok(result)
    }

    fn rows(&mut self, sql: &str) -> Vec<Vec<SqlValue>> {
        self.connection.query(sql, &[]).expect("query")
    }
}

fn seed(store: &mut Store) -> Vec<EntityEntry> {
    let fk = store.model.foreign_keys(store.order)[0].id;
    let mut order = EntityEntry::added(store.order).relate(fk, 1);
    order.set(&store.model, "Total", 12.5).expect("total");
    let mut customer = EntityEntry::added(store.customer);
    customer.set(&store.model, "Name", "Ann").expect("name");
    let mut entries = vec![order, customer];
    store.save(&mut entries).expect("save");
    entries
}

#[test]
fn test_insert_propagates_store_keys() {
    let mut store = Store::new();
    let fk = store.model.foreign_keys(store.order)[0].id;
    let mut order = EntityEntry::added(store.order).relate(fk, 1);
    order.set(&store.model, "Total", 12.5).expect("total");
    let mut customer = EntityEntry::added(store.customer);
    customer.set(&store.model, "Name", "Ann").expect("name");
    let mut entries = vec![order, customer];

    let result = store.save(&mut entries).expect("save");
    assert_eq!(result.batches, 2);
    assert_eq!(result.commands, 2);
    assert_eq!(result.rows_affected, 2);

    let customer_id = store.property(store.customer, "Id");
    let order_id = store.property(store.order, "Id");
    let order_fk = store.property(store.order, "CustomerId");
    assert_eq!(entries[1].current(customer_id), &SqlValue::Int(1));
    assert!(!entries[1].is_temporary(customer_id));
    assert_eq!(entries[0].current(order_id), &SqlValue::Int(1));
    assert_eq!(entries[0].current(order_fk), &SqlValue::Int(1));
    assert!(result
        .propagated
        .iter()
        .any(|p| p.entry == 0 && p.property == order_fk && p.value == SqlValue::Int(1)));

    assert_eq!(
        store.rows(r#"SELECT "CustomerId", "Total" FROM "Order""#),
        vec![vec![SqlValue::Int(1), SqlValue::Float(12.5)]]
    );
}

#[test]
fn test_update_and_delete_round_trip() {
    let mut store = Store::new();
    seed(&mut store);

    let mut rename = EntityEntry::modified(store.customer);
    rename.set_original(&store.model, "Id", 1).expect("id");
    rename.update(&store.model, "Name", "Bo").expect("name");
    let result = store.save(&mut [rename]).expect("update");
    assert_eq!(result.rows_affected, 1);
    assert!(result.propagated.is_empty());
    assert_eq!(
        store.rows(r#"SELECT "Name" FROM "Customer""#),
        vec![vec![SqlValue::Text("Bo".to_string())]]
    );

    let customer_id = store.property(store.customer, "Id");
    let order_id = store.property(store.order, "Id");
    let order_fk = store.property(store.order, "CustomerId");
    let mut deletes = vec![
        EntityEntry::deleted(store.customer).with_value(customer_id, 1),
        EntityEntry::deleted(store.order)
            .with_value(order_id, 1)
            .with_value(order_fk, 1),
    ];
    let result = store.save(&mut deletes).expect("delete");
    assert_eq!(result.commands, 2);
    assert!(store.rows(r#"SELECT * FROM "Customer""#).is_empty());
    assert!(store.rows(r#"SELECT * FROM "Order""#).is_empty());
}

#[test]
fn test_missing_row_is_a_concurrency_conflict() {
    let mut store = Store::new();
    let mut rename = EntityEntry::modified(store.customer);
    rename.set_original(&store.model, "Id", 99).expect("id");
    rename.update(&store.model, "Name", "Ghost").expect("name");
    match store.save(&mut [rename]) {
        Err(OrmGraphError::ConcurrencyConflict { expected, actual }) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 0);
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn test_compiled_query_runs_against_the_store() {
    let mut store = Store::new();
    seed(&mut store);

    let query = Query::from("Customer")
        .filter("Name", BinaryOperator::Equal, "Ann")
        .include("Orders")
        .expect("include");
    let statements = QueryCompiler::new(&store.model)
        .compile(&query)
        .expect("compile")
        .generate(&SqlGenerator::new(&store.dialect))
        .expect("generate");
    assert_eq!(statements.len(), 2);

    let customers = store
        .connection
        .query(&statements[0].text, &statements[0].parameters)
        .expect("customers");
    assert_eq!(customers, vec![vec![SqlValue::Int(1), SqlValue::Text("Ann".to_string())]]);
    let orders = store
        .connection
        .query(&statements[1].text, &statements[1].parameters)
        .expect("orders");
    assert_eq!(orders, vec![vec![SqlValue::Int(1), SqlValue::Float(12.5), SqlValue::Int(1)]]);
}

#[test]
fn test_collection_behind_reference_is_not_multiplied() {
    let mut store = Store::new();
    seed(&mut store);
    store
        .connection
        .execute(r#"INSERT INTO "Order" ("Total", "CustomerId") VALUES (3.5, 1)"#, &[])
        .expect("second order");

    let query = Query::from("Order").include("Customer.Orders").expect("include");
    let statements = QueryCompiler::new(&store.model)
        .compile(&query)
        .expect("compile")
        .generate(&SqlGenerator::new(&store.dialect))
        .expect("generate");
    let orders = store
        .connection
        .query(&statements[1].text, &statements[1].parameters)
        .expect("orders");
    assert_eq!(
        orders,
        vec![
            vec![SqlValue::Int(1), SqlValue::Float(12.5), SqlValue::Int(1)],
            vec![SqlValue::Int(2), SqlValue::Float(3.5), SqlValue::Int(1)],
        ]
    );
}

#[test]
fn test_concat_of_arithmetic_evaluates_in_order() {
    let mut store = Store::new();
    let sum = SqlExpression::add(SqlExpression::literal(1), SqlExpression::literal(1));
    let concat = SqlExpression::binary(BinaryOperator::Concat, sum, SqlExpression::literal("x"));
    let text = SqlGenerator::new(&store.dialect).generate_expression(&concat).text;
    assert_eq!(
        store.rows(&format!("SELECT {text}")),
        vec![vec![SqlValue::Text("2x".to_string())]]
    );
}

#[test]
fn test_closed_connection_reports_connection_error() {
    let mut connection = SqliteConnection::open_in_memory().expect("open");
    assert!(connection.is_open());
    connection.close().expect("close");
    assert!(!connection.is_open());
    let err = connection.execute("SELECT 1", &[]).expect_err("closed");
    assert!(matches!(err, OrmGraphError::ConnectionError(_)));
    connection.open().expect("reopen");
    assert_eq!(
        connection.query("SELECT 1", &[]).expect("query"),
        vec![vec![SqlValue::Int(1)]]
    );
}
