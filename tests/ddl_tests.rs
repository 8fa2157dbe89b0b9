use std::sync::Arc;

use ormgraph::metadata::{MetadataItem, Model, ValueType};
use ormgraph::sql::{DdlGenerator, Dialect};
use ormgraph::ModelBuilder;
use serde_json::json;

fn shop(required: bool) -> Arc<Model> {
    let mut builder = ModelBuilder::default();
    let customer = builder.entity("Customer").expect("customer");
    builder.property(customer, "Id", ValueType::Int32).expect("id");
    builder.property(customer, "Name", ValueType::Text).expect("name");
    let order = builder.entity("Order").expect("order");
    builder.property(order, "Id", ValueType::Int32).expect("id");
    builder.property(order, "Total", ValueType::Float64).expect("total");
    builder
        .relationship(order, customer, Some("Customer"), Some("Orders"), required)
        .expect("relationship");
    builder.build().expect("model")
}

#[test]
fn test_sqlite_create_tables_in_dependency_order() {
    let model = shop(false);
    let sqlite = Dialect::sqlite();
    let statements = DdlGenerator::new(&sqlite).create_tables(&model).expect("ddl");
    assert_eq!(
        statements,
        vec![
            "CREATE TABLE \"Customer\" (\n    \"Id\" INTEGER NOT NULL CONSTRAINT \"PK_Customer\" PRIMARY KEY AUTOINCREMENT,\n    \"Name\" TEXT NOT NULL\n)".to_string(),
            "CREATE TABLE \"Order\" (\n    \"Id\" INTEGER NOT NULL CONSTRAINT \"PK_Order\" PRIMARY KEY AUTOINCREMENT,\n    \"Total\" REAL NOT NULL,\n    \"CustomerId\" INTEGER NULL,\n    CONSTRAINT \"FK_Order_Customer_CustomerId\" FOREIGN KEY (\"CustomerId\") REFERENCES \"Customer\" (\"Id\")\n)".to_string(),
        ]
    );
}

#[test]
fn test_required_relationship_cascades() {
    let model = shop(true);
    let sqlite = Dialect::sqlite();
    let script = DdlGenerator::new(&sqlite).create_script(&model).expect("ddl");
    assert!(script.contains("\"CustomerId\" INTEGER NOT NULL"), "{script}");
    assert!(
        script.contains("REFERENCES \"Customer\" (\"Id\") ON DELETE CASCADE\n);\n"),
        "{script}"
    );
    assert!(script.starts_with("CREATE TABLE \"Customer\""));
    assert_eq!(script.matches(";\n").count(), 2);
}

#[test]
fn test_sql_server_uses_identity_and_separate_key() {
    let model = shop(false);
    let server = Dialect::sql_server();
    let statements = DdlGenerator::new(&server).create_tables(&model).expect("ddl");
    assert_eq!(
        statements[0],
        "CREATE TABLE [Customer] (\n    [Id] int NOT NULL IDENTITY,\n    [Name] nvarchar(max) NOT NULL,\n    CONSTRAINT [PK_Customer] PRIMARY KEY ([Id])\n)"
    );
}

#[test]
fn test_drop_tables_reverse_order() {
    let model = shop(false);
    let sqlite = Dialect::sqlite();
    let generator = DdlGenerator::new(&sqlite);
    assert_eq!(
        generator.drop_tables(&model).expect("drop"),
        vec!["DROP TABLE \"Order\"", "DROP TABLE \"Customer\""]
    );
    assert_eq!(
        generator.drop_script(&model).expect("drop"),
        "DROP TABLE \"Order\";\nDROP TABLE \"Customer\";\n"
    );
}

#[test]
fn test_hierarchy_shares_root_table() {
    let mut builder = ModelBuilder::default();
    let animal = builder.entity("Animal").expect("animal");
    builder.property(animal, "Code", ValueType::Text).expect("code");
    let code = builder.model().find_property(animal, "Code").expect("code").id;
    builder.primary_key(&[code]).expect("pk");
    let cat = builder.entity("Cat").expect("cat");
    builder.property(cat, "Lives", ValueType::Int32).expect("lives");
    builder.base_type(cat, Some(animal)).expect("base");
    let model = builder.build().expect("model");

    let server = Dialect::sql_server();
    let statements = DdlGenerator::new(&server).create_tables(&model).expect("ddl");
    assert_eq!(
        statements,
        vec![
            "CREATE TABLE [Animal] (\n    [Code] nvarchar(450) NOT NULL,\n    [Discriminator] nvarchar(max) NOT NULL,\n    [Lives] int NULL,\n    CONSTRAINT [PK_Animal] PRIMARY KEY ([Code])\n)".to_string()
        ]
    );
}

#[test]
fn test_annotations_override_names_and_types() {
    let mut builder = ModelBuilder::default();
    let customer = builder.entity("Customer").expect("customer");
    let id = builder.property(customer, "Id", ValueType::Int64).expect("id");
    let name = builder.property(customer, "Name", ValueType::Text).expect("name");
    builder
        .set_annotation(MetadataItem::Entity(customer), "Relational:TableName", json!("Customers"))
        .expect("table");
    builder
        .set_annotation(MetadataItem::Entity(customer), "Relational:Schema", json!("sales"))
        .expect("schema");
    builder
        .set_annotation(MetadataItem::Property(name), "Relational:ColumnName", json!("full_name"))
        .expect("column");
    builder
        .set_annotation(MetadataItem::Property(name), "Relational:ColumnType", json!("varchar(80)"))
        .expect("type");
    builder
        .set_annotation(MetadataItem::Property(name), "Relational:DefaultValueSql", json!("''"))
        .expect("default");
    let key = builder.model().primary_key(customer).expect("pk").id;
    builder
        .set_annotation(MetadataItem::Key(key), "Relational:ConstraintName", json!("PK_Customers_Id"))
        .expect("constraint");
    assert_eq!(builder.model().primary_key(customer).map(|k| k.properties.clone()), Some(vec![id]));
    let model = builder.build().expect("model");

    let sqlite = Dialect::sqlite();
    let statements = DdlGenerator::new(&sqlite).create_tables(&model).expect("ddl");
    assert_eq!(
        statements[0],
        "CREATE TABLE \"sales\".\"Customers\" (\n    \"Id\" INTEGER NOT NULL CONSTRAINT \"PK_Customers_Id\" PRIMARY KEY AUTOINCREMENT,\n    \"full_name\" varchar(80) NOT NULL DEFAULT ('')\n)"
    );
}
