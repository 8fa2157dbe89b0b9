use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use ormgraph::connection::Parameter;
use ormgraph::metadata::ValueType;
use ormgraph::sql::{
    BinaryOperator, BytesStyle, DateTimeStyle, Dialect, NoPaging, SelectExpression,
    SqlExpression, SqlGenerator, SqlValue, StandardLiterals, TableExpression,
};
use ormgraph::OrmGraphError;

fn customers() -> SelectExpression {
    let mut select = SelectExpression::from(TableExpression::table("Customer", None, "c"));
    select
        .project(SqlExpression::column(Some("c"), "Id", ValueType::Int32), None)
        .project(SqlExpression::column(Some("c"), "Name", ValueType::Text), None);
    select
}

fn render(dialect: &Dialect, select: &SelectExpression) -> String {
    SqlGenerator::new(dialect)
        .generate(select)
        .expect("generate")
        .text
}

fn render_expression(dialect: &Dialect, expression: &SqlExpression) -> String {
    SqlGenerator::new(dialect).generate_expression(expression).text
}

fn name_column() -> SqlExpression {
    SqlExpression::column(Some("c"), "Name", ValueType::Text)
}

fn id_column() -> SqlExpression {
    SqlExpression::column(Some("c"), "Id", ValueType::Int32)
}

#[test]
fn test_sqlite_limit_offset_paging() {
    let sqlite = Dialect::sqlite();
    let base = r#"SELECT "c"."Id", "c"."Name" FROM "Customer" AS "c""#;
    assert_eq!(render(&sqlite, &customers()), base);

    let mut take = customers();
    take.limit(Some(10));
    assert_eq!(render(&sqlite, &take), format!("{base} LIMIT 10"));

    let mut skip = customers();
    skip.offset(Some(5));
    assert_eq!(render(&sqlite, &skip), format!("{base} LIMIT -1 OFFSET 5"));

    let mut both = customers();
    both.limit(Some(10)).offset(Some(5));
    assert_eq!(render(&sqlite, &both), format!("{base} LIMIT 10 OFFSET 5"));
}

#[test]
fn test_sql_server_top_and_offset_fetch() {
    let server = Dialect::sql_server();
    let mut take = customers();
    take.limit(Some(10));
    assert_eq!(
        render(&server, &take),
        "SELECT TOP(10) [c].[Id], [c].[Name] FROM [Customer] AS [c]"
    );

    let mut page = customers();
    page.limit(Some(10)).offset(Some(5));
    assert_eq!(
        render(&server, &page),
        "SELECT [c].[Id], [c].[Name] FROM [Customer] AS [c] ORDER BY (SELECT 1) OFFSET 5 ROWS FETCH NEXT 10 ROWS ONLY"
    );

    let mut ordered = customers();
    ordered.order_by(name_column(), true).offset(Some(5));
    assert_eq!(
        render(&server, &ordered),
        "SELECT [c].[Id], [c].[Name] FROM [Customer] AS [c] ORDER BY [c].[Name] DESC OFFSET 5 ROWS"
    );
}

#[test]
fn test_dialect_without_paging_rejects_limits() {
    let dialect = Dialect::sqlite()
        .with_name("plain")
        .with_paging(Arc::new(NoPaging));
    assert_eq!(dialect.name(), "plain");
    let mut take = customers();
    take.limit(Some(1));
    let err = SqlGenerator::new(&dialect).generate(&take).expect_err("paging");
    assert!(matches!(err, OrmGraphError::UnsupportedDialectFeature(_)));
    assert!(SqlGenerator::new(&dialect).generate(&customers()).is_ok());
}

#[test]
fn test_sqlite_date_literals() {
    let sqlite = Dialect::sqlite();
    let offset = DateTime::parse_from_rfc3339("2015-03-12T13:36:37.371-07:00").expect("parse");
    assert_eq!(
        sqlite.generate_literal(&SqlValue::DateTimeOffset(offset)),
        "'2015-03-12 13:36:37.371-07:00'"
    );
    let naive = NaiveDate::from_ymd_opt(2015, 3, 12)
        .and_then(|d| d.and_hms_milli_opt(13, 36, 37, 371))
        .expect("date");
    assert_eq!(
        sqlite.generate_literal(&SqlValue::DateTime(naive)),
        "'2015-03-12 13:36:37.371'"
    );
}

#[test]
fn test_offset_dropped_when_dialect_lacks_offsets() {
    let dialect = Dialect::sqlite().with_literals(Arc::new(StandardLiterals {
        string_prefix: "",
        bytes: BytesStyle::QuotedHex,
        date_time: DateTimeStyle {
            separator: ' ',
            fractional_digits: 3,
            include_offset: false,
        },
    }));
    let offset = DateTime::parse_from_rfc3339("2015-03-12T13:36:37.371-07:00").expect("parse");
    assert_eq!(
        dialect.generate_literal(&SqlValue::DateTimeOffset(offset)),
        "'2015-03-12 13:36:37.371'"
    );
}

#[test]
fn test_scalar_literals() {
    let sqlite = Dialect::sqlite();
    assert_eq!(sqlite.generate_literal(&SqlValue::Null), "NULL");
    assert_eq!(sqlite.generate_literal(&SqlValue::Int(-42)), "-42");
    assert_eq!(sqlite.generate_literal(&SqlValue::Float(2.0)), "2.0");
    assert_eq!(sqlite.generate_literal(&SqlValue::Float(2.5)), "2.5");
    assert_eq!(sqlite.generate_literal(&SqlValue::Bool(false)), "0");
    assert_eq!(
        sqlite.generate_literal(&SqlValue::Decimal("10.25".to_string())),
        "10.25"
    );
}

#[test]
fn test_string_addition_uses_dialect_concat() {
    let concat = SqlExpression::add(name_column(), SqlExpression::literal("!"));
    assert_eq!(render_expression(&Dialect::sqlite(), &concat), r#""c"."Name" || '!'"#);
    assert_eq!(render_expression(&Dialect::sql_server(), &concat), "[c].[Name] + N'!'");

    let sum = SqlExpression::add(id_column(), SqlExpression::literal(1));
    assert_eq!(render_expression(&Dialect::sqlite(), &sum), r#""c"."Id" + 1"#);
}

#[test]
fn test_concat_wraps_arithmetic_operands() {
    let sum = SqlExpression::add(SqlExpression::literal(1), SqlExpression::literal(1));
    let concat = SqlExpression::binary(
        BinaryOperator::Concat,
        sum.clone(),
        SqlExpression::literal("x"),
    );
    assert_eq!(render_expression(&Dialect::sqlite(), &concat), "(1 + 1) || 'x'");
    assert_eq!(render_expression(&Dialect::sql_server(), &concat), "(1 + 1) + N'x'");

    let product =
        SqlExpression::binary(BinaryOperator::Multiply, id_column(), SqlExpression::literal(2));
    let trailing = SqlExpression::binary(BinaryOperator::Concat, name_column(), product);
    assert_eq!(
        render_expression(&Dialect::sqlite(), &trailing),
        r#""c"."Name" || ("c"."Id" * 2)"#
    );

    let chained = SqlExpression::add(
        SqlExpression::add(name_column(), SqlExpression::literal("-")),
        name_column(),
    );
    assert_eq!(
        render_expression(&Dialect::sqlite(), &chained),
        r#""c"."Name" || '-' || "c"."Name""#
    );
    assert!(matches!(sum, SqlExpression::Binary { op: BinaryOperator::Add, .. }));
}

#[test]
fn test_null_comparisons_render_as_is_null() {
    let sqlite = Dialect::sqlite();
    let equal = SqlExpression::eq(name_column(), SqlExpression::literal(SqlValue::Null));
    assert_eq!(render_expression(&sqlite, &equal), r#""c"."Name" IS NULL"#);
    let reversed = SqlExpression::eq(SqlExpression::literal(SqlValue::Null), name_column());
    assert_eq!(render_expression(&sqlite, &reversed), r#""c"."Name" IS NULL"#);
    let not_equal = SqlExpression::binary(
        BinaryOperator::NotEqual,
        name_column(),
        SqlExpression::literal(SqlValue::Null),
    );
    assert_eq!(render_expression(&sqlite, &not_equal), r#""c"."Name" IS NOT NULL"#);
    let explicit = SqlExpression::is_not_null(id_column());
    assert_eq!(render_expression(&sqlite, &explicit), r#""c"."Id" IS NOT NULL"#);
}

#[test]
fn test_parentheses_follow_precedence() {
    let sqlite = Dialect::sqlite();
    let either = SqlExpression::or(
        SqlExpression::eq(id_column(), SqlExpression::literal(1)),
        SqlExpression::eq(id_column(), SqlExpression::literal(2)),
    );
    let both = SqlExpression::and(
        either,
        SqlExpression::eq(name_column(), SqlExpression::literal("x")),
    );
    assert_eq!(
        render_expression(&sqlite, &both),
        r#"("c"."Id" = 1 OR "c"."Id" = 2) AND "c"."Name" = 'x'"#
    );

    let one = || SqlExpression::literal(1);
    let right_nested = SqlExpression::binary(
        BinaryOperator::Subtract,
        one(),
        SqlExpression::binary(BinaryOperator::Subtract, one(), one()),
    );
    assert_eq!(render_expression(&sqlite, &right_nested), "1 - (1 - 1)");
    let left_nested = SqlExpression::binary(
        BinaryOperator::Subtract,
        SqlExpression::binary(BinaryOperator::Subtract, one(), one()),
        one(),
    );
    assert_eq!(render_expression(&sqlite, &left_nested), "1 - 1 - 1");
    let product = SqlExpression::binary(
        BinaryOperator::Multiply,
        SqlExpression::add(one(), one()),
        one(),
    );
    assert_eq!(render_expression(&sqlite, &product), "(1 + 1) * 1");
}

#[test]
fn test_parameters_are_bound_once() {
    let sqlite = Dialect::sqlite();
    let mut select = customers();
    select
        .filter(SqlExpression::eq(id_column(), SqlExpression::parameter("p0", 5)))
        .filter(SqlExpression::or(
            SqlExpression::eq(name_column(), SqlExpression::parameter("p1", "Ann")),
            SqlExpression::eq(name_column(), SqlExpression::parameter("p1", "Ann")),
        ));
    let generated = SqlGenerator::new(&sqlite).generate(&select).expect("generate");
    assert_eq!(
        generated.text,
        r#"SELECT "c"."Id", "c"."Name" FROM "Customer" AS "c" WHERE "c"."Id" = @p0 AND ("c"."Name" = @p1 OR "c"."Name" = @p1)"#
    );
    assert_eq!(
        generated.parameters,
        vec![Parameter::new("@p0", 5), Parameter::new("@p1", "Ann")]
    );
}

#[test]
fn test_schema_qualified_tables() {
    let select = SelectExpression::from(TableExpression::table("Orders", Some("sales"), "o"));
    assert_eq!(
        render(&Dialect::sql_server(), &select),
        "SELECT * FROM [sales].[Orders] AS [o]"
    );
}
