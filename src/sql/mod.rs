//! Dialect-aware SQL rendering.

pub mod builder;
pub mod ddl;
pub mod dialect;
pub mod dialects;
pub mod expression;
pub mod generator;
pub mod value;

pub use builder::{
    CommandBuilder, CommandBuilderFactory, DefaultCommandBuilderFactory, GeneratedSql,
};
pub use ddl::DdlGenerator;
pub use dialect::{
    BytesStyle, DateTimeStyle, DelimitedIdentifiers, Dialect, IdentifierEscaper,
    LimitOffsetPaging, LiteralFormatter, NoPaging, OffsetFetchPaging, PagingPlan, PagingStrategy,
    ParameterNaming, PrefixedParameters, ResultPropagation, StandardLiterals, TypeMapping,
};
pub use dialects::{SqlServerResultPropagation, SqlServerTypes, SqliteResultPropagation, SqliteTypes};
pub use expression::{
    BinaryOperator, JoinExpression, JoinKind, Ordering, Projection, SelectExpression,
    SqlExpression, TableExpression,
};
pub use generator::SqlGenerator;
pub use value::SqlValue;
