use std::sync::Arc;

use crate::{
    metadata::ValueType,
    sql::dialect::{
        BytesStyle, DateTimeStyle, DelimitedIdentifiers, Dialect, LimitOffsetPaging,
        OffsetFetchPaging, PrefixedParameters, ResultPropagation, StandardLiterals, TypeMapping,
    },
    update::batch::BatchConfig,
};

#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteTypes;

impl TypeMapping for SqliteTypes {
    fn store_type(&self, value_type: ValueType, _is_key: bool) -> String {
        match value_type {
            ValueType::Bool | ValueType::Int32 | ValueType::Int64 => "INTEGER",
            ValueType::Float64 => "REAL",
            ValueType::Decimal => "NUMERIC",
            ValueType::Bytes | ValueType::Guid => "BLOB",
            ValueType::Text | ValueType::DateTime | ValueType::DateTimeOffset => "TEXT",
        }
        .to_string()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteResultPropagation;

impl ResultPropagation for SqliteResultPropagation {
    fn rows_affected_condition(&self) -> String {
        "changes() = 1".to_string()
    }

    fn identity_condition(&self, _delimited_key_column: &str) -> String {
        "\"rowid\" = last_insert_rowid()".to_string()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqlServerTypes;

impl TypeMapping for SqlServerTypes {
    fn store_type(&self, value_type: ValueType, is_key: bool) -> String {
        match value_type {
            ValueType::Bool => "bit",
            ValueType::Int32 => "int",
            ValueType::Int64 => "bigint",
            ValueType::Float64 => "float",
            ValueType::Decimal => "decimal(18, 2)",
            ValueType::Text if is_key => "nvarchar(450)",
            ValueType::Text => "nvarchar(max)",
            ValueType::Bytes if is_key => "varbinary(900)",
            ValueType::Bytes => "varbinary(max)",
            ValueType::DateTime => "datetime2",
            ValueType::DateTimeOffset => "datetimeoffset",
            ValueType::Guid => "uniqueidentifier",
        }
        .to_string()
    }

    fn identity_clause(&self) -> Option<&str> {
        Some("IDENTITY")
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqlServerResultPropagation;

impl ResultPropagation for SqlServerResultPropagation {
    fn rows_affected_condition(&self) -> String {
        "@@ROWCOUNT = 1".to_string()
    }

    fn identity_condition(&self, delimited_key_column: &str) -> String {
        format!("{delimited_key_column} = scope_identity()")
    }
}

impl Dialect {
    /// SQLite: `"quoted"` identifiers, `LIMIT/OFFSET` paging, `||` concatenation,
    /// one command per batch.
    pub fn sqlite() -> Self {
        Dialect {
            name: "sqlite".to_string(),
            parameters: Arc::new(PrefixedParameters {
                prefix: "@".to_string(),
            }),
            literals: Arc::new(StandardLiterals {
                string_prefix: "",
                bytes: BytesStyle::QuotedHex,
                date_time: DateTimeStyle {
                    separator: ' ',
                    fractional_digits: 3,
                    include_offset: true,
                },
            }),
            identifiers: Arc::new(DelimitedIdentifiers {
                open: '"',
                close: '"',
            }),
            paging: Arc::new(LimitOffsetPaging {
                unbounded: "-1".to_string(),
            }),
            types: Arc::new(SqliteTypes),
            propagation: Arc::new(SqliteResultPropagation),
            concat_operator: "||".to_string(),
            batch_command_separator: ";".to_string(),
            batch_separator: String::new(),
            batching: BatchConfig::singular(),
        }
    }

    /// SQL Server: `[bracketed]` identifiers, `N'...'` strings, `TOP`/`OFFSET FETCH`
    /// paging, `+` concatenation.
    pub fn sql_server() -> Self {
        Dialect {
            name: "sqlserver".to_string(),
            parameters: Arc::new(PrefixedParameters {
                prefix: "@".to_string(),
            }),
            literals: Arc::new(StandardLiterals {
                string_prefix: "N",
                bytes: BytesStyle::PrefixedHex,
                date_time: DateTimeStyle {
                    separator: 'T',
                    fractional_digits: 7,
                    include_offset: true,
                },
            }),
            identifiers: Arc::new(DelimitedIdentifiers {
                open: '[',
                close: ']',
            }),
            paging: Arc::new(OffsetFetchPaging),
            types: Arc::new(SqlServerTypes),
            propagation: Arc::new(SqlServerResultPropagation),
            concat_operator: "+".to_string(),
            batch_command_separator: ";".to_string(),
            batch_separator: "GO".to_string(),
            batching: BatchConfig {
                max_batch_size: 1000,
                max_parameters: Some(2100),
                singular: false,
            },
        }
    }
}
