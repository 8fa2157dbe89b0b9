//! Dialects are composed from independent strategies, one per extension point,
//! so a preset can swap a single concern without touching the rest.

use std::{fmt, sync::Arc};

use chrono::{DateTime, FixedOffset, NaiveDateTime, Timelike};

use crate::{
    errors::OrmGraphError, metadata::ValueType, sql::value::SqlValue, update::batch::BatchConfig,
};

pub trait ParameterNaming: Send + Sync {
    fn parameter_name(&self, name: &str) -> String;
}

/// `@name`-style parameters.
#[derive(Clone, Debug)]
pub struct PrefixedParameters {
    pub prefix: String,
}

impl ParameterNaming for PrefixedParameters {
    fn parameter_name(&self, name: &str) -> String {
        if name.starts_with(&self.prefix) {
            name.to_string()
        } else {
            format!("{}{name}", self.prefix)
        }
    }
}

pub trait IdentifierEscaper: Send + Sync {
    fn escape_identifier(&self, text: &str) -> String;
    fn delimit_identifier(&self, name: &str) -> String;
}

/// Wraps identifiers in `open`/`close`, doubling any embedded `close`.
#[derive(Clone, Copy, Debug)]
pub struct DelimitedIdentifiers {
    pub open: char,
    pub close: char,
}

impl IdentifierEscaper for DelimitedIdentifiers {
    fn escape_identifier(&self, text: &str) -> String {
        let doubled: String = [self.close, self.close].iter().collect();
        text.replace(self.close, &doubled)
    }

    fn delimit_identifier(&self, name: &str) -> String {
        format!("{}{}{}", self.open, self.escape_identifier(name), self.close)
    }
}

/// Date/time literal layout: `YYYY-MM-DD<separator>hh:mm:ss[.f...][+hh:mm]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateTimeStyle {
    pub separator: char,
    pub fractional_digits: u8,
    pub include_offset: bool,
}

impl DateTimeStyle {
    pub fn format_naive(&self, value: &NaiveDateTime) -> String {
        let mut out = format!(
            "{}{}{}",
            value.format("%Y-%m-%d"),
            self.separator,
            value.format("%H:%M:%S")
        );
        if self.fractional_digits > 0 {
            let digits = usize::from(self.fractional_digits.min(9));
            let nanos = format!("{:09}", value.nanosecond() % 1_000_000_000);
            out.push('.');
            out.push_str(&nanos[..digits]);
        }
        out
    }

    pub fn format_offset(&self, value: &DateTime<FixedOffset>) -> String {
        let mut out = self.format_naive(&value.naive_local());
        if self.include_offset {
            out.push_str(&value.format("%:z").to_string());
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BytesStyle {
    /// `X'0A1B'`
    QuotedHex,
    /// `0x0A1B`
    PrefixedHex,
}

pub trait LiteralFormatter: Send + Sync {
    fn escape_literal(&self, text: &str) -> String;
    fn literal(&self, value: &SqlValue) -> String;
}

#[derive(Clone, Debug)]
pub struct StandardLiterals {
    /// Prefix for string literals, `N` for national character strings.
    pub string_prefix: &'static str,
    pub bytes: BytesStyle,
    pub date_time: DateTimeStyle,
}

impl LiteralFormatter for StandardLiterals {
    fn escape_literal(&self, text: &str) -> String {
        text.replace('\'', "''")
    }

    fn literal(&self, value: &SqlValue) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(flag) => (if *flag { "1" } else { "0" }).to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Float(v) if v.is_finite() && v.fract() == 0.0 => format!("{v:.1}"),
            SqlValue::Float(v) => v.to_string(),
            SqlValue::Decimal(text) => text.clone(),
            SqlValue::Text(text) => {
                format!("{}'{}'", self.string_prefix, self.escape_literal(text))
            }
            SqlValue::Bytes(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
                match self.bytes {
                    BytesStyle::QuotedHex => format!("X'{hex}'"),
                    BytesStyle::PrefixedHex => format!("0x{hex}"),
                }
            }
            SqlValue::DateTime(value) => format!("'{}'", self.date_time.format_naive(value)),
            SqlValue::DateTimeOffset(value) => {
                format!("'{}'", self.date_time.format_offset(value))
            }
            SqlValue::Guid(value) => format!("'{value}'"),
        }
    }
}

/// Leading and trailing paging fragments for one select.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagingPlan {
    /// Emitted right after `SELECT [DISTINCT]`.
    pub leading: Option<String>,
    /// Emitted after `ORDER BY`.
    pub trailing: Option<String>,
    /// Ordering to emit when the select has none but the trailing clause needs one.
    pub synthetic_order: Option<String>,
}

pub trait PagingStrategy: Send + Sync {
    fn plan(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        has_ordering: bool,
    ) -> Result<PagingPlan, OrmGraphError>;
}

/// `LIMIT n [OFFSET m]`; an offset alone gets the unbounded sentinel as limit.
#[derive(Clone, Debug)]
pub struct LimitOffsetPaging {
    pub unbounded: String,
}

impl PagingStrategy for LimitOffsetPaging {
    fn plan(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        _has_ordering: bool,
    ) -> Result<PagingPlan, OrmGraphError> {
        let trailing = match (limit, offset) {
            (None, None) => None,
            (Some(limit), None) => Some(format!("LIMIT {limit}")),
            (None, Some(offset)) => Some(format!("LIMIT {} OFFSET {offset}", self.unbounded)),
            (Some(limit), Some(offset)) => Some(format!("LIMIT {limit} OFFSET {offset}")),
        };
        Ok(PagingPlan {
            trailing,
            ..PagingPlan::default()
        })
    }
}

/// `TOP(n)` for a bare limit, `OFFSET m ROWS [FETCH NEXT n ROWS ONLY]` otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct OffsetFetchPaging;

impl PagingStrategy for OffsetFetchPaging {
    fn plan(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        has_ordering: bool,
    ) -> Result<PagingPlan, OrmGraphError> {
        let Some(offset) = offset else {
            return Ok(PagingPlan {
                leading: limit.map(|n| format!("TOP({n})")),
                ..PagingPlan::default()
            });
        };
        let mut trailing = format!("OFFSET {offset} ROWS");
        if let Some(limit) = limit {
            trailing.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
        }
        Ok(PagingPlan {
            leading: None,
            trailing: Some(trailing),
            synthetic_order: (!has_ordering).then(|| "(SELECT 1)".to_string()),
        })
    }
}

/// For stores without paging syntax.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPaging;

impl PagingStrategy for NoPaging {
    fn plan(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
        _has_ordering: bool,
    ) -> Result<PagingPlan, OrmGraphError> {
        if limit.is_some() || offset.is_some() {
            return Err(OrmGraphError::unsupported("paging (limit/offset)"));
        }
        Ok(PagingPlan::default())
    }
}

pub trait TypeMapping: Send + Sync {
    /// Store type for a column. Key columns may need a bounded type.
    fn store_type(&self, value_type: ValueType, is_key: bool) -> String;

    /// Column clause suffix making an integer key store-generated, if any.
    fn identity_clause(&self) -> Option<&str> {
        None
    }
}

pub trait ResultPropagation: Send + Sync {
    /// Condition holding only when the previous statement touched one row.
    fn rows_affected_condition(&self) -> String;

    /// Condition selecting the row whose store-generated key was just assigned.
    fn identity_condition(&self, delimited_key_column: &str) -> String;
}

/// SQL rendering rules for one engine.
#[derive(Clone)]
pub struct Dialect {
    pub(crate) name: String,
    pub(crate) parameters: Arc<dyn ParameterNaming>,
    pub(crate) literals: Arc<dyn LiteralFormatter>,
    pub(crate) identifiers: Arc<dyn IdentifierEscaper>,
    pub(crate) paging: Arc<dyn PagingStrategy>,
    pub(crate) types: Arc<dyn TypeMapping>,
    pub(crate) propagation: Arc<dyn ResultPropagation>,
    pub(crate) concat_operator: String,
    pub(crate) batch_command_separator: String,
    pub(crate) batch_separator: String,
    pub(crate) batching: BatchConfig,
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("name", &self.name)
            .field("concat_operator", &self.concat_operator)
            .field("batching", &self.batching)
            .finish()
    }
}

impl Dialect {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generate_parameter_name(&self, name: &str) -> String {
        self.parameters.parameter_name(name)
    }

    pub fn generate_literal(&self, value: &SqlValue) -> String {
        self.literals.literal(value)
    }

    pub fn escape_literal(&self, text: &str) -> String {
        self.literals.escape_literal(text)
    }

    pub fn escape_identifier(&self, text: &str) -> String {
        self.identifiers.escape_identifier(text)
    }

    pub fn delimit_identifier(&self, name: &str) -> String {
        self.identifiers.delimit_identifier(name)
    }

    pub fn delimit_qualified(&self, name: &str, schema: Option<&str>) -> String {
        match schema {
            Some(schema) => format!(
                "{}.{}",
                self.delimit_identifier(schema),
                self.delimit_identifier(name)
            ),
            None => self.delimit_identifier(name),
        }
    }

    pub fn paging(&self) -> &dyn PagingStrategy {
        self.paging.as_ref()
    }

    pub fn type_mapping(&self) -> &dyn TypeMapping {
        self.types.as_ref()
    }

    pub fn propagation(&self) -> &dyn ResultPropagation {
        self.propagation.as_ref()
    }

    pub fn concat_operator(&self) -> &str {
        &self.concat_operator
    }

    pub fn batch_command_separator(&self) -> &str {
        &self.batch_command_separator
    }

    pub fn batch_separator(&self) -> &str {
        &self.batch_separator
    }

    pub fn batch_config(&self) -> BatchConfig {
        self.batching
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_parameters(mut self, strategy: Arc<dyn ParameterNaming>) -> Self {
        self.parameters = strategy;
        self
    }

    pub fn with_literals(mut self, strategy: Arc<dyn LiteralFormatter>) -> Self {
        self.literals = strategy;
        self
    }

    pub fn with_identifiers(mut self, strategy: Arc<dyn IdentifierEscaper>) -> Self {
        self.identifiers = strategy;
        self
    }

    pub fn with_paging(mut self, strategy: Arc<dyn PagingStrategy>) -> Self {
        self.paging = strategy;
        self
    }

    pub fn with_types(mut self, strategy: Arc<dyn TypeMapping>) -> Self {
        self.types = strategy;
        self
    }

    pub fn with_propagation(mut self, strategy: Arc<dyn ResultPropagation>) -> Self {
        self.propagation = strategy;
        self
    }

    pub fn with_concat_operator(mut self, token: &str) -> Self {
        self.concat_operator = token.to_string();
        self
    }

    pub fn with_batching(mut self, batching: BatchConfig) -> Self {
        self.batching = batching;
        self
    }
}
