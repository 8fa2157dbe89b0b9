//! Logical SQL tree rendered by [`crate::sql::generator::SqlGenerator`].

use serde::{Deserialize, Serialize};

use crate::{metadata::ValueType, sql::value::SqlValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    /// String concatenation; the token comes from the dialect.
    Concat,
}

impl BinaryOperator {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Equal
            | BinaryOperator::NotEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual => 4,
            BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Concat => 5,
            BinaryOperator::Multiply | BinaryOperator::Divide | BinaryOperator::Modulo => 6,
        }
    }

    /// Fixed token, `None` for [`BinaryOperator::Concat`].
    pub fn token(self) -> Option<&'static str> {
        Some(match self {
            BinaryOperator::Or => "OR",
            BinaryOperator::And => "AND",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Concat => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        self.precedence() == 4
    }

    /// Whether `a op (b op c)` equals `(a op b) op c`.
    pub fn is_associative(self) -> bool {
        matches!(
            self,
            BinaryOperator::Or
                | BinaryOperator::And
                | BinaryOperator::Add
                | BinaryOperator::Multiply
                | BinaryOperator::Concat
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SqlExpression {
    Column {
        table: Option<String>,
        name: String,
        value_type: ValueType,
    },
    Literal(SqlValue),
    Parameter {
        name: String,
        value: SqlValue,
    },
    Binary {
        op: BinaryOperator,
        left: Box<SqlExpression>,
        right: Box<SqlExpression>,
    },
    Not(Box<SqlExpression>),
    IsNull(Box<SqlExpression>),
    IsNotNull(Box<SqlExpression>),
    Function {
        name: String,
        args: Vec<SqlExpression>,
    },
    Star {
        table: Option<String>,
    },
}

impl SqlExpression {
    pub fn column(table: Option<&str>, name: &str, value_type: ValueType) -> Self {
        SqlExpression::Column {
            table: table.map(str::to_string),
            name: name.to_string(),
            value_type,
        }
    }

    pub fn literal(value: impl Into<SqlValue>) -> Self {
        SqlExpression::Literal(value.into())
    }

    pub fn parameter(name: &str, value: impl Into<SqlValue>) -> Self {
        SqlExpression::Parameter {
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn binary(op: BinaryOperator, left: SqlExpression, right: SqlExpression) -> Self {
        SqlExpression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: SqlExpression, right: SqlExpression) -> Self {
        Self::binary(BinaryOperator::Equal, left, right)
    }

    pub fn and(left: SqlExpression, right: SqlExpression) -> Self {
        Self::binary(BinaryOperator::And, left, right)
    }

    pub fn or(left: SqlExpression, right: SqlExpression) -> Self {
        Self::binary(BinaryOperator::Or, left, right)
    }

    /// Arithmetic addition, or concatenation when both sides are strings.
    pub fn add(left: SqlExpression, right: SqlExpression) -> Self {
        let op = if left.is_textual() && right.is_textual() {
            BinaryOperator::Concat
        } else {
            BinaryOperator::Add
        };
        Self::binary(op, left, right)
    }

    pub fn not(inner: SqlExpression) -> Self {
        SqlExpression::Not(Box::new(inner))
    }

    pub fn is_null(inner: SqlExpression) -> Self {
        SqlExpression::IsNull(Box::new(inner))
    }

    pub fn is_not_null(inner: SqlExpression) -> Self {
        SqlExpression::IsNotNull(Box::new(inner))
    }

    pub fn function(name: &str, args: Vec<SqlExpression>) -> Self {
        SqlExpression::Function {
            name: name.to_string(),
            args,
        }
    }

    /// Folds predicates with AND; `None` when the input is empty.
    pub fn all(predicates: impl IntoIterator<Item = SqlExpression>) -> Option<Self> {
        predicates.into_iter().reduce(Self::and)
    }

    pub fn is_textual(&self) -> bool {
        match self {
            SqlExpression::Column { value_type, .. } => value_type.is_textual(),
            SqlExpression::Literal(value) | SqlExpression::Parameter { value, .. } => {
                value.is_text()
            }
            SqlExpression::Binary { op, .. } => *op == BinaryOperator::Concat,
            _ => false,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self, SqlExpression::Literal(SqlValue::Null))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub expression: SqlExpression,
    pub alias: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ordering {
    pub expression: SqlExpression,
    pub descending: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TableExpression {
    Table {
        name: String,
        schema: Option<String>,
        alias: String,
    },
    Subquery {
        select: Box<SelectExpression>,
        alias: String,
    },
}

impl TableExpression {
    pub fn table(name: &str, schema: Option<&str>, alias: &str) -> Self {
        TableExpression::Table {
            name: name.to_string(),
            schema: schema.map(str::to_string),
            alias: alias.to_string(),
        }
    }

    pub fn alias(&self) -> &str {
        match self {
            TableExpression::Table { alias, .. } | TableExpression::Subquery { alias, .. } => alias,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinExpression {
    pub kind: JoinKind,
    pub table: TableExpression,
    pub on: SqlExpression,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectExpression {
    pub projection: Vec<Projection>,
    pub distinct: bool,
    pub from: TableExpression,
    pub joins: Vec<JoinExpression>,
    pub predicate: Option<SqlExpression>,
    pub order_by: Vec<Ordering>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectExpression {
    pub fn from(table: TableExpression) -> Self {
        Self {
            projection: Vec::new(),
            distinct: false,
            from: table,
            joins: Vec::new(),
            predicate: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn project(&mut self, expression: SqlExpression, alias: Option<&str>) -> &mut Self {
        self.projection.push(Projection {
            expression,
            alias: alias.map(str::to_string),
        });
        self
    }

    pub fn join(&mut self, kind: JoinKind, table: TableExpression, on: SqlExpression) -> &mut Self {
        self.joins.push(JoinExpression { kind, table, on });
        self
    }

    /// ANDs `predicate` onto the existing filter.
    pub fn filter(&mut self, predicate: SqlExpression) -> &mut Self {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => SqlExpression::and(existing, predicate),
            None => predicate,
        });
        self
    }

    pub fn order_by(&mut self, expression: SqlExpression, descending: bool) -> &mut Self {
        self.order_by.push(Ordering {
            expression,
            descending,
        });
        self
    }

    pub fn limit(&mut self, limit: Option<u64>) -> &mut Self {
        self.limit = limit;
        self
    }

    pub fn offset(&mut self, offset: Option<u64>) -> &mut Self {
        self.offset = offset;
        self
    }

    pub fn is_paged(&self) -> bool {
        self.limit.is_some() || self.offset.is_some()
    }
}
