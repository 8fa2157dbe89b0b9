use std::sync::Arc;

use tracing::trace;

use crate::{
    errors::OrmGraphError,
    sql::{
        builder::{CommandBuilder, CommandBuilderFactory, DefaultCommandBuilderFactory, GeneratedSql},
        dialect::Dialect,
        expression::{
            BinaryOperator, JoinKind, Projection, SelectExpression, SqlExpression, TableExpression,
        },
    },
};

const TARGET: &str = "ormgraph::sql";

/// Renders [`SelectExpression`]s with the rules of one [`Dialect`].
#[derive(Clone)]
pub struct SqlGenerator<'a> {
    dialect: &'a Dialect,
    factory: Arc<dyn CommandBuilderFactory>,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(dialect: &'a Dialect) -> Self {
        Self::with_factory(dialect, Arc::new(DefaultCommandBuilderFactory))
    }

    pub fn with_factory(dialect: &'a Dialect, factory: Arc<dyn CommandBuilderFactory>) -> Self {
        Self { dialect, factory }
    }

    pub fn dialect(&self) -> &Dialect {
        self.dialect
    }

    pub fn generate(&self, select: &SelectExpression) -> Result<GeneratedSql, OrmGraphError> {
        let mut builder = self.factory.create();
        self.write_select(&mut builder, select)?;
        let generated = builder.build();
        trace!(target: TARGET, sql = %generated.text, "select generated");
        Ok(generated)
    }

    /// Renders a standalone expression, binding any parameters it holds.
    pub fn generate_expression(&self, expression: &SqlExpression) -> GeneratedSql {
        let mut builder = self.factory.create();
        self.write_expression(&mut builder, expression);
        builder.build()
    }

    pub(crate) fn write_select(
        &self,
        out: &mut CommandBuilder,
        select: &SelectExpression,
    ) -> Result<(), OrmGraphError> {
        let plan = self
            .dialect
            .paging()
            .plan(select.limit, select.offset, !select.order_by.is_empty())?;
        out.append("SELECT ");
        if select.distinct {
            out.append("DISTINCT ");
        }
        if let Some(leading) = &plan.leading {
            out.append(leading).append(" ");
        }
        if select.projection.is_empty() {
            out.append("*");
        }
        for (i, projection) in select.projection.iter().enumerate() {
            if i > 0 {
                out.append(", ");
            }
            self.write_projection(out, projection);
        }
        out.append(" FROM ");
        self.write_table(out, &select.from)?;
        for join in &select.joins {
            out.append(match join.kind {
                JoinKind::Inner => " INNER JOIN ",
                JoinKind::LeftOuter => " LEFT JOIN ",
            });
            self.write_table(out, &join.table)?;
            out.append(" ON ");
            self.write_expression(out, &join.on);
        }
        if let Some(predicate) = &select.predicate {
            out.append(" WHERE ");
            self.write_expression(out, predicate);
        }
        if !select.order_by.is_empty() {
            out.append(" ORDER BY ");
            for (i, ordering) in select.order_by.iter().enumerate() {
                if i > 0 {
                    out.append(", ");
                }
                self.write_expression(out, &ordering.expression);
                if ordering.descending {
                    out.append(" DESC");
                }
            }
        } else if let Some(order) = &plan.synthetic_order {
            out.append(" ORDER BY ").append(order);
        }
        if let Some(trailing) = &plan.trailing {
            out.append(" ").append(trailing);
        }
        Ok(())
    }

    fn write_projection(&self, out: &mut CommandBuilder, projection: &Projection) {
        self.write_expression(out, &projection.expression);
        if let Some(alias) = &projection.alias {
            out.append(" AS ")
                .append(&self.dialect.delimit_identifier(alias));
        }
    }

    fn write_table(&self, out: &mut CommandBuilder, table: &TableExpression) -> Result<(), OrmGraphError> {
        match table {
            TableExpression::Table {
                name,
                schema,
                alias,
            } => {
                out.append(&self.dialect.delimit_qualified(name, schema.as_deref()));
                out.append(" AS ").append(&self.dialect.delimit_identifier(alias));
            }
            TableExpression::Subquery { select, alias } => {
                out.append("(");
                self.write_select(out, select)?;
                out.append(") AS ").append(&self.dialect.delimit_identifier(alias));
            }
        }
        Ok(())
    }

    pub(crate) fn write_expression(&self, out: &mut CommandBuilder, expression: &SqlExpression) {
        match expression {
            SqlExpression::Column { table, name, .. } => {
                if let Some(table) = table {
                    out.append(&self.dialect.delimit_identifier(table)).append(".");
                }
                out.append(&self.dialect.delimit_identifier(name));
            }
            SqlExpression::Literal(value) => {
                out.append(&self.dialect.generate_literal(value));
            }
            SqlExpression::Parameter { name, value } => {
                let rendered = self.dialect.generate_parameter_name(name);
                out.append(&rendered);
                out.add_parameter(&rendered, value.clone());
            }
            SqlExpression::Binary { op, left, right } => {
                if matches!(op, BinaryOperator::Equal | BinaryOperator::NotEqual) {
                    let operand = if right.is_null_literal() {
                        Some(left)
                    } else if left.is_null_literal() {
                        Some(right)
                    } else {
                        None
                    };
                    if let Some(operand) = operand {
                        self.write_operand(out, operand, 4);
                        out.append(if *op == BinaryOperator::Equal {
                            " IS NULL"
                        } else {
                            " IS NOT NULL"
                        });
                        return;
                    }
                }
                let token = op.token().unwrap_or(self.dialect.concat_operator());
                self.write_child(out, *op, left, false);
                out.append(" ").append(token).append(" ");
                self.write_child(out, *op, right, true);
            }
            SqlExpression::Not(inner) => {
                out.append("NOT ");
                self.write_operand(out, inner, 3);
            }
            SqlExpression::IsNull(inner) => {
                self.write_operand(out, inner, 4);
                out.append(" IS NULL");
            }
            SqlExpression::IsNotNull(inner) => {
                self.write_operand(out, inner, 4);
                out.append(" IS NOT NULL");
            }
            SqlExpression::Function { name, args } => {
                out.append(name).append("(");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.append(", ");
                    }
                    self.write_expression(out, arg);
                }
                out.append(")");
            }
            SqlExpression::Star { table } => {
                if let Some(table) = table {
                    out.append(&self.dialect.delimit_identifier(table)).append(".");
                }
                out.append("*");
            }
        }
    }

    fn write_child(
        &self,
        out: &mut CommandBuilder,
        parent: BinaryOperator,
        child: &SqlExpression,
        right: bool,
    ) {
        let wrap = match child {
            // Dialects disagree on where concatenation binds relative to arithmetic.
            SqlExpression::Binary { op, .. }
                if parent == BinaryOperator::Concat && *op != BinaryOperator::Concat =>
            {
                true
            }
            SqlExpression::Binary { op, .. } => {
                op.precedence() < parent.precedence()
                    || (op.precedence() == parent.precedence()
                        && (parent.is_comparison()
                            || (right && !(parent.is_associative() && *op == parent))))
            }
            SqlExpression::Not(_) | SqlExpression::IsNull(_) | SqlExpression::IsNotNull(_) => {
                parent.precedence() >= 3
            }
            _ => false,
        };
        self.wrap(out, child, wrap);
    }

    fn write_operand(&self, out: &mut CommandBuilder, operand: &SqlExpression, binding: u8) {
        let wrap = match operand {
            SqlExpression::Binary { op, .. } => op.precedence() <= binding,
            SqlExpression::Not(_) | SqlExpression::IsNull(_) | SqlExpression::IsNotNull(_) => true,
            _ => false,
        };
        self.wrap(out, operand, wrap);
    }

    fn wrap(&self, out: &mut CommandBuilder, expression: &SqlExpression, wrap: bool) {
        if wrap {
            out.append("(");
        }
        self.write_expression(out, expression);
        if wrap {
            out.append(")");
        }
    }
}
