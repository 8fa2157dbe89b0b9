use std::sync::Arc;

use serde::Serialize;

use crate::{
    errors::OrmGraphError,
    sql::{CommandBuilder, CommandBuilderFactory, DefaultCommandBuilderFactory, Dialect, GeneratedSql},
    update::{
        batch::CommandBatch,
        command::{ColumnModification, ModificationCommand},
        entry::EntityState,
    },
};

/// The statement for one command and, when values flow back, the select
/// reading them.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandSql {
    pub statement: GeneratedSql,
    pub read_back: Option<GeneratedSql>,
}

#[derive(Clone)]
pub struct UpdateSqlGenerator<'a> {
    dialect: &'a Dialect,
    factory: Arc<dyn CommandBuilderFactory>,
}

impl<'a> UpdateSqlGenerator<'a> {
    pub fn new(dialect: &'a Dialect) -> Self {
        Self::with_factory(dialect, Arc::new(DefaultCommandBuilderFactory))
    }

    pub fn with_factory(dialect: &'a Dialect, factory: Arc<dyn CommandBuilderFactory>) -> Self {
        Self { dialect, factory }
    }

    pub fn generate(&self, command: &ModificationCommand) -> Result<CommandSql, OrmGraphError> {
        let mut out = self.factory.create();
        match command.state {
            EntityState::Added => self.append_insert(&mut out, command),
            EntityState::Modified => self.append_update(&mut out, command),
            EntityState::Deleted => self.append_delete(&mut out, command),
            EntityState::Unchanged => {
                return Err(OrmGraphError::invalid_argument(
                    "unchanged entries produce no command",
                ));
            }
        }
        Ok(CommandSql {
            statement: out.build(),
            read_back: self.read_back(command),
        })
    }

    /// All statements of a batch as one script, separated by the dialect's
    /// command separator, with the parameters of every command bound once.
    pub fn batch_text(&self, batch: &CommandBatch) -> Result<GeneratedSql, OrmGraphError> {
        let separator = self.dialect.batch_command_separator();
        let mut out = self.factory.create();
        for command in batch.commands() {
            let sql = self.generate(command)?;
            for statement in std::iter::once(sql.statement).chain(sql.read_back) {
                out.append(&statement.text).append(separator).append("\n");
                for parameter in statement.parameters {
                    out.add_parameter(&parameter.name, parameter.value);
                }
            }
        }
        if !self.dialect.batch_separator().is_empty() {
            out.append_line(self.dialect.batch_separator());
        }
        Ok(out.build())
    }

    fn table(&self, command: &ModificationCommand) -> String {
        self.dialect
            .delimit_qualified(&command.table, command.schema.as_deref())
    }

    fn append_insert(&self, out: &mut CommandBuilder, command: &ModificationCommand) {
        out.append("INSERT INTO ").append(&self.table(command));
        let writes: Vec<&ColumnModification> = command.write_columns().collect();
        if writes.is_empty() {
            out.append(" DEFAULT VALUES");
            return;
        }
        out.append(" (");
        for (i, column) in writes.iter().enumerate() {
            if i > 0 {
                out.append(", ");
            }
            out.append(&self.dialect.delimit_identifier(&column.column));
        }
        out.append(") VALUES (");
        for (i, column) in writes.iter().enumerate() {
            if i > 0 {
                out.append(", ");
            }
            self.append_value(out, column);
        }
        out.append(")");
    }

    fn append_update(&self, out: &mut CommandBuilder, command: &ModificationCommand) {
        out.append("UPDATE ").append(&self.table(command)).append(" SET ");
        for (i, column) in command.write_columns().enumerate() {
            if i > 0 {
                out.append(", ");
            }
            out.append(&self.dialect.delimit_identifier(&column.column))
                .append(" = ");
            self.append_value(out, column);
        }
        self.append_conditions(out, command);
    }

    fn append_delete(&self, out: &mut CommandBuilder, command: &ModificationCommand) {
        out.append("DELETE FROM ").append(&self.table(command));
        self.append_conditions(out, command);
    }

    fn append_value(&self, out: &mut CommandBuilder, column: &ColumnModification) {
        match &column.parameter {
            Some(name) => {
                let rendered = self.dialect.generate_parameter_name(name);
                out.append(&rendered);
                out.add_parameter(&rendered, column.value.clone());
            }
            None => {
                out.append(&self.dialect.generate_literal(&column.value));
            }
        }
    }

    fn append_conditions(&self, out: &mut CommandBuilder, command: &ModificationCommand) {
        out.append(" WHERE ");
        for (i, column) in command.condition_columns().enumerate() {
            if i > 0 {
                out.append(" AND ");
            }
            self.append_condition(out, column);
        }
    }

    fn append_condition(&self, out: &mut CommandBuilder, column: &ColumnModification) {
        out.append(&self.dialect.delimit_identifier(&column.column));
        match &column.original_parameter {
            Some(name) => {
                let rendered = self.dialect.generate_parameter_name(name);
                out.append(" = ").append(&rendered);
                out.add_parameter(&rendered, column.original_value.clone());
            }
            None => {
                out.append(" IS NULL");
            }
        }
    }

    fn read_back(&self, command: &ModificationCommand) -> Option<GeneratedSql> {
        if !command.requires_result_propagation() {
            return None;
        }
        let mut out = self.factory.create();
        out.append("SELECT ");
        for (i, column) in command.read_columns().enumerate() {
            if i > 0 {
                out.append(", ");
            }
            out.append(&self.dialect.delimit_identifier(&column.column));
        }
        out.append(" FROM ")
            .append(&self.table(command))
            .append(" WHERE ")
            .append(&self.dialect.propagation().rows_affected_condition());

        let generated_key = command.key_columns().find(|c| c.is_read);
        match generated_key {
            Some(key) if command.state == EntityState::Added => {
                let delimited = self.dialect.delimit_identifier(&key.column);
                out.append(" AND ")
                    .append(&self.dialect.propagation().identity_condition(&delimited));
            }
            _ => {
                for key in command.key_columns() {
                    out.append(" AND ");
                    match command.state {
                        EntityState::Added => {
                            out.append(&self.dialect.delimit_identifier(&key.column))
                                .append(" = ");
                            self.append_value(&mut out, key);
                        }
                        _ => self.append_condition(&mut out, key),
                    }
                }
            }
        }
        Some(out.build())
    }
}
