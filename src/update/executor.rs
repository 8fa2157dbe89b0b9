use ahash::AHashMap;
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    connection::Connection,
    errors::OrmGraphError,
    metadata::{Model, PropertyId},
    sql::{Dialect, GeneratedSql, SqlValue},
    update::{
        batch::CommandBatch,
        command::ModificationCommand,
        entry::{EntityEntry, identity_key},
        sql::UpdateSqlGenerator,
    },
};

const TARGET: &str = "ormgraph::update";

/// A store-assigned value read back after a command.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PropagatedValue {
    pub entry: usize,
    pub property: PropertyId,
    pub value: SqlValue,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SaveResult {
    pub batches: usize,
    pub commands: usize,
    pub rows_affected: usize,
    pub propagated: Vec<PropagatedValue>,
}

impl SaveResult {
    /// Writes propagated values back into the entries they came from.
    pub fn apply(&self, entries: &mut [EntityEntry]) {
        for value in &self.propagated {
            if let Some(entry) = entries.get_mut(value.entry) {
                entry.values.insert(value.property, value.value.clone());
                entry.temporary.remove(&value.property);
            }
        }
    }
}

/// Runs planned batches one command at a time, checking that every command
/// touched exactly one row. A batch is the unit of logging and counting; the
/// connection sees one statement per call.
pub struct BatchExecutor<'a> {
    model: &'a Model,
    dialect: &'a Dialect,
    sensitive_data_logging: bool,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(model: &'a Model, dialect: &'a Dialect) -> Self {
        Self {
            model,
            dialect,
            sensitive_data_logging: false,
        }
    }

    pub fn with_sensitive_data_logging(mut self, enabled: bool) -> Self {
        self.sensitive_data_logging = enabled;
        self
    }

    pub fn execute(
        &self,
        batches: &[CommandBatch],
        connection: &mut dyn Connection,
    ) -> Result<SaveResult, OrmGraphError> {
        let generator = UpdateSqlGenerator::new(self.dialect);
        // temporary key values already replaced by the store, by key property
        let mut replaced: AHashMap<(PropertyId, String), SqlValue> = AHashMap::new();
        let mut result = SaveResult::default();

        for (index, batch) in batches.iter().enumerate() {
            debug!(target: TARGET, batch = index, commands = batch.len(), "executing batch");
            for command in batch.commands() {
                let mut command = command.clone();
                for (property, value) in self.fix_up(&mut command, &replaced)? {
                    result.propagated.push(PropagatedValue {
                        entry: command.entry,
                        property,
                        value,
                    });
                }
                let sql = generator.generate(&command)?;

                self.log(&sql.statement);
                let affected = connection.execute(&sql.statement.text, &sql.statement.parameters)?;
                if affected != 1 {
                    return Err(OrmGraphError::ConcurrencyConflict {
                        expected: 1,
                        actual: affected,
                    });
                }
                result.rows_affected += affected;
                result.commands += 1;

                if let Some(read_back) = &sql.read_back {
                    self.log(read_back);
                    let rows = connection.query(&read_back.text, &read_back.parameters)?;
                    let [row] = rows.as_slice() else {
                        return Err(OrmGraphError::ConcurrencyConflict {
                            expected: 1,
                            actual: rows.len(),
                        });
                    };
                    for (column, value) in command.read_columns().zip(row) {
                        let value = value.clone().coerce(column.value_type);
                        if column.is_key && !column.value.is_null() {
                            replaced.insert(
                                (column.property, identity_key(&[column.value.clone()])),
                                value.clone(),
                            );
                        }
                        result.propagated.push(PropagatedValue {
                            entry: command.entry,
                            property: column.property,
                            value,
                        });
                    }
                }
            }
            result.batches += 1;
        }
        debug!(
            target: TARGET,
            commands = result.commands,
            rows = result.rows_affected,
            "save completed"
        );
        Ok(result)
    }

    /// Swaps temporary key values for the ones the store assigned, in the
    /// command's own keys and in foreign keys pointing at them. Returns the
    /// current values that changed.
    fn fix_up(
        &self,
        command: &mut ModificationCommand,
        replaced: &AHashMap<(PropertyId, String), SqlValue>,
    ) -> Result<Vec<(PropertyId, SqlValue)>, OrmGraphError> {
        let mut changed = Vec::new();
        if replaced.is_empty() {
            return Ok(changed);
        }
        let mut targets: Vec<(PropertyId, PropertyId)> = command
            .columns
            .iter()
            .map(|c| (c.property, c.property))
            .collect();
        for owner in self.model.base_chain(command.entity) {
            for fk in self.model.foreign_keys(owner) {
                let key = self.model.key(fk.principal_key)?;
                targets.extend(fk.properties.iter().copied().zip(key.properties.iter().copied()));
            }
        }
        for (property, key_property) in targets {
            let Some(column) = command.column_mut(property) else {
                continue;
            };
            if let Some(real) = replaced.get(&(key_property, identity_key(&[column.value.clone()]))) {
                column.value = real.clone();
                changed.push((property, real.clone()));
            }
            if let Some(real) =
                replaced.get(&(key_property, identity_key(&[column.original_value.clone()])))
            {
                column.original_value = real.clone();
            }
        }
        Ok(changed)
    }

    fn log(&self, sql: &GeneratedSql) {
        if self.sensitive_data_logging {
            trace!(target: TARGET, sql = %sql.text, parameters = ?sql.parameters, "command");
        } else {
            trace!(target: TARGET, sql = %sql.text, parameters = sql.parameters.len(), "command");
        }
    }
}
