use serde::Serialize;

use crate::{
    conventions::DISCRIMINATOR_PROPERTY,
    errors::OrmGraphError,
    metadata::{EntityId, Model, PropertyId, ValueGenerated, ValueType},
    sql::SqlValue,
    update::entry::{EntityEntry, EntityState},
};

/// Hands out `p0`, `p1`, ... for one save operation.
#[derive(Clone, Debug, Default)]
pub struct ParameterNameGenerator {
    next: usize,
}

impl ParameterNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self) -> String {
        let name = format!("p{}", self.next);
        self.next += 1;
        name
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}

/// How one column takes part in a command.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnModification {
    pub property: PropertyId,
    pub column: String,
    pub value_type: ValueType,
    pub is_key: bool,
    /// Compared against the original value in the `WHERE` clause.
    pub is_condition: bool,
    /// Read back from the store after the statement runs.
    pub is_read: bool,
    /// Sent to the store.
    pub is_write: bool,
    pub value: SqlValue,
    pub original_value: SqlValue,
    pub parameter: Option<String>,
    pub original_parameter: Option<String>,
}

impl ColumnModification {
    fn new(model: &Model, entry: &EntityEntry, property: PropertyId, is_key: bool) -> Result<Self, OrmGraphError> {
        let meta = model.property(property)?;
        Ok(Self {
            property,
            column: model.column_name(property)?,
            value_type: meta.value_type,
            is_key,
            is_condition: false,
            is_read: false,
            is_write: false,
            value: entry.current(property).clone(),
            original_value: entry.original(property).clone(),
            parameter: None,
            original_parameter: None,
        })
    }

    fn assign_parameters(&mut self, names: &mut ParameterNameGenerator) {
        if self.is_write {
            self.parameter = Some(names.generate());
        }
        if self.is_condition && !self.original_value.is_null() {
            self.original_parameter = Some(names.generate());
        }
    }
}

/// One row-level `INSERT`, `UPDATE` or `DELETE`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModificationCommand {
    pub entity: EntityId,
    /// Index of the entry this command was built from.
    pub entry: usize,
    pub state: EntityState,
    pub table: String,
    pub schema: Option<String>,
    pub columns: Vec<ColumnModification>,
}

impl ModificationCommand {
    pub fn from_entry(
        model: &Model,
        entry: &EntityEntry,
        index: usize,
        names: &mut ParameterNameGenerator,
    ) -> Result<Self, OrmGraphError> {
        if entry.state == EntityState::Unchanged {
            return Err(OrmGraphError::invalid_argument(
                "unchanged entries produce no command",
            ));
        }
        let entity = model.entity(entry.entity)?;
        let key = model.primary_key(entry.entity).ok_or_else(|| {
            OrmGraphError::invalid_model(format!("entity '{}' has no primary key", entity.name))
        })?;

        let mut columns = Vec::new();
        for property in model.properties(entry.entity) {
            let is_key = key.properties.contains(&property.id);
            let mut column = ColumnModification::new(model, entry, property.id, is_key)?;
            let store_computed = matches!(
                property.value_generated,
                ValueGenerated::OnAddOrUpdate | ValueGenerated::Always
            );
            match entry.state {
                EntityState::Added => {
                    if property.name == DISCRIMINATOR_PROPERTY && column.value.is_null() {
                        column.value = SqlValue::Text(
                            entity
                                .annotations
                                .discriminator_value()
                                .unwrap_or(entity.name.as_str())
                                .to_string(),
                        );
                    }
                    let missing = column.value.is_null();
                    if is_key {
                        column.is_read = entry.is_temporary(property.id)
                            || (property.value_generated != ValueGenerated::Never && missing);
                    } else {
                        column.is_read = store_computed
                            || (property.value_generated == ValueGenerated::OnAdd && missing);
                    }
                    column.is_write = !column.is_read;
                }
                EntityState::Modified => {
                    if is_key {
                        if entry.is_modified(property.id) {
                            return Err(OrmGraphError::invalid_argument(format!(
                                "key property '{}' of entity '{}' cannot be modified",
                                property.name, entity.name
                            )));
                        }
                        column.is_condition = true;
                    } else {
                        column.is_write = entry.is_modified(property.id) && !store_computed;
                        column.is_condition = property.concurrency_token;
                        column.is_read = store_computed;
                    }
                }
                EntityState::Deleted => {
                    column.is_condition = is_key || property.concurrency_token;
                }
                EntityState::Unchanged => {}
            }
            if column.is_key || column.is_condition || column.is_read || column.is_write {
                column.assign_parameters(names);
                columns.push(column);
            }
        }

        Ok(Self {
            entity: entry.entity,
            entry: index,
            state: entry.state,
            table: model.table_name(entry.entity)?,
            schema: model.schema(entry.entity)?,
            columns,
        })
    }

    pub fn write_columns(&self) -> impl Iterator<Item = &ColumnModification> + '_ {
        self.columns.iter().filter(|c| c.is_write)
    }

    pub fn condition_columns(&self) -> impl Iterator<Item = &ColumnModification> + '_ {
        self.columns.iter().filter(|c| c.is_condition)
    }

    pub fn read_columns(&self) -> impl Iterator<Item = &ColumnModification> + '_ {
        self.columns.iter().filter(|c| c.is_read)
    }

    pub fn key_columns(&self) -> impl Iterator<Item = &ColumnModification> + '_ {
        self.columns.iter().filter(|c| c.is_key)
    }

    pub fn column(&self, property: PropertyId) -> Option<&ColumnModification> {
        self.columns.iter().find(|c| c.property == property)
    }

    pub fn column_mut(&mut self, property: PropertyId) -> Option<&mut ColumnModification> {
        self.columns.iter_mut().find(|c| c.property == property)
    }

    pub fn requires_result_propagation(&self) -> bool {
        self.columns.iter().any(|c| c.is_read)
    }

    pub fn parameter_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| usize::from(c.parameter.is_some()) + usize::from(c.original_parameter.is_some()))
            .sum()
    }

    /// A modified entry with nothing to write.
    pub fn is_noop(&self) -> bool {
        self.state == EntityState::Modified && !self.columns.iter().any(|c| c.is_write)
    }
}
