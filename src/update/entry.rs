use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    errors::OrmGraphError,
    metadata::{EntityId, ForeignKeyId, Model, PropertyId},
    sql::SqlValue,
};

static NULL: SqlValue = SqlValue::Null;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

/// A tracked row: current and original values plus the state deciding which
/// statement it becomes.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityEntry {
    pub entity: EntityId,
    pub state: EntityState,
    pub values: BTreeMap<PropertyId, SqlValue>,
    pub original_values: BTreeMap<PropertyId, SqlValue>,
    pub modified: BTreeSet<PropertyId>,
    /// Properties holding placeholder values until the store assigns real ones.
    pub temporary: BTreeSet<PropertyId>,
    /// Foreign keys whose values come from another entry's key, by entry index.
    pub relationships: Vec<(ForeignKeyId, usize)>,
}

impl EntityEntry {
    pub fn new(entity: EntityId, state: EntityState) -> Self {
        Self {
            entity,
            state,
            values: BTreeMap::new(),
            original_values: BTreeMap::new(),
            modified: BTreeSet::new(),
            temporary: BTreeSet::new(),
            relationships: Vec::new(),
        }
    }

    pub fn added(entity: EntityId) -> Self {
        Self::new(entity, EntityState::Added)
    }

    pub fn modified(entity: EntityId) -> Self {
        Self::new(entity, EntityState::Modified)
    }

    pub fn deleted(entity: EntityId) -> Self {
        Self::new(entity, EntityState::Deleted)
    }

    pub fn with_value(mut self, property: PropertyId, value: impl Into<SqlValue>) -> Self {
        self.values.insert(property, value.into());
        self
    }

    /// Sets a current value by property name, searching the base chain.
    pub fn set(&mut self, model: &Model, name: &str, value: impl Into<SqlValue>) -> Result<(), OrmGraphError> {
        let property = self.resolve(model, name)?;
        self.values.insert(property, value.into());
        Ok(())
    }

    /// Records the value loaded from the store for a property.
    pub fn set_original(
        &mut self,
        model: &Model,
        name: &str,
        value: impl Into<SqlValue>,
    ) -> Result<(), OrmGraphError> {
        let property = self.resolve(model, name)?;
        self.original_values.insert(property, value.into());
        Ok(())
    }

    /// Sets a new current value and flags the property as modified.
    pub fn update(&mut self, model: &Model, name: &str, value: impl Into<SqlValue>) -> Result<(), OrmGraphError> {
        let property = self.resolve(model, name)?;
        self.values.insert(property, value.into());
        self.modified.insert(property);
        Ok(())
    }

    /// Points `fk` at the entry stored at `principal` in the same operation.
    pub fn relate(mut self, fk: ForeignKeyId, principal: usize) -> Self {
        self.relationships.push((fk, principal));
        self
    }

    pub fn current(&self, property: PropertyId) -> &SqlValue {
        self.values.get(&property).unwrap_or(&NULL)
    }

    /// Original value, falling back to the current one when none was recorded.
    pub fn original(&self, property: PropertyId) -> &SqlValue {
        self.original_values
            .get(&property)
            .unwrap_or_else(|| self.current(property))
    }

    pub fn is_modified(&self, property: PropertyId) -> bool {
        self.modified.contains(&property)
    }

    pub fn is_temporary(&self, property: PropertyId) -> bool {
        self.temporary.contains(&property)
    }

    /// Values of `properties` as they identify the row in the store.
    pub fn store_values(&self, properties: &[PropertyId]) -> Vec<SqlValue> {
        properties
            .iter()
            .map(|p| match self.state {
                EntityState::Added => self.current(*p).clone(),
                _ => self.original(*p).clone(),
            })
            .collect()
    }

    fn resolve(&self, model: &Model, name: &str) -> Result<PropertyId, OrmGraphError> {
        model
            .find_property(self.entity, name)
            .map(|p| p.id)
            .ok_or_else(|| {
                let owner = model
                    .entity(self.entity)
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                OrmGraphError::not_found(format!("property '{name}' on entity '{owner}'"))
            })
    }
}

/// Stable text form of key values, usable as a map key.
pub(crate) fn identity_key(values: &[SqlValue]) -> String {
    serde_json::to_string(values).unwrap_or_default()
}
