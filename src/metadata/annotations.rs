//! Typed annotation storage. Keys are strings of the form `Namespace:Name`; the
//! `Relational` namespace is closed and validated when written, every other
//! namespace is kept as an opaque JSON extension.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::OrmGraphError;

pub const RELATIONAL_PREFIX: &str = "Relational:";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RelationalAnnotation {
    TableName(String),
    Schema(String),
    ColumnName(String),
    ColumnType(String),
    DefaultValueSql(String),
    ConstraintName(String),
    Clustered(bool),
    DiscriminatorValue(String),
}

impl RelationalAnnotation {
    pub fn name(&self) -> &'static str {
        match self {
            RelationalAnnotation::TableName(_) => "TableName",
            RelationalAnnotation::Schema(_) => "Schema",
            RelationalAnnotation::ColumnName(_) => "ColumnName",
            RelationalAnnotation::ColumnType(_) => "ColumnType",
            RelationalAnnotation::DefaultValueSql(_) => "DefaultValueSql",
            RelationalAnnotation::ConstraintName(_) => "ConstraintName",
            RelationalAnnotation::Clustered(_) => "Clustered",
            RelationalAnnotation::DiscriminatorValue(_) => "DiscriminatorValue",
        }
    }

    fn parse(name: &str, value: &Value) -> Result<Self, OrmGraphError> {
        let text = || {
            value
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| shape_error(name, "a string"))
        };
        Ok(match name {
            "TableName" => RelationalAnnotation::TableName(text()?),
            "Schema" => RelationalAnnotation::Schema(text()?),
            "ColumnName" => RelationalAnnotation::ColumnName(text()?),
            "ColumnType" => RelationalAnnotation::ColumnType(text()?),
            "DefaultValueSql" => RelationalAnnotation::DefaultValueSql(text()?),
            "ConstraintName" => RelationalAnnotation::ConstraintName(text()?),
            "DiscriminatorValue" => RelationalAnnotation::DiscriminatorValue(text()?),
            "Clustered" => RelationalAnnotation::Clustered(
                value.as_bool().ok_or_else(|| shape_error(name, "a boolean"))?,
            ),
            other => {
                return Err(OrmGraphError::invalid_argument(format!(
                    "unknown relational annotation '{other}'"
                )));
            }
        })
    }

    fn to_json(&self) -> Value {
        match self {
            RelationalAnnotation::Clustered(flag) => Value::Bool(*flag),
            RelationalAnnotation::TableName(s)
            | RelationalAnnotation::Schema(s)
            | RelationalAnnotation::ColumnName(s)
            | RelationalAnnotation::ColumnType(s)
            | RelationalAnnotation::DefaultValueSql(s)
            | RelationalAnnotation::ConstraintName(s)
            | RelationalAnnotation::DiscriminatorValue(s) => Value::String(s.clone()),
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            RelationalAnnotation::Clustered(_) => None,
            RelationalAnnotation::TableName(s)
            | RelationalAnnotation::Schema(s)
            | RelationalAnnotation::ColumnName(s)
            | RelationalAnnotation::ColumnType(s)
            | RelationalAnnotation::DefaultValueSql(s)
            | RelationalAnnotation::ConstraintName(s)
            | RelationalAnnotation::DiscriminatorValue(s) => Some(s),
        }
    }
}

fn shape_error(name: &str, expected: &str) -> OrmGraphError {
    OrmGraphError::invalid_argument(format!(
        "annotation '{RELATIONAL_PREFIX}{name}' expects {expected}"
    ))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Annotation {
    Relational(RelationalAnnotation),
    Extension { name: String, value: Value },
}

impl Annotation {
    pub fn key(&self) -> String {
        match self {
            Annotation::Relational(rel) => format!("{RELATIONAL_PREFIX}{}", rel.name()),
            Annotation::Extension { name, .. } => name.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Annotation::Relational(rel) => rel.to_json(),
            Annotation::Extension { value, .. } => value.clone(),
        }
    }
}

impl From<RelationalAnnotation> for Annotation {
    fn from(value: RelationalAnnotation) -> Self {
        Annotation::Relational(value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    items: BTreeMap<String, Annotation>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_annotation(&self, key: &str) -> Option<&Annotation> {
        self.items.get(key)
    }

    /// Parses `key` and stores `value`, rejecting malformed relational annotations.
    pub fn set_annotation(&mut self, key: &str, value: Value) -> Result<(), OrmGraphError> {
        if key.trim().is_empty() {
            return Err(OrmGraphError::invalid_argument("annotation key must be set"));
        }
        let annotation = match key.strip_prefix(RELATIONAL_PREFIX) {
            Some(name) => Annotation::Relational(RelationalAnnotation::parse(name, &value)?),
            None => {
                if !key.contains(':') {
                    return Err(OrmGraphError::invalid_argument(format!(
                        "annotation key '{key}' must be namespaced as 'Namespace:Name'"
                    )));
                }
                Annotation::Extension {
                    name: key.to_string(),
                    value,
                }
            }
        };
        self.items.insert(key.to_string(), annotation);
        Ok(())
    }

    pub fn set(&mut self, annotation: impl Into<Annotation>) {
        let annotation = annotation.into();
        self.items.insert(annotation.key(), annotation);
    }

    pub fn remove(&mut self, key: &str) -> Option<Annotation> {
        self.items.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Annotation)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn relational_text(&self, name: &str) -> Option<&str> {
        match self.items.get(&format!("{RELATIONAL_PREFIX}{name}")) {
            Some(Annotation::Relational(rel)) => rel.text(),
            _ => None,
        }
    }

    pub fn table_name(&self) -> Option<&str> {
        self.relational_text("TableName")
    }

    pub fn schema(&self) -> Option<&str> {
        self.relational_text("Schema")
    }

    pub fn column_name(&self) -> Option<&str> {
        self.relational_text("ColumnName")
    }

    pub fn column_type(&self) -> Option<&str> {
        self.relational_text("ColumnType")
    }

    pub fn default_value_sql(&self) -> Option<&str> {
        self.relational_text("DefaultValueSql")
    }

    pub fn constraint_name(&self) -> Option<&str> {
        self.relational_text("ConstraintName")
    }

    pub fn discriminator_value(&self) -> Option<&str> {
        self.relational_text("DiscriminatorValue")
    }

    pub fn clustered(&self) -> Option<bool> {
        match self.items.get(&format!("{RELATIONAL_PREFIX}Clustered")) {
            Some(Annotation::Relational(RelationalAnnotation::Clustered(flag))) => Some(*flag),
            _ => None,
        }
    }
}
