//! Source declarations of entity shapes, deserializable from JSON.

use serde::{Deserialize, Serialize};

use crate::{errors::OrmGraphError, metadata::types::ValueType};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDeclaration {
    pub entities: Vec<EntityDeclaration>,
}

impl ModelDeclaration {
    pub fn from_json_str(input: &str) -> Result<Self, OrmGraphError> {
        serde_json::from_str(input)
            .map_err(|e| OrmGraphError::invalid_argument(format!("model declaration: {e}")))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDeclaration {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDeclaration>,
    #[serde(default)]
    pub references: Vec<ReferenceDeclaration>,
    #[serde(default)]
    pub ignored: Vec<String>,
}

impl EntityDeclaration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn property(mut self, name: &str, value_type: ValueType) -> Self {
        self.properties.push(PropertyDeclaration::new(name, value_type));
        self
    }

    pub fn nullable(mut self, name: &str, value_type: ValueType) -> Self {
        let mut property = PropertyDeclaration::new(name, value_type);
        property.nullable = true;
        self.properties.push(property);
        self
    }

    pub fn reference(mut self, reference: ReferenceDeclaration) -> Self {
        self.references.push(reference);
        self
    }

    pub fn base(mut self, base: &str) -> Self {
        self.base = Some(base.to_string());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub concurrency_token: bool,
    #[serde(default)]
    pub column: Option<String>,
}

impl PropertyDeclaration {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            nullable: false,
            key: false,
            concurrency_token: false,
            column: None,
        }
    }
}

/// A navigation declared on an entity. A reference makes the declaring entity
/// the dependent; a collection makes it the principal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDeclaration {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub inverse: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl ReferenceDeclaration {
    pub fn reference(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            collection: false,
            inverse: None,
            required: false,
        }
    }

    pub fn collection(name: &str, target: &str) -> Self {
        Self {
            collection: true,
            ..Self::reference(name, target)
        }
    }

    pub fn inverse(mut self, name: &str) -> Self {
        self.inverse = Some(name.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}
