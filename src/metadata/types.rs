use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metadata::annotations::Annotations;

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub(crate) usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(EntityId, "entity");
arena_id!(PropertyId, "property");
arena_id!(KeyId, "key");
arena_id!(ForeignKeyId, "foreign-key");
arena_id!(NavigationId, "navigation");

/// Declared value type of a property. Nullability is tracked separately.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Bool,
    Int32,
    Int64,
    Float64,
    Decimal,
    Text,
    Bytes,
    DateTime,
    DateTimeOffset,
    Guid,
}

impl ValueType {
    pub fn is_integer(self) -> bool {
        matches!(self, ValueType::Int32 | ValueType::Int64)
    }

    pub fn is_textual(self) -> bool {
        matches!(self, ValueType::Text)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueGenerated {
    #[default]
    Never,
    OnAdd,
    OnAddOrUpdate,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NavigationDirection {
    PrincipalToDependent,
    DependentToPrincipal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    Reference,
    Collection,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    #[default]
    Restrict,
    Cascade,
    SetNull,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub properties: Vec<PropertyId>,
    pub primary_key: Option<KeyId>,
    pub keys: Vec<KeyId>,
    pub foreign_keys: Vec<ForeignKeyId>,
    pub navigations: Vec<NavigationId>,
    pub base: Option<EntityId>,
    pub ignored: Vec<String>,
    pub annotations: Annotations,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub entity: EntityId,
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
    pub value_generated: ValueGenerated,
    pub concurrency_token: bool,
    /// Position within the declaring entity's property list.
    pub index: usize,
    pub shadow: bool,
    pub annotations: Annotations,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub id: KeyId,
    pub entity: EntityId,
    pub properties: Vec<PropertyId>,
    pub annotations: Annotations,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub id: ForeignKeyId,
    pub dependent: EntityId,
    pub properties: Vec<PropertyId>,
    pub principal: EntityId,
    pub principal_key: KeyId,
    pub dependent_to_principal: Option<NavigationId>,
    pub principal_to_dependent: Option<NavigationId>,
    pub unique: bool,
    pub required: bool,
    pub delete_behavior: DeleteBehavior,
    pub annotations: Annotations,
}

impl ForeignKey {
    pub fn is_self_referencing(&self) -> bool {
        self.dependent == self.principal
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    pub id: NavigationId,
    pub name: String,
    pub entity: EntityId,
    pub foreign_key: ForeignKeyId,
    pub direction: NavigationDirection,
    pub cardinality: Cardinality,
    pub annotations: Annotations,
}

impl Navigation {
    pub fn points_to_principal(&self) -> bool {
        self.direction == NavigationDirection::DependentToPrincipal
    }

    pub fn is_collection(&self) -> bool {
        self.cardinality == Cardinality::Collection
    }
}

/// Addresses any annotatable element of the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataItem {
    Model,
    Entity(EntityId),
    Property(PropertyId),
    Key(KeyId),
    ForeignKey(ForeignKeyId),
    Navigation(NavigationId),
}
