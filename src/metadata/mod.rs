//! Entity metadata: typed ids, annotations, the arena model and its validators.

pub mod annotations;
pub mod declaration;
pub mod model;
pub mod types;
pub mod validate;

pub use annotations::{Annotation, Annotations, RELATIONAL_PREFIX, RelationalAnnotation};
pub use declaration::{
    EntityDeclaration, ModelDeclaration, PropertyDeclaration, ReferenceDeclaration,
};
pub use model::{MAX_INHERITANCE_DEPTH, Model};
pub use types::{
    Cardinality, DeleteBehavior, Entity, EntityId, ForeignKey, ForeignKeyId, Key, KeyId,
    MetadataItem, Navigation, NavigationDirection, NavigationId, Property, PropertyId,
    ValueGenerated, ValueType,
};
pub use validate::{CoreModelValidator, ModelValidator, RelationalModelValidator, validate};
