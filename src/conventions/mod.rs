//! Convention pipeline. Builder mutations push [`ConventionEvent`]s that are
//! drained depth-first: events raised while a convention runs are fully
//! processed before the next convention registered for the outer event.

pub mod builtin;

use std::{collections::VecDeque, fmt, sync::Arc};

use ahash::AHashMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    errors::OrmGraphError,
    metadata::{
        Annotation, EntityDeclaration, EntityId, ForeignKeyId, KeyId, MetadataItem, Model,
        ModelDeclaration, NavigationDirection, NavigationId, PropertyId, ValueGenerated,
        ValueType,
    },
    naming::UniqueNamer,
};

pub use builtin::{
    DISCRIMINATOR_PROPERTY,
    DiscriminatorConvention, ForeignKeyPropertyDiscoveryConvention, IgnoredMemberConvention,
    KeyDiscoveryConvention, RequiredForeignKeyConvention, TableNameConvention,
    ValidationConvention, ValueGenerationConvention,
};

const TARGET: &str = "ormgraph::conventions";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConventionPoint {
    EntityAdded,
    PropertyAdded,
    PropertyNullabilityChanged,
    KeyAdded,
    PrimaryKeySet,
    ForeignKeyAdded,
    ForeignKeyRemoved,
    NavigationAdded,
    NavigationRemoved,
    BaseTypeSet,
    MemberIgnored,
    ModelBuilt,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConventionEvent {
    EntityAdded(EntityId),
    PropertyAdded(PropertyId),
    PropertyNullabilityChanged(PropertyId),
    KeyAdded(KeyId),
    PrimaryKeySet {
        entity: EntityId,
        key: KeyId,
    },
    ForeignKeyAdded(ForeignKeyId),
    ForeignKeyRemoved {
        dependent: EntityId,
        principal: EntityId,
        properties: Vec<PropertyId>,
    },
    NavigationAdded(NavigationId),
    NavigationRemoved {
        entity: EntityId,
        name: String,
    },
    BaseTypeSet {
        entity: EntityId,
        previous: Option<EntityId>,
    },
    MemberIgnored {
        entity: EntityId,
        name: String,
    },
    ModelBuilt,
}

impl ConventionEvent {
    pub fn point(&self) -> ConventionPoint {
        match self {
            ConventionEvent::EntityAdded(_) => ConventionPoint::EntityAdded,
            ConventionEvent::PropertyAdded(_) => ConventionPoint::PropertyAdded,
            ConventionEvent::PropertyNullabilityChanged(_) => {
                ConventionPoint::PropertyNullabilityChanged
            }
            ConventionEvent::KeyAdded(_) => ConventionPoint::KeyAdded,
            ConventionEvent::PrimaryKeySet { .. } => ConventionPoint::PrimaryKeySet,
            ConventionEvent::ForeignKeyAdded(_) => ConventionPoint::ForeignKeyAdded,
            ConventionEvent::ForeignKeyRemoved { .. } => ConventionPoint::ForeignKeyRemoved,
            ConventionEvent::NavigationAdded(_) => ConventionPoint::NavigationAdded,
            ConventionEvent::NavigationRemoved { .. } => ConventionPoint::NavigationRemoved,
            ConventionEvent::BaseTypeSet { .. } => ConventionPoint::BaseTypeSet,
            ConventionEvent::MemberIgnored { .. } => ConventionPoint::MemberIgnored,
            ConventionEvent::ModelBuilt => ConventionPoint::ModelBuilt,
        }
    }

    /// False once an earlier convention removed the element the event is about.
    pub fn is_live(&self, model: &Model) -> bool {
        match self {
            ConventionEvent::EntityAdded(id) => model.contains_entity(*id),
            ConventionEvent::PropertyAdded(id)
            | ConventionEvent::PropertyNullabilityChanged(id) => model.contains_property(*id),
            ConventionEvent::KeyAdded(id) => model.key(*id).is_ok(),
            ConventionEvent::PrimaryKeySet { entity, key } => model
                .entity(*entity)
                .is_ok_and(|e| e.primary_key == Some(*key)),
            ConventionEvent::ForeignKeyAdded(id) => model.contains_foreign_key(*id),
            ConventionEvent::NavigationAdded(id) => model.contains_navigation(*id),
            ConventionEvent::ForeignKeyRemoved { dependent, .. } => {
                model.contains_entity(*dependent)
            }
            ConventionEvent::NavigationRemoved { entity, .. }
            | ConventionEvent::BaseTypeSet { entity, .. }
            | ConventionEvent::MemberIgnored { entity, .. } => model.contains_entity(*entity),
            ConventionEvent::ModelBuilt => true,
        }
    }
}

pub trait Convention: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent)
    -> Result<(), OrmGraphError>;
}

type ConventionFn =
    dyn Fn(&mut ModelBuilder, &ConventionEvent) -> Result<(), OrmGraphError> + Send + Sync;

/// Adapts a closure into a [`Convention`].
pub struct FnConvention {
    name: String,
    func: Box<ConventionFn>,
}

impl FnConvention {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut ModelBuilder, &ConventionEvent) -> Result<(), OrmGraphError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.to_string(),
            func: Box::new(func),
        }
    }
}

impl Convention for FnConvention {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(
        &self,
        builder: &mut ModelBuilder,
        event: &ConventionEvent,
    ) -> Result<(), OrmGraphError> {
        (self.func)(builder, event)
    }
}

/// Ordered conventions per lifecycle point. Registration order is run order.
#[derive(Clone, Default)]
pub struct ConventionSet {
    points: AHashMap<ConventionPoint, Vec<Arc<dyn Convention>>>,
}

impl ConventionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, point: ConventionPoint, convention: Arc<dyn Convention>) -> &mut Self {
        self.points.entry(point).or_default().push(convention);
        self
    }

    pub fn add_fn<F>(&mut self, point: ConventionPoint, name: &str, func: F) -> &mut Self
    where
        F: Fn(&mut ModelBuilder, &ConventionEvent) -> Result<(), OrmGraphError>
            + Send
            + Sync
            + 'static,
    {
        self.add(point, Arc::new(FnConvention::new(name, func)))
    }

    pub fn conventions(&self, point: ConventionPoint) -> &[Arc<dyn Convention>] {
        self.points.get(&point).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn names(&self, point: ConventionPoint) -> Vec<&str> {
        self.conventions(point).iter().map(|c| c.name()).collect()
    }

    /// Built-in conventions in their default order.
    pub fn default_set() -> Self {
        let mut set = Self::new();
        let value_generation: Arc<dyn Convention> = Arc::new(ValueGenerationConvention);
        let required: Arc<dyn Convention> = Arc::new(RequiredForeignKeyConvention);
        set.add(ConventionPoint::EntityAdded, Arc::new(TableNameConvention))
            .add(ConventionPoint::PropertyAdded, Arc::new(KeyDiscoveryConvention))
            .add(ConventionPoint::PrimaryKeySet, value_generation.clone())
            .add(
                ConventionPoint::ForeignKeyAdded,
                Arc::new(ForeignKeyPropertyDiscoveryConvention),
            )
            .add(ConventionPoint::ForeignKeyAdded, value_generation)
            .add(ConventionPoint::ForeignKeyAdded, required.clone())
            .add(ConventionPoint::PropertyNullabilityChanged, required)
            .add(ConventionPoint::BaseTypeSet, Arc::new(DiscriminatorConvention))
            .add(ConventionPoint::MemberIgnored, Arc::new(IgnoredMemberConvention))
            .add(ConventionPoint::ModelBuilt, Arc::new(ValidationConvention::core()))
            .add(
                ConventionPoint::ModelBuilt,
                Arc::new(ValidationConvention::relational()),
            );
        set
    }
}

impl fmt::Debug for ConventionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (point, list) in &self.points {
            map.entry(point, &list.iter().map(|c| c.name()).collect::<Vec<_>>());
        }
        map.finish()
    }
}

struct Frame {
    event: ConventionEvent,
    next: usize,
}

/// Mutable model under construction. Every structural change goes through
/// here so the registered conventions see it.
pub struct ModelBuilder {
    model: Model,
    conventions: Arc<ConventionSet>,
    queue: VecDeque<ConventionEvent>,
    stack: Vec<Frame>,
    dispatching: bool,
    violations: Vec<String>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new(ConventionSet::default_set())
    }
}

impl ModelBuilder {
    pub fn new(conventions: ConventionSet) -> Self {
        Self {
            model: Model::new(),
            conventions: Arc::new(conventions),
            queue: VecDeque::new(),
            stack: Vec::new(),
            dispatching: false,
            violations: Vec::new(),
        }
    }

    /// Builder without any conventions.
    pub fn bare() -> Self {
        Self::new(ConventionSet::new())
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub(crate) fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    fn raise(&mut self, event: ConventionEvent) -> Result<(), OrmGraphError> {
        trace!(target: TARGET, ?event, "raised");
        self.queue.push_back(event);
        self.drain()
    }

    fn drain(&mut self) -> Result<(), OrmGraphError> {
        if self.dispatching {
            return Ok(());
        }
        self.dispatching = true;
        let result = self.run_pending();
        self.dispatching = false;
        if result.is_err() {
            self.queue.clear();
            self.stack.clear();
        }
        result
    }

    fn run_pending(&mut self) -> Result<(), OrmGraphError> {
        let set = Arc::clone(&self.conventions);
        loop {
            self.stack.extend(
                self.queue
                    .drain(..)
                    .rev()
                    .map(|event| Frame { event, next: 0 }),
            );
            let Some(frame) = self.stack.last_mut() else {
                return Ok(());
            };
            let list = set.conventions(frame.event.point());
            if frame.next >= list.len() {
                self.stack.pop();
                continue;
            }
            let convention = Arc::clone(&list[frame.next]);
            frame.next += 1;
            let event = frame.event.clone();
            if !event.is_live(&self.model) {
                trace!(target: TARGET, ?event, "element removed, skipping");
                self.stack.pop();
                continue;
            }
            trace!(target: TARGET, convention = convention.name(), ?event, "applying");
            convention.apply(self, &event)?;
        }
    }

    /// Records a validation finding; `build` fails with all of them together.
    pub fn report_violation(&mut self, violation: impl Into<String>) {
        self.violations.push(violation.into());
    }

    // -------------------------------------------------------------- mutations

    /// Returns the entity named `name`, adding it when missing.
    pub fn entity(&mut self, name: &str) -> Result<EntityId, OrmGraphError> {
        if let Some(existing) = self.model.find_entity(name) {
            return Ok(existing.id);
        }
        let id = self.model.add_entity(name)?;
        self.raise(ConventionEvent::EntityAdded(id))?;
        Ok(id)
    }

    /// Returns the declared property, adding it when missing.
    pub fn property(
        &mut self,
        entity: EntityId,
        name: &str,
        value_type: ValueType,
    ) -> Result<PropertyId, OrmGraphError> {
        self.property_with(entity, name, value_type, false)
    }

    pub fn shadow_property(
        &mut self,
        entity: EntityId,
        name: &str,
        value_type: ValueType,
    ) -> Result<PropertyId, OrmGraphError> {
        self.property_with(entity, name, value_type, true)
    }

    fn property_with(
        &mut self,
        entity: EntityId,
        name: &str,
        value_type: ValueType,
        shadow: bool,
    ) -> Result<PropertyId, OrmGraphError> {
        if let Some(existing) = self.model.find_property(entity, name) {
            if existing.value_type != value_type {
                return Err(OrmGraphError::invalid_argument(format!(
                    "property '{name}' already exists with type {:?}",
                    existing.value_type
                )));
            }
            return Ok(existing.id);
        }
        if self.model.is_ignored(entity, name) {
            return Err(OrmGraphError::invalid_argument(format!(
                "member '{name}' is ignored on '{}'",
                self.model.entity(entity)?.name
            )));
        }
        let id = if shadow {
            self.model.add_shadow_property(entity, name, value_type)?
        } else {
            self.model.add_property(entity, name, value_type)?
        };
        self.raise(ConventionEvent::PropertyAdded(id))?;
        Ok(id)
    }

    pub fn remove_property(&mut self, property: PropertyId) -> Result<(), OrmGraphError> {
        self.model.remove_property(property).map(|_| ())
    }

    pub fn set_nullable(&mut self, property: PropertyId, nullable: bool) -> Result<(), OrmGraphError> {
        if self.model.set_nullable(property, nullable)? {
            self.raise(ConventionEvent::PropertyNullabilityChanged(property))?;
        }
        Ok(())
    }

    pub fn set_value_generated(
        &mut self,
        property: PropertyId,
        value_generated: ValueGenerated,
    ) -> Result<(), OrmGraphError> {
        self.model.set_value_generated(property, value_generated)
    }

    pub fn set_concurrency_token(&mut self, property: PropertyId, flag: bool) -> Result<(), OrmGraphError> {
        self.model.set_concurrency_token(property, flag)
    }

    pub fn set_annotation(
        &mut self,
        item: MetadataItem,
        key: &str,
        value: Value,
    ) -> Result<(), OrmGraphError> {
        self.model.set_annotation(item, key, value)
    }

    pub fn annotate(
        &mut self,
        item: MetadataItem,
        annotation: impl Into<Annotation>,
    ) -> Result<(), OrmGraphError> {
        self.model.annotations_mut(item)?.set(annotation);
        Ok(())
    }

    pub fn key(&mut self, properties: &[PropertyId]) -> Result<KeyId, OrmGraphError> {
        if let Some(existing) = self.model.find_key(properties) {
            return Ok(existing.id);
        }
        let id = self.model.add_key(properties)?;
        self.raise(ConventionEvent::KeyAdded(id))?;
        Ok(id)
    }

    pub fn primary_key(&mut self, properties: &[PropertyId]) -> Result<KeyId, OrmGraphError> {
        let existed = self.model.find_key(properties).map(|k| k.id);
        let key = self.model.set_primary_key(properties)?;
        let entity = self.model.key(key)?.entity;
        if existed.is_none() {
            self.raise(ConventionEvent::KeyAdded(key))?;
        }
        self.raise(ConventionEvent::PrimaryKeySet { entity, key })?;
        Ok(key)
    }

    pub fn foreign_key(
        &mut self,
        properties: &[PropertyId],
        principal_key: KeyId,
    ) -> Result<ForeignKeyId, OrmGraphError> {
        let id = self.model.add_foreign_key(properties, principal_key)?;
        self.raise(ConventionEvent::ForeignKeyAdded(id))?;
        Ok(id)
    }

    /// Creates a relationship from `dependent` to `principal`'s primary key with
    /// shadow foreign key properties and the requested navigations. Conventions
    /// may then swap the shadow properties for declared ones.
    pub fn relationship(
        &mut self,
        dependent: EntityId,
        principal: EntityId,
        dependent_navigation: Option<&str>,
        principal_navigation: Option<&str>,
        required: bool,
    ) -> Result<ForeignKeyId, OrmGraphError> {
        let principal_name = self.model.entity(principal)?.name.clone();
        let key = self.model.primary_key(principal).cloned().ok_or_else(|| {
            OrmGraphError::invalid_model(format!(
                "'{principal_name}' has no primary key to reference"
            ))
        })?;
        let prefix = dependent_navigation.unwrap_or(&principal_name).to_string();
        let mut namer = UniqueNamer::new();
        for property in self.model.properties(dependent) {
            namer.reserve(&property.name);
        }
        for navigation in self.model.navigations(dependent) {
            namer.reserve(&navigation.name);
        }
        let mut shadow = Vec::with_capacity(key.properties.len());
        for (position, key_property) in key.properties.iter().enumerate() {
            let principal_property = self.model.property(*key_property)?;
            let value_type = principal_property.value_type;
            let base = format!("{prefix}{}", principal_property.name);
            let name = namer.name_for(position, &base);
            let id = self.shadow_property(dependent, &name, value_type)?;
            self.model.set_nullable(id, !required)?;
            shadow.push(id);
        }
        let fk = self.foreign_key(&shadow, key.id)?;
        // Discovery conventions may have replaced the foreign key.
        let fk = self.resolve_replaced(fk, dependent, principal, &key.properties)?;
        if let Some(name) = dependent_navigation {
            self.navigation(fk, name, NavigationDirection::DependentToPrincipal)?;
        }
        if let Some(name) = principal_navigation {
            self.navigation(fk, name, NavigationDirection::PrincipalToDependent)?;
        }
        debug!(
            target: TARGET,
            dependent = %self.model.entity(dependent)?.name,
            principal = %principal_name,
            "relationship added"
        );
        Ok(fk)
    }

    fn resolve_replaced(
        &self,
        fk: ForeignKeyId,
        dependent: EntityId,
        principal: EntityId,
        principal_key: &[PropertyId],
    ) -> Result<ForeignKeyId, OrmGraphError> {
        if self.model.contains_foreign_key(fk) {
            return Ok(fk);
        }
        self.model
            .foreign_keys(dependent)
            .into_iter()
            .rev()
            .find(|candidate| {
                candidate.principal == principal
                    && candidate.dependent_to_principal.is_none()
                    && candidate.principal_to_dependent.is_none()
                    && self
                        .model
                        .key(candidate.principal_key)
                        .is_ok_and(|k| k.properties == principal_key)
            })
            .map(|candidate| candidate.id)
            .ok_or_else(|| OrmGraphError::not_found(format!("replacement for {fk}")))
    }

    pub fn navigation(
        &mut self,
        foreign_key: ForeignKeyId,
        name: &str,
        direction: NavigationDirection,
    ) -> Result<NavigationId, OrmGraphError> {
        let id = self.model.add_navigation(foreign_key, name, direction)?;
        self.raise(ConventionEvent::NavigationAdded(id))?;
        Ok(id)
    }

    pub fn remove_navigation(&mut self, navigation: NavigationId) -> Result<(), OrmGraphError> {
        let removed = self.model.remove_navigation(navigation)?;
        self.raise(ConventionEvent::NavigationRemoved {
            entity: removed.entity,
            name: removed.name,
        })
    }

    pub fn remove_foreign_key(&mut self, foreign_key: ForeignKeyId) -> Result<(), OrmGraphError> {
        let fk = self.model.foreign_key(foreign_key)?.clone();
        for navigation in [fk.dependent_to_principal, fk.principal_to_dependent]
            .into_iter()
            .flatten()
        {
            self.remove_navigation(navigation)?;
        }
        let removed = self.model.remove_foreign_key(foreign_key)?;
        self.raise(ConventionEvent::ForeignKeyRemoved {
            dependent: removed.dependent,
            principal: removed.principal,
            properties: removed.properties,
        })
    }

    pub fn base_type(&mut self, entity: EntityId, base: Option<EntityId>) -> Result<(), OrmGraphError> {
        let previous = self.model.set_base_type(entity, base)?;
        if previous != base {
            self.raise(ConventionEvent::BaseTypeSet { entity, previous })?;
        }
        Ok(())
    }

    pub fn ignore(&mut self, entity: EntityId, name: &str) -> Result<(), OrmGraphError> {
        self.model.ignore_member(entity, name)?;
        self.raise(ConventionEvent::MemberIgnored {
            entity,
            name: name.to_string(),
        })
    }

    // ----------------------------------------------------------- declarations

    /// Adds one entity with its properties, explicit keys and table mapping.
    /// Base types and references are resolved by [`ModelBuilder::declare_model`].
    pub fn declare(&mut self, declaration: &EntityDeclaration) -> Result<EntityId, OrmGraphError> {
        let entity = self.entity(&declaration.name)?;
        for name in &declaration.ignored {
            self.ignore(entity, name)?;
        }
        if let Some(table) = &declaration.table {
            self.set_annotation(
                MetadataItem::Entity(entity),
                "Relational:TableName",
                Value::String(table.clone()),
            )?;
        }
        if let Some(schema) = &declaration.schema {
            self.set_annotation(
                MetadataItem::Entity(entity),
                "Relational:Schema",
                Value::String(schema.clone()),
            )?;
        }
        let mut keys = Vec::new();
        for property in &declaration.properties {
            if self.model.is_ignored(entity, &property.name) {
                continue;
            }
            let id = self.property(entity, &property.name, property.value_type)?;
            if property.nullable && !property.key {
                self.set_nullable(id, true)?;
            }
            if property.concurrency_token {
                self.set_concurrency_token(id, true)?;
            }
            if let Some(column) = &property.column {
                self.set_annotation(
                    MetadataItem::Property(id),
                    "Relational:ColumnName",
                    Value::String(column.clone()),
                )?;
            }
            if property.key {
                keys.push(id);
            }
        }
        if !keys.is_empty() {
            self.primary_key(&keys)?;
        }
        Ok(entity)
    }

    /// Declares a whole model: entities and properties first, then base types,
    /// then relationships.
    pub fn declare_model(&mut self, declaration: &ModelDeclaration) -> Result<(), OrmGraphError> {
        for entity in &declaration.entities {
            self.declare(entity)?;
        }
        for entity in &declaration.entities {
            if let Some(base) = &entity.base {
                let id = self.lookup(&entity.name)?;
                let base = self.lookup(base)?;
                self.base_type(id, Some(base))?;
            }
        }
        for entity in &declaration.entities {
            let id = self.lookup(&entity.name)?;
            for reference in &entity.references {
                if self.model.is_ignored(id, &reference.name) {
                    continue;
                }
                let target = self.lookup(&reference.target)?;
                if reference.collection {
                    self.relationship(
                        target,
                        id,
                        reference.inverse.as_deref(),
                        Some(&reference.name),
                        reference.required,
                    )?;
                } else {
                    self.relationship(
                        id,
                        target,
                        Some(&reference.name),
                        reference.inverse.as_deref(),
                        reference.required,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<EntityId, OrmGraphError> {
        self.model.entity_by_name(name).map(|e| e.id)
    }

    /// Runs the model-built conventions and freezes the model.
    pub fn build(mut self) -> Result<Arc<Model>, OrmGraphError> {
        self.raise(ConventionEvent::ModelBuilt)?;
        if !self.violations.is_empty() {
            debug!(target: TARGET, count = self.violations.len(), "model rejected");
            return Err(OrmGraphError::InvalidModel(self.violations));
        }
        debug!(
            target: TARGET,
            entities = self.model.entity_ids().len(),
            "model built"
        );
        Ok(Arc::new(self.model))
    }
}
