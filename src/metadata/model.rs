use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    errors::{OrmGraphError, require_name},
    metadata::{
        annotations::{Annotation, Annotations},
        types::{
            Cardinality, DeleteBehavior, Entity, EntityId, ForeignKey, ForeignKeyId, Key, KeyId,
            MetadataItem, Navigation, NavigationDirection, NavigationId, Property, PropertyId,
            ValueGenerated, ValueType,
        },
    },
};

pub const MAX_INHERITANCE_DEPTH: usize = 32;

/// Arena-backed metadata graph. Elements are addressed by typed ids and every
/// relationship is an id edge, so the model has no reference cycles and can be
/// serialized or compared as plain data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    entities: Vec<Option<Entity>>,
    properties: Vec<Option<Property>>,
    keys: Vec<Option<Key>>,
    foreign_keys: Vec<Option<ForeignKey>>,
    navigations: Vec<Option<Navigation>>,
    names: BTreeMap<String, EntityId>,
    annotations: Annotations,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, name: &str) -> Result<EntityId, OrmGraphError> {
        require_name("entity", name)?;
        if self.names.contains_key(name) {
            return Err(OrmGraphError::invalid_argument(format!(
                "entity '{name}' already exists"
            )));
        }
        let id = EntityId(self.entities.len());
        self.entities.push(Some(Entity {
            id,
            name: name.to_string(),
            properties: Vec::new(),
            primary_key: None,
            keys: Vec::new(),
            foreign_keys: Vec::new(),
            navigations: Vec::new(),
            base: None,
            ignored: Vec::new(),
            annotations: Annotations::new(),
        }));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Removes an entity and everything it declares. Fails while another entity
    /// references it through a foreign key or derives from it.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity, OrmGraphError> {
        let name = self.entity(id)?.name.clone();
        let mut users: Vec<String> = self
            .referencing_foreign_keys(id)
            .iter()
            .filter(|fk| fk.dependent != id)
            .filter_map(|fk| self.find_entity_by_id(fk.dependent).map(|e| e.name.clone()))
            .collect();
        users.extend(
            self.derived_types(id)
                .into_iter()
                .filter_map(|d| self.find_entity_by_id(d).map(|e| e.name.clone())),
        );
        if !users.is_empty() {
            users.sort();
            users.dedup();
            return Err(OrmGraphError::invalid_model(format!(
                "entity '{name}' is in use by {}",
                users.join(", ")
            )));
        }
        let entity = self.entity(id)?.clone();
        for fk in entity.foreign_keys.iter().copied() {
            self.remove_foreign_key(fk)?;
        }
        for key in entity.keys.iter().copied() {
            self.keys[key.0] = None;
        }
        for property in entity.properties.iter().copied() {
            self.properties[property.0] = None;
        }
        for navigation in entity.navigations.iter().copied() {
            self.navigations[navigation.0] = None;
        }
        self.names.remove(&name);
        self.entities[id.0]
            .take()
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity, OrmGraphError> {
        self.find_entity_by_id(id)
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    pub fn find_entity(&self, name: &str) -> Option<&Entity> {
        self.names.get(name).and_then(|id| self.find_entity_by_id(*id))
    }

    pub fn entity_by_name(&self, name: &str) -> Result<&Entity, OrmGraphError> {
        self.find_entity(name)
            .ok_or_else(|| OrmGraphError::not_found(format!("entity '{name}'")))
    }

    /// Entities ordered by name.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.names
            .values()
            .filter_map(|id| self.find_entity_by_id(*id))
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.names.values().copied().collect()
    }

    pub fn contains_entity(&self, id: EntityId) -> bool {
        self.find_entity_by_id(id).is_some()
    }

    fn find_entity_by_id(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0).and_then(Option::as_ref)
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, OrmGraphError> {
        self.entities
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    // ---------------------------------------------------------------- properties

    pub fn add_property(
        &mut self,
        entity: EntityId,
        name: &str,
        value_type: ValueType,
    ) -> Result<PropertyId, OrmGraphError> {
        self.insert_property(entity, name, value_type, false)
    }

    /// Adds a property that exists only in the model, not in the source declaration.
    pub fn add_shadow_property(
        &mut self,
        entity: EntityId,
        name: &str,
        value_type: ValueType,
    ) -> Result<PropertyId, OrmGraphError> {
        self.insert_property(entity, name, value_type, true)
    }

    fn insert_property(
        &mut self,
        entity: EntityId,
        name: &str,
        value_type: ValueType,
        shadow: bool,
    ) -> Result<PropertyId, OrmGraphError> {
        require_name("property", name)?;
        self.ensure_member_available(entity, name)?;
        let id = PropertyId(self.properties.len());
        let owner = self.entity_mut(entity)?;
        let index = owner.properties.len();
        owner.properties.push(id);
        self.properties.push(Some(Property {
            id,
            entity,
            name: name.to_string(),
            value_type,
            nullable: false,
            value_generated: ValueGenerated::Never,
            concurrency_token: false,
            index,
            shadow,
            annotations: Annotations::new(),
        }));
        Ok(id)
    }

    pub fn remove_property(&mut self, id: PropertyId) -> Result<Property, OrmGraphError> {
        let property = self.property(id)?.clone();
        let in_key = self.live_keys().any(|k| k.properties.contains(&id));
        let in_fk = self.live_foreign_keys().any(|fk| fk.properties.contains(&id));
        if in_key || in_fk {
            return Err(OrmGraphError::invalid_model(format!(
                "property '{}' is used by a key or foreign key",
                property.name
            )));
        }
        let owner = self.entity_mut(property.entity)?;
        owner.properties.retain(|p| *p != id);
        let remaining = owner.properties.clone();
        for (index, pid) in remaining.into_iter().enumerate() {
            if let Some(Some(p)) = self.properties.get_mut(pid.0) {
                p.index = index;
            }
        }
        self.properties[id.0] = None;
        Ok(property)
    }

    pub fn property(&self, id: PropertyId) -> Result<&Property, OrmGraphError> {
        self.properties
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    fn property_mut(&mut self, id: PropertyId) -> Result<&mut Property, OrmGraphError> {
        self.properties
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    pub fn contains_property(&self, id: PropertyId) -> bool {
        self.property(id).is_ok()
    }

    /// Finds a property on the entity or anywhere up its base chain.
    pub fn find_property(&self, entity: EntityId, name: &str) -> Option<&Property> {
        self.base_chain(entity).into_iter().find_map(|owner| {
            self.find_entity_by_id(owner)?
                .properties
                .iter()
                .filter_map(|p| self.property(*p).ok())
                .find(|p| p.name == name)
        })
    }

    pub fn declared_properties(&self, entity: EntityId) -> Vec<&Property> {
        self.find_entity_by_id(entity)
            .map(|e| {
                e.properties
                    .iter()
                    .filter_map(|p| self.property(*p).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All properties visible on the entity, inherited ones first.
    pub fn properties(&self, entity: EntityId) -> Vec<&Property> {
        let mut chain = self.base_chain(entity);
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|owner| self.declared_properties(owner))
            .collect()
    }

    pub fn set_nullable(&mut self, id: PropertyId, nullable: bool) -> Result<bool, OrmGraphError> {
        if nullable && self.live_keys().any(|k| k.properties.contains(&id)) {
            let name = &self.property(id)?.name;
            return Err(OrmGraphError::invalid_argument(format!(
                "key property '{name}' cannot be nullable"
            )));
        }
        let property = self.property_mut(id)?;
        let changed = property.nullable != nullable;
        property.nullable = nullable;
        Ok(changed)
    }

    pub fn set_value_generated(
        &mut self,
        id: PropertyId,
        value_generated: ValueGenerated,
    ) -> Result<(), OrmGraphError> {
        self.property_mut(id)?.value_generated = value_generated;
        Ok(())
    }

    pub fn set_concurrency_token(&mut self, id: PropertyId, flag: bool) -> Result<(), OrmGraphError> {
        self.property_mut(id)?.concurrency_token = flag;
        Ok(())
    }

    // ---------------------------------------------------------------------- keys

    pub fn add_key(&mut self, properties: &[PropertyId]) -> Result<KeyId, OrmGraphError> {
        let entity = self.single_owner("key", properties)?;
        if self.find_key(properties).is_some() {
            return Err(OrmGraphError::invalid_argument(format!(
                "entity '{}' already has this key",
                self.entity(entity)?.name
            )));
        }
        for property in properties {
            self.property_mut(*property)?.nullable = false;
        }
        let id = KeyId(self.keys.len());
        self.keys.push(Some(Key {
            id,
            entity,
            properties: properties.to_vec(),
            annotations: Annotations::new(),
        }));
        self.entity_mut(entity)?.keys.push(id);
        Ok(id)
    }

    /// Makes `properties` the primary key, reusing an identical key when one exists.
    /// A previous primary key that no foreign key references is dropped.
    pub fn set_primary_key(&mut self, properties: &[PropertyId]) -> Result<KeyId, OrmGraphError> {
        let entity = self.single_owner("key", properties)?;
        if let Some(base) = self.entity(entity)?.base {
            return Err(OrmGraphError::invalid_model(format!(
                "derived entity '{}' cannot declare a primary key; it inherits the key of '{}'",
                self.entity(entity)?.name,
                self.entity(base)?.name
            )));
        }
        let key = match self.find_key(properties) {
            Some(existing) => existing.id,
            None => self.add_key(properties)?,
        };
        let previous = self.entity(entity)?.primary_key;
        self.entity_mut(entity)?.primary_key = Some(key);
        if let Some(old) = previous
            && old != key
            && !self.live_foreign_keys().any(|fk| fk.principal_key == old)
        {
            self.remove_key(old)?;
        }
        Ok(key)
    }

    pub fn remove_key(&mut self, id: KeyId) -> Result<Key, OrmGraphError> {
        let key = self.key(id)?.clone();
        if self.live_foreign_keys().any(|fk| fk.principal_key == id) {
            return Err(OrmGraphError::invalid_model(format!(
                "key on '{}' is referenced by a foreign key",
                self.entity(key.entity)?.name
            )));
        }
        let owner = self.entity_mut(key.entity)?;
        owner.keys.retain(|k| *k != id);
        if owner.primary_key == Some(id) {
            owner.primary_key = None;
        }
        self.keys[id.0] = None;
        Ok(key)
    }

    pub fn key(&self, id: KeyId) -> Result<&Key, OrmGraphError> {
        self.keys
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    pub fn find_key(&self, properties: &[PropertyId]) -> Option<&Key> {
        self.live_keys().find(|k| k.properties == properties)
    }

    /// Primary key of the entity, resolved through the hierarchy root.
    pub fn primary_key(&self, entity: EntityId) -> Option<&Key> {
        let root = self.root_type(entity);
        self.find_entity_by_id(root)?
            .primary_key
            .and_then(|k| self.key(k).ok())
    }

    pub fn keys(&self, entity: EntityId) -> Vec<&Key> {
        self.find_entity_by_id(entity)
            .map(|e| e.keys.iter().filter_map(|k| self.key(*k).ok()).collect())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------- foreign keys

    pub fn add_foreign_key(
        &mut self,
        dependent_properties: &[PropertyId],
        principal_key: KeyId,
    ) -> Result<ForeignKeyId, OrmGraphError> {
        let dependent = self.single_owner("foreign key", dependent_properties)?;
        let key = self.key(principal_key)?.clone();
        if key.properties.len() != dependent_properties.len() {
            return Err(OrmGraphError::invalid_argument(format!(
                "foreign key has {} properties but the principal key has {}",
                dependent_properties.len(),
                key.properties.len()
            )));
        }
        for (dep, prin) in dependent_properties.iter().zip(&key.properties) {
            let dep = self.property(*dep)?;
            let prin = self.property(*prin)?;
            if dep.value_type != prin.value_type {
                return Err(OrmGraphError::invalid_argument(format!(
                    "foreign key property '{}' ({:?}) does not match principal key property '{}' ({:?})",
                    dep.name, dep.value_type, prin.name, prin.value_type
                )));
            }
        }
        let required = dependent_properties
            .iter()
            .filter_map(|p| self.property(*p).ok())
            .all(|p| !p.nullable);
        let id = ForeignKeyId(self.foreign_keys.len());
        self.foreign_keys.push(Some(ForeignKey {
            id,
            dependent,
            properties: dependent_properties.to_vec(),
            principal: key.entity,
            principal_key,
            dependent_to_principal: None,
            principal_to_dependent: None,
            unique: false,
            required,
            delete_behavior: if required {
                DeleteBehavior::Cascade
            } else {
                DeleteBehavior::Restrict
            },
            annotations: Annotations::new(),
        }));
        self.entity_mut(dependent)?.foreign_keys.push(id);
        Ok(id)
    }

    /// Removes the foreign key together with the navigations built on it.
    pub fn remove_foreign_key(&mut self, id: ForeignKeyId) -> Result<ForeignKey, OrmGraphError> {
        let fk = self.foreign_key(id)?.clone();
        for navigation in [fk.dependent_to_principal, fk.principal_to_dependent]
            .into_iter()
            .flatten()
        {
            self.remove_navigation(navigation)?;
        }
        self.entity_mut(fk.dependent)?
            .foreign_keys
            .retain(|f| *f != id);
        self.foreign_keys[id.0] = None;
        Ok(fk)
    }

    pub fn foreign_key(&self, id: ForeignKeyId) -> Result<&ForeignKey, OrmGraphError> {
        self.foreign_keys
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    fn foreign_key_mut(&mut self, id: ForeignKeyId) -> Result<&mut ForeignKey, OrmGraphError> {
        self.foreign_keys
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    pub fn contains_foreign_key(&self, id: ForeignKeyId) -> bool {
        self.foreign_key(id).is_ok()
    }

    pub fn foreign_keys(&self, entity: EntityId) -> Vec<&ForeignKey> {
        self.find_entity_by_id(entity)
            .map(|e| {
                e.foreign_keys
                    .iter()
                    .filter_map(|f| self.foreign_key(*f).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Foreign keys whose principal is `entity`. Derived by scanning, never stored.
    pub fn referencing_foreign_keys(&self, entity: EntityId) -> Vec<&ForeignKey> {
        self.live_foreign_keys()
            .filter(|fk| fk.principal == entity)
            .collect()
    }

    pub fn all_foreign_keys(&self) -> Vec<&ForeignKey> {
        self.live_foreign_keys().collect()
    }

    pub fn set_foreign_key_unique(&mut self, id: ForeignKeyId, unique: bool) -> Result<(), OrmGraphError> {
        let fk = self.foreign_key_mut(id)?;
        fk.unique = unique;
        if let Some(nav) = fk.principal_to_dependent
            && let Some(Some(navigation)) = self.navigations.get_mut(nav.0)
        {
            navigation.cardinality = if unique {
                Cardinality::Reference
            } else {
                Cardinality::Collection
            };
        }
        Ok(())
    }

    pub fn set_foreign_key_required(&mut self, id: ForeignKeyId, required: bool) -> Result<(), OrmGraphError> {
        self.foreign_key_mut(id)?.required = required;
        Ok(())
    }

    pub fn set_delete_behavior(
        &mut self,
        id: ForeignKeyId,
        behavior: DeleteBehavior,
    ) -> Result<(), OrmGraphError> {
        self.foreign_key_mut(id)?.delete_behavior = behavior;
        Ok(())
    }

    // --------------------------------------------------------------- navigations

    pub fn add_navigation(
        &mut self,
        foreign_key: ForeignKeyId,
        name: &str,
        direction: NavigationDirection,
    ) -> Result<NavigationId, OrmGraphError> {
        require_name("navigation", name)?;
        let fk = self.foreign_key(foreign_key)?.clone();
        let (entity, occupied, cardinality) = match direction {
            NavigationDirection::DependentToPrincipal => (
                fk.dependent,
                fk.dependent_to_principal,
                Cardinality::Reference,
            ),
            NavigationDirection::PrincipalToDependent => (
                fk.principal,
                fk.principal_to_dependent,
                if fk.unique {
                    Cardinality::Reference
                } else {
                    Cardinality::Collection
                },
            ),
        };
        if let Some(existing) = occupied {
            return Err(OrmGraphError::invalid_argument(format!(
                "foreign key already has navigation '{}' on this side",
                self.navigation(existing)?.name
            )));
        }
        self.ensure_member_available(entity, name)?;
        let id = NavigationId(self.navigations.len());
        self.navigations.push(Some(Navigation {
            id,
            name: name.to_string(),
            entity,
            foreign_key,
            direction,
            cardinality,
            annotations: Annotations::new(),
        }));
        self.entity_mut(entity)?.navigations.push(id);
        let fk = self.foreign_key_mut(foreign_key)?;
        match direction {
            NavigationDirection::DependentToPrincipal => fk.dependent_to_principal = Some(id),
            NavigationDirection::PrincipalToDependent => fk.principal_to_dependent = Some(id),
        }
        Ok(id)
    }

    pub fn remove_navigation(&mut self, id: NavigationId) -> Result<Navigation, OrmGraphError> {
        let navigation = self.navigation(id)?.clone();
        self.entity_mut(navigation.entity)?
            .navigations
            .retain(|n| *n != id);
        if let Ok(fk) = self.foreign_key_mut(navigation.foreign_key) {
            if fk.dependent_to_principal == Some(id) {
                fk.dependent_to_principal = None;
            }
            if fk.principal_to_dependent == Some(id) {
                fk.principal_to_dependent = None;
            }
        }
        self.navigations[id.0] = None;
        Ok(navigation)
    }

    pub fn navigation(&self, id: NavigationId) -> Result<&Navigation, OrmGraphError> {
        self.navigations
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| OrmGraphError::not_found(format!("{id}")))
    }

    pub fn contains_navigation(&self, id: NavigationId) -> bool {
        self.navigation(id).is_ok()
    }

    pub fn navigations(&self, entity: EntityId) -> Vec<&Navigation> {
        self.find_entity_by_id(entity)
            .map(|e| {
                e.navigations
                    .iter()
                    .filter_map(|n| self.navigation(*n).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn find_navigation(&self, entity: EntityId, name: &str) -> Option<&Navigation> {
        self.base_chain(entity).into_iter().find_map(|owner| {
            self.navigations(owner).into_iter().find(|n| n.name == name)
        })
    }

    /// Entity on the far side of a navigation.
    pub fn navigation_target(&self, id: NavigationId) -> Result<EntityId, OrmGraphError> {
        let navigation = self.navigation(id)?;
        let fk = self.foreign_key(navigation.foreign_key)?;
        Ok(match navigation.direction {
            NavigationDirection::DependentToPrincipal => fk.principal,
            NavigationDirection::PrincipalToDependent => fk.dependent,
        })
    }

    // --------------------------------------------------------------- inheritance

    pub fn set_base_type(
        &mut self,
        entity: EntityId,
        base: Option<EntityId>,
    ) -> Result<Option<EntityId>, OrmGraphError> {
        let name = self.entity(entity)?.name.clone();
        if let Some(base) = base {
            self.entity(base)?;
            let chain = self.base_chain(base);
            if chain.contains(&entity) {
                return Err(OrmGraphError::invalid_model(format!(
                    "setting '{}' as base of '{name}' would create an inheritance cycle",
                    self.entity(base)?.name
                )));
            }
            if chain.len() + self.derived_depth(entity) >= MAX_INHERITANCE_DEPTH {
                return Err(OrmGraphError::invalid_model(format!(
                    "inheritance chain of '{name}' exceeds {MAX_INHERITANCE_DEPTH} levels"
                )));
            }
            let own: Vec<String> = self
                .declared_properties(entity)
                .iter()
                .map(|p| p.name.clone())
                .collect();
            let clashes: Vec<String> = own
                .into_iter()
                .filter(|n| self.find_property(base, n).is_some())
                .collect();
            if !clashes.is_empty() {
                return Err(OrmGraphError::invalid_model(format!(
                    "'{name}' redeclares inherited properties: {}",
                    clashes.join(", ")
                )));
            }
            if let Some(pk) = self.entity(entity)?.primary_key {
                self.entity_mut(entity)?.primary_key = None;
                if !self.live_foreign_keys().any(|fk| fk.principal_key == pk) {
                    self.remove_key(pk)?;
                }
            }
        }
        let owner = self.entity_mut(entity)?;
        let previous = owner.base;
        owner.base = base;
        Ok(previous)
    }

    pub fn base_type(&self, entity: EntityId) -> Option<EntityId> {
        self.find_entity_by_id(entity).and_then(|e| e.base)
    }

    /// The entity followed by its ancestors, nearest first.
    pub fn base_chain(&self, entity: EntityId) -> Vec<EntityId> {
        let mut chain = Vec::new();
        let mut current = Some(entity);
        while let Some(id) = current {
            if chain.contains(&id) || chain.len() > MAX_INHERITANCE_DEPTH {
                break;
            }
            chain.push(id);
            current = self.base_type(id);
        }
        chain
    }

    pub fn root_type(&self, entity: EntityId) -> EntityId {
        self.base_chain(entity).last().copied().unwrap_or(entity)
    }

    pub fn derived_types(&self, entity: EntityId) -> Vec<EntityId> {
        self.entities()
            .filter(|e| e.base == Some(entity))
            .map(|e| e.id)
            .collect()
    }

    /// Every entity sharing the hierarchy root of `entity`, root first.
    pub fn hierarchy(&self, entity: EntityId) -> Vec<EntityId> {
        let root = self.root_type(entity);
        let mut out = vec![root];
        let mut index = 0;
        while index < out.len() {
            let current = out[index];
            out.extend(self.derived_types(current));
            index += 1;
        }
        out
    }

    fn derived_depth(&self, entity: EntityId) -> usize {
        self.derived_types(entity)
            .into_iter()
            .map(|d| 1 + self.derived_depth(d))
            .max()
            .unwrap_or(0)
    }

    pub fn ignore_member(&mut self, entity: EntityId, name: &str) -> Result<(), OrmGraphError> {
        require_name("member", name)?;
        let owner = self.entity_mut(entity)?;
        if !owner.ignored.iter().any(|n| n == name) {
            owner.ignored.push(name.to_string());
        }
        Ok(())
    }

    pub fn is_ignored(&self, entity: EntityId, name: &str) -> bool {
        self.base_chain(entity).into_iter().any(|owner| {
            self.find_entity_by_id(owner)
                .is_some_and(|e| e.ignored.iter().any(|n| n == name))
        })
    }

    // --------------------------------------------------------------- annotations

    pub fn annotations(&self, item: MetadataItem) -> Result<&Annotations, OrmGraphError> {
        Ok(match item {
            MetadataItem::Model => &self.annotations,
            MetadataItem::Entity(id) => &self.entity(id)?.annotations,
            MetadataItem::Property(id) => &self.property(id)?.annotations,
            MetadataItem::Key(id) => &self.key(id)?.annotations,
            MetadataItem::ForeignKey(id) => &self.foreign_key(id)?.annotations,
            MetadataItem::Navigation(id) => &self.navigation(id)?.annotations,
        })
    }

    pub fn annotations_mut(&mut self, item: MetadataItem) -> Result<&mut Annotations, OrmGraphError> {
        let missing = || OrmGraphError::not_found(format!("{item:?}"));
        Ok(match item {
            MetadataItem::Model => &mut self.annotations,
            MetadataItem::Entity(id) => &mut self.entity_mut(id)?.annotations,
            MetadataItem::Property(id) => &mut self.property_mut(id)?.annotations,
            MetadataItem::Key(id) => {
                &mut self
                    .keys
                    .get_mut(id.0)
                    .and_then(Option::as_mut)
                    .ok_or_else(missing)?
                    .annotations
            }
            MetadataItem::ForeignKey(id) => &mut self.foreign_key_mut(id)?.annotations,
            MetadataItem::Navigation(id) => {
                &mut self
                    .navigations
                    .get_mut(id.0)
                    .and_then(Option::as_mut)
                    .ok_or_else(missing)?
                    .annotations
            }
        })
    }

    pub fn get_annotation(&self, item: MetadataItem, key: &str) -> Option<&Annotation> {
        self.annotations(item).ok()?.get_annotation(key)
    }

    pub fn set_annotation(
        &mut self,
        item: MetadataItem,
        key: &str,
        value: Value,
    ) -> Result<(), OrmGraphError> {
        self.annotations_mut(item)?.set_annotation(key, value)
    }

    // ----------------------------------------------------------------- relational

    /// Table an entity maps to. Derived entities share their root's table.
    pub fn table_name(&self, entity: EntityId) -> Result<String, OrmGraphError> {
        let root = self.entity(self.root_type(entity))?;
        Ok(root
            .annotations
            .table_name()
            .map(str::to_string)
            .unwrap_or_else(|| root.name.clone()))
    }

    pub fn schema(&self, entity: EntityId) -> Result<Option<String>, OrmGraphError> {
        let root = self.entity(self.root_type(entity))?;
        Ok(root.annotations.schema().map(str::to_string))
    }

    pub fn column_name(&self, property: PropertyId) -> Result<String, OrmGraphError> {
        let property = self.property(property)?;
        Ok(property
            .annotations
            .column_name()
            .map(str::to_string)
            .unwrap_or_else(|| property.name.clone()))
    }

    // ------------------------------------------------------------------- helpers

    fn live_keys(&self) -> impl Iterator<Item = &Key> + '_ {
        self.keys.iter().filter_map(Option::as_ref)
    }

    fn live_foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> + '_ {
        self.foreign_keys.iter().filter_map(Option::as_ref)
    }

    fn single_owner(&self, what: &str, properties: &[PropertyId]) -> Result<EntityId, OrmGraphError> {
        let Some(first) = properties.first() else {
            return Err(OrmGraphError::invalid_argument(format!(
                "{what} requires at least one property"
            )));
        };
        let owner = self.property(*first)?.entity;
        for (position, property) in properties.iter().enumerate() {
            if self.property(*property)?.entity != owner {
                return Err(OrmGraphError::invalid_argument(format!(
                    "{what} properties must all be declared on '{}'",
                    self.entity(owner)?.name
                )));
            }
            if properties[..position].contains(property) {
                return Err(OrmGraphError::invalid_argument(format!(
                    "{what} lists property '{}' twice",
                    self.property(*property)?.name
                )));
            }
        }
        Ok(owner)
    }

    fn ensure_member_available(&self, entity: EntityId, name: &str) -> Result<(), OrmGraphError> {
        let owner = self.entity(entity)?;
        let mut scope = self.base_chain(entity);
        scope.extend(self.hierarchy(entity).into_iter().filter(|e| {
            self.base_chain(*e).contains(&entity) && *e != entity
        }));
        for candidate in scope {
            let taken = self
                .declared_properties(candidate)
                .iter()
                .any(|p| p.name == name)
                || self.navigations(candidate).iter().any(|n| n.name == name);
            if taken {
                return Err(OrmGraphError::invalid_argument(format!(
                    "'{}' already has a member named '{name}'",
                    owner.name
                )));
            }
        }
        Ok(())
    }
}
