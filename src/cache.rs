use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::{
    errors::OrmGraphError,
    metadata::{EntityId, Model, PropertyId},
    valuegen::{ValueGenerator, ValueGeneratorSelector},
};

/// One shared generator per (entity, property).
#[derive(Default)]
pub struct ValueGeneratorCache {
    inner: RwLock<AHashMap<(EntityId, PropertyId), Arc<dyn ValueGenerator>>>,
    selector: ValueGeneratorSelector,
}

impl ValueGeneratorCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AHashMap::new()),
            selector: ValueGeneratorSelector,
        }
    }

    pub fn get(&self, entity: EntityId, property: PropertyId) -> Option<Arc<dyn ValueGenerator>> {
        self.inner.read().get(&(entity, property)).cloned()
    }

    pub fn get_or_add(
        &self,
        model: &Model,
        entity: EntityId,
        property: PropertyId,
    ) -> Result<Arc<dyn ValueGenerator>, OrmGraphError> {
        if let Some(existing) = self.get(entity, property) {
            return Ok(existing);
        }
        let mut inner = self.inner.write();
        if let Some(existing) = inner.get(&(entity, property)) {
            return Ok(existing.clone());
        }
        let generator = self.selector.select(model, property)?;
        inner.insert((entity, property), generator.clone());
        Ok(generator)
    }

    pub fn insert(&self, entity: EntityId, property: PropertyId, generator: Arc<dyn ValueGenerator>) {
        self.inner.write().insert((entity, property), generator);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl std::fmt::Debug for ValueGeneratorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueGeneratorCache")
            .field("generators", &self.len())
            .finish()
    }
}
