//! Client-side value generators for store-generated key properties.
//!
//! Generators are shared by every save operation touching the same property,
//! so `next` must be callable from many threads at once. Integer generators
//! produce temporary placeholders that the store replaces on insert; GUID
//! generators produce final values.

use std::sync::{
    Arc,
    atomic::{AtomicI64, AtomicU64, Ordering},
};

use uuid::Uuid;

use crate::{
    errors::OrmGraphError,
    metadata::{Model, PropertyId, ValueType},
    sql::SqlValue,
};

pub trait ValueGenerator: Send + Sync {
    fn next(&self) -> SqlValue;

    /// True when the values are placeholders overwritten by the store.
    fn generates_temporary_values(&self) -> bool;
}

#[derive(Debug)]
pub struct SequentialNumberGenerator {
    counter: AtomicI64,
    temporary: bool,
}

impl SequentialNumberGenerator {
    pub fn new(start: i64) -> Self {
        Self {
            counter: AtomicI64::new(start),
            temporary: false,
        }
    }

    /// Placeholders counting up from `i64::MIN + 1`, far from any real key.
    pub fn temporary() -> Self {
        Self {
            counter: AtomicI64::new(i64::MIN + 1),
            temporary: true,
        }
    }
}

impl ValueGenerator for SequentialNumberGenerator {
    fn next(&self) -> SqlValue {
        SqlValue::Int(self.counter.fetch_add(1, Ordering::Relaxed))
    }

    fn generates_temporary_values(&self) -> bool {
        self.temporary
    }
}

/// GUIDs sharing a random 8-byte prefix followed by a big-endian counter, so
/// values from one generator sort in creation order.
#[derive(Debug)]
pub struct SequentialGuidGenerator {
    prefix: [u8; 8],
    counter: AtomicU64,
}

impl SequentialGuidGenerator {
    pub fn new() -> Self {
        Self {
            prefix: rand::random(),
            counter: AtomicU64::new(1),
        }
    }

    pub fn with_prefix(prefix: [u8; 8]) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialGuidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueGenerator for SequentialGuidGenerator {
    fn next(&self) -> SqlValue {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&self.prefix);
        bytes[8..].copy_from_slice(&count.to_be_bytes());
        SqlValue::Guid(Uuid::from_bytes(bytes))
    }

    fn generates_temporary_values(&self) -> bool {
        false
    }
}

/// Picks a generator for a property by its value type.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValueGeneratorSelector;

impl ValueGeneratorSelector {
    pub fn select(&self, model: &Model, property: PropertyId) -> Result<Arc<dyn ValueGenerator>, OrmGraphError> {
        let property = model.property(property)?;
        match property.value_type {
            ValueType::Int32 | ValueType::Int64 => Ok(Arc::new(SequentialNumberGenerator::temporary())),
            ValueType::Guid => Ok(Arc::new(SequentialGuidGenerator::new())),
            other => {
                let owner = model.entity(property.entity)?;
                Err(OrmGraphError::invalid_model(format!(
                    "no value generator for property '{}.{}' of type {other:?}",
                    owner.name, property.name
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_numbers_start_far_below_zero() {
        let generator = SequentialNumberGenerator::temporary();
        assert!(generator.generates_temporary_values());
        assert_eq!(generator.next(), SqlValue::Int(i64::MIN + 1));
        assert_eq!(generator.next(), SqlValue::Int(i64::MIN + 2));
    }

    #[test]
    fn test_guids_increase() {
        let generator = SequentialGuidGenerator::with_prefix([7; 8]);
        let first = generator.next();
        let second = generator.next();
        match (first, second) {
            (SqlValue::Guid(a), SqlValue::Guid(b)) => assert!(a < b),
            other => panic!("expected guids, got {other:?}"),
        }
    }
}
