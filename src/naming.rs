use std::hash::Hash;

use ahash::{AHashMap, AHashSet};

/// Hands out names that never collide with each other or with reserved names.
/// A repeated item gets the name it was first given; colliding requests get
/// `base`, `base1`, `base2`, ...
#[derive(Clone, Debug)]
pub struct UniqueNamer<T> {
    assigned: AHashMap<T, String>,
    used: AHashSet<String>,
    next_suffix: AHashMap<String, usize>,
}

impl<T> Default for UniqueNamer<T> {
    fn default() -> Self {
        Self {
            assigned: AHashMap::new(),
            used: AHashSet::new(),
            next_suffix: AHashMap::new(),
        }
    }
}

impl<T> UniqueNamer<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_for(&mut self, item: T, base: &str) -> String {
        if let Some(existing) = self.assigned.get(&item) {
            return existing.clone();
        }
        let mut candidate = base.to_string();
        if self.used.contains(&candidate) {
            let suffix = self.next_suffix.entry(base.to_string()).or_insert(1);
            loop {
                candidate = format!("{base}{suffix}");
                *suffix += 1;
                if !self.used.contains(&candidate) {
                    break;
                }
            }
        }
        self.used.insert(candidate.clone());
        self.assigned.insert(item, candidate.clone());
        candidate
    }

    /// Claims `name` up front. Returns false when it was already taken.
    pub fn reserve(&mut self, name: &str) -> bool {
        self.used.insert(name.to_string())
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    pub fn assigned(&self, item: &T) -> Option<&str> {
        self.assigned.get(item).map(String::as_str)
    }
}
