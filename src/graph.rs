//! Read-only graph views over the metadata model.

use std::{fmt::Debug, hash::Hash};

use ahash::AHashMap;

use crate::{
    algo,
    errors::OrmGraphError,
    metadata::{EntityId, Model, NavigationId},
};

/// Adjacency view consumed by the algorithms in [`crate::algo`].
pub trait GraphView {
    type Vertex: Copy + Eq + Hash + Ord + Debug;

    /// Vertices in a stable order; algorithms break ties by this order.
    fn vertices(&self) -> Vec<Self::Vertex>;
    fn outgoing_neighbours(&self, vertex: Self::Vertex) -> Vec<Self::Vertex>;
    fn incoming_neighbours(&self, vertex: Self::Vertex) -> Vec<Self::Vertex>;
    fn vertex_label(&self, vertex: Self::Vertex) -> String;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NavigationEdge {
    pub from: EntityId,
    pub to: EntityId,
    pub navigation: NavigationId,
}

/// Entities connected by navigations. An edge `A -> B` exists when A can
/// navigate to B: through A's own foreign key with a navigation to the
/// principal, or through a foreign key referencing A with a navigation to
/// the dependent.
#[derive(Clone, Copy, Debug)]
pub struct NavigationGraph<'a> {
    model: &'a Model,
}

impl<'a> NavigationGraph<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    pub fn outgoing_edges(&self, entity: EntityId) -> Vec<NavigationEdge> {
        let mut edges = Vec::new();
        for fk in self.model.foreign_keys(entity) {
            if let Some(navigation) = fk.dependent_to_principal {
                edges.push(NavigationEdge {
                    from: entity,
                    to: fk.principal,
                    navigation,
                });
            }
        }
        for fk in self.model.referencing_foreign_keys(entity) {
            if let Some(navigation) = fk.principal_to_dependent {
                edges.push(NavigationEdge {
                    from: entity,
                    to: fk.dependent,
                    navigation,
                });
            }
        }
        edges
    }

    pub fn incoming_edges(&self, entity: EntityId) -> Vec<NavigationEdge> {
        let mut edges = Vec::new();
        for fk in self.model.referencing_foreign_keys(entity) {
            if let Some(navigation) = fk.dependent_to_principal {
                edges.push(NavigationEdge {
                    from: fk.dependent,
                    to: entity,
                    navigation,
                });
            }
        }
        for fk in self.model.foreign_keys(entity) {
            if let Some(navigation) = fk.principal_to_dependent {
                edges.push(NavigationEdge {
                    from: fk.principal,
                    to: entity,
                    navigation,
                });
            }
        }
        edges
    }
}

fn distinct(mut vertices: Vec<EntityId>) -> Vec<EntityId> {
    vertices.sort();
    vertices.dedup();
    vertices
}

impl GraphView for NavigationGraph<'_> {
    type Vertex = EntityId;

    fn vertices(&self) -> Vec<EntityId> {
        self.model.entity_ids()
    }

    fn outgoing_neighbours(&self, vertex: EntityId) -> Vec<EntityId> {
        distinct(self.outgoing_edges(vertex).into_iter().map(|e| e.to).collect())
    }

    fn incoming_neighbours(&self, vertex: EntityId) -> Vec<EntityId> {
        distinct(self.incoming_edges(vertex).into_iter().map(|e| e.from).collect())
    }

    fn vertex_label(&self, vertex: EntityId) -> String {
        entity_label(self.model, vertex)
    }
}

/// Principal -> dependent edge for every foreign key, self references excluded.
/// With `by_table` the vertices are hierarchy roots, one per table.
#[derive(Clone, Debug)]
pub struct ForeignKeyGraph<'a> {
    model: &'a Model,
    outgoing: AHashMap<EntityId, Vec<EntityId>>,
    incoming: AHashMap<EntityId, Vec<EntityId>>,
    by_table: bool,
}

impl<'a> ForeignKeyGraph<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self::build(model, false)
    }

    pub fn by_table(model: &'a Model) -> Self {
        Self::build(model, true)
    }

    fn build(model: &'a Model, by_table: bool) -> Self {
        let project = |id: EntityId| if by_table { model.root_type(id) } else { id };
        let mut outgoing: AHashMap<EntityId, Vec<EntityId>> = AHashMap::new();
        let mut incoming: AHashMap<EntityId, Vec<EntityId>> = AHashMap::new();
        for fk in model.all_foreign_keys() {
            let (principal, dependent) = (project(fk.principal), project(fk.dependent));
            if principal == dependent {
                continue;
            }
            outgoing.entry(principal).or_default().push(dependent);
            incoming.entry(dependent).or_default().push(principal);
        }
        for list in outgoing.values_mut().chain(incoming.values_mut()) {
            list.sort();
            list.dedup();
        }
        Self {
            model,
            outgoing,
            incoming,
            by_table,
        }
    }
}

impl GraphView for ForeignKeyGraph<'_> {
    type Vertex = EntityId;

    fn vertices(&self) -> Vec<EntityId> {
        self.model
            .entities()
            .filter(|e| !self.by_table || e.base.is_none())
            .map(|e| e.id)
            .collect()
    }

    fn outgoing_neighbours(&self, vertex: EntityId) -> Vec<EntityId> {
        self.outgoing.get(&vertex).cloned().unwrap_or_default()
    }

    fn incoming_neighbours(&self, vertex: EntityId) -> Vec<EntityId> {
        self.incoming.get(&vertex).cloned().unwrap_or_default()
    }

    fn vertex_label(&self, vertex: EntityId) -> String {
        entity_label(self.model, vertex)
    }
}

fn entity_label(model: &Model, id: EntityId) -> String {
    model
        .entity(id)
        .map(|e| e.name.clone())
        .unwrap_or_else(|_| id.to_string())
}

/// Entities ordered so every principal precedes its dependents.
pub fn dependency_order(model: &Model) -> Result<Vec<EntityId>, OrmGraphError> {
    algo::topological_sort(&ForeignKeyGraph::new(model))
}

/// Entities ordered so every dependent precedes its principals.
pub fn deletion_order(model: &Model) -> Result<Vec<EntityId>, OrmGraphError> {
    let mut order = dependency_order(model)?;
    order.reverse();
    Ok(order)
}
