use std::mem;

use ahash::AHashMap;
use tracing::{debug, trace};

use crate::{
    algo,
    cache::ValueGeneratorCache,
    errors::OrmGraphError,
    graph::GraphView,
    metadata::{EntityId, ForeignKey, KeyId, Model, ValueGenerated},
    update::{
        batch::{BatchConfig, BatchFactory, CommandBatch},
        command::{ModificationCommand, ParameterNameGenerator},
        entry::{EntityEntry, EntityState, identity_key},
    },
};

const TARGET: &str = "ormgraph::update";

/// Turns tracked entries into ordered, packed command batches.
pub struct CommandPlanner<'a> {
    model: &'a Model,
    generators: &'a ValueGeneratorCache,
    factory: BatchFactory,
}

impl<'a> CommandPlanner<'a> {
    pub fn new(model: &'a Model, generators: &'a ValueGeneratorCache, batching: BatchConfig) -> Self {
        Self {
            model,
            generators,
            factory: BatchFactory::new(batching),
        }
    }

    pub fn plan(&self, entries: &mut [EntityEntry]) -> Result<Vec<CommandBatch>, OrmGraphError> {
        self.generate_values(entries)?;
        self.propagate_relationships(entries)?;
        let commands = self.commands(entries)?;
        let ordered = self.order(commands, entries)?;
        let batches = self.pack(ordered)?;
        debug!(
            target: TARGET,
            entries = entries.len(),
            batches = batches.len(),
            "save planned"
        );
        Ok(batches)
    }

    /// Fills missing store-generated key values of added entries.
    pub fn generate_values(&self, entries: &mut [EntityEntry]) -> Result<(), OrmGraphError> {
        for entry in entries.iter_mut().filter(|e| e.state == EntityState::Added) {
            let Some(key) = self.model.primary_key(entry.entity) else {
                continue;
            };
            let referencing: Vec<_> = self
                .foreign_keys(entry.entity)
                .into_iter()
                .flat_map(|fk| fk.properties.clone())
                .collect();
            for property in key.properties.clone() {
                let meta = self.model.property(property)?;
                if meta.value_generated != ValueGenerated::OnAdd
                    || referencing.contains(&property)
                    || !entry.current(property).is_null()
                {
                    continue;
                }
                let root = self.model.root_type(entry.entity);
                let generator = self.generators.get_or_add(self.model, root, property)?;
                entry.values.insert(property, generator.next());
                if generator.generates_temporary_values() {
                    entry.temporary.insert(property);
                }
            }
        }
        Ok(())
    }

    /// Copies principal key values into the foreign keys of related entries.
    fn propagate_relationships(&self, entries: &mut [EntityEntry]) -> Result<(), OrmGraphError> {
        for index in 0..entries.len() {
            for (fk, principal) in entries[index].relationships.clone() {
                let source = entries.get(principal).ok_or_else(|| {
                    OrmGraphError::invalid_argument(format!(
                        "entry {index} is related to missing entry {principal}"
                    ))
                })?;
                let fk = self.model.foreign_key(fk)?;
                let key = self.model.key(fk.principal_key)?;
                let values: Vec<_> = key
                    .properties
                    .iter()
                    .map(|p| source.current(*p).clone())
                    .collect();
                let dependent = &mut entries[index];
                for (property, value) in fk.properties.iter().zip(values) {
                    if dependent.state == EntityState::Modified && dependent.current(*property) != &value {
                        dependent.modified.insert(*property);
                    }
                    dependent.values.insert(*property, value);
                }
            }
        }
        Ok(())
    }

    fn commands(&self, entries: &[EntityEntry]) -> Result<Vec<ModificationCommand>, OrmGraphError> {
        let mut names = ParameterNameGenerator::new();
        let mut commands = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            if entry.state == EntityState::Unchanged {
                continue;
            }
            let command = ModificationCommand::from_entry(self.model, entry, index, &mut names)?;
            if command.is_noop() {
                trace!(target: TARGET, entry = index, "nothing to write");
                continue;
            }
            commands.push(command);
        }
        Ok(commands)
    }

    /// Orders commands so principals are inserted before their dependents and
    /// dependents are deleted before their principals. Commands for the same
    /// row keep their relative order.
    fn order(
        &self,
        commands: Vec<ModificationCommand>,
        entries: &[EntityEntry],
    ) -> Result<Vec<ModificationCommand>, OrmGraphError> {
        let graph = CommandGraph::build(self, &commands, entries)?;
        let order = algo::topological_sort(&graph)?;
        let mut slots: Vec<Option<ModificationCommand>> = commands.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .collect())
    }

    fn pack(&self, commands: Vec<ModificationCommand>) -> Result<Vec<CommandBatch>, OrmGraphError> {
        let mut batches = Vec::new();
        let mut current = self.factory.create();
        for command in commands {
            let Err(rejected) = current.try_add(command) else {
                continue;
            };
            if !current.is_empty() {
                batches.push(mem::replace(&mut current, self.factory.create()));
            }
            current.try_add(rejected).map_err(|rejected| {
                OrmGraphError::invalid_argument(format!(
                    "command for table '{}' does not fit an empty batch",
                    rejected.table
                ))
            })?;
        }
        if !current.is_empty() {
            batches.push(current);
        }
        Ok(batches)
    }

    /// Foreign keys declared on the entity or any of its ancestors.
    fn foreign_keys(&self, entity: EntityId) -> Vec<&'a ForeignKey> {
        self.model
            .base_chain(entity)
            .into_iter()
            .flat_map(|owner| self.model.foreign_keys(owner))
            .collect()
    }

    fn keys(&self, entity: EntityId) -> Vec<KeyId> {
        self.model
            .base_chain(entity)
            .into_iter()
            .flat_map(|owner| self.model.keys(owner).into_iter().map(|k| k.id))
            .collect()
    }
}

/// Row-level dependencies between the commands of one save operation.
struct CommandGraph {
    labels: Vec<String>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
}

impl CommandGraph {
    fn build(
        planner: &CommandPlanner<'_>,
        commands: &[ModificationCommand],
        entries: &[EntityEntry],
    ) -> Result<Self, OrmGraphError> {
        let model = planner.model;
        let mut graph = CommandGraph {
            labels: Vec::with_capacity(commands.len()),
            outgoing: vec![Vec::new(); commands.len()],
            incoming: vec![Vec::new(); commands.len()],
        };

        let mut inserted: AHashMap<(KeyId, String), usize> = AHashMap::new();
        let mut deleted: AHashMap<(KeyId, String), usize> = AHashMap::new();
        let mut last_for_row: AHashMap<String, usize> = AHashMap::new();
        for (i, command) in commands.iter().enumerate() {
            let entry = &entries[command.entry];
            let name = model
                .entity(command.entity)
                .map(|e| e.name.clone())
                .unwrap_or_default();
            graph
                .labels
                .push(format!("{name} ({:?}) #{}", command.state, command.entry));

            let mut row = None;
            for key in planner.keys(command.entity) {
                let properties = model.key(key)?.properties.clone();
                let values = identity_key(&entry.store_values(&properties));
                if Some(key) == model.primary_key(command.entity).map(|k| k.id) {
                    let root = model.root_type(command.entity);
                    row = Some(format!("{}:{values}", root.index()));
                }
                match command.state {
                    EntityState::Added => {
                        inserted.insert((key, values), i);
                    }
                    EntityState::Deleted => {
                        deleted.insert((key, values), i);
                    }
                    _ => {}
                }
            }
            if let Some(row) = row {
                if let Some(previous) = last_for_row.insert(row, i) {
                    graph.add_edge(previous, i);
                }
            }
        }

        for (i, command) in commands.iter().enumerate() {
            let entry = &entries[command.entry];
            for fk in planner.foreign_keys(command.entity) {
                if matches!(command.state, EntityState::Added | EntityState::Modified) {
                    let current: Vec<_> = fk.properties.iter().map(|p| entry.current(*p).clone()).collect();
                    if !current.iter().any(|v| v.is_null()) {
                        if let Some(principal) = inserted.get(&(fk.principal_key, identity_key(&current))) {
                            graph.add_edge(*principal, i);
                        }
                    }
                }
                if matches!(command.state, EntityState::Modified | EntityState::Deleted) {
                    let original: Vec<_> = fk.properties.iter().map(|p| entry.original(*p).clone()).collect();
                    if !original.iter().any(|v| v.is_null()) {
                        if let Some(principal) = deleted.get(&(fk.principal_key, identity_key(&original))) {
                            graph.add_edge(i, *principal);
                        }
                    }
                }
            }
        }
        Ok(graph)
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        if from == to || self.outgoing[from].contains(&to) {
            return;
        }
        self.outgoing[from].push(to);
        self.incoming[to].push(from);
    }
}

impl GraphView for CommandGraph {
    type Vertex = usize;

    fn vertices(&self) -> Vec<usize> {
        (0..self.labels.len()).collect()
    }

    fn outgoing_neighbours(&self, vertex: usize) -> Vec<usize> {
        self.outgoing.get(vertex).cloned().unwrap_or_default()
    }

    fn incoming_neighbours(&self, vertex: usize) -> Vec<usize> {
        self.incoming.get(vertex).cloned().unwrap_or_default()
    }

    fn vertex_label(&self, vertex: usize) -> String {
        self.labels.get(vertex).cloned().unwrap_or_default()
    }
}
