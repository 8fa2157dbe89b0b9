use serde::Serialize;
use tracing::debug;

use crate::{
    conventions::DISCRIMINATOR_PROPERTY,
    errors::OrmGraphError,
    metadata::{EntityId, Model, NavigationDirection, NavigationId, Property, PropertyId},
    naming::UniqueNamer,
    query::include::{IncludeNode, IncludePipeline},
    sql::{
        BinaryOperator, GeneratedSql, JoinKind, SelectExpression, SqlExpression, SqlGenerator,
        SqlValue, TableExpression,
    },
};

const TARGET: &str = "ormgraph::query";

/// One `property <op> value` comparison on the root entity.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryFilter {
    pub property: String,
    pub op: BinaryOperator,
    pub value: SqlValue,
}

/// Builder for a query rooted at one entity.
#[derive(Clone, Debug, Default)]
pub struct Query {
    entity: String,
    filters: Vec<QueryFilter>,
    ordering: Vec<(String, bool)>,
    skip: Option<u64>,
    take: Option<u64>,
    includes: IncludePipeline,
    include_count: usize,
    last_include: Option<String>,
}

impl Query {
    pub fn from(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, property: &str, op: BinaryOperator, value: impl Into<SqlValue>) -> Self {
        self.filters.push(QueryFilter {
            property: property.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, property: &str) -> Self {
        self.ordering.push((property.to_string(), false));
        self
    }

    pub fn order_by_descending(mut self, property: &str) -> Self {
        self.ordering.push((property.to_string(), true));
        self
    }

    pub fn skip(mut self, count: u64) -> Self {
        self.skip = Some(count);
        self
    }

    pub fn take(mut self, count: u64) -> Self {
        self.take = Some(count);
        self
    }

    /// Adds a navigation path, dotted for nested navigations.
    pub fn include(mut self, path: &str) -> Result<Self, OrmGraphError> {
        let context = format!("include{}", self.include_count);
        self.includes.add_include(&context, path)?;
        self.include_count += 1;
        self.last_include = Some(context);
        Ok(self)
    }

    /// Extends the most recent `include`.
    pub fn then_include(mut self, path: &str) -> Result<Self, OrmGraphError> {
        let context = self
            .last_include
            .clone()
            .ok_or_else(|| OrmGraphError::dangling_include(format!("then_include({path})")))?;
        self.includes.append_chain(&context, &[path])?;
        Ok(self)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn filters(&self) -> &[QueryFilter] {
        &self.filters
    }

    pub fn includes(&self) -> &IncludePipeline {
        &self.includes
    }

    pub fn includes_mut(&mut self) -> &mut IncludePipeline {
        &mut self.includes
    }
}

/// A resolved include: one navigation reached from `source`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FetchNode {
    pub path: String,
    pub navigation: NavigationId,
    pub source: EntityId,
    pub target: EntityId,
    pub parent: Option<usize>,
    pub collection: bool,
}

/// Include tree resolved against the model, depth-first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FetchPlan {
    pub root: EntityId,
    pub nodes: Vec<FetchNode>,
}

impl FetchPlan {
    pub fn children(&self, parent: Option<usize>) -> impl Iterator<Item = (usize, &FetchNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.parent == parent)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CollectionSelect {
    pub node: usize,
    pub path: String,
    pub select: SelectExpression,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub root: SelectExpression,
    pub collections: Vec<CollectionSelect>,
    pub plan: FetchPlan,
}

impl CompiledQuery {
    /// Root statement first, then one statement per collection include.
    pub fn generate(&self, generator: &SqlGenerator<'_>) -> Result<Vec<GeneratedSql>, OrmGraphError> {
        let mut out = vec![generator.generate(&self.root)?];
        for collection in &self.collections {
            out.push(generator.generate(&collection.select)?);
        }
        Ok(out)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum AliasSlot {
    Root,
    Node(usize),
    Keys(usize),
    PagedKeys(usize),
}

pub struct QueryCompiler<'a> {
    model: &'a Model,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self { model }
    }

    pub fn compile(&self, query: &Query) -> Result<CompiledQuery, OrmGraphError> {
        let root = self.model.entity_by_name(query.entity())?.id;
        let plan = self.fetch_plan(root, query.includes())?;
        let mut aliases = UniqueNamer::new();
        let root_alias = aliases.name_for(AliasSlot::Root, &self.alias_base(root)?);

        let mut select = SelectExpression::from(self.table(root, &root_alias)?);
        self.project_entity(&mut select, root, &root_alias)?;
        self.apply_root_clauses(&mut select, root, &root_alias, query)?;
        self.join_references(&mut select, &plan, None, &root_alias, &mut aliases)?;

        let mut collections = Vec::new();
        for (index, node) in plan.nodes.iter().enumerate() {
            if node.collection {
                collections.push(CollectionSelect {
                    node: index,
                    path: node.path.clone(),
                    select: self.collection_select(&plan, index, query, &mut aliases)?,
                });
            }
        }
        debug!(
            target: TARGET,
            entity = query.entity(),
            includes = plan.nodes.len(),
            collections = collections.len(),
            "query compiled"
        );
        Ok(CompiledQuery {
            root: select,
            collections,
            plan,
        })
    }

    pub fn fetch_plan(&self, root: EntityId, includes: &IncludePipeline) -> Result<FetchPlan, OrmGraphError> {
        let mut plan = FetchPlan {
            root,
            nodes: Vec::new(),
        };
        self.resolve(&mut plan, root, &includes.navigation_tree(), None, "")?;
        Ok(plan)
    }

    fn resolve(
        &self,
        plan: &mut FetchPlan,
        source: EntityId,
        nodes: &[IncludeNode],
        parent: Option<usize>,
        prefix: &str,
    ) -> Result<(), OrmGraphError> {
        for node in nodes {
            let navigation = self.model.find_navigation(source, &node.name).ok_or_else(|| {
                let owner = self
                    .model
                    .entity(source)
                    .map(|e| e.name.clone())
                    .unwrap_or_default();
                OrmGraphError::not_found(format!("navigation '{}' on entity '{owner}'", node.name))
            })?;
            let target = self.model.navigation_target(navigation.id)?;
            let path = if prefix.is_empty() {
                node.name.clone()
            } else {
                format!("{prefix}.{}", node.name)
            };
            plan.nodes.push(FetchNode {
                path: path.clone(),
                navigation: navigation.id,
                source,
                target,
                parent,
                collection: navigation.is_collection(),
            });
            let index = plan.nodes.len() - 1;
            self.resolve(plan, target, &node.children, Some(index), &path)?;
        }
        Ok(())
    }

    fn apply_root_clauses(
        &self,
        select: &mut SelectExpression,
        root: EntityId,
        alias: &str,
        query: &Query,
    ) -> Result<(), OrmGraphError> {
        if let Some(predicate) = self.discriminator_filter(root, alias)? {
            select.filter(predicate);
        }
        for (i, filter) in query.filters.iter().enumerate() {
            let column = self.named_column(root, alias, &filter.property)?;
            let value = if filter.value.is_null() {
                SqlExpression::literal(SqlValue::Null)
            } else {
                SqlExpression::parameter(&format!("p{i}"), filter.value.clone())
            };
            select.filter(SqlExpression::binary(filter.op, column, value));
        }
        for (property, descending) in &query.ordering {
            select.order_by(self.named_column(root, alias, property)?, *descending);
        }
        select.limit(query.take).offset(query.skip);
        Ok(())
    }

    fn join_references(
        &self,
        select: &mut SelectExpression,
        plan: &FetchPlan,
        parent: Option<usize>,
        parent_alias: &str,
        aliases: &mut UniqueNamer<AliasSlot>,
    ) -> Result<(), OrmGraphError> {
        let children: Vec<(usize, FetchNode)> = plan
            .children(parent)
            .filter(|(_, node)| !node.collection)
            .map(|(i, node)| (i, node.clone()))
            .collect();
        for (index, node) in children {
            let alias = aliases.name_for(AliasSlot::Node(index), &self.alias_base(node.target)?);
            let on = self.join_condition(node.navigation, parent_alias, &alias)?;
            select.join(JoinKind::LeftOuter, self.table(node.target, &alias)?, on);
            self.project_entity(select, node.target, &alias)?;
            self.join_references(select, plan, Some(index), &alias, aliases)?;
        }
        Ok(())
    }

    fn collection_select(
        &self,
        plan: &FetchPlan,
        index: usize,
        query: &Query,
        aliases: &mut UniqueNamer<AliasSlot>,
    ) -> Result<SelectExpression, OrmGraphError> {
        let node = &plan.nodes[index];
        let alias = aliases.name_for(AliasSlot::Node(index), &self.alias_base(node.target)?);
        let mut select = SelectExpression::from(self.table(node.target, &alias)?);
        self.project_entity(&mut select, node.target, &alias)?;
        self.join_references(&mut select, plan, Some(index), &alias, aliases)?;

        // walk up to the root, joining every intermediate include
        let mut child = index;
        let mut child_alias = alias.clone();
        while let Some(parent) = plan.nodes[child].parent {
            let parent_node = &plan.nodes[parent];
            let parent_alias =
                aliases.name_for(AliasSlot::Node(parent), &self.alias_base(parent_node.target)?);
            let on = self.join_condition(plan.nodes[child].navigation, &parent_alias, &child_alias)?;
            select.join(JoinKind::Inner, self.table(parent_node.target, &parent_alias)?, on);
            child = parent;
            child_alias = parent_alias;
        }

        let first = &plan.nodes[child];
        let root = plan.root;
        let root_alias = aliases.name_for(AliasSlot::Root, &self.alias_base(root)?);
        let keys_alias = aliases.name_for(AliasSlot::Keys(index), "t");
        let (source_columns, _) = self.join_properties(first.navigation)?;

        let mut keys = SelectExpression::from(self.table(root, &root_alias)?);
        for property in &source_columns {
            keys.project(self.column(&root_alias, *property)?, None);
        }
        self.apply_root_clauses(&mut keys, root, &root_alias, query)?;
        if !keys.is_paged() {
            keys.order_by.clear();
        }
        // foreign key values repeat across root rows and would multiply the join
        let root_key = self.model.primary_key(root).map(|key| key.properties.as_slice());
        if root_key != Some(source_columns.as_slice()) {
            keys = if keys.is_paged() {
                let paged_alias = aliases.name_for(AliasSlot::PagedKeys(index), "t");
                let mut outer = SelectExpression::from(TableExpression::Subquery {
                    select: Box::new(keys),
                    alias: paged_alias.clone(),
                });
                for property in &source_columns {
                    outer.project(self.column(&paged_alias, *property)?, None);
                }
                outer
            } else {
                keys
            };
            keys.distinct = true;
        }
        let on = self.join_condition(first.navigation, &keys_alias, &child_alias)?;
        select.join(
            JoinKind::Inner,
            TableExpression::Subquery {
                select: Box::new(keys),
                alias: keys_alias.clone(),
            },
            on,
        );

        for property in &source_columns {
            select.order_by(self.column(&keys_alias, *property)?, false);
        }
        if let Some(key) = self.model.primary_key(node.target) {
            for property in &key.properties {
                select.order_by(self.column(&alias, *property)?, false);
            }
        }
        Ok(select)
    }

    /// Source-side and target-side properties joined by a navigation.
    fn join_properties(
        &self,
        navigation: NavigationId,
    ) -> Result<(Vec<PropertyId>, Vec<PropertyId>), OrmGraphError> {
        let navigation = self.model.navigation(navigation)?;
        let fk = self.model.foreign_key(navigation.foreign_key)?;
        let key = self.model.key(fk.principal_key)?;
        Ok(match navigation.direction {
            NavigationDirection::DependentToPrincipal => (fk.properties.clone(), key.properties.clone()),
            NavigationDirection::PrincipalToDependent => (key.properties.clone(), fk.properties.clone()),
        })
    }

    fn join_condition(
        &self,
        navigation: NavigationId,
        source_alias: &str,
        target_alias: &str,
    ) -> Result<SqlExpression, OrmGraphError> {
        let (source, target) = self.join_properties(navigation)?;
        let mut pairs = Vec::with_capacity(source.len());
        for (s, t) in source.iter().zip(&target) {
            pairs.push(SqlExpression::eq(
                self.column(source_alias, *s)?,
                self.column(target_alias, *t)?,
            ));
        }
        SqlExpression::all(pairs)
            .ok_or_else(|| OrmGraphError::invalid_model("navigation without foreign key properties"))
    }

    fn discriminator_filter(&self, entity: EntityId, alias: &str) -> Result<Option<SqlExpression>, OrmGraphError> {
        if self.model.base_type(entity).is_none() {
            return Ok(None);
        }
        let root = self.model.root_type(entity);
        let Some(property) = self.model.find_property(root, DISCRIMINATOR_PROPERTY) else {
            return Ok(None);
        };
        let column = self.column(alias, property.id)?;
        let mut predicate: Option<SqlExpression> = None;
        for member in self.subtree(entity) {
            let owner = self.model.entity(member)?;
            let value = owner
                .annotations
                .discriminator_value()
                .unwrap_or(owner.name.as_str())
                .to_string();
            let test = SqlExpression::eq(column.clone(), SqlExpression::literal(value));
            predicate = Some(match predicate {
                Some(existing) => SqlExpression::or(existing, test),
                None => test,
            });
        }
        Ok(predicate)
    }

    /// `entity` and every type deriving from it.
    fn subtree(&self, entity: EntityId) -> Vec<EntityId> {
        let mut out = vec![entity];
        let mut index = 0;
        while index < out.len() {
            out.extend(self.model.derived_types(out[index]));
            index += 1;
        }
        out
    }

    /// Columns of `entity`, its ancestors and its derived types, once per column name.
    fn entity_columns(&self, entity: EntityId) -> Result<Vec<&Property>, OrmGraphError> {
        let mut columns: Vec<&Property> = self.model.properties(entity);
        for derived in self.subtree(entity).into_iter().skip(1) {
            columns.extend(self.model.declared_properties(derived));
        }
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for property in columns {
            let name = self.model.column_name(property.id)?;
            if !seen.contains(&name) {
                seen.push(name);
                out.push(property);
            }
        }
        Ok(out)
    }

    fn project_entity(&self, select: &mut SelectExpression, entity: EntityId, alias: &str) -> Result<(), OrmGraphError> {
        for property in self.entity_columns(entity)? {
            select.project(self.column(alias, property.id)?, None);
        }
        Ok(())
    }

    fn named_column(&self, entity: EntityId, alias: &str, name: &str) -> Result<SqlExpression, OrmGraphError> {
        let property = self.model.find_property(entity, name).ok_or_else(|| {
            OrmGraphError::not_found(format!("property '{name}' on entity '{}'", self.entity_name(entity)))
        })?;
        self.column(alias, property.id)
    }

    fn column(&self, alias: &str, property: PropertyId) -> Result<SqlExpression, OrmGraphError> {
        let value_type = self.model.property(property)?.value_type;
        Ok(SqlExpression::column(
            Some(alias),
            &self.model.column_name(property)?,
            value_type,
        ))
    }

    fn table(&self, entity: EntityId, alias: &str) -> Result<TableExpression, OrmGraphError> {
        Ok(TableExpression::table(
            &self.model.table_name(entity)?,
            self.model.schema(entity)?.as_deref(),
            alias,
        ))
    }

    fn alias_base(&self, entity: EntityId) -> Result<String, OrmGraphError> {
        let table = self.model.table_name(entity)?;
        Ok(table
            .chars()
            .next()
            .filter(|c| c.is_alphabetic())
            .map(|c| c.to_lowercase().collect())
            .unwrap_or_else(|| "t".to_string()))
    }

    fn entity_name(&self, entity: EntityId) -> String {
        self.model
            .entity(entity)
            .map(|e| e.name.clone())
            .unwrap_or_default()
    }
}
