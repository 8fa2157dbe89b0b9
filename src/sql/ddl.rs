use tracing::debug;

use crate::{
    algo,
    errors::OrmGraphError,
    graph::ForeignKeyGraph,
    metadata::{
        DeleteBehavior, EntityId, ForeignKeyId, KeyId, Model, Property, PropertyId, ValueGenerated,
    },
    naming::UniqueNamer,
    sql::dialect::Dialect,
};

const TARGET: &str = "ormgraph::sql";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Constraint {
    PrimaryKey(KeyId),
    AlternateKey(KeyId),
    ForeignKey(ForeignKeyId),
}

/// Emits `CREATE TABLE` / `DROP TABLE` statements for a model. Each
/// inheritance hierarchy maps to the table of its root.
#[derive(Clone, Copy, Debug)]
pub struct DdlGenerator<'a> {
    dialect: &'a Dialect,
}

impl<'a> DdlGenerator<'a> {
    pub fn new(dialect: &'a Dialect) -> Self {
        Self { dialect }
    }

    /// Hierarchy roots ordered so referenced tables come first.
    pub fn table_order(&self, model: &Model) -> Result<Vec<EntityId>, OrmGraphError> {
        algo::topological_sort(&ForeignKeyGraph::by_table(model))
    }

    pub fn create_tables(&self, model: &Model) -> Result<Vec<String>, OrmGraphError> {
        let mut namer = UniqueNamer::new();
        let mut statements = Vec::new();
        for root in self.table_order(model)? {
            statements.push(self.create_table(model, root, &mut namer)?);
        }
        debug!(target: TARGET, tables = statements.len(), "create script generated");
        Ok(statements)
    }

    pub fn drop_tables(&self, model: &Model) -> Result<Vec<String>, OrmGraphError> {
        let mut order = self.table_order(model)?;
        order.reverse();
        order
            .into_iter()
            .map(|root| {
                Ok(format!(
                    "DROP TABLE {}",
                    self.dialect.delimit_qualified(
                        &model.table_name(root)?,
                        model.schema(root)?.as_deref()
                    )
                ))
            })
            .collect()
    }

    /// Statements joined into one executable script.
    pub fn create_script(&self, model: &Model) -> Result<String, OrmGraphError> {
        Ok(self.script(self.create_tables(model)?))
    }

    pub fn drop_script(&self, model: &Model) -> Result<String, OrmGraphError> {
        Ok(self.script(self.drop_tables(model)?))
    }

    fn script(&self, statements: Vec<String>) -> String {
        let separator = self.dialect.batch_command_separator();
        statements
            .into_iter()
            .map(|s| format!("{s}{separator}\n"))
            .collect()
    }

    fn create_table(
        &self,
        model: &Model,
        root: EntityId,
        namer: &mut UniqueNamer<Constraint>,
    ) -> Result<String, OrmGraphError> {
        let table = model.table_name(root)?;
        let qualified = self
            .dialect
            .delimit_qualified(&table, model.schema(root)?.as_deref());
        let hierarchy = model.hierarchy(root);
        let primary_key = model.primary_key(root).cloned();
        let inline_identity = primary_key.as_ref().and_then(|key| match key.properties.as_slice() {
            [single] => model
                .property(*single)
                .ok()
                .filter(|p| p.value_type.is_integer() && p.value_generated == ValueGenerated::OnAdd)
                .map(|p| p.id),
            _ => None,
        });

        let mut lines = Vec::new();
        let mut columns_seen = Vec::new();
        for member in &hierarchy {
            for property in model.declared_properties(*member) {
                let column = model.column_name(property.id)?;
                if columns_seen.contains(&column) {
                    continue;
                }
                columns_seen.push(column.clone());
                let is_key = model
                    .keys(property.entity)
                    .iter()
                    .any(|k| k.properties.contains(&property.id));
                let nullable = property.nullable || *member != root;
                let mut line = format!(
                    "{} {}",
                    self.dialect.delimit_identifier(&column),
                    self.column_type(property, is_key)
                );
                line.push_str(if nullable { " NULL" } else { " NOT NULL" });
                if let Some(default) = property.annotations.default_value_sql() {
                    line.push_str(&format!(" DEFAULT ({default})"));
                }
                if inline_identity == Some(property.id) {
                    match self.dialect.type_mapping().identity_clause() {
                        Some(identity) => {
                            line.push(' ');
                            line.push_str(identity);
                        }
                        None => {
                            if let Some(key) = &primary_key {
                                let name = self.constraint_name(
                                    model,
                                    namer,
                                    Constraint::PrimaryKey(key.id),
                                    &format!("PK_{table}"),
                                )?;
                                line.push_str(&format!(
                                    " CONSTRAINT {} PRIMARY KEY AUTOINCREMENT",
                                    self.dialect.delimit_identifier(&name)
                                ));
                            }
                        }
                    }
                }
                lines.push(line);
            }
        }

        let identity_inlined =
            inline_identity.is_some() && self.dialect.type_mapping().identity_clause().is_none();
        if let Some(key) = primary_key.as_ref().filter(|_| !identity_inlined) {
            let name = self.constraint_name(
                model,
                namer,
                Constraint::PrimaryKey(key.id),
                &format!("PK_{table}"),
            )?;
            lines.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.dialect.delimit_identifier(&name),
                self.column_list(model, &key.properties)?
            ));
        }
        for member in &hierarchy {
            for key in model.keys(*member) {
                if Some(key.id) == primary_key.as_ref().map(|k| k.id) {
                    continue;
                }
                let columns = self.column_names(model, &key.properties)?;
                let name = self.constraint_name(
                    model,
                    namer,
                    Constraint::AlternateKey(key.id),
                    &format!("AK_{table}_{}", columns.join("_")),
                )?;
                lines.push(format!(
                    "CONSTRAINT {} UNIQUE ({})",
                    self.dialect.delimit_identifier(&name),
                    self.column_list(model, &key.properties)?
                ));
            }
        }
        for member in &hierarchy {
            for fk in model.foreign_keys(*member) {
                let principal_table = model.table_name(fk.principal)?;
                let columns = self.column_names(model, &fk.properties)?;
                let name = self.constraint_name(
                    model,
                    namer,
                    Constraint::ForeignKey(fk.id),
                    &format!("FK_{table}_{principal_table}_{}", columns.join("_")),
                )?;
                let principal_key = model.key(fk.principal_key)?;
                let mut line = format!(
                    "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                    self.dialect.delimit_identifier(&name),
                    self.column_list(model, &fk.properties)?,
                    self.dialect.delimit_qualified(
                        &principal_table,
                        model.schema(fk.principal)?.as_deref()
                    ),
                    self.column_list(model, &principal_key.properties)?
                );
                match fk.delete_behavior {
                    DeleteBehavior::Cascade => line.push_str(" ON DELETE CASCADE"),
                    DeleteBehavior::SetNull => line.push_str(" ON DELETE SET NULL"),
                    DeleteBehavior::Restrict => {}
                }
                lines.push(line);
            }
        }

        Ok(format!(
            "CREATE TABLE {qualified} (\n    {}\n)",
            lines.join(",\n    ")
        ))
    }

    fn column_type(&self, property: &Property, is_key: bool) -> String {
        property
            .annotations
            .column_type()
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.dialect
                    .type_mapping()
                    .store_type(property.value_type, is_key)
            })
    }

    fn column_names(
        &self,
        model: &Model,
        properties: &[PropertyId],
    ) -> Result<Vec<String>, OrmGraphError> {
        properties.iter().map(|p| model.column_name(*p)).collect()
    }

    fn column_list(
        &self,
        model: &Model,
        properties: &[PropertyId],
    ) -> Result<String, OrmGraphError> {
        Ok(self
            .column_names(model, properties)?
            .iter()
            .map(|c| self.dialect.delimit_identifier(c))
            .collect::<Vec<_>>()
            .join(", "))
    }

    fn constraint_name(
        &self,
        model: &Model,
        namer: &mut UniqueNamer<Constraint>,
        item: Constraint,
        fallback: &str,
    ) -> Result<String, OrmGraphError> {
        let annotations = match item {
            Constraint::PrimaryKey(key) | Constraint::AlternateKey(key) => {
                &model.key(key)?.annotations
            }
            Constraint::ForeignKey(fk) => &model.foreign_key(fk)?.annotations,
        };
        let base = annotations.constraint_name().unwrap_or(fallback).to_string();
        Ok(namer.name_for(item, &base))
    }
}
