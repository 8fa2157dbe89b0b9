use std::collections::BTreeMap;

use ahash::AHashSet;

use crate::{
    errors::OrmGraphError,
    metadata::{
        model::{MAX_INHERITANCE_DEPTH, Model},
        types::{EntityId, NavigationDirection, PropertyId, ValueType},
    },
};

/// Whole-model check that reports every violation it finds.
pub trait ModelValidator: Send + Sync {
    fn name(&self) -> &'static str;
    fn violations(&self, model: &Model) -> Vec<String>;
}

/// Runs every validator and aggregates their findings into one error.
pub fn validate(model: &Model, validators: &[&dyn ModelValidator]) -> Result<(), OrmGraphError> {
    let violations: Vec<String> = validators
        .iter()
        .flat_map(|v| v.violations(model))
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(OrmGraphError::InvalidModel(violations))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CoreModelValidator;

impl ModelValidator for CoreModelValidator {
    fn name(&self) -> &'static str {
        "CoreModelValidator"
    }

    fn violations(&self, model: &Model) -> Vec<String> {
        let mut out = Vec::new();
        for entity in model.entities() {
            if let Some(cycle) = inheritance_cycle(model, entity.id) {
                out.push(format!(
                    "entity '{}' has a cyclic or too deep base chain ({} levels)",
                    entity.name, cycle
                ));
                continue;
            }
            if entity.base.is_none() && entity.primary_key.is_none() {
                out.push(format!("entity '{}' has no primary key", entity.name));
            }
        }
        for fk in model.all_foreign_keys() {
            let dependent = entity_name(model, fk.dependent);
            match model.key(fk.principal_key) {
                Ok(key) if key.properties.len() != fk.properties.len() => out.push(format!(
                    "foreign key on '{dependent}' has {} properties but its principal key has {}",
                    fk.properties.len(),
                    key.properties.len()
                )),
                Ok(_) => {}
                Err(_) => out.push(format!(
                    "foreign key on '{dependent}' references a removed key"
                )),
            }
            for (slot, expected_owner, direction) in [
                (
                    fk.dependent_to_principal,
                    fk.dependent,
                    NavigationDirection::DependentToPrincipal,
                ),
                (
                    fk.principal_to_dependent,
                    fk.principal,
                    NavigationDirection::PrincipalToDependent,
                ),
            ] {
                let Some(nav) = slot else { continue };
                match model.navigation(nav) {
                    Ok(n) if n.entity != expected_owner || n.direction != direction => {
                        out.push(format!(
                            "navigation '{}' on '{}' does not match the direction of its foreign key",
                            n.name,
                            entity_name(model, n.entity)
                        ))
                    }
                    Ok(_) => {}
                    Err(_) => out.push(format!(
                        "foreign key on '{dependent}' points at a removed navigation"
                    )),
                }
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RelationalModelValidator;

impl ModelValidator for RelationalModelValidator {
    fn name(&self) -> &'static str {
        "RelationalModelValidator"
    }

    fn violations(&self, model: &Model) -> Vec<String> {
        let mut out = Vec::new();
        let mut tables: BTreeMap<(Option<String>, String), Vec<String>> = BTreeMap::new();
        for entity in model.entities().filter(|e| e.base.is_none()) {
            let (Ok(table), Ok(schema)) = (model.table_name(entity.id), model.schema(entity.id))
            else {
                continue;
            };
            tables
                .entry((schema, table))
                .or_default()
                .push(entity.name.clone());
        }
        for ((schema, table), owners) in &tables {
            if owners.len() > 1 {
                let qualified = match schema {
                    Some(s) => format!("{s}.{table}"),
                    None => table.clone(),
                };
                out.push(format!(
                    "table '{qualified}' is mapped by unrelated entities: {}",
                    owners.join(", ")
                ));
            }
        }

        for root in model.entities().filter(|e| e.base.is_none()) {
            let hierarchy = model.hierarchy(root.id);
            let table = model.table_name(root.id).unwrap_or_else(|_| root.name.clone());
            let mut columns: BTreeMap<String, Vec<(PropertyId, EntityId, ValueType)>> =
                BTreeMap::new();
            for member in &hierarchy {
                for property in model.declared_properties(*member) {
                    let column = model
                        .column_name(property.id)
                        .unwrap_or_else(|_| property.name.clone());
                    columns.entry(column).or_default().push((
                        property.id,
                        property.entity,
                        property.value_type,
                    ));
                }
            }
            for (column, users) in &columns {
                let clash = users.iter().enumerate().any(|(i, (_, owner, ty))| {
                    users[..i].iter().any(|(_, other_owner, other_ty)| {
                        ty != other_ty
                            || model.base_chain(*owner).contains(other_owner)
                            || model.base_chain(*other_owner).contains(owner)
                    })
                });
                if clash {
                    out.push(format!(
                        "column '{column}' is mapped more than once in table '{table}'"
                    ));
                }
            }

            if hierarchy.len() > 1 {
                let mut seen = AHashSet::new();
                for member in &hierarchy {
                    let Ok(entity) = model.entity(*member) else { continue };
                    match entity.annotations.discriminator_value() {
                        None => out.push(format!(
                            "entity '{}' in hierarchy '{}' has no discriminator value",
                            entity.name, root.name
                        )),
                        Some(value) if !seen.insert(value.to_string()) => out.push(format!(
                            "discriminator value '{value}' is used twice in hierarchy '{}'",
                            root.name
                        )),
                        Some(_) => {}
                    }
                }
            }
        }
        out
    }
}

fn entity_name(model: &Model, id: EntityId) -> String {
    model
        .entity(id)
        .map(|e| e.name.clone())
        .unwrap_or_else(|_| id.to_string())
}

fn inheritance_cycle(model: &Model, entity: EntityId) -> Option<usize> {
    let mut seen = AHashSet::new();
    let mut current = Some(entity);
    while let Some(id) = current {
        if !seen.insert(id) || seen.len() > MAX_INHERITANCE_DEPTH {
            return Some(seen.len());
        }
        current = model.base_type(id);
    }
    None
}
