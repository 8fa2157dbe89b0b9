use tracing::debug;

use crate::{
    conventions::{Convention, ConventionEvent, ModelBuilder, TARGET},
    errors::OrmGraphError,
    metadata::{
        CoreModelValidator, ForeignKeyId, MetadataItem, ModelValidator, NavigationDirection,
        PropertyId, RelationalAnnotation, RelationalModelValidator, ValueGenerated, ValueType,
    },
};

pub const DISCRIMINATOR_PROPERTY: &str = "Discriminator";

/// Maps each entity to a table named after it unless a table was already set.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableNameConvention;

impl Convention for TableNameConvention {
    fn name(&self) -> &str {
        "TableNameConvention"
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent) -> Result<(), OrmGraphError> {
        let ConventionEvent::EntityAdded(id) = event else {
            return Ok(());
        };
        let entity = builder.model().entity(*id)?;
        if entity.annotations.table_name().is_none() {
            let table = RelationalAnnotation::TableName(entity.name.clone());
            builder.annotate(MetadataItem::Entity(*id), table)?;
        }
        Ok(())
    }
}

/// A property named `Id` or `<Entity>Id` becomes the primary key of a root
/// entity that has none yet.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyDiscoveryConvention;

impl Convention for KeyDiscoveryConvention {
    fn name(&self) -> &str {
        "KeyDiscoveryConvention"
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent) -> Result<(), OrmGraphError> {
        let ConventionEvent::PropertyAdded(id) = event else {
            return Ok(());
        };
        let property = builder.model().property(*id)?;
        let entity = builder.model().entity(property.entity)?;
        if property.shadow || entity.base.is_some() || entity.primary_key.is_some() {
            return Ok(());
        }
        let qualified = format!("{}Id", entity.name);
        if property.name.eq_ignore_ascii_case("Id") || property.name.eq_ignore_ascii_case(&qualified)
        {
            debug!(target: TARGET, entity = %entity.name, key = %property.name, "key discovered");
            builder.primary_key(&[*id])?;
        }
        Ok(())
    }
}

/// Single integer or GUID primary keys are generated on add, unless they also
/// carry a foreign key.
#[derive(Clone, Copy, Debug, Default)]
pub struct ValueGenerationConvention;

impl Convention for ValueGenerationConvention {
    fn name(&self) -> &str {
        "ValueGenerationConvention"
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent) -> Result<(), OrmGraphError> {
        match event {
            ConventionEvent::PrimaryKeySet { key, .. } => {
                let key = builder.model().key(*key)?.clone();
                let [single] = key.properties.as_slice() else {
                    return Ok(());
                };
                let property = builder.model().property(*single)?;
                let generatable = property.value_type.is_integer()
                    || property.value_type == ValueType::Guid;
                let in_foreign_key = builder
                    .model()
                    .foreign_keys(property.entity)
                    .iter()
                    .any(|fk| fk.properties.contains(single));
                if generatable && !in_foreign_key && property.value_generated == ValueGenerated::Never {
                    builder.set_value_generated(*single, ValueGenerated::OnAdd)?;
                }
                Ok(())
            }
            ConventionEvent::ForeignKeyAdded(fk) => {
                let fk = builder.model().foreign_key(*fk)?.clone();
                let key_properties: Vec<PropertyId> = builder
                    .model()
                    .primary_key(fk.dependent)
                    .map(|k| k.properties.clone())
                    .unwrap_or_default();
                for property in fk.properties.iter().filter(|p| key_properties.contains(p)) {
                    if builder.model().property(*property)?.value_generated == ValueGenerated::OnAdd {
                        builder.set_value_generated(*property, ValueGenerated::Never)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Replaces shadow foreign key properties by declared properties named
/// `<Navigation><PrincipalKey>` or `<Principal><PrincipalKey>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForeignKeyPropertyDiscoveryConvention;

impl ForeignKeyPropertyDiscoveryConvention {
    fn candidates(
        builder: &ModelBuilder,
        fk: ForeignKeyId,
    ) -> Result<Option<Vec<PropertyId>>, OrmGraphError> {
        let model = builder.model();
        let fk = model.foreign_key(fk)?;
        let principal = &model.entity(fk.principal)?.name;
        let key = model.key(fk.principal_key)?;
        let mut by_prefix = Vec::new();
        let mut by_principal = Vec::new();
        for (shadow, key_property) in fk.properties.iter().zip(&key.properties) {
            let shadow = model.property(*shadow)?;
            let key_property = model.property(*key_property)?;
            let declared = |name: &str| {
                model
                    .find_property(fk.dependent, name)
                    .filter(|p| !p.shadow && p.value_type == shadow.value_type)
                    .map(|p| p.id)
            };
            by_prefix.push(declared(shadow.name.trim_end_matches(|c: char| c.is_ascii_digit())));
            by_principal.push(declared(&format!("{principal}{}", key_property.name)));
        }
        let taken = |candidate: &[PropertyId]| {
            model
                .foreign_keys(fk.dependent)
                .iter()
                .any(|other| other.id != fk.id && other.properties == candidate)
        };
        for option in [by_prefix, by_principal] {
            let Some(found) = option.into_iter().collect::<Option<Vec<_>>>() else {
                continue;
            };
            if !taken(&found) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

impl Convention for ForeignKeyPropertyDiscoveryConvention {
    fn name(&self) -> &str {
        "ForeignKeyPropertyDiscoveryConvention"
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent) -> Result<(), OrmGraphError> {
        let ConventionEvent::ForeignKeyAdded(id) = event else {
            return Ok(());
        };
        let fk = builder.model().foreign_key(*id)?.clone();
        let all_shadow = fk
            .properties
            .iter()
            .filter_map(|p| builder.model().property(*p).ok())
            .all(|p| p.shadow);
        if !all_shadow {
            return Ok(());
        }
        let Some(declared) = Self::candidates(builder, *id)? else {
            return Ok(());
        };
        let navigations: Vec<(String, NavigationDirection)> =
            [fk.dependent_to_principal, fk.principal_to_dependent]
                .into_iter()
                .flatten()
                .filter_map(|n| builder.model().navigation(n).ok())
                .map(|n| (n.name.clone(), n.direction))
                .collect();
        debug!(
            target: TARGET,
            dependent = %builder.model().entity(fk.dependent)?.name,
            "replacing shadow foreign key properties"
        );
        builder.remove_foreign_key(*id)?;
        let replacement = builder.foreign_key(&declared, fk.principal_key)?;
        for (name, direction) in navigations {
            builder.navigation(replacement, &name, direction)?;
        }
        for shadow in fk.properties {
            builder.remove_property(shadow)?;
        }
        Ok(())
    }
}

/// Keeps `ForeignKey::required` in step with the nullability of its properties.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequiredForeignKeyConvention;

impl Convention for RequiredForeignKeyConvention {
    fn name(&self) -> &str {
        "RequiredForeignKeyConvention"
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent) -> Result<(), OrmGraphError> {
        let affected: Vec<ForeignKeyId> = match event {
            ConventionEvent::ForeignKeyAdded(fk) => vec![*fk],
            ConventionEvent::PropertyNullabilityChanged(property) => {
                let entity = builder.model().property(*property)?.entity;
                builder
                    .model()
                    .foreign_keys(entity)
                    .iter()
                    .filter(|fk| fk.properties.contains(property))
                    .map(|fk| fk.id)
                    .collect()
            }
            _ => return Ok(()),
        };
        for fk in affected {
            let required = builder
                .model()
                .foreign_key(fk)?
                .properties
                .iter()
                .filter_map(|p| builder.model().property(*p).ok())
                .all(|p| !p.nullable);
            builder.model_mut().set_foreign_key_required(fk, required)?;
        }
        Ok(())
    }
}

/// Adds a shadow `Discriminator` column to a hierarchy root and gives every
/// member a discriminator value equal to its name.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscriminatorConvention;

impl Convention for DiscriminatorConvention {
    fn name(&self) -> &str {
        "DiscriminatorConvention"
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent) -> Result<(), OrmGraphError> {
        let ConventionEvent::BaseTypeSet { entity, .. } = event else {
            return Ok(());
        };
        let hierarchy = builder.model().hierarchy(*entity);
        let [root, ..] = hierarchy.as_slice() else {
            return Ok(());
        };
        if hierarchy.len() < 2 {
            return Ok(());
        }
        builder.shadow_property(*root, DISCRIMINATOR_PROPERTY, ValueType::Text)?;
        for member in &hierarchy {
            let current = builder.model().entity(*member)?;
            if current.annotations.discriminator_value().is_none() {
                let value = RelationalAnnotation::DiscriminatorValue(current.name.clone());
                builder.annotate(MetadataItem::Entity(*member), value)?;
            }
        }
        Ok(())
    }
}

/// Drops a property or navigation once its name is ignored on the entity.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoredMemberConvention;

impl Convention for IgnoredMemberConvention {
    fn name(&self) -> &str {
        "IgnoredMemberConvention"
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent) -> Result<(), OrmGraphError> {
        let ConventionEvent::MemberIgnored { entity, name } = event else {
            return Ok(());
        };
        let property = builder
            .model()
            .declared_properties(*entity)
            .into_iter()
            .find(|p| &p.name == name)
            .map(|p| p.id);
        if let Some(property) = property {
            return builder.remove_property(property);
        }
        let navigation = builder
            .model()
            .navigations(*entity)
            .into_iter()
            .find(|n| &n.name == name)
            .map(|n| (n.id, n.foreign_key));
        if let Some((navigation, fk)) = navigation {
            builder.remove_navigation(navigation)?;
            let orphan = builder.model().foreign_key(fk).is_ok_and(|fk| {
                fk.dependent_to_principal.is_none() && fk.principal_to_dependent.is_none()
            });
            if orphan {
                builder.remove_foreign_key(fk)?;
            }
        }
        Ok(())
    }
}

/// Runs a [`ModelValidator`] when the model is built and reports its findings.
pub struct ValidationConvention {
    validator: Box<dyn ModelValidator>,
}

impl ValidationConvention {
    pub fn new(validator: Box<dyn ModelValidator>) -> Self {
        Self { validator }
    }

    pub fn core() -> Self {
        Self::new(Box::new(CoreModelValidator))
    }

    pub fn relational() -> Self {
        Self::new(Box::new(RelationalModelValidator))
    }
}

impl Convention for ValidationConvention {
    fn name(&self) -> &str {
        self.validator.name()
    }

    fn apply(&self, builder: &mut ModelBuilder, event: &ConventionEvent) -> Result<(), OrmGraphError> {
        if *event != ConventionEvent::ModelBuilt {
            return Ok(());
        }
        for violation in self.validator.violations(builder.model()) {
            builder.report_violation(violation);
        }
        Ok(())
    }
}
