//! # Model Scripts
//!
//! A model script is a TOML list of configuration directives replayed in
//! order against a fresh [`Model`] through its configuration facade.
//!
//! ```toml
//! [[directive]]
//! op = "entity"
//! name = "Customer"
//!
//! [[directive]]
//! op = "property"
//! entity = "Customer"
//! name = "Id"
//! type = "i32"
//!
//! [[directive]]
//! op = "primary_key"
//! entity = "Customer"
//! properties = ["Id"]
//! source = "annotation"
//! ```
//!
//! Directives without a `source` use the configured default provenance.

use crate::config::AppConfig;
use crate::error::AppError;
use schemata_core::{
    BackingType, DeleteBehavior, EntityTypeId, Model, NavigationMember, Outcome, Provenance,
    SchemaError, TypeRegistration, ValueType,
};
use serde::Deserialize;

// =============================================================================
// SCRIPT FORMAT
// =============================================================================

/// A parsed model script.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelScript {
    #[serde(default, rename = "directive")]
    pub directives: Vec<DirectiveEntry>,
}

/// One directive plus its optional provenance.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectiveEntry {
    #[serde(default)]
    pub source: Option<Provenance>,
    #[serde(flatten)]
    pub directive: Directive,
}

/// A single configuration edit, addressed by names.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Directive {
    Entity {
        name: String,
        backing: Option<String>,
        #[serde(default)]
        extends: Vec<String>,
        registration: Option<TypeRegistration>,
    },
    BaseType {
        entity: String,
        base: Option<String>,
    },
    Property {
        entity: String,
        name: String,
        #[serde(rename = "type")]
        value_type: String,
        #[serde(default)]
        nullable: bool,
    },
    RemoveProperty {
        entity: String,
        name: String,
    },
    Required {
        entity: String,
        property: String,
        required: bool,
    },
    MaxLength {
        entity: String,
        property: String,
        length: Option<u32>,
    },
    ConcurrencyToken {
        entity: String,
        property: String,
        token: bool,
    },
    PrimaryKey {
        entity: String,
        properties: Vec<String>,
    },
    Key {
        entity: String,
        properties: Vec<String>,
    },
    Keyless {
        entity: String,
        keyless: bool,
    },
    Index {
        entity: String,
        properties: Vec<String>,
        unique: Option<bool>,
    },
    Relationship {
        dependent: String,
        principal: String,
        #[serde(default)]
        foreign_key: Vec<String>,
        navigation: Option<String>,
        inverse: Option<String>,
        inverse_collection: Option<bool>,
        required: Option<bool>,
        unique: Option<bool>,
        ownership: Option<bool>,
        on_delete: Option<DeleteBehavior>,
    },
    ManyToMany {
        left: String,
        left_navigation: String,
        right: String,
        right_navigation: String,
    },
    Ignore {
        name: String,
    },
    RemoveEntity {
        name: String,
    },
    MarkOwned {
        type_name: String,
    },
    MarkShared {
        type_name: String,
    },
}

impl Directive {
    /// The `op` tag of this directive.
    pub fn op(&self) -> &'static str {
        match self {
            Directive::Entity { .. } => "entity",
            Directive::BaseType { .. } => "base_type",
            Directive::Property { .. } => "property",
            Directive::RemoveProperty { .. } => "remove_property",
            Directive::Required { .. } => "required",
            Directive::MaxLength { .. } => "max_length",
            Directive::ConcurrencyToken { .. } => "concurrency_token",
            Directive::PrimaryKey { .. } => "primary_key",
            Directive::Key { .. } => "key",
            Directive::Keyless { .. } => "keyless",
            Directive::Index { .. } => "index",
            Directive::Relationship { .. } => "relationship",
            Directive::ManyToMany { .. } => "many_to_many",
            Directive::Ignore { .. } => "ignore",
            Directive::RemoveEntity { .. } => "remove_entity",
            Directive::MarkOwned { .. } => "mark_owned",
            Directive::MarkShared { .. } => "mark_shared",
        }
    }
}

impl ModelScript {
    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        toml::from_str(text).map_err(|e| AppError::Script(e.to_string()))
    }

    /// Replay every directive against `model`.
    ///
    /// A directive that violates a structural rule aborts the run; the
    /// model keeps every edit accepted before it.
    pub fn apply(&self, model: &mut Model, config: &AppConfig) -> Result<ScriptReport, AppError> {
        let mut report = ScriptReport::default();
        for (index, entry) in self.directives.iter().enumerate() {
            let op = entry.directive.op();
            let source = entry.source.unwrap_or(config.default_source);
            let applied = apply_directive(model, &entry.directive, source)
                .map_err(|source| AppError::Directive { index, op, source })?;

            if applied {
                report.applied += 1;
                continue;
            }
            if config.fail_on_outranked {
                return Err(AppError::Outranked { index, op });
            }
            tracing::warn!(index, op, %source, "directive outranked");
            report.outranked.push(index);
        }
        Ok(report)
    }
}

/// What a script run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub applied: usize,
    /// Indices of outranked directives.
    pub outranked: Vec<usize>,
    /// Entity types dropped by the cleanup checkpoint.
    pub removed: Vec<String>,
}

// =============================================================================
// DIRECTIVE APPLICATION
// =============================================================================

fn resolve(model: &Model, name: &str) -> Result<EntityTypeId, SchemaError> {
    model
        .find_entity_type(name)
        .ok_or_else(|| SchemaError::UnknownMember {
            what: "entity type",
            name: name.to_string(),
        })
}

fn names(list: &[String]) -> Vec<&str> {
    list.iter().map(String::as_str).collect()
}

/// Apply one directive; `false` when it was outranked.
fn apply_directive(
    model: &mut Model,
    directive: &Directive,
    source: Provenance,
) -> Result<bool, SchemaError> {
    let applied = match directive {
        Directive::Entity {
            name,
            backing,
            extends,
            registration,
        } => {
            let mut backing_type = BackingType::new(backing.as_deref().unwrap_or(name));
            for ancestor in extends {
                backing_type = backing_type.extends(ancestor.as_str());
            }
            model
                .add_entity_type(
                    name,
                    Some(backing_type),
                    registration.unwrap_or(TypeRegistration::Ordinary),
                    source,
                )?
                .is_applied()
        }
        Directive::BaseType { entity, base } => {
            let entity = resolve(model, entity)?;
            let base = base.as_deref().map(|b| resolve(model, b)).transpose()?;
            model
                .entity(entity)
                .with_source(source)
                .has_base_type(base)?
                .is_applied()
        }
        Directive::Property {
            entity,
            name,
            value_type,
            nullable,
        } => {
            let entity = resolve(model, entity)?;
            let value_type = if *nullable {
                ValueType::nullable(value_type.as_str())
            } else {
                ValueType::new(value_type.as_str())
            };
            model
                .entity(entity)
                .with_source(source)
                .property(name, value_type)?
                .is_applied()
        }
        Directive::RemoveProperty { entity, name } => {
            let entity = resolve(model, entity)?;
            model
                .entity(entity)
                .with_source(source)
                .remove_property(name)?
                .is_applied()
        }
        Directive::Required {
            entity,
            property,
            required,
        } => {
            let entity = resolve(model, entity)?;
            model
                .entity(entity)
                .with_source(source)
                .is_required(property, *required)?
                .is_applied()
        }
        Directive::MaxLength {
            entity,
            property,
            length,
        } => {
            let entity = resolve(model, entity)?;
            model
                .entity(entity)
                .with_source(source)
                .has_max_length(property, *length)?
                .is_applied()
        }
        Directive::ConcurrencyToken {
            entity,
            property,
            token,
        } => {
            let entity = resolve(model, entity)?;
            model
                .entity(entity)
                .with_source(source)
                .is_concurrency_token(property, *token)?
                .is_applied()
        }
        Directive::PrimaryKey { entity, properties } => {
            let entity = resolve(model, entity)?;
            model
                .entity(entity)
                .with_source(source)
                .has_primary_key(&names(properties))?
                .is_applied()
        }
        Directive::Key { entity, properties } => {
            let entity = resolve(model, entity)?;
            model
                .entity(entity)
                .with_source(source)
                .has_key(&names(properties))?
                .is_applied()
        }
        Directive::Keyless { entity, keyless } => {
            let entity = resolve(model, entity)?;
            model
                .entity(entity)
                .with_source(source)
                .has_no_key(*keyless)?
                .is_applied()
        }
        Directive::Index {
            entity,
            properties,
            unique,
        } => {
            let entity = resolve(model, entity)?;
            let Outcome::Applied(index) = model
                .entity(entity)
                .with_source(source)
                .has_index(&names(properties))?
            else {
                return Ok(false);
            };
            match unique {
                Some(unique) => model
                    .set_index_unique(index, Some(*unique), source)?
                    .is_applied(),
                None => true,
            }
        }
        Directive::Relationship {
            dependent,
            principal,
            foreign_key,
            navigation,
            inverse,
            inverse_collection,
            required,
            unique,
            ownership,
            on_delete,
        } => {
            let dependent = resolve(model, dependent)?;
            let principal = resolve(model, principal)?;
            let Outcome::Applied(fk) = model
                .entity(dependent)
                .with_source(source)
                .references(principal, &names(foreign_key), navigation.as_deref())?
            else {
                return Ok(false);
            };

            // Navigation first: it fixes uniqueness, and ownership needs it.
            let mut relationship = model.relationship_builder(fk).with_source(source);
            let mut applied = true;
            if let Some(inverse) = inverse {
                let member = if inverse_collection.unwrap_or(true) {
                    NavigationMember::collection(inverse.as_str())
                } else {
                    NavigationMember::reference(inverse.as_str())
                };
                applied &= relationship
                    .with_navigation_to_dependent(Some(member))?
                    .is_applied();
            }
            if let Some(unique) = unique {
                applied &= relationship.is_unique(*unique)?.is_applied();
            }
            if let Some(required) = required {
                applied &= relationship.is_required(*required)?.is_applied();
            }
            if let Some(ownership) = ownership {
                applied &= relationship.is_ownership(*ownership)?.is_applied();
            }
            if let Some(behavior) = on_delete {
                applied &= relationship.on_delete(*behavior)?.is_applied();
            }
            applied
        }
        Directive::ManyToMany {
            left,
            left_navigation,
            right,
            right_navigation,
        } => {
            let left = resolve(model, left)?;
            let right = resolve(model, right)?;
            let Outcome::Applied(left_skip) = model
                .entity(left)
                .with_source(source)
                .skip_navigation(NavigationMember::collection(left_navigation.as_str()), right)?
            else {
                return Ok(false);
            };
            let Outcome::Applied(right_skip) = model
                .entity(right)
                .with_source(source)
                .skip_navigation(NavigationMember::collection(right_navigation.as_str()), left)?
            else {
                return Ok(false);
            };
            model
                .create_join_entity(left_skip, right_skip, source)?
                .is_applied()
        }
        Directive::Ignore { name } => model.ignore(name, source)?.is_applied(),
        Directive::RemoveEntity { name } => {
            let entity = resolve(model, name)?;
            model.remove_entity_type(entity, source)?.is_applied()
        }
        Directive::MarkOwned { type_name } => {
            model.mark_owned(type_name, source)?;
            true
        }
        Directive::MarkShared { type_name } => {
            model.mark_shared(type_name, source)?;
            true
        }
    };
    Ok(applied)
}
