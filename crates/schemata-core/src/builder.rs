//! # Configuration Facade
//!
//! Borrow-scoped builders that address members by name and forward every
//! call to the matching `Model` mutator at a fixed provenance (`Explicit`
//! unless changed with `with_source`). Front-ends such as the model script
//! runner funnel through here.

use crate::model::Model;
use crate::provenance::{Outcome, Provenance};
use crate::types::{
    DeleteBehavior, EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, NavigationMember,
    PropertyId, SchemaError, SkipNavigationId, ValueType,
};

// =============================================================================
// ENTITY TYPE BUILDER
// =============================================================================

/// Facade over one entity type.
pub struct EntityTypeBuilder<'a> {
    model: &'a mut Model,
    entity: EntityTypeId,
    source: Provenance,
}

impl Model {
    /// Configure `entity` through the facade.
    pub fn entity(&mut self, entity: EntityTypeId) -> EntityTypeBuilder<'_> {
        EntityTypeBuilder {
            model: self,
            entity,
            source: Provenance::Explicit,
        }
    }

    /// Configure `fk` through the facade.
    pub fn relationship_builder(&mut self, fk: ForeignKeyId) -> ForeignKeyBuilder<'_> {
        ForeignKeyBuilder {
            model: self,
            fk,
            source: Provenance::Explicit,
        }
    }

    /// Resolve member names visible on `entity`.
    pub(crate) fn resolve_property_names(
        &self,
        entity: EntityTypeId,
        names: &[&str],
    ) -> Result<Vec<PropertyId>, SchemaError> {
        names
            .iter()
            .map(|name| {
                self.find_property(entity, name)
                    .ok_or_else(|| SchemaError::UnknownMember {
                        what: "property",
                        name: format!("{}.{}", self.entity_name(entity), name),
                    })
            })
            .collect()
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

impl EntityTypeBuilder<'_> {
    /// Use `source` for every following call.
    #[must_use]
    pub fn with_source(mut self, source: Provenance) -> Self {
        self.source = source;
        self
    }

    pub fn id(&self) -> EntityTypeId {
        self.entity
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    pub fn has_base_type(&mut self, base: Option<EntityTypeId>) -> Result<Outcome<()>, SchemaError> {
        self.model.set_base_type(self.entity, base, self.source)
    }

    pub fn property(
        &mut self,
        name: &str,
        value_type: ValueType,
    ) -> Result<Outcome<PropertyId>, SchemaError> {
        self.model
            .add_property(self.entity, name, value_type, self.source)
    }

    /// Remove a property declared on this entity type.
    pub fn remove_property(&mut self, name: &str) -> Result<Outcome<()>, SchemaError> {
        let property = self.single_property(name)?;
        self.model.remove_property(property, self.source)
    }

    pub fn is_required(&mut self, name: &str, required: bool) -> Result<Outcome<()>, SchemaError> {
        let property = self.single_property(name)?;
        self.model
            .set_nullable(property, Some(!required), self.source)
    }

    pub fn has_max_length(
        &mut self,
        name: &str,
        length: Option<u32>,
    ) -> Result<Outcome<()>, SchemaError> {
        let property = self.single_property(name)?;
        self.model.set_max_length(property, length, self.source)
    }

    pub fn is_concurrency_token(
        &mut self,
        name: &str,
        token: bool,
    ) -> Result<Outcome<()>, SchemaError> {
        let property = self.single_property(name)?;
        self.model
            .set_concurrency_token(property, Some(token), self.source)
    }

    pub fn has_key(&mut self, names: &[&str]) -> Result<Outcome<KeyId>, SchemaError> {
        let properties = self.model.resolve_property_names(self.entity, names)?;
        self.model.add_key(self.entity, &properties, self.source)
    }

    pub fn has_primary_key(&mut self, names: &[&str]) -> Result<Outcome<KeyId>, SchemaError> {
        let properties = self.model.resolve_property_names(self.entity, names)?;
        self.model
            .set_primary_key(self.entity, &properties, self.source)
    }

    pub fn has_no_key(&mut self, keyless: bool) -> Result<Outcome<()>, SchemaError> {
        self.model
            .set_keyless(self.entity, Some(keyless), self.source)
    }

    pub fn has_index(&mut self, names: &[&str]) -> Result<Outcome<IndexId>, SchemaError> {
        let properties = self.model.resolve_property_names(self.entity, names)?;
        self.model.add_index(self.entity, &properties, self.source)
    }

    /// Find or create the relationship from this entity type to
    /// `principal`, attaching `navigation` on this side when given.
    ///
    /// Empty `foreign_key` means conventional property names.
    pub fn references(
        &mut self,
        principal: EntityTypeId,
        foreign_key: &[&str],
        navigation: Option<&str>,
    ) -> Result<Outcome<ForeignKeyId>, SchemaError> {
        let Outcome::Applied(fk) = self.model.add_relationship(
            self.entity,
            principal,
            &owned(foreign_key),
            navigation,
            self.source,
        )?
        else {
            return Ok(Outcome::Outranked);
        };
        if let Some(navigation) = navigation {
            if self
                .model
                .set_dependent_to_principal(
                    fk,
                    Some(NavigationMember::reference(navigation)),
                    self.source,
                )?
                .is_outranked()
            {
                return Ok(Outcome::Outranked);
            }
        }
        Ok(Outcome::Applied(fk))
    }

    pub fn skip_navigation(
        &mut self,
        member: NavigationMember,
        target: EntityTypeId,
    ) -> Result<Outcome<SkipNavigationId>, SchemaError> {
        self.model
            .add_skip_navigation(self.entity, member, target, self.source)
    }

    fn single_property(&self, name: &str) -> Result<PropertyId, SchemaError> {
        self.model
            .resolve_property_names(self.entity, &[name])?
            .first()
            .copied()
            .ok_or_else(|| SchemaError::UnknownMember {
                what: "property",
                name: name.to_string(),
            })
    }
}

// =============================================================================
// FOREIGN KEY BUILDER
// =============================================================================

/// Facade over one relationship.
pub struct ForeignKeyBuilder<'a> {
    model: &'a mut Model,
    fk: ForeignKeyId,
    source: Provenance,
}

impl ForeignKeyBuilder<'_> {
    #[must_use]
    pub fn with_source(mut self, source: Provenance) -> Self {
        self.source = source;
        self
    }

    pub fn id(&self) -> ForeignKeyId {
        self.fk
    }

    pub fn has_foreign_key(&mut self, names: &[&str]) -> Result<Outcome<()>, SchemaError> {
        self.model
            .set_foreign_key_properties(self.fk, &owned(names), self.source)
    }

    pub fn has_principal_key(&mut self, names: &[&str]) -> Result<Outcome<KeyId>, SchemaError> {
        self.model
            .set_principal_key(self.fk, &owned(names), self.source)
    }

    pub fn is_required(&mut self, required: bool) -> Result<Outcome<()>, SchemaError> {
        self.model
            .set_is_required(self.fk, Some(required), self.source)
    }

    pub fn is_unique(&mut self, unique: bool) -> Result<Outcome<()>, SchemaError> {
        self.model.set_is_unique(self.fk, Some(unique), self.source)
    }

    pub fn is_required_dependent(&mut self, required: bool) -> Result<Outcome<()>, SchemaError> {
        self.model
            .set_is_required_dependent(self.fk, Some(required), self.source)
    }

    pub fn is_ownership(&mut self, ownership: bool) -> Result<Outcome<()>, SchemaError> {
        self.model
            .set_is_ownership(self.fk, Some(ownership), self.source)
    }

    pub fn on_delete(&mut self, behavior: DeleteBehavior) -> Result<Outcome<()>, SchemaError> {
        self.model
            .set_delete_behavior(self.fk, Some(behavior), self.source)
    }

    pub fn with_navigation_to_principal(
        &mut self,
        name: Option<&str>,
    ) -> Result<Outcome<Option<NavigationId>>, SchemaError> {
        self.model.set_dependent_to_principal(
            self.fk,
            name.map(NavigationMember::reference),
            self.source,
        )
    }

    pub fn with_navigation_to_dependent(
        &mut self,
        member: Option<NavigationMember>,
    ) -> Result<Outcome<Option<NavigationId>>, SchemaError> {
        self.model
            .set_principal_to_dependent(self.fk, member, self.source)
    }

    pub fn invert(&mut self) -> Result<Outcome<()>, SchemaError> {
        self.model.invert(self.fk, self.source)
    }

    pub fn remove(self) -> Result<Outcome<()>, SchemaError> {
        self.model.remove_foreign_key(self.fk, self.source)
    }
}
