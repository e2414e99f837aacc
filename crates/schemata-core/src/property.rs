//! # Property Descriptors
//!
//! A property is a named, typed slot declared on exactly one entity type.
//! Each facet (nullability, value generation, max length, ...) carries its
//! own provenance.
//!
//! Invariants:
//! - A key member is never nullable.
//! - A property whose static type cannot hold null is never nullable.

use crate::model::{Model, validate_name};
use crate::provenance::{Facet, Outcome, Provenance};
use crate::types::{
    EntityTypeId, ForeignKeyId, IndexId, KeyId, PropertyId, SaveBehavior, SchemaError,
    ValueGenerated, ValueType, format_members,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// PROPERTY
// =============================================================================

/// A property descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub(crate) id: PropertyId,
    pub(crate) name: String,
    pub(crate) declaring: EntityTypeId,
    pub(crate) value_type: ValueType,
    pub(crate) source: Provenance,
    /// Synthesized by the kernel to satisfy a relationship or placeholder key.
    pub(crate) synthesized: bool,
    /// Cached storage position within the lineage.
    pub(crate) index: usize,

    pub(crate) nullable: Facet<bool>,
    pub(crate) value_generated: Facet<ValueGenerated>,
    pub(crate) concurrency_token: Facet<bool>,
    pub(crate) before_save: Facet<SaveBehavior>,
    pub(crate) after_save: Facet<SaveBehavior>,
    pub(crate) max_length: Facet<u32>,
    pub(crate) precision: Facet<u32>,
    pub(crate) scale: Facet<u32>,
    pub(crate) converter: Facet<String>,
    pub(crate) comparer: Facet<String>,
    pub(crate) value_generator: Facet<String>,
}

impl Property {
    pub(crate) fn new(
        id: PropertyId,
        name: &str,
        declaring: EntityTypeId,
        value_type: ValueType,
        source: Provenance,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            declaring,
            value_type,
            source,
            synthesized: false,
            index: 0,
            nullable: Facet::unset(),
            value_generated: Facet::unset(),
            concurrency_token: Facet::unset(),
            before_save: Facet::unset(),
            after_save: Facet::unset(),
            max_length: Facet::unset(),
            precision: Facet::unset(),
            scale: Facet::unset(),
            converter: Facet::unset(),
            comparer: Facet::unset(),
            value_generator: Facet::unset(),
        }
    }

    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_entity(&self) -> EntityTypeId {
        self.declaring
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn source(&self) -> Provenance {
        self.source
    }

    /// Whether this is a shadow property synthesized by the kernel.
    pub fn is_shadow(&self) -> bool {
        self.synthesized
    }

    /// Storage position; ancestors' properties come first.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Configured nullability, else the static type's.
    pub fn is_nullable(&self) -> bool {
        self.nullable
            .get()
            .copied()
            .unwrap_or(self.value_type.nullable)
    }

    pub fn nullable_source(&self) -> Option<Provenance> {
        self.nullable.source()
    }

    pub fn value_generated(&self) -> ValueGenerated {
        self.value_generated.get_or(ValueGenerated::Never)
    }

    pub fn is_concurrency_token(&self) -> bool {
        self.concurrency_token.get_or(false)
    }

    pub fn before_save_behavior(&self) -> SaveBehavior {
        self.before_save.get_or(SaveBehavior::Save)
    }

    pub fn after_save_behavior(&self) -> SaveBehavior {
        self.after_save.get_or(SaveBehavior::Save)
    }

    pub fn max_length(&self) -> Option<u32> {
        self.max_length.get().copied()
    }

    pub fn precision(&self) -> Option<u32> {
        self.precision.get().copied()
    }

    pub fn scale(&self) -> Option<u32> {
        self.scale.get().copied()
    }

    pub fn value_converter(&self) -> Option<&str> {
        self.converter.get().map(String::as_str)
    }

    pub fn value_comparer(&self) -> Option<&str> {
        self.comparer.get().map(String::as_str)
    }

    pub fn value_generator(&self) -> Option<&str> {
        self.value_generator.get().map(String::as_str)
    }

    /// Copy every facet from `other` (used when migrating a property up).
    fn adopt_facets(&mut self, other: &Property) {
        self.nullable = other.nullable.clone();
        self.value_generated = other.value_generated.clone();
        self.concurrency_token = other.concurrency_token.clone();
        self.before_save = other.before_save.clone();
        self.after_save = other.after_save.clone();
        self.max_length = other.max_length.clone();
        self.precision = other.precision.clone();
        self.scale = other.scale.clone();
        self.converter = other.converter.clone();
        self.comparer = other.comparer.clone();
        self.value_generator = other.value_generator.clone();
    }
}

impl Model {
    // =========================================================================
    // USAGE
    // =========================================================================

    pub(crate) fn keys_containing(&self, property: PropertyId) -> Vec<KeyId> {
        self.keys
            .values()
            .filter(|k| k.properties.contains(&property))
            .map(|k| k.id)
            .collect()
    }

    pub(crate) fn foreign_keys_containing(&self, property: PropertyId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .values()
            .filter(|fk| fk.properties.contains(&property))
            .map(|fk| fk.id)
            .collect()
    }

    pub(crate) fn indexes_containing(&self, property: PropertyId) -> Vec<IndexId> {
        self.indexes
            .values()
            .filter(|i| i.properties.contains(&property))
            .map(|i| i.id)
            .collect()
    }

    /// Describe the first constraint using `property`, if any.
    fn property_usage(&self, property: PropertyId) -> Option<String> {
        if let Some(key) = self.keys_containing(property).first() {
            let members = self
                .keys
                .get(key)
                .map(|k| self.property_names(&k.properties))
                .unwrap_or_default();
            return Some(format!("key {}", format_members(&members)));
        }
        if let Some(fk) = self
            .foreign_keys_containing(property)
            .first()
            .and_then(|fk| self.foreign_keys.get(fk))
        {
            return Some(format!(
                "foreign key {}",
                format_members(&self.property_names(&fk.properties))
            ));
        }
        if let Some(index) = self
            .indexes_containing(property)
            .first()
            .and_then(|i| self.indexes.get(i))
        {
            return Some(format!(
                "index {}",
                format_members(&self.property_names(&index.properties))
            ));
        }
        None
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Add (or refresh) a property on `entity`.
    ///
    /// Same-named properties declared on derived types are migrated up into
    /// `entity` when the request overrides each of them.
    pub fn add_property(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        value_type: ValueType,
        source: Provenance,
    ) -> Result<Outcome<PropertyId>, SchemaError> {
        self.ensure_mutable("add_property")?;
        validate_name(name)?;
        self.entity_ref(entity)?;

        if let Some(existing) = self.declared_property(entity, name) {
            return self.refresh_property(existing, value_type, source);
        }

        for ancestor in self.ancestors(entity) {
            if let Some(inherited) = self.declared_property(ancestor, name) {
                if self.property_ref(inherited)?.value_type == value_type {
                    let property = self.property_mut(inherited)?;
                    property.source = source.max_with(Some(property.source));
                    return Ok(Outcome::Applied(inherited));
                }
                return Err(SchemaError::DuplicateMember {
                    what: "Property",
                    member: name.to_string(),
                    entity: self.entity_name(entity),
                    other: self.entity_name(ancestor),
                });
            }
        }

        self.check_navigation_name_free(entity, name)?;

        let mut shadowed = Vec::new();
        for derived in self.derived_types_transitive(entity) {
            if let Some(candidate) = self.declared_property(derived, name) {
                let property = self.property_ref(candidate)?;
                if property.value_type != value_type {
                    return Err(SchemaError::DuplicateMember {
                        what: "Property",
                        member: name.to_string(),
                        entity: self.entity_name(entity),
                        other: self.entity_name(derived),
                    });
                }
                shadowed.push(candidate);
            }
        }
        for candidate in &shadowed {
            if !source.overrides(Some(self.property_ref(*candidate)?.source)) {
                tracing::trace!(property = name, %source, "property migration outranked");
                return Ok(Outcome::Outranked);
            }
        }

        let id = self.create_property(entity, name, value_type, source, false);
        if let Some(first) = shadowed.first().and_then(|p| self.properties.get(p)).cloned() {
            if let Some(created) = self.properties.get_mut(&id) {
                created.adopt_facets(&first);
            }
        }
        for old in shadowed {
            self.replace_property_references(old, id);
            self.drop_property(old);
            tracing::debug!(
                property = name,
                entity = %self.entity_name(entity),
                "derived property migrated to base"
            );
        }
        self.recompute_layout(entity);
        Ok(Outcome::Applied(id))
    }

    fn refresh_property(
        &mut self,
        existing: PropertyId,
        value_type: ValueType,
        source: Provenance,
    ) -> Result<Outcome<PropertyId>, SchemaError> {
        let property = self.property_ref(existing)?;
        if property.value_type == value_type {
            let property = self.property_mut(existing)?;
            property.source = source.max_with(Some(property.source));
            property.synthesized = false;
            return Ok(Outcome::Applied(existing));
        }
        if let Some(used_by) = self.property_usage(existing) {
            return Err(SchemaError::PropertyInUse {
                entity: self.entity_name(property.declaring),
                property: property.name.clone(),
                used_by,
            });
        }
        if !source.overrides(Some(property.source)) {
            return Ok(Outcome::Outranked);
        }
        let property = self.property_mut(existing)?;
        if !value_type.nullable && property.nullable.get() == Some(&true) {
            property.nullable.clear();
        }
        property.value_type = value_type;
        property.source = source;
        property.synthesized = false;
        Ok(Outcome::Applied(existing))
    }

    /// Allocate a property and append it to `entity`'s declared list.
    pub(crate) fn create_property(
        &mut self,
        entity: EntityTypeId,
        name: &str,
        value_type: ValueType,
        source: Provenance,
        synthesized: bool,
    ) -> PropertyId {
        let id = PropertyId(self.allocate_id());
        let mut property = Property::new(id, name, entity, value_type, source);
        property.synthesized = synthesized;
        self.properties.insert(id, property);
        if let Some(node) = self.entity_types.get_mut(&entity) {
            node.properties.push(id);
        }
        self.recompute_layout(entity);
        id
    }

    /// First unused member name on `entity` starting with `base`.
    pub(crate) fn unique_member_name(&self, entity: EntityTypeId, base: &str) -> String {
        let taken = |name: &str| self.find_member_in_lineage(entity, name).is_some();
        if !taken(base) {
            return base.to_string();
        }
        let mut counter = 1u64;
        loop {
            let candidate = format!("{}{}", base, counter);
            if !taken(&candidate) {
                return candidate;
            }
            counter = counter.saturating_add(1);
        }
    }

    fn replace_property_references(&mut self, old: PropertyId, new: PropertyId) {
        for fk in self.foreign_keys.values_mut() {
            for p in fk.properties.iter_mut().filter(|p| **p == old) {
                *p = new;
            }
        }
        for index in self.indexes.values_mut() {
            for p in index.properties.iter_mut().filter(|p| **p == old) {
                *p = new;
            }
        }
        for key in self.keys.values_mut() {
            for p in key.properties.iter_mut().filter(|p| **p == old) {
                *p = new;
            }
        }
    }

    /// Unlink a property from its entity and the arena.
    pub(crate) fn drop_property(&mut self, property: PropertyId) {
        if let Some(removed) = self.properties.remove(&property) {
            if let Some(node) = self.entity_types.get_mut(&removed.declaring) {
                node.properties.retain(|p| *p != property);
            }
            self.recompute_layout(removed.declaring);
        }
    }

    /// Remove a property that no key, foreign key or index uses.
    pub fn remove_property(
        &mut self,
        property: PropertyId,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("remove_property")?;
        let prop = self.property_ref(property)?;
        if let Some(used_by) = self.property_usage(property) {
            return Err(SchemaError::PropertyInUse {
                entity: self.entity_name(prop.declaring),
                property: prop.name.clone(),
                used_by,
            });
        }
        if !source.overrides(Some(prop.source)) {
            tracing::trace!(property = %prop.name, %source, "property removal outranked");
            return Ok(Outcome::Outranked);
        }
        self.drop_property(property);
        Ok(Outcome::Applied(()))
    }

    /// Drop synthesized properties outside every key, foreign key and index.
    pub(crate) fn remove_unused_synthesized_properties(&mut self) {
        let used: BTreeSet<PropertyId> = self
            .keys
            .values()
            .flat_map(|k| k.properties.iter().copied())
            .chain(
                self.foreign_keys
                    .values()
                    .flat_map(|fk| fk.properties.iter().copied()),
            )
            .chain(
                self.indexes
                    .values()
                    .flat_map(|i| i.properties.iter().copied()),
            )
            .collect();
        let unused: Vec<PropertyId> = self
            .properties
            .values()
            .filter(|p| p.synthesized && !used.contains(&p.id))
            .map(|p| p.id)
            .collect();
        for property in unused {
            tracing::debug!(property = %property, "unused shadow property removed");
            self.drop_property(property);
        }
    }

    // =========================================================================
    // FACETS
    // =========================================================================

    /// Configure nullability; `None` returns to the static type's default.
    pub fn set_nullable(
        &mut self,
        property: PropertyId,
        nullable: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_nullable")?;
        let prop = self.property_ref(property)?;
        let effective = nullable.unwrap_or(prop.value_type.nullable);
        if effective {
            if !self.keys_containing(property).is_empty() {
                return Err(SchemaError::NullableKey {
                    entity: self.entity_name(prop.declaring),
                    property: prop.name.clone(),
                });
            }
            if !prop.value_type.nullable {
                return Err(SchemaError::NotNullableType {
                    entity: self.entity_name(prop.declaring),
                    property: prop.name.clone(),
                    value_type: prop.value_type.to_string(),
                });
            }
        }
        self.set_property_facet(property, |p| &mut p.nullable, nullable, source)
    }

    pub fn set_value_generated(
        &mut self,
        property: PropertyId,
        value: Option<ValueGenerated>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_value_generated")?;
        self.set_property_facet(property, |p| &mut p.value_generated, value, source)
    }

    pub fn set_concurrency_token(
        &mut self,
        property: PropertyId,
        value: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_concurrency_token")?;
        self.set_property_facet(property, |p| &mut p.concurrency_token, value, source)
    }

    pub fn set_before_save_behavior(
        &mut self,
        property: PropertyId,
        value: Option<SaveBehavior>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_before_save_behavior")?;
        self.set_property_facet(property, |p| &mut p.before_save, value, source)
    }

    pub fn set_after_save_behavior(
        &mut self,
        property: PropertyId,
        value: Option<SaveBehavior>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_after_save_behavior")?;
        self.set_property_facet(property, |p| &mut p.after_save, value, source)
    }

    pub fn set_max_length(
        &mut self,
        property: PropertyId,
        value: Option<u32>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_max_length")?;
        self.set_property_facet(property, |p| &mut p.max_length, value, source)
    }

    pub fn set_precision(
        &mut self,
        property: PropertyId,
        value: Option<u32>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_precision")?;
        self.set_property_facet(property, |p| &mut p.precision, value, source)
    }

    pub fn set_scale(
        &mut self,
        property: PropertyId,
        value: Option<u32>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_scale")?;
        self.set_property_facet(property, |p| &mut p.scale, value, source)
    }

    pub fn set_value_converter(
        &mut self,
        property: PropertyId,
        value: Option<String>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_value_converter")?;
        self.set_property_facet(property, |p| &mut p.converter, value, source)
    }

    pub fn set_value_comparer(
        &mut self,
        property: PropertyId,
        value: Option<String>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_value_comparer")?;
        self.set_property_facet(property, |p| &mut p.comparer, value, source)
    }

    pub fn set_value_generator(
        &mut self,
        property: PropertyId,
        value: Option<String>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_value_generator")?;
        self.set_property_facet(property, |p| &mut p.value_generator, value, source)
    }

    fn set_property_facet<T: Clone + PartialEq>(
        &mut self,
        property: PropertyId,
        select: fn(&mut Property) -> &mut Facet<T>,
        value: Option<T>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        let prop = self.property_mut(property)?;
        if select(prop).apply(value, source).accepted() {
            Ok(Outcome::Applied(()))
        } else {
            tracing::trace!(property = %prop.name, %source, "property facet outranked");
            Ok(Outcome::Outranked)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackingType, ErrorKind, TypeRegistration};

    fn entity(model: &mut Model, name: &str) -> EntityTypeId {
        model
            .add_entity_type(
                name,
                Some(BackingType::new(name)),
                TypeRegistration::Ordinary,
                Provenance::Explicit,
            )
            .expect("add")
            .applied()
            .expect("applied")
    }

    #[test]
    fn add_property_is_idempotent() {
        let mut model = Model::new();
        let blog = entity(&mut model, "Blog");
        let a = model
            .add_property(blog, "Title", ValueType::nullable("String"), Provenance::Convention)
            .expect("add");
        let b = model
            .add_property(blog, "Title", ValueType::nullable("String"), Provenance::Explicit)
            .expect("add");
        assert_eq!(a, b);
        let id = a.applied().expect("applied");
        assert_eq!(model.property(id).map(|p| p.source()), Some(Provenance::Explicit));
    }

    #[test]
    fn nullable_rejected_for_non_nullable_type() {
        let mut model = Model::new();
        let blog = entity(&mut model, "Blog");
        let id = model
            .add_property(blog, "Rank", ValueType::new("i32"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        let err = model
            .set_nullable(id, Some(true), Provenance::Explicit)
            .expect_err("not nullable");
        assert_eq!(err.kind(), ErrorKind::NotNullableType);
    }

    #[test]
    fn facet_outranked_by_higher_source() {
        let mut model = Model::new();
        let blog = entity(&mut model, "Blog");
        let id = model
            .add_property(blog, "Title", ValueType::nullable("String"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_max_length(id, Some(200), Provenance::Annotation)
            .expect("set");
        let outcome = model
            .set_max_length(id, Some(50), Provenance::Convention)
            .expect("set");
        assert!(outcome.is_outranked());
        assert_eq!(model.property(id).and_then(|p| p.max_length()), Some(200));

        model
            .set_max_length(id, None, Provenance::Explicit)
            .expect("reset");
        assert_eq!(model.property(id).and_then(|p| p.max_length()), None);
    }

    #[test]
    fn property_in_use_cannot_be_removed() {
        let mut model = Model::new();
        let blog = entity(&mut model, "Blog");
        let id = model
            .add_property(blog, "Id", ValueType::new("i32"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        model.add_key(blog, &[id], Provenance::Explicit).expect("key");
        let err = model
            .remove_property(id, Provenance::Explicit)
            .expect_err("in use");
        assert_eq!(err.kind(), ErrorKind::PropertyInUse);
    }

    #[test]
    fn derived_properties_migrate_to_base() {
        let mut model = Model::new();
        let animal = entity(&mut model, "Animal");
        let cat = model
            .add_entity_type(
                "Cat",
                Some(BackingType::new("Cat").extends("Animal")),
                TypeRegistration::Ordinary,
                Provenance::Explicit,
            )
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_base_type(cat, Some(animal), Provenance::Explicit)
            .expect("base");
        let old = model
            .add_property(cat, "Name", ValueType::nullable("String"), Provenance::Convention)
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_max_length(old, Some(30), Provenance::Annotation)
            .expect("facet");

        let moved = model
            .add_property(animal, "Name", ValueType::nullable("String"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        assert!(model.property(old).is_none());
        assert_eq!(model.declared_property(cat, "Name"), None);
        assert_eq!(model.find_property(cat, "Name"), Some(moved));
        assert_eq!(model.property(moved).and_then(|p| p.max_length()), Some(30));
    }

    #[test]
    fn property_name_cannot_shadow_ancestor_with_other_type() {
        let mut model = Model::new();
        let animal = entity(&mut model, "Animal");
        let cat = model
            .add_entity_type(
                "Cat",
                Some(BackingType::new("Cat").extends("Animal")),
                TypeRegistration::Ordinary,
                Provenance::Explicit,
            )
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_base_type(cat, Some(animal), Provenance::Explicit)
            .expect("base");
        model
            .add_property(animal, "Name", ValueType::new("String"), Provenance::Explicit)
            .expect("add");
        let err = model
            .add_property(cat, "Name", ValueType::new("i32"), Provenance::Explicit)
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::DuplicateMember);
    }
}
