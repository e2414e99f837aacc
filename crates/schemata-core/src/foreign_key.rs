//! # Reference Constraints
//!
//! A foreign key connects a dependent entity type's property list to a key
//! on the principal entity type. Its identity (dependent + properties +
//! principal) is structural; every other facet carries its own provenance:
//!
//! | Facet                 | Default                                  |
//! |-----------------------|------------------------------------------|
//! | `IsUnique`            | `false`                                  |
//! | `IsRequired`          | `true` iff no dependent property is nullable |
//! | `IsRequiredDependent` | `false` (needs `IsUnique`)               |
//! | `IsOwnership`         | `false` (needs a principal-to-dependent navigation) |
//! | `DeleteBehavior`      | `Cascade` if required, else `ClientSetNull` |
//!
//! Dependent properties that do not exist yet are synthesized as shadow
//! properties typed after the principal key.

use crate::model::Model;
use crate::primitives::{PLACEHOLDER_KEY_NAME, PLACEHOLDER_KEY_TYPE};
use crate::provenance::{Facet, Outcome, Provenance, SetResult};
use crate::types::{
    DeleteBehavior, EntityTypeId, ForeignKeyId, KeyId, NavigationId, PropertyId, SchemaError,
    ValueType, format_members,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// FOREIGN KEY
// =============================================================================

/// A reference constraint between two entity types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub(crate) id: ForeignKeyId,
    pub(crate) dependent: EntityTypeId,
    pub(crate) principal: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) principal_key: KeyId,
    pub(crate) source: Provenance,

    pub(crate) properties_source: Option<Provenance>,
    pub(crate) principal_key_source: Option<Provenance>,
    pub(crate) principal_end_source: Option<Provenance>,

    pub(crate) is_unique: Facet<bool>,
    pub(crate) is_required: Facet<bool>,
    pub(crate) is_required_dependent: Facet<bool>,
    pub(crate) is_ownership: Facet<bool>,
    pub(crate) delete_behavior: Facet<DeleteBehavior>,

    pub(crate) dependent_to_principal: Option<NavigationId>,
    pub(crate) dependent_to_principal_source: Option<Provenance>,
    pub(crate) principal_to_dependent: Option<NavigationId>,
    pub(crate) principal_to_dependent_source: Option<Provenance>,
}

impl ForeignKey {
    pub fn id(&self) -> ForeignKeyId {
        self.id
    }

    pub fn dependent_entity(&self) -> EntityTypeId {
        self.dependent
    }

    pub fn principal_entity(&self) -> EntityTypeId {
        self.principal
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn principal_key(&self) -> KeyId {
        self.principal_key
    }

    pub fn source(&self) -> Provenance {
        self.source
    }

    pub fn properties_source(&self) -> Option<Provenance> {
        self.properties_source
    }

    pub fn principal_key_source(&self) -> Option<Provenance> {
        self.principal_key_source
    }

    pub fn principal_end_source(&self) -> Option<Provenance> {
        self.principal_end_source
    }

    pub fn is_unique(&self) -> bool {
        self.is_unique.get_or(false)
    }

    pub fn is_unique_source(&self) -> Option<Provenance> {
        self.is_unique.source()
    }

    /// The pinned `IsRequired` value, if any. See `Model::is_required`.
    pub fn required_override(&self) -> Option<bool> {
        self.is_required.get().copied()
    }

    pub fn is_required_source(&self) -> Option<Provenance> {
        self.is_required.source()
    }

    pub fn is_required_dependent(&self) -> bool {
        self.is_required_dependent.get_or(false)
    }

    pub fn is_ownership(&self) -> bool {
        self.is_ownership.get_or(false)
    }

    pub fn is_ownership_source(&self) -> Option<Provenance> {
        self.is_ownership.source()
    }

    pub fn delete_behavior_source(&self) -> Option<Provenance> {
        self.delete_behavior.source()
    }

    pub fn dependent_to_principal(&self) -> Option<NavigationId> {
        self.dependent_to_principal
    }

    pub fn principal_to_dependent(&self) -> Option<NavigationId> {
        self.principal_to_dependent
    }
}

/// The key a new relationship will target.
enum PlannedKey {
    Existing(KeyId),
    /// No key yet: synthesize a placeholder on this lineage root.
    Placeholder(EntityTypeId),
}

/// A dependent property, existing or to be synthesized.
enum DependentProperty {
    Existing(PropertyId),
    Shadow { name: String, value_type: ValueType },
}

type KeyColumns = Vec<(String, ValueType)>;

impl Model {
    // =========================================================================
    // DERIVED FACETS
    // =========================================================================

    /// Pinned value, else `true` iff no dependent property is nullable.
    pub fn is_required(&self, fk: ForeignKeyId) -> Option<bool> {
        let fk = self.foreign_keys.get(&fk)?;
        Some(fk.is_required.get().copied().unwrap_or_else(|| {
            !fk.properties
                .iter()
                .filter_map(|p| self.properties.get(p))
                .any(|p| p.is_nullable())
        }))
    }

    /// Pinned value, else `Cascade` for required and `ClientSetNull` for
    /// optional relationships.
    pub fn delete_behavior(&self, fk: ForeignKeyId) -> Option<DeleteBehavior> {
        let pinned = self.foreign_keys.get(&fk)?.delete_behavior.get().copied();
        Some(pinned.unwrap_or_else(|| {
            if self.is_required(fk).unwrap_or(false) {
                DeleteBehavior::Cascade
            } else {
                DeleteBehavior::ClientSetNull
            }
        }))
    }

    /// Whether both ends sit in the same inheritance tree.
    pub fn is_self_referencing(&self, fk: ForeignKeyId) -> bool {
        self.foreign_keys
            .get(&fk)
            .is_some_and(|fk| self.same_hierarchy(fk.dependent, fk.principal))
    }

    fn fk_label(&self, fk: &ForeignKey) -> String {
        format_members(&self.property_names(&fk.properties))
    }

    // =========================================================================
    // KEY & PROPERTY RESOLUTION
    // =========================================================================

    fn plan_principal_key(&self, principal: EntityTypeId) -> Result<PlannedKey, SchemaError> {
        if self.is_keyless(principal) {
            return Err(SchemaError::KeylessPrincipal {
                entity: self.entity_name(principal),
            });
        }
        if let Some(pk) = self.primary_key(principal) {
            return Ok(PlannedKey::Existing(pk));
        }
        let root = self.root_of(principal);
        Ok(match self.all_keys(principal).first() {
            Some(key) => PlannedKey::Existing(*key),
            None => PlannedKey::Placeholder(root),
        })
    }

    fn planned_columns(&self, plan: &PlannedKey) -> KeyColumns {
        match plan {
            PlannedKey::Existing(key) => self.key_columns(*key),
            PlannedKey::Placeholder(_) => vec![(
                PLACEHOLDER_KEY_NAME.to_string(),
                ValueType::new(PLACEHOLDER_KEY_TYPE),
            )],
        }
    }

    /// Names of the key properties a new relationship to `principal` would
    /// target.
    pub(crate) fn default_key_column_names(
        &self,
        principal: EntityTypeId,
    ) -> Result<Vec<String>, SchemaError> {
        let plan = self.plan_principal_key(principal)?;
        Ok(self
            .planned_columns(&plan)
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    fn commit_planned_key(&mut self, plan: PlannedKey) -> KeyId {
        match plan {
            PlannedKey::Existing(key) => key,
            PlannedKey::Placeholder(root) => self.create_placeholder_key(root),
        }
    }

    fn key_columns(&self, key: KeyId) -> KeyColumns {
        self.keys
            .get(&key)
            .map(|k| {
                k.properties
                    .iter()
                    .filter_map(|p| self.properties.get(p))
                    .map(|p| (p.name.clone(), p.value_type.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `{prefix}{KeyProperty}` for each key column, unless the column name
    /// already starts with the prefix.
    fn conventional_names(prefix: &str, columns: &KeyColumns) -> Vec<String> {
        columns
            .iter()
            .map(|(name, _)| {
                if name.starts_with(prefix) {
                    name.clone()
                } else {
                    format!("{}{}", prefix, name)
                }
            })
            .collect()
    }

    fn resolve_dependent_properties(
        &self,
        dependent: EntityTypeId,
        names: &[String],
        columns: &KeyColumns,
    ) -> Result<Vec<DependentProperty>, SchemaError> {
        let entity = self.entity_name(dependent);
        if names.is_empty() {
            return Err(SchemaError::EmptyMemberList {
                what: "foreign key",
                entity,
            });
        }
        if names.len() != columns.len() {
            let key_names: Vec<&str> = columns.iter().map(|(n, _)| n.as_str()).collect();
            return Err(SchemaError::ForeignKeyCountMismatch {
                properties: format_members(names),
                entity,
                principal_key: format_members(&key_names),
                dependent_count: names.len(),
                principal_count: columns.len(),
            });
        }
        let mut seen = BTreeSet::new();
        let mut resolved = Vec::with_capacity(names.len());
        for (name, (key_name, key_type)) in names.iter().zip(columns) {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicatePropertyInList {
                    properties: format_members(names),
                    property: name.clone(),
                });
            }
            match self.find_property(dependent, name) {
                Some(existing) => {
                    let property = self.property_ref(existing)?;
                    if !property.value_type.same_underlying(key_type) {
                        return Err(SchemaError::ForeignKeyTypeMismatch {
                            entity,
                            property: name.clone(),
                            dependent_type: property.value_type.to_string(),
                            principal_property: key_name.clone(),
                            principal_type: key_type.to_string(),
                        });
                    }
                    resolved.push(DependentProperty::Existing(existing));
                }
                None => {
                    crate::model::validate_name(name)?;
                    if let Some((kind, other)) = self.find_member_in_lineage(dependent, name) {
                        return Err(SchemaError::DuplicateMember {
                            what: kind.label(),
                            member: name.clone(),
                            entity,
                            other: self.entity_name(other),
                        });
                    }
                    resolved.push(DependentProperty::Shadow {
                        name: name.clone(),
                        value_type: key_type.to_nullable(),
                    });
                }
            }
        }
        Ok(resolved)
    }

    fn commit_dependent_properties(
        &mut self,
        dependent: EntityTypeId,
        resolved: Vec<DependentProperty>,
    ) -> Vec<PropertyId> {
        resolved
            .into_iter()
            .map(|p| match p {
                DependentProperty::Existing(id) => id,
                DependentProperty::Shadow { name, value_type } => {
                    tracing::debug!(
                        property = %name,
                        entity = %self.entity_name(dependent),
                        "shadow foreign key property synthesized"
                    );
                    self.create_property(dependent, &name, value_type, Provenance::Convention, true)
                }
            })
            .collect()
    }

    fn existing_ids(resolved: &[DependentProperty]) -> Option<Vec<PropertyId>> {
        resolved
            .iter()
            .map(|p| match p {
                DependentProperty::Existing(id) => Some(*id),
                DependentProperty::Shadow { .. } => None,
            })
            .collect()
    }

    /// Foreign key declared on `dependent` with exactly this identity.
    fn find_foreign_key(
        &self,
        dependent: EntityTypeId,
        properties: &[PropertyId],
        principal: EntityTypeId,
    ) -> Option<ForeignKeyId> {
        self.entity_types.get(&dependent).and_then(|e| {
            e.foreign_keys.iter().copied().find(|fk| {
                self.foreign_keys
                    .get(fk)
                    .is_some_and(|fk| fk.properties == properties && fk.principal == principal)
            })
        })
    }

    /// Reject a foreign key identical (by property names and principal) to
    /// one declared elsewhere in the dependent's lineage.
    fn check_lineage_foreign_keys(
        &self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        names: &[String],
        except: Option<ForeignKeyId>,
    ) -> Result<(), SchemaError> {
        let mut wanted: Vec<&str> = names.iter().map(String::as_str).collect();
        wanted.sort_unstable();
        for node in self.lineage(dependent) {
            let Some(e) = self.entity_types.get(&node) else {
                continue;
            };
            for fk in e.foreign_keys.iter().filter_map(|f| self.foreign_keys.get(f)) {
                if Some(fk.id) == except || fk.principal != principal {
                    continue;
                }
                let mut existing = self.property_names(&fk.properties);
                existing.sort_unstable();
                if existing.iter().map(String::as_str).eq(wanted.iter().copied()) {
                    return Err(SchemaError::DuplicateForeignKey {
                        properties: format_members(names),
                        entity: self.entity_name(dependent),
                        other: self.entity_name(node),
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // IDENTIFY OR CREATE
    // =========================================================================

    /// Find or create the relationship from `dependent` to `principal`.
    ///
    /// - Empty `property_names` means conventional names
    ///   (`{navigation or principal}{KeyProperty}`).
    /// - An existing foreign key with exactly these properties is returned
    ///   and its properties facet raised.
    /// - Otherwise a foreign key on `dependent` that owns the navigation
    ///   named `dependent_navigation` is reused when its properties facet
    ///   can be overridden.
    /// - Otherwise a new foreign key is created.
    pub fn add_relationship(
        &mut self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        property_names: &[String],
        dependent_navigation: Option<&str>,
        source: Provenance,
    ) -> Result<Outcome<ForeignKeyId>, SchemaError> {
        self.ensure_mutable("add_relationship")?;
        self.entity_ref(dependent)?;
        self.entity_ref(principal)?;
        let explicit = !property_names.is_empty();
        let properties_source = explicit.then_some(source);

        if explicit {
            let named: Option<Vec<PropertyId>> = property_names
                .iter()
                .map(|name| self.find_property(dependent, name))
                .collect();
            if let Some(existing) = named.and_then(|ids| self.find_foreign_key(dependent, &ids, principal)) {
                self.raise_identified(existing, source, explicit)?;
                return Ok(Outcome::Applied(existing));
            }
        }

        if let Some(reused) =
            self.reuse_by_navigation(dependent, principal, property_names, dependent_navigation, source)?
        {
            return Ok(Outcome::Applied(reused));
        }

        let plan = self.plan_principal_key(principal)?;
        let columns = self.planned_columns(&plan);
        let names = if explicit {
            property_names.to_vec()
        } else {
            let prefix = dependent_navigation
                .map(str::to_string)
                .unwrap_or_else(|| self.entity_name(principal));
            Self::conventional_names(&prefix, &columns)
        };
        let resolved = self.resolve_dependent_properties(dependent, &names, &columns)?;

        if let Some(ids) = Self::existing_ids(&resolved) {
            if let Some(existing) = self.find_foreign_key(dependent, &ids, principal) {
                self.raise_identified(existing, source, explicit)?;
                return Ok(Outcome::Applied(existing));
            }
        }

        self.check_lineage_foreign_keys(dependent, principal, &names, None)?;

        let principal_key = self.commit_planned_key(plan);
        let properties = self.commit_dependent_properties(dependent, resolved);
        let id = ForeignKeyId(self.allocate_id());
        self.foreign_keys.insert(
            id,
            ForeignKey {
                id,
                dependent,
                principal,
                properties,
                principal_key,
                source,
                properties_source,
                principal_key_source: None,
                principal_end_source: properties_source,
                is_unique: Facet::unset(),
                is_required: Facet::unset(),
                is_required_dependent: Facet::unset(),
                is_ownership: Facet::unset(),
                delete_behavior: Facet::unset(),
                dependent_to_principal: None,
                dependent_to_principal_source: None,
                principal_to_dependent: None,
                principal_to_dependent_source: None,
            },
        );
        self.entity_mut(dependent)?.foreign_keys.push(id);
        tracing::debug!(
            dependent = %self.entity_name(dependent),
            principal = %self.entity_name(principal),
            properties = %format_members(&names),
            %source,
            "foreign key created"
        );
        Ok(Outcome::Applied(id))
    }

    /// Raise the provenance of a foreign key a request identified again.
    fn raise_identified(
        &mut self,
        existing: ForeignKeyId,
        source: Provenance,
        explicit: bool,
    ) -> Result<(), SchemaError> {
        let fk = self.fk_mut(existing)?;
        fk.source = source.max_with(Some(fk.source));
        if explicit {
            fk.properties_source = Some(source.max_with(fk.properties_source));
            fk.principal_end_source = Some(source.max_with(fk.principal_end_source));
        }
        Ok(())
    }

    /// Reuse the foreign key that owns `navigation` when the request may
    /// override its properties.
    fn reuse_by_navigation(
        &mut self,
        dependent: EntityTypeId,
        principal: EntityTypeId,
        property_names: &[String],
        navigation: Option<&str>,
        source: Provenance,
    ) -> Result<Option<ForeignKeyId>, SchemaError> {
        let Some(navigation) = navigation else {
            return Ok(None);
        };
        let candidate = self.entity_ref(dependent)?.foreign_keys.iter().copied().find(|fk| {
            self.foreign_keys.get(fk).is_some_and(|fk| {
                fk.principal == principal
                    && fk
                        .dependent_to_principal
                        .and_then(|n| self.navigations.get(&n))
                        .is_some_and(|n| n.name == navigation)
            })
        });
        let Some(candidate) = candidate else {
            return Ok(None);
        };
        if property_names.is_empty() {
            return Ok(Some(candidate));
        }
        let fk = self.fk_ref(candidate)?;
        if !source.overrides(fk.properties_source) {
            return Ok(None);
        }
        match self.set_foreign_key_properties(candidate, property_names, source)? {
            Outcome::Applied(()) => Ok(Some(candidate)),
            Outcome::Outranked => Ok(None),
        }
    }

    // =========================================================================
    // PROPERTIES & PRINCIPAL KEY
    // =========================================================================

    /// Replace the dependent properties of `fk`.
    pub fn set_foreign_key_properties(
        &mut self,
        fk: ForeignKeyId,
        property_names: &[String],
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_foreign_key_properties")?;
        let data = self.fk_ref(fk)?;
        let (dependent, principal) = (data.dependent, data.principal);
        let columns = self.key_columns(data.principal_key);
        let resolved = self.resolve_dependent_properties(dependent, property_names, &columns)?;

        if let Some(ids) = Self::existing_ids(&resolved) {
            if ids == data.properties {
                let fk = self.fk_mut(fk)?;
                fk.properties_source = Some(source.max_with(fk.properties_source));
                fk.principal_end_source = Some(source.max_with(fk.principal_end_source));
                return Ok(Outcome::Applied(()));
            }
            if let Some(other) = self.find_foreign_key(dependent, &ids, principal) {
                let other = self.fk_ref(other)?;
                return Err(SchemaError::DuplicateForeignKey {
                    properties: self.fk_label(other),
                    entity: self.entity_name(dependent),
                    other: self.entity_name(dependent),
                });
            }
        }
        self.check_lineage_foreign_keys(dependent, principal, property_names, Some(fk))?;

        if !source.overrides(data.properties_source) {
            tracing::trace!(foreign_key = %fk, %source, "foreign key properties outranked");
            return Ok(Outcome::Outranked);
        }

        let properties = self.commit_dependent_properties(dependent, resolved);
        let data = self.fk_mut(fk)?;
        data.properties = properties;
        data.properties_source = Some(source);
        data.principal_end_source = Some(source.max_with(data.principal_end_source));
        self.sweep_synthesized();
        Ok(Outcome::Applied(()))
    }

    /// Point `fk` at `key`, rebuilding shadow dependent properties when
    /// their types or count no longer fit.
    pub(crate) fn retarget_principal_key(
        &mut self,
        fk: ForeignKeyId,
        key: KeyId,
    ) -> Result<(), SchemaError> {
        let data = self.fk_ref(fk)?;
        let columns = self.key_columns(key);
        let current: Vec<&crate::property::Property> = data
            .properties
            .iter()
            .filter_map(|p| self.properties.get(p))
            .collect();
        let fits = current.len() == columns.len()
            && current
                .iter()
                .zip(&columns)
                .all(|(p, (_, t))| p.value_type.same_underlying(t));
        let rebuild = !fits && current.iter().all(|p| p.synthesized);

        let properties = if fits {
            data.properties.clone()
        } else if rebuild {
            let prefix = data
                .dependent_to_principal
                .and_then(|n| self.navigations.get(&n))
                .map(|n| n.name.clone())
                .unwrap_or_else(|| self.entity_name(data.principal));
            let names = Self::conventional_names(&prefix, &columns);
            let dependent = data.dependent;
            let resolved = self.resolve_dependent_properties(dependent, &names, &columns)?;
            self.commit_dependent_properties(dependent, resolved)
        } else {
            let names = self.property_names(&data.properties);
            self.resolve_dependent_properties(data.dependent, &names, &columns)?;
            data.properties.clone()
        };

        let data = self.fk_mut(fk)?;
        data.properties = properties;
        data.principal_key = key;
        Ok(())
    }

    /// Target the principal key made of `property_names` on the principal's
    /// lineage root, synthesizing missing properties there.
    pub fn set_principal_key(
        &mut self,
        fk: ForeignKeyId,
        property_names: &[String],
        source: Provenance,
    ) -> Result<Outcome<KeyId>, SchemaError> {
        self.ensure_mutable("set_principal_key")?;
        let data = self.fk_ref(fk)?;
        let principal = data.principal;
        let root = self.root_of(principal);
        if self.is_keyless(principal) {
            return Err(SchemaError::KeylessPrincipal {
                entity: self.entity_name(principal),
            });
        }
        if property_names.is_empty() {
            return Err(SchemaError::EmptyMemberList {
                what: "principal key",
                entity: self.entity_name(principal),
            });
        }
        let dependent_types: Vec<ValueType> = data
            .properties
            .iter()
            .filter_map(|p| self.properties.get(p))
            .map(|p| p.value_type.to_non_nullable())
            .collect();

        let mut existing = Vec::new();
        let mut missing = Vec::new();
        let mut seen = BTreeSet::new();
        for (position, name) in property_names.iter().enumerate() {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicatePropertyInList {
                    properties: format_members(property_names),
                    property: name.clone(),
                });
            }
            match self.find_property(principal, name) {
                Some(id) if self.property_ref(id)?.declaring == root => existing.push(id),
                Some(_) => {
                    return Err(SchemaError::WrongDeclaringEntity {
                        properties: format_members(property_names),
                        entity: self.entity_name(root),
                    });
                }
                None => {
                    let Some(value_type) = dependent_types.get(position) else {
                        return Err(SchemaError::ForeignKeyCountMismatch {
                            properties: self.fk_label(data),
                            entity: self.entity_name(data.dependent),
                            principal_key: format_members(property_names),
                            dependent_count: dependent_types.len(),
                            principal_count: property_names.len(),
                        });
                    };
                    missing.push((position, name.clone(), value_type.clone()));
                }
            }
        }

        if missing.is_empty() {
            if let Some(key) = self.find_key(root, &existing) {
                if key == data.principal_key {
                    let fk = self.fk_mut(fk)?;
                    fk.principal_key_source = Some(source.max_with(fk.principal_key_source));
                    return Ok(Outcome::Applied(key));
                }
            }
        }
        if !source.overrides(data.principal_key_source) {
            tracing::trace!(foreign_key = %fk, %source, "principal key outranked");
            return Ok(Outcome::Outranked);
        }

        self.transact(|model| {
            let mut members = existing;
            for (position, name, value_type) in missing {
                let id = model.create_property(root, &name, value_type, Provenance::Convention, true);
                members.insert(position.min(members.len()), id);
            }
            let Outcome::Applied(key) = model.add_key(root, &members, source)? else {
                return Ok(Outcome::Outranked);
            };
            model.retarget_principal_key(fk, key)?;
            model.fk_mut(fk)?.principal_key_source = Some(source);
            model.sweep_synthesized();
            Ok(Outcome::Applied(key))
        })
    }

    /// Return to the principal's default key.
    pub fn clear_principal_key(
        &mut self,
        fk: ForeignKeyId,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("clear_principal_key")?;
        let data = self.fk_ref(fk)?;
        if !source.overrides(data.principal_key_source) {
            return Ok(Outcome::Outranked);
        }
        let plan = self.plan_principal_key(data.principal)?;
        self.transact(|model| {
            let key = model.commit_planned_key(plan);
            model.retarget_principal_key(fk, key)?;
            model.fk_mut(fk)?.principal_key_source = None;
            model.sweep_synthesized();
            Ok(Outcome::Applied(()))
        })
    }

    // =========================================================================
    // FACETS
    // =========================================================================

    /// Pin `IsRequired`. `true` forces the first dependent property whose
    /// nullability is not explicitly configured to non-nullable; `false`
    /// leaves nullability alone.
    pub fn set_is_required(
        &mut self,
        fk: ForeignKeyId,
        required: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_is_required")?;
        let data = self.fk_mut(fk)?;
        if !data.is_required.apply(required, source).accepted() {
            tracing::trace!(foreign_key = %fk, %source, "is_required outranked");
            return Ok(Outcome::Outranked);
        }
        if required == Some(true) {
            let members = data.properties.clone();
            let unconfigured = members.iter().find(|p| {
                self.properties
                    .get(*p)
                    .is_some_and(|p| Provenance::Explicit.outranks(p.nullable.source()))
            });
            if let Some(property) = unconfigured.and_then(|p| self.properties.get_mut(p)) {
                if property.nullable.try_set(false, source) == SetResult::Changed {
                    tracing::debug!(property = %property.name, "required foreign key forced non-nullable");
                }
            }
        }
        Ok(Outcome::Applied(()))
    }

    /// Pin `IsUnique`, detaching an incompatible principal-to-dependent
    /// navigation when the request may.
    pub fn set_is_unique(
        &mut self,
        fk: ForeignKeyId,
        unique: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_is_unique")?;
        let data = self.fk_ref(fk)?;
        let target = unique.unwrap_or(false);
        if !target && data.is_required_dependent() {
            return Err(SchemaError::NonUniqueRequiredDependent {
                properties: self.fk_label(data),
                entity: self.entity_name(data.dependent),
            });
        }
        if !data.is_unique.can_apply(unique.as_ref(), source) {
            tracing::trace!(foreign_key = %fk, %source, "is_unique outranked");
            return Ok(Outcome::Outranked);
        }

        let mut detach = None;
        if let Some(nav) = data.principal_to_dependent {
            let navigation = self.navigation_ref(nav)?;
            if navigation.is_collection == target {
                if data.is_ownership() || !source.overrides(data.principal_to_dependent_source) {
                    tracing::trace!(foreign_key = %fk, %source, "navigation pins uniqueness");
                    return Ok(Outcome::Outranked);
                }
                detach = Some(nav);
            }
        }

        if let Some(nav) = detach {
            tracing::debug!(navigation = %nav, "navigation detached by uniqueness change");
            self.detach_navigation_unchecked(nav);
        }
        let _ = self.fk_mut(fk)?.is_unique.apply(unique, source);
        Ok(Outcome::Applied(()))
    }

    /// Pin `IsRequiredDependent`; only unique, unambiguous relationships
    /// can require their dependent.
    pub fn set_is_required_dependent(
        &mut self,
        fk: ForeignKeyId,
        required: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_is_required_dependent")?;
        let data = self.fk_ref(fk)?;
        if required == Some(true) {
            if !data.is_unique() {
                return Err(SchemaError::NonUniqueRequiredDependent {
                    properties: self.fk_label(data),
                    entity: self.entity_name(data.dependent),
                });
            }
            if self.is_self_referencing(fk) && data.principal_end_source.is_none() {
                return Err(SchemaError::AmbiguousEnd {
                    properties: self.fk_label(data),
                    entity: self.entity_name(data.dependent),
                });
            }
        }
        if !self.fk_mut(fk)?.is_required_dependent.apply(required, source).accepted() {
            return Ok(Outcome::Outranked);
        }
        Ok(Outcome::Applied(()))
    }

    /// Pin `IsOwnership`. Accepting `true` clears ownership on every other
    /// foreign key of the same dependent and defaults delete behavior to
    /// `Cascade`.
    pub fn set_is_ownership(
        &mut self,
        fk: ForeignKeyId,
        ownership: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_is_ownership")?;
        let data = self.fk_ref(fk)?;
        let owning = ownership == Some(true);
        if owning && data.principal_to_dependent.is_none() {
            return Err(SchemaError::OwnershipWithoutNavigation {
                properties: self.fk_label(data),
                entity: self.entity_name(data.dependent),
            });
        }
        if !data.is_ownership.can_apply(ownership.as_ref(), source) {
            tracing::trace!(foreign_key = %fk, %source, "is_ownership outranked");
            return Ok(Outcome::Outranked);
        }

        let mut others = Vec::new();
        if owning {
            for other in &self.entity_ref(data.dependent)?.foreign_keys {
                let Some(other) = self.foreign_keys.get(other).filter(|o| o.id != fk) else {
                    continue;
                };
                if other.is_ownership() {
                    if !other.is_ownership.can_set(&false, source) {
                        return Ok(Outcome::Outranked);
                    }
                    others.push(other.id);
                }
            }
        }

        for other in others {
            tracing::debug!(foreign_key = %other, "previous ownership cleared");
            let _ = self.fk_mut(other)?.is_ownership.try_set(false, source);
        }
        let data = self.fk_mut(fk)?;
        let _ = data.is_ownership.apply(ownership, source);
        if owning {
            let _ = data
                .delete_behavior
                .try_set(DeleteBehavior::Cascade, Provenance::Convention);
        }
        Ok(Outcome::Applied(()))
    }

    pub fn set_delete_behavior(
        &mut self,
        fk: ForeignKeyId,
        behavior: Option<DeleteBehavior>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_delete_behavior")?;
        if self.fk_mut(fk)?.delete_behavior.apply(behavior, source).accepted() {
            Ok(Outcome::Applied(()))
        } else {
            Ok(Outcome::Outranked)
        }
    }

    // =========================================================================
    // INVERSION
    // =========================================================================

    /// Swap principal and dependent ends.
    ///
    /// The old dependent must be able to act as a principal. Dependent
    /// properties are re-synthesized on the new dependent; when both ends
    /// share a hierarchy the foreign key is re-anchored on their nearest
    /// common ancestor.
    pub fn invert(&mut self, fk: ForeignKeyId, source: Provenance) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("invert")?;
        let data = self.fk_ref(fk)?.clone();
        if data.is_ownership() {
            return Err(SchemaError::CannotInvertOwnership {
                properties: self.fk_label(&data),
                entity: self.entity_name(data.dependent),
            });
        }
        let new_principal = data.dependent;
        let plan = self.plan_principal_key(new_principal)?;
        if let Some(nav) = data.principal_to_dependent {
            let navigation = self.navigation_ref(nav)?;
            if navigation.is_collection {
                return Err(SchemaError::NavigationShapeMismatch {
                    navigation: navigation.name.clone(),
                    entity: self.entity_name(navigation.declaring),
                    reason: "a collection cannot become a navigation to the principal",
                });
            }
        }
        if !source.overrides(data.principal_end_source)
            || !source.overrides(data.properties_source)
            || !source.overrides(data.principal_key_source)
        {
            tracing::trace!(foreign_key = %fk, %source, "inversion outranked");
            return Ok(Outcome::Outranked);
        }
        // The old dependent-to-principal reference becomes the navigation
        // to the dependent, which only a unique foreign key can carry.
        let sync_unique = match data.dependent_to_principal {
            Some(nav) => !self.navigation_ref(nav)?.is_collection && data.is_unique.get() != Some(&true),
            None => false,
        };
        if sync_unique && data.is_unique.is_set() && !source.outranks(data.is_unique.source()) {
            tracing::trace!(foreign_key = %fk, %source, "uniqueness pins inversion");
            return Ok(Outcome::Outranked);
        }

        let new_dependent = if self.same_hierarchy(data.principal, data.dependent) {
            self.common_ancestor(data.principal, data.dependent)
                .unwrap_or(data.principal)
        } else {
            data.principal
        };

        self.transact(|model| {
            let key = model.commit_planned_key(plan);
            let columns = model.key_columns(key);
            let prefix = data
                .principal_to_dependent
                .and_then(|n| model.navigations.get(&n))
                .map(|n| n.name.clone())
                .unwrap_or_else(|| model.entity_name(new_principal));
            let names = Self::conventional_names(&prefix, &columns);
            let resolved = model.resolve_dependent_properties(new_dependent, &names, &columns)?;
            if let Some(ids) = Self::existing_ids(&resolved) {
                if model.find_foreign_key(new_dependent, &ids, new_principal).is_some() {
                    return Err(SchemaError::DuplicateForeignKey {
                        properties: format_members(&names),
                        entity: model.entity_name(new_dependent),
                        other: model.entity_name(new_dependent),
                    });
                }
            }
            let properties = model.commit_dependent_properties(new_dependent, resolved);

            model.entity_mut(data.dependent)?.foreign_keys.retain(|f| *f != fk);
            model.entity_mut(new_dependent)?.foreign_keys.push(fk);

            let entry = model.fk_mut(fk)?;
            entry.dependent = new_dependent;
            entry.principal = new_principal;
            entry.properties = properties;
            entry.principal_key = key;
            entry.properties_source = None;
            entry.principal_key_source = None;
            entry.principal_end_source = Some(source);
            entry.is_required.clear();
            entry.is_required_dependent.clear();
            if sync_unique {
                entry.is_unique.force(true, source);
            }
            std::mem::swap(
                &mut entry.dependent_to_principal,
                &mut entry.principal_to_dependent,
            );
            std::mem::swap(
                &mut entry.dependent_to_principal_source,
                &mut entry.principal_to_dependent_source,
            );
            let navigations: Vec<NavigationId> = entry
                .dependent_to_principal
                .into_iter()
                .chain(entry.principal_to_dependent)
                .collect();
            for nav in navigations {
                let navigation = model.navigation_mut(nav)?;
                navigation.points_to_principal = !navigation.points_to_principal;
            }
            model.sweep_synthesized();
            tracing::debug!(
                foreign_key = %fk,
                dependent = %model.entity_name(new_dependent),
                principal = %model.entity_name(new_principal),
                "foreign key inverted"
            );
            Ok(Outcome::Applied(()))
        })
    }

    // =========================================================================
    // REMOVAL
    // =========================================================================

    /// Remove a foreign key with its navigations and unused shadow members.
    pub fn remove_foreign_key(
        &mut self,
        fk: ForeignKeyId,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("remove_foreign_key")?;
        let data = self.fk_ref(fk)?;
        if !source.overrides(Some(data.source)) {
            tracing::trace!(foreign_key = %fk, %source, "foreign key removal outranked");
            return Ok(Outcome::Outranked);
        }
        self.remove_foreign_key_unchecked(fk);
        self.sweep_synthesized();
        Ok(Outcome::Applied(()))
    }

    pub(crate) fn remove_foreign_key_unchecked(&mut self, fk: ForeignKeyId) {
        let Some(removed) = self.foreign_keys.get(&fk).cloned() else {
            return;
        };
        for nav in removed
            .dependent_to_principal
            .into_iter()
            .chain(removed.principal_to_dependent)
        {
            self.detach_navigation_unchecked(nav);
        }
        for skip in self.skip_navigations.values_mut() {
            if skip.foreign_key.get() == Some(&fk) {
                skip.foreign_key.clear();
            }
        }
        if let Some(node) = self.entity_types.get_mut(&removed.dependent) {
            node.foreign_keys.retain(|f| *f != fk);
        }
        self.foreign_keys.remove(&fk);
        tracing::debug!(foreign_key = %fk, "foreign key removed");
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackingType, ErrorKind, NavigationMember, TypeRegistration};

    struct Shop {
        model: Model,
        customer: EntityTypeId,
        order: EntityTypeId,
    }

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

    fn shop() -> Shop {
        let mut model = Model::new();
        let customer = entity(&mut model, "Customer");
        let order = entity(&mut model, "Order");
        let id = model
            .add_property(customer, "Id", ValueType::new("i32"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_primary_key(customer, &[id], Provenance::Explicit)
            .expect("pk");
        Shop {
            model,
            customer,
            order,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn conventional_shadow_property_synthesized() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let fk = model
            .add_relationship(order, customer, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        let property = model.find_property(order, "CustomerId").expect("shadow");
        let property = model.property(property).expect("property");
        assert!(property.is_shadow());
        assert!(property.is_nullable());
        assert_eq!(model.is_required(fk), Some(false));
        assert_eq!(model.delete_behavior(fk), Some(DeleteBehavior::ClientSetNull));
    }

    #[test]
    fn identify_returns_existing_and_raises_source() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let first = model
            .add_relationship(order, customer, &names(&["CustomerId"]), None, Provenance::Convention)
            .expect("fk");
        let second = model
            .add_relationship(order, customer, &names(&["CustomerId"]), None, Provenance::Explicit)
            .expect("fk");
        assert_eq!(first, second);
        let fk = second.applied().expect("applied");
        assert_eq!(
            model.foreign_key(fk).and_then(|f| f.properties_source()),
            Some(Provenance::Explicit)
        );
        assert_eq!(model.entity_type(order).map(|e| e.declared_foreign_keys().len()), Some(1));
    }

    #[test]
    fn identify_prefers_exact_properties_over_navigation_owner() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let owner = model
            .add_relationship(order, customer, &names(&["CustomerId"]), Some("Customer"), Provenance::Explicit)
            .expect("fk")
            .applied()
            .expect("applied");
        model
            .set_dependent_to_principal(owner, Some(NavigationMember::reference("Customer")), Provenance::Explicit)
            .expect("nav");
        let alternate = model
            .add_relationship(order, customer, &names(&["AltId"]), None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");

        let outcome = model
            .add_relationship(order, customer, &names(&["AltId"]), Some("Customer"), Provenance::Explicit)
            .expect("identify");
        assert_eq!(outcome, Outcome::Applied(alternate));
        assert_eq!(
            model.foreign_key(alternate).and_then(|f| f.properties_source()),
            Some(Provenance::Explicit)
        );
        let customer_id = model.find_property(order, "CustomerId").expect("customer id");
        assert_eq!(
            model.foreign_key(owner).map(|f| f.properties().to_vec()),
            Some(vec![customer_id])
        );
        assert_eq!(model.entity_type(order).map(|e| e.declared_foreign_keys().len()), Some(2));
    }

    #[test]
    fn count_mismatch_rejected() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let err = model
            .add_relationship(order, customer, &names(&["A", "B"]), None, Provenance::Explicit)
            .expect_err("count");
        assert_eq!(err.kind(), ErrorKind::ForeignKeyCountMismatch);
        assert!(model.find_property(order, "A").is_none());
    }

    #[test]
    fn required_forces_non_nullable() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let fk = model
            .add_relationship(order, customer, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        model
            .set_is_required(fk, Some(true), Provenance::Explicit)
            .expect("required");
        let property = model.find_property(order, "CustomerId").expect("fk property");
        assert_eq!(model.property(property).map(|p| p.is_nullable()), Some(false));
        assert_eq!(model.delete_behavior(fk), Some(DeleteBehavior::Cascade));

        model
            .set_is_required(fk, Some(false), Provenance::Explicit)
            .expect("optional");
        assert_eq!(model.property(property).map(|p| p.is_nullable()), Some(false));
        assert_eq!(model.is_required(fk), Some(false));
    }

    #[test]
    fn required_forces_only_first_unconfigured_property() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let id = model.find_property(customer, "Id").expect("id");
        let region = model
            .add_property(customer, "Region", ValueType::new("String"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        let code = model
            .add_property(customer, "Code", ValueType::new("String"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_primary_key(customer, &[id, region, code], Provenance::Explicit)
            .expect("pk");
        let nullable = |model: &mut Model, name: &str, ty: &str| {
            model
                .add_property(order, name, ValueType::nullable(ty), Provenance::Explicit)
                .expect("add")
                .applied()
                .expect("applied")
        };
        let customer_id = nullable(&mut model, "CustomerId", "i32");
        let customer_region = nullable(&mut model, "CustomerRegion", "String");
        let customer_code = nullable(&mut model, "CustomerCode", "String");
        model
            .set_nullable(customer_id, Some(true), Provenance::Explicit)
            .expect("nullable");
        let fk = model
            .add_relationship(
                order,
                customer,
                &names(&["CustomerId", "CustomerRegion", "CustomerCode"]),
                None,
                Provenance::Explicit,
            )
            .expect("fk")
            .applied()
            .expect("applied");

        model
            .set_is_required(fk, Some(true), Provenance::Explicit)
            .expect("required");
        assert_eq!(model.is_required(fk), Some(true));
        assert_eq!(model.property(customer_id).map(|p| p.is_nullable()), Some(true));
        assert_eq!(model.property(customer_region).map(|p| p.is_nullable()), Some(false));
        assert_eq!(model.property(customer_code).map(|p| p.is_nullable()), Some(true));
    }

    #[test]
    fn required_dependent_needs_unique() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let fk = model
            .add_relationship(order, customer, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        let err = model
            .set_is_required_dependent(fk, Some(true), Provenance::Explicit)
            .expect_err("not unique");
        assert_eq!(err.kind(), ErrorKind::NonUniqueRequiredDependent);

        model
            .set_is_unique(fk, Some(true), Provenance::Explicit)
            .expect("unique");
        model
            .set_is_required_dependent(fk, Some(true), Provenance::Explicit)
            .expect("required dependent");
        let err = model
            .set_is_unique(fk, Some(false), Provenance::Explicit)
            .expect_err("required dependent");
        assert_eq!(err.kind(), ErrorKind::NonUniqueRequiredDependent);
    }

    #[test]
    fn self_reference_without_end_is_ambiguous() {
        let mut model = Model::new();
        let node = entity(&mut model, "Employee");
        let id = model
            .add_property(node, "Id", ValueType::new("i32"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        model.set_primary_key(node, &[id], Provenance::Explicit).expect("pk");
        let fk = model
            .add_relationship(node, node, &[], Some("Manager"), Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        model
            .set_is_unique(fk, Some(true), Provenance::Explicit)
            .expect("unique");
        let err = model
            .set_is_required_dependent(fk, Some(true), Provenance::Explicit)
            .expect_err("ambiguous");
        assert_eq!(err.kind(), ErrorKind::AmbiguousEnd);
    }

    #[test]
    fn ownership_moves_between_foreign_keys() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let first = model
            .add_relationship(order, customer, &[], None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        let second = model
            .add_relationship(order, customer, &names(&["BuyerId"]), None, Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        for (fk, nav) in [(first, "Orders"), (second, "Purchases")] {
            model
                .set_principal_to_dependent(fk, Some(NavigationMember::collection(nav)), Provenance::Explicit)
                .expect("nav");
        }
        model
            .set_is_ownership(first, Some(true), Provenance::Convention)
            .expect("own");
        model
            .set_is_ownership(second, Some(true), Provenance::Explicit)
            .expect("own");
        assert_eq!(model.foreign_key(first).map(|f| f.is_ownership()), Some(false));
        assert_eq!(model.foreign_key(second).map(|f| f.is_ownership()), Some(true));
        assert_eq!(model.delete_behavior(second), Some(DeleteBehavior::Cascade));
    }

    #[test]
    fn invert_swaps_ends() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let order_id = model
            .add_property(order, "Id", ValueType::new("i32"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_primary_key(order, &[order_id], Provenance::Explicit)
            .expect("pk");
        let fk = model
            .add_relationship(order, customer, &[], Some("Customer"), Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        model
            .set_dependent_to_principal(fk, Some(NavigationMember::reference("Customer")), Provenance::Convention)
            .expect("nav");

        model.invert(fk, Provenance::Explicit).expect("invert");
        let inverted = model.foreign_key(fk).expect("fk");
        assert_eq!(inverted.dependent_entity(), customer);
        assert_eq!(inverted.principal_entity(), order);
        assert!(model.find_property(order, "CustomerId").is_none());
        assert!(model.find_property(customer, "OrderId").is_some());
        let nav = inverted.principal_to_dependent().expect("nav");
        assert_eq!(model.navigation(nav).map(|n| n.points_to_principal()), Some(false));
        assert!(inverted.is_unique());
        assert_eq!(inverted.is_unique_source(), Some(Provenance::Explicit));
    }

    #[test]
    fn invert_outranked_by_pinned_non_unique() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        let order_id = model
            .add_property(order, "Id", ValueType::new("i32"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_primary_key(order, &[order_id], Provenance::Explicit)
            .expect("pk");
        let fk = model
            .add_relationship(order, customer, &[], Some("Customer"), Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        model
            .set_dependent_to_principal(fk, Some(NavigationMember::reference("Customer")), Provenance::Convention)
            .expect("nav");
        model
            .set_is_unique(fk, Some(false), Provenance::Explicit)
            .expect("unique");

        let outcome = model.invert(fk, Provenance::Explicit).expect("invert");
        assert!(outcome.is_outranked());
        let unchanged = model.foreign_key(fk).expect("fk");
        assert_eq!(unchanged.dependent_entity(), order);
        assert!(!unchanged.is_unique());
        assert!(unchanged.dependent_to_principal().is_some());
        assert!(model.find_property(order, "CustomerId").is_some());
    }

    #[test]
    fn invert_within_hierarchy_lifts_to_ancestor() {
        let mut model = Model::new();
        let node = entity(&mut model, "Node");
        let derived = |model: &mut Model, name: &str| {
            let id = model
                .add_entity_type(
                    name,
                    Some(BackingType::new(name).extends("Node")),
                    TypeRegistration::Ordinary,
                    Provenance::Explicit,
                )
                .expect("add")
                .applied()
                .expect("applied");
            model
                .set_base_type(id, Some(node), Provenance::Explicit)
                .expect("base");
            id
        };
        let folder = derived(&mut model, "Folder");
        let document = derived(&mut model, "Document");
        let id = model
            .add_property(node, "Id", ValueType::new("i32"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        model
            .set_primary_key(node, &[id], Provenance::Explicit)
            .expect("pk");

        let fk = model
            .add_relationship(document, folder, &[], Some("Folder"), Provenance::Convention)
            .expect("fk")
            .applied()
            .expect("applied");
        model
            .set_dependent_to_principal(fk, Some(NavigationMember::reference("Folder")), Provenance::Convention)
            .expect("nav");
        model
            .set_principal_to_dependent(fk, Some(NavigationMember::reference("Readme")), Provenance::Convention)
            .expect("inverse");

        let outcome = model.invert(fk, Provenance::Explicit).expect("invert");
        assert!(outcome.is_applied());
        let inverted = model.foreign_key(fk).expect("fk");
        assert_eq!(inverted.dependent_entity(), node);
        assert_eq!(inverted.principal_entity(), document);
        assert_eq!(
            model.entity_type(node).map(|e| e.declared_foreign_keys().contains(&fk)),
            Some(true)
        );
        assert_eq!(
            model.entity_type(document).map(|e| e.declared_foreign_keys().is_empty()),
            Some(true)
        );
        assert!(model.find_property(node, "ReadmeId").is_some());
        assert!(model.find_property(document, "FolderId").is_none());

        let to_principal = inverted.dependent_to_principal().expect("to principal");
        let to_dependent = inverted.principal_to_dependent().expect("to dependent");
        let readme = model.navigation(to_principal).expect("readme");
        assert_eq!(readme.name(), "Readme");
        assert_eq!(readme.declaring_entity(), folder);
        assert!(readme.points_to_principal());
        let parent = model.navigation(to_dependent).expect("folder");
        assert_eq!(parent.name(), "Folder");
        assert_eq!(parent.declaring_entity(), document);
        assert!(!parent.points_to_principal());
    }

    #[test]
    fn keyless_principal_rejected() {
        let Shop {
            mut model,
            customer,
            order,
        } = shop();
        model
            .set_keyless(order, Some(true), Provenance::Explicit)
            .expect("keyless");
        let err = model
            .add_relationship(customer, order, &[], None, Provenance::Explicit)
            .expect_err("keyless");
        assert_eq!(err.kind(), ErrorKind::KeylessPrincipal);
    }
}
