//! # Schema Model
//!
//! The root registry of the schema graph.
//!
//! Every element lives in an id-keyed arena owned by `Model`. Cross
//! references (base/derived links, navigation owners, skip-navigation
//! inverses) are plain ids, so the ownership graph stays a tree and
//! removal is a matter of unlinking ids.
//!
//! This module also hosts the registry operations: adding, ignoring and
//! removing entity types, owned/shared type marks, the reachability
//! cleanup checkpoint and finalization.

use crate::entity::EntityType;
use crate::foreign_key::ForeignKey;
use crate::index::Index;
use crate::key::Key;
use crate::navigation::{Navigation, SkipNavigation};
use crate::primitives::MAX_NAME_LENGTH;
use crate::property::Property;
use crate::provenance::{Facet, Outcome, Provenance};
use crate::types::{
    BackingType, EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId,
    SchemaError, SkipNavigationId, TypeRegistration,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// MODEL
// =============================================================================

/// The mutable schema graph.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Model {
    pub(crate) entity_types: BTreeMap<EntityTypeId, EntityType>,
    pub(crate) entity_names: BTreeMap<String, EntityTypeId>,
    pub(crate) properties: BTreeMap<PropertyId, Property>,
    pub(crate) keys: BTreeMap<KeyId, Key>,
    pub(crate) foreign_keys: BTreeMap<ForeignKeyId, ForeignKey>,
    pub(crate) navigations: BTreeMap<NavigationId, Navigation>,
    pub(crate) skip_navigations: BTreeMap<SkipNavigationId, SkipNavigation>,
    pub(crate) indexes: BTreeMap<IndexId, Index>,

    /// Backing type name -> provenance of the "owned" mark.
    pub(crate) owned_types: BTreeMap<String, Provenance>,
    /// Backing type name -> provenance of the "shared" mark.
    pub(crate) shared_types: BTreeMap<String, Provenance>,
    /// Ignored entity type names.
    pub(crate) ignored: BTreeMap<String, Provenance>,

    /// Next free arena id (shared by every element kind).
    pub(crate) next_id: u64,
    pub(crate) read_only: bool,
}

impl Model {
    /// Create a new empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `finalize` has succeeded.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub fn entity_type(&self, id: EntityTypeId) -> Option<&EntityType> {
        self.entity_types.get(&id)
    }

    /// Find an entity type by name.
    pub fn find_entity_type(&self, name: &str) -> Option<EntityTypeId> {
        self.entity_names.get(name).copied()
    }

    /// All entity types in id order.
    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values()
    }

    pub fn entity_type_count(&self) -> usize {
        self.entity_types.len()
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(&id)
    }

    pub fn key(&self, id: KeyId) -> Option<&Key> {
        self.keys.get(&id)
    }

    pub fn foreign_key(&self, id: ForeignKeyId) -> Option<&ForeignKey> {
        self.foreign_keys.get(&id)
    }

    /// All foreign keys in id order.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.values()
    }

    pub fn navigation(&self, id: NavigationId) -> Option<&Navigation> {
        self.navigations.get(&id)
    }

    pub fn skip_navigation(&self, id: SkipNavigationId) -> Option<&SkipNavigation> {
        self.skip_navigations.get(&id)
    }

    pub fn index(&self, id: IndexId) -> Option<&Index> {
        self.indexes.get(&id)
    }

    /// Whether a backing type is marked as owned.
    pub fn is_owned_type(&self, type_name: &str) -> bool {
        self.owned_types.contains_key(type_name)
    }

    /// Whether a backing type is marked as shared.
    pub fn is_shared_type(&self, type_name: &str) -> bool {
        self.shared_types.contains_key(type_name)
    }

    /// Whether a name is on the ignore list.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains_key(name)
    }

    /// Provenance of the ignore entry for `name`.
    pub fn ignored_source(&self, name: &str) -> Option<Provenance> {
        self.ignored.get(name).copied()
    }

    // -------------------------------------------------------------------------
    // Crate-internal access
    // -------------------------------------------------------------------------

    pub(crate) fn ensure_mutable(&self, operation: &'static str) -> Result<(), SchemaError> {
        if self.read_only {
            return Err(SchemaError::ReadOnly { operation });
        }
        Ok(())
    }

    pub(crate) fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    pub(crate) fn entity_ref(&self, id: EntityTypeId) -> Result<&EntityType, SchemaError> {
        self.entity_types.get(&id).ok_or_else(|| unknown("entity type", id))
    }

    pub(crate) fn entity_mut(&mut self, id: EntityTypeId) -> Result<&mut EntityType, SchemaError> {
        self.entity_types
            .get_mut(&id)
            .ok_or_else(|| unknown("entity type", id))
    }

    pub(crate) fn property_ref(&self, id: PropertyId) -> Result<&Property, SchemaError> {
        self.properties.get(&id).ok_or_else(|| unknown("property", id))
    }

    pub(crate) fn property_mut(&mut self, id: PropertyId) -> Result<&mut Property, SchemaError> {
        self.properties
            .get_mut(&id)
            .ok_or_else(|| unknown("property", id))
    }

    pub(crate) fn key_ref(&self, id: KeyId) -> Result<&Key, SchemaError> {
        self.keys.get(&id).ok_or_else(|| unknown("key", id))
    }

    pub(crate) fn fk_ref(&self, id: ForeignKeyId) -> Result<&ForeignKey, SchemaError> {
        self.foreign_keys
            .get(&id)
            .ok_or_else(|| unknown("foreign key", id))
    }

    pub(crate) fn fk_mut(&mut self, id: ForeignKeyId) -> Result<&mut ForeignKey, SchemaError> {
        self.foreign_keys
            .get_mut(&id)
            .ok_or_else(|| unknown("foreign key", id))
    }

    pub(crate) fn navigation_ref(&self, id: NavigationId) -> Result<&Navigation, SchemaError> {
        self.navigations
            .get(&id)
            .ok_or_else(|| unknown("navigation", id))
    }

    pub(crate) fn navigation_mut(
        &mut self,
        id: NavigationId,
    ) -> Result<&mut Navigation, SchemaError> {
        self.navigations
            .get_mut(&id)
            .ok_or_else(|| unknown("navigation", id))
    }

    pub(crate) fn skip_ref(&self, id: SkipNavigationId) -> Result<&SkipNavigation, SchemaError> {
        self.skip_navigations
            .get(&id)
            .ok_or_else(|| unknown("skip navigation", id))
    }

    pub(crate) fn skip_mut(
        &mut self,
        id: SkipNavigationId,
    ) -> Result<&mut SkipNavigation, SchemaError> {
        self.skip_navigations
            .get_mut(&id)
            .ok_or_else(|| unknown("skip navigation", id))
    }

    pub(crate) fn index_ref(&self, id: IndexId) -> Result<&Index, SchemaError> {
        self.indexes.get(&id).ok_or_else(|| unknown("index", id))
    }

    /// Display name of an entity type for diagnostics.
    pub(crate) fn entity_name(&self, id: EntityTypeId) -> String {
        self.entity_types
            .get(&id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Display names of a property list for diagnostics.
    pub(crate) fn property_names(&self, ids: &[PropertyId]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.properties
                    .get(id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect()
    }

    /// Run a compound edit; restore the prior state unless it is applied.
    pub(crate) fn transact<T>(
        &mut self,
        edit: impl FnOnce(&mut Model) -> Result<Outcome<T>, SchemaError>,
    ) -> Result<Outcome<T>, SchemaError> {
        let checkpoint = self.clone();
        match edit(self) {
            Ok(Outcome::Applied(value)) => Ok(Outcome::Applied(value)),
            other => {
                *self = checkpoint;
                other
            }
        }
    }

    // =========================================================================
    // REGISTRY
    // =========================================================================

    /// Register an entity type.
    ///
    /// Re-registering the same name with the same backing type refreshes
    /// its provenance. A name on the ignore list is only accepted when the
    /// request overrides the ignore.
    pub fn add_entity_type(
        &mut self,
        name: &str,
        backing: Option<BackingType>,
        registration: TypeRegistration,
        source: Provenance,
    ) -> Result<Outcome<EntityTypeId>, SchemaError> {
        self.ensure_mutable("add_entity_type")?;
        validate_name(name)?;

        if let Some(existing) = self.find_entity_type(name) {
            let entity = self.entity_ref(existing)?;
            if entity.backing != backing || entity.registration != registration {
                return Err(SchemaError::DuplicateEntityType {
                    entity: name.to_string(),
                });
            }
            let entity = self.entity_mut(existing)?;
            entity.source = source.max_with(Some(entity.source));
            return Ok(Outcome::Applied(existing));
        }

        if let Some(backing) = &backing {
            if registration == TypeRegistration::Shared && backing.name == name {
                return Err(SchemaError::AmbiguousSharedTypeName {
                    entity: name.to_string(),
                });
            }
            self.check_registration(name, &backing.name, registration)?;
        }

        let ignored = self
            .ignored
            .get(name)
            .copied()
            .or_else(|| backing.as_ref().and_then(|b| self.ignored.get(&b.name).copied()));
        if let Some(ignored) = ignored {
            if !source.overrides(Some(ignored)) {
                tracing::trace!(entity = name, %source, "entity type is ignored");
                return Ok(Outcome::Outranked);
            }
        }

        self.ignored.remove(name);
        if let Some(backing) = &backing {
            self.ignored.remove(&backing.name);
            match registration {
                TypeRegistration::Shared => mark(&mut self.shared_types, &backing.name, source),
                TypeRegistration::Owned => mark(&mut self.owned_types, &backing.name, source),
                TypeRegistration::Ordinary => {}
            }
        }

        let id = EntityTypeId(self.allocate_id());
        let entity = EntityType::new(id, name, backing, registration, source);
        self.entity_types.insert(id, entity);
        self.entity_names.insert(name.to_string(), id);
        tracing::debug!(entity = name, %source, "entity type added");
        Ok(Outcome::Applied(id))
    }

    /// Register a synthesized, name-only entity type (e.g. a join node).
    pub(crate) fn add_synthesized_entity_type(&mut self, name: &str) -> EntityTypeId {
        let id = EntityTypeId(self.allocate_id());
        let mut entity = EntityType::new(
            id,
            name,
            None,
            TypeRegistration::Shared,
            Provenance::Convention,
        );
        entity.synthesized = true;
        self.entity_types.insert(id, entity);
        self.entity_names.insert(name.to_string(), id);
        id
    }

    /// First free entity type name starting with `base`.
    pub(crate) fn unique_entity_name(&self, base: &str) -> String {
        if !self.entity_names.contains_key(base) {
            return base.to_string();
        }
        let mut counter = 1u64;
        loop {
            let candidate = format!("{}{}", base, counter);
            if !self.entity_names.contains_key(&candidate) {
                return candidate;
            }
            counter = counter.saturating_add(1);
        }
    }

    /// Existing registration class of a backing type, if any.
    fn registration_of(&self, type_name: &str) -> Option<TypeRegistration> {
        if self.owned_types.contains_key(type_name) {
            return Some(TypeRegistration::Owned);
        }
        if self.shared_types.contains_key(type_name) {
            return Some(TypeRegistration::Shared);
        }
        self.entity_types
            .values()
            .find(|e| e.backing.as_ref().is_some_and(|b| b.name == type_name))
            .map(|e| e.registration)
    }

    fn check_registration(
        &self,
        entity: &str,
        type_name: &str,
        requested: TypeRegistration,
    ) -> Result<(), SchemaError> {
        match self.registration_of(type_name) {
            Some(existing) if existing != requested || existing == TypeRegistration::Ordinary => {
                Err(SchemaError::ClashingTypeRegistration {
                    backing: type_name.to_string(),
                    entity: entity.to_string(),
                    existing,
                    requested,
                })
            }
            _ => Ok(()),
        }
    }

    /// Mark a backing type as owned.
    pub fn mark_owned(&mut self, type_name: &str, source: Provenance) -> Result<(), SchemaError> {
        self.ensure_mutable("mark_owned")?;
        validate_name(type_name)?;
        self.check_registration(type_name, type_name, TypeRegistration::Owned)?;
        mark(&mut self.owned_types, type_name, source);
        Ok(())
    }

    /// Remove the owned mark from a backing type.
    pub fn unmark_owned(
        &mut self,
        type_name: &str,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("unmark_owned")?;
        let Some(existing) = self.owned_types.get(type_name).copied() else {
            return Ok(Outcome::Applied(()));
        };
        if let Some(entity) = self.entity_types.values().find(|e| {
            e.registration == TypeRegistration::Owned
                && e.backing.as_ref().is_some_and(|b| b.name == type_name)
        }) {
            return Err(SchemaError::EntityTypeInUse {
                entity: entity.name.clone(),
                used_by: format!("the owned registration of '{}'", type_name),
            });
        }
        if !source.overrides(Some(existing)) {
            return Ok(Outcome::Outranked);
        }
        self.owned_types.remove(type_name);
        Ok(Outcome::Applied(()))
    }

    /// Mark a backing type as shared.
    pub fn mark_shared(&mut self, type_name: &str, source: Provenance) -> Result<(), SchemaError> {
        self.ensure_mutable("mark_shared")?;
        validate_name(type_name)?;
        self.check_registration(type_name, type_name, TypeRegistration::Shared)?;
        mark(&mut self.shared_types, type_name, source);
        Ok(())
    }

    /// Ignore an entity type name, removing the node if it exists.
    pub fn ignore(&mut self, name: &str, source: Provenance) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("ignore")?;
        validate_name(name)?;

        if let Some(id) = self.find_entity_type(name) {
            self.check_removable(id)?;
            if !source.overrides(Some(self.entity_ref(id)?.source)) {
                tracing::trace!(entity = name, %source, "ignore outranked");
                return Ok(Outcome::Outranked);
            }
            self.remove_entity_unchecked(id);
            self.sweep_synthesized();
        }

        mark(&mut self.ignored, name, source);
        tracing::debug!(entity = name, %source, "entity type ignored");
        Ok(Outcome::Applied(()))
    }

    /// Remove an entity type.
    pub fn remove_entity_type(
        &mut self,
        id: EntityTypeId,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("remove_entity_type")?;
        self.check_removable(id)?;
        if !source.overrides(Some(self.entity_ref(id)?.source)) {
            tracing::trace!(entity = %self.entity_name(id), %source, "removal outranked");
            return Ok(Outcome::Outranked);
        }
        self.remove_entity_unchecked(id);
        self.sweep_synthesized();
        Ok(Outcome::Applied(()))
    }

    fn check_removable(&self, id: EntityTypeId) -> Result<(), SchemaError> {
        let entity = self.entity_ref(id)?;
        if let Some(derived) = entity.derived.iter().next() {
            return Err(SchemaError::EntityTypeInUse {
                entity: entity.name.clone(),
                used_by: format!("derived type '{}'", self.entity_name(*derived)),
            });
        }
        if let Some(fk) = self
            .foreign_keys
            .values()
            .find(|fk| fk.principal == id && fk.dependent != id)
        {
            return Err(SchemaError::EntityTypeInUse {
                entity: entity.name.clone(),
                used_by: format!("a foreign key on '{}'", self.entity_name(fk.dependent)),
            });
        }
        if let Some(skip) = self
            .skip_navigations
            .values()
            .find(|s| s.target == id && s.declaring != id)
        {
            return Err(SchemaError::EntityTypeInUse {
                entity: entity.name.clone(),
                used_by: format!(
                    "skip navigation '{}' on '{}'",
                    skip.name,
                    self.entity_name(skip.declaring)
                ),
            });
        }
        Ok(())
    }

    /// Remove a node and everything hanging off it. Callers check usage.
    pub(crate) fn remove_entity_unchecked(&mut self, id: EntityTypeId) {
        let fks: Vec<ForeignKeyId> = self
            .foreign_keys
            .values()
            .filter(|fk| fk.dependent == id || fk.principal == id)
            .map(|fk| fk.id)
            .collect();
        for fk in fks {
            self.remove_foreign_key_unchecked(fk);
        }

        let skips: Vec<SkipNavigationId> = self
            .skip_navigations
            .values()
            .filter(|s| s.declaring == id || s.target == id)
            .map(|s| s.id)
            .collect();
        for skip in skips {
            self.remove_skip_navigation_unchecked(skip);
        }

        let navs: Vec<NavigationId> = self
            .navigations
            .values()
            .filter(|n| n.declaring == id)
            .map(|n| n.id)
            .collect();
        for nav in navs {
            self.detach_navigation_unchecked(nav);
        }

        let Some(entity) = self.entity_types.remove(&id) else {
            return;
        };
        for index in &entity.indexes {
            self.indexes.remove(index);
        }
        for key in &entity.keys {
            self.keys.remove(key);
        }
        for property in &entity.properties {
            self.properties.remove(property);
        }
        if let Some(base) = entity.base.get().copied() {
            if let Some(base) = self.entity_types.get_mut(&base) {
                base.derived.remove(&id);
            }
        }
        for derived in &entity.derived {
            if let Some(derived) = self.entity_types.get_mut(derived) {
                derived.base = Facet::unset();
            }
        }
        for derived in entity.derived.iter().copied().collect::<Vec<_>>() {
            self.recompute_layout(derived);
        }
        self.entity_names.remove(&entity.name);
        tracing::debug!(entity = %entity.name, "entity type removed");
    }

    /// Cleanup checkpoint: remove every node not reachable from an
    /// explicitly declared node. Returns the removed names.
    pub fn remove_unreachable(&mut self) -> Result<Vec<String>, SchemaError> {
        self.ensure_mutable("remove_unreachable")?;

        let mut adjacency: BTreeMap<EntityTypeId, BTreeSet<EntityTypeId>> = BTreeMap::new();
        let mut link = |a: EntityTypeId, b: EntityTypeId| {
            adjacency.entry(a).or_default().insert(b);
            adjacency.entry(b).or_default().insert(a);
        };
        for entity in self.entity_types.values() {
            if let Some(base) = entity.base.get() {
                link(entity.id, *base);
            }
        }
        for fk in self.foreign_keys.values() {
            link(fk.dependent, fk.principal);
        }
        for skip in self.skip_navigations.values() {
            link(skip.declaring, skip.target);
        }

        let mut visited: BTreeSet<EntityTypeId> = BTreeSet::new();
        let mut queue: VecDeque<EntityTypeId> = self
            .entity_types
            .values()
            .filter(|e| e.source == Provenance::Explicit)
            .map(|e| e.id)
            .collect();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(neighbors) = adjacency.get(&current) {
                queue.extend(neighbors.iter().filter(|n| !visited.contains(n)));
            }
        }

        let doomed: Vec<EntityTypeId> = self
            .entity_types
            .keys()
            .filter(|id| !visited.contains(id))
            .copied()
            .collect();
        let mut removed = Vec::with_capacity(doomed.len());
        for id in doomed {
            if self.entity_types.contains_key(&id) {
                removed.push(self.entity_name(id));
                self.remove_entity_unchecked(id);
            }
        }
        self.sweep_synthesized();
        if !removed.is_empty() {
            tracing::debug!(count = removed.len(), "unreachable entity types removed");
        }
        Ok(removed)
    }

    /// Remove synthesized artefacts nothing refers to any more: join nodes
    /// without skip navigations, placeholder keys without foreign keys and
    /// shadow properties outside every key, foreign key and index.
    pub(crate) fn sweep_synthesized(&mut self) {
        let referenced_joins: BTreeSet<EntityTypeId> = self
            .skip_navigations
            .values()
            .filter_map(|s| s.foreign_key.get())
            .filter_map(|fk| self.foreign_keys.get(fk))
            .map(|fk| fk.dependent)
            .collect();
        let joins: Vec<EntityTypeId> = self
            .entity_types
            .values()
            .filter(|e| e.synthesized && !referenced_joins.contains(&e.id))
            .filter(|e| {
                !self
                    .foreign_keys
                    .values()
                    .any(|fk| fk.principal == e.id && fk.dependent != e.id)
            })
            .map(|e| e.id)
            .collect();
        for join in joins {
            tracing::debug!(entity = %self.entity_name(join), "unused join entity type discarded");
            self.remove_entity_unchecked(join);
        }

        self.remove_unreferenced_placeholder_keys();
        self.remove_unused_synthesized_properties();
    }

    // =========================================================================
    // FINALIZATION
    // =========================================================================

    /// Validate the model and flip it to read-only.
    ///
    /// Validation runs on a copy that replaces `self` only on success.
    pub fn finalize(&mut self) -> Result<(), SchemaError> {
        self.ensure_mutable("finalize")?;
        let mut candidate = self.clone();
        candidate.validate_complete()?;
        candidate.read_only = true;
        *self = candidate;
        tracing::debug!(entity_types = self.entity_types.len(), "model finalized");
        Ok(())
    }

    fn validate_complete(&self) -> Result<(), SchemaError> {
        for entity in self.entity_types.values() {
            if entity.base.is_set() || self.is_keyless(entity.id) {
                continue;
            }
            if !entity.primary_key.is_set() {
                return Err(SchemaError::IncompleteModel {
                    element: entity.name.clone(),
                    reason: "entity type has no primary key",
                });
            }
        }
        for skip in self.skip_navigations.values() {
            let element = format!("{}.{}", self.entity_name(skip.declaring), skip.name);
            if !skip.foreign_key.is_set() {
                return Err(SchemaError::IncompleteModel {
                    element,
                    reason: "skip navigation has no foreign key",
                });
            }
            if !skip.inverse.is_set() {
                return Err(SchemaError::IncompleteModel {
                    element,
                    reason: "skip navigation has no inverse",
                });
            }
        }
        for fk in self.foreign_keys.values() {
            if fk.is_ownership() && fk.principal_to_dependent.is_none() {
                return Err(SchemaError::IncompleteModel {
                    element: self.entity_name(fk.dependent),
                    reason: "ownership has no principal-to-dependent navigation",
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn unknown(what: &'static str, id: impl std::fmt::Display) -> SchemaError {
    SchemaError::UnknownMember {
        what,
        name: id.to_string(),
    }
}

/// Record `name` in a provenance-tagged set, keeping the higher provenance.
fn mark(set: &mut BTreeMap<String, Provenance>, name: &str, source: Provenance) {
    let existing = set.get(name).copied();
    set.insert(name.to_string(), source.max_with(existing));
}

/// Names must be non-empty and bounded.
pub(crate) fn validate_name(name: &str) -> Result<(), SchemaError> {
    if name.trim().is_empty() {
        return Err(SchemaError::InvalidName {
            name: name.to_string(),
            reason: "name is empty",
        });
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(SchemaError::InvalidName {
            name: name.chars().take(32).collect(),
            reason: "name is too long",
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
