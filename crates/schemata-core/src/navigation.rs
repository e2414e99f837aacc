//! # Navigations and Skip Navigations
//!
//! A navigation is a named pointer owned by exactly one foreign key, either
//! from the dependent to the principal or back. Attaching a member that
//! another foreign key already owns moves it here when the request may
//! override the other owner.
//!
//! A skip navigation spans a many-to-many relationship through a join
//! entity type: it names the foreign key from the join node to its own
//! declaring type, and its inverse on the other side must resolve to the
//! same join node.

use crate::entity::MemberKind;
use crate::model::{Model, validate_name};
use crate::provenance::{Facet, Outcome, Provenance};
use crate::types::{
    EntityTypeId, ForeignKeyId, NavigationId, NavigationMember, PropertyAccessMode, SchemaError,
    SkipNavigationId, format_members,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// NAVIGATION
// =============================================================================

/// A navigation owned by a foreign key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Navigation {
    pub(crate) id: NavigationId,
    pub(crate) name: String,
    pub(crate) declaring: EntityTypeId,
    pub(crate) foreign_key: ForeignKeyId,
    pub(crate) points_to_principal: bool,
    pub(crate) is_collection: bool,
    pub(crate) source: Provenance,

    pub(crate) lazy_load: Facet<bool>,
    pub(crate) eager_load: Facet<bool>,
    pub(crate) access_mode: Facet<PropertyAccessMode>,
}

impl Navigation {
    pub fn id(&self) -> NavigationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_entity(&self) -> EntityTypeId {
        self.declaring
    }

    pub fn foreign_key(&self) -> ForeignKeyId {
        self.foreign_key
    }

    /// `true` for the dependent-to-principal side.
    pub fn points_to_principal(&self) -> bool {
        self.points_to_principal
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    pub fn source(&self) -> Provenance {
        self.source
    }

    pub fn is_lazy_load_enabled(&self) -> bool {
        self.lazy_load.get_or(true)
    }

    pub fn is_eager_loaded(&self) -> bool {
        self.eager_load.get_or(false)
    }

    pub fn access_mode(&self) -> Option<PropertyAccessMode> {
        self.access_mode.get().copied()
    }

    pub fn access_mode_source(&self) -> Option<Provenance> {
        self.access_mode.source()
    }
}

/// A many-to-many navigation through a join entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipNavigation {
    pub(crate) id: SkipNavigationId,
    pub(crate) name: String,
    pub(crate) declaring: EntityTypeId,
    pub(crate) target: EntityTypeId,
    pub(crate) is_collection: bool,
    pub(crate) source: Provenance,
    /// Foreign key from the join node to the declaring type.
    pub(crate) foreign_key: Facet<ForeignKeyId>,
    pub(crate) inverse: Facet<SkipNavigationId>,
}

impl SkipNavigation {
    pub fn id(&self) -> SkipNavigationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_entity(&self) -> EntityTypeId {
        self.declaring
    }

    pub fn target_entity(&self) -> EntityTypeId {
        self.target
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    pub fn source(&self) -> Provenance {
        self.source
    }

    pub fn foreign_key(&self) -> Option<ForeignKeyId> {
        self.foreign_key.get().copied()
    }

    pub fn inverse(&self) -> Option<SkipNavigationId> {
        self.inverse.get().copied()
    }
}

/// What attaching a navigation name does to a same-named navigation.
enum Displacement {
    Free,
    Detach(NavigationId),
    /// Owned by another foreign key at a provenance the request cannot override.
    Blocked,
}

impl Model {
    // =========================================================================
    // LOOKUPS
    // =========================================================================

    /// Navigation visible on `entity` by name.
    pub fn find_navigation(&self, entity: EntityTypeId, name: &str) -> Option<NavigationId> {
        self.all_navigations(entity)
            .into_iter()
            .find(|n| self.navigations.get(n).is_some_and(|n| n.name == name))
    }

    /// Skip navigation visible on `entity` by name.
    pub fn find_skip_navigation(
        &self,
        entity: EntityTypeId,
        name: &str,
    ) -> Option<SkipNavigationId> {
        self.all_skip_navigations(entity)
            .into_iter()
            .find(|s| self.skip_navigations.get(s).is_some_and(|s| s.name == name))
    }

    /// The entity type a navigation points at.
    pub fn navigation_target(&self, navigation: NavigationId) -> Option<EntityTypeId> {
        let navigation = self.navigations.get(&navigation)?;
        let fk = self.foreign_keys.get(&navigation.foreign_key)?;
        Some(if navigation.points_to_principal {
            fk.principal
        } else {
            fk.dependent
        })
    }

    /// The join node a skip navigation passes through.
    pub fn join_entity(&self, skip: SkipNavigationId) -> Option<EntityTypeId> {
        let fk = self.skip_navigations.get(&skip)?.foreign_key.get()?;
        self.foreign_keys.get(fk).map(|fk| fk.dependent)
    }

    // =========================================================================
    // ATTACH / DETACH
    // =========================================================================

    /// Attach (`Some`) or detach (`None`) the dependent-to-principal
    /// navigation of `fk`.
    pub fn set_dependent_to_principal(
        &mut self,
        fk: ForeignKeyId,
        member: Option<NavigationMember>,
        source: Provenance,
    ) -> Result<Outcome<Option<NavigationId>>, SchemaError> {
        self.ensure_mutable("set_dependent_to_principal")?;
        self.set_navigation(fk, member, true, source)
    }

    /// Attach (`Some`) or detach (`None`) the principal-to-dependent
    /// navigation of `fk`, keeping `IsUnique` in step with its shape.
    pub fn set_principal_to_dependent(
        &mut self,
        fk: ForeignKeyId,
        member: Option<NavigationMember>,
        source: Provenance,
    ) -> Result<Outcome<Option<NavigationId>>, SchemaError> {
        self.ensure_mutable("set_principal_to_dependent")?;
        self.set_navigation(fk, member, false, source)
    }

    fn set_navigation(
        &mut self,
        fk: ForeignKeyId,
        member: Option<NavigationMember>,
        to_principal: bool,
        source: Provenance,
    ) -> Result<Outcome<Option<NavigationId>>, SchemaError> {
        let data = self.fk_ref(fk)?;
        let (slot, slot_source) = if to_principal {
            (data.dependent_to_principal, data.dependent_to_principal_source)
        } else {
            (data.principal_to_dependent, data.principal_to_dependent_source)
        };

        let Some(member) = member else {
            let Some(current) = slot else {
                return Ok(Outcome::Applied(None));
            };
            if !to_principal && data.is_ownership() {
                let navigation = self.navigation_ref(current)?;
                return Err(SchemaError::NavigationRequiredByOwnership {
                    navigation: navigation.name.clone(),
                    entity: self.entity_name(navigation.declaring),
                });
            }
            if !source.overrides(slot_source) {
                tracing::trace!(foreign_key = %fk, %source, "navigation removal outranked");
                return Ok(Outcome::Outranked);
            }
            self.detach_navigation_unchecked(current);
            self.set_slot(fk, to_principal, None, Some(source))?;
            return Ok(Outcome::Applied(None));
        };

        let declaring = if to_principal {
            data.dependent
        } else {
            data.principal
        };
        validate_name(&member.name)?;
        if to_principal && member.is_collection {
            return Err(SchemaError::NavigationShapeMismatch {
                navigation: member.name,
                entity: self.entity_name(declaring),
                reason: "a navigation to the principal must be a reference",
            });
        }
        if !to_principal && self.is_keyless(data.dependent) {
            return Err(SchemaError::NavigationShapeMismatch {
                navigation: member.name,
                entity: self.entity_name(declaring),
                reason: "a keyless entity type cannot be reached from its principal",
            });
        }

        if let Some(current) = slot {
            let navigation = self.navigation_ref(current)?;
            if navigation.name == member.name && navigation.is_collection == member.is_collection {
                let refreshed = source.max_with(slot_source);
                let navigation = self.navigation_mut(current)?;
                navigation.source = source.max_with(Some(navigation.source));
                self.set_slot(fk, to_principal, Some(current), Some(refreshed))?;
                return Ok(Outcome::Applied(Some(current)));
            }
        }
        if !source.overrides(slot_source) {
            tracing::trace!(foreign_key = %fk, %source, "navigation slot outranked");
            return Ok(Outcome::Outranked);
        }

        let displaced = match self.displaced_navigation(declaring, &member.name, slot, source)? {
            Displacement::Free => None,
            Displacement::Detach(other) => Some(other),
            Displacement::Blocked => return Ok(Outcome::Outranked),
        };

        let required_unique = !member.is_collection;
        let mut sync_unique = false;
        if !to_principal {
            let data = self.fk_ref(fk)?;
            if data.is_unique.get() != Some(&required_unique) {
                if !required_unique && data.is_required_dependent() {
                    return Err(SchemaError::NonUniqueRequiredDependent {
                        properties: format_members(&self.property_names(&data.properties)),
                        entity: self.entity_name(data.dependent),
                    });
                }
                if data.is_unique.is_set() && !source.outranks(data.is_unique.source()) {
                    tracing::trace!(foreign_key = %fk, %source, "uniqueness pins navigation shape");
                    return Ok(Outcome::Outranked);
                }
                sync_unique = true;
            }
        }

        for other in displaced.into_iter().chain(slot) {
            self.detach_navigation_unchecked(other);
        }
        let id = NavigationId(self.allocate_id());
        self.navigations.insert(
            id,
            Navigation {
                id,
                name: member.name.clone(),
                declaring,
                foreign_key: fk,
                points_to_principal: to_principal,
                is_collection: member.is_collection,
                source,
                lazy_load: Facet::unset(),
                eager_load: Facet::unset(),
                access_mode: Facet::unset(),
            },
        );
        self.entity_mut(declaring)?.navigations.push(id);
        self.set_slot(fk, to_principal, Some(id), Some(source))?;
        if sync_unique {
            self.fk_mut(fk)?.is_unique.force(required_unique, source);
            tracing::debug!(foreign_key = %fk, unique = required_unique, "uniqueness follows navigation shape");
        }
        tracing::debug!(
            navigation = %member.name,
            entity = %self.entity_name(declaring),
            %source,
            "navigation attached"
        );
        Ok(Outcome::Applied(Some(id)))
    }

    /// Resolve a name clash for a new navigation on `declaring`.
    fn displaced_navigation(
        &self,
        declaring: EntityTypeId,
        name: &str,
        slot: Option<NavigationId>,
        source: Provenance,
    ) -> Result<Displacement, SchemaError> {
        match self.find_member_in_lineage(declaring, name) {
            None => Ok(Displacement::Free),
            Some((MemberKind::Navigation, node)) => {
                let Some(existing) = self.entity_ref(node)?.navigations.iter().copied().find(|n| {
                    self.navigations.get(n).is_some_and(|n| n.name == name)
                }) else {
                    return Ok(Displacement::Free);
                };
                if Some(existing) == slot {
                    return Ok(Displacement::Free);
                }
                let navigation = self.navigation_ref(existing)?;
                let owner = self.fk_ref(navigation.foreign_key)?;
                let owner_source = if navigation.points_to_principal {
                    owner.dependent_to_principal_source
                } else {
                    if owner.is_ownership() {
                        return Err(SchemaError::NavigationRequiredByOwnership {
                            navigation: name.to_string(),
                            entity: self.entity_name(node),
                        });
                    }
                    owner.principal_to_dependent_source
                };
                if !source.overrides(owner_source) {
                    tracing::trace!(navigation = name, %source, "navigation owned elsewhere");
                    return Ok(Displacement::Blocked);
                }
                tracing::debug!(navigation = name, foreign_key = %owner.id, "navigation moved between foreign keys");
                Ok(Displacement::Detach(existing))
            }
            Some((kind, node)) => Err(SchemaError::DuplicateMember {
                what: kind.label(),
                member: name.to_string(),
                entity: self.entity_name(declaring),
                other: self.entity_name(node),
            }),
        }
    }

    fn set_slot(
        &mut self,
        fk: ForeignKeyId,
        to_principal: bool,
        navigation: Option<NavigationId>,
        source: Option<Provenance>,
    ) -> Result<(), SchemaError> {
        let data = self.fk_mut(fk)?;
        if to_principal {
            data.dependent_to_principal = navigation;
            data.dependent_to_principal_source = source;
        } else {
            data.principal_to_dependent = navigation;
            data.principal_to_dependent_source = source;
        }
        Ok(())
    }

    /// Unlink a navigation from its entity type, its owner and the arena.
    pub(crate) fn detach_navigation_unchecked(&mut self, navigation: NavigationId) {
        let Some(removed) = self.navigations.remove(&navigation) else {
            return;
        };
        if let Some(node) = self.entity_types.get_mut(&removed.declaring) {
            node.navigations.retain(|n| *n != navigation);
        }
        if let Some(fk) = self.foreign_keys.get_mut(&removed.foreign_key) {
            if fk.dependent_to_principal == Some(navigation) {
                fk.dependent_to_principal = None;
                fk.dependent_to_principal_source = None;
            }
            if fk.principal_to_dependent == Some(navigation) {
                fk.principal_to_dependent = None;
                fk.principal_to_dependent_source = None;
            }
        }
        tracing::debug!(navigation = %removed.name, "navigation detached");
    }

    // =========================================================================
    // NAVIGATION FACETS
    // =========================================================================

    pub fn set_navigation_lazy_load(
        &mut self,
        navigation: NavigationId,
        enabled: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.set_navigation_facet(navigation, |n| &mut n.lazy_load, enabled, source)
    }

    pub fn set_navigation_eager_load(
        &mut self,
        navigation: NavigationId,
        eager: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.set_navigation_facet(navigation, |n| &mut n.eager_load, eager, source)
    }

    pub fn set_navigation_access_mode(
        &mut self,
        navigation: NavigationId,
        mode: Option<PropertyAccessMode>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.set_navigation_facet(navigation, |n| &mut n.access_mode, mode, source)
    }

    fn set_navigation_facet<T: Clone + PartialEq>(
        &mut self,
        navigation: NavigationId,
        facet: fn(&mut Navigation) -> &mut Facet<T>,
        value: Option<T>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_navigation_facet")?;
        let navigation = self.navigation_mut(navigation)?;
        if facet(navigation).apply(value, source).accepted() {
            Ok(Outcome::Applied(()))
        } else {
            tracing::trace!(navigation = %navigation.name, %source, "navigation facet outranked");
            Ok(Outcome::Outranked)
        }
    }

    // =========================================================================
    // SKIP NAVIGATIONS
    // =========================================================================

    /// Declare a skip navigation on `entity` pointing at `target`.
    pub fn add_skip_navigation(
        &mut self,
        entity: EntityTypeId,
        member: NavigationMember,
        target: EntityTypeId,
        source: Provenance,
    ) -> Result<Outcome<SkipNavigationId>, SchemaError> {
        self.ensure_mutable("add_skip_navigation")?;
        validate_name(&member.name)?;
        self.entity_ref(entity)?;
        self.entity_ref(target)?;

        let declared = self.entity_ref(entity)?.skip_navigations.iter().copied().find(|s| {
            self.skip_navigations
                .get(s)
                .is_some_and(|s| s.name == member.name)
        });
        if let Some(existing) = declared {
            let skip = self.skip_mut(existing)?;
            if skip.target == target && skip.is_collection == member.is_collection {
                skip.source = source.max_with(Some(skip.source));
                return Ok(Outcome::Applied(existing));
            }
        }
        if let Some((kind, other)) = self.find_member_in_lineage(entity, &member.name) {
            return Err(SchemaError::DuplicateMember {
                what: kind.label(),
                member: member.name,
                entity: self.entity_name(entity),
                other: self.entity_name(other),
            });
        }

        let id = SkipNavigationId(self.allocate_id());
        self.skip_navigations.insert(
            id,
            SkipNavigation {
                id,
                name: member.name.clone(),
                declaring: entity,
                target,
                is_collection: member.is_collection,
                source,
                foreign_key: Facet::unset(),
                inverse: Facet::unset(),
            },
        );
        self.entity_mut(entity)?.skip_navigations.push(id);
        tracing::debug!(
            navigation = %member.name,
            entity = %self.entity_name(entity),
            "skip navigation added"
        );
        Ok(Outcome::Applied(id))
    }

    fn skip_mismatch(&self, skip: SkipNavigationId, reason: &'static str) -> SchemaError {
        let (navigation, entity) = self
            .skip_navigations
            .get(&skip)
            .map(|s| (s.name.clone(), self.entity_name(s.declaring)))
            .unwrap_or_else(|| (skip.to_string(), String::new()));
        SchemaError::SkipNavigationMismatch {
            navigation,
            entity,
            reason,
        }
    }

    /// Join node of `fk`, if the foreign key exists.
    fn join_of(&self, fk: Option<ForeignKeyId>) -> Option<EntityTypeId> {
        fk.and_then(|fk| self.foreign_keys.get(&fk))
            .map(|fk| fk.dependent)
    }

    /// Set the foreign key from the join node to the skip navigation's
    /// declaring type.
    pub fn set_skip_navigation_foreign_key(
        &mut self,
        skip: SkipNavigationId,
        fk: Option<ForeignKeyId>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_skip_navigation_foreign_key")?;
        let navigation = self.skip_ref(skip)?;
        if let Some(fk) = fk {
            let data = self.fk_ref(fk)?;
            if !self.is_same_or_ancestor(data.principal, navigation.declaring) {
                return Err(self.skip_mismatch(
                    skip,
                    "the foreign key's principal is not the declaring entity type",
                ));
            }
            let inverse_fk = navigation
                .inverse
                .get()
                .and_then(|i| self.skip_navigations.get(i))
                .and_then(|i| i.foreign_key.get().copied());
            if let Some(inverse_join) = self.join_of(inverse_fk) {
                if inverse_join != data.dependent {
                    return Err(self.skip_mismatch(
                        skip,
                        "the foreign key does not use the inverse's join entity type",
                    ));
                }
            }
        }
        if !self.skip_mut(skip)?.foreign_key.apply(fk, source).accepted() {
            tracing::trace!(skip_navigation = %skip, %source, "skip navigation foreign key outranked");
            return Ok(Outcome::Outranked);
        }
        self.sweep_synthesized();
        Ok(Outcome::Applied(()))
    }

    /// Pair two skip navigations as inverses of each other, or unpair
    /// `skip` when `inverse` is `None`.
    pub fn set_skip_navigation_inverse(
        &mut self,
        skip: SkipNavigationId,
        inverse: Option<SkipNavigationId>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_skip_navigation_inverse")?;
        let navigation = self.skip_ref(skip)?;
        let previous = navigation.inverse.get().copied();

        let Some(inverse) = inverse else {
            if !navigation.inverse.can_apply(None, source) {
                return Ok(Outcome::Outranked);
            }
            self.skip_mut(skip)?.inverse.clear();
            self.unpair(previous, skip);
            return Ok(Outcome::Applied(()));
        };

        let other = self.skip_ref(inverse)?;
        if inverse == skip {
            return Err(self.skip_mismatch(skip, "a skip navigation cannot be its own inverse"));
        }
        if !self.same_hierarchy(other.declaring, navigation.target)
            || !self.same_hierarchy(other.target, navigation.declaring)
        {
            return Err(self.skip_mismatch(skip, "the inverse does not point back"));
        }
        let (join, other_join) = (
            self.join_of(navigation.foreign_key.get().copied()),
            self.join_of(other.foreign_key.get().copied()),
        );
        if let (Some(join), Some(other_join)) = (join, other_join) {
            if join != other_join {
                return Err(self.skip_mismatch(
                    skip,
                    "the inverse uses a different join entity type",
                ));
            }
        }
        if !navigation.inverse.can_set(&inverse, source) || !other.inverse.can_set(&skip, source) {
            tracing::trace!(skip_navigation = %skip, %source, "skip navigation inverse outranked");
            return Ok(Outcome::Outranked);
        }
        let other_previous = other.inverse.get().copied();

        let _ = self.skip_mut(skip)?.inverse.try_set(inverse, source);
        let _ = self.skip_mut(inverse)?.inverse.try_set(skip, source);
        if previous != Some(inverse) {
            self.unpair(previous, skip);
        }
        if other_previous != Some(skip) {
            self.unpair(other_previous, inverse);
        }
        Ok(Outcome::Applied(()))
    }

    /// Clear `stale`'s inverse if it still points at `skip`.
    fn unpair(&mut self, stale: Option<SkipNavigationId>, skip: SkipNavigationId) {
        if let Some(stale) = stale.and_then(|s| self.skip_navigations.get_mut(&s)) {
            if stale.inverse.get() == Some(&skip) {
                stale.inverse.clear();
            }
        }
    }

    pub fn remove_skip_navigation(
        &mut self,
        skip: SkipNavigationId,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("remove_skip_navigation")?;
        if !source.overrides(Some(self.skip_ref(skip)?.source)) {
            return Ok(Outcome::Outranked);
        }
        self.remove_skip_navigation_unchecked(skip);
        self.sweep_synthesized();
        Ok(Outcome::Applied(()))
    }

    pub(crate) fn remove_skip_navigation_unchecked(&mut self, skip: SkipNavigationId) {
        let Some(removed) = self.skip_navigations.remove(&skip) else {
            return;
        };
        if let Some(node) = self.entity_types.get_mut(&removed.declaring) {
            node.skip_navigations.retain(|s| *s != skip);
        }
        self.unpair(removed.inverse.get().copied(), skip);
        tracing::debug!(navigation = %removed.name, "skip navigation removed");
    }

    // =========================================================================
    // JOIN ENTITY SYNTHESIS
    // =========================================================================

    /// Synthesize a join entity type for two skip navigations and wire
    /// them through it as inverses.
    ///
    /// The join node gets one required foreign key to each side, named
    /// `{InverseNavigation}{KeyProperty}`, and a composite primary key over
    /// both.
    pub fn create_join_entity(
        &mut self,
        left: SkipNavigationId,
        right: SkipNavigationId,
        source: Provenance,
    ) -> Result<Outcome<EntityTypeId>, SchemaError> {
        self.ensure_mutable("create_join_entity")?;
        let l = self.skip_ref(left)?.clone();
        let r = self.skip_ref(right)?.clone();
        if left == right {
            return Err(self.skip_mismatch(left, "a skip navigation cannot be its own inverse"));
        }
        if !l.foreign_key.can_apply(None, source) || !r.foreign_key.can_apply(None, source) {
            tracing::trace!(skip_navigation = %left, %source, "join entity outranked");
            return Ok(Outcome::Outranked);
        }
        let name = self.unique_entity_name(&format!(
            "{}{}",
            self.entity_name(l.declaring),
            self.entity_name(r.declaring)
        ));

        self.transact(|model| {
            let join = model.add_synthesized_entity_type(&name);
            let left_names = model.conventional_join_names(&r.name, l.declaring)?;
            let right_names = model.conventional_join_names(&l.name, r.declaring)?;
            let Outcome::Applied(left_fk) =
                model.add_relationship(join, l.declaring, &left_names, None, Provenance::Convention)?
            else {
                return Ok(Outcome::Outranked);
            };
            let Outcome::Applied(right_fk) =
                model.add_relationship(join, r.declaring, &right_names, None, Provenance::Convention)?
            else {
                return Ok(Outcome::Outranked);
            };
            for fk in [left_fk, right_fk] {
                let _ = model.set_is_required(fk, Some(true), Provenance::Convention)?;
            }
            let mut members = model.fk_ref(left_fk)?.properties.clone();
            members.extend(model.fk_ref(right_fk)?.properties.iter().copied());
            if model
                .set_primary_key(join, &members, Provenance::Convention)?
                .is_outranked()
            {
                return Ok(Outcome::Outranked);
            }

            for (skip, fk) in [(left, left_fk), (right, right_fk)] {
                if model
                    .set_skip_navigation_foreign_key(skip, Some(fk), source)?
                    .is_outranked()
                {
                    return Ok(Outcome::Outranked);
                }
            }
            if model
                .set_skip_navigation_inverse(left, Some(right), source)?
                .is_outranked()
            {
                return Ok(Outcome::Outranked);
            }
            tracing::debug!(entity = %name, "join entity type synthesized");
            Ok(Outcome::Applied(join))
        })
    }

    fn conventional_join_names(
        &self,
        prefix: &str,
        principal: EntityTypeId,
    ) -> Result<Vec<String>, SchemaError> {
        Ok(self
            .default_key_column_names(principal)?
            .into_iter()
            .map(|column| format!("{}{}", prefix, column))
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
