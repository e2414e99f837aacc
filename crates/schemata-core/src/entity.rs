//! # Entity Types and Inheritance
//!
//! Entity type nodes form a single-inheritance forest. A node stores only
//! what it declares; everything inherited is visible through the merged
//! views computed here (`all_properties`, `all_foreign_keys`, ...).
//!
//! Storage positions (`Property::index`) are a cached flattening of each
//! lineage and are recomputed whenever the lineage changes shape.

use crate::model::Model;
use crate::provenance::{Facet, Outcome, Provenance};
use crate::types::{
    BackingType, EntityTypeId, ForeignKeyId, IndexId, KeyId, NavigationId, PropertyId,
    SchemaError, SkipNavigationId, TypeRegistration, format_members,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// ENTITY TYPE
// =============================================================================

/// A node of the schema graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityType {
    pub(crate) id: EntityTypeId,
    pub(crate) name: String,
    pub(crate) backing: Option<BackingType>,
    pub(crate) registration: TypeRegistration,
    pub(crate) source: Provenance,
    /// Created by the kernel (join nodes) rather than declared by a front-end.
    pub(crate) synthesized: bool,

    pub(crate) base: Facet<EntityTypeId>,
    pub(crate) derived: BTreeSet<EntityTypeId>,

    pub(crate) properties: Vec<PropertyId>,
    pub(crate) keys: Vec<KeyId>,
    pub(crate) primary_key: Facet<KeyId>,
    pub(crate) foreign_keys: Vec<ForeignKeyId>,
    pub(crate) navigations: Vec<NavigationId>,
    pub(crate) skip_navigations: Vec<SkipNavigationId>,
    pub(crate) indexes: Vec<IndexId>,
    pub(crate) keyless: Facet<bool>,
}

impl EntityType {
    pub(crate) fn new(
        id: EntityTypeId,
        name: &str,
        backing: Option<BackingType>,
        registration: TypeRegistration,
        source: Provenance,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            backing,
            registration,
            source,
            synthesized: false,
            base: Facet::unset(),
            derived: BTreeSet::new(),
            properties: Vec::new(),
            keys: Vec::new(),
            primary_key: Facet::unset(),
            foreign_keys: Vec::new(),
            navigations: Vec::new(),
            skip_navigations: Vec::new(),
            indexes: Vec::new(),
            keyless: Facet::unset(),
        }
    }

    pub fn id(&self) -> EntityTypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backing host type; `None` for name-only nodes.
    pub fn backing_type(&self) -> Option<&BackingType> {
        self.backing.as_ref()
    }

    pub fn is_name_only(&self) -> bool {
        self.backing.is_none()
    }

    pub fn registration(&self) -> TypeRegistration {
        self.registration
    }

    /// Provenance of the node itself.
    pub fn source(&self) -> Provenance {
        self.source
    }

    /// Whether the kernel synthesized this node.
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    pub fn base_type(&self) -> Option<EntityTypeId> {
        self.base.get().copied()
    }

    pub fn base_type_source(&self) -> Option<Provenance> {
        self.base.source()
    }

    /// Direct derived types, in id order.
    pub fn derived_types(&self) -> impl Iterator<Item = EntityTypeId> + '_ {
        self.derived.iter().copied()
    }

    /// Properties declared on this node, in declaration order.
    pub fn declared_properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn declared_keys(&self) -> &[KeyId] {
        &self.keys
    }

    pub fn primary_key_source(&self) -> Option<Provenance> {
        self.primary_key.source()
    }

    pub fn declared_foreign_keys(&self) -> &[ForeignKeyId] {
        &self.foreign_keys
    }

    pub fn declared_navigations(&self) -> &[NavigationId] {
        &self.navigations
    }

    pub fn declared_skip_navigations(&self) -> &[SkipNavigationId] {
        &self.skip_navigations
    }

    pub fn declared_indexes(&self) -> &[IndexId] {
        &self.indexes
    }

    pub fn keyless_source(&self) -> Option<Provenance> {
        self.keyless.source()
    }
}

/// Which kind of named member occupies a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemberKind {
    Property,
    Navigation,
    SkipNavigation,
}

impl MemberKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            MemberKind::Property => "Property",
            MemberKind::Navigation => "Navigation",
            MemberKind::SkipNavigation => "Skip navigation",
        }
    }
}

impl Model {
    // =========================================================================
    // LINEAGE
    // =========================================================================

    /// Ancestors of `entity`, nearest first.
    pub fn ancestors(&self, entity: EntityTypeId) -> Vec<EntityTypeId> {
        let mut chain = Vec::new();
        let mut current = self
            .entity_types
            .get(&entity)
            .and_then(|e| e.base.get().copied());
        while let Some(id) = current {
            if chain.contains(&id) || id == entity {
                break;
            }
            chain.push(id);
            current = self
                .entity_types
                .get(&id)
                .and_then(|e| e.base.get().copied());
        }
        chain
    }

    /// The lineage root of `entity` (itself when it has no base).
    pub fn root_of(&self, entity: EntityTypeId) -> EntityTypeId {
        self.ancestors(entity).last().copied().unwrap_or(entity)
    }

    /// All transitive derived types, breadth-first in id order.
    pub fn derived_types_transitive(&self, entity: EntityTypeId) -> Vec<EntityTypeId> {
        let mut result = Vec::new();
        let mut queue: VecDeque<EntityTypeId> = VecDeque::from([entity]);
        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.entity_types.get(&current) {
                for derived in &node.derived {
                    if *derived != entity && !result.contains(derived) {
                        result.push(*derived);
                        queue.push_back(*derived);
                    }
                }
            }
        }
        result
    }

    /// `entity` followed by its transitive derived types.
    pub(crate) fn subtree(&self, entity: EntityTypeId) -> Vec<EntityTypeId> {
        let mut nodes = vec![entity];
        nodes.extend(self.derived_types_transitive(entity));
        nodes
    }

    /// Whether `candidate` is `entity` or one of its ancestors.
    pub fn is_same_or_ancestor(&self, candidate: EntityTypeId, entity: EntityTypeId) -> bool {
        candidate == entity || self.ancestors(entity).contains(&candidate)
    }

    /// Whether both nodes sit in the same inheritance tree.
    pub fn same_hierarchy(&self, a: EntityTypeId, b: EntityTypeId) -> bool {
        self.root_of(a) == self.root_of(b)
    }

    /// Nearest node that is `a` or an ancestor of `a` and also `b` or an
    /// ancestor of `b`.
    pub(crate) fn common_ancestor(&self, a: EntityTypeId, b: EntityTypeId) -> Option<EntityTypeId> {
        let mut chain = vec![a];
        chain.extend(self.ancestors(a));
        chain.into_iter().find(|c| self.is_same_or_ancestor(*c, b))
    }

    /// Ancestors, the node, and its descendants.
    pub(crate) fn lineage(&self, entity: EntityTypeId) -> Vec<EntityTypeId> {
        let mut nodes = self.ancestors(entity);
        nodes.extend(self.subtree(entity));
        nodes
    }

    // =========================================================================
    // MERGED VIEWS
    // =========================================================================

    /// Every property visible on `entity`, ancestors first.
    pub fn all_properties(&self, entity: EntityTypeId) -> Vec<PropertyId> {
        let mut chain = self.ancestors(entity);
        chain.reverse();
        chain.push(entity);
        chain
            .iter()
            .filter_map(|id| self.entity_types.get(id))
            .flat_map(|e| e.properties.iter().copied())
            .collect()
    }

    /// Property declared on exactly this node.
    pub fn declared_property(&self, entity: EntityTypeId, name: &str) -> Option<PropertyId> {
        self.entity_types.get(&entity).and_then(|e| {
            e.properties
                .iter()
                .copied()
                .find(|p| self.properties.get(p).is_some_and(|p| p.name == name))
        })
    }

    /// Property visible on `entity` (declared or inherited).
    pub fn find_property(&self, entity: EntityTypeId, name: &str) -> Option<PropertyId> {
        self.all_properties(entity)
            .into_iter()
            .find(|p| self.properties.get(p).is_some_and(|p| p.name == name))
    }

    /// Keys visible on `entity`; they always live on the lineage root.
    pub fn all_keys(&self, entity: EntityTypeId) -> Vec<KeyId> {
        self.entity_types
            .get(&self.root_of(entity))
            .map(|e| e.keys.clone())
            .unwrap_or_default()
    }

    /// The primary key visible on `entity`.
    pub fn primary_key(&self, entity: EntityTypeId) -> Option<KeyId> {
        self.entity_types
            .get(&self.root_of(entity))
            .and_then(|e| e.primary_key.get().copied())
    }

    /// Foreign keys declared on `entity` or inherited from its ancestors.
    pub fn all_foreign_keys(&self, entity: EntityTypeId) -> Vec<ForeignKeyId> {
        let mut chain = self.ancestors(entity);
        chain.reverse();
        chain.push(entity);
        chain
            .iter()
            .filter_map(|id| self.entity_types.get(id))
            .flat_map(|e| e.foreign_keys.iter().copied())
            .collect()
    }

    /// Foreign keys whose principal is `entity` or one of its ancestors.
    pub fn referencing_foreign_keys(&self, entity: EntityTypeId) -> Vec<ForeignKeyId> {
        self.foreign_keys
            .values()
            .filter(|fk| self.is_same_or_ancestor(fk.principal, entity))
            .map(|fk| fk.id)
            .collect()
    }

    /// Navigations visible on `entity`, ancestors first.
    pub fn all_navigations(&self, entity: EntityTypeId) -> Vec<NavigationId> {
        let mut chain = self.ancestors(entity);
        chain.reverse();
        chain.push(entity);
        chain
            .iter()
            .filter_map(|id| self.entity_types.get(id))
            .flat_map(|e| e.navigations.iter().copied())
            .collect()
    }

    /// Skip navigations visible on `entity`, ancestors first.
    pub fn all_skip_navigations(&self, entity: EntityTypeId) -> Vec<SkipNavigationId> {
        let mut chain = self.ancestors(entity);
        chain.reverse();
        chain.push(entity);
        chain
            .iter()
            .filter_map(|id| self.entity_types.get(id))
            .flat_map(|e| e.skip_navigations.iter().copied())
            .collect()
    }

    /// Indexes visible on `entity`, ancestors first.
    pub fn all_indexes(&self, entity: EntityTypeId) -> Vec<IndexId> {
        let mut chain = self.ancestors(entity);
        chain.reverse();
        chain.push(entity);
        chain
            .iter()
            .filter_map(|id| self.entity_types.get(id))
            .flat_map(|e| e.indexes.iter().copied())
            .collect()
    }

    /// Whether `entity`'s lineage is keyless (decided on the root).
    pub fn is_keyless(&self, entity: EntityTypeId) -> bool {
        self.entity_types
            .get(&self.root_of(entity))
            .and_then(|e| e.keyless.get().copied())
            .unwrap_or(false)
    }

    /// Names declared on `entity` itself, by member kind.
    pub(crate) fn declared_member_names(
        &self,
        entity: EntityTypeId,
    ) -> Vec<(String, MemberKind)> {
        let Some(node) = self.entity_types.get(&entity) else {
            return Vec::new();
        };
        let properties = node
            .properties
            .iter()
            .filter_map(|p| self.properties.get(p))
            .map(|p| (p.name.clone(), MemberKind::Property));
        let navigations = node
            .navigations
            .iter()
            .filter_map(|n| self.navigations.get(n))
            .map(|n| (n.name.clone(), MemberKind::Navigation));
        let skips = node
            .skip_navigations
            .iter()
            .filter_map(|s| self.skip_navigations.get(s))
            .map(|s| (s.name.clone(), MemberKind::SkipNavigation));
        properties.chain(navigations).chain(skips).collect()
    }

    /// First member named `name` anywhere in `entity`'s lineage.
    pub(crate) fn find_member_in_lineage(
        &self,
        entity: EntityTypeId,
        name: &str,
    ) -> Option<(MemberKind, EntityTypeId)> {
        self.lineage(entity).into_iter().find_map(|node| {
            self.declared_member_names(node)
                .into_iter()
                .find(|(member, _)| member == name)
                .map(|(_, kind)| (kind, node))
        })
    }

    /// Fail when `name` is already used by a navigation or skip navigation
    /// in `entity`'s lineage.
    pub(crate) fn check_navigation_name_free(
        &self,
        entity: EntityTypeId,
        name: &str,
    ) -> Result<(), SchemaError> {
        match self.find_member_in_lineage(entity, name) {
            Some((kind, other)) if kind != MemberKind::Property => {
                Err(SchemaError::DuplicateMember {
                    what: MemberKind::Property.label(),
                    member: name.to_string(),
                    entity: self.entity_name(entity),
                    other: self.entity_name(other),
                })
            }
            _ => Ok(()),
        }
    }

    // =========================================================================
    // STORAGE LAYOUT
    // =========================================================================

    /// Recompute storage positions for the lineage containing `entity`.
    ///
    /// Positions are contiguous from 0 per root: root properties in
    /// declaration order, each derived node continuing after its parent.
    /// Siblings share positions.
    pub(crate) fn recompute_layout(&mut self, entity: EntityTypeId) {
        let root = self.root_of(entity);
        let mut stack: Vec<(EntityTypeId, usize)> = vec![(root, 0)];
        while let Some((node, offset)) = stack.pop() {
            let Some(current) = self.entity_types.get(&node) else {
                continue;
            };
            let declared = current.properties.clone();
            let derived: Vec<EntityTypeId> = current.derived.iter().rev().copied().collect();
            for (position, property) in declared.iter().enumerate() {
                if let Some(property) = self.properties.get_mut(property) {
                    property.index = offset.saturating_add(position);
                }
            }
            let next = offset.saturating_add(declared.len());
            stack.extend(derived.into_iter().map(|d| (d, next)));
        }
    }

    // =========================================================================
    // INHERITANCE
    // =========================================================================

    /// Set (or clear) the base type of `entity`.
    pub fn set_base_type(
        &mut self,
        entity: EntityTypeId,
        base: Option<EntityTypeId>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_base_type")?;
        let current = self.entity_ref(entity)?.base.get().copied();
        if let Some(base) = base {
            self.entity_ref(base)?;
        }

        if current == base {
            self.entity_mut(entity)?.base.refresh(source);
            return Ok(Outcome::Applied(()));
        }

        if let Some(base) = base {
            self.check_base_compatible(entity, base)?;
            let node = self.entity_ref(entity)?;
            if let Some(key) = node.keys.first() {
                let root = self.root_of(base);
                tracing::trace!(key = %key, "derived type cannot own keys");
                return Err(SchemaError::DerivedTypeKey {
                    entity: node.name.clone(),
                    root: self.entity_name(root),
                });
            }
            self.check_lineage_duplicates(entity, base)?;
        }
        self.check_dropped_ancestors(entity, base)?;

        if !self.entity_ref(entity)?.base.can_apply(base.as_ref(), source) {
            tracing::trace!(entity = %self.entity_name(entity), %source, "base type outranked");
            return Ok(Outcome::Outranked);
        }

        let old_root = self.root_of(entity);
        if let Some(old) = current {
            if let Some(old) = self.entity_types.get_mut(&old) {
                old.derived.remove(&entity);
            }
        }
        if let Some(base) = base {
            self.entity_mut(base)?.derived.insert(entity);
        }
        let _ = self.entity_mut(entity)?.base.apply(base, source);

        self.recompute_layout(old_root);
        self.recompute_layout(entity);
        tracing::debug!(
            entity = %self.entity_name(entity),
            base = ?base.map(|b| self.entity_name(b)),
            %source,
            "base type changed"
        );
        Ok(Outcome::Applied(()))
    }

    fn check_base_compatible(
        &self,
        entity: EntityTypeId,
        base: EntityTypeId,
    ) -> Result<(), SchemaError> {
        let node = self.entity_ref(entity)?;
        let parent = self.entity_ref(base)?;

        if base == entity || self.is_same_or_ancestor(entity, base) {
            return Err(SchemaError::CircularInheritance {
                entity: node.name.clone(),
                base: parent.name.clone(),
            });
        }

        match (&node.backing, &parent.backing) {
            (Some(derived), Some(ancestor)) => {
                if !ancestor.is_assignable_from(derived) {
                    return Err(SchemaError::NotAssignable {
                        entity: node.name.clone(),
                        base: parent.name.clone(),
                        entity_type: derived.name.clone(),
                        base_type: ancestor.name.clone(),
                    });
                }
            }
            (None, None) => {}
            _ => {
                return Err(SchemaError::BackingTypeMismatch {
                    entity: node.name.clone(),
                    base: parent.name.clone(),
                });
            }
        }

        if node.keyless.get_or(false) != self.is_keyless(base) {
            return Err(SchemaError::KindMismatch {
                entity: node.name.clone(),
                base: parent.name.clone(),
            });
        }
        Ok(())
    }

    /// Members of the new base chain must not collide with members of
    /// `entity`'s subtree.
    fn check_lineage_duplicates(
        &self,
        entity: EntityTypeId,
        base: EntityTypeId,
    ) -> Result<(), SchemaError> {
        let mut chain = vec![base];
        chain.extend(self.ancestors(base));
        let subtree = self.subtree(entity);

        let mut chain_names: BTreeMap<String, EntityTypeId> = BTreeMap::new();
        for node in &chain {
            for (name, _) in self.declared_member_names(*node) {
                chain_names.entry(name).or_insert(*node);
            }
        }
        for node in &subtree {
            for (name, kind) in self.declared_member_names(*node) {
                if let Some(other) = chain_names.get(&name) {
                    return Err(SchemaError::DuplicateMember {
                        what: kind.label(),
                        member: name,
                        entity: self.entity_name(*node),
                        other: self.entity_name(*other),
                    });
                }
            }
        }

        let signature = |fk: &ForeignKeyId| {
            self.foreign_keys.get(fk).map(|fk| {
                let mut names = self.property_names(&fk.properties);
                names.sort();
                (names, fk.principal)
            })
        };
        let mut chain_fks = BTreeMap::new();
        for node in &chain {
            if let Some(e) = self.entity_types.get(node) {
                for fk in &e.foreign_keys {
                    if let Some(sig) = signature(fk) {
                        chain_fks.entry(sig).or_insert(*node);
                    }
                }
            }
        }
        for node in &subtree {
            if let Some(e) = self.entity_types.get(node) {
                for fk in &e.foreign_keys {
                    if let Some(sig) = signature(fk) {
                        if let Some(other) = chain_fks.get(&sig) {
                            return Err(SchemaError::DuplicateForeignKey {
                                properties: format_members(&sig.0),
                                entity: self.entity_name(*node),
                                other: self.entity_name(*other),
                            });
                        }
                    }
                }
            }
        }

        let mut chain_indexes = BTreeMap::new();
        for node in &chain {
            if let Some(e) = self.entity_types.get(node) {
                for index in e.indexes.iter().filter_map(|i| self.indexes.get(i)) {
                    chain_indexes
                        .entry(self.property_names(&index.properties))
                        .or_insert(*node);
                }
            }
        }
        for node in &subtree {
            if let Some(e) = self.entity_types.get(node) {
                for index in e.indexes.iter().filter_map(|i| self.indexes.get(i)) {
                    let names = self.property_names(&index.properties);
                    if let Some(other) = chain_indexes.get(&names) {
                        return Err(SchemaError::DuplicateIndex {
                            properties: format_members(&names),
                            entity: self.entity_name(*node),
                            other: self.entity_name(*other),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Nothing in `entity`'s subtree may keep using members of ancestors it
    /// is about to leave.
    fn check_dropped_ancestors(
        &self,
        entity: EntityTypeId,
        base: Option<EntityTypeId>,
    ) -> Result<(), SchemaError> {
        let mut kept: BTreeSet<EntityTypeId> = BTreeSet::new();
        if let Some(base) = base {
            kept.insert(base);
            kept.extend(self.ancestors(base));
        }
        let dropped: BTreeSet<EntityTypeId> = self
            .ancestors(entity)
            .into_iter()
            .filter(|a| !kept.contains(a))
            .collect();
        if dropped.is_empty() {
            return Ok(());
        }
        let subtree: BTreeSet<EntityTypeId> = self.subtree(entity).into_iter().collect();

        let from_dropped = |p: &PropertyId| {
            self.properties
                .get(p)
                .filter(|p| dropped.contains(&p.declaring))
        };
        let in_use = |node: EntityTypeId, ancestor: EntityTypeId, member: &str| {
            SchemaError::InheritedMemberInUse {
                entity: self.entity_name(node),
                ancestor: self.entity_name(ancestor),
                member: member.to_string(),
            }
        };

        for node in &subtree {
            let Some(e) = self.entity_types.get(node) else {
                continue;
            };
            for fk in e.foreign_keys.iter().filter_map(|f| self.foreign_keys.get(f)) {
                if let Some(p) = fk.properties.iter().find_map(from_dropped) {
                    return Err(in_use(*node, p.declaring, &p.name));
                }
            }
            for index in e.indexes.iter().filter_map(|i| self.indexes.get(i)) {
                if let Some(p) = index.properties.iter().find_map(from_dropped) {
                    return Err(in_use(*node, p.declaring, &p.name));
                }
            }
            for nav in e.navigations.iter().filter_map(|n| self.navigations.get(n)) {
                if let Some(fk) = self.foreign_keys.get(&nav.foreign_key) {
                    let end = if nav.points_to_principal {
                        fk.dependent
                    } else {
                        fk.principal
                    };
                    if dropped.contains(&end) {
                        return Err(in_use(*node, end, &nav.name));
                    }
                }
            }
            for skip in e
                .skip_navigations
                .iter()
                .filter_map(|s| self.skip_navigations.get(s))
            {
                let principal = skip
                    .foreign_key
                    .get()
                    .and_then(|fk| self.foreign_keys.get(fk))
                    .map(|fk| fk.principal);
                if let Some(principal) = principal.filter(|p| dropped.contains(p)) {
                    return Err(in_use(*node, principal, &skip.name));
                }
            }
        }

        for fk in self.foreign_keys.values() {
            if !subtree.contains(&fk.principal) {
                continue;
            }
            if let Some(key) = self.keys.get(&fk.principal_key) {
                if dropped.contains(&key.entity) {
                    return Err(SchemaError::KeyInUse {
                        key: format_members(&self.property_names(&key.properties)),
                        entity: self.entity_name(key.entity),
                        dependent: self.entity_name(fk.dependent),
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // KEYLESS
    // =========================================================================

    /// Mark a lineage root as keyless (a query/view node) or keyed.
    pub fn set_keyless(
        &mut self,
        entity: EntityTypeId,
        keyless: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_keyless")?;
        let node = self.entity_ref(entity)?;
        if node.base.is_set() {
            return Err(SchemaError::DerivedTypeKey {
                entity: node.name.clone(),
                root: self.entity_name(self.root_of(entity)),
            });
        }
        if keyless == Some(true) {
            if let Some(key) = node.keys.first().and_then(|k| self.keys.get(k)) {
                return Err(SchemaError::KeylessTypeKey {
                    properties: format_members(&self.property_names(&key.properties)),
                    entity: node.name.clone(),
                });
            }
            let subtree = self.subtree(entity);
            if self
                .foreign_keys
                .values()
                .any(|fk| subtree.contains(&fk.principal))
            {
                return Err(SchemaError::KeylessPrincipal {
                    entity: node.name.clone(),
                });
            }
        }

        if !self.entity_mut(entity)?.keyless.apply(keyless, source).accepted() {
            tracing::trace!(entity = %self.entity_name(entity), %source, "keyless outranked");
            return Ok(Outcome::Outranked);
        }
        Ok(Outcome::Applied(()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorKind, ValueType};

    fn typed(model: &mut Model, name: &str, backing: BackingType) -> EntityTypeId {
        model
            .add_entity_type(name, Some(backing), TypeRegistration::Ordinary, Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied")
    }

    fn prop(model: &mut Model, entity: EntityTypeId, name: &str) -> PropertyId {
        model
            .add_property(entity, name, ValueType::new("i32"), Provenance::Explicit)
            .expect("prop")
            .applied()
            .expect("applied")
    }

    #[test]
    fn cycle_rejected() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let b = typed(&mut model, "B", BackingType::new("B").extends("A"));
        model
            .set_base_type(b, Some(a), Provenance::Explicit)
            .expect("base");
        let err = model
            .set_base_type(a, Some(b), Provenance::Explicit)
            .expect_err("cycle");
        assert_eq!(err.kind(), ErrorKind::CircularInheritance);
        let err = model
            .set_base_type(a, Some(a), Provenance::Explicit)
            .expect_err("self");
        assert_eq!(err.kind(), ErrorKind::CircularInheritance);
    }

    #[test]
    fn backing_types_must_be_assignable() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let c = typed(&mut model, "C", BackingType::new("C"));
        let err = model
            .set_base_type(c, Some(a), Provenance::Explicit)
            .expect_err("not assignable");
        assert_eq!(err.kind(), ErrorKind::NotAssignable);
    }

    #[test]
    fn name_only_and_typed_do_not_mix() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let bag = model
            .add_entity_type("Bag", None, TypeRegistration::Shared, Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        let err = model
            .set_base_type(bag, Some(a), Provenance::Explicit)
            .expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::BackingTypeMismatch);
    }

    #[test]
    fn layout_places_ancestors_first() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let b = typed(&mut model, "B", BackingType::new("B").extends("A"));
        let b1 = prop(&mut model, b, "B1");
        let a1 = prop(&mut model, a, "A1");
        let a2 = prop(&mut model, a, "A2");
        assert_eq!(model.property(b1).map(|p| p.index()), Some(0));

        model
            .set_base_type(b, Some(a), Provenance::Explicit)
            .expect("base");
        assert_eq!(model.property(a1).map(|p| p.index()), Some(0));
        assert_eq!(model.property(a2).map(|p| p.index()), Some(1));
        assert_eq!(model.property(b1).map(|p| p.index()), Some(2));
        assert_eq!(model.all_properties(b), vec![a1, a2, b1]);

        model.set_base_type(b, None, Provenance::Explicit).expect("clear");
        assert_eq!(model.property(b1).map(|p| p.index()), Some(0));
        assert_eq!(model.all_properties(b), vec![b1]);
    }

    #[test]
    fn base_outranked_by_higher_source() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let b = typed(&mut model, "B", BackingType::new("B").extends("A"));
        model
            .set_base_type(b, Some(a), Provenance::Explicit)
            .expect("base");
        let outcome = model
            .set_base_type(b, None, Provenance::Convention)
            .expect("clear");
        assert!(outcome.is_outranked());
        assert_eq!(model.entity_type(b).and_then(|e| e.base_type()), Some(a));
    }

    #[test]
    fn keyed_node_cannot_become_derived() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let b = typed(&mut model, "B", BackingType::new("B").extends("A"));
        let id = prop(&mut model, b, "Id");
        model.add_key(b, &[id], Provenance::Explicit).expect("key");
        let err = model
            .set_base_type(b, Some(a), Provenance::Convention)
            .expect_err("keys");
        assert_eq!(err.kind(), ErrorKind::DerivedTypeKey);
    }

    #[test]
    fn keyless_and_keyed_do_not_mix() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let b = typed(&mut model, "B", BackingType::new("B").extends("A"));
        model
            .set_keyless(b, Some(true), Provenance::Explicit)
            .expect("keyless");
        let err = model
            .set_base_type(b, Some(a), Provenance::Explicit)
            .expect_err("kind");
        assert_eq!(err.kind(), ErrorKind::KindMismatch);
    }

    #[test]
    fn keyless_rejects_existing_keys() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let id = prop(&mut model, a, "Id");
        model.add_key(a, &[id], Provenance::Explicit).expect("key");
        let err = model
            .set_keyless(a, Some(true), Provenance::Explicit)
            .expect_err("keys");
        assert_eq!(err.kind(), ErrorKind::KeylessTypeKey);
    }

    #[test]
    fn common_ancestor_is_nearest() {
        let mut model = Model::new();
        let a = typed(&mut model, "A", BackingType::new("A"));
        let b = typed(&mut model, "B", BackingType::new("B").extends("A"));
        let c = typed(&mut model, "C", BackingType::new("C").extends("A"));
        model.set_base_type(b, Some(a), Provenance::Explicit).expect("b");
        model.set_base_type(c, Some(a), Provenance::Explicit).expect("c");
        assert_eq!(model.common_ancestor(b, c), Some(a));
        assert_eq!(model.common_ancestor(b, a), Some(a));
        assert!(model.same_hierarchy(b, c));
        assert_eq!(model.derived_types_transitive(a), vec![b, c]);
    }
}
