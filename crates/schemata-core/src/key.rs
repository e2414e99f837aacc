//! # Key Constraints
//!
//! A key is an ordered list of properties declared on one lineage root.
//! Becoming a key member forces a property non-nullable regardless of the
//! provenance of its nullability facet.
//!
//! A relationship created against a principal without any key gets a
//! *placeholder* key over a synthesized property. Setting a primary key
//! later retargets such relationships and discards the placeholder.

use crate::model::Model;
use crate::primitives::{PLACEHOLDER_KEY_NAME, PLACEHOLDER_KEY_TYPE};
use crate::provenance::{Outcome, Provenance};
use crate::types::{
    EntityTypeId, ForeignKeyId, KeyId, PropertyId, SchemaError, ValueType, format_members,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// KEY
// =============================================================================

/// A key constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Key {
    pub(crate) id: KeyId,
    pub(crate) entity: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) source: Provenance,
    pub(crate) placeholder: bool,
}

impl Key {
    pub fn id(&self) -> KeyId {
        self.id
    }

    pub fn declaring_entity(&self) -> EntityTypeId {
        self.entity
    }

    pub fn properties(&self) -> &[PropertyId] {
        &self.properties
    }

    pub fn source(&self) -> Provenance {
        self.source
    }

    /// Whether the kernel synthesized this key for a keyless principal.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

impl Model {
    // =========================================================================
    // VALIDATION
    // =========================================================================

    /// Structural checks shared by every way of declaring a key.
    pub(crate) fn check_key_members(
        &self,
        entity: EntityTypeId,
        properties: &[PropertyId],
    ) -> Result<(), SchemaError> {
        let node = self.entity_ref(entity)?;
        let names = self.property_names(properties);
        if properties.is_empty() {
            return Err(SchemaError::EmptyMemberList {
                what: "key",
                entity: node.name.clone(),
            });
        }
        for property in properties {
            if self.property_ref(*property)?.declaring != entity {
                return Err(SchemaError::WrongDeclaringEntity {
                    properties: format_members(&names),
                    entity: node.name.clone(),
                });
            }
        }
        if node.base.is_set() {
            return Err(SchemaError::DerivedTypeKey {
                entity: node.name.clone(),
                root: self.entity_name(self.root_of(entity)),
            });
        }
        if node.keyless.get_or(false) {
            return Err(SchemaError::KeylessTypeKey {
                properties: format_members(&names),
                entity: node.name.clone(),
            });
        }
        let mut seen = BTreeSet::new();
        for (property, name) in properties.iter().zip(&names) {
            if !seen.insert(*property) {
                return Err(SchemaError::DuplicatePropertyInList {
                    properties: format_members(&names),
                    property: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Key on `entity` with exactly these members.
    pub fn find_key(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Option<KeyId> {
        self.entity_types.get(&entity).and_then(|e| {
            e.keys
                .iter()
                .copied()
                .find(|k| self.keys.get(k).is_some_and(|k| k.properties == properties))
        })
    }

    // =========================================================================
    // MUTATORS
    // =========================================================================

    /// Add a key, or refresh an identical one.
    pub fn add_key(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: Provenance,
    ) -> Result<Outcome<KeyId>, SchemaError> {
        self.ensure_mutable("add_key")?;
        self.check_key_members(entity, properties)?;
        Ok(Outcome::Applied(self.commit_key(entity, properties, source)))
    }

    /// Insert or refresh a key that already passed `check_key_members`.
    fn commit_key(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: Provenance,
    ) -> KeyId {
        let id = match self.find_key(entity, properties) {
            Some(existing) => {
                if let Some(key) = self.keys.get_mut(&existing) {
                    key.source = source.max_with(Some(key.source));
                    key.placeholder = false;
                }
                existing
            }
            None => {
                let id = KeyId(self.allocate_id());
                self.keys.insert(
                    id,
                    Key {
                        id,
                        entity,
                        properties: properties.to_vec(),
                        source,
                        placeholder: false,
                    },
                );
                if let Some(node) = self.entity_types.get_mut(&entity) {
                    node.keys.push(id);
                }
                id
            }
        };
        for property in properties {
            if let Some(property) = self.properties.get_mut(property) {
                if property.nullable.get() != Some(&false) {
                    tracing::debug!(property = %property.name, "key member forced non-nullable");
                }
                property.nullable.force(false, source);
            }
        }
        id
    }

    /// Make `properties` the primary key of `entity`.
    ///
    /// Relationships still pointing at a placeholder key are retargeted to
    /// the new primary key where their principal-key facet allows it.
    pub fn set_primary_key(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: Provenance,
    ) -> Result<Outcome<KeyId>, SchemaError> {
        self.ensure_mutable("set_primary_key")?;
        self.check_key_members(entity, properties)?;

        let existing = self.find_key(entity, properties);
        let node = self.entity_ref(entity)?;
        let unchanged = existing.is_some() && node.primary_key.get() == existing.as_ref();
        if !unchanged && !source.overrides(node.primary_key.source()) {
            tracing::trace!(entity = %node.name, %source, "primary key outranked");
            return Ok(Outcome::Outranked);
        }

        self.transact(|model| {
            let key = model.commit_key(entity, properties, source);
            let _ = model.entity_mut(entity)?.primary_key.try_set(key, source);
            model.reconcile_placeholders(entity, key, source)?;
            Ok(Outcome::Applied(key))
        })
    }

    /// Return the primary key facet to unset. The key itself stays.
    pub fn clear_primary_key(
        &mut self,
        entity: EntityTypeId,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("clear_primary_key")?;
        let node = self.entity_mut(entity)?;
        if node.primary_key.try_reset(source).accepted() {
            Ok(Outcome::Applied(()))
        } else {
            Ok(Outcome::Outranked)
        }
    }

    fn reconcile_placeholders(
        &mut self,
        entity: EntityTypeId,
        key: KeyId,
        source: Provenance,
    ) -> Result<(), SchemaError> {
        let placeholders: BTreeSet<KeyId> = self
            .entity_ref(entity)?
            .keys
            .iter()
            .copied()
            .filter(|k| *k != key && self.keys.get(k).is_some_and(|k| k.placeholder))
            .collect();
        if placeholders.is_empty() {
            return Ok(());
        }
        let retarget: Vec<ForeignKeyId> = self
            .foreign_keys
            .values()
            .filter(|fk| placeholders.contains(&fk.principal_key))
            .filter(|fk| source.overrides(fk.principal_key_source))
            .map(|fk| fk.id)
            .collect();
        for fk in retarget {
            self.retarget_principal_key(fk, key)?;
            tracing::debug!(foreign_key = %fk, "placeholder key reconciled");
        }
        self.sweep_synthesized();
        Ok(())
    }

    /// Remove a key. Foreign keys targeting it are removed along with it
    /// unless one of them pinned the key at a provenance the request cannot
    /// override.
    pub fn remove_key(&mut self, key: KeyId, source: Provenance) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("remove_key")?;
        let target = self.key_ref(key)?;
        let entity = target.entity;
        let members = target.properties.clone();

        let referencing: Vec<ForeignKeyId> = self
            .foreign_keys
            .values()
            .filter(|fk| fk.principal_key == key)
            .map(|fk| fk.id)
            .collect();
        for fk in &referencing {
            let fk = self.fk_ref(*fk)?;
            if !source.overrides(fk.principal_key_source) || !source.overrides(Some(fk.source)) {
                return Err(SchemaError::KeyInUse {
                    key: format_members(&self.property_names(&members)),
                    entity: self.entity_name(entity),
                    dependent: self.entity_name(fk.dependent),
                });
            }
        }

        let node = self.entity_ref(entity)?;
        let is_primary = node.primary_key.get() == Some(&key);
        if !source.overrides(Some(target.source))
            || (is_primary && !source.overrides(node.primary_key.source()))
        {
            tracing::trace!(key = %key, %source, "key removal outranked");
            return Ok(Outcome::Outranked);
        }

        for fk in referencing {
            tracing::debug!(foreign_key = %fk, "foreign key removed with its principal key");
            self.remove_foreign_key_unchecked(fk);
        }
        self.drop_key(key);
        self.sweep_synthesized();
        Ok(Outcome::Applied(()))
    }

    /// Unlink a key; members outside every other key become nullable again
    /// unless a required foreign key still relies on them.
    pub(crate) fn drop_key(&mut self, key: KeyId) {
        let Some(removed) = self.keys.remove(&key) else {
            return;
        };
        if let Some(node) = self.entity_types.get_mut(&removed.entity) {
            node.keys.retain(|k| *k != key);
            if node.primary_key.get() == Some(&key) {
                node.primary_key.clear();
            }
        }
        for property in removed.properties {
            if !self.keys_containing(property).is_empty() {
                continue;
            }
            let pinned = self
                .foreign_keys
                .values()
                .any(|fk| fk.properties.contains(&property) && fk.is_required.get() == Some(&true));
            if pinned {
                continue;
            }
            if let Some(property) = self.properties.get_mut(&property) {
                property.nullable.clear();
            }
        }
    }

    // =========================================================================
    // PLACEHOLDERS
    // =========================================================================

    /// Create a placeholder key (over a synthesized property) on `root`.
    pub(crate) fn create_placeholder_key(&mut self, root: EntityTypeId) -> KeyId {
        let name = self.unique_member_name(root, PLACEHOLDER_KEY_NAME);
        let property = self.create_property(
            root,
            &name,
            ValueType::new(PLACEHOLDER_KEY_TYPE),
            Provenance::Convention,
            true,
        );
        let id = KeyId(self.allocate_id());
        self.keys.insert(
            id,
            Key {
                id,
                entity: root,
                properties: vec![property],
                source: Provenance::Convention,
                placeholder: true,
            },
        );
        if let Some(node) = self.entity_types.get_mut(&root) {
            node.keys.push(id);
        }
        if let Some(property) = self.properties.get_mut(&property) {
            property.nullable.force(false, Provenance::Convention);
        }
        tracing::debug!(entity = %self.entity_name(root), "placeholder key synthesized");
        id
    }

    pub(crate) fn remove_unreferenced_placeholder_keys(&mut self) {
        let unused: Vec<KeyId> = self
            .keys
            .values()
            .filter(|k| k.placeholder)
            .filter(|k| !self.foreign_keys.values().any(|fk| fk.principal_key == k.id))
            .filter(|k| {
                self.entity_types
                    .get(&k.entity)
                    .is_none_or(|e| e.primary_key.get() != Some(&k.id))
            })
            .map(|k| k.id)
            .collect();
        for key in unused {
            tracing::debug!(key = %key, "unused placeholder key removed");
            self.drop_key(key);
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

    fn setup() -> (Model, EntityTypeId, PropertyId, PropertyId) {
        let mut model = Model::new();
        let blog = model
            .add_entity_type(
                "Blog",
                Some(BackingType::new("Blog")),
                TypeRegistration::Ordinary,
                Provenance::Explicit,
            )
            .expect("add")
            .applied()
            .expect("applied");
        let id = model
            .add_property(blog, "Id", ValueType::nullable("i32"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        let code = model
            .add_property(blog, "Code", ValueType::nullable("String"), Provenance::Explicit)
            .expect("add")
            .applied()
            .expect("applied");
        (model, blog, id, code)
    }

    #[test]
    fn key_forces_members_non_nullable() {
        let (mut model, blog, id, _) = setup();
        model
            .set_nullable(id, Some(true), Provenance::Explicit)
            .expect("nullable");
        model.add_key(blog, &[id], Provenance::Convention).expect("key");
        assert_eq!(model.property(id).map(|p| p.is_nullable()), Some(false));
    }

    #[test]
    fn nullable_key_member_rejected_until_key_removed() {
        let (mut model, blog, id, _) = setup();
        let key = model
            .add_key(blog, &[id], Provenance::Explicit)
            .expect("key")
            .applied()
            .expect("applied");
        let err = model
            .set_nullable(id, Some(true), Provenance::Explicit)
            .expect_err("key member");
        assert_eq!(err.kind(), ErrorKind::NullableKey);

        model.remove_key(key, Provenance::Explicit).expect("remove");
        let outcome = model
            .set_nullable(id, Some(true), Provenance::Explicit)
            .expect("nullable");
        assert!(outcome.is_applied());
    }

    #[test]
    fn duplicate_member_in_key_rejected() {
        let (mut model, blog, id, _) = setup();
        let err = model
            .add_key(blog, &[id, id], Provenance::Explicit)
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::DuplicatePropertyInList);
    }

    #[test]
    fn identical_key_is_refreshed() {
        let (mut model, blog, id, code) = setup();
        let first = model
            .add_key(blog, &[id, code], Provenance::Convention)
            .expect("key");
        let second = model
            .add_key(blog, &[id, code], Provenance::Explicit)
            .expect("key");
        assert_eq!(first, second);
        let key = second.applied().expect("applied");
        assert_eq!(model.key(key).map(|k| k.source()), Some(Provenance::Explicit));
        assert_eq!(model.all_keys(blog).len(), 1);
    }

    #[test]
    fn primary_key_outranked() {
        let (mut model, blog, id, code) = setup();
        model
            .set_primary_key(blog, &[id], Provenance::Explicit)
            .expect("pk");
        let outcome = model
            .set_primary_key(blog, &[code], Provenance::Annotation)
            .expect("pk");
        assert!(outcome.is_outranked());
        let pk = model.primary_key(blog).and_then(|k| model.key(k));
        assert_eq!(pk.map(|k| k.properties().to_vec()), Some(vec![id]));
    }

    #[test]
    fn key_on_other_entity_rejected() {
        let (mut model, _, id, _) = setup();
        let post = model
            .add_entity_type(
                "Post",
                Some(BackingType::new("Post")),
                TypeRegistration::Ordinary,
                Provenance::Explicit,
            )
            .expect("add")
            .applied()
            .expect("applied");
        let err = model
            .add_key(post, &[id], Provenance::Explicit)
            .expect_err("wrong entity");
        assert_eq!(err.kind(), ErrorKind::WrongDeclaringEntity);
    }
}
