//! # Index Constraints
//!
//! An index is an ordered property list used for lookups. It carries no
//! identity semantics, only an independently provenanced `IsUnique` facet.

use crate::model::Model;
use crate::provenance::{Facet, Outcome, Provenance};
use crate::types::{EntityTypeId, IndexId, PropertyId, SchemaError, format_members};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// INDEX
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    pub(crate) id: IndexId,
    pub(crate) entity: EntityTypeId,
    pub(crate) properties: Vec<PropertyId>,
    pub(crate) source: Provenance,
    pub(crate) is_unique: Facet<bool>,
}

impl Index {
    pub fn id(&self) -> IndexId {
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

    pub fn is_unique(&self) -> bool {
        self.is_unique.get_or(false)
    }

    pub fn is_unique_source(&self) -> Option<Provenance> {
        self.is_unique.source()
    }
}

impl Model {
    /// Index visible on `entity` with exactly these members.
    pub fn find_index(&self, entity: EntityTypeId, properties: &[PropertyId]) -> Option<IndexId> {
        self.all_indexes(entity)
            .into_iter()
            .find(|i| self.indexes.get(i).is_some_and(|i| i.properties == properties))
    }

    /// Add an index over properties reachable from `entity`.
    ///
    /// An identical index on the same node is refreshed; an identical list
    /// anywhere else in the lineage is rejected.
    pub fn add_index(
        &mut self,
        entity: EntityTypeId,
        properties: &[PropertyId],
        source: Provenance,
    ) -> Result<Outcome<IndexId>, SchemaError> {
        self.ensure_mutable("add_index")?;
        let node = self.entity_ref(entity)?;
        let names = self.property_names(properties);
        if properties.is_empty() {
            return Err(SchemaError::EmptyMemberList {
                what: "index",
                entity: node.name.clone(),
            });
        }

        let reachable: BTreeSet<PropertyId> = self.all_properties(entity).into_iter().collect();
        if properties.iter().any(|p| !reachable.contains(p)) {
            return Err(SchemaError::WrongDeclaringEntity {
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

        let declared = node
            .indexes
            .iter()
            .copied()
            .find(|i| self.indexes.get(i).is_some_and(|i| i.properties == properties));
        if let Some(existing) = declared {
            if let Some(index) = self.indexes.get_mut(&existing) {
                index.source = source.max_with(Some(index.source));
            }
            return Ok(Outcome::Applied(existing));
        }
        for other in self.lineage(entity) {
            let Some(e) = self.entity_types.get(&other) else {
                continue;
            };
            if e.indexes
                .iter()
                .filter_map(|i| self.indexes.get(i))
                .any(|i| i.properties == properties)
            {
                return Err(SchemaError::DuplicateIndex {
                    properties: format_members(&names),
                    entity: self.entity_name(entity),
                    other: e.name.clone(),
                });
            }
        }

        let id = IndexId(self.allocate_id());
        self.indexes.insert(
            id,
            Index {
                id,
                entity,
                properties: properties.to_vec(),
                source,
                is_unique: Facet::unset(),
            },
        );
        self.entity_mut(entity)?.indexes.push(id);
        tracing::debug!(
            entity = %self.entity_name(entity),
            properties = %format_members(&names),
            "index added"
        );
        Ok(Outcome::Applied(id))
    }

    pub fn remove_index(
        &mut self,
        index: IndexId,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("remove_index")?;
        let target = self.index_ref(index)?;
        if !source.overrides(Some(target.source)) {
            tracing::trace!(index = %index, %source, "index removal outranked");
            return Ok(Outcome::Outranked);
        }
        let entity = target.entity;
        self.indexes.remove(&index);
        self.entity_mut(entity)?.indexes.retain(|i| *i != index);
        self.sweep_synthesized();
        Ok(Outcome::Applied(()))
    }

    pub fn set_index_unique(
        &mut self,
        index: IndexId,
        unique: Option<bool>,
        source: Provenance,
    ) -> Result<Outcome<()>, SchemaError> {
        self.ensure_mutable("set_index_unique")?;
        let target = self
            .indexes
            .get_mut(&index)
            .ok_or_else(|| SchemaError::UnknownMember {
                what: "index",
                name: index.to_string(),
            })?;
        if target.is_unique.apply(unique, source).accepted() {
            Ok(Outcome::Applied(()))
        } else {
            Ok(Outcome::Outranked)
        }
    }
}
