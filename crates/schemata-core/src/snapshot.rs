//! # Model Snapshot
//!
//! A deterministic, serializable view of a model for downstream consumers.
//!
//! Every record is flattened to plain ids and names and sorted by id, so
//! two models built by the same edits produce byte-identical snapshots
//! regardless of the order in which front-ends ran.
//!
//! Format:
//! ```text
//! [header_len: u32 LE] [SnapshotHeader (postcard)] [ModelSnapshot (postcard)]
//! ```

use crate::model::Model;
use crate::provenance::Provenance;
use crate::types::{DeleteBehavior, SchemaError, TypeRegistration, ValueGenerated};
use serde::{Deserialize, Serialize};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Magic bytes for the snapshot header.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"SSNP";

/// Current snapshot version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Upper bound on element records accepted on import.
pub const MAX_IMPORT_ELEMENT_COUNT: u64 = 1_000_000;

// =============================================================================
// SNAPSHOT HEADER
// =============================================================================

/// Header for snapshot export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub entity_count: u64,
    pub element_count: u64,
    pub checksum: u64,
}

impl SnapshotHeader {
    #[must_use]
    pub fn new(entity_count: u64, element_count: u64, checksum: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            entity_count,
            element_count,
            checksum,
        }
    }

    /// Validate the header.
    ///
    /// Error messages are intentionally generic.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(SchemaError::Serialization(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(SchemaError::Serialization(
                "Unsupported file version".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: u64,
    pub name: String,
    pub backing_type: Option<String>,
    pub registration: TypeRegistration,
    pub source: Provenance,
    pub is_synthesized: bool,
    pub base_type: Option<u64>,
    pub is_keyless: bool,
    pub primary_key: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertySnapshot {
    pub id: u64,
    pub entity: u64,
    pub name: String,
    pub value_type: String,
    pub index: u64,
    pub is_nullable: bool,
    pub is_shadow: bool,
    pub is_concurrency_token: bool,
    pub value_generated: ValueGenerated,
    pub max_length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeySnapshot {
    pub id: u64,
    pub entity: u64,
    pub properties: Vec<u64>,
    pub is_primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKeySnapshot {
    pub id: u64,
    pub dependent: u64,
    pub principal: u64,
    pub properties: Vec<u64>,
    pub principal_key: u64,
    pub is_unique: bool,
    pub is_required: bool,
    pub is_required_dependent: bool,
    pub is_ownership: bool,
    pub delete_behavior: DeleteBehavior,
    pub dependent_to_principal: Option<String>,
    pub principal_to_dependent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkipNavigationSnapshot {
    pub id: u64,
    pub entity: u64,
    pub name: String,
    pub target: u64,
    pub is_collection: bool,
    pub foreign_key: Option<u64>,
    pub inverse: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub id: u64,
    pub entity: u64,
    pub properties: Vec<u64>,
    pub is_unique: bool,
}

// =============================================================================
// MODEL SNAPSHOT
// =============================================================================

/// Deterministic flattened model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub read_only: bool,
    pub entity_types: Vec<EntitySnapshot>,
    pub properties: Vec<PropertySnapshot>,
    pub keys: Vec<KeySnapshot>,
    pub foreign_keys: Vec<ForeignKeySnapshot>,
    pub skip_navigations: Vec<SkipNavigationSnapshot>,
    pub indexes: Vec<IndexSnapshot>,
}

impl From<&Model> for ModelSnapshot {
    fn from(model: &Model) -> Self {
        let mut entity_types: Vec<EntitySnapshot> = model
            .entity_types
            .values()
            .map(|e| EntitySnapshot {
                id: e.id.0,
                name: e.name.clone(),
                backing_type: e.backing.as_ref().map(|b| b.name.clone()),
                registration: e.registration,
                source: e.source,
                is_synthesized: e.synthesized,
                base_type: e.base.get().map(|b| b.0),
                is_keyless: model.is_keyless(e.id),
                primary_key: e.primary_key.get().map(|k| k.0),
            })
            .collect();
        entity_types.sort();

        let mut properties: Vec<PropertySnapshot> = model
            .properties
            .values()
            .map(|p| PropertySnapshot {
                id: p.id.0,
                entity: p.declaring.0,
                name: p.name.clone(),
                value_type: p.value_type.to_string(),
                index: p.index as u64,
                is_nullable: p.is_nullable(),
                is_shadow: p.synthesized,
                is_concurrency_token: p.is_concurrency_token(),
                value_generated: p.value_generated(),
                max_length: p.max_length(),
            })
            .collect();
        properties.sort();

        let mut keys: Vec<KeySnapshot> = model
            .keys
            .values()
            .map(|k| KeySnapshot {
                id: k.id.0,
                entity: k.entity.0,
                properties: k.properties.iter().map(|p| p.0).collect(),
                is_primary: model.primary_key(k.entity) == Some(k.id),
            })
            .collect();
        keys.sort();

        let navigation_name = |id: Option<_>| {
            id.and_then(|id| model.navigations.get(&id))
                .map(|n| n.name.clone())
        };
        let mut foreign_keys: Vec<ForeignKeySnapshot> = model
            .foreign_keys
            .values()
            .map(|fk| ForeignKeySnapshot {
                id: fk.id.0,
                dependent: fk.dependent.0,
                principal: fk.principal.0,
                properties: fk.properties.iter().map(|p| p.0).collect(),
                principal_key: fk.principal_key.0,
                is_unique: fk.is_unique(),
                is_required: model.is_required(fk.id).unwrap_or(false),
                is_required_dependent: fk.is_required_dependent(),
                is_ownership: fk.is_ownership(),
                delete_behavior: model
                    .delete_behavior(fk.id)
                    .unwrap_or(DeleteBehavior::ClientSetNull),
                dependent_to_principal: navigation_name(fk.dependent_to_principal),
                principal_to_dependent: navigation_name(fk.principal_to_dependent),
            })
            .collect();
        foreign_keys.sort();

        let mut skip_navigations: Vec<SkipNavigationSnapshot> = model
            .skip_navigations
            .values()
            .map(|s| SkipNavigationSnapshot {
                id: s.id.0,
                entity: s.declaring.0,
                name: s.name.clone(),
                target: s.target.0,
                is_collection: s.is_collection,
                foreign_key: s.foreign_key().map(|fk| fk.0),
                inverse: s.inverse().map(|i| i.0),
            })
            .collect();
        skip_navigations.sort();

        let mut indexes: Vec<IndexSnapshot> = model
            .indexes
            .values()
            .map(|i| IndexSnapshot {
                id: i.id.0,
                entity: i.entity.0,
                properties: i.properties.iter().map(|p| p.0).collect(),
                is_unique: i.is_unique(),
            })
            .collect();
        indexes.sort();

        Self {
            read_only: model.is_read_only(),
            entity_types,
            properties,
            keys,
            foreign_keys,
            skip_navigations,
            indexes,
        }
    }
}

impl ModelSnapshot {
    /// Number of non-entity records.
    #[must_use]
    pub fn element_count(&self) -> u64 {
        (self.properties.len()
            + self.keys.len()
            + self.foreign_keys.len()
            + self.skip_navigations.len()
            + self.indexes.len()) as u64
    }

    /// Entity type record by name.
    #[must_use]
    pub fn entity_type(&self, name: &str) -> Option<&EntitySnapshot> {
        self.entity_types.iter().find(|e| e.name == name)
    }

    /// Compute a deterministic checksum of the snapshot.
    ///
    /// Rotate-and-XOR folding; no floating point, no randomness. This is
    /// **NOT** a cryptographic hash: it detects accidental corruption only.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hash: u64 = u64::from(self.read_only);

        for e in &self.entity_types {
            hash = fold(hash, e.id, 13);
            hash = fold_str(hash, &e.name);
            hash = fold(hash, e.base_type.map_or(0, |b| b.rotate_left(7)), 5);
            hash = fold(hash, e.primary_key.map_or(0, |k| k.rotate_left(11)), 3);
            hash = fold(hash, u64::from(e.is_keyless), 1);
        }
        for p in &self.properties {
            hash = fold(hash, p.id, 17);
            hash = fold(hash, p.entity, 7);
            hash = fold_str(hash, &p.name);
            hash = fold_str(hash, &p.value_type);
            hash = fold(hash, p.index, 5);
            hash = fold(hash, u64::from(p.is_nullable), 1);
        }
        for k in &self.keys {
            hash = fold(hash, k.id, 19);
            hash = fold_ids(hash, &k.properties);
            hash = fold(hash, u64::from(k.is_primary), 1);
        }
        for fk in &self.foreign_keys {
            hash = fold(hash, fk.id, 23);
            hash = fold(hash, fk.dependent, 7);
            hash = fold(hash, fk.principal, 11);
            hash = fold_ids(hash, &fk.properties);
            hash = fold(hash, fk.principal_key, 13);
            let flags = u64::from(fk.is_unique)
                | u64::from(fk.is_required) << 1
                | u64::from(fk.is_required_dependent) << 2
                | u64::from(fk.is_ownership) << 3;
            hash = fold(hash, flags, 3);
            hash = fold(hash, fk.delete_behavior as u64, 5);
            for name in fk
                .dependent_to_principal
                .iter()
                .chain(&fk.principal_to_dependent)
            {
                hash = fold_str(hash, name);
            }
        }
        for s in &self.skip_navigations {
            hash = fold(hash, s.id, 29);
            hash = fold_str(hash, &s.name);
            hash = fold(hash, s.target, 7);
            hash = fold(hash, s.foreign_key.unwrap_or(0), 11);
            hash = fold(hash, s.inverse.unwrap_or(0), 13);
        }
        for i in &self.indexes {
            hash = fold(hash, i.id, 31);
            hash = fold_ids(hash, &i.properties);
            hash = fold(hash, u64::from(i.is_unique), 1);
        }
        hash
    }
}

fn fold(hash: u64, value: u64, rotation: u32) -> u64 {
    (hash ^ value).rotate_left(rotation)
}

fn fold_str(hash: u64, s: &str) -> u64 {
    s.as_bytes()
        .iter()
        .fold(hash, |h, b| fold(h, u64::from(*b), 9))
}

fn fold_ids(hash: u64, ids: &[u64]) -> u64 {
    ids.iter().fold(hash, |h, id| fold(h, *id, 15))
}

/// Checksum of the snapshot of `model`.
#[must_use]
pub fn snapshot_checksum(model: &Model) -> u64 {
    ModelSnapshot::from(model).checksum()
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Export a model snapshot to postcard bytes.
pub fn export_snapshot(model: &Model) -> Result<Vec<u8>, SchemaError> {
    let snapshot = ModelSnapshot::from(model);
    let header = SnapshotHeader::new(
        snapshot.entity_types.len() as u64,
        snapshot.element_count(),
        snapshot.checksum(),
    );

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| SchemaError::Serialization(format!("Header: {}", e)))?;
    let data_bytes = postcard::to_allocvec(&snapshot)
        .map_err(|e| SchemaError::Serialization(format!("Data: {}", e)))?;

    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| SchemaError::Serialization("Header too large".to_string()))?;
    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&header_len.to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Import a snapshot, verifying header, size limits, counts and checksum.
pub fn import_snapshot(data: &[u8]) -> Result<ModelSnapshot, SchemaError> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(SchemaError::Serialization("Data too short".to_string()));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(SchemaError::Serialization(
            "Data too short for header".to_string(),
        ));
    }
    let (header_bytes, payload) = rest.split_at(header_len);

    let header: SnapshotHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| SchemaError::Serialization(format!("Header: {}", e)))?;
    header.validate()?;

    if header.entity_count > MAX_IMPORT_ELEMENT_COUNT
        || header.element_count > MAX_IMPORT_ELEMENT_COUNT
    {
        return Err(SchemaError::Serialization(format!(
            "Element count exceeds maximum allowed {}",
            MAX_IMPORT_ELEMENT_COUNT
        )));
    }

    let snapshot: ModelSnapshot = postcard::from_bytes(payload)
        .map_err(|e| SchemaError::Serialization(format!("Data: {}", e)))?;

    let computed = snapshot.checksum();
    if computed != header.checksum {
        return Err(SchemaError::Serialization(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }
    if snapshot.entity_types.len() as u64 != header.entity_count
        || snapshot.element_count() != header.element_count
    {
        return Err(SchemaError::Serialization(
            "Element count mismatch".to_string(),
        ));
    }
    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================
