//! # Model Files
//!
//! Save and reload a whole [`Model`], every facet provenance included, so a
//! build can be resumed or a finalized model shipped as-is.
//!
//! Layout: `SCHM` + format version (one byte), then the postcard payload.
//! Size and header are checked before any payload byte is decoded.

use crate::model::Model;
use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES};
use crate::types::SchemaError;

// =============================================================================
// LIMITS
// =============================================================================

/// Largest model file accepted by [`model_from_bytes`] (64 MB).
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// Bytes taken by [`PersistenceHeader`].
const HEADER_LEN: usize = 5;

fn malformed(reason: impl Into<String>) -> SchemaError {
    SchemaError::Serialization(reason.into())
}

// =============================================================================
// HEADER
// =============================================================================

/// Leading bytes of a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Header for files written by this build.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.magic != *MAGIC_BYTES {
            return Err(malformed("not a Schemata model file"));
        }
        if self.version != FORMAT_VERSION {
            return Err(malformed(format!(
                "model file version {} cannot be read by format version {}",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let [m0, m1, m2, m3] = self.magic;
        [m0, m1, m2, m3, self.version]
    }

    /// Parse the header; trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        let Some(([m0, m1, m2, m3, version], _)) = bytes.split_first_chunk::<HEADER_LEN>() else {
            return Err(malformed(format!(
                "model file truncated: {} of {} header bytes",
                bytes.len(),
                HEADER_LEN
            )));
        };
        Ok(Self {
            magic: [*m0, *m1, *m2, *m3],
            version: *version,
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SAVE / LOAD
// =============================================================================

/// Encode `model` as a model file.
pub fn model_to_bytes(model: &Model) -> Result<Vec<u8>, SchemaError> {
    let mut out = PersistenceHeader::new().to_bytes().to_vec();
    postcard::to_extend(model, out).map_err(|e| malformed(format!("model encoding failed: {}", e)))
}

/// Decode a model file.
///
/// The model comes back exactly as saved, including its read-only state.
pub fn model_from_bytes(bytes: &[u8]) -> Result<Model, SchemaError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(malformed(format!(
            "model file is {} bytes, limit is {}",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }
    PersistenceHeader::from_bytes(bytes)?.validate()?;

    let payload = bytes.get(HEADER_LEN..).unwrap_or_default();
    let model: Model = postcard::from_bytes(payload)
        .map_err(|e| malformed(format!("model payload unreadable: {}", e)))?;
    tracing::debug!(
        entity_types = model.entity_type_count(),
        read_only = model.is_read_only(),
        "model file loaded"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provenance::Provenance;
    use crate::snapshot::snapshot_checksum;
    use crate::types::{BackingType, ErrorKind, TypeRegistration, ValueType};

    fn blog() -> Model {
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
            .add_property(blog, "Id", ValueType::new("i32"), Provenance::Convention)
            .expect("prop")
            .applied()
            .expect("applied");
        model
            .set_primary_key(blog, &[id], Provenance::Annotation)
            .expect("pk");
        model
    }

    #[test]
    fn header_layout() {
        assert_eq!(PersistenceHeader::new().to_bytes(), *b"SCHM\x01");
        let parsed = PersistenceHeader::from_bytes(b"SCHM\x01trailing").expect("parse");
        assert_eq!(parsed, PersistenceHeader::default());
    }

    #[test]
    fn reload_keeps_provenance() {
        let model = blog();
        let bytes = model_to_bytes(&model).expect("save");
        let restored = model_from_bytes(&bytes).expect("load");

        assert_eq!(model_to_bytes(&restored).expect("save again"), bytes);
        assert_eq!(snapshot_checksum(&model), snapshot_checksum(&restored));

        let blog = restored.find_entity_type("Blog").expect("blog");
        let entity = restored.entity_type(blog).expect("entity");
        assert_eq!(entity.primary_key_source(), Some(Provenance::Annotation));
    }

    #[test]
    fn finalized_model_stays_read_only() {
        let mut model = blog();
        model.finalize().expect("finalize");
        let mut restored = model_from_bytes(&model_to_bytes(&model).expect("save")).expect("load");
        assert!(restored.is_read_only());
        let err = restored.ignore("Blog", Provenance::Explicit).expect_err("read only");
        assert_eq!(err.kind(), ErrorKind::ReadOnly);
    }

    #[test]
    fn foreign_or_damaged_files_rejected() {
        let err = model_from_bytes(b"SSNP\x01\x00\x00").expect_err("snapshot magic");
        assert_eq!(err.kind(), ErrorKind::Serialization);

        assert!(model_from_bytes(b"SCH").is_err());
        assert!(model_from_bytes(b"SCHM\x02").is_err());

        let mut bytes = model_to_bytes(&blog()).expect("save");
        bytes.truncate(bytes.len() / 2);
        assert!(model_from_bytes(&bytes).is_err());
    }
}
