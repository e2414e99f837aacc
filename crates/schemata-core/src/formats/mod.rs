//! # Formats
//!
//! Binary persistence of a whole `Model` (building state included), as
//! opposed to `snapshot`, which exports a flattened read-only view.
//!
//! This module is a pure transformation; file I/O lives in the app layer.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, model_from_bytes, model_to_bytes,
};
