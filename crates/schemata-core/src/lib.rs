//! # schemata-core
//!
//! The provenance-governed schema graph kernel for Schemata.
//!
//! Front-ends (conventions, declarative annotations, explicit API calls)
//! describe a data model incrementally: entity types, properties, keys,
//! foreign keys, navigations, skip navigations and indexes. Every edit is
//! a `(target, value, provenance)` triple funnelled through the mutators
//! on [`Model`]; higher provenance overrides lower, and the graph stays
//! consistent after every accepted edit.
//!
//! ## Architectural Constraints
//!
//! - Single writer, synchronous, no I/O
//! - Deterministic: `BTreeMap`/`BTreeSet` only, integer arena ids
//! - Outranked edits return [`Outcome::Outranked`]; structural violations
//!   return [`SchemaError`] and leave the model untouched
//! - After [`Model::finalize`] every mutator fails with `ReadOnly`

// =============================================================================
// MODULES
// =============================================================================

pub mod builder;
pub mod entity;
pub mod foreign_key;
pub mod formats;
pub mod index;
pub mod key;
pub mod model;
pub mod navigation;
pub mod primitives;
pub mod property;
pub mod provenance;
pub mod snapshot;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BackingType, DeleteBehavior, EntityTypeId, ErrorKind, ForeignKeyId, IndexId, KeyId,
    NavigationId, NavigationMember, PropertyAccessMode, PropertyId, SaveBehavior, SchemaError,
    SkipNavigationId, TypeRegistration, ValueGenerated, ValueType,
};

// =============================================================================
// RE-EXPORTS: Schema Graph
// =============================================================================

pub use builder::{EntityTypeBuilder, ForeignKeyBuilder};
pub use entity::EntityType;
pub use foreign_key::ForeignKey;
pub use index::Index;
pub use key::Key;
pub use model::Model;
pub use navigation::{Navigation, SkipNavigation};
pub use property::Property;
pub use provenance::{Facet, Outcome, Provenance, SetResult};
pub use snapshot::{ModelSnapshot, export_snapshot, import_snapshot, snapshot_checksum};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, model_from_bytes, model_to_bytes};
