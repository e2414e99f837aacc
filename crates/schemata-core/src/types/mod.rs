//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the kernel:
//! - Arena identifiers (`EntityTypeId`, `PropertyId`, `KeyId`, ...)
//! - Type descriptors (`ValueType`, `BackingType`, `NavigationMember`)
//! - Facet value enums (`ValueGenerated`, `DeleteBehavior`, ...)
//! - Error types (`SchemaError`, `ErrorKind`)
//!
//! ## Determinism Guarantees
//!
//! All identifiers implement `Ord` so every collection in the arena is a
//! `BTreeMap`/`BTreeSet` and iteration order never depends on hashing.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ARENA IDENTIFIERS
// =============================================================================

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Stable handle of an entity type node.
    EntityTypeId,
    "entity"
);
arena_id!(
    /// Stable handle of a property descriptor.
    PropertyId,
    "property"
);
arena_id!(
    /// Stable handle of a key constraint.
    KeyId,
    "key"
);
arena_id!(
    /// Stable handle of a reference constraint (foreign key).
    ForeignKeyId,
    "foreign_key"
);
arena_id!(
    /// Stable handle of a navigation edge.
    NavigationId,
    "navigation"
);
arena_id!(
    /// Stable handle of a skip-navigation edge.
    SkipNavigationId,
    "skip_navigation"
);
arena_id!(
    /// Stable handle of an index constraint.
    IndexId,
    "index"
);

// =============================================================================
// TYPE DESCRIPTORS
// =============================================================================

/// Static type of a property value.
///
/// `nullable` describes whether the static type can hold null at all; a
/// property whose static type is not nullable can never be made nullable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueType {
    /// Underlying scalar type name, e.g. `"i32"` or `"String"`.
    pub name: String,
    /// Whether the static type admits null.
    pub nullable: bool,
}

impl ValueType {
    /// A non-nullable value type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
        }
    }

    /// A nullable value type (`Option<name>`).
    #[must_use]
    pub fn nullable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: true,
        }
    }

    /// The same underlying type, nullable.
    #[must_use]
    pub fn to_nullable(&self) -> Self {
        Self::nullable(self.name.clone())
    }

    /// The same underlying type, non-nullable.
    #[must_use]
    pub fn to_non_nullable(&self) -> Self {
        Self::new(self.name.clone())
    }

    /// Whether two types agree once nullability is unwrapped.
    #[must_use]
    pub fn same_underlying(&self, other: &ValueType) -> bool {
        self.name == other.name
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "Option<{}>", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// The host type an entity type node is bound to.
///
/// `ancestors` lists the host type's supertypes, nearest first, and drives
/// the assignability check when building inheritance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BackingType {
    /// Type name.
    pub name: String,
    /// Supertype names, nearest first.
    pub ancestors: Vec<String>,
}

impl BackingType {
    /// A backing type with no supertypes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ancestors: Vec::new(),
        }
    }

    /// Builder-style: append a supertype.
    #[must_use]
    pub fn extends(mut self, ancestor: impl Into<String>) -> Self {
        self.ancestors.push(ancestor.into());
        self
    }

    /// Whether a value of `derived` can be stored in a slot of `self`.
    #[must_use]
    pub fn is_assignable_from(&self, derived: &BackingType) -> bool {
        self.name == derived.name || derived.ancestors.iter().any(|a| *a == self.name)
    }
}

/// The host member that backs a navigation, if any.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NavigationMember {
    /// Member name.
    pub name: String,
    /// `true` for collection-valued members.
    pub is_collection: bool,
}

impl NavigationMember {
    /// A single-valued (reference) member.
    #[must_use]
    pub fn reference(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_collection: false,
        }
    }

    /// A collection-valued member.
    #[must_use]
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_collection: true,
        }
    }
}

/// Registration class of a backing type in the model registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRegistration {
    /// One node per backing type, named after it.
    Ordinary,
    /// Several nodes may share the backing type under distinct names.
    Shared,
    /// The backing type is only used by owned (dependent-on-owner) nodes.
    Owned,
}

// =============================================================================
// FACET VALUES
// =============================================================================

/// When the store generates a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueGenerated {
    Never,
    OnAdd,
    OnUpdate,
    OnAddOrUpdate,
}

/// How a property participates in a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveBehavior {
    Save,
    Ignore,
    Throw,
}

/// What happens to dependents when their principal is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    ClientSetNull,
    Restrict,
    SetNull,
    Cascade,
    ClientCascade,
    NoAction,
    ClientNoAction,
}

/// Preferred access path for a navigation's backing member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyAccessMode {
    Field,
    FieldDuringConstruction,
    Property,
    PreferField,
    PreferFieldDuringConstruction,
    PreferProperty,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Stable taxonomy key of a structural violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ReadOnly,
    InvalidName,
    UnknownMember,
    DuplicateEntityType,
    AmbiguousSharedTypeName,
    ClashingTypeRegistration,
    CircularInheritance,
    BackingTypeMismatch,
    NotAssignable,
    KindMismatch,
    DerivedTypeKey,
    DuplicateMember,
    DuplicateKey,
    DuplicateIndex,
    DuplicateForeignKey,
    DuplicatePropertyInList,
    EmptyMemberList,
    WrongDeclaringEntity,
    KeylessTypeKey,
    NullableKey,
    NotNullableType,
    KeyInUse,
    PropertyInUse,
    InheritedMemberInUse,
    EntityTypeInUse,
    ForeignKeyCountMismatch,
    ForeignKeyTypeMismatch,
    NonUniqueRequiredDependent,
    AmbiguousEnd,
    OwnershipWithoutNavigation,
    NavigationRequiredByOwnership,
    NavigationShapeMismatch,
    KeylessPrincipal,
    CannotInvertOwnership,
    SkipNavigationMismatch,
    IncompleteModel,
    Serialization,
}

impl ErrorKind {
    /// Snake-case key suitable for diagnostics and tests.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ReadOnly => "read_only",
            ErrorKind::InvalidName => "invalid_name",
            ErrorKind::UnknownMember => "unknown_member",
            ErrorKind::DuplicateEntityType => "duplicate_entity_type",
            ErrorKind::AmbiguousSharedTypeName => "ambiguous_shared_type_name",
            ErrorKind::ClashingTypeRegistration => "clashing_type_registration",
            ErrorKind::CircularInheritance => "circular_inheritance",
            ErrorKind::BackingTypeMismatch => "backing_type_mismatch",
            ErrorKind::NotAssignable => "not_assignable",
            ErrorKind::KindMismatch => "kind_mismatch",
            ErrorKind::DerivedTypeKey => "derived_type_key",
            ErrorKind::DuplicateMember => "duplicate_member",
            ErrorKind::DuplicateKey => "duplicate_key",
            ErrorKind::DuplicateIndex => "duplicate_index",
            ErrorKind::DuplicateForeignKey => "duplicate_foreign_key",
            ErrorKind::DuplicatePropertyInList => "duplicate_property_in_list",
            ErrorKind::EmptyMemberList => "empty_member_list",
            ErrorKind::WrongDeclaringEntity => "wrong_declaring_entity",
            ErrorKind::KeylessTypeKey => "keyless_type_key",
            ErrorKind::NullableKey => "nullable_key",
            ErrorKind::NotNullableType => "not_nullable_type",
            ErrorKind::KeyInUse => "key_in_use",
            ErrorKind::PropertyInUse => "property_in_use",
            ErrorKind::InheritedMemberInUse => "inherited_member_in_use",
            ErrorKind::EntityTypeInUse => "entity_type_in_use",
            ErrorKind::ForeignKeyCountMismatch => "foreign_key_count_mismatch",
            ErrorKind::ForeignKeyTypeMismatch => "foreign_key_type_mismatch",
            ErrorKind::NonUniqueRequiredDependent => "non_unique_required_dependent",
            ErrorKind::AmbiguousEnd => "ambiguous_end",
            ErrorKind::OwnershipWithoutNavigation => "ownership_without_navigation",
            ErrorKind::NavigationRequiredByOwnership => "navigation_required_by_ownership",
            ErrorKind::NavigationShapeMismatch => "navigation_shape_mismatch",
            ErrorKind::KeylessPrincipal => "keyless_principal",
            ErrorKind::CannotInvertOwnership => "cannot_invert_ownership",
            ErrorKind::SkipNavigationMismatch => "skip_navigation_mismatch",
            ErrorKind::IncompleteModel => "incomplete_model",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural violations raised by the kernel.
///
/// - Never raised for outranked edits (those return `Outcome::Outranked`)
/// - Raised before any state is committed
/// - Carry the implicated names for user-facing diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The model has been finalized.
    #[error("The model is read-only; '{operation}' cannot be applied after finalization")]
    ReadOnly { operation: &'static str },

    /// A name is empty or too long.
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A referenced element does not exist (or no longer exists).
    #[error("Unknown {what} '{name}'")]
    UnknownMember { what: &'static str, name: String },

    /// Two nodes with the same name.
    #[error("Entity type '{entity}' already exists with a different backing type")]
    DuplicateEntityType { entity: String },

    /// A shared-type node named exactly like its backing type.
    #[error("Shared-type entity type '{entity}' cannot use its backing type's name")]
    AmbiguousSharedTypeName { entity: String },

    /// A backing type registered as two of {ordinary, shared, owned}.
    #[error("Backing type '{backing}' is registered as {existing:?} and cannot be used as {requested:?} by '{entity}'")]
    ClashingTypeRegistration {
        backing: String,
        entity: String,
        existing: TypeRegistration,
        requested: TypeRegistration,
    },

    /// The base would be the node itself or one of its descendants.
    #[error("Cannot make '{base}' the base of '{entity}': it would create an inheritance cycle")]
    CircularInheritance { entity: String, base: String },

    /// Mixing name-only and type-backed nodes in one lineage.
    #[error("'{entity}' and its base '{base}' must both be type-backed or both be name-only")]
    BackingTypeMismatch { entity: String, base: String },

    /// The derived backing type does not extend the base backing type.
    #[error("Backing type '{entity_type}' of '{entity}' is not assignable to '{base_type}' of base '{base}'")]
    NotAssignable {
        entity: String,
        base: String,
        entity_type: String,
        base_type: String,
    },

    /// Mixing keyed entities and keyless (query/view) nodes in one lineage.
    #[error("'{entity}' and its base '{base}' must both be keyed or both be keyless")]
    KindMismatch { entity: String, base: String },

    /// Keys may only be declared on lineage roots.
    #[error("Key cannot be configured on '{entity}' because it is a derived type; configure it on '{root}'")]
    DerivedTypeKey { entity: String, root: String },

    /// A member name is used twice across a lineage.
    #[error("{what} '{member}' on '{entity}' collides with a member of the same name on '{other}'")]
    DuplicateMember {
        what: &'static str,
        member: String,
        entity: String,
        other: String,
    },

    /// An identical key already exists.
    #[error("Key {properties} already exists on '{entity}'")]
    DuplicateKey { properties: String, entity: String },

    /// An identical index already exists in the lineage.
    #[error("Index {properties} on '{entity}' duplicates an index declared on '{other}'")]
    DuplicateIndex {
        properties: String,
        entity: String,
        other: String,
    },

    /// An identical foreign key already exists in the lineage.
    #[error("Foreign key {properties} on '{entity}' duplicates a foreign key declared on '{other}'")]
    DuplicateForeignKey {
        properties: String,
        entity: String,
        other: String,
    },

    /// The same property appears twice in one member list.
    #[error("Property '{property}' appears more than once in {properties}")]
    DuplicatePropertyInList { properties: String, property: String },

    /// Keys, indexes and foreign keys need at least one member.
    #[error("A {what} on '{entity}' needs at least one property")]
    EmptyMemberList { what: &'static str, entity: String },

    /// A member list references properties of another node.
    #[error("Properties {properties} are not all part of '{entity}'")]
    WrongDeclaringEntity { properties: String, entity: String },

    /// Keyless nodes cannot own keys.
    #[error("Key {properties} cannot be added to keyless entity type '{entity}'")]
    KeylessTypeKey { properties: String, entity: String },

    /// A key member cannot be nullable.
    #[error("Property '{property}' on '{entity}' is part of a key and cannot be nullable")]
    NullableKey { entity: String, property: String },

    /// The static type cannot hold null.
    #[error("Property '{property}' on '{entity}' has non-nullable type '{value_type}'")]
    NotNullableType {
        entity: String,
        property: String,
        value_type: String,
    },

    /// A key still targeted by a foreign key that cannot be removed.
    #[error("Key {key} on '{entity}' is referenced by a foreign key on '{dependent}'")]
    KeyInUse {
        key: String,
        entity: String,
        dependent: String,
    },

    /// A property still used by a key, index or foreign key.
    #[error("Property '{property}' on '{entity}' is used by {used_by}")]
    PropertyInUse {
        entity: String,
        property: String,
        used_by: String,
    },

    /// Re-parenting would orphan an inherited member still in use.
    #[error("'{entity}' cannot leave '{ancestor}': '{member}' inherited from it is still in use")]
    InheritedMemberInUse {
        entity: String,
        ancestor: String,
        member: String,
    },

    /// Removing a node still referenced elsewhere.
    #[error("Entity type '{entity}' cannot be removed: it is used by {used_by}")]
    EntityTypeInUse { entity: String, used_by: String },

    /// Dependent property count differs from the principal key.
    #[error("Foreign key {properties} on '{entity}' has {dependent_count} properties but principal key {principal_key} has {principal_count}")]
    ForeignKeyCountMismatch {
        properties: String,
        entity: String,
        principal_key: String,
        dependent_count: usize,
        principal_count: usize,
    },

    /// Dependent property types differ from the principal key.
    #[error("Foreign key property '{property}' ({dependent_type}) on '{entity}' does not match principal key property '{principal_property}' ({principal_type})")]
    ForeignKeyTypeMismatch {
        entity: String,
        property: String,
        dependent_type: String,
        principal_property: String,
        principal_type: String,
    },

    /// A required dependent needs a unique relationship.
    #[error("Foreign key {properties} on '{entity}' must be unique to have a required dependent")]
    NonUniqueRequiredDependent { properties: String, entity: String },

    /// Self-referencing relationship whose ends have not been chosen.
    #[error("Foreign key {properties} on '{entity}' is self-referencing; configure its principal end first")]
    AmbiguousEnd { properties: String, entity: String },

    /// Ownership requires a principal-to-dependent navigation.
    #[error("Foreign key {properties} on '{entity}' needs a principal-to-dependent navigation to be an ownership")]
    OwnershipWithoutNavigation { properties: String, entity: String },

    /// The navigation anchors an ownership.
    #[error("Navigation '{navigation}' on '{entity}' defines an ownership and cannot be removed")]
    NavigationRequiredByOwnership { navigation: String, entity: String },

    /// Member shape incompatible with the navigation role.
    #[error("Navigation '{navigation}' on '{entity}': {reason}")]
    NavigationShapeMismatch {
        navigation: String,
        entity: String,
        reason: &'static str,
    },

    /// A keyless node cannot be a principal or host principal navigations.
    #[error("Entity type '{entity}' is keyless and cannot be the principal of a relationship")]
    KeylessPrincipal { entity: String },

    /// Ownership relationships keep their direction.
    #[error("Foreign key {properties} on '{entity}' is an ownership and cannot be inverted")]
    CannotInvertOwnership { properties: String, entity: String },

    /// Skip-navigation wiring inconsistent with its inverse or join node.
    #[error("Skip navigation '{navigation}' on '{entity}': {reason}")]
    SkipNavigationMismatch {
        navigation: String,
        entity: String,
        reason: &'static str,
    },

    /// Finalize found an unfinished part of the model.
    #[error("Model is incomplete: {reason} ('{element}')")]
    IncompleteModel { element: String, reason: &'static str },

    /// Snapshot encoding or decoding failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SchemaError {
    /// Stable taxonomy key of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::ReadOnly { .. } => ErrorKind::ReadOnly,
            SchemaError::InvalidName { .. } => ErrorKind::InvalidName,
            SchemaError::UnknownMember { .. } => ErrorKind::UnknownMember,
            SchemaError::DuplicateEntityType { .. } => ErrorKind::DuplicateEntityType,
            SchemaError::AmbiguousSharedTypeName { .. } => ErrorKind::AmbiguousSharedTypeName,
            SchemaError::ClashingTypeRegistration { .. } => ErrorKind::ClashingTypeRegistration,
            SchemaError::CircularInheritance { .. } => ErrorKind::CircularInheritance,
            SchemaError::BackingTypeMismatch { .. } => ErrorKind::BackingTypeMismatch,
            SchemaError::NotAssignable { .. } => ErrorKind::NotAssignable,
            SchemaError::KindMismatch { .. } => ErrorKind::KindMismatch,
            SchemaError::DerivedTypeKey { .. } => ErrorKind::DerivedTypeKey,
            SchemaError::DuplicateMember { .. } => ErrorKind::DuplicateMember,
            SchemaError::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            SchemaError::DuplicateIndex { .. } => ErrorKind::DuplicateIndex,
            SchemaError::DuplicateForeignKey { .. } => ErrorKind::DuplicateForeignKey,
            SchemaError::DuplicatePropertyInList { .. } => ErrorKind::DuplicatePropertyInList,
            SchemaError::EmptyMemberList { .. } => ErrorKind::EmptyMemberList,
            SchemaError::WrongDeclaringEntity { .. } => ErrorKind::WrongDeclaringEntity,
            SchemaError::KeylessTypeKey { .. } => ErrorKind::KeylessTypeKey,
            SchemaError::NullableKey { .. } => ErrorKind::NullableKey,
            SchemaError::NotNullableType { .. } => ErrorKind::NotNullableType,
            SchemaError::KeyInUse { .. } => ErrorKind::KeyInUse,
            SchemaError::PropertyInUse { .. } => ErrorKind::PropertyInUse,
            SchemaError::InheritedMemberInUse { .. } => ErrorKind::InheritedMemberInUse,
            SchemaError::EntityTypeInUse { .. } => ErrorKind::EntityTypeInUse,
            SchemaError::ForeignKeyCountMismatch { .. } => ErrorKind::ForeignKeyCountMismatch,
            SchemaError::ForeignKeyTypeMismatch { .. } => ErrorKind::ForeignKeyTypeMismatch,
            SchemaError::NonUniqueRequiredDependent { .. } => ErrorKind::NonUniqueRequiredDependent,
            SchemaError::AmbiguousEnd { .. } => ErrorKind::AmbiguousEnd,
            SchemaError::OwnershipWithoutNavigation { .. } => ErrorKind::OwnershipWithoutNavigation,
            SchemaError::NavigationRequiredByOwnership { .. } => {
                ErrorKind::NavigationRequiredByOwnership
            }
            SchemaError::NavigationShapeMismatch { .. } => ErrorKind::NavigationShapeMismatch,
            SchemaError::KeylessPrincipal { .. } => ErrorKind::KeylessPrincipal,
            SchemaError::CannotInvertOwnership { .. } => ErrorKind::CannotInvertOwnership,
            SchemaError::SkipNavigationMismatch { .. } => ErrorKind::SkipNavigationMismatch,
            SchemaError::IncompleteModel { .. } => ErrorKind::IncompleteModel,
            SchemaError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Render a member list as `{A, B}` for diagnostics.
#[must_use]
pub fn format_members<S: AsRef<str>>(names: &[S]) -> String {
    let joined: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    format!("{{{}}}", joined.join(", "))
}

// =============================================================================
// TESTS
// =============================================================================
