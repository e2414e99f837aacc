//! # Kernel Primitives
//!
//! Hardcoded constants for the Schemata kernel.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Magic bytes for the Schemata binary snapshot header.
///
/// - File Header = Magic Bytes ("SCHM") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"SCHM";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum length for entity type, property and navigation names.
///
/// Longer names are rejected before any mutation happens.
pub const MAX_NAME_LENGTH: usize = 256;

/// Name used for the placeholder key property synthesized on a principal
/// that had no key when a relationship to it was created.
pub const PLACEHOLDER_KEY_NAME: &str = "TempId";

/// Value type given to the placeholder key property.
pub const PLACEHOLDER_KEY_TYPE: &str = "i32";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"SCHM");
    }

    #[test]
    fn limits_are_positive() {
        assert!(MAX_NAME_LENGTH > 0);
        assert!(!PLACEHOLDER_KEY_NAME.is_empty());
    }
}
