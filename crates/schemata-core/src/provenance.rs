//! # Provenance
//!
//! Every mutable facet of the schema graph records *who* configured it.
//!
//! The order is total: `Convention < Annotation < Explicit`, with "unset"
//! below all of them. A request may replace a recorded value only when its
//! provenance is at least the recorded one. Re-applying the value that is
//! already recorded always succeeds and raises the recorded provenance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// PROVENANCE
// =============================================================================

/// The authority level that produced a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Inferred automatically by model-building conventions.
    Convention,
    /// Read from declarative attributes on the backing type.
    Annotation,
    /// Requested directly through the API.
    Explicit,
}

impl Provenance {
    /// All provenances, lowest first.
    pub const ALL: [Provenance; 3] = [
        Provenance::Convention,
        Provenance::Annotation,
        Provenance::Explicit,
    ];

    /// `true` iff a request at `self` may replace a value recorded at `existing`.
    #[must_use]
    pub fn overrides(self, existing: Option<Provenance>) -> bool {
        existing.is_none_or(|existing| self >= existing)
    }

    /// `true` iff `self` is strictly above `existing` (unset counts as lowest).
    #[must_use]
    pub fn outranks(self, existing: Option<Provenance>) -> bool {
        existing.is_none_or(|existing| self > existing)
    }

    /// The higher of `self` and `other`.
    #[must_use]
    pub fn max_with(self, other: Option<Provenance>) -> Provenance {
        match other {
            Some(other) if other > self => other,
            _ => self,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Convention => "convention",
            Provenance::Annotation => "annotation",
            Provenance::Explicit => "explicit",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provenance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "convention" => Ok(Provenance::Convention),
            "annotation" | "data_annotation" => Ok(Provenance::Annotation),
            "explicit" => Ok(Provenance::Explicit),
            other => Err(format!("unknown provenance '{}'", other)),
        }
    }
}

/// `Max` over optional provenances.
#[must_use]
pub fn max_source(a: Option<Provenance>, b: Option<Provenance>) -> Option<Provenance> {
    match (a, b) {
        (Some(a), b) => Some(a.max_with(b)),
        (None, b) => b,
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of an edit that passed structural validation.
///
/// `Outranked` is not an error: conventions routinely attempt edits that
/// lose to higher-authority configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The edit was accepted (possibly as an idempotent refresh).
    Applied(T),
    /// The edit was rejected because existing configuration outranks it.
    Outranked,
}

impl<T> Outcome<T> {
    /// Whether the edit was accepted.
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    /// Whether the edit lost to existing configuration.
    pub fn is_outranked(&self) -> bool {
        matches!(self, Outcome::Outranked)
    }

    /// The accepted value, if any.
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Outranked => None,
        }
    }

    /// Map the accepted value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(value) => Outcome::Applied(f(value)),
            Outcome::Outranked => Outcome::Outranked,
        }
    }
}

// =============================================================================
// FACET
// =============================================================================

/// What `Facet::try_set` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetResult {
    /// The value was already recorded; provenance was raised to `Max`.
    Unchanged,
    /// The value changed; provenance is now the requested one.
    Changed,
    /// The recorded provenance outranks the request.
    Rejected,
}

impl SetResult {
    /// `Unchanged` or `Changed`.
    pub fn accepted(self) -> bool {
        !matches!(self, SetResult::Rejected)
    }
}

/// A single overridable attribute: an optional value plus the provenance
/// that configured it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet<T> {
    value: Option<T>,
    source: Option<Provenance>,
}

impl<T> Default for Facet<T> {
    fn default() -> Self {
        Self {
            value: None,
            source: None,
        }
    }
}

impl<T: Clone + PartialEq> Facet<T> {
    /// An unset facet.
    #[must_use]
    pub fn unset() -> Self {
        Self::default()
    }

    /// A facet already holding `value` at `source`.
    #[must_use]
    pub fn with(value: T, source: Provenance) -> Self {
        Self {
            value: Some(value),
            source: Some(source),
        }
    }

    /// The configured value, if any.
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The configured value or `default`.
    pub fn get_or(&self, default: T) -> T {
        self.value.clone().unwrap_or(default)
    }

    /// The provenance of the configured value.
    pub fn source(&self) -> Option<Provenance> {
        self.source
    }

    /// Whether a value is recorded.
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Whether `try_set(value, source)` would be accepted.
    pub fn can_set(&self, value: &T, source: Provenance) -> bool {
        self.value.as_ref() == Some(value) || source.overrides(self.source)
    }

    /// The provenance protocol: accept unset, refresh equal, otherwise
    /// require `overrides`.
    pub fn try_set(&mut self, value: T, source: Provenance) -> SetResult {
        if self.value.as_ref() == Some(&value) {
            self.source = Some(source.max_with(self.source));
            return SetResult::Unchanged;
        }
        if !source.overrides(self.source) {
            return SetResult::Rejected;
        }
        self.value = Some(value);
        self.source = Some(source);
        SetResult::Changed
    }

    /// Return to unset if the request overrides the recorded provenance.
    pub fn try_reset(&mut self, source: Provenance) -> SetResult {
        if self.value.is_none() {
            return SetResult::Unchanged;
        }
        if !source.overrides(self.source) {
            return SetResult::Rejected;
        }
        self.value = None;
        self.source = None;
        SetResult::Changed
    }

    /// `try_set` for `Some`, `try_reset` for `None`.
    pub fn apply(&mut self, value: Option<T>, source: Provenance) -> SetResult {
        match value {
            Some(value) => self.try_set(value, source),
            None => self.try_reset(source),
        }
    }

    /// Whether `apply(value, source)` would be accepted.
    pub fn can_apply(&self, value: Option<&T>, source: Provenance) -> bool {
        match value {
            Some(value) => self.can_set(value, source),
            None => self.value.is_none() || source.overrides(self.source),
        }
    }

    /// Raise the recorded provenance without touching the value.
    pub fn refresh(&mut self, source: Provenance) {
        if self.value.is_some() {
            self.source = Some(source.max_with(self.source));
        }
    }

    /// Record `value` regardless of the recorded provenance.
    ///
    /// Used for structural side effects (e.g. key membership forcing
    /// non-nullability) that are not subject to the override rule.
    pub fn force(&mut self, value: T, source: Provenance) {
        self.source = Some(source.max_with(self.source));
        self.value = Some(value);
    }

    /// Drop the recorded value and provenance unconditionally.
    pub fn clear(&mut self) {
        self.value = None;
        self.source = None;
    }
}

// =============================================================================
// TESTS
// =============================================================================
