//! Observation records captured after a statement runs under one variant.

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::testcase::TestCaseId;
use crate::value::Value;

/// Identifies a program variant: `0` is the reference, `1..=N` are mutants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VariantIndex(pub u32);

impl VariantIndex {
    /// The unmutated program.
    pub const REFERENCE: Self = Self(0);

    /// Returns true for the reference variant.
    #[must_use]
    pub const fn is_reference(self) -> bool {
        self.0 == 0
    }

    /// The `n`-th mutant (1-based).
    #[must_use]
    pub const fn mutant(n: u32) -> Self {
        Self(n)
    }
}

impl fmt::Display for VariantIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reference() {
            f.write_str("reference")
        } else {
            write!(f, "mutant#{}", self.0)
        }
    }
}

/// Identifies one statement of one test case.
///
/// Ordered by test id, then position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationKey {
    /// Stable test case id.
    pub test_id: TestCaseId,
    /// Zero-based statement position.
    pub position: usize,
}

impl ObservationKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(test_id: TestCaseId, position: usize) -> Self {
        Self { test_id, position }
    }
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.test_id, self.position)
    }
}

/// Which part of an object's state a fragment section describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// Class-level fields.
    ClassField,
    /// Instance attributes.
    ObjectAttribute,
}

impl FragmentKind {
    /// Stable name used in dumps and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClassField => "class_field",
            Self::ObjectAttribute => "object_attribute",
        }
    }
}

/// Field name to observed value.
pub type FieldMap = BTreeMap<String, Value>;

/// Field state of one object (and its class) at one point of observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment {
    sections: BTreeMap<FragmentKind, FieldMap>,
}

impl Fragment {
    /// Creates an empty fragment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one field of the `kind` section, creating the section if needed.
    #[must_use]
    pub fn with_field(mut self, kind: FragmentKind, field: impl Into<String>, value: Value) -> Self {
        self.sections
            .entry(kind)
            .or_default()
            .insert(field.into(), value);
        self
    }

    /// Ensures the `kind` section exists, even if empty.
    #[must_use]
    pub fn with_section(mut self, kind: FragmentKind) -> Self {
        self.sections.entry(kind).or_default();
        self
    }

    /// The `kind` section, if captured.
    #[must_use]
    pub fn section(&self, kind: FragmentKind) -> Option<&FieldMap> {
        self.sections.get(&kind)
    }

    /// Sections in kind order (class fields first).
    pub fn sections(&self) -> impl Iterator<Item = (FragmentKind, &FieldMap)> {
        self.sections.iter().map(|(kind, fields)| (*kind, fields))
    }
}

/// State captured immediately after one statement executed under one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Result of the statement, or [`Value::NoValue`].
    #[serde(default)]
    pub return_value: Value,
    /// Module alias to global name to value.
    #[serde(default)]
    pub globals: BTreeMap<String, FieldMap>,
    /// Object fragments keyed by the observer's fragment label.
    #[serde(default)]
    pub fragments: BTreeMap<String, Fragment>,
}

impl Observation {
    /// Creates an observation with only a return value.
    #[must_use]
    pub fn new(return_value: impl Into<Value>) -> Self {
        Self {
            return_value: return_value.into(),
            ..Self::default()
        }
    }

    /// Creates an observation of a statement that produced no value.
    #[must_use]
    pub fn no_value() -> Self {
        Self::default()
    }

    /// Adds a module global.
    #[must_use]
    pub fn with_global(
        mut self,
        module: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.globals
            .entry(module.into())
            .or_default()
            .insert(field.into(), value.into());
        self
    }

    /// Adds a whole fragment under `label`.
    #[must_use]
    pub fn with_fragment(mut self, label: impl Into<String>, fragment: Fragment) -> Self {
        self.fragments.insert(label.into(), fragment);
        self
    }

    /// Adds one class field to the fragment labelled `label`.
    #[must_use]
    pub fn with_class_field(
        self,
        label: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.with_fragment_field(label, FragmentKind::ClassField, field, value.into())
    }

    /// Adds one object attribute to the fragment labelled `label`.
    #[must_use]
    pub fn with_object_attribute(
        self,
        label: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.with_fragment_field(label, FragmentKind::ObjectAttribute, field, value.into())
    }

    fn with_fragment_field(
        mut self,
        label: impl Into<String>,
        kind: FragmentKind,
        field: impl Into<String>,
        value: Value,
    ) -> Self {
        let fragment = self.fragments.entry(label.into()).or_default();
        fragment
            .sections
            .entry(kind)
            .or_default()
            .insert(field.into(), value);
        self
    }

    /// Looks up one global.
    #[must_use]
    pub fn global(&self, module: &str, field: &str) -> Option<&Value> {
        self.globals.get(module).and_then(|fields| fields.get(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_index_display() {
        assert_eq!(VariantIndex::REFERENCE.to_string(), "reference");
        assert_eq!(VariantIndex::mutant(3).to_string(), "mutant#3");
        assert!(VariantIndex::REFERENCE.is_reference());
        assert!(!VariantIndex(1).is_reference());
    }

    #[test]
    fn keys_order_by_test_then_position() {
        let mut keys = vec![
            ObservationKey::new(TestCaseId(2), 0),
            ObservationKey::new(TestCaseId(1), 3),
            ObservationKey::new(TestCaseId(1), 1),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ObservationKey::new(TestCaseId(1), 1),
                ObservationKey::new(TestCaseId(1), 3),
                ObservationKey::new(TestCaseId(2), 0),
            ]
        );
    }

    #[test]
    fn builder_fills_sections() {
        let obs = Observation::new(3)
            .with_global("bar", "LIMIT", 10)
            .with_class_field("obj0", "instances", 1)
            .with_object_attribute("obj0", "size", 4);

        assert_eq!(obs.return_value, Value::Int(3));
        assert_eq!(obs.global("bar", "LIMIT"), Some(&Value::Int(10)));
        assert_eq!(obs.global("bar", "OTHER"), None);

        let fragment = &obs.fragments["obj0"];
        let kinds: Vec<_> = fragment.sections().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![FragmentKind::ClassField, FragmentKind::ObjectAttribute]);
        assert_eq!(
            fragment.section(FragmentKind::ObjectAttribute).unwrap()["size"],
            Value::Int(4)
        );
    }

    #[test]
    fn fragment_kind_names() {
        assert_eq!(FragmentKind::ClassField.as_str(), "class_field");
        assert_eq!(FragmentKind::ObjectAttribute.as_str(), "object_attribute");
        let json = serde_json::to_string(&FragmentKind::ObjectAttribute).unwrap();
        assert_eq!(json, "\"object_attribute\"");
    }
}
