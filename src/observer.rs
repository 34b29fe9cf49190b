//! Execution observers: hooks invoked by the executor after each statement.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::snapshot::{
    FieldMap, Fragment, FragmentKind, Observation, ObservationKey, SnapshotStore, VariantIndex,
};
use crate::testcase::TestCaseId;
use crate::tracing_compat::trace;
use crate::value::Value;

/// Field state of one live object right after a statement ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectState {
    /// Label the executor uses for this object (stable across variants).
    pub label: String,
    /// Class-level fields of the object's class.
    #[serde(default)]
    pub class_fields: FieldMap,
    /// Instance attributes.
    #[serde(default)]
    pub attributes: FieldMap,
}

impl ObjectState {
    /// Creates an object state with no fields.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Adds a class-level field.
    #[must_use]
    pub fn class_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.class_fields.insert(field.into(), value.into());
        self
    }

    /// Adds an instance attribute.
    #[must_use]
    pub fn attribute(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }
}

/// Everything the executor exposes about program state after one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedState {
    /// Result of the statement.
    #[serde(default)]
    pub return_value: Value,
    /// Module alias to global name to value, for every accessible module.
    #[serde(default)]
    pub globals: BTreeMap<String, FieldMap>,
    /// Objects reachable from the test's variables.
    #[serde(default)]
    pub objects: Vec<ObjectState>,
}

impl CapturedState {
    /// Converts the raw capture into an observation record.
    ///
    /// Every object contributes one fragment carrying both sections, even when
    /// a section is empty, so that reference and mutant fragments line up.
    #[must_use]
    pub fn into_observation(self) -> Observation {
        let fragments = self
            .objects
            .into_iter()
            .map(|object| {
                let mut fragment = Fragment::new()
                    .with_section(FragmentKind::ClassField)
                    .with_section(FragmentKind::ObjectAttribute);
                for (field, value) in object.class_fields {
                    fragment = fragment.with_field(FragmentKind::ClassField, field, value);
                }
                for (field, value) in object.attributes {
                    fragment = fragment.with_field(FragmentKind::ObjectAttribute, field, value);
                }
                (object.label, fragment)
            })
            .collect();
        Observation {
            return_value: self.return_value,
            globals: self.globals,
            fragments,
        }
    }
}

/// Hook the execution collaborator calls while running a test case.
///
/// `after_statement` is invoked exactly once per executed statement,
/// synchronously, before the next statement runs.
pub trait ExecutionObserver {
    /// Called before the first statement of a test case.
    fn before_test_case(&mut self, _test_id: TestCaseId) {}

    /// Called after the statement at `position` finished.
    fn after_statement(&mut self, test_id: TestCaseId, position: usize, state: CapturedState);

    /// Called after a test case finished, successfully or not.
    fn after_test_case(&mut self, _test_id: TestCaseId) {}
}

/// Observer that writes every capture into a [`SnapshotStore`] under one variant.
#[derive(Debug)]
pub struct StateCollectingObserver<'a> {
    store: &'a mut SnapshotStore,
    variant: VariantIndex,
    recorded: usize,
}

impl<'a> StateCollectingObserver<'a> {
    /// Creates an observer recording under `variant`.
    pub fn new(store: &'a mut SnapshotStore, variant: VariantIndex) -> Self {
        Self {
            store,
            variant,
            recorded: 0,
        }
    }

    /// The variant observations are recorded under.
    #[must_use]
    pub const fn variant(&self) -> VariantIndex {
        self.variant
    }

    /// Number of observations recorded by this observer.
    #[must_use]
    pub const fn recorded(&self) -> usize {
        self.recorded
    }
}

impl ExecutionObserver for StateCollectingObserver<'_> {
    fn after_statement(&mut self, test_id: TestCaseId, position: usize, state: CapturedState) {
        let key = ObservationKey::new(test_id, position);
        trace!(variant = self.variant.0, %key, "recording observation");
        self.store.record(self.variant, key, state.into_observation());
        self.recorded += 1;
    }
}
