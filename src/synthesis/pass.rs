//! Deduplication state scoped to one synthesis pass.

use std::collections::HashSet;

use crate::assertion::{FieldAssertion, ValueAssertion};
use crate::value::Value;

/// Dedup sets and the value-assertion cursor for one pass over a test suite.
///
/// A pass is created fresh for every suite evaluation and dropped afterwards.
/// The two field sets are kept apart: a global assertion never suppresses a
/// class-field or object-attribute assertion and vice versa.
#[derive(Debug, Default)]
pub struct SynthesisPass {
    global_assertions: HashSet<FieldAssertion>,
    field_assertions: HashSet<FieldAssertion>,
    last_value_assertion: Option<ValueAssertion>,
}

impl SynthesisPass {
    /// Creates an empty pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a global assertion; returns true on first sight.
    pub fn admit_global(&mut self, assertion: &FieldAssertion) -> bool {
        admit(&mut self.global_assertions, assertion)
    }

    /// Records a class-field or object-attribute assertion; returns true on first sight.
    pub fn admit_field(&mut self, assertion: &FieldAssertion) -> bool {
        admit(&mut self.field_assertions, assertion)
    }

    /// Clears the value-assertion cursor. Called once per reference observation.
    pub fn reset_cursor(&mut self) {
        self.last_value_assertion = None;
    }

    /// Returns true if the last emitted value assertion expects `value`.
    #[must_use]
    pub fn repeats_last_value(&self, value: &Value) -> bool {
        self.last_value_assertion
            .as_ref()
            .is_some_and(|last| last.value() == value)
    }

    /// Moves the cursor to `assertion`.
    pub fn set_last_value(&mut self, assertion: ValueAssertion) {
        self.last_value_assertion = Some(assertion);
    }
}

fn admit(set: &mut HashSet<FieldAssertion>, assertion: &FieldAssertion) -> bool {
    if set.contains(assertion) {
        false
    } else {
        set.insert(assertion.clone())
    }
}
