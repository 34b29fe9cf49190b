//! Test utilities for mutoracle.
//!
//! This module provides shared helpers for unit and integration tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - [`ScriptedExecutor`], an in-memory [`VariantExecutor`] whose per-variant
//!   behavior is declared up front
//!
//! # Example
//! ```
//! use mutoracle::test_utils::{init_test_logging, ScriptedExecutor};
//! use mutoracle::snapshot::VariantIndex;
//! use mutoracle::testcase::TestCaseId;
//!
//! init_test_logging();
//! let executor = ScriptedExecutor::new()
//!     .with_default_return(TestCaseId(1), 0, 3)
//!     .with_return(VariantIndex(1), TestCaseId(1), 0, 4);
//! # let _ = executor;
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Once;

use tracing_subscriber::fmt::format::FmtSpan;

use crate::error::{Error, ErrorKind, Result};
use crate::execution::{ExecutionResult, Variant, VariantExecutor};
use crate::observer::{CapturedState, ExecutionObserver, ObjectState};
use crate::snapshot::VariantIndex;
use crate::testcase::{TestCase, TestCaseId};
use crate::value::Value;

static INIT_LOGGING: Once = Once::new();

/// Default seed used by property tests.
pub const DEFAULT_TEST_SEED: u64 = 0xDEAD_BEEF;

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    init_test_logging_with_level(tracing::Level::TRACE);
}

/// Initialize test logging with a custom level.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging_with_level(level: tracing::Level) {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

type Slot = (VariantIndex, TestCaseId, usize);

#[derive(Debug, Clone)]
enum Patch {
    Return(Value),
    Global {
        module: String,
        field: String,
        value: Value,
    },
    ClassField {
        label: String,
        field: String,
        value: Value,
    },
    Attribute {
        label: String,
        field: String,
        value: Value,
    },
}

impl Patch {
    fn apply(&self, state: &mut CapturedState) {
        match self {
            Self::Return(value) => state.return_value = value.clone(),
            Self::Global {
                module,
                field,
                value,
            } => {
                state
                    .globals
                    .entry(module.clone())
                    .or_default()
                    .insert(field.clone(), value.clone());
            }
            Self::ClassField {
                label,
                field,
                value,
            } => {
                object_mut(state, label)
                    .class_fields
                    .insert(field.clone(), value.clone());
            }
            Self::Attribute {
                label,
                field,
                value,
            } => {
                object_mut(state, label)
                    .attributes
                    .insert(field.clone(), value.clone());
            }
        }
    }
}

fn object_mut<'a>(state: &'a mut CapturedState, label: &str) -> &'a mut ObjectState {
    let index = match state.objects.iter().position(|o| o.label == label) {
        Some(index) => index,
        None => {
            state.objects.push(ObjectState::new(label));
            state.objects.len() - 1
        }
    };
    &mut state.objects[index]
}

/// In-memory executor with scripted per-variant behavior.
///
/// Every statement of every test case is observed. The captured state of a
/// statement is its default state (shared by all variants, empty unless set)
/// with the active variant's patches applied in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    defaults: BTreeMap<(TestCaseId, usize), CapturedState>,
    patches: BTreeMap<Slot, Vec<Patch>>,
    panics: BTreeSet<Slot>,
    raises: BTreeSet<Slot>,
    load_failures: BTreeSet<VariantIndex>,
    active: VariantIndex,
    loaded: Vec<VariantIndex>,
}

impl ScriptedExecutor {
    /// Creates an executor where every variant behaves identically.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the state every variant captures at `(test, pos)` unless patched.
    #[must_use]
    pub fn with_default(mut self, test: TestCaseId, pos: usize, state: CapturedState) -> Self {
        self.defaults.insert((test, pos), state);
        self
    }

    /// Sets the return value every variant captures at `(test, pos)`.
    #[must_use]
    pub fn with_default_return(
        mut self,
        test: TestCaseId,
        pos: usize,
        value: impl Into<Value>,
    ) -> Self {
        self.defaults.entry((test, pos)).or_default().return_value = value.into();
        self
    }

    fn patch(mut self, slot: Slot, patch: Patch) -> Self {
        self.patches.entry(slot).or_default().push(patch);
        self
    }

    /// Overrides the return value `variant` captures at `(test, pos)`.
    #[must_use]
    pub fn with_return(
        self,
        variant: VariantIndex,
        test: TestCaseId,
        pos: usize,
        value: impl Into<Value>,
    ) -> Self {
        self.patch((variant, test, pos), Patch::Return(value.into()))
    }

    /// Overrides one module global `variant` captures at `(test, pos)`.
    #[must_use]
    pub fn with_global(
        self,
        variant: VariantIndex,
        (test, pos): (TestCaseId, usize),
        module: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.patch(
            (variant, test, pos),
            Patch::Global {
                module: module.into(),
                field: field.into(),
                value: value.into(),
            },
        )
    }

    /// Overrides one class field of object `label` at `(test, pos)`.
    #[must_use]
    pub fn with_class_field(
        self,
        variant: VariantIndex,
        (test, pos): (TestCaseId, usize),
        label: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.patch(
            (variant, test, pos),
            Patch::ClassField {
                label: label.into(),
                field: field.into(),
                value: value.into(),
            },
        )
    }

    /// Overrides one instance attribute of object `label` at `(test, pos)`.
    #[must_use]
    pub fn with_attribute(
        self,
        variant: VariantIndex,
        (test, pos): (TestCaseId, usize),
        label: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.patch(
            (variant, test, pos),
            Patch::Attribute {
                label: label.into(),
                field: field.into(),
                value: value.into(),
            },
        )
    }

    /// Makes `variant` panic right before observing `(test, pos)`.
    #[must_use]
    pub fn panic_at(mut self, variant: VariantIndex, test: TestCaseId, pos: usize) -> Self {
        self.panics.insert((variant, test, pos));
        self
    }

    /// Makes the statement at `(test, pos)` raise under `variant`; it is still
    /// observed, but the rest of the test case is not executed.
    #[must_use]
    pub fn raise_at(mut self, variant: VariantIndex, test: TestCaseId, pos: usize) -> Self {
        self.raises.insert((variant, test, pos));
        self
    }

    /// Makes activating `variant` fail.
    #[must_use]
    pub fn fail_load(mut self, variant: VariantIndex) -> Self {
        self.load_failures.insert(variant);
        self
    }

    /// Variants whose activation was attempted, in order.
    #[must_use]
    pub fn loaded(&self) -> &[VariantIndex] {
        &self.loaded
    }

    fn capture(&self, test: TestCaseId, pos: usize) -> CapturedState {
        let mut state = self.defaults.get(&(test, pos)).cloned().unwrap_or_default();
        if let Some(patches) = self.patches.get(&(self.active, test, pos)) {
            for patch in patches {
                patch.apply(&mut state);
            }
        }
        state
    }
}

impl VariantExecutor for ScriptedExecutor {
    fn load_variant(&mut self, variant: &Variant) -> Result<()> {
        self.loaded.push(variant.index);
        if self.load_failures.contains(&variant.index) {
            return Err(Error::new(ErrorKind::VariantLoad)
                .with_context(format!("scripted load failure for {variant}")));
        }
        self.active = variant.index;
        Ok(())
    }

    fn execute(
        &mut self,
        test_case: &TestCase,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionResult {
        let id = test_case.id();
        let mut result = ExecutionResult::ok();
        observer.before_test_case(id);
        for pos in 0..test_case.len() {
            let slot = (self.active, id, pos);
            assert!(
                !self.panics.contains(&slot),
                "scripted crash of {} in {id} at position {pos}",
                self.active
            );
            observer.after_statement(id, pos, self.capture(id, pos));
            if self.raises.contains(&slot) {
                result.report_exception(pos, "scripted exception");
                break;
            }
        }
        observer.after_test_case(id);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{FragmentKind, ObservationKey, SnapshotStore};
    use crate::observer::StateCollectingObserver;

    fn two_statements() -> TestCase {
        let mut tc = TestCase::new(TestCaseId(1));
        tc.push_primitive(0);
        tc.push_primitive(1);
        tc
    }

    #[test]
    fn patches_apply_only_to_their_variant() {
        init_test_logging();
        test_phase!("patches");
        let mut executor = ScriptedExecutor::new()
            .with_default_return(TestCaseId(1), 1, 3)
            .with_return(VariantIndex(1), TestCaseId(1), 1, 4)
            .with_attribute(VariantIndex(1), (TestCaseId(1), 1), "o", "n", 1);
        let tc = two_statements();
        let mut store = SnapshotStore::new();

        for v in [Variant::reference(), Variant::mutant(1, "m1")] {
            executor.load_variant(&v).unwrap();
            let mut observer = StateCollectingObserver::new(&mut store, v.index);
            let result = executor.execute(&tc, &mut observer);
            assert!(!result.has_test_exceptions());
        }

        let key = ObservationKey::new(TestCaseId(1), 1);
        let reference = store.get(VariantIndex(0), key).unwrap();
        let mutant = store.get(VariantIndex(1), key).unwrap();
        assert_eq!(reference.return_value, Value::from(3));
        assert_eq!(mutant.return_value, Value::from(4));
        assert!(reference.fragments.is_empty());
        assert_eq!(
            mutant.fragments["o"].section(FragmentKind::ObjectAttribute).unwrap()["n"],
            Value::from(1)
        );
        test_complete!("patches_apply_only_to_their_variant");
    }

    #[test]
    fn load_failure_is_reported() {
        let mut executor = ScriptedExecutor::new().fail_load(VariantIndex(2));
        let err = executor.load_variant(&Variant::mutant(2, "m2")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VariantLoad);
        assert_eq!(executor.loaded(), &[VariantIndex(2)]);
    }

    #[test]
    fn raise_stops_the_test_case() {
        let mut executor = ScriptedExecutor::new().raise_at(VariantIndex(0), TestCaseId(1), 0);
        let mut store = SnapshotStore::new();
        let mut observer = StateCollectingObserver::new(&mut store, VariantIndex(0));
        let result = executor.execute(&two_statements(), &mut observer);
        assert_with_log!(
            result.has_test_exceptions(),
            "exception reported",
            true,
            result.has_test_exceptions()
        );
        assert_eq!(observer.recorded(), 1);
    }
}
