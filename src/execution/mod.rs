//! Execution of a test suite once per program variant.
//!
//! The execution collaborator is abstracted as [`VariantExecutor`]: it knows
//! how to activate a variant (restoring any global state a previous variant
//! touched) and how to run one test case while reporting every executed
//! statement to an [`ExecutionObserver`](crate::observer::ExecutionObserver).
//! [`ExecutionDriver`] sequences the passes.

pub mod driver;

use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::observer::ExecutionObserver;
use crate::snapshot::VariantIndex;
use crate::testcase::TestCase;

pub use driver::{DriverReport, ExecutionDriver, TestOutcome, TestRun, VariantRun, VariantStatus};

/// A program variant: the reference program or one mutant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    /// Index of the variant; `0` is the reference.
    pub index: VariantIndex,
    /// Human-readable description (mutation operator and location for mutants).
    pub label: String,
}

impl Variant {
    /// The unmutated program.
    #[must_use]
    pub fn reference() -> Self {
        Self {
            index: VariantIndex::REFERENCE,
            label: "reference".to_string(),
        }
    }

    /// The `n`-th mutant (1-based).
    #[must_use]
    pub fn mutant(n: u32, label: impl Into<String>) -> Self {
        Self {
            index: VariantIndex::mutant(n),
            label: label.into(),
        }
    }

    /// Returns true for the reference program.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        self.index.is_reference()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index, self.label)
    }
}

/// Outcome of executing one test case under one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    exceptions: BTreeMap<usize, String>,
}

impl ExecutionResult {
    /// A result without exceptions.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// Records an exception raised by the statement at `position`.
    pub fn report_exception(&mut self, position: usize, message: impl Into<String>) {
        self.exceptions.insert(position, message.into());
    }

    /// Returns true if any statement raised.
    #[must_use]
    pub fn has_test_exceptions(&self) -> bool {
        !self.exceptions.is_empty()
    }

    /// Exceptions by statement position.
    #[must_use]
    pub fn exceptions(&self) -> &BTreeMap<usize, String> {
        &self.exceptions
    }
}

/// The execution collaborator.
///
/// Implementations bound each test-case execution (timeouts, isolation) and
/// report non-termination as an exception rather than hanging.
pub trait VariantExecutor {
    /// Activates `variant`, first restoring module state touched by the
    /// previously active variant.
    fn load_variant(&mut self, variant: &Variant) -> Result<()>;

    /// Runs `test_case` against the active variant.
    fn execute(
        &mut self,
        test_case: &TestCase,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionResult;
}

impl<E: VariantExecutor + ?Sized> VariantExecutor for &mut E {
    fn load_variant(&mut self, variant: &Variant) -> Result<()> {
        (**self).load_variant(variant)
    }

    fn execute(
        &mut self,
        test_case: &TestCase,
        observer: &mut dyn ExecutionObserver,
    ) -> ExecutionResult {
        (**self).execute(test_case, observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_constructors() {
        let reference = Variant::reference();
        assert!(reference.is_reference());
        let mutant = Variant::mutant(2, "AOR a + b -> a - b");
        assert!(!mutant.is_reference());
        assert_eq!(mutant.index, VariantIndex(2));
        assert_eq!(mutant.to_string(), "mutant#2 (AOR a + b -> a - b)");
    }

    #[test]
    fn execution_result_tracks_exceptions() {
        let mut result = ExecutionResult::ok();
        assert!(!result.has_test_exceptions());
        result.report_exception(3, "ZeroDivisionError");
        assert!(result.has_test_exceptions());
        assert_eq!(result.exceptions()[&3], "ZeroDivisionError");
    }
}
