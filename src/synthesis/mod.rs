//! Oracle synthesis: diff reference observations against mutant observations
//! and attach the distinguishing assertions to the test statements.

pub mod locator;
pub mod pass;
pub mod report;
pub mod synthesizer;

use thiserror::Error;

use crate::error::{Error as CrateError, ErrorKind};
use crate::snapshot::VariantIndex;
use crate::testcase::TestCaseId;

pub use locator::{nearest_constructor, resolve_owner};
pub use pass::SynthesisPass;
pub use report::{EmissionCounts, SynthesisReport, TestSynthesis};
pub use synthesizer::OracleSynthesizer;

/// The snapshot store and the test suite disagree.
///
/// These are the only failures synthesis reports; everything else (absent
/// mutant observations, unresolvable owners) degrades silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SynthesisError {
    /// A reference observation names a test case that is not in the suite.
    #[error("no test case {test_id} in the suite")]
    MissingTestCase {
        /// Test case id from the observation.
        test_id: TestCaseId,
    },
    /// A reference observation names a position outside its test case.
    #[error("test case {test_id} has no statement at position {position}")]
    MissingStatement {
        /// Test case id.
        test_id: TestCaseId,
        /// Out-of-range position.
        position: usize,
    },
    /// A mutant observation lacks a fragment (or fragment section) the
    /// reference observation carries.
    #[error("{variant} has no fragment `{fragment}` at {test_id} position {position}")]
    MissingFragment {
        /// Test case id.
        test_id: TestCaseId,
        /// Statement position.
        position: usize,
        /// Fragment label, with the section name when only the section is missing.
        fragment: String,
        /// Mutant that lacks the fragment.
        variant: VariantIndex,
    },
}

impl SynthesisError {
    /// The crate error kind this breach maps to.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingTestCase { .. } => ErrorKind::MissingTestCase,
            Self::MissingStatement { .. } => ErrorKind::MissingStatement,
            Self::MissingFragment { .. } => ErrorKind::MissingFragment,
        }
    }
}

impl From<SynthesisError> for CrateError {
    fn from(e: SynthesisError) -> Self {
        Self::new(e.kind()).with_context(e.to_string())
    }
}
