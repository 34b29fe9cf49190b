//! Error types and error handling strategy for mutoracle.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Only invariant breaches of the synthesis pass surface to callers
//! - Failures of a test case under a variant are recovered by the driver and
//!   never become an [`Error`]
//!
//! # Error Categories
//!
//! - **Invariant**: the snapshot store and the test suite disagree
//!   (missing test case, statement, or fragment)
//! - **Execution**: a variant could not be activated
//! - **Setup**: configuration, I/O and serialization problems
//! - **Internal**: bugs

use core::fmt;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Invariant breaches ===
    /// A recorded observation names a test case that is not in the suite.
    MissingTestCase,
    /// A recorded observation names a statement position outside its test case.
    MissingStatement,
    /// A mutant observation lacks a fragment the reference observation carries.
    MissingFragment,

    // === Execution ===
    /// The execution collaborator failed to activate a program variant.
    VariantLoad,

    // === Setup ===
    /// Invalid configuration value.
    Config,
    /// Snapshot dump or report could not be (de)serialized.
    Serialization,
    /// Filesystem failure.
    Io,

    // === Internal ===
    /// Internal error (bug).
    Internal,
}

/// Broad grouping of [`ErrorKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Snapshot store and test suite are inconsistent.
    Invariant,
    /// Execution collaborator failures.
    Execution,
    /// Configuration, I/O, serialization.
    Setup,
    /// Bugs.
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingTestCase | Self::MissingStatement | Self::MissingFragment => {
                ErrorCategory::Invariant
            }
            Self::VariantLoad => ErrorCategory::Execution,
            Self::Config | Self::Serialization | Self::Io => ErrorCategory::Setup,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::MissingTestCase => "missing test case",
            Self::MissingStatement => "missing statement",
            Self::MissingFragment => "missing fragment",
            Self::VariantLoad => "variant load failed",
            Self::Config => "invalid configuration",
            Self::Serialization => "serialization failed",
            Self::Io => "i/o failure",
            Self::Internal => "internal error",
        }
    }
}

/// The main error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true if this error reports a snapshot/suite inconsistency.
    #[must_use]
    pub const fn is_invariant_breach(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Invariant)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization).with_context(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io).with_context(e.to_string())
    }
}

/// Result alias using the crate [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
