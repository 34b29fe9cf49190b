//! Mutoracle: mutation-analysis oracle synthesis for generated test suites.
//!
//! # Overview
//!
//! Given a test suite and a set of mutants of the program under test,
//! mutoracle runs every test case against the reference program and against
//! each mutant, records the program state observed after every statement, and
//! attaches to each statement exactly the assertions that tell the reference
//! apart from the mutants.
//!
//! # Core Guarantees
//!
//! - **Deterministic**: identical observations yield identical assertions in
//!   identical order
//! - **No false oracles**: a mutant that behaves like the reference at a
//!   statement never causes an assertion there
//! - **Deduplicated**: a field assertion is attached at most once per pass
//! - **Crash tolerant**: a mutant that crashes simply contributes fewer
//!   observations
//!
//! # Module Structure
//!
//! - [`value`]: Observed runtime values
//! - [`reflection`]: Type references, accessible-object metadata, owner resolution
//! - [`testcase`]: Test cases, statements and result references
//! - [`assertion`]: Value and field assertions
//! - [`snapshot`]: Observation records, the snapshot store, replayable dumps
//! - [`observer`]: Per-statement execution hook
//! - [`execution`]: The execution collaborator and the variant-sequential driver
//! - [`synthesis`]: The comparison walk that emits assertions
//! - [`generator`]: Execution plus synthesis in one call
//! - [`config`]: Configuration, env overrides, optional TOML file
//! - [`error`](mod@error): Error types
//! - [`tracing_compat`]: Optional tracing integration (requires `tracing-integration` feature)

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]

pub mod assertion;
pub mod config;
pub mod error;
pub mod execution;
pub mod generator;
pub mod observer;
pub mod reflection;
pub mod snapshot;
pub mod synthesis;
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;
pub mod testcase;
pub mod tracing_compat;
pub mod value;

pub use assertion::{Assertion, FieldAssertion, FieldKind, FieldScope, ValueAssertion};
pub use config::{DriverConfig, OracleConfig, SynthesisConfig};
pub use error::{Error, ErrorCategory, ErrorKind, Result};
pub use execution::{
    DriverReport, ExecutionDriver, ExecutionResult, Variant, VariantExecutor, VariantStatus,
};
pub use generator::{GenerationReport, MutantProvider, OracleGenerator};
pub use observer::{CapturedState, ExecutionObserver, ObjectState, StateCollectingObserver};
pub use reflection::{AccessibleObject, DeclaredTypeResolver, OwnerResolver, TypeRef, TypeRegistry};
pub use snapshot::{
    Fragment, FragmentKind, Observation, ObservationKey, SnapshotDump, SnapshotStore,
    VariantIndex,
};
pub use synthesis::{OracleSynthesizer, SynthesisError, SynthesisPass, SynthesisReport};
pub use testcase::{Statement, StatementKind, TestCase, TestCaseId, TestSuite, VariableRef};
pub use value::Value;
