//! Runs a fixed test suite once per variant, routing observations into one store.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};

use serde_json::json;

use super::{Variant, VariantExecutor};
use crate::config::DriverConfig;
use crate::observer::StateCollectingObserver;
use crate::snapshot::{SnapshotStore, VariantIndex};
use crate::testcase::{TestCaseId, TestSuite};
use crate::tracing_compat::{debug, info, info_span, warn};

/// How one test case fared under one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    /// Every statement ran without raising.
    Passed,
    /// At least one statement raised; positions of the raising statements.
    Exceptions(Vec<usize>),
    /// The executor itself panicked; the panic message.
    Crashed(String),
    /// Not executed; the reason.
    Skipped(String),
}

impl TestOutcome {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Exceptions(_) => "exceptions",
            Self::Crashed(_) => "crashed",
            Self::Skipped(_) => "skipped",
        }
    }
}

/// One test case executed under one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    /// The test case.
    pub test_id: TestCaseId,
    /// What happened.
    pub outcome: TestOutcome,
    /// Observations recorded during the run.
    pub observations: usize,
}

/// Whether a variant pass ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantStatus {
    /// All test cases were executed.
    Completed,
    /// The variant could not be activated; no test case ran.
    LoadFailed(String),
    /// The variant was refused before loading (e.g. a mutant claiming index 0).
    Skipped(String),
}

/// One full pass of the suite against one variant.
#[derive(Debug, Clone)]
pub struct VariantRun {
    /// The variant.
    pub variant: Variant,
    /// Pass status.
    pub status: VariantStatus,
    /// Per-test results in suite order.
    pub tests: Vec<TestRun>,
}

impl VariantRun {
    /// Number of test cases that crashed the executor.
    #[must_use]
    pub fn crashed(&self) -> usize {
        self.tests
            .iter()
            .filter(|t| matches!(t.outcome, TestOutcome::Crashed(_)))
            .count()
    }

    /// Number of test cases with at least one raising statement.
    #[must_use]
    pub fn with_exceptions(&self) -> usize {
        self.tests
            .iter()
            .filter(|t| matches!(t.outcome, TestOutcome::Exceptions(_)))
            .count()
    }

    /// Number of test cases that were not executed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.tests
            .iter()
            .filter(|t| matches!(t.outcome, TestOutcome::Skipped(_)))
            .count()
    }

    /// Total observations recorded.
    #[must_use]
    pub fn observations(&self) -> usize {
        self.tests.iter().map(|t| t.observations).sum()
    }
}

/// Report for a full execution phase (reference plus every mutant).
#[derive(Debug, Clone, Default)]
pub struct DriverReport {
    runs: Vec<VariantRun>,
}

impl DriverReport {
    /// Per-variant runs in execution order (reference first).
    #[must_use]
    pub fn runs(&self) -> &[VariantRun] {
        &self.runs
    }

    /// Number of mutant passes attempted.
    #[must_use]
    pub fn mutant_count(&self) -> usize {
        self.runs.iter().filter(|r| !r.variant.is_reference()).count()
    }

    /// Mutant indices whose pass completed, ascending.
    #[must_use]
    pub fn executed_mutants(&self) -> Vec<VariantIndex> {
        let mut out: Vec<_> = self
            .runs
            .iter()
            .filter(|r| !r.variant.is_reference() && r.status == VariantStatus::Completed)
            .map(|r| r.variant.index)
            .collect();
        out.sort();
        out
    }

    /// Returns true if the reference pass ran to completion.
    #[must_use]
    pub fn reference_completed(&self) -> bool {
        self.runs
            .iter()
            .any(|r| r.variant.is_reference() && r.status == VariantStatus::Completed)
    }

    /// Renders a human-readable report.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            &mut out,
            "execution report: {} variants ({} mutants)",
            self.runs.len(),
            self.mutant_count()
        );
        for run in &self.runs {
            let _ = match &run.status {
                VariantStatus::Completed => writeln!(
                    &mut out,
                    "{}: {} tests, {} with exceptions, {} crashed, {} skipped, {} observations",
                    run.variant,
                    run.tests.len(),
                    run.with_exceptions(),
                    run.crashed(),
                    run.skipped(),
                    run.observations()
                ),
                VariantStatus::LoadFailed(reason) => {
                    writeln!(&mut out, "{}: load failed: {reason}", run.variant)
                }
                VariantStatus::Skipped(reason) => {
                    writeln!(&mut out, "{}: skipped: {reason}", run.variant)
                }
            };
        }
        out
    }

    /// Renders a JSON report.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let runs = self
            .runs
            .iter()
            .map(|run| {
                let (status, reason) = match &run.status {
                    VariantStatus::Completed => ("completed", None),
                    VariantStatus::LoadFailed(r) => ("load_failed", Some(r.as_str())),
                    VariantStatus::Skipped(r) => ("skipped", Some(r.as_str())),
                };
                let tests = run
                    .tests
                    .iter()
                    .map(|t| {
                        json!({
                            "test_id": t.test_id.0,
                            "outcome": t.outcome.as_str(),
                            "observations": t.observations,
                        })
                    })
                    .collect::<Vec<_>>();
                json!({
                    "variant": run.variant.index.0,
                    "label": run.variant.label,
                    "status": status,
                    "reason": reason,
                    "tests": tests,
                })
            })
            .collect::<Vec<_>>();
        json!({
            "summary": {
                "variants": self.runs.len(),
                "mutants": self.mutant_count(),
            },
            "runs": runs,
        })
    }
}

/// Sequences variant passes: the reference first, then each mutant in order.
///
/// Passes never overlap; a variant runs to completion before the next is
/// loaded. A crash in one test case is confined to that `(variant, test)`
/// pair.
///
/// Every `(variant, test)` pair runs at most once: a mutant repeating an
/// index already run is skipped, and so is a test case repeating an id
/// already run in the same pass.
#[derive(Debug, Clone, Default)]
pub struct ExecutionDriver {
    config: DriverConfig,
}

impl ExecutionDriver {
    /// Creates a driver.
    #[must_use]
    pub const fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    /// Executes `suite` against the reference and every mutant in `mutants`.
    ///
    /// Observations land in `store`. Execution failures never abort the run;
    /// they show up in the returned report and as missing observations. The
    /// one exception is an executor panic with
    /// [`DriverConfig::isolate_panics`] turned off, which unwinds out of here.
    pub fn run<E>(
        &self,
        executor: &mut E,
        mutants: &[Variant],
        suite: &TestSuite,
        store: &mut SnapshotStore,
    ) -> DriverReport
    where
        E: VariantExecutor + ?Sized,
    {
        let limit = self.config.max_mutants.unwrap_or(mutants.len());
        let mut report = DriverReport::default();
        let mut seen = BTreeSet::new();

        let reference = Variant::reference();
        report
            .runs
            .push(self.run_variant(executor, &reference, suite, store));

        for mutant in mutants.iter().take(limit) {
            if mutant.is_reference() {
                warn!(label = %mutant.label, "mutant claims the reference index; skipping");
                report.runs.push(VariantRun {
                    variant: mutant.clone(),
                    status: VariantStatus::Skipped("mutant uses reference index 0".to_string()),
                    tests: Vec::new(),
                });
                continue;
            }
            if !seen.insert(mutant.index) {
                warn!(
                    variant = mutant.index.0,
                    label = %mutant.label,
                    "mutant index already executed; skipping"
                );
                report.runs.push(VariantRun {
                    variant: mutant.clone(),
                    status: VariantStatus::Skipped("duplicate mutant index".to_string()),
                    tests: Vec::new(),
                });
                continue;
            }
            report
                .runs
                .push(self.run_variant(executor, mutant, suite, store));
        }

        info!(
            variants = report.runs.len(),
            mutants = report.mutant_count(),
            observations = store.len(),
            "execution phase finished"
        );
        report
    }

    fn run_variant<E>(
        &self,
        executor: &mut E,
        variant: &Variant,
        suite: &TestSuite,
        store: &mut SnapshotStore,
    ) -> VariantRun
    where
        E: VariantExecutor + ?Sized,
    {
        let _span = info_span!("variant_pass", variant = variant.index.0).entered();

        if let Err(err) = executor.load_variant(variant) {
            warn!(variant = variant.index.0, error = %err, "variant failed to load");
            return VariantRun {
                variant: variant.clone(),
                status: VariantStatus::LoadFailed(err.to_string()),
                tests: Vec::new(),
            };
        }

        info!(
            variant = variant.index.0,
            label = %variant.label,
            tests = suite.len(),
            "variant pass started"
        );

        let mut tests = Vec::with_capacity(suite.len());
        let mut seen = BTreeSet::new();
        for test_case in suite.test_cases() {
            if !seen.insert(test_case.id()) {
                warn!(
                    variant = variant.index.0,
                    test_id = test_case.id().0,
                    "test case id already executed in this pass; skipping"
                );
                tests.push(TestRun {
                    test_id: test_case.id(),
                    outcome: TestOutcome::Skipped("duplicate test case id".to_string()),
                    observations: 0,
                });
                continue;
            }
            let mut observer = StateCollectingObserver::new(store, variant.index);
            let outcome = if self.config.isolate_panics {
                match panic::catch_unwind(AssertUnwindSafe(|| {
                    executor.execute(test_case, &mut observer)
                })) {
                    Ok(result) => Self::classify(&result),
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        warn!(
                            variant = variant.index.0,
                            test_id = test_case.id().0,
                            panic = %message,
                            "test case crashed the executor"
                        );
                        TestOutcome::Crashed(message)
                    }
                }
            } else {
                Self::classify(&executor.execute(test_case, &mut observer))
            };
            debug!(
                variant = variant.index.0,
                test_id = test_case.id().0,
                outcome = outcome.as_str(),
                observations = observer.recorded(),
                "test case executed"
            );
            tests.push(TestRun {
                test_id: test_case.id(),
                outcome,
                observations: observer.recorded(),
            });
        }

        VariantRun {
            variant: variant.clone(),
            status: VariantStatus::Completed,
            tests,
        }
    }

    fn classify(result: &super::ExecutionResult) -> TestOutcome {
        if result.has_test_exceptions() {
            TestOutcome::Exceptions(result.exceptions().keys().copied().collect())
        } else {
            TestOutcome::Passed
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
