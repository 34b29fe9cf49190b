//! End-to-end oracle generation: execute every variant, then synthesize.

use serde_json::json;

use crate::config::OracleConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::execution::{DriverReport, ExecutionDriver, Variant, VariantExecutor, VariantStatus};
use crate::reflection::{DeclaredTypeResolver, OwnerResolver};
use crate::snapshot::{SnapshotDump, SnapshotStore};
use crate::synthesis::{OracleSynthesizer, SynthesisReport};
use crate::testcase::TestSuite;
use crate::tracing_compat::{info, info_span};

/// Supplies the mutant variants of the program under test.
pub trait MutantProvider {
    /// Produces the mutants, indexed `1..=N` in a stable order.
    fn mutants(&mut self) -> Result<Vec<Variant>>;
}

impl MutantProvider for Vec<Variant> {
    fn mutants(&mut self) -> Result<Vec<Variant>> {
        Ok(self.clone())
    }
}

impl MutantProvider for [Variant] {
    fn mutants(&mut self) -> Result<Vec<Variant>> {
        Ok(self.to_vec())
    }
}

impl<P: MutantProvider + ?Sized> MutantProvider for &mut P {
    fn mutants(&mut self) -> Result<Vec<Variant>> {
        (**self).mutants()
    }
}

/// Result of one [`OracleGenerator::generate`] call.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Execution phase.
    pub execution: DriverReport,
    /// Synthesis phase.
    pub synthesis: SynthesisReport,
}

impl GenerationReport {
    /// Renders both phases as text.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = self.execution.to_text();
        out.push_str(&self.synthesis.to_text());
        out
    }

    /// Renders both phases as JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "execution": self.execution.to_json(),
            "synthesis": self.synthesis.to_json(),
        })
    }
}

/// Runs the execution driver and the synthesizer back to back.
///
/// Every call uses a fresh snapshot store and a fresh synthesis pass, so
/// generating twice over the same suite attaches the assertions twice.
#[derive(Debug)]
pub struct OracleGenerator<E, R = DeclaredTypeResolver> {
    executor: E,
    driver: ExecutionDriver,
    synthesizer: OracleSynthesizer<R>,
}

impl<E: VariantExecutor> OracleGenerator<E, DeclaredTypeResolver> {
    /// Creates a generator resolving owners from declared types.
    #[must_use]
    pub fn new(executor: E, config: OracleConfig) -> Self {
        Self::with_resolver(executor, config, DeclaredTypeResolver)
    }
}

impl<E: VariantExecutor, R: OwnerResolver> OracleGenerator<E, R> {
    /// Creates a generator with a custom owner resolver.
    #[must_use]
    pub fn with_resolver(executor: E, config: OracleConfig, resolver: R) -> Self {
        Self {
            executor,
            driver: ExecutionDriver::new(config.driver),
            synthesizer: OracleSynthesizer::with_resolver(config.synthesis, resolver),
        }
    }

    /// The wrapped executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Consumes the generator, returning the executor.
    pub fn into_executor(self) -> E {
        self.executor
    }

    /// Execution phase only: runs the reference and every mutant over `suite`.
    ///
    /// Fails with [`ErrorKind::VariantLoad`] if the reference could not be
    /// activated; mutant failures only show up in the report.
    pub fn record<P>(&mut self, suite: &TestSuite, provider: &mut P) -> Result<(SnapshotStore, DriverReport)>
    where
        P: MutantProvider + ?Sized,
    {
        let mutants = provider.mutants()?;
        let mut store = SnapshotStore::new();
        let report = self
            .driver
            .run(&mut self.executor, &mutants, suite, &mut store);
        if !report.reference_completed() {
            let reason = report
                .runs()
                .first()
                .and_then(|run| match &run.status {
                    VariantStatus::LoadFailed(reason) => Some(reason.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            return Err(Error::new(ErrorKind::VariantLoad)
                .with_context(format!("reference program: {reason}")));
        }
        Ok((store, report))
    }

    /// Execution phase captured as a replayable dump.
    pub fn record_dump<P>(&mut self, suite: &TestSuite, provider: &mut P) -> Result<SnapshotDump>
    where
        P: MutantProvider + ?Sized,
    {
        let (store, _) = self.record(suite, provider)?;
        Ok(SnapshotDump::capture(&store, suite))
    }

    /// Executes all variants and attaches the synthesized assertions to `suite`.
    pub fn generate<P>(&mut self, suite: &mut TestSuite, provider: &mut P) -> Result<GenerationReport>
    where
        P: MutantProvider + ?Sized,
    {
        let _span = info_span!("generate", tests = suite.len()).entered();
        let (store, execution) = self.record(suite, provider)?;
        let mut synthesis = self.synthesizer.synthesize(&store, suite)?;
        synthesis.include_mutants(
            execution
                .runs()
                .iter()
                .filter(|run| !run.variant.is_reference())
                .map(|run| run.variant.index),
        );
        info!(
            assertions = suite.assertion_count(),
            mutation_score = synthesis.mutation_score(),
            "oracle generation finished"
        );
        Ok(GenerationReport {
            execution,
            synthesis,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::TypeRef;
    use crate::snapshot::VariantIndex;
    use crate::test_utils::{ScriptedExecutor, init_test_logging};
    use crate::testcase::{TestCase, TestCaseId};
    use crate::value::Value;

    fn suite() -> TestSuite {
        let mut tc = TestCase::new(TestCaseId(1));
        tc.push_constructor(TypeRef::new("bar", "Foo"), vec![]);
        tc.push_method(0, TypeRef::new("bar", "Foo"), "size", vec![]);
        TestSuite::from_test_cases(vec![tc])
    }

    #[test]
    fn generate_attaches_and_scores() {
        init_test_logging();
        let executor = ScriptedExecutor::new()
            .with_default_return(TestCaseId(1), 1, 3)
            .with_return(VariantIndex(1), TestCaseId(1), 1, Value::from(4));
        let mut generator = OracleGenerator::new(executor, OracleConfig::default());
        let mut suite = suite();
        let mut mutants = vec![Variant::mutant(1, "m1"), Variant::mutant(2, "m2")];

        let report = generator.generate(&mut suite, &mut mutants).unwrap();
        assert_eq!(suite.assertion_count(), 1);
        assert_eq!(report.synthesis.total_mutants(), 2);
        assert!((report.synthesis.mutation_score() - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.to_json()["synthesis"]["summary"]["survived"][0], 2);
    }

    #[test]
    fn generating_twice_appends_again() {
        let executor = ScriptedExecutor::new()
            .with_default_return(TestCaseId(1), 1, 3)
            .with_return(VariantIndex(1), TestCaseId(1), 1, Value::from(4));
        let mut generator = OracleGenerator::new(executor, OracleConfig::default());
        let mut suite = suite();
        let mut mutants = vec![Variant::mutant(1, "m1")];
        generator.generate(&mut suite, &mut mutants).unwrap();
        generator.generate(&mut suite, &mut mutants).unwrap();
        assert_eq!(suite.assertion_count(), 2);
    }

    #[test]
    fn reference_load_failure_is_an_error() {
        let executor = ScriptedExecutor::new().fail_load(VariantIndex::REFERENCE);
        let mut generator = OracleGenerator::new(executor, OracleConfig::default());
        let mut suite = suite();
        let err = generator
            .generate(&mut suite, &mut Vec::<Variant>::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VariantLoad);
        assert_eq!(suite.assertion_count(), 0);
    }

    #[test]
    fn record_dump_replays_to_same_result() {
        let executor = ScriptedExecutor::new()
            .with_default_return(TestCaseId(1), 1, 3)
            .with_return(VariantIndex(1), TestCaseId(1), 1, Value::from(4));
        let mut generator = OracleGenerator::new(executor, OracleConfig::default());
        let suite = suite();
        let dump = generator
            .record_dump(&suite, &mut vec![Variant::mutant(1, "m1")])
            .unwrap();
        assert!(dump.validate().is_empty());

        let (store, mut replayed) = dump.into_parts();
        OracleSynthesizer::new(OracleConfig::default().synthesis)
            .synthesize(&store, &mut replayed)
            .unwrap();
        assert_eq!(replayed.assertion_count(), 1);
    }
}
