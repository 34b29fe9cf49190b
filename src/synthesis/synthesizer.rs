//! The comparison walk: reference observation by reference observation,
//! mutant by mutant, in a fixed order.
//!
//! For each reference observation `R` at `(test, pos)` and each mutant
//! observation `M` at the same key, ascending by mutant index:
//!
//! 1. return value: `M != R` yields `assert ret_val == R`, unless the value
//!    assertion emitted just before at this position expects the same value;
//! 2. globals: every `(module, field)` of `R` that differs in `M` yields a
//!    module-scoped field assertion, once per pass;
//! 3. fragments: every field of every fragment of `R` that differs in `M`
//!    yields a class-scoped (`class_field`) or instance-scoped
//!    (`object_attribute`) field assertion, once per pass.
//!
//! A mutant without an observation at the key is skipped.

use std::collections::BTreeSet;

use crate::assertion::{Assertion, FieldAssertion, ValueAssertion};
use crate::config::SynthesisConfig;
use crate::error::Result;
use crate::reflection::{DeclaredTypeResolver, OwnerResolver, TypeRef};
use crate::snapshot::{FragmentKind, Observation, ObservationKey, SnapshotStore, VariantIndex};
use crate::testcase::{TestCase, TestCaseId, TestSuite, VariableRef};
use crate::tracing_compat::{debug, debug_span, info, trace};

use super::locator::{nearest_constructor, resolve_owner};
use super::pass::SynthesisPass;
use super::report::{EmissionCounts, SynthesisReport};
use super::SynthesisError;

/// Attaches mutant-killing assertions to the statements of a test suite.
#[derive(Debug, Clone, Default)]
pub struct OracleSynthesizer<R = DeclaredTypeResolver> {
    config: SynthesisConfig,
    resolver: R,
}

impl OracleSynthesizer<DeclaredTypeResolver> {
    /// Creates a synthesizer resolving owners from declared types.
    #[must_use]
    pub fn new(config: SynthesisConfig) -> Self {
        Self {
            config,
            resolver: DeclaredTypeResolver,
        }
    }
}

impl<R: OwnerResolver> OracleSynthesizer<R> {
    /// Creates a synthesizer with a custom owner resolver.
    #[must_use]
    pub fn with_resolver(config: SynthesisConfig, resolver: R) -> Self {
        Self { config, resolver }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Runs a fresh pass over `store` and attaches assertions to `suite`.
    pub fn synthesize(&self, store: &SnapshotStore, suite: &mut TestSuite) -> Result<SynthesisReport> {
        let mut pass = SynthesisPass::new();
        self.synthesize_with(store, suite, &mut pass)
    }

    /// Like [`synthesize`](Self::synthesize), sharing dedup state with `pass`.
    ///
    /// Test cases are walked in suite order and positions in ascending order,
    /// so a field assertion deduplicated across the pass lands on the first
    /// test case of the suite that exposes it. A test case repeating an
    /// earlier id is not visited again.
    ///
    /// On an invariant breach the error is returned immediately; assertions
    /// attached at earlier positions stay attached, the failing position gets
    /// none. Reference observations for unknown test cases are rejected before
    /// anything is attached.
    pub fn synthesize_with(
        &self,
        store: &SnapshotStore,
        suite: &mut TestSuite,
        pass: &mut SynthesisPass,
    ) -> Result<SynthesisReport> {
        let _span = debug_span!("synthesis").entered();
        let mut report = SynthesisReport::new(store.variants());

        let known: BTreeSet<TestCaseId> = suite.test_cases().iter().map(TestCase::id).collect();
        if let Some((key, _)) = store
            .observations_for(VariantIndex::REFERENCE)
            .find(|(key, _)| !known.contains(&key.test_id))
        {
            return Err(SynthesisError::MissingTestCase {
                test_id: key.test_id,
            }
            .into());
        }

        let mut visited = BTreeSet::new();
        for index in 0..suite.len() {
            let test_id = suite.test_cases()[index].id();
            if !visited.insert(test_id) {
                continue;
            }
            for (key, reference) in store.observations_in(VariantIndex::REFERENCE, test_id) {
                let (assertions, counts, killed) =
                    self.compare_position(store, &suite.test_cases()[index], key, reference, pass)?;

                if let Some(statement) = suite.test_cases_mut()[index].statement_mut(key.position)
                {
                    for assertion in assertions {
                        statement.add_assertion(assertion);
                    }
                }

                let entry = report.test_mut(key.test_id);
                entry.positions += 1;
                entry.counts.value += counts.value;
                entry.counts.global += counts.global;
                entry.counts.field += counts.field;
                entry.counts.suppressed += counts.suppressed;
                entry.killed.extend(killed);
            }
        }

        info!(
            emitted = report.emitted(),
            suppressed = report.suppressed(),
            killed = report.killed().len(),
            mutants = report.total_mutants(),
            "synthesis finished"
        );
        Ok(report)
    }

    /// Diffs one reference observation against every mutant observation at
    /// its key. Returns the assertions to attach, in attachment order.
    fn compare_position(
        &self,
        store: &SnapshotStore,
        test_case: &TestCase,
        key: ObservationKey,
        reference: &Observation,
        pass: &mut SynthesisPass,
    ) -> Result<(Vec<Assertion>, EmissionCounts, Vec<VariantIndex>)> {
        let statement =
            test_case
                .statement(key.position)
                .ok_or(SynthesisError::MissingStatement {
                    test_id: key.test_id,
                    position: key.position,
                })?;

        let mut emit = Emission {
            key,
            ret_val: statement.ret_val(),
            owner: OwnerContext::new(test_case, key.position),
            assertions: Vec::new(),
            counts: EmissionCounts::default(),
        };
        let mut killed = Vec::new();

        pass.reset_cursor();
        for (variant, mutant) in store.observations_at(key) {
            let mut differs = false;
            if self.config.compare_return_values {
                differs |= self.compare_return_value(&mut emit, pass, reference, mutant);
            }
            if self.config.compare_globals {
                differs |= Self::compare_globals(&mut emit, pass, reference, mutant);
            }
            if self.config.compare_fragments {
                differs |= self.compare_fragments(&mut emit, pass, reference, mutant, variant)?;
            }
            if differs {
                killed.push(variant);
            }
            trace!(
                %key,
                variant = variant.0,
                differs,
                attached = emit.assertions.len(),
                "compared mutant"
            );
        }

        debug!(
            test_id = key.test_id.0,
            position = key.position,
            mutants = store.observations_at(key).count(),
            emitted = emit.assertions.len(),
            "compared reference observation"
        );
        Ok((emit.assertions, emit.counts, killed))
    }

    fn compare_return_value(
        &self,
        emit: &mut Emission<'_>,
        pass: &mut SynthesisPass,
        reference: &Observation,
        mutant: &Observation,
    ) -> bool {
        if mutant.return_value == reference.return_value {
            return false;
        }
        if self.config.coalesce_value_assertions && pass.repeats_last_value(&reference.return_value)
        {
            trace!(key = %emit.key, "coalesced value assertion");
            emit.counts.suppressed += 1;
            return true;
        }
        let assertion = ValueAssertion::new(emit.ret_val.clone(), reference.return_value.clone());
        pass.set_last_value(assertion.clone());
        emit.counts.value += 1;
        emit.assertions.push(assertion.into());
        true
    }

    fn compare_globals(
        emit: &mut Emission<'_>,
        pass: &mut SynthesisPass,
        reference: &Observation,
        mutant: &Observation,
    ) -> bool {
        let mut differs = false;
        for (module, fields) in &reference.globals {
            for (field, expected) in fields {
                if mutant.global(module, field) == Some(expected) {
                    continue;
                }
                differs = true;
                let assertion = FieldAssertion::global(module.clone(), field.clone(), expected.clone());
                if pass.admit_global(&assertion) {
                    emit.counts.global += 1;
                    emit.assertions.push(assertion.into());
                } else {
                    emit.counts.suppressed += 1;
                }
            }
        }
        differs
    }

    fn compare_fragments(
        &self,
        emit: &mut Emission<'_>,
        pass: &mut SynthesisPass,
        reference: &Observation,
        mutant: &Observation,
        variant: VariantIndex,
    ) -> Result<bool> {
        let key = emit.key;
        let missing = |fragment: String| SynthesisError::MissingFragment {
            test_id: key.test_id,
            position: key.position,
            fragment,
            variant,
        };

        let mut differs = false;
        for (label, ref_fragment) in &reference.fragments {
            let mut_fragment = mutant
                .fragments
                .get(label)
                .ok_or_else(|| missing(label.clone()))?;
            for (kind, ref_fields) in ref_fragment.sections() {
                let mut_fields = mut_fragment
                    .section(kind)
                    .ok_or_else(|| missing(format!("{label}/{}", kind.as_str())))?;
                for (field, expected) in ref_fields {
                    if mut_fields.get(field) == Some(expected) {
                        continue;
                    }
                    differs = true;
                    let assertion = match kind {
                        FragmentKind::ClassField => {
                            let owner = emit.owner.owner_type(&self.resolver);
                            FieldAssertion::class_field(
                                owner.map(|t| t.module.clone()),
                                owner.map(|t| t.name.clone()),
                                field.clone(),
                                expected.clone(),
                            )
                        }
                        FragmentKind::ObjectAttribute => FieldAssertion::instance(
                            emit.owner.object().cloned(),
                            field.clone(),
                            expected.clone(),
                        ),
                    };
                    if pass.admit_field(&assertion) {
                        emit.counts.field += 1;
                        emit.assertions.push(assertion.into());
                    } else {
                        emit.counts.suppressed += 1;
                    }
                }
            }
        }
        Ok(differs)
    }
}

/// Assertions produced for one reference observation.
struct Emission<'a> {
    key: ObservationKey,
    ret_val: &'a VariableRef,
    owner: OwnerContext<'a>,
    assertions: Vec<Assertion>,
    counts: EmissionCounts,
}

/// Owning object of the observed position, located on first use.
struct OwnerContext<'a> {
    test_case: &'a TestCase,
    position: usize,
    object: Option<Option<&'a VariableRef>>,
    owner_type: Option<Option<TypeRef>>,
}

impl<'a> OwnerContext<'a> {
    const fn new(test_case: &'a TestCase, position: usize) -> Self {
        Self {
            test_case,
            position,
            object: None,
            owner_type: None,
        }
    }

    fn object(&mut self) -> Option<&'a VariableRef> {
        let (test_case, position) = (self.test_case, self.position);
        *self
            .object
            .get_or_insert_with(|| nearest_constructor(test_case, position))
    }

    fn owner_type<R: OwnerResolver>(&mut self, resolver: &R) -> Option<&TypeRef> {
        let (test_case, position) = (self.test_case, self.position);
        self.owner_type
            .get_or_insert_with(|| resolve_owner(resolver, test_case, position))
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::FieldScope;
    use crate::error::ErrorKind;
    use crate::reflection::TypeRegistry;
    use crate::snapshot::Fragment;

    const T: TestCaseId = TestCaseId(1);

    fn key(pos: usize) -> ObservationKey {
        ObservationKey::new(T, pos)
    }

    fn foo() -> TypeRef {
        TypeRef::new("bar", "Foo")
    }

    /// 0: var_0 = 1
    /// 1: var_1 = bar.Foo(var_0)
    /// 2: var_2 = var_1.size()
    fn suite() -> TestSuite {
        let mut tc = TestCase::new(T);
        tc.push_primitive(1);
        tc.push_constructor(foo(), vec![0]);
        tc.push_method(1, foo(), "size", vec![]);
        TestSuite::from_test_cases(vec![tc])
    }

    fn synthesizer() -> OracleSynthesizer {
        OracleSynthesizer::new(SynthesisConfig::default())
    }

    fn assertions(suite: &TestSuite, pos: usize) -> Vec<String> {
        suite.test_cases()[0]
            .statement(pos)
            .unwrap()
            .assertions()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn identical_mutant_yields_nothing() {
        let mut store = SnapshotStore::new();
        for v in 0..3 {
            store.record(VariantIndex(v), key(2), Observation::new(5).with_global("bar", "N", 1));
        }
        let mut suite = suite();
        let report = synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(suite.assertion_count(), 0);
        assert!(report.killed().is_empty());
        assert_eq!(report.total_mutants(), 2);
    }

    #[test]
    fn differing_return_value_is_asserted() {
        let mut store = SnapshotStore::new();
        store.record(VariantIndex(0), key(2), Observation::new(5));
        store.record(VariantIndex(1), key(2), Observation::new(6));
        let mut suite = suite();
        let report = synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(assertions(&suite, 2), vec!["assert var_2 == 5"]);
        assert_eq!(report.counts().value, 1);
        assert!((report.mutation_score() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn consecutive_equal_value_assertions_coalesce() {
        let mut store = SnapshotStore::new();
        store.record(VariantIndex(0), key(2), Observation::new(5));
        for v in 1..=3 {
            store.record(VariantIndex(v), key(2), Observation::new(9));
        }
        let mut suite = suite();
        let report = synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(suite.assertion_count(), 1);
        assert_eq!(report.suppressed(), 2);
        assert_eq!(report.killed().len(), 3);
    }

    #[test]
    fn coalescing_can_be_disabled() {
        let mut store = SnapshotStore::new();
        store.record(VariantIndex(0), key(2), Observation::new(5));
        store.record(VariantIndex(1), key(2), Observation::new(9));
        store.record(VariantIndex(2), key(2), Observation::new(8));
        let mut suite = suite();
        let config = SynthesisConfig {
            coalesce_value_assertions: false,
            ..SynthesisConfig::default()
        };
        OracleSynthesizer::new(config)
            .synthesize(&store, &mut suite)
            .unwrap();
        assert_eq!(suite.assertion_count(), 2);
    }

    #[test]
    fn global_difference_is_module_scoped_and_deduplicated() {
        let mut store = SnapshotStore::new();
        let reference = Observation::no_value().with_global("bar", "LIMIT", 9);
        let changed = Observation::no_value().with_global("bar", "LIMIT", 10);
        store.record(VariantIndex(0), key(0), reference.clone());
        store.record(VariantIndex(0), key(2), reference);
        for v in 1..=2 {
            store.record(VariantIndex(v), key(0), changed.clone());
            store.record(VariantIndex(v), key(2), changed.clone());
        }
        let mut suite = suite();
        let report = synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(assertions(&suite, 0), vec!["assert bar.LIMIT == 9"]);
        assert!(assertions(&suite, 2).is_empty());
        assert_eq!(report.counts().global, 1);
        assert_eq!(report.suppressed(), 3);
    }

    #[test]
    fn global_missing_in_mutant_is_a_mismatch() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            key(0),
            Observation::no_value().with_global("bar", "LIMIT", 9),
        );
        store.record(VariantIndex(1), key(0), Observation::no_value());
        let mut suite = suite();
        synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(assertions(&suite, 0), vec!["assert bar.LIMIT == 9"]);
    }

    #[test]
    fn class_field_assertion_names_owning_class() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            key(2),
            Observation::new(0).with_class_field("o", "n", 1),
        );
        store.record(
            VariantIndex(1),
            key(2),
            Observation::new(0).with_class_field("o", "n", 2),
        );
        let mut suite = suite();
        synthesizer().synthesize(&store, &mut suite).unwrap();

        let stmt = suite.test_cases()[0].statement(2).unwrap();
        let field = stmt.assertions()[0].as_field().unwrap();
        assert_eq!(field.scope(), FieldScope::Class {
            module: Some("bar"),
            class: "Foo"
        });
        assert!(field.source().is_none());
        assert_eq!(assertions(&suite, 2), vec!["assert bar.Foo.n == 1"]);
    }

    #[test]
    fn object_attribute_assertion_binds_nearest_constructor() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            key(2),
            Observation::new(0).with_object_attribute("o", "count", 3),
        );
        store.record(
            VariantIndex(1),
            key(2),
            Observation::new(0).with_object_attribute("o", "count", 4),
        );
        let mut suite = suite();
        synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(assertions(&suite, 2), vec!["assert var_1.count == 3"]);
    }

    #[test]
    fn unresolvable_owner_degrades_to_unscoped() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            key(0),
            Observation::no_value()
                .with_class_field("o", "n", 1)
                .with_object_attribute("o", "a", 1),
        );
        store.record(
            VariantIndex(1),
            key(0),
            Observation::no_value()
                .with_class_field("o", "n", 2)
                .with_object_attribute("o", "a", 2),
        );
        let mut suite = suite();
        synthesizer().synthesize(&store, &mut suite).unwrap();
        let stmt = suite.test_cases()[0].statement(0).unwrap();
        assert_eq!(stmt.assertions().len(), 2);
        for assertion in stmt.assertions() {
            assert_eq!(assertion.as_field().unwrap().scope(), FieldScope::Unscoped);
        }
    }

    #[test]
    fn same_field_in_both_sections_is_asserted_twice_without_owner() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            key(0),
            Observation::no_value()
                .with_class_field("o", "n", 1)
                .with_object_attribute("o", "n", 1),
        );
        store.record(
            VariantIndex(1),
            key(0),
            Observation::no_value()
                .with_class_field("o", "n", 2)
                .with_object_attribute("o", "n", 2),
        );
        let mut suite = suite();
        let report = synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(assertions(&suite, 0), vec!["assert n == 1", "assert n == 1"]);
        assert_eq!(report.counts().field, 2);
        assert_eq!(report.suppressed(), 0);
    }

    #[test]
    fn deduplicated_global_lands_on_first_test_case_in_suite_order() {
        let (first, second) = (TestCaseId(9), TestCaseId(2));
        let mut suite = TestSuite::new();
        for id in [first, second] {
            let mut tc = TestCase::new(id);
            tc.push_primitive(0);
            suite.push(tc);
        }
        let mut store = SnapshotStore::new();
        for id in [first, second] {
            let key = ObservationKey::new(id, 0);
            store.record(VariantIndex(0), key, Observation::no_value().with_global("m", "g", 1));
            store.record(VariantIndex(1), key, Observation::no_value().with_global("m", "g", 2));
        }

        let report = synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(suite.test_cases()[0].assertion_count(), 1);
        assert_eq!(suite.test_cases()[1].assertion_count(), 0);
        assert_eq!(report.test(first).map(|t| t.counts.global), Some(1));
        assert_eq!(report.test(second).map(|t| t.counts.suppressed), Some(1));
    }

    #[test]
    fn registry_resolver_overrides_declared_type() {
        let mut store = SnapshotStore::new();
        store.record(VariantIndex(0), key(1), Observation::no_value().with_class_field("o", "n", 1));
        store.record(VariantIndex(1), key(1), Observation::no_value().with_class_field("o", "n", 0));
        let mut suite = suite();
        let mut registry = TypeRegistry::new();
        registry.register(
            VariableRef::new(T, 1).with_type(foo()),
            TypeRef::new("baz", "Sub"),
        );
        OracleSynthesizer::with_resolver(SynthesisConfig::default(), registry)
            .synthesize(&store, &mut suite)
            .unwrap();
        assert_eq!(assertions(&suite, 1), vec!["assert baz.Sub.n == 1"]);
    }

    #[test]
    fn absent_mutant_observation_is_skipped() {
        let mut store = SnapshotStore::new();
        store.record(VariantIndex(0), key(2), Observation::new(5));
        store.record(VariantIndex(1), key(1), Observation::new(5));
        let mut suite = suite();
        let report = synthesizer().synthesize(&store, &mut suite).unwrap();
        assert_eq!(suite.assertion_count(), 0);
        assert_eq!(report.survived().len(), 1);
    }

    #[test]
    fn missing_test_case_is_fatal() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            ObservationKey::new(TestCaseId(42), 0),
            Observation::new(1),
        );
        let err = synthesizer().synthesize(&store, &mut suite()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingTestCase);
        assert!(err.context().unwrap().contains("T42"));
    }

    #[test]
    fn missing_statement_is_fatal() {
        let mut store = SnapshotStore::new();
        store.record(VariantIndex(0), key(7), Observation::new(1));
        let err = synthesizer().synthesize(&store, &mut suite()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingStatement);
        assert!(err.context().unwrap().contains("position 7"));
    }

    #[test]
    fn missing_fragment_is_fatal() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            key(2),
            Observation::new(0).with_object_attribute("o", "count", 3),
        );
        store.record(VariantIndex(1), key(2), Observation::new(0));
        let err = synthesizer().synthesize(&store, &mut suite()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingFragment);
    }

    #[test]
    fn missing_fragment_section_is_fatal() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            key(2),
            Observation::new(0).with_object_attribute("o", "count", 3),
        );
        store.record(
            VariantIndex(1),
            key(2),
            Observation::new(0).with_fragment("o", Fragment::new().with_section(FragmentKind::ClassField)),
        );
        let err = synthesizer().synthesize(&store, &mut suite()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingFragment);
        assert!(err.context().unwrap().contains("o/object_attribute"));
    }

    #[test]
    fn disabled_categories_are_not_compared() {
        let mut store = SnapshotStore::new();
        store.record(
            VariantIndex(0),
            key(2),
            Observation::new(5).with_global("bar", "N", 1),
        );
        store.record(
            VariantIndex(1),
            key(2),
            Observation::new(6).with_global("bar", "N", 2),
        );
        let mut suite = suite();
        let config = SynthesisConfig {
            compare_return_values: false,
            ..SynthesisConfig::default()
        };
        OracleSynthesizer::new(config)
            .synthesize(&store, &mut suite)
            .unwrap();
        assert_eq!(assertions(&suite, 2), vec!["assert bar.N == 1"]);
    }
}
