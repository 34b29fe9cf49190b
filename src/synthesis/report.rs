//! Outcome of a synthesis run: what was attached, what was suppressed, and
//! which mutants the oracles distinguish.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use serde_json::json;

use crate::snapshot::VariantIndex;
use crate::testcase::TestCaseId;

/// Assertion counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmissionCounts {
    /// Value assertions attached.
    pub value: usize,
    /// Global field assertions attached.
    pub global: usize,
    /// Class-field and object-attribute assertions attached.
    pub field: usize,
    /// Candidate assertions dropped by coalescing or dedup.
    pub suppressed: usize,
}

impl EmissionCounts {
    /// Total attached assertions.
    #[must_use]
    pub const fn emitted(&self) -> usize {
        self.value + self.global + self.field
    }

    fn absorb(&mut self, other: Self) {
        self.value += other.value;
        self.global += other.global;
        self.field += other.field;
        self.suppressed += other.suppressed;
    }
}

/// Per-test-case synthesis results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSynthesis {
    /// Reference observations visited.
    pub positions: usize,
    /// Assertion counts.
    pub counts: EmissionCounts,
    /// Mutants with at least one observed difference in this test case.
    pub killed: BTreeSet<VariantIndex>,
}

/// Report for a full synthesis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisReport {
    tests: BTreeMap<TestCaseId, TestSynthesis>,
    mutants: BTreeSet<VariantIndex>,
}

impl SynthesisReport {
    pub(crate) fn new(mutants: impl IntoIterator<Item = VariantIndex>) -> Self {
        Self {
            tests: BTreeMap::new(),
            mutants: mutants.into_iter().filter(|v| !v.is_reference()).collect(),
        }
    }

    pub(crate) fn test_mut(&mut self, test_id: TestCaseId) -> &mut TestSynthesis {
        self.tests.entry(test_id).or_default()
    }

    /// Widens the mutant population, e.g. with mutants that produced no
    /// observation at all.
    pub fn include_mutants(&mut self, mutants: impl IntoIterator<Item = VariantIndex>) {
        self.mutants
            .extend(mutants.into_iter().filter(|v| !v.is_reference()));
    }

    /// Per-test results ordered by test id.
    #[must_use]
    pub fn tests(&self) -> &BTreeMap<TestCaseId, TestSynthesis> {
        &self.tests
    }

    /// Results for one test case.
    #[must_use]
    pub fn test(&self, test_id: TestCaseId) -> Option<&TestSynthesis> {
        self.tests.get(&test_id)
    }

    /// Summed counts across all test cases.
    #[must_use]
    pub fn counts(&self) -> EmissionCounts {
        let mut total = EmissionCounts::default();
        for test in self.tests.values() {
            total.absorb(test.counts);
        }
        total
    }

    /// Total attached assertions.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.counts().emitted()
    }

    /// Total suppressed candidates.
    #[must_use]
    pub fn suppressed(&self) -> usize {
        self.counts().suppressed
    }

    /// Mutants distinguished by at least one test case, ascending.
    #[must_use]
    pub fn killed(&self) -> BTreeSet<VariantIndex> {
        self.tests
            .values()
            .flat_map(|t| t.killed.iter().copied())
            .collect()
    }

    /// Mutants never distinguished, ascending.
    #[must_use]
    pub fn survived(&self) -> BTreeSet<VariantIndex> {
        let killed = self.killed();
        self.mutants.difference(&killed).copied().collect()
    }

    /// Size of the mutant population.
    #[must_use]
    pub fn total_mutants(&self) -> usize {
        self.mutants.len()
    }

    /// Killed mutants over all mutants; `0.0` without mutants.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mutation_score(&self) -> f64 {
        if self.mutants.is_empty() {
            0.0
        } else {
            self.killed().len() as f64 / self.mutants.len() as f64
        }
    }

    /// Renders a human-readable report.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let counts = self.counts();
        let _ = writeln!(
            &mut out,
            "synthesis report: {} assertions ({} value, {} global, {} field), {} suppressed",
            counts.emitted(),
            counts.value,
            counts.global,
            counts.field,
            counts.suppressed
        );
        let _ = writeln!(
            &mut out,
            "mutation score: {:.3} ({} of {} mutants killed)",
            self.mutation_score(),
            self.killed().len(),
            self.total_mutants()
        );
        for (test_id, test) in &self.tests {
            let _ = writeln!(
                &mut out,
                "{test_id}: {} positions, {} assertions, {} suppressed, killed [{}]",
                test.positions,
                test.counts.emitted(),
                test.counts.suppressed,
                join(&test.killed)
            );
        }
        let survived = self.survived();
        if !survived.is_empty() {
            let _ = writeln!(&mut out, "survived: [{}]", join(&survived));
        }
        out
    }

    /// Renders a JSON report.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let counts = self.counts();
        let tests = self
            .tests
            .iter()
            .map(|(test_id, test)| {
                json!({
                    "test_id": test_id.0,
                    "positions": test.positions,
                    "value": test.counts.value,
                    "global": test.counts.global,
                    "field": test.counts.field,
                    "suppressed": test.counts.suppressed,
                    "killed": test.killed.iter().map(|v| v.0).collect::<Vec<_>>(),
                })
            })
            .collect::<Vec<_>>();
        json!({
            "summary": {
                "emitted": counts.emitted(),
                "value": counts.value,
                "global": counts.global,
                "field": counts.field,
                "suppressed": counts.suppressed,
                "mutants": self.total_mutants(),
                "killed": self.killed().iter().map(|v| v.0).collect::<Vec<_>>(),
                "survived": self.survived().iter().map(|v| v.0).collect::<Vec<_>>(),
                "mutation_score": self.mutation_score(),
            },
            "tests": tests,
        })
    }
}

fn join(set: &BTreeSet<VariantIndex>) -> String {
    set.iter()
        .map(|v| v.0.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SynthesisReport {
        let mut report = SynthesisReport::new([VariantIndex(0), VariantIndex(1), VariantIndex(2)]);
        let t = report.test_mut(TestCaseId(1));
        t.positions = 3;
        t.counts.value = 2;
        t.counts.suppressed = 1;
        t.killed.insert(VariantIndex(1));
        let t = report.test_mut(TestCaseId(2));
        t.counts.field = 1;
        t.killed.insert(VariantIndex(1));
        report
    }

    #[test]
    fn score_counts_distinct_kills() {
        let report = sample();
        assert_eq!(report.total_mutants(), 2);
        assert_eq!(report.killed(), BTreeSet::from([VariantIndex(1)]));
        assert_eq!(report.survived(), BTreeSet::from([VariantIndex(2)]));
        assert!((report.mutation_score() - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.emitted(), 3);
        assert_eq!(report.suppressed(), 1);
    }

    #[test]
    fn empty_population_scores_zero() {
        let report = SynthesisReport::default();
        assert!(report.mutation_score().abs() < f64::EPSILON);
    }

    #[test]
    fn include_mutants_widens_population() {
        let mut report = sample();
        report.include_mutants([VariantIndex(3), VariantIndex::REFERENCE]);
        assert_eq!(report.total_mutants(), 3);
    }

    #[test]
    fn renders_text_and_json() {
        let report = sample();
        let text = report.to_text();
        assert!(text.contains("3 assertions (2 value, 0 global, 1 field), 1 suppressed"));
        assert!(text.contains("T1: 3 positions"));
        assert!(text.contains("survived: [2]"));

        let json = report.to_json();
        assert_eq!(json["summary"]["emitted"], 3);
        assert_eq!(json["summary"]["killed"][0], 1);
        assert_eq!(json["tests"][1]["test_id"], 2);
    }
}
