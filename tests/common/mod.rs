//! Shared helpers for integration tests.

#![allow(dead_code, unused_imports)]

pub use mutoracle::test_utils::{DEFAULT_TEST_SEED, ScriptedExecutor, init_test_logging};
pub use mutoracle::{assert_with_log, test_complete, test_phase, test_section};

use mutoracle::testcase::{TestCase, TestCaseId, TestSuite};
use mutoracle::{OracleConfig, OracleGenerator, TypeRef, Variant};

/// Test case of `n` literal statements, `0..n`.
pub fn literals(id: u64, n: usize) -> TestCase {
    let mut tc = TestCase::new(TestCaseId(id));
    for i in 0..n {
        tc.push_primitive(i as i64);
    }
    tc
}

/// `bar.Foo()` followed by `size()` on it.
pub fn foo_case(id: u64) -> TestCase {
    let foo = TypeRef::new("bar", "Foo");
    let mut tc = TestCase::new(TestCaseId(id));
    tc.push_constructor(foo.clone(), vec![]);
    tc.push_method(0, foo, "size", vec![]);
    tc
}

/// Mutants `1..=n`.
pub fn mutants(n: u32) -> Vec<Variant> {
    (1..=n).map(|i| Variant::mutant(i, format!("m{i}"))).collect()
}

/// Renders the assertions of every statement of every test case.
pub fn rendered(suite: &TestSuite) -> Vec<Vec<Vec<String>>> {
    suite
        .test_cases()
        .iter()
        .map(|tc| {
            tc.statements()
                .iter()
                .map(|s| s.assertions().iter().map(ToString::to_string).collect())
                .collect()
        })
        .collect()
}

/// Generator over `executor` with default configuration.
pub fn generator(executor: ScriptedExecutor) -> OracleGenerator<ScriptedExecutor> {
    OracleGenerator::new(executor, OracleConfig::default())
}
