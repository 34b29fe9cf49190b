//! Object-identity recovery from positional test-case structure.
//!
//! There is no object graph: the object a field observation belongs to is the
//! result of the closest constructor statement at or before the observed
//! position.

use crate::reflection::{OwnerResolver, TypeRef};
use crate::testcase::{TestCase, VariableRef};

/// Result reference of the nearest constructor statement at or before `position`.
///
/// Returns `None` when no constructor precedes `position`. Positions past the
/// end of the test case are clamped to its last statement.
#[must_use]
pub fn nearest_constructor(test_case: &TestCase, position: usize) -> Option<&VariableRef> {
    let end = position.saturating_add(1).min(test_case.len());
    test_case.statements()[..end]
        .iter()
        .rev()
        .find(|statement| statement.is_constructor())
        .map(|statement| statement.ret_val())
}

/// Declared type of the object owning fields observed at `position`.
///
/// Absent when there is no owning constructor or its type is unknown.
#[must_use]
pub fn resolve_owner<R>(resolver: &R, test_case: &TestCase, position: usize) -> Option<TypeRef>
where
    R: OwnerResolver + ?Sized,
{
    nearest_constructor(test_case, position).and_then(|owner| resolver.resolve_owner(owner))
}
