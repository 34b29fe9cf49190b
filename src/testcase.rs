//! Test-case model: statements indexed by position, result references, and
//! the assertions attached to them.
//!
//! A [`TestCase`] is an arena of [`Statement`]s; a statement's position in that
//! arena is its identity. Object ownership is recovered purely from positions
//! (see [`crate::synthesis::locator`]), never from an object graph.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::assertion::Assertion;
use crate::reflection::{AccessibleObject, TypeRef};
use crate::value::Value;

/// Stable identifier of a test case across all variant executions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TestCaseId(pub u64);

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Reference to the value produced by one statement of one test case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableRef {
    test_case: TestCaseId,
    position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    declared_type: Option<TypeRef>,
}

impl VariableRef {
    /// Creates an untyped reference to statement `position` of `test_case`.
    #[must_use]
    pub const fn new(test_case: TestCaseId, position: usize) -> Self {
        Self {
            test_case,
            position,
            declared_type: None,
        }
    }

    /// Attaches the declared type of the referenced value.
    #[must_use]
    pub fn with_type(mut self, declared_type: TypeRef) -> Self {
        self.declared_type = Some(declared_type);
        self
    }

    /// The owning test case.
    #[must_use]
    pub const fn test_case(&self) -> TestCaseId {
        self.test_case
    }

    /// Position of the producing statement.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Declared type of the referenced value, if known.
    #[must_use]
    pub fn declared_type(&self) -> Option<&TypeRef> {
        self.declared_type.as_ref()
    }
}

impl fmt::Display for VariableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var_{}", self.position)
    }
}

/// What a statement does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    /// Binds a literal.
    Primitive {
        /// The literal.
        value: Value,
    },
    /// Invokes a constructor, method, function, or reads a field.
    Call {
        /// What is invoked.
        callee: AccessibleObject,
        /// Position of the receiver statement for methods and fields.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        receiver: Option<usize>,
        /// Positions of the argument statements.
        #[serde(default)]
        args: Vec<usize>,
    },
    /// Copies the value of one statement into another slot.
    Assignment {
        /// Position of the source statement.
        source: usize,
    },
}

/// One statement of a test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    kind: StatementKind,
    ret_val: VariableRef,
    #[serde(default)]
    assertions: Vec<Assertion>,
}

impl Statement {
    /// The statement kind.
    #[must_use]
    pub const fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// Reference to the value this statement produces.
    #[must_use]
    pub const fn ret_val(&self) -> &VariableRef {
        &self.ret_val
    }

    /// Returns true if this statement constructs an object.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        matches!(&self.kind, StatementKind::Call { callee, .. } if callee.is_constructor())
    }

    /// Appends an assertion.
    pub fn add_assertion(&mut self, assertion: Assertion) {
        self.assertions.push(assertion);
    }

    /// Assertions attached so far, in attachment order.
    #[must_use]
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }
}

/// An ordered sequence of statements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    id: TestCaseId,
    #[serde(default)]
    statements: Vec<Statement>,
}

impl TestCase {
    /// Creates an empty test case.
    #[must_use]
    pub const fn new(id: TestCaseId) -> Self {
        Self {
            id,
            statements: Vec::new(),
        }
    }

    /// The test case identifier.
    #[must_use]
    pub const fn id(&self) -> TestCaseId {
        self.id
    }

    /// Appends a statement and returns the reference to its result.
    ///
    /// The result is typed with the callee's generated type when known.
    pub fn push(&mut self, kind: StatementKind) -> VariableRef {
        let mut ret_val = VariableRef::new(self.id, self.statements.len());
        if let StatementKind::Call { callee, .. } = &kind {
            if let Some(generated) = callee.generated_type() {
                ret_val = ret_val.with_type(generated.clone());
            }
        }
        self.statements.push(Statement {
            kind,
            ret_val: ret_val.clone(),
            assertions: Vec::new(),
        });
        ret_val
    }

    /// Appends a literal.
    pub fn push_primitive(&mut self, value: impl Into<Value>) -> VariableRef {
        self.push(StatementKind::Primitive {
            value: value.into(),
        })
    }

    /// Appends a constructor call of `owner`.
    pub fn push_constructor(&mut self, owner: TypeRef, args: Vec<usize>) -> VariableRef {
        self.push(StatementKind::Call {
            callee: AccessibleObject::Constructor { owner },
            receiver: None,
            args,
        })
    }

    /// Appends a method call on the statement at `receiver`.
    pub fn push_method(
        &mut self,
        receiver: usize,
        owner: TypeRef,
        name: impl Into<String>,
        args: Vec<usize>,
    ) -> VariableRef {
        self.push(StatementKind::Call {
            callee: AccessibleObject::Method {
                owner,
                name: name.into(),
                returns: None,
            },
            receiver: Some(receiver),
            args,
        })
    }

    /// Appends a free function call.
    pub fn push_function(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        args: Vec<usize>,
    ) -> VariableRef {
        self.push(StatementKind::Call {
            callee: AccessibleObject::Function {
                module: module.into(),
                name: name.into(),
                returns: None,
            },
            receiver: None,
            args,
        })
    }

    /// The statement at `position`, if in range.
    #[must_use]
    pub fn statement(&self, position: usize) -> Option<&Statement> {
        self.statements.get(position)
    }

    /// Mutable access to the statement at `position`, if in range.
    pub fn statement_mut(&mut self, position: usize) -> Option<&mut Statement> {
        self.statements.get_mut(position)
    }

    /// All statements in order.
    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Returns true if the test case has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Total number of attached assertions.
    #[must_use]
    pub fn assertion_count(&self) -> usize {
        self.statements.iter().map(|s| s.assertions.len()).sum()
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[usize]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "var_{arg}")?;
    }
    Ok(())
}

fn write_call(
    f: &mut fmt::Formatter<'_>,
    callee: &AccessibleObject,
    receiver: Option<usize>,
    args: &[usize],
) -> fmt::Result {
    match (callee, receiver) {
        (AccessibleObject::Field { field, .. }, Some(r)) => return write!(f, "var_{r}.{field}"),
        (AccessibleObject::Constructor { owner }, _) => write!(f, "{owner}(")?,
        (AccessibleObject::Method { name, .. }, Some(r)) => write!(f, "var_{r}.{name}(")?,
        (AccessibleObject::Function { module, name, .. }, _) => write!(f, "{module}.{name}(")?,
        (other, None) => write!(f, "{other}(")?,
    }
    write_args(f, args)?;
    f.write_str(")")
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "def test_{}():", self.id.0)?;
        if self.statements.is_empty() {
            writeln!(f, "    pass")?;
        }
        for statement in &self.statements {
            write!(f, "    {} = ", statement.ret_val)?;
            match &statement.kind {
                StatementKind::Primitive { value } => write!(f, "{value}")?,
                StatementKind::Assignment { source } => write!(f, "var_{source}")?,
                StatementKind::Call {
                    callee,
                    receiver,
                    args,
                } => write_call(f, callee, *receiver, args)?,
            }
            writeln!(f)?;
            for assertion in &statement.assertions {
                writeln!(f, "    {assertion}")?;
            }
        }
        Ok(())
    }
}

/// An ordered collection of test cases analysed together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    test_cases: Vec<TestCase>,
}

impl TestSuite {
    /// Creates an empty suite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a suite from test cases, keeping their order.
    #[must_use]
    pub fn from_test_cases(test_cases: Vec<TestCase>) -> Self {
        Self { test_cases }
    }

    /// Appends a test case.
    pub fn push(&mut self, test_case: TestCase) {
        self.test_cases.push(test_case);
    }

    /// Test cases in suite order.
    #[must_use]
    pub fn test_cases(&self) -> &[TestCase] {
        &self.test_cases
    }

    /// Mutable test cases in suite order.
    pub fn test_cases_mut(&mut self) -> &mut [TestCase] {
        &mut self.test_cases
    }

    /// Finds a test case by id.
    #[must_use]
    pub fn find(&self, id: TestCaseId) -> Option<&TestCase> {
        self.test_cases.iter().find(|tc| tc.id == id)
    }

    /// Number of test cases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    /// Returns true if the suite is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    /// Total number of assertions across all test cases.
    #[must_use]
    pub fn assertion_count(&self) -> usize {
        self.test_cases.iter().map(TestCase::assertion_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::ValueAssertion;

    fn foo() -> TypeRef {
        TypeRef::new("bar", "Foo")
    }

    #[test]
    fn push_assigns_positions_and_types() {
        let mut tc = TestCase::new(TestCaseId(3));
        let a = tc.push_primitive(5);
        let b = tc.push_constructor(foo(), vec![a.position()]);
        let c = tc.push_method(b.position(), foo(), "size", vec![]);

        assert_eq!(a.position(), 0);
        assert_eq!(b.position(), 1);
        assert_eq!(c.position(), 2);
        assert_eq!(b.test_case(), TestCaseId(3));
        assert_eq!(b.declared_type(), Some(&foo()));
        assert!(a.declared_type().is_none());
        assert!(c.declared_type().is_none());
        assert!(tc.statement(1).unwrap().is_constructor());
        assert!(!tc.statement(2).unwrap().is_constructor());
        assert!(tc.statement(3).is_none());
    }

    #[test]
    fn assertions_attach_in_order() {
        let mut tc = TestCase::new(TestCaseId(1));
        let r = tc.push_function("bar", "compute", vec![]);
        let stmt = tc.statement_mut(0).unwrap();
        stmt.add_assertion(ValueAssertion::new(r.clone(), Value::from(1)).into());
        stmt.add_assertion(ValueAssertion::new(r, Value::from(2)).into());
        assert_eq!(tc.assertion_count(), 2);
    }

    #[test]
    fn suite_lookup_by_id() {
        let mut suite = TestSuite::new();
        suite.push(TestCase::new(TestCaseId(10)));
        suite.push(TestCase::new(TestCaseId(20)));
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.find(TestCaseId(20)).map(TestCase::id), Some(TestCaseId(20)));
        assert!(suite.find(TestCaseId(30)).is_none());
    }

    #[test]
    fn renders_as_code() {
        let mut tc = TestCase::new(TestCaseId(7));
        let a = tc.push_primitive(5);
        let b = tc.push_constructor(foo(), vec![a.position()]);
        let c = tc.push_method(b.position(), foo(), "size", vec![]);
        tc.statement_mut(2)
            .unwrap()
            .add_assertion(ValueAssertion::new(c, Value::from(5)).into());

        let text = tc.to_string();
        assert!(text.contains("def test_7():"));
        assert!(text.contains("var_0 = 5"));
        assert!(text.contains("var_1 = bar.Foo(var_0)"));
        assert!(text.contains("var_2 = var_1.size()"));
        assert!(text.contains("assert var_2 == 5"));
    }

    #[test]
    fn serde_roundtrip_preserves_constructor_typing() {
        let mut tc = TestCase::new(TestCaseId(2));
        tc.push_constructor(foo(), vec![]);
        let json = serde_json::to_string(&tc).unwrap();
        let back: TestCase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tc);
        assert!(back.statement(0).unwrap().is_constructor());
    }
}
