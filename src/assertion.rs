//! Regression assertions synthesized from mutation analysis.
//!
//! Two kinds exist:
//!
//! - [`ValueAssertion`]: a statement's result equals an expected value.
//! - [`FieldAssertion`]: a named field equals an expected value, scoped to an
//!   object instance, a class `(module, class)`, or a module global
//!   `(module, field)`.
//!
//! `FieldAssertion` equality covers instance reference, value, field name,
//! module and owning class; that equality is the deduplication key used by a
//! synthesis pass.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::testcase::VariableRef;
use crate::value::Value;

/// Binds a statement's result reference to an expected value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueAssertion {
    source: VariableRef,
    value: Value,
}

impl ValueAssertion {
    /// Creates a value assertion.
    #[must_use]
    pub const fn new(source: VariableRef, value: Value) -> Self {
        Self { source, value }
    }

    /// The asserted reference.
    #[must_use]
    pub const fn source(&self) -> &VariableRef {
        &self.source
    }

    /// The expected value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }
}

/// Which state section a [`FieldAssertion`] was derived from.
///
/// Part of assertion identity: an unresolved class field and an instance
/// attribute without an owner never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Attribute of an object instance.
    Instance,
    /// Class-level field.
    Class,
    /// Module-level global.
    Global,
}

/// Binds an expected value to a named field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldAssertion {
    kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<VariableRef>,
    value: Value,
    field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
}

/// The scope a [`FieldAssertion`] reads its field from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope<'a> {
    /// An attribute of a specific object instance.
    Instance(&'a VariableRef),
    /// A class-level field.
    Class {
        /// Declaring module, if it was resolved.
        module: Option<&'a str>,
        /// Owning class name.
        class: &'a str,
    },
    /// A module-level global.
    Module(&'a str),
    /// Owner could not be resolved.
    Unscoped,
}

impl FieldAssertion {
    /// Asserts an attribute of an object instance.
    ///
    /// `source` is `None` when no owning object could be located.
    #[must_use]
    pub fn instance(source: Option<VariableRef>, field: impl Into<String>, value: Value) -> Self {
        Self {
            kind: FieldKind::Instance,
            source,
            value,
            field: field.into(),
            module: None,
            owner: None,
        }
    }

    /// Asserts a class-level field of `class` declared in `module`.
    ///
    /// Either part is `None` when the owning type could not be resolved.
    #[must_use]
    pub fn class_field(
        module: Option<String>,
        class: Option<String>,
        field: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            kind: FieldKind::Class,
            source: None,
            value,
            field: field.into(),
            module,
            owner: class,
        }
    }

    /// Asserts a module-level global.
    #[must_use]
    pub fn global(module: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self {
            kind: FieldKind::Global,
            source: None,
            value,
            field: field.into(),
            module: Some(module.into()),
            owner: None,
        }
    }

    /// The state section the assertion was derived from.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// The owning instance, if any.
    #[must_use]
    pub const fn source(&self) -> Option<&VariableRef> {
        self.source.as_ref()
    }

    /// The expected value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// The field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The module, for class fields and globals.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// The owning class, for class fields.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Classifies where the field lives.
    #[must_use]
    pub fn scope(&self) -> FieldScope<'_> {
        match (self.kind, &self.source, self.module.as_deref(), self.owner.as_deref()) {
            (FieldKind::Instance, Some(source), _, _) => FieldScope::Instance(source),
            (FieldKind::Class, _, module, Some(class)) => FieldScope::Class { module, class },
            (FieldKind::Global, _, Some(module), _) => FieldScope::Module(module),
            _ => FieldScope::Unscoped,
        }
    }
}

/// An assertion attached to a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    /// Result-value assertion.
    Value(ValueAssertion),
    /// Field assertion.
    Field(FieldAssertion),
}

impl Assertion {
    /// The expected value of either kind.
    #[must_use]
    pub const fn expected(&self) -> &Value {
        match self {
            Self::Value(a) => &a.value,
            Self::Field(a) => &a.value,
        }
    }

    /// Returns the field assertion, if this is one.
    #[must_use]
    pub const fn as_field(&self) -> Option<&FieldAssertion> {
        match self {
            Self::Field(a) => Some(a),
            Self::Value(_) => None,
        }
    }
}

impl From<ValueAssertion> for Assertion {
    fn from(a: ValueAssertion) -> Self {
        Self::Value(a)
    }
}

impl From<FieldAssertion> for Assertion {
    fn from(a: FieldAssertion) -> Self {
        Self::Field(a)
    }
}

impl fmt::Display for ValueAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "assert {} == {}", self.source, self.value)
    }
}

impl fmt::Display for FieldAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("assert ")?;
        match self.scope() {
            FieldScope::Instance(source) => write!(f, "{source}.")?,
            FieldScope::Class {
                module: Some(module),
                class,
            } => write!(f, "{module}.{class}.")?,
            FieldScope::Class {
                module: None,
                class,
            } => write!(f, "{class}.")?,
            FieldScope::Module(module) => write!(f, "{module}.")?,
            FieldScope::Unscoped => {}
        }
        write!(f, "{} == {}", self.field, self.value)
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(a) => a.fmt(f),
            Self::Field(a) => a.fmt(f),
        }
    }
}
