//! Reflection metadata for callables and fields under test.
//!
//! The analysis never introspects a live program. Everything it knows about
//! types comes from [`TypeRef`]s attached to test-case statements and from an
//! [`OwnerResolver`] capability supplied by the metadata collaborator.

use core::fmt;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::testcase::VariableRef;

/// A declared type, identified by its declaring module and simple name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRef {
    /// Declaring module name.
    pub module: String,
    /// Simple type name.
    pub name: String,
}

impl TypeRef {
    /// Creates a type reference.
    #[must_use]
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// Something a generated test can access: a callable or a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessibleObject {
    /// A constructor of `owner`.
    Constructor {
        /// The class being constructed.
        owner: TypeRef,
    },
    /// A method declared on `owner`.
    Method {
        /// Declaring class.
        owner: TypeRef,
        /// Method name.
        name: String,
        /// Declared return type, when known.
        returns: Option<TypeRef>,
    },
    /// A free function, which does not belong to any class.
    Function {
        /// Declaring module.
        module: String,
        /// Function name.
        name: String,
        /// Declared return type, when known.
        returns: Option<TypeRef>,
    },
    /// A field declared on `owner`.
    Field {
        /// Declaring class.
        owner: TypeRef,
        /// Field name.
        field: String,
        /// Declared field type, when known.
        field_type: Option<TypeRef>,
    },
}

impl AccessibleObject {
    /// The type of the value this object produces when accessed.
    #[must_use]
    pub fn generated_type(&self) -> Option<&TypeRef> {
        match self {
            Self::Constructor { owner } => Some(owner),
            Self::Method { returns, .. } | Self::Function { returns, .. } => returns.as_ref(),
            Self::Field { field_type, .. } => field_type.as_ref(),
        }
    }

    /// The class that declares this object, if it is not a free function.
    #[must_use]
    pub fn owner(&self) -> Option<&TypeRef> {
        match self {
            Self::Constructor { owner } | Self::Method { owner, .. } | Self::Field { owner, .. } => {
                Some(owner)
            }
            Self::Function { .. } => None,
        }
    }

    /// Returns true for constructors.
    #[must_use]
    pub const fn is_constructor(&self) -> bool {
        matches!(self, Self::Constructor { .. })
    }
}

impl fmt::Display for AccessibleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructor { owner } => write!(f, "{owner}()"),
            Self::Method { owner, name, .. } => write!(f, "{owner}.{name}()"),
            Self::Function { module, name, .. } => write!(f, "{module}.{name}()"),
            Self::Field { owner, field, .. } => write!(f, "{owner}.{field}"),
        }
    }
}

/// Resolves the owning class of a value produced by a constructor statement.
///
/// Resolution may report "unknown" (`None`) rather than fail.
pub trait OwnerResolver {
    /// Returns the declared type of `reference`, if recoverable.
    fn resolve_owner(&self, reference: &VariableRef) -> Option<TypeRef>;
}

/// Resolves owners from the type recorded on the reference itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredTypeResolver;

impl OwnerResolver for DeclaredTypeResolver {
    fn resolve_owner(&self, reference: &VariableRef) -> Option<TypeRef> {
        reference.declared_type().cloned()
    }
}

/// Resolves owners from an explicit reference-to-type table, falling back to
/// the declared type of the reference.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<VariableRef, TypeRef>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the runtime type of `reference`.
    pub fn register(&mut self, reference: VariableRef, type_ref: TypeRef) {
        self.types.insert(reference, type_ref);
    }

    /// Number of registered references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl OwnerResolver for TypeRegistry {
    fn resolve_owner(&self, reference: &VariableRef) -> Option<TypeRef> {
        self.types
            .get(reference)
            .cloned()
            .or_else(|| reference.declared_type().cloned())
    }
}

impl<R: OwnerResolver + ?Sized> OwnerResolver for &R {
    fn resolve_owner(&self, reference: &VariableRef) -> Option<TypeRef> {
        (**self).resolve_owner(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testcase::TestCaseId;

    fn foo() -> TypeRef {
        TypeRef::new("bar", "Foo")
    }

    #[test]
    fn generated_types() {
        let ctor = AccessibleObject::Constructor { owner: foo() };
        assert_eq!(ctor.generated_type(), Some(&foo()));
        assert!(ctor.is_constructor());

        let method = AccessibleObject::Method {
            owner: foo(),
            name: "size".into(),
            returns: Some(TypeRef::new("builtins", "int")),
        };
        assert_eq!(method.generated_type().map(|t| t.name.as_str()), Some("int"));
        assert_eq!(method.owner(), Some(&foo()));

        let func = AccessibleObject::Function {
            module: "bar".into(),
            name: "helper".into(),
            returns: None,
        };
        assert!(func.generated_type().is_none());
        assert!(func.owner().is_none());

        let field = AccessibleObject::Field {
            owner: foo(),
            field: "count".into(),
            field_type: None,
        };
        assert_eq!(field.to_string(), "bar.Foo.count");
    }

    #[test]
    fn declared_type_resolver_reads_reference() {
        let typed = VariableRef::new(TestCaseId(1), 0).with_type(foo());
        let untyped = VariableRef::new(TestCaseId(1), 1);
        assert_eq!(DeclaredTypeResolver.resolve_owner(&typed), Some(foo()));
        assert_eq!(DeclaredTypeResolver.resolve_owner(&untyped), None);
    }

    #[test]
    fn registry_overrides_declared_type() {
        let reference = VariableRef::new(TestCaseId(2), 0).with_type(foo());
        let mut registry = TypeRegistry::new();
        assert_eq!(registry.resolve_owner(&reference), Some(foo()));

        registry.register(reference.clone(), TypeRef::new("bar", "SubFoo"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.resolve_owner(&reference),
            Some(TypeRef::new("bar", "SubFoo"))
        );
    }
}
