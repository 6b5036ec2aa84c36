//! Type-system boundary.
//!
//! The compiler never interprets type expressions itself. It drives a
//! [`TypeResolver`] that turns expressions into opaque [`TypeRef`] handles and
//! answers compatibility and attribute questions about them. [`TypeRegistry`]
//! is the built-in implementation.

mod check;
pub mod expr;
pub mod registry;

pub use registry::{ObjectType, Type, TypeDefinitionError, TypeRegistry, TypeRegistryBuilder};

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::ir::{Literal, Value};

/// Opaque handle to a resolved type.
///
/// Only the canonical name is visible to the compiler; the payload belongs to
/// the resolver that produced the handle.
#[derive(Clone)]
pub struct TypeRef {
    name: Arc<str>,
    handle: Arc<dyn Any + Send + Sync>,
}

impl TypeRef {
    pub fn new<T: Any + Send + Sync>(name: impl Into<Arc<str>>, handle: T) -> Self {
        TypeRef {
            name: name.into(),
            handle: Arc::new(handle),
        }
    }

    /// Canonical rendering, e.g. `Hash[String, String]`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle<T: Any>(&self) -> Option<&T> {
        (*self.handle).downcast_ref::<T>()
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name).finish()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeResolveError {
    /// The expression does not follow the type grammar. `detail` carries the
    /// parser's expected-token message.
    #[error("{detail}")]
    Syntax { detail: String },

    #[error("Reference to unresolved type '{name}'")]
    Unresolved { name: String },

    /// Well-formed, but the arguments do not fit the named type.
    #[error("{detail}")]
    InvalidArguments { detail: String },
}

/// Why a literal could not be coerced into a type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CoercionError(pub String);

/// The contract the compiler drives.
///
/// Implementations must be safe for concurrent read-only use: resolving a
/// type may not change what other callers observe.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, expression: &str) -> Result<TypeRef, TypeResolveError>;

    /// The unconstrained type given to untyped parameters without a value.
    fn any(&self) -> TypeRef;

    /// The type of an untyped parameter with the default `value`.
    fn infer(&self, value: &Value) -> TypeRef;

    fn check_compatible(&self, value: &Literal, ty: &TypeRef) -> Result<(), CoercionError>;

    /// Type of the attribute `name` of an object type, if it has one.
    fn attribute(&self, ty: &TypeRef, name: &str) -> Option<TypeRef>;

    /// Whether `ty` describes objects with attributes (valid resource types).
    fn is_object(&self, ty: &TypeRef) -> bool;
}
