//! Built-in type system: core data types plus registered object types.
//!
//! A [`TypeRegistry`] is immutable once built, so one instance can back any
//! number of concurrent compilations.

use std::collections::{HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::trace;

use super::expr::{self, TypeArg, TypeExpr};
use super::{CoercionError, TypeRef, TypeResolveError, TypeResolver};
use crate::ir::{Deferred, Literal, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Any,
    Undef,
    Boolean,
    Integer { min: Option<i64>, max: Option<i64> },
    Float,
    Numeric,
    String,
    Scalar,
    Data,
    RichData,
    Optional(Box<Type>),
    NotUndef(Box<Type>),
    Array {
        element: Box<Type>,
        min: Option<i64>,
        max: Option<i64>,
    },
    Hash {
        key: Box<Type>,
        value: Box<Type>,
        min: Option<i64>,
        max: Option<i64>,
    },
    Enum(Vec<String>),
    Variant(Vec<Type>),
    /// A registered object type, by name.
    Object(String),
}

fn write_size(f: &mut fmt::Formatter<'_>, min: Option<i64>, max: Option<i64>) -> fmt::Result {
    if let Some(min) = min {
        write!(f, ", {}", min)?;
        if let Some(max) = max {
            write!(f, ", {}", max)?;
        }
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => f.write_str("Any"),
            Type::Undef => f.write_str("Undef"),
            Type::Boolean => f.write_str("Boolean"),
            Type::Integer { min: None, .. } => f.write_str("Integer"),
            Type::Integer { min: Some(min), max } => match max {
                Some(max) => write!(f, "Integer[{}, {}]", min, max),
                None => write!(f, "Integer[{}]", min),
            },
            Type::Float => f.write_str("Float"),
            Type::Numeric => f.write_str("Numeric"),
            Type::String => f.write_str("String"),
            Type::Scalar => f.write_str("Scalar"),
            Type::Data => f.write_str("Data"),
            Type::RichData => f.write_str("RichData"),
            Type::Optional(t) => write!(f, "Optional[{}]", t),
            Type::NotUndef(t) => write!(f, "NotUndef[{}]", t),
            Type::Array { element, min, max } => {
                write!(f, "Array[{}", element)?;
                write_size(f, *min, *max)?;
                f.write_str("]")
            }
            Type::Hash {
                key,
                value,
                min,
                max,
            } => {
                write!(f, "Hash[{}, {}", key, value)?;
                write_size(f, *min, *max)?;
                f.write_str("]")
            }
            Type::Enum(values) => {
                let quoted: Vec<String> = values.iter().map(|v| format!("'{}'", v)).collect();
                write!(f, "Enum[{}]", quoted.join(", "))
            }
            Type::Variant(types) => {
                let names: Vec<String> = types.iter().map(|t| t.to_string()).collect();
                write!(f, "Variant[{}]", names.join(", "))
            }
            Type::Object(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectType {
    pub name: String,
    pub attributes: IndexMap<String, Type>,
}

#[derive(Debug, thiserror::Error)]
pub enum TypeDefinitionError {
    #[error("invalid type definitions: {0}")]
    Json(#[from] serde_json::Error),

    #[error("attribute '{attribute}' of {object}: {source}")]
    Attribute {
        object: String,
        attribute: String,
        source: TypeResolveError,
    },

    #[error("object type '{0}' is registered more than once")]
    DuplicateObject(String),
}

#[derive(Debug, Deserialize)]
struct ObjectDefinition {
    #[serde(default)]
    attributes: IndexMap<String, String>,
}

#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    objects: Vec<(String, Vec<(String, String)>)>,
}

impl TypeRegistryBuilder {
    /// Register an object type with `(attribute, type expression)` pairs.
    pub fn object<I, K, V>(mut self, name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let attributes = attributes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.objects.push((name.into(), attributes));
        self
    }

    /// Resolve every attribute expression. Objects may refer to each other
    /// regardless of registration order.
    pub fn build(self) -> Result<TypeRegistry, TypeDefinitionError> {
        let mut seen = HashSet::new();
        if let Some((name, _)) = self.objects.iter().find(|(name, _)| !seen.insert(name)) {
            return Err(TypeDefinitionError::DuplicateObject(name.clone()));
        }

        let mut registry = TypeRegistry {
            objects: self
                .objects
                .iter()
                .map(|(name, _)| {
                    (
                        name.clone(),
                        ObjectType {
                            name: name.clone(),
                            attributes: IndexMap::new(),
                        },
                    )
                })
                .collect(),
        };

        for (object, attributes) in self.objects {
            let mut resolved = IndexMap::new();
            for (attribute, expression) in attributes {
                let ty = registry.parse_type(&expression).map_err(|source| {
                    TypeDefinitionError::Attribute {
                        object: object.clone(),
                        attribute: attribute.clone(),
                        source,
                    }
                })?;
                resolved.insert(attribute, ty);
            }
            if let Some(entry) = registry.objects.get_mut(&object) {
                entry.attributes = resolved;
            }
        }

        Ok(registry)
    }
}

/// Core types plus the object types it was built with.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    objects: HashMap<String, ObjectType>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Load object types from JSON:
    /// `{"Aws::Vpc": {"attributes": {"vpcId": "Optional[String]"}}}`.
    pub fn from_json(json: &str) -> Result<Self, TypeDefinitionError> {
        let definitions: IndexMap<String, ObjectDefinition> = serde_json::from_str(json)?;
        definitions
            .into_iter()
            .fold(TypeRegistry::builder(), |builder, (name, def)| {
                builder.object(name, def.attributes)
            })
            .build()
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.objects.get(name)
    }

    /// Parse and resolve an expression into a [`Type`].
    pub fn parse_type(&self, expression: &str) -> Result<Type, TypeResolveError> {
        let expr = expr::parse(expression)?;
        self.resolve_expr(&expr)
    }

    fn resolve_expr(&self, expr: &TypeExpr) -> Result<Type, TypeResolveError> {
        let args = &expr.args;
        let name = expr.name.as_str();
        let ty = match name {
            "Any" | "Undef" | "Boolean" | "Float" | "Numeric" | "String" | "Scalar" | "Data"
            | "RichData" => {
                no_args(name, args)?;
                match name {
                    "Any" => Type::Any,
                    "Undef" => Type::Undef,
                    "Boolean" => Type::Boolean,
                    "Float" => Type::Float,
                    "Numeric" => Type::Numeric,
                    "String" => Type::String,
                    "Scalar" => Type::Scalar,
                    "Data" => Type::Data,
                    _ => Type::RichData,
                }
            }
            "Integer" => {
                let (min, max) = size_args(name, args, 0)?;
                Type::Integer { min, max }
            }
            "Optional" | "NotUndef" => {
                if args.len() != 1 {
                    return Err(invalid(format!(
                        "{} expects exactly one type argument, got {}",
                        name,
                        args.len()
                    )));
                }
                let inner = Box::new(self.type_arg(name, &args[0], 1)?);
                if name == "Optional" {
                    Type::Optional(inner)
                } else {
                    Type::NotUndef(inner)
                }
            }
            "Array" => {
                let element = match args.first() {
                    Some(arg) => self.type_arg(name, arg, 1)?,
                    None => Type::Any,
                };
                let (min, max) = size_args(name, args, 1)?;
                Type::Array {
                    element: Box::new(element),
                    min,
                    max,
                }
            }
            "Hash" => {
                let (key, value) = match args.len() {
                    0 => (Type::Any, Type::Any),
                    1 => {
                        return Err(invalid(
                            "Hash expects a key and a value type, got 1 argument",
                        ));
                    }
                    _ => (
                        self.type_arg(name, &args[0], 1)?,
                        self.type_arg(name, &args[1], 2)?,
                    ),
                };
                let (min, max) = size_args(name, args, 2)?;
                Type::Hash {
                    key: Box::new(key),
                    value: Box::new(value),
                    min,
                    max,
                }
            }
            "Enum" => {
                if args.is_empty() {
                    return Err(invalid("Enum expects at least one value"));
                }
                let values = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| match arg {
                        TypeArg::String(s) => Ok(s.clone()),
                        _ => Err(invalid(format!(
                            "Enum expects a string as argument {}",
                            i + 1
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Type::Enum(values)
            }
            "Variant" => {
                if args.is_empty() {
                    return Err(invalid("Variant expects at least one type"));
                }
                let types = args
                    .iter()
                    .enumerate()
                    .map(|(i, arg)| self.type_arg(name, arg, i + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Type::Variant(types)
            }
            _ => {
                if !self.objects.contains_key(name) {
                    return Err(TypeResolveError::Unresolved {
                        name: name.to_string(),
                    });
                }
                no_args(name, args)?;
                Type::Object(name.to_string())
            }
        };
        Ok(ty)
    }

    fn type_arg(&self, owner: &str, arg: &TypeArg, position: usize) -> Result<Type, TypeResolveError> {
        match arg {
            TypeArg::Type(expr) => self.resolve_expr(expr),
            _ => Err(invalid(format!(
                "{} expects a type as argument {}",
                owner, position
            ))),
        }
    }

    fn lookup_attribute(&self, ty: &Type, name: &str) -> Option<&Type> {
        match ty {
            Type::Object(object) => self.objects.get(object)?.attributes.get(name),
            _ => None,
        }
    }

    fn type_ref(ty: Type) -> TypeRef {
        TypeRef::new(ty.to_string(), ty)
    }
}

/// Scalars give their own type, collections their exact shape with
/// `RichData` elements. Undef and invocations say nothing about the type.
fn infer_type(value: &Value) -> Type {
    let sized = |len: usize| Some(i64::try_from(len).unwrap_or(i64::MAX));
    let hash = |keys: Vec<String>| {
        let len = sized(keys.len());
        let key = if keys.is_empty() { Type::Any } else { Type::Enum(keys) };
        let element = if len == Some(0) { Type::Any } else { Type::RichData };
        Type::Hash {
            key: Box::new(key),
            value: Box::new(element),
            min: len,
            max: len,
        }
    };
    let array = |len: usize| Type::Array {
        element: Box::new(if len == 0 { Type::Any } else { Type::RichData }),
        min: sized(len),
        max: sized(len),
    };

    match value {
        Value::Literal(literal) => match literal {
            Literal::Undef => Type::Any,
            Literal::Boolean(_) => Type::Boolean,
            Literal::Integer(_) => Type::Integer {
                min: None,
                max: None,
            },
            Literal::Float(_) => Type::Float,
            Literal::String(_) => Type::String,
            Literal::Array(items) => array(items.len()),
            Literal::Hash(entries) => hash(entries.keys().cloned().collect()),
        },
        Value::Deferred(Deferred::Array(items)) => array(items.len()),
        Value::Deferred(Deferred::Hash(entries)) => hash(entries.keys().cloned().collect()),
        Value::Deferred(Deferred::Invocation(_)) => Type::Any,
    }
}

fn invalid(detail: impl Into<String>) -> TypeResolveError {
    TypeResolveError::InvalidArguments {
        detail: detail.into(),
    }
}

fn no_args(name: &str, args: &[TypeArg]) -> Result<(), TypeResolveError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(invalid(format!("{} does not accept arguments", name)))
    }
}

/// Optional trailing `min, max` integers after `skip` leading arguments.
fn size_args(
    name: &str,
    args: &[TypeArg],
    skip: usize,
) -> Result<(Option<i64>, Option<i64>), TypeResolveError> {
    let rest = args.get(skip..).unwrap_or(&[]);
    if rest.len() > 2 {
        return Err(invalid(format!("too many arguments for {}", name)));
    }
    let mut bounds = [None, None];
    for (i, arg) in rest.iter().enumerate() {
        match arg {
            TypeArg::Integer(n) => bounds[i] = Some(*n),
            _ => {
                return Err(invalid(format!(
                    "{} expects an integer as argument {}",
                    name,
                    skip + i + 1
                )));
            }
        }
    }
    Ok((bounds[0], bounds[1]))
}

impl TypeResolver for TypeRegistry {
    fn resolve(&self, expression: &str) -> Result<TypeRef, TypeResolveError> {
        let ty = self.parse_type(expression)?;
        trace!(expression, resolved = %ty, "resolved type expression");
        Ok(Self::type_ref(ty))
    }

    fn any(&self) -> TypeRef {
        Self::type_ref(Type::Any)
    }

    fn infer(&self, value: &Value) -> TypeRef {
        Self::type_ref(infer_type(value))
    }

    fn check_compatible(&self, value: &Literal, ty: &TypeRef) -> Result<(), CoercionError> {
        match ty.handle::<Type>() {
            Some(t) => super::check::coerce(self, value, t),
            None => Err(CoercionError(format!(
                "type {} was not resolved by this registry",
                ty
            ))),
        }
    }

    fn attribute(&self, ty: &TypeRef, name: &str) -> Option<TypeRef> {
        let ty = ty.handle::<Type>()?;
        self.lookup_attribute(ty, name)
            .map(|attr| Self::type_ref(attr.clone()))
    }

    fn is_object(&self, ty: &TypeRef) -> bool {
        matches!(ty.handle::<Type>(), Some(Type::Object(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .object("Aws::Vpc", [("vpcId", "Optional[String]"), ("tags", "Hash[String, String]")])
            .object("Aws::Subnet", [("vpc", "Aws::Vpc")])
            .build()
            .unwrap()
    }

    #[test]
    fn canonical_names() {
        let r = registry();
        assert_eq!(r.resolve("Hash[String,String]").unwrap().name(), "Hash[String, String]");
        assert_eq!(r.resolve("Enum[\"a\",'b']").unwrap().name(), "Enum['a', 'b']");
        assert_eq!(r.resolve("Array").unwrap().name(), "Array[Any]");
        assert_eq!(r.resolve("Integer[0,10]").unwrap().name(), "Integer[0, 10]");
        assert_eq!(r.resolve("Array[String, 1]").unwrap().name(), "Array[String, 1]");
    }

    #[test]
    fn unresolved_names_are_reported() {
        let r = registry();
        assert_eq!(
            r.resolve("Optional[No::Such::Type]").unwrap_err(),
            TypeResolveError::Unresolved {
                name: "No::Such::Type".into()
            }
        );
    }

    #[test]
    fn invalid_arguments() {
        let r = registry();
        assert!(matches!(
            r.resolve("Hash[String]"),
            Err(TypeResolveError::InvalidArguments { .. })
        ));
        assert!(matches!(
            r.resolve("String[1]"),
            Err(TypeResolveError::InvalidArguments { .. })
        ));
        assert!(matches!(
            r.resolve("Enum[String]"),
            Err(TypeResolveError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn attributes_and_objects() {
        let r = registry();
        let vpc = r.resolve("Aws::Vpc").unwrap();
        assert!(r.is_object(&vpc));
        assert_eq!(r.attribute(&vpc, "vpcId").unwrap().name(), "Optional[String]");
        assert!(r.attribute(&vpc, "nope").is_none());
        let subnet = r.resolve("Aws::Subnet").unwrap();
        assert_eq!(r.attribute(&subnet, "vpc").unwrap().name(), "Aws::Vpc");
        assert!(!r.is_object(&r.any()));
    }

    #[test]
    fn builder_rejects_duplicate_objects() {
        let err = TypeRegistry::builder()
            .object("A", [("x", "String")])
            .object("B", [("y", "A")])
            .object("A", [("z", "Integer")])
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "object type 'A' is registered more than once");
    }

    #[test]
    fn inferred_types_follow_values() {
        let r = registry();
        let text = |v: Value| r.infer(&v).name().to_string();
        assert_eq!(text(Value::Literal(Literal::string("wordpress"))), "String");
        assert_eq!(text(Value::Literal(Literal::Integer(3))), "Integer");
        assert_eq!(text(Value::Literal(Literal::Float(0.5))), "Float");
        assert_eq!(text(Value::Literal(Literal::Boolean(true))), "Boolean");
        assert_eq!(text(Value::Literal(Literal::Undef)), "Any");
        assert_eq!(text(Value::invocation("lookup", vec![])), "Any");
        assert_eq!(
            text(Value::Literal(Literal::Array(vec![Literal::Integer(1), Literal::Undef]))),
            "Array[RichData, 2, 2]"
        );
        assert_eq!(text(Value::Literal(Literal::Hash(IndexMap::new()))), "Hash[Any, Any, 0, 0]");

        let mut entries = IndexMap::new();
        entries.insert("a".to_string(), Value::Literal(Literal::Integer(1)));
        entries.insert("b".to_string(), Value::invocation("$x", vec![]));
        assert_eq!(
            text(Value::hash(entries)),
            "Hash[Enum['a', 'b'], RichData, 2, 2]"
        );
    }

    #[test]
    fn builder_rejects_bad_attribute_types() {
        let err = TypeRegistry::builder()
            .object("A", [("x", "Nope")])
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "attribute 'x' of A: Reference to unresolved type 'Nope'"
        );
    }

    #[test]
    fn loads_from_json() {
        let r = TypeRegistry::from_json(
            r#"{"Kubernetes::Namespace": {"attributes": {"namespace_id": "String"}}}"#,
        )
        .unwrap();
        let ns = r.resolve("Kubernetes::Namespace").unwrap();
        assert_eq!(r.attribute(&ns, "namespace_id").unwrap().name(), "String");
    }
}
