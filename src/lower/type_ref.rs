//! Type expressions in the document → [`TypeRef`] handles.

use tracing::trace;

use crate::error::{CompileError, ErrorKind};
use crate::parse::Node;
use crate::types::{TypeRef, TypeResolveError, TypeResolver};

fn expression<'a>(node: &'a Node, subject: &str) -> Result<&'a str, CompileError> {
    match node.as_scalar() {
        Some(text) if !node.is_null() => Ok(text),
        _ => Err(CompileError::unexpected_node(
            subject,
            "a type expression",
            node,
        )),
    }
}

fn located(err: TypeResolveError, node: &Node) -> CompileError {
    let kind = match err {
        TypeResolveError::Unresolved { name } => ErrorKind::UnresolvedType { name },
        TypeResolveError::Syntax { detail } | TypeResolveError::InvalidArguments { detail } => {
            ErrorKind::TypeSyntax { detail }
        }
    };
    CompileError::new(kind, node.location.clone())
}

/// Resolve the type expression held by a scalar node. Errors point at the
/// expression itself.
pub fn resolve_type(types: &dyn TypeResolver, node: &Node) -> Result<TypeRef, CompileError> {
    let text = expression(node, "the 'type' key")?;
    types.resolve(text).map_err(|e| located(e, node))
}

/// Qualify a bare type name with a typespace: `aws` + `Vpc` → `Aws::Vpc`.
pub fn qualify(typespace: &str, name: &str) -> String {
    if name.contains("::") || name.contains('[') {
        return name.to_string();
    }
    let mut segments: Vec<String> = typespace
        .split("::")
        .filter(|s| !s.is_empty())
        .map(capitalize)
        .collect();
    segments.push(name.to_string());
    segments.join("::")
}

fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Resolve the `resource` key of a step. The result must be an object type.
pub fn resolve_resource_type(
    types: &dyn TypeResolver,
    node: &Node,
    typespace: Option<&str>,
) -> Result<TypeRef, CompileError> {
    let text = expression(node, "the 'resource' key")?;
    let qualified = match typespace {
        Some(ts) => qualify(ts, text),
        None => text.to_string(),
    };
    trace!(resource = text, qualified = %qualified, "resolving resource type");

    let ty = types.resolve(&qualified).map_err(|e| located(e, node))?;
    if !types.is_object(&ty) {
        return Err(CompileError::new(
            ErrorKind::InvalidResourceType {
                type_name: ty.name().to_string(),
            },
            node.location.clone(),
        ));
    }
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;
    use crate::types::TypeRegistry;

    fn registry() -> TypeRegistry {
        TypeRegistry::builder()
            .object("Aws::Vpc", [("vpcId", "String")])
            .build()
            .unwrap()
    }

    fn node(yaml: &str) -> Node {
        parse_document("t.yaml", yaml)
            .unwrap()
            .unwrap()
            .get("t")
            .unwrap()
            .clone()
    }

    #[test]
    fn qualifies_bare_names() {
        assert_eq!(qualify("aws", "Vpc"), "Aws::Vpc");
        assert_eq!(qualify("kubernetes::core", "Pod"), "Kubernetes::Core::Pod");
        assert_eq!(qualify("aws", "Gcp::Vm"), "Gcp::Vm");
    }

    #[test]
    fn resource_types_use_typespace() {
        let types = registry();
        let ty = resolve_resource_type(&types, &node("t: Vpc\n"), Some("aws")).unwrap();
        assert_eq!(ty.name(), "Aws::Vpc");
    }

    #[test]
    fn resource_type_must_be_object() {
        let err = resolve_resource_type(&registry(), &node("t: String\n"), None).unwrap_err();
        assert_eq!(err.code(), "T004");
    }

    #[test]
    fn errors_point_at_expression() {
        let err = resolve_type(&registry(), &node("t: Hash[String, No::Such]\n")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Reference to unresolved type 'No::Such' (file: t.yaml, line: 1, column: 4)"
        );
        let err = resolve_type(&registry(), &node("t: 'Hash[String'\n")).unwrap_err();
        assert_eq!(err.kind.to_string(), "expected one of ',' or ']', got ''");
    }
}
