//! Node → [`Value`]: tells deferred expressions apart from plain data.
//!
//! Deferred syntax:
//! - `$name` string: back-reference to the parameter `name` (`$$x` is the
//!   literal string `$x`);
//! - `!fn <arg>` local tag: invocation of `fn`;
//! - `lookup: <key>` in a parameter entry, see [`DeferredResolver::lookup`].
//!
//! Everything else is a [`Literal`]. No type checking happens here.

use indexmap::IndexMap;

use super::{scalar, valid_name};
use crate::error::{CompileError, ErrorKind};
use crate::ir::{Literal, Value};
use crate::parse::{Node, NodeKind, NodeTag, SourceLocation};
use crate::validate::mapping_entries;

/// A `$name` back-reference seen while resolving.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: String,
    pub location: SourceLocation,
}

/// Resolves values and records the parameter references they contain.
#[derive(Debug, Default)]
pub struct DeferredResolver {
    references: Vec<Reference>,
}

impl DeferredResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// References in first-occurrence order, one per name.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    fn record(&mut self, name: &str, location: &SourceLocation) {
        if !self.references.iter().any(|r| r.name == name) {
            self.references.push(Reference {
                name: name.to_string(),
                location: location.clone(),
            });
        }
    }

    pub fn resolve(&mut self, node: &Node) -> Result<Value, CompileError> {
        match &node.tag {
            None => self.resolve_untagged(node),
            Some(NodeTag::Local(function)) => {
                let arguments = self.arguments(node)?;
                Ok(Value::invocation(function.clone(), arguments))
            }
            Some(NodeTag::Core(tag)) => match (&node.kind, tag.as_str()) {
                (NodeKind::Scalar(s), _) => {
                    Ok(Value::Literal(scalar::core_tagged(node, s, tag)?))
                }
                (NodeKind::Sequence(_), "seq") | (NodeKind::Mapping(_), "map") => {
                    self.resolve_untagged(node)
                }
                _ => Err(unsupported_tag(&format!("!!{}", tag), node)),
            },
            Some(NodeTag::Other(tag)) => Err(unsupported_tag(tag, node)),
        }
    }

    /// `lookup: <key>` → `lookup(<key>)`. A sequence supplies several
    /// arguments.
    pub fn lookup(&mut self, node: &Node) -> Result<Value, CompileError> {
        let arguments = match &node.kind {
            NodeKind::Sequence(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()?,
            NodeKind::Scalar(_) if !node.is_null() => vec![self.resolve(node)?],
            _ => {
                return Err(CompileError::unexpected_node(
                    "the 'lookup' key",
                    "a lookup key or a sequence of arguments",
                    node,
                ));
            }
        };
        Ok(Value::invocation("lookup", arguments))
    }

    fn resolve_untagged(&mut self, node: &Node) -> Result<Value, CompileError> {
        match &node.kind {
            NodeKind::Scalar(s) => match scalar::untagged(s) {
                Literal::String(text) => Ok(self.string(text, &node.location)),
                other => Ok(Value::Literal(other)),
            },
            NodeKind::Sequence(items) => {
                let values = items
                    .iter()
                    .map(|item| self.resolve(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(values))
            }
            NodeKind::Mapping(_) => {
                let mut entries = IndexMap::new();
                for entry in mapping_entries(node, "a hash")? {
                    entries.insert(entry.key.to_string(), self.resolve(entry.value)?);
                }
                Ok(Value::hash(entries))
            }
        }
    }

    fn string(&mut self, text: String, location: &SourceLocation) -> Value {
        if let Some(escaped) = text.strip_prefix("$$") {
            return Value::Literal(Literal::String(format!("${}", escaped)));
        }
        match text.strip_prefix('$') {
            Some(name) if valid_name(name) => {
                self.record(name, location);
                Value::invocation(text.clone(), Vec::new())
            }
            _ => Value::Literal(Literal::String(text)),
        }
    }

    /// Arguments of a `!fn` invocation: none for an empty scalar, the scalar
    /// itself, the items of a sequence, or the whole mapping as one hash.
    fn arguments(&mut self, node: &Node) -> Result<Vec<Value>, CompileError> {
        match &node.kind {
            NodeKind::Scalar(s) if s.plain && s.text.is_empty() => Ok(Vec::new()),
            NodeKind::Scalar(_) | NodeKind::Mapping(_) => Ok(vec![self.resolve_untagged(node)?]),
            NodeKind::Sequence(items) => items.iter().map(|item| self.resolve(item)).collect(),
        }
    }
}

fn unsupported_tag(tag: &str, node: &Node) -> CompileError {
    CompileError::new(
        ErrorKind::UnsupportedTag {
            tag: tag.to_string(),
        },
        node.location.clone(),
    )
}
