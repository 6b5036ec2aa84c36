//! Parameter and return blocks → ordered [`Parameter`] lists.
//!
//! A block is one of:
//! - a mapping `name: form`, where form is empty, a type expression, or a
//!   mapping of entry keys;
//! - a sequence whose items are names, single-entry `name: form` mappings or
//!   mappings carrying a `name` key next to the entry keys;
//! - a single name.

use std::collections::HashSet;

use super::deferred::DeferredResolver;
use super::type_ref::resolve_type;
use super::valid_name;
use crate::error::{CompileError, ErrorKind};
use crate::ir::{Parameter, Value};
use crate::parse::{Node, NodeKind, SourceLocation};
use crate::types::{TypeRef, TypeResolver};
use crate::validate::{KeyedEntry, mapping_entries};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Parameters,
    Returns,
}

impl BlockKind {
    fn what(self) -> &'static str {
        match self {
            BlockKind::Parameters => "parameter",
            BlockKind::Returns => "return",
        }
    }

    fn entry_keys(self) -> &'static [&'static str] {
        match self {
            BlockKind::Parameters => &["type", "value", "lookup"],
            BlockKind::Returns => &["type", "alias"],
        }
    }
}

/// How an entry was written.
enum Form<'a> {
    None,
    Type(&'a Node),
    Keys(Vec<KeyedEntry<'a>>),
}

struct RawEntry<'a> {
    name: &'a str,
    name_node: &'a Node,
    form: Form<'a>,
}

/// A return entry before its type is settled. Untyped returns are inferred
/// from what produces them, which depends on the step kind.
#[derive(Debug, Clone)]
pub struct ReturnEntry {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub alias: Option<String>,
    pub location: SourceLocation,
}

impl ReturnEntry {
    /// Name of the field this return is bound from.
    pub fn source_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn into_parameter(self, ty: TypeRef) -> Parameter {
        Parameter {
            name: self.name,
            ty,
            value: None,
            alias: self.alias,
            location: self.location,
        }
    }
}

fn name_of<'a>(node: &'a Node, kind: BlockKind) -> Result<&'a str, CompileError> {
    let name = match node.as_scalar() {
        Some(name) if !node.is_null() => name,
        _ => {
            return Err(CompileError::unexpected_node(
                format!("a {} name", kind.what()),
                "a scalar",
                node,
            ));
        }
    };
    if !valid_name(name) {
        return Err(CompileError::new(
            ErrorKind::InvalidName {
                what: kind.what().into(),
                name: name.to_string(),
            },
            node.location.clone(),
        ));
    }
    Ok(name)
}

fn form_of<'a>(node: &'a Node, kind: BlockKind) -> Result<Form<'a>, CompileError> {
    match &node.kind {
        _ if node.is_null() => Ok(Form::None),
        NodeKind::Scalar(_) => Ok(Form::Type(node)),
        NodeKind::Mapping(_) => Ok(Form::Keys(mapping_entries(
            node,
            &format!("a {} entry", kind.what()),
        )?)),
        NodeKind::Sequence(_) => Err(CompileError::unexpected_node(
            format!("a {} entry", kind.what()),
            "empty, a type expression or a mapping",
            node,
        )),
    }
}

fn raw_entries(block: &Node, kind: BlockKind) -> Result<Vec<RawEntry<'_>>, CompileError> {
    let mut out = Vec::new();
    match &block.kind {
        _ if block.is_null() => {}
        NodeKind::Scalar(_) => out.push(RawEntry {
            name: name_of(block, kind)?,
            name_node: block,
            form: Form::None,
        }),
        NodeKind::Mapping(_) => {
            for entry in mapping_entries(block, &format!("a {} block", kind.what()))? {
                out.push(RawEntry {
                    name: name_of(entry.key_node, kind)?,
                    name_node: entry.key_node,
                    form: form_of(entry.value, kind)?,
                });
            }
        }
        NodeKind::Sequence(items) => {
            for item in items {
                out.push(sequence_item(item, kind)?);
            }
        }
    }
    Ok(out)
}

fn sequence_item(item: &Node, kind: BlockKind) -> Result<RawEntry<'_>, CompileError> {
    if item.as_scalar().is_some() {
        return Ok(RawEntry {
            name: name_of(item, kind)?,
            name_node: item,
            form: Form::None,
        });
    }
    let entries = mapping_entries(item, &format!("a {} entry", kind.what()))?;
    if let Some(name) = entries.iter().find(|e| e.key == "name") {
        return Ok(RawEntry {
            name: name_of(name.value, kind)?,
            name_node: name.value,
            form: Form::Keys(entries.into_iter().filter(|e| e.key != "name").collect()),
        });
    }
    match entries.as_slice() {
        [single] => Ok(RawEntry {
            name: name_of(single.key_node, kind)?,
            name_node: single.key_node,
            form: form_of(single.value, kind)?,
        }),
        _ => Err(CompileError::new(
            ErrorKind::MissingKey {
                context: format!("a {} entry", kind.what()),
                key: "name".into(),
            },
            item.location.clone(),
        )),
    }
}

fn check_unique(entries: &[RawEntry<'_>], kind: BlockKind) -> Result<(), CompileError> {
    let mut seen = HashSet::new();
    for entry in entries {
        if !seen.insert(entry.name) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName {
                    what: kind.what().into(),
                    name: entry.name.to_string(),
                },
                entry.name_node.location.clone(),
            ));
        }
    }
    Ok(())
}

fn check_keys(keys: &[KeyedEntry<'_>], kind: BlockKind) -> Result<(), CompileError> {
    for entry in keys {
        if !kind.entry_keys().contains(&entry.key) {
            return Err(CompileError::new(
                ErrorKind::UnexpectedKey {
                    key: entry.key.to_string(),
                    context: format!("a {} entry", kind.what()),
                },
                entry.key_node.location.clone(),
            ));
        }
    }
    Ok(())
}

fn find<'a>(keys: &[KeyedEntry<'a>], key: &str) -> Option<KeyedEntry<'a>> {
    keys.iter().find(|e| e.key == key).copied()
}

/// Compile a `parameters` block. References found in values are recorded in
/// `deferred`.
pub fn parameters(
    types: &dyn TypeResolver,
    deferred: &mut DeferredResolver,
    block: &Node,
) -> Result<Vec<Parameter>, CompileError> {
    let kind = BlockKind::Parameters;
    let entries = raw_entries(block, kind)?;
    check_unique(&entries, kind)?;

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let (declared, value) = match &entry.form {
            Form::None => (None, None),
            Form::Type(node) => (Some(resolve_type(types, node)?), None),
            Form::Keys(keys) => {
                check_keys(keys, kind)?;
                let declared = find(keys, "type")
                    .map(|e| resolve_type(types, e.value))
                    .transpose()?;
                let value = match (find(keys, "value"), find(keys, "lookup")) {
                    (Some(v), Some(l)) => {
                        // Keys are in document order; report at the later one.
                        let position = |key: &str| keys.iter().position(|e| e.key == key);
                        let (first, second) = if position("value") < position("lookup") {
                            (v, l)
                        } else {
                            (l, v)
                        };
                        return Err(CompileError::new(
                            ErrorKind::ConflictingKeys {
                                first: first.key.to_string(),
                                second: second.key.to_string(),
                            },
                            second.key_node.location.clone(),
                        ));
                    }
                    (Some(v), None) => Some((deferred.resolve(v.value)?, v.value)),
                    (None, Some(l)) => Some((deferred.lookup(l.value)?, l.value)),
                    (None, None) => None,
                };
                (declared, value)
            }
        };

        if let (Some(ty), Some((Value::Literal(literal), node))) = (&declared, &value) {
            types.check_compatible(literal, ty).map_err(|cause| {
                CompileError::new(
                    ErrorKind::TypeMismatch {
                        subject: format!("parameter '{}'", entry.name),
                        value: literal.to_string(),
                        expected: ty.name().to_string(),
                    },
                    node.location.clone(),
                )
                .caused_by(cause.to_string())
            })?;
        }

        out.push(Parameter {
            name: entry.name.to_string(),
            ty: declared.unwrap_or_else(|| match &value {
                Some((v, _)) => types.infer(v),
                None => types.any(),
            }),
            value: value.map(|(v, _)| v),
            alias: None,
            location: entry.name_node.location.clone(),
        });
    }
    Ok(out)
}

/// Compile a `returns` block. Types stay open where none was declared.
pub fn returns(types: &dyn TypeResolver, block: &Node) -> Result<Vec<ReturnEntry>, CompileError> {
    let kind = BlockKind::Returns;
    let entries = raw_entries(block, kind)?;
    check_unique(&entries, kind)?;

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let (ty, alias) = match &entry.form {
            Form::None => (None, None),
            Form::Type(node) => (Some(resolve_type(types, node)?), None),
            Form::Keys(keys) => {
                check_keys(keys, kind)?;
                let ty = find(keys, "type")
                    .map(|e| resolve_type(types, e.value))
                    .transpose()?;
                let alias = find(keys, "alias")
                    .map(|e| name_of(e.value, kind).map(str::to_string))
                    .transpose()?;
                (ty, alias)
            }
        };
        out.push(ReturnEntry {
            name: entry.name.to_string(),
            ty,
            alias,
            location: entry.name_node.location.clone(),
        });
    }
    Ok(out)
}
