//! Step compiler: classified step mappings → [`StepDefinition`]s.
//!
//! Steps are compiled depth first in source order. A nested step sees a
//! forward-only scope: its container's parameters plus the returns of the
//! siblings compiled before it. `$name` references to scope entries become
//! implicit parameters of the referencing step, and a container inherits
//! whatever its children take from further out.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use super::deferred::{DeferredResolver, Reference};
use super::parameter::{self, ReturnEntry};
use super::type_ref::resolve_resource_type;
use super::valid_name;
use crate::config::CompileOptions;
use crate::error::{CompileError, ErrorKind};
use crate::ir::{Identifier, Origin, Parameter, StepDefinition, StepKind, Value};
use crate::parse::{Node, NodeKind, SourceLocation};
use crate::types::{TypeRef, TypeResolver};
use crate::validate::{StepBody, StepShape, classify_step, classify_workflow, mapping_entries};

// =============================================================================
// SCOPE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provenance {
    /// Visible to the container itself; the container must take it as input.
    Outer,
    /// A parameter of the container.
    Container,
    /// A return of an earlier sibling.
    Sibling,
}

#[derive(Debug, Clone)]
struct ScopeEntry {
    name: String,
    ty: TypeRef,
    provenance: Provenance,
}

/// Names a step may take as input without declaring a value.
#[derive(Debug, Clone, Default)]
struct Scope {
    entries: Vec<ScopeEntry>,
}

impl Scope {
    fn get(&self, name: &str) -> Option<&ScopeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    fn insert(&mut self, name: &str, ty: TypeRef, provenance: Provenance) {
        self.entries.retain(|e| e.name != name);
        self.entries.push(ScopeEntry {
            name: name.to_string(),
            ty,
            provenance,
        });
    }

    /// The scope seen by the children of a container that itself sees `self`.
    fn nested(&self, container_parameters: &[Parameter]) -> Scope {
        let mut scope = Scope {
            entries: self
                .entries
                .iter()
                .map(|e| ScopeEntry {
                    provenance: Provenance::Outer,
                    ..e.clone()
                })
                .collect(),
        };
        for p in container_parameters {
            scope.insert(&p.name, p.ty.clone(), Provenance::Container);
        }
        scope
    }
}

// =============================================================================
// COMPILER
// =============================================================================

pub(crate) struct StepCompiler<'a> {
    types: &'a dyn TypeResolver,
    options: &'a CompileOptions,
}

fn name_of<'n>(node: &'n Node, what: &str) -> Result<&'n str, CompileError> {
    match node.as_scalar() {
        Some(name) if !node.is_null() && valid_name(name) => Ok(name),
        Some(name) if !node.is_null() => Err(CompileError::new(
            ErrorKind::InvalidName {
                what: what.into(),
                name: name.to_string(),
            },
            node.location.clone(),
        )),
        _ => Err(CompileError::unexpected_node(
            format!("a {} name", what),
            "a scalar",
            node,
        )),
    }
}

fn text_of<'n>(node: &'n Node, key: &str) -> Result<&'n str, CompileError> {
    match node.as_scalar() {
        Some(text) if !node.is_null() && !text.is_empty() => Ok(text),
        _ => Err(CompileError::unexpected_node(
            format!("the '{}' key", key),
            "a non-empty string",
            node,
        )),
    }
}

fn unresolved_parameter(name: &str, location: &SourceLocation) -> CompileError {
    CompileError::new(
        ErrorKind::UnresolvedParameter {
            name: name.to_string(),
        },
        location.clone(),
    )
}

/// Defaults may refer to other declared parameters of the same step, but no
/// chain of defaults may lead back to where it started.
fn check_default_cycles(
    parameters: &[Parameter],
    references: &[Reference],
) -> Result<(), CompileError> {
    fn visit<'a>(
        name: &'a str,
        defaults: &HashMap<&'a str, Vec<&'a str>>,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Option<&'a str> {
        if path.contains(&name) {
            return Some(name);
        }
        if done.contains(name) {
            return None;
        }
        let refs = defaults.get(name)?;
        path.push(name);
        for &r in refs {
            if let Some(cycle) = visit(r, defaults, path, done) {
                return Some(cycle);
            }
        }
        path.pop();
        done.insert(name);
        None
    }

    let defaults: HashMap<&str, Vec<&str>> = parameters
        .iter()
        .filter_map(|p| Some((p.name.as_str(), p.value.as_ref()?.parameter_references())))
        .collect();
    let mut done = HashSet::new();
    for p in parameters {
        if let Some(name) = visit(&p.name, &defaults, &mut Vec::new(), &mut done) {
            let location = references
                .iter()
                .find(|r| r.name == name)
                .map_or(&p.location, |r| &r.location);
            return Err(unresolved_parameter(name, location));
        }
    }
    Ok(())
}

/// `(name, body)` pairs of a `steps` key: a mapping, or a sequence of
/// single-entry mappings.
fn step_entries(node: &Node) -> Result<Vec<(&Node, &Node)>, CompileError> {
    let pairs: Vec<(&Node, &Node)> = match &node.kind {
        _ if node.is_null() => Vec::new(),
        NodeKind::Mapping(entries) => entries.iter().map(|(k, v)| (k, v)).collect(),
        NodeKind::Sequence(items) => items
            .iter()
            .map(|item| match item.as_mapping() {
                Some([(k, v)]) => Ok((k, v)),
                Some(entries) => Err(CompileError::new(
                    ErrorKind::UnexpectedNode {
                        subject: "an item of 'steps'".into(),
                        expected: "a mapping with a single step".into(),
                        found: format!("a mapping with {} entries", entries.len()),
                    },
                    item.location.clone(),
                )),
                None => Err(CompileError::unexpected_node(
                    "an item of 'steps'",
                    "a mapping with a single step",
                    item,
                )),
            })
            .collect::<Result<_, _>>()?,
        NodeKind::Scalar(_) => {
            return Err(CompileError::unexpected_node(
                "the 'steps' key",
                "a mapping or a sequence",
                node,
            ));
        }
    };

    if pairs.is_empty() {
        return Err(CompileError::new(ErrorKind::EmptySteps, node.location.clone()));
    }

    let mut seen = HashSet::new();
    for (name, _) in &pairs {
        let name_text = name_of(name, "step")?;
        if !seen.insert(name_text) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName {
                    what: "step".into(),
                    name: name_text.to_string(),
                },
                name.location.clone(),
            ));
        }
    }
    Ok(pairs)
}

impl<'a> StepCompiler<'a> {
    pub(crate) fn new(types: &'a dyn TypeResolver, options: &'a CompileOptions) -> Self {
        StepCompiler { types, options }
    }

    /// Compile the top-level workflow `name: body`.
    pub(crate) fn compile_workflow(
        &self,
        name: &Node,
        body: &Node,
    ) -> Result<StepDefinition, CompileError> {
        let identifier = Identifier::root(name_of(name, "workflow")?);
        let body = classify_workflow(name, body, self.options)?;
        self.compile_body(identifier, name, body, &Scope::default(), None, true)
    }

    fn compile_step(
        &self,
        parent: &Identifier,
        name: &Node,
        body: &Node,
        scope: &Scope,
        typespace: Option<&str>,
    ) -> Result<StepDefinition, CompileError> {
        let identifier = parent.child(name_of(name, "step")?);
        let body = classify_step(name, body, self.options)?;
        self.compile_body(identifier, name, body, scope, typespace, false)
    }

    fn compile_body(
        &self,
        identifier: Identifier,
        name: &Node,
        body: StepBody<'_>,
        scope: &Scope,
        typespace: Option<&str>,
        root: bool,
    ) -> Result<StepDefinition, CompileError> {
        let mut deferred = DeferredResolver::new();
        let mut parameters = match body.parameters {
            Some(block) => parameter::parameters(self.types, &mut deferred, block)?,
            None => Vec::new(),
        };

        let mut kind = match body.shape {
            StepShape::Action { target } => StepKind::Action {
                action: text_of(target, "action")?.to_string(),
            },
            StepShape::Call { target } => StepKind::Call {
                call: text_of(target, "call")?.to_string(),
            },
            StepShape::Resource { resource } => {
                let resource_type = resolve_resource_type(self.types, resource, typespace)?;
                let state = self.compile_state(&resource_type, body.value, &mut deferred)?;
                let external_id = body
                    .external_id
                    .map(|n| text_of(n, "external_id").map(str::to_string))
                    .transpose()?;
                StepKind::Resource {
                    resource_type,
                    state,
                    external_id,
                }
            }
            StepShape::Composite { .. } => StepKind::Workflow { steps: Vec::new() },
        };

        check_default_cycles(&parameters, deferred.references())?;
        self.bind_references(&mut parameters, deferred.references(), scope)?;
        if !root {
            for p in parameters.iter().filter(|p| p.value.is_none()) {
                if scope.get(&p.name).is_none() {
                    return Err(unresolved_parameter(&p.name, &p.location));
                }
            }
        }

        if let StepShape::Composite { steps } = body.shape {
            let typespace = match body.typespace {
                Some(node) => Some(text_of(node, "typespace")?),
                None => typespace,
            };
            let (children, inherited) =
                self.compile_children(&identifier, steps, &parameters, scope, typespace)?;
            parameters.extend(inherited);
            kind = StepKind::Workflow { steps: children };
        }

        let returns = match body.returns {
            Some(block) => parameter::returns(self.types, block)?
                .into_iter()
                .map(|entry| self.settle_return(entry, &identifier, &kind, &parameters))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let step = StepDefinition {
            identifier,
            parameters,
            returns,
            kind,
            origin: Origin {
                location: name.location.clone(),
            },
        };
        debug!(
            step = %step.identifier,
            style = %step.style(),
            parameters = step.parameters.len(),
            returns = step.returns.len(),
            "compiled step"
        );
        Ok(step)
    }

    /// Turn references to scope entries into implicit parameters, appended
    /// in first-reference order.
    fn bind_references(
        &self,
        parameters: &mut Vec<Parameter>,
        references: &[Reference],
        scope: &Scope,
    ) -> Result<(), CompileError> {
        for reference in references {
            if parameters.iter().any(|p| p.name == reference.name) {
                continue;
            }
            match scope.get(&reference.name) {
                Some(entry) if self.options.implicit_parameters => parameters.push(Parameter {
                    name: reference.name.clone(),
                    ty: entry.ty.clone(),
                    value: None,
                    alias: None,
                    location: reference.location.clone(),
                }),
                _ => return Err(unresolved_parameter(&reference.name, &reference.location)),
            }
        }
        Ok(())
    }

    /// Desired resource state: every key must be an attribute of the
    /// resource type, and literal values must fit the attribute type.
    fn compile_state(
        &self,
        resource_type: &TypeRef,
        value: Option<&Node>,
        deferred: &mut DeferredResolver,
    ) -> Result<IndexMap<String, Value>, CompileError> {
        let mut state = IndexMap::new();
        let Some(node) = value.filter(|n| !n.is_null()) else {
            return Ok(state);
        };

        for entry in mapping_entries(node, "the 'value' key")? {
            let attribute_type = self
                .types
                .attribute(resource_type, entry.key)
                .ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::UnresolvedAttribute {
                            type_name: resource_type.name().to_string(),
                            attribute: entry.key.to_string(),
                        },
                        entry.key_node.location.clone(),
                    )
                })?;

            let value = deferred.resolve(entry.value)?;
            if let Value::Literal(literal) = &value {
                self.types
                    .check_compatible(literal, &attribute_type)
                    .map_err(|cause| {
                        CompileError::new(
                            ErrorKind::TypeMismatch {
                                subject: format!("attribute '{}'", entry.key),
                                value: literal.to_string(),
                                expected: attribute_type.name().to_string(),
                            },
                            entry.value.location.clone(),
                        )
                        .caused_by(cause.to_string())
                    })?;
            }
            state.insert(entry.key.to_string(), value);
        }
        Ok(state)
    }

    /// Compile the children of a container in source order. Returns the
    /// children and the parameters they take from outside the container.
    fn compile_children(
        &self,
        identifier: &Identifier,
        steps: &Node,
        parameters: &[Parameter],
        scope: &Scope,
        typespace: Option<&str>,
    ) -> Result<(Vec<StepDefinition>, Vec<Parameter>), CompileError> {
        let mut child_scope = scope.nested(parameters);
        let mut children = Vec::new();
        let mut inherited: Vec<Parameter> = Vec::new();

        for (name, body) in step_entries(steps)? {
            let child = self.compile_step(identifier, name, body, &child_scope, typespace)?;

            for p in child.parameters.iter().filter(|p| p.value.is_none()) {
                let outer = child_scope
                    .get(&p.name)
                    .filter(|e| e.provenance == Provenance::Outer);
                if let Some(entry) = outer {
                    if !inherited.iter().any(|i| i.name == p.name) {
                        inherited.push(Parameter {
                            name: p.name.clone(),
                            ty: entry.ty.clone(),
                            value: None,
                            alias: None,
                            location: p.location.clone(),
                        });
                    }
                }
            }

            for r in &child.returns {
                let clash = child_scope
                    .get(&r.name)
                    .is_some_and(|e| e.provenance != Provenance::Outer);
                if clash {
                    return Err(CompileError::new(
                        ErrorKind::DuplicateName {
                            what: "return".into(),
                            name: r.name.clone(),
                        },
                        r.location.clone(),
                    ));
                }
                child_scope.insert(&r.name, r.ty.clone(), Provenance::Sibling);
            }

            children.push(child);
        }

        Ok((children, inherited))
    }

    /// Settle the type of a return. Declared types win; otherwise the type
    /// comes from what produces the value.
    fn settle_return(
        &self,
        entry: ReturnEntry,
        identifier: &Identifier,
        kind: &StepKind,
        parameters: &[Parameter],
    ) -> Result<Parameter, CompileError> {
        let source = entry.source_name();
        let produced = match kind {
            StepKind::Action { .. } | StepKind::Call { .. } => self.types.any(),
            StepKind::Resource { resource_type, .. } => self
                .types
                .attribute(resource_type, source)
                .ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::UnresolvedAttribute {
                            type_name: resource_type.name().to_string(),
                            attribute: source.to_string(),
                        },
                        entry.location.clone(),
                    )
                })?,
            StepKind::Workflow { steps } => steps
                .iter()
                .rev()
                .flat_map(|s| s.returns.iter())
                .find(|r| r.name == source)
                .or_else(|| parameters.iter().find(|p| p.name == source))
                .map(|p| p.ty.clone())
                .ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::UnresolvedReturn {
                            container: identifier.to_string(),
                            name: source.to_string(),
                        },
                        entry.location.clone(),
                    )
                })?,
        };
        let ty = entry.ty.clone().unwrap_or(produced);
        Ok(entry.into_parameter(ty))
    }
}
