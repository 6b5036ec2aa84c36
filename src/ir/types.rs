//! IR type definitions for compiled workflows.
//!
//! A workflow document is lowered into a tree of [`StepDefinition`]s rooted in a
//! [`WorkflowDefinition`]. The tree is built once, never mutated afterwards and
//! handed to the service registry, which resolves it against runtime inputs.

use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::parse::SourceLocation;
use crate::types::TypeRef;

// =============================================================================
// IDENTIFIERS & ORIGIN
// =============================================================================

/// Qualified step name: the workflow name followed by the nesting path,
/// joined by `::` (e.g. `aws_vpc::vpc`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub const SEPARATOR: &'static str = "::";

    pub fn root(name: impl Into<String>) -> Self {
        Identifier(name.into())
    }

    pub fn child(&self, local: &str) -> Self {
        Identifier(format!("{}{}{}", self.0, Self::SEPARATOR, local))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path segment.
    pub fn local_name(&self) -> &str {
        self.0
            .rsplit(Self::SEPARATOR)
            .next()
            .unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance of a definition. Displays as `(file: <path>)`; the full
/// location is kept for diagnostics raised after compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub location: SourceLocation,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(file: {})", self.location.file)
    }
}

impl Serialize for Origin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// Plain data, fully known at compile time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Undef,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<Literal>),
    /// Keys keep document order.
    Hash(IndexMap<String, Literal>),
}

impl Literal {
    pub fn string(s: impl Into<String>) -> Self {
        Literal::String(s.into())
    }

    /// Name of the runtime type of this value, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Undef => "Undef",
            Literal::Boolean(_) => "Boolean",
            Literal::Integer(_) => "Integer",
            Literal::Float(_) => "Float",
            Literal::String(_) => "String",
            Literal::Array(_) => "Array",
            Literal::Hash(_) => "Hash",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Undef => f.write_str("undef"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Literal::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Literal::Hash(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{}' => {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<serde_json::Value> for Literal {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Literal::Undef,
            serde_json::Value::Bool(b) => Literal::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Literal::Integer(i),
                None => Literal::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Literal::String(s),
            serde_json::Value::Array(items) => {
                Literal::Array(items.into_iter().map(Literal::from).collect())
            }
            serde_json::Value::Object(map) => Literal::Hash(
                map.into_iter()
                    .map(|(k, v)| (k, Literal::from(v)))
                    .collect(),
            ),
        }
    }
}

/// A call whose evaluation is postponed until the workflow runs.
///
/// Parameter back-references are invocations named `$<parameter>` without
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeferredInvocation {
    pub name: String,
    pub arguments: Vec<Value>,
}

impl DeferredInvocation {
    pub fn new(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        DeferredInvocation {
            name: name.into(),
            arguments,
        }
    }

    pub fn parameter_reference(name: &str) -> Self {
        DeferredInvocation::new(format!("${}", name), Vec::new())
    }

    /// The referenced parameter, if this is a `$name` back-reference.
    pub fn referenced_parameter(&self) -> Option<&str> {
        if !self.arguments.is_empty() {
            return None;
        }
        self.name.strip_prefix('$')
    }
}

/// Anything that cannot be evaluated at compile time.
///
/// `Array` and `Hash` only appear when at least one element is deferred;
/// a collection of plain data is always a [`Literal`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Deferred {
    Invocation(DeferredInvocation),
    Array(Vec<Value>),
    Hash(IndexMap<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    Literal(Literal),
    Deferred(Deferred),
}

impl Value {
    pub fn invocation(name: impl Into<String>, arguments: Vec<Value>) -> Self {
        Value::Deferred(Deferred::Invocation(DeferredInvocation::new(name, arguments)))
    }

    /// Build an array value, collapsing to a literal when nothing is deferred.
    pub fn array(items: Vec<Value>) -> Self {
        if items.iter().all(|v| matches!(v, Value::Literal(_))) {
            let literals = items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Literal(l) => Some(l),
                    Value::Deferred(_) => None,
                })
                .collect();
            Value::Literal(Literal::Array(literals))
        } else {
            Value::Deferred(Deferred::Array(items))
        }
    }

    /// Build a hash value, collapsing to a literal when nothing is deferred.
    pub fn hash(entries: IndexMap<String, Value>) -> Self {
        if entries.values().all(|v| matches!(v, Value::Literal(_))) {
            let literals = entries
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::Literal(l) => Some((k, l)),
                    Value::Deferred(_) => None,
                })
                .collect();
            Value::Literal(Literal::Hash(literals))
        } else {
            Value::Deferred(Deferred::Hash(entries))
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Literal(l) => Some(l),
            Value::Deferred(_) => None,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Value::Deferred(_))
    }

    /// Names of all `$name` back-references, depth first.
    pub fn parameter_references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        collect_references(self, &mut refs);
        refs
    }
}

fn collect_references<'a>(value: &'a Value, refs: &mut Vec<&'a str>) {
    match value {
        Value::Literal(_) => {}
        Value::Deferred(Deferred::Invocation(inv)) => {
            if let Some(name) = inv.referenced_parameter() {
                refs.push(name);
            }
            for arg in &inv.arguments {
                collect_references(arg, refs);
            }
        }
        Value::Deferred(Deferred::Array(items)) => {
            for item in items {
                collect_references(item, refs);
            }
        }
        Value::Deferred(Deferred::Hash(entries)) => {
            for item in entries.values() {
                collect_references(item, refs);
            }
        }
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// A typed parameter or return value of a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Only on returns: the runtime field this return is bound from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip)]
    pub location: SourceLocation,
}

impl Parameter {
    /// Name of the runtime field that provides this value.
    pub fn source_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

// =============================================================================
// STEPS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Action,
    Call,
    Resource,
    Workflow,
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Style::Action => write!(f, "action"),
            Style::Call => write!(f, "call"),
            Style::Resource => write!(f, "resource"),
            Style::Workflow => write!(f, "workflow"),
        }
    }
}

/// Kind-specific part of a step, decided once during classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum StepKind {
    Action {
        action: String,
    },
    Call {
        call: String,
    },
    Resource {
        #[serde(rename = "resourceType")]
        resource_type: TypeRef,
        /// Desired state, keyed by attribute of `resource_type`.
        #[serde(skip_serializing_if = "IndexMap::is_empty")]
        state: IndexMap<String, Value>,
        #[serde(rename = "externalId", skip_serializing_if = "Option::is_none")]
        external_id: Option<String>,
    },
    Workflow {
        steps: Vec<StepDefinition>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDefinition {
    pub identifier: Identifier,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<Parameter>,
    #[serde(flatten)]
    pub kind: StepKind,
    pub origin: Origin,
}

impl StepDefinition {
    pub fn style(&self) -> Style {
        match &self.kind {
            StepKind::Action { .. } => Style::Action,
            StepKind::Call { .. } => Style::Call,
            StepKind::Resource { .. } => Style::Resource,
            StepKind::Workflow { .. } => Style::Workflow,
        }
    }

    /// Nested steps; empty unless this is a workflow.
    pub fn steps(&self) -> &[StepDefinition] {
        match &self.kind {
            StepKind::Workflow { steps } => steps,
            _ => &[],
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn returned(&self, name: &str) -> Option<&Parameter> {
        self.returns.iter().find(|p| p.name == name)
    }

    /// Depth-first search for a definition by qualified identifier.
    pub fn find(&self, identifier: &str) -> Option<&StepDefinition> {
        if self.identifier.as_str() == identifier {
            return Some(self);
        }
        self.steps().iter().find_map(|s| s.find(identifier))
    }
}

/// The root of a compiled document: a step of style `workflow` that owns
/// the whole tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WorkflowDefinition {
    root: StepDefinition,
}

impl WorkflowDefinition {
    pub(crate) fn new(root: StepDefinition) -> Self {
        debug_assert_eq!(root.style(), Style::Workflow);
        WorkflowDefinition { root }
    }

    pub fn name(&self) -> &str {
        self.root.identifier.as_str()
    }

    pub fn root(&self) -> &StepDefinition {
        &self.root
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.root.parameters
    }

    pub fn returns(&self) -> &[Parameter] {
        &self.root.returns
    }

    pub fn steps(&self) -> &[StepDefinition] {
        self.root.steps()
    }

    pub fn find(&self, identifier: &str) -> Option<&StepDefinition> {
        self.root.find(identifier)
    }
}
