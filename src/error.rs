//! Unified compiler error type used across all phases.
//!
//! Compilation is fail-fast: the first problem found aborts the whole
//! document, so every phase returns a single located [`CompileError`].

use std::fmt;

use crate::parse::SourceLocation;

/// Keys that select a step kind, in the order diagnostics enumerate them.
pub const STEP_KIND_KEYS: [&str; 4] = ["action", "call", "resource", "steps"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Structural,
    Type,
    Reference,
    DuplicateName,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Structural => write!(f, "StructuralError"),
            Category::Type => write!(f, "TypeError"),
            Category::Reference => write!(f, "ReferenceError"),
            Category::DuplicateName => write!(f, "DuplicateNameError"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("{message}")]
    YamlSyntax { message: String },

    #[error("a workflow document must contain exactly one top-level workflow, found {found}")]
    InvalidDocument { found: usize },

    #[error("a step must contain one of the keys 'action', 'call', 'resource', or 'steps'")]
    LegacyStepSyntax,

    #[error(
        "a step must contain exactly one of the keys 'action', 'call', 'resource', or 'steps', found {}",
        quote_list(.found)
    )]
    AmbiguousStepKind { found: Vec<String> },

    #[error("{context} must contain the key '{key}'")]
    MissingKey { context: String, key: String },

    #[error("the key '{key}' is not valid in {context}")]
    UnexpectedKey { key: String, context: String },

    #[error("the keys '{first}' and '{second}' cannot be combined")]
    ConflictingKeys { first: String, second: String },

    #[error("{subject} must be {expected}, got {found}")]
    UnexpectedNode {
        subject: String,
        expected: String,
        found: String,
    },

    #[error("'steps' must contain at least one step")]
    EmptySteps,

    #[error("'{name}' is not a valid {what} name")]
    InvalidName { what: String, name: String },

    #[error("unsupported tag '{tag}'")]
    UnsupportedTag { tag: String },

    #[error("Reference to unresolved type '{name}'")]
    UnresolvedType { name: String },

    #[error("{detail}")]
    TypeSyntax { detail: String },

    #[error("{subject} value {value} does not match type {expected}")]
    TypeMismatch {
        subject: String,
        value: String,
        expected: String,
    },

    #[error("resource type {type_name} is not an object type")]
    InvalidResourceType { type_name: String },

    #[error("A {type_name} has no attribute named {attribute}")]
    UnresolvedAttribute { type_name: String, attribute: String },

    #[error("reference to unresolved parameter '${name}'")]
    UnresolvedParameter { name: String },

    #[error("no step in '{container}' produces the return value '{name}'")]
    UnresolvedReturn { container: String, name: String },

    #[error("duplicate {what} name '{name}'")]
    DuplicateName { what: String, name: String },
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::YamlSyntax { .. } => "S001",
            ErrorKind::InvalidDocument { .. } => "S002",
            ErrorKind::LegacyStepSyntax => "S003",
            ErrorKind::AmbiguousStepKind { .. } => "S004",
            ErrorKind::MissingKey { .. } => "S005",
            ErrorKind::UnexpectedKey { .. } => "S006",
            ErrorKind::ConflictingKeys { .. } => "S007",
            ErrorKind::UnexpectedNode { .. } => "S008",
            ErrorKind::EmptySteps => "S009",
            ErrorKind::InvalidName { .. } => "S010",
            ErrorKind::UnsupportedTag { .. } => "S011",
            ErrorKind::UnresolvedType { .. } => "T001",
            ErrorKind::TypeSyntax { .. } => "T002",
            ErrorKind::TypeMismatch { .. } => "T003",
            ErrorKind::InvalidResourceType { .. } => "T004",
            ErrorKind::UnresolvedAttribute { .. } => "R001",
            ErrorKind::UnresolvedParameter { .. } => "R002",
            ErrorKind::UnresolvedReturn { .. } => "R003",
            ErrorKind::DuplicateName { .. } => "D001",
        }
    }

    pub fn category(&self) -> Category {
        match self.code().as_bytes()[0] {
            b'T' => Category::Type,
            b'R' => Category::Reference,
            b'D' => Category::DuplicateName,
            _ => Category::Structural,
        }
    }
}

/// A located compilation failure.
///
/// Renders as `<message> (file: <path>, line: <N>, column: <M>)`, followed by
/// `\nCaused by: <inner>` when a lower-level failure was wrapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub location: SourceLocation,
    pub cause: Option<String>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, location: SourceLocation) -> Self {
        CompileError {
            kind,
            location,
            cause: None,
        }
    }

    pub fn caused_by(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    pub fn unexpected_node(
        subject: impl Into<String>,
        expected: impl Into<String>,
        node: &crate::parse::Node,
    ) -> Self {
        CompileError::new(
            ErrorKind::UnexpectedNode {
                subject: subject.into(),
                expected: expected.into(),
                found: node.describe().to_string(),
            },
            node.location.clone(),
        )
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.location)?;
        if let Some(cause) = &self.cause {
            write!(f, "\nCaused by: {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

fn quote_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{}'", s)).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}
