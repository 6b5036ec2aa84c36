//! Step classification: which kind a step mapping is, and which keys it may
//! carry.
//!
//! A step is classified exactly once into a [`StepShape`]; lowering works on
//! the shape and never looks at the raw kind keys again.

use crate::config::CompileOptions;
use crate::error::{CompileError, ErrorKind, STEP_KIND_KEYS};
use crate::parse::Node;

use super::{KeyedEntry, mapping_entries};

const COMMON_KEYS: [&str; 2] = ["parameters", "returns"];
const RESOURCE_KEYS: [&str; 2] = ["value", "external_id"];
const CONTAINER_KEYS: [&str; 1] = ["typespace"];

#[derive(Debug, Clone, Copy)]
pub enum StepShape<'a> {
    Action { target: &'a Node },
    Call { target: &'a Node },
    Resource { resource: &'a Node },
    Composite { steps: &'a Node },
}

impl StepShape<'_> {
    /// The kind key that selected this shape.
    pub fn key(&self) -> &'static str {
        match self {
            StepShape::Action { .. } => "action",
            StepShape::Call { .. } => "call",
            StepShape::Resource { .. } => "resource",
            StepShape::Composite { .. } => "steps",
        }
    }

    fn allows(&self, key: &str) -> bool {
        COMMON_KEYS.contains(&key)
            || match self {
                StepShape::Resource { .. } => RESOURCE_KEYS.contains(&key),
                StepShape::Composite { .. } => CONTAINER_KEYS.contains(&key),
                _ => false,
            }
    }
}

/// A classified step mapping.
#[derive(Debug, Clone, Copy)]
pub struct StepBody<'a> {
    pub shape: StepShape<'a>,
    pub parameters: Option<&'a Node>,
    pub returns: Option<&'a Node>,
    /// Desired state of a resource.
    pub value: Option<&'a Node>,
    pub external_id: Option<&'a Node>,
    pub typespace: Option<&'a Node>,
}

impl<'a> StepBody<'a> {
    fn new(shape: StepShape<'a>, entries: &[KeyedEntry<'a>]) -> Self {
        let find = |key: &str| entries.iter().find(|e| e.key == key).map(|e| e.value);
        StepBody {
            shape,
            parameters: find("parameters"),
            returns: find("returns"),
            value: find("value"),
            external_id: find("external_id"),
            typespace: find("typespace"),
        }
    }
}

fn is_known_key(key: &str) -> bool {
    STEP_KIND_KEYS.contains(&key)
        || COMMON_KEYS.contains(&key)
        || RESOURCE_KEYS.contains(&key)
        || CONTAINER_KEYS.contains(&key)
}

fn unexpected_key(entry: &KeyedEntry<'_>, context: String) -> CompileError {
    CompileError::new(
        ErrorKind::UnexpectedKey {
            key: entry.key.to_string(),
            context,
        },
        entry.key_node.location.clone(),
    )
}

fn shape_for<'a>(key: &str, node: &'a Node) -> StepShape<'a> {
    match key {
        "action" => StepShape::Action { target: node },
        "call" => StepShape::Call { target: node },
        "resource" => StepShape::Resource { resource: node },
        _ => StepShape::Composite { steps: node },
    }
}

/// Classify the body of a nested step. Errors are located at `name`, the
/// step's key in its container.
pub fn classify_step<'a>(
    name: &'a Node,
    body: &'a Node,
    options: &CompileOptions,
) -> Result<StepBody<'a>, CompileError> {
    let step_name = name.as_scalar().unwrap_or_default();

    // An empty body carries none of the kind keys.
    if body.is_null() {
        return Err(CompileError::new(
            ErrorKind::LegacyStepSyntax,
            name.location.clone(),
        ));
    }
    let entries = mapping_entries(body, &format!("step '{}'", step_name))?;

    let kinds: Vec<&KeyedEntry<'a>> = STEP_KIND_KEYS
        .iter()
        .filter_map(|k| entries.iter().find(|e| e.key == *k))
        .collect();

    let shape = match kinds.as_slice() {
        [] => {
            return Err(CompileError::new(
                ErrorKind::LegacyStepSyntax,
                name.location.clone(),
            ));
        }
        [only] => shape_for(only.key, only.value),
        many => {
            return Err(CompileError::new(
                ErrorKind::AmbiguousStepKind {
                    found: many.iter().map(|e| e.key.to_string()).collect(),
                },
                name.location.clone(),
            ));
        }
    };

    for entry in &entries {
        if entry.key == shape.key() || shape.allows(entry.key) {
            continue;
        }
        if is_known_key(entry.key) || options.strict_keys {
            return Err(unexpected_key(entry, format!("a {} step", shape.key())));
        }
    }

    Ok(StepBody::new(shape, &entries))
}

/// Classify the body of the top-level workflow. It is always a container:
/// `steps` is required and no other kind key is accepted.
pub fn classify_workflow<'a>(
    name: &'a Node,
    body: &'a Node,
    options: &CompileOptions,
) -> Result<StepBody<'a>, CompileError> {
    let workflow_name = name.as_scalar().unwrap_or_default();
    let context = format!("workflow '{}'", workflow_name);

    if body.is_null() {
        return Err(CompileError::new(
            ErrorKind::MissingKey {
                context,
                key: "steps".into(),
            },
            name.location.clone(),
        ));
    }
    let entries = mapping_entries(body, &context)?;

    let steps = entries
        .iter()
        .find(|e| e.key == "steps")
        .ok_or_else(|| {
            CompileError::new(
                ErrorKind::MissingKey {
                    context: context.clone(),
                    key: "steps".into(),
                },
                name.location.clone(),
            )
        })?;
    let shape = StepShape::Composite { steps: steps.value };

    for entry in &entries {
        if entry.key == "steps" || shape.allows(entry.key) {
            continue;
        }
        if is_known_key(entry.key) || options.strict_keys {
            return Err(unexpected_key(entry, context.clone()));
        }
    }

    Ok(StepBody::new(shape, &entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;

    fn classify(yaml: &str, options: &CompileOptions) -> Result<&'static str, CompileError> {
        let doc = parse_document("t.yaml", yaml).unwrap().unwrap();
        let (name, body) = &doc.as_mapping().unwrap()[0];
        classify_step(name, body, options).map(|b| b.shape.key())
    }

    #[test]
    fn selects_single_kind() {
        let opts = CompileOptions::default();
        assert_eq!(classify("s:\n  call: x\n", &opts).unwrap(), "call");
        assert_eq!(classify("s:\n  resource: X\n  value: {}\n", &opts).unwrap(), "resource");
        assert_eq!(classify("s:\n  steps: {}\n  typespace: aws\n", &opts).unwrap(), "steps");
    }

    #[test]
    fn legacy_and_ambiguous() {
        let opts = CompileOptions::default();
        let err = classify("s:\n  input: x\n", &opts).unwrap_err();
        assert_eq!(err.kind, ErrorKind::LegacyStepSyntax);
        assert_eq!((err.location.line, err.location.column), (1, 1));

        let err = classify("s:\n  steps: {}\n  call: c\n  action: a\n", &opts).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::AmbiguousStepKind {
                found: vec!["action".into(), "call".into(), "steps".into()]
            }
        );
    }

    #[test]
    fn kind_specific_keys_are_enforced() {
        let lenient = CompileOptions {
            strict_keys: false,
            ..CompileOptions::default()
        };
        let err = classify("s:\n  call: c\n  value: {}\n", &lenient).unwrap_err();
        assert_eq!(
            err.kind.to_string(),
            "the key 'value' is not valid in a call step"
        );
        assert!(classify("s:\n  call: c\n  note: hi\n", &lenient).is_ok());
        assert!(classify("s:\n  call: c\n  note: hi\n", &CompileOptions::default()).is_err());
    }
}
