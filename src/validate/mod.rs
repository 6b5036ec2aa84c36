//! Structural validation of step mappings (pre-lowering).
//!
//! Checks key shapes only: which keys a mapping has, whether they are unique,
//! and which step kind they select. Types and references are checked later
//! while lowering.

pub mod classify;

pub use classify::{StepBody, StepShape, classify_step, classify_workflow};

use std::collections::HashSet;

use crate::error::{CompileError, ErrorKind};
use crate::parse::Node;

/// One entry of a mapping whose keys are plain names.
#[derive(Debug, Clone, Copy)]
pub struct KeyedEntry<'a> {
    pub key: &'a str,
    pub key_node: &'a Node,
    pub value: &'a Node,
}

/// The entries of a mapping node, in document order.
///
/// Keys must be scalars and unique; the second occurrence of a key is
/// reported as a duplicate.
pub fn mapping_entries<'a>(
    node: &'a Node,
    subject: &str,
) -> Result<Vec<KeyedEntry<'a>>, CompileError> {
    let entries = node
        .as_mapping()
        .ok_or_else(|| CompileError::unexpected_node(subject, "a mapping", node))?;

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(entries.len());
    for (key_node, value) in entries {
        let key = key_node
            .as_scalar()
            .ok_or_else(|| CompileError::unexpected_node("a mapping key", "a scalar", key_node))?;
        if !seen.insert(key) {
            return Err(CompileError::new(
                ErrorKind::DuplicateName {
                    what: "key".into(),
                    name: key.to_string(),
                },
                key_node.location.clone(),
            ));
        }
        out.push(KeyedEntry {
            key,
            key_node,
            value,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_document;

    #[test]
    fn duplicate_keys_point_at_second_occurrence() {
        let doc = parse_document("t.yaml", "a: 1\nb: 2\na: 3\n").unwrap().unwrap();
        let err = mapping_entries(&doc, "a step").unwrap_err();
        assert_eq!(err.code(), "D001");
        assert_eq!((err.location.line, err.location.column), (3, 1));
    }

    #[test]
    fn non_mapping_is_rejected() {
        let doc = parse_document("t.yaml", "- a\n").unwrap().unwrap();
        let err = mapping_entries(&doc, "step 'x'").unwrap_err();
        assert_eq!(
            err.kind.to_string(),
            "step 'x' must be a mapping, got a sequence"
        );
    }

    #[test]
    fn complex_keys_are_rejected() {
        let doc = parse_document("t.yaml", "? [a, b]\n: 1\n").unwrap().unwrap();
        let err = mapping_entries(&doc, "a step").unwrap_err();
        assert_eq!(err.code(), "S008");
    }
}
