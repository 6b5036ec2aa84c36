//! Lowering phase: node tree → WorkflowDefinition.
//!
//! Walks the parsed document depth first, consulting the type resolver for
//! every type expression, and stops at the first error.

pub mod deferred;
pub mod parameter;
pub mod scalar;
pub mod step;
pub mod type_ref;

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::config::CompileOptions;
use crate::error::{CompileError, ErrorKind};
use crate::ir::WorkflowDefinition;
use crate::parse::{self, SourceLocation};
use crate::types::TypeResolver;
use step::StepCompiler;

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Step, parameter and reference names: `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

/// Compile one workflow document.
///
/// `file` is used verbatim in every diagnostic. The document must hold exactly
/// one top-level entry: the workflow name mapped to its body.
pub fn compile(
    file: &str,
    text: &str,
    types: &dyn TypeResolver,
    options: &CompileOptions,
) -> Result<WorkflowDefinition, CompileError> {
    debug!(file, "compiling workflow document");

    let root = parse::parse_document(file, text)?.ok_or_else(|| {
        CompileError::new(
            ErrorKind::InvalidDocument { found: 0 },
            SourceLocation::start_of(Arc::from(file)),
        )
    })?;
    let entries = root.as_mapping().ok_or_else(|| {
        CompileError::unexpected_node("a workflow document", "a mapping", &root)
    })?;
    let [(name, body)] = entries else {
        return Err(CompileError::new(
            ErrorKind::InvalidDocument {
                found: entries.len(),
            },
            root.location.clone(),
        ));
    };

    let workflow = StepCompiler::new(types, options).compile_workflow(name, body)?;
    let definition = WorkflowDefinition::new(workflow);
    debug!(
        workflow = definition.name(),
        steps = definition.steps().len(),
        "compiled workflow"
    );
    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Style, Value};
    use crate::types::TypeRegistry;

    fn types() -> TypeRegistry {
        TypeRegistry::builder()
            .object(
                "Aws::Vpc",
                [("vpcId", "Optional[String]"), ("cidrBlock", "String"), ("tags", "Hash[String, String]")],
            )
            .build()
            .unwrap()
    }

    fn compile_str(yaml: &str) -> Result<WorkflowDefinition, CompileError> {
        compile("wf.yaml", yaml, &types(), &CompileOptions::default())
    }

    #[test]
    fn names() {
        assert!(valid_name("aws_vpc"));
        assert!(valid_name("_x1"));
        assert!(!valid_name("1x"));
        assert!(!valid_name("a-b"));
        assert!(!valid_name(""));
    }

    #[test]
    fn minimal_workflow() {
        let wf = compile_str("wf:\n  steps:\n    hello:\n      action: greet\n").unwrap();
        assert_eq!(wf.name(), "wf");
        assert_eq!(wf.root().style(), Style::Workflow);
        assert_eq!(wf.steps()[0].identifier.as_str(), "wf::hello");
        assert_eq!(wf.steps()[0].style(), Style::Action);
    }

    #[test]
    fn document_must_hold_one_workflow() {
        let err = compile_str("").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidDocument { found: 0 });
        let err = compile_str("a:\n  steps: {x: {call: c}}\nb:\n  steps: {y: {call: c}}\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidDocument { found: 2 });
        let err = compile_str("- a\n").unwrap_err();
        assert_eq!(err.code(), "S008");
    }

    #[test]
    fn root_requires_steps_and_rejects_kind_keys() {
        let err = compile_str("wf:\n  parameters: [a]\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "workflow 'wf' must contain the key 'steps' (file: wf.yaml, line: 1, column: 1)"
        );
        let err = compile_str("wf:\n  call: x\n  steps: {a: {call: y}}\n").unwrap_err();
        assert_eq!(err.code(), "S006");
        assert_eq!(err.location.line, 2);
    }

    #[test]
    fn empty_steps() {
        let err = compile_str("wf:\n  steps: {}\n").unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptySteps);
        assert_eq!((err.location.line, err.location.column), (2, 10));
    }

    #[test]
    fn sequence_of_steps_keeps_order() {
        let wf = compile_str("wf:\n  steps:\n    - b: {call: x}\n    - a: {call: y}\n").unwrap();
        let names: Vec<&str> = wf.steps().iter().map(|s| s.identifier.local_name()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn duplicate_step_names() {
        let err = compile_str("wf:\n  steps:\n    - a: {call: x}\n    - a: {call: y}\n").unwrap_err();
        assert_eq!(err.to_string(), "duplicate step name 'a' (file: wf.yaml, line: 4, column: 7)");
    }

    #[test]
    fn references_become_implicit_parameters() {
        let wf = compile_str(
            "wf:\n  parameters:\n    tags: Hash[String,String]\n  steps:\n    vpc:\n      resource: Aws::Vpc\n      value:\n        tags: $tags\n",
        )
        .unwrap();
        let vpc = &wf.steps()[0];
        assert_eq!(vpc.parameters.len(), 1);
        assert_eq!(vpc.parameters[0].name, "tags");
        assert_eq!(vpc.parameters[0].ty.name(), "Hash[String, String]");
        assert!(vpc.parameters[0].value.is_none());
    }

    #[test]
    fn implicit_parameters_can_be_disabled() {
        let options = CompileOptions {
            implicit_parameters: false,
            ..CompileOptions::default()
        };
        let yaml = "wf:\n  parameters: [tags]\n  steps:\n    vpc:\n      resource: Aws::Vpc\n      value:\n        tags: $tags\n";
        let err = compile("wf.yaml", yaml, &types(), &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedParameter { name: "tags".into() });
        assert_eq!((err.location.line, err.location.column), (7, 15));
    }

    #[test]
    fn scope_is_forward_only() {
        let err = compile_str(
            "wf:\n  steps:\n    first:\n      call: a\n      parameters:\n        x:\n          value: $later\n    second:\n      call: b\n      returns: later\n",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "reference to unresolved parameter '$later' (file: wf.yaml, line: 7, column: 18)"
        );
    }

    #[test]
    fn sibling_returns_feed_later_steps() {
        let wf = compile_str(
            "wf:\n  steps:\n    vpc:\n      resource: Aws::Vpc\n      returns: vpcId\n    use:\n      call: attach\n      parameters: [vpcId]\n",
        )
        .unwrap();
        let used = &wf.steps()[1];
        assert_eq!(used.parameters[0].ty.name(), "Any");
        assert_eq!(wf.steps()[0].returns[0].ty.name(), "Optional[String]");
    }

    #[test]
    fn duplicate_sibling_returns() {
        let err = compile_str(
            "wf:\n  steps:\n    a:\n      call: x\n      returns: out\n    b:\n      call: y\n      returns: out\n",
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateName { what: "return".into(), name: "out".into() });
        assert_eq!(err.location.line, 8);
    }

    #[test]
    fn container_returns_need_a_producer() {
        let err = compile_str("wf:\n  returns: missing\n  steps:\n    a:\n      call: x\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "no step in 'wf' produces the return value 'missing' (file: wf.yaml, line: 2, column: 12)"
        );
    }

    #[test]
    fn nested_containers_inherit_outer_references() {
        let wf = compile_str(
            "wf:\n  parameters:\n    region: String\n  steps:\n    group:\n      steps:\n        inner:\n          call: deploy\n          parameters:\n            where:\n              value: $region\n",
        )
        .unwrap();
        let group = &wf.steps()[0];
        assert_eq!(group.parameters[0].name, "region");
        assert_eq!(group.parameters[0].ty.name(), "String");
        let inner = &group.steps()[0];
        assert_eq!(inner.identifier.as_str(), "wf::group::inner");
        assert_eq!(
            inner.parameter("where").unwrap().value,
            Some(Value::invocation("$region", vec![]))
        );
        assert_eq!(inner.parameter("region").unwrap().ty.name(), "String");
    }

    #[test]
    fn typespace_applies_to_nested_resources() {
        let wf = compile_str(
            "wf:\n  typespace: aws\n  steps:\n    vpc:\n      resource: Vpc\n      value:\n        cidrBlock: 10.0.0.0/16\n",
        )
        .unwrap();
        let crate::ir::StepKind::Resource { resource_type, state, .. } = &wf.steps()[0].kind else {
            panic!("expected a resource step");
        };
        assert_eq!(resource_type.name(), "Aws::Vpc");
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn state_literals_are_type_checked() {
        let err = compile_str(
            "wf:\n  steps:\n    vpc:\n      resource: Aws::Vpc\n      value:\n        cidrBlock: 42\n",
        )
        .unwrap_err();
        assert_eq!(err.code(), "T003");
        assert!(err.to_string().contains("\nCaused by: expected a value of type String, got Integer 42"));
    }

    #[test]
    fn default_referring_to_itself() {
        let err = compile_str(
            "wf:\n  steps:\n    vpc:\n      resource: Aws::Vpc\n      parameters:\n        tags:\n          value: {a: $tags}\n      value:\n        tags: $tags\n",
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "reference to unresolved parameter '$tags' (file: wf.yaml, line: 7, column: 22)"
        );
    }

    #[test]
    fn defaults_may_chain_but_not_cycle() {
        let wf = compile_str(
            "wf:\n  steps:\n    s:\n      call: x\n      parameters:\n        a:\n          value: $b\n        b:\n          value: 1\n",
        )
        .unwrap();
        assert_eq!(wf.steps()[0].parameters.len(), 2);

        let err = compile_str(
            "wf:\n  steps:\n    s:\n      call: x\n      parameters:\n        a:\n          value: $b\n        b:\n          value: [$a]\n",
        )
        .unwrap_err();
        assert_eq!(err.code(), "R002");
        assert_eq!(err.kind.to_string(), "reference to unresolved parameter '$a'");
        assert_eq!((err.location.line, err.location.column), (9, 19));
    }
}
