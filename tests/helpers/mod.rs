#![allow(dead_code)]

use workflow_compiler::{CompileError, CompileOptions, TypeRegistry, WorkflowDefinition, compile};

// =============================================================================
// Fixtures
// =============================================================================

/// Object types shared by every fixture (`Aws::Vpc`, `Aws::Subnet`,
/// `Kubernetes::Namespace`).
pub fn types() -> TypeRegistry {
    TypeRegistry::from_json(include_str!("../fixtures/types.json")).expect("types.json should load")
}

/// Text of `tests/fixtures/<name>`.
pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {}", path, e))
}

/// Compile a fixture with default options. Diagnostics name the file
/// `fixtures/<name>`.
pub fn compile_fixture(name: &str) -> Result<WorkflowDefinition, CompileError> {
    compile_fixture_with(name, &CompileOptions::default())
}

pub fn compile_fixture_with(
    name: &str,
    options: &CompileOptions,
) -> Result<WorkflowDefinition, CompileError> {
    compile(&format!("fixtures/{}", name), &fixture(name), &types(), options)
}

/// Compile inline YAML against the fixture types.
pub fn compile_str(yaml: &str) -> Result<WorkflowDefinition, CompileError> {
    compile("inline.yaml", yaml, &types(), &CompileOptions::default())
}

// =============================================================================
// Assertions
// =============================================================================

/// `name: type` pairs, in order.
pub fn signature(params: &[workflow_compiler::ir::Parameter]) -> Vec<String> {
    params
        .iter()
        .map(|p| format!("{}: {}", p.name, p.ty))
        .collect()
}

/// Local names of a list of steps.
pub fn step_names(steps: &[workflow_compiler::StepDefinition]) -> Vec<&str> {
    steps.iter().map(|s| s.identifier.local_name()).collect()
}
