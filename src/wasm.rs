//! WASM entry points for browser use.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::CompileOptions;
use crate::error::CompileError;
use crate::ir::WorkflowDefinition;
use crate::types::TypeRegistry;

/// Compile a workflow document against object types given as JSON.
/// Returns `{status: "success", definition}` or `{status: "error", error}`.
#[wasm_bindgen]
pub fn compile_workflow(path: &str, yaml: &str, types_json: &str, options_json: &str) -> JsValue {
    to_js(&compile_workflow_inner(path, yaml, types_json, options_json))
}

/// Compile only for diagnostics. Returns a JSON array with at most one
/// error, since compilation stops at the first problem.
#[wasm_bindgen]
pub fn validate_workflow(path: &str, yaml: &str, types_json: &str, options_json: &str) -> JsValue {
    to_js(&validate_workflow_inner(path, yaml, types_json, options_json))
}

/// Maps become plain objects, matching the JSON form of the IR.
fn to_js<T: Serialize>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::NULL)
}

fn validate_workflow_inner(
    path: &str,
    yaml: &str,
    types_json: &str,
    options_json: &str,
) -> Vec<ErrorDto> {
    match compile_workflow_inner(path, yaml, types_json, options_json) {
        CompileResult::Success { .. } => Vec::new(),
        CompileResult::Error { error } => vec![error],
    }
}

fn compile_workflow_inner(
    path: &str,
    yaml: &str,
    types_json: &str,
    options_json: &str,
) -> CompileResult {
    // 1. Configuration
    let types = if types_json.trim().is_empty() {
        TypeRegistry::default()
    } else {
        match TypeRegistry::from_json(types_json) {
            Ok(t) => t,
            Err(e) => return CompileResult::config_error(format!("Failed to load types: {}", e)),
        }
    };
    let options = match CompileOptions::from_json(options_json) {
        Ok(o) => o,
        Err(e) => {
            return CompileResult::config_error(format!("Failed to parse options JSON: {}", e));
        }
    };

    // 2. Compile
    match crate::lower::compile(path, yaml, &types, &options) {
        Ok(definition) => CompileResult::Success { definition },
        Err(e) => CompileResult::Error {
            error: ErrorDto::from(e),
        },
    }
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorDto {
    code: String,
    category: String,
    message: String,
    file: Option<String>,
    line: Option<usize>,
    column: Option<usize>,
}

impl From<CompileError> for ErrorDto {
    fn from(e: CompileError) -> Self {
        ErrorDto {
            code: e.code().to_string(),
            category: e.category().to_string(),
            message: e.to_string(),
            file: Some(e.location.file.to_string()),
            line: Some(e.location.line),
            column: Some(e.location.column),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum CompileResult {
    Success { definition: WorkflowDefinition },
    Error { error: ErrorDto },
}

impl CompileResult {
    fn config_error(message: String) -> Self {
        CompileResult::Error {
            error: ErrorDto {
                code: "C001".into(),
                category: "ConfigurationError".into(),
                message,
                file: None,
                line: None,
                column: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: &str = r#"{"Aws::Vpc": {"attributes": {"vpcId": "Optional[String]"}}}"#;

    #[test]
    fn success_serializes_definition() {
        let result = compile_workflow_inner(
            "wf.yaml",
            "wf:\n  steps:\n    vpc:\n      resource: Aws::Vpc\n      returns: vpcId\n",
            TYPES,
            "",
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["definition"]["identifier"], "wf");
        assert_eq!(json["definition"]["steps"][0]["resourceType"], "Aws::Vpc");
        assert_eq!(json["definition"]["steps"][0]["returns"][0]["type"], "Optional[String]");
    }

    #[test]
    fn compile_error_is_located() {
        let errors = validate_workflow_inner("wf.yaml", "wf:\n  steps:\n    a:\n      input: x\n", "", "");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, "S003");
        assert_eq!(errors[0].category, "StructuralError");
        assert_eq!(errors[0].line, Some(3));
        assert_eq!(errors[0].column, Some(5));
    }

    #[test]
    fn bad_configuration_is_reported() {
        let errors = validate_workflow_inner("wf.yaml", "wf: {}", "{not json", "");
        assert_eq!(errors[0].code, "C001");
        assert!(errors[0].file.is_none());

        let errors = validate_workflow_inner("wf.yaml", "wf: {}", "", "[]");
        assert!(errors[0].message.starts_with("Failed to parse options JSON"));
    }

    #[test]
    fn lenient_keys_from_options() {
        let yaml = "wf:\n  steps:\n    a:\n      call: x\n      note: free text\n";
        assert_eq!(validate_workflow_inner("wf.yaml", yaml, "", "")[0].code, "S006");
        assert!(validate_workflow_inner("wf.yaml", yaml, "", r#"{"strictKeys": false}"#).is_empty());
    }
}
