//! Compiler options.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Reject keys a step kind does not know about.
    pub strict_keys: bool,
    /// Turn `$name` references to scope entries (container parameters and
    /// earlier sibling returns) into parameters of the referencing step. When
    /// off, every reference must name a declared parameter.
    pub implicit_parameters: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            strict_keys: true,
            implicit_parameters: true,
        }
    }
}

impl CompileOptions {
    /// Parse options from JSON. Missing fields take their defaults; an empty
    /// string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let opts = CompileOptions::from_json(r#"{"strictKeys": false}"#).unwrap();
        assert!(!opts.strict_keys);
        assert!(opts.implicit_parameters);
        assert_eq!(CompileOptions::from_json("").unwrap(), CompileOptions::default());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(CompileOptions::from_json("{strictKeys").is_err());
    }
}
