//! Scalar → [`Literal`] resolution following the YAML 1.2 core schema.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{CompileError, ErrorKind};
use crate::ir::Literal;
use crate::parse::{Node, Scalar};

static NULL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?:~|null|Null|NULL|)$").unwrap());
static BOOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:true|True|TRUE|false|False|FALSE)$").unwrap());
static INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+$").unwrap());
static OCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0o[0-7]+$").unwrap());
static HEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").unwrap());
static FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?$").unwrap()
});
static INF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-+]?\.(?:inf|Inf|INF)$").unwrap());
static NAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\.(?:nan|NaN|NAN)$").unwrap());

fn parse_int(text: &str) -> Option<i64> {
    if OCT.is_match(text) {
        i64::from_str_radix(&text[2..], 8).ok()
    } else if HEX.is_match(text) {
        i64::from_str_radix(&text[2..], 16).ok()
    } else if INT.is_match(text) {
        text.parse().ok()
    } else {
        None
    }
}

fn parse_float(text: &str) -> Option<f64> {
    if FLOAT.is_match(text) {
        text.parse().ok()
    } else if INF.is_match(text) {
        Some(if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        })
    } else if NAN.is_match(text) {
        Some(f64::NAN)
    } else {
        None
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    BOOL.is_match(text)
        .then(|| text.eq_ignore_ascii_case("true"))
}

/// Resolve an untagged plain scalar.
pub fn plain(text: &str) -> Literal {
    if NULL.is_match(text) {
        Literal::Undef
    } else if let Some(b) = parse_bool(text) {
        Literal::Boolean(b)
    } else if let Some(i) = parse_int(text) {
        Literal::Integer(i)
    } else if let Some(f) = parse_float(text) {
        Literal::Float(f)
    } else {
        Literal::String(text.to_string())
    }
}

/// Resolve an untagged scalar of any style.
pub fn untagged(scalar: &Scalar) -> Literal {
    if scalar.plain {
        plain(&scalar.text)
    } else {
        Literal::String(scalar.text.clone())
    }
}

/// Resolve a scalar carrying a core schema tag (`!!str`, `!!int`, ...).
pub fn core_tagged(node: &Node, scalar: &Scalar, tag: &str) -> Result<Literal, CompileError> {
    let text = scalar.text.as_str();
    let (literal, expected) = match tag {
        "str" => (Some(Literal::String(text.to_string())), "a string"),
        "int" => (parse_int(text).map(Literal::Integer), "an integer"),
        "float" => (
            parse_float(text)
                .or_else(|| parse_int(text).map(|i| i as f64))
                .map(Literal::Float),
            "a float",
        ),
        "bool" => (parse_bool(text).map(Literal::Boolean), "a boolean"),
        "null" => (NULL.is_match(text).then_some(Literal::Undef), "empty"),
        _ => {
            return Err(CompileError::new(
                ErrorKind::UnsupportedTag {
                    tag: format!("!!{}", tag),
                },
                node.location.clone(),
            ));
        }
    };
    literal.ok_or_else(|| {
        CompileError::new(
            ErrorKind::UnexpectedNode {
                subject: format!("a value tagged '!!{}'", tag),
                expected: expected.to_string(),
                found: format!("'{}'", text),
            },
            node.location.clone(),
        )
    })
}
