//! Location-carrying YAML node tree.
//!
//! This is the only shape the compiler walks. Scalars keep their raw text and
//! whether they were written plain, so literal resolution can follow the YAML
//! core schema later instead of at load time.

use super::location::SourceLocation;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub location: SourceLocation,
    pub tag: Option<NodeTag>,
    pub kind: NodeKind,
}

/// Tag written on a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTag {
    /// `!name`, the deferred function-call syntax.
    Local(String),
    /// `!!str`, `!!int`, ... from the YAML core schema.
    Core(String),
    /// Anything else (verbatim or custom handles).
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    /// Entries in document order. Duplicate keys are kept so that later
    /// phases can report them with the second key's location.
    Mapping(Vec<(Node, Node)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub text: String,
    /// False for quoted and block scalars, which are always strings.
    pub plain: bool,
}

impl Node {
    pub fn scalar(location: SourceLocation, text: impl Into<String>, plain: bool) -> Self {
        Node {
            location,
            tag: None,
            kind: NodeKind::Scalar(Scalar {
                text: text.into(),
                plain,
            }),
        }
    }

    /// Text of a scalar node, whatever its style.
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(&s.text),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(Node, Node)]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// True for untagged plain `~`, `null` or empty scalars, and `!!null`.
    pub fn is_null(&self) -> bool {
        match (&self.kind, &self.tag) {
            (NodeKind::Scalar(_), Some(NodeTag::Core(t))) => t == "null",
            (NodeKind::Scalar(s), None) => {
                s.plain && matches!(s.text.as_str(), "" | "~" | "null" | "Null" | "NULL")
            }
            _ => false,
        }
    }

    /// First value stored under `key` in a mapping node.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k.as_scalar() == Some(key))
            .map(|(_, v)| v)
    }

    /// "a mapping", "a sequence" or "a scalar", for diagnostics.
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            NodeKind::Scalar(_) if self.is_null() => "an empty value",
            NodeKind::Scalar(_) => "a scalar",
            NodeKind::Sequence(_) => "a sequence",
            NodeKind::Mapping(_) => "a mapping",
        }
    }
}
