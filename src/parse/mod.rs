//! Parse phase: YAML text → location-carrying node tree.

pub mod loader;
pub mod location;
pub mod node;

pub use location::SourceLocation;
pub use node::{Node, NodeKind, NodeTag, Scalar};

use std::sync::Arc;

use yaml_rust2::parser::Parser;

use crate::error::{CompileError, ErrorKind};
use loader::TreeBuilder;

/// Parse the first document of `text`. `file` is used verbatim in every
/// location. Returns `None` for an empty stream.
pub fn parse_document(file: &str, text: &str) -> Result<Option<Node>, CompileError> {
    let file: Arc<str> = Arc::from(file);
    let mut builder = TreeBuilder::new(file);
    let mut parser = Parser::new_from_str(text);
    if let Err(e) = parser.load(&mut builder, false) {
        let location = builder.location(e.marker());
        return Err(CompileError::new(
            ErrorKind::YamlSyntax {
                message: e.info().to_string(),
            },
            location,
        ));
    }
    if let Some(location) = builder.overflow() {
        return Err(CompileError::new(
            ErrorKind::YamlSyntax {
                message: format!(
                    "aliases expand to more than {} nodes",
                    loader::MAX_ALIAS_NODES
                ),
            },
            location.clone(),
        ));
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_are_one_based() {
        let doc = parse_document("wf.yaml", "wf:\n  steps:\n    a:\n      call: x\n")
            .unwrap()
            .unwrap();
        assert_eq!((doc.location.line, doc.location.column), (1, 1));

        let steps = doc.get("wf").unwrap().get("steps").unwrap();
        let (key, body) = &steps.as_mapping().unwrap()[0];
        assert_eq!((key.location.line, key.location.column), (3, 5));
        let call = body.get("call").unwrap();
        assert_eq!((call.location.line, call.location.column), (4, 13));
    }

    #[test]
    fn scalar_styles_are_recorded() {
        let doc = parse_document("t.yaml", "a: 1\nb: '1'\n").unwrap().unwrap();
        let entries = doc.as_mapping().unwrap();
        assert!(matches!(&entries[0].1.kind, NodeKind::Scalar(s) if s.plain));
        assert!(matches!(&entries[1].1.kind, NodeKind::Scalar(s) if !s.plain));
    }

    #[test]
    fn local_tags_are_kept() {
        let doc = parse_document("t.yaml", "v: !lookup aws.tags\n").unwrap().unwrap();
        let v = doc.get("v").unwrap();
        assert_eq!(v.tag, Some(NodeTag::Local("lookup".into())));
        assert_eq!(v.as_scalar(), Some("aws.tags"));
    }

    #[test]
    fn aliases_are_expanded() {
        let doc = parse_document("t.yaml", "a: &x [1, 2]\nb: *x\n").unwrap().unwrap();
        assert_eq!(doc.get("b").unwrap().as_sequence().unwrap().len(), 2);
    }

    #[test]
    fn alias_expansion_is_bounded() {
        let ten = |item: &str| vec![item; 10].join(", ");
        let text = format!(
            "a: &a [{}]\nb: &b [{}]\nc: &c [{}]\nd: &d [{}]\ne: [{}]\n",
            ten("x"),
            ten("*a"),
            ten("*b"),
            ten("*c"),
            ten("*d")
        );
        let err = parse_document("laughs.yaml", &text).unwrap_err();
        assert_eq!(err.code(), "S001");
        assert_eq!(err.kind.to_string(), "aliases expand to more than 10000 nodes");
        assert_eq!(err.location.line, 4);
    }

    #[test]
    fn empty_stream_yields_none() {
        assert!(parse_document("t.yaml", "").unwrap().is_none());
    }

    #[test]
    fn syntax_error_is_located() {
        let err = parse_document("bad.yaml", "a: [1, 2\n").unwrap_err();
        assert_eq!(err.code(), "S001");
        assert_eq!(&*err.location.file, "bad.yaml");
    }
}
