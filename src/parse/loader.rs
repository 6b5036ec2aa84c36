//! yaml-rust2 event receiver that assembles a [`Node`] tree with marks.

use std::collections::HashMap;
use std::sync::Arc;

use yaml_rust2::parser::{Event, MarkedEventReceiver, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use super::location::SourceLocation;
use super::node::{Node, NodeKind, NodeTag};

const CORE_SCHEMA_PREFIX: &str = "tag:yaml.org,2002:";

/// Upper bound on the nodes copied in by alias expansion, per document.
pub const MAX_ALIAS_NODES: usize = 10_000;

enum Frame {
    Sequence {
        location: SourceLocation,
        tag: Option<NodeTag>,
        anchor: usize,
        items: Vec<Node>,
    },
    Mapping {
        location: SourceLocation,
        tag: Option<NodeTag>,
        anchor: usize,
        entries: Vec<(Node, Node)>,
        pending_key: Option<Node>,
    },
}

/// Builds the first document of a stream.
pub struct TreeBuilder {
    file: Arc<str>,
    stack: Vec<Frame>,
    /// Anchored nodes with their node counts.
    anchors: HashMap<usize, (Node, usize)>,
    expanded: usize,
    overflow: Option<SourceLocation>,
    root: Option<Node>,
}

impl TreeBuilder {
    pub fn new(file: Arc<str>) -> Self {
        TreeBuilder {
            file,
            stack: Vec::new(),
            anchors: HashMap::new(),
            expanded: 0,
            overflow: None,
            root: None,
        }
    }

    pub fn finish(self) -> Option<Node> {
        self.root
    }

    /// Location of the first alias that would exceed [`MAX_ALIAS_NODES`].
    pub fn overflow(&self) -> Option<&SourceLocation> {
        self.overflow.as_ref()
    }

    pub fn location(&self, mark: &Marker) -> SourceLocation {
        SourceLocation::new(self.file.clone(), mark.line(), mark.col() + 1)
    }

    fn attach(&mut self, node: Node, anchor: usize) {
        if anchor > 0 {
            self.anchors.insert(anchor, (node.clone(), node_count(&node)));
        }
        match self.stack.last_mut() {
            None => {
                if self.root.is_none() {
                    self.root = Some(node);
                }
            }
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                Some(key) => entries.push((key, node)),
                None => *pending_key = Some(node),
            },
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        match ev {
            Event::Scalar(text, style, anchor, tag) => {
                let mut node = Node::scalar(
                    self.location(&mark),
                    text,
                    matches!(style, TScalarStyle::Plain),
                );
                node.tag = tag.map(convert_tag);
                self.attach(node, anchor);
            }
            Event::SequenceStart(anchor, tag) => {
                let location = self.location(&mark);
                self.stack.push(Frame::Sequence {
                    location,
                    tag: tag.map(convert_tag),
                    anchor,
                    items: Vec::new(),
                });
            }
            Event::MappingStart(anchor, tag) => {
                let location = self.location(&mark);
                self.stack.push(Frame::Mapping {
                    location,
                    tag: tag.map(convert_tag),
                    anchor,
                    entries: Vec::new(),
                    pending_key: None,
                });
            }
            Event::SequenceEnd | Event::MappingEnd => {
                let (node, anchor) = match self.stack.pop() {
                    Some(Frame::Sequence {
                        location,
                        tag,
                        anchor,
                        items,
                    }) => (
                        Node {
                            location,
                            tag,
                            kind: NodeKind::Sequence(items),
                        },
                        anchor,
                    ),
                    Some(Frame::Mapping {
                        location,
                        tag,
                        anchor,
                        entries,
                        ..
                    }) => (
                        Node {
                            location,
                            tag,
                            kind: NodeKind::Mapping(entries),
                        },
                        anchor,
                    ),
                    None => return,
                };
                self.attach(node, anchor);
            }
            Event::Alias(id) => {
                if self.overflow.is_some() {
                    return;
                }
                // The parser rejects unknown anchors before we see them.
                let Some((node, count)) = self.anchors.get(&id) else {
                    return;
                };
                if self.expanded + count > MAX_ALIAS_NODES {
                    self.overflow = Some(self.location(&mark));
                    return;
                }
                self.expanded += count;
                let node = node.clone();
                self.attach(node, 0);
            }
            _ => {}
        }
    }
}

fn node_count(node: &Node) -> usize {
    1 + match &node.kind {
        NodeKind::Scalar(_) => 0,
        NodeKind::Sequence(items) => items.iter().map(node_count).sum(),
        NodeKind::Mapping(entries) => entries
            .iter()
            .map(|(k, v)| node_count(k) + node_count(v))
            .sum(),
    }
}

fn convert_tag(tag: Tag) -> NodeTag {
    match tag.handle.as_str() {
        "!" => NodeTag::Local(tag.suffix),
        "!!" | CORE_SCHEMA_PREFIX => NodeTag::Core(tag.suffix),
        _ => NodeTag::Other(format!("{}{}", tag.handle, tag.suffix)),
    }
}
