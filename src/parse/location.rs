//! Source positions attached to every parsed node.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

/// A 1-based position inside a workflow document.
///
/// The file path is shared between all locations of one document and is
/// rendered verbatim, exactly as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: Arc<str>, line: usize, column: usize) -> Self {
        SourceLocation { file, line, column }
    }

    /// Start of the document. Used for errors about an empty document.
    pub fn start_of(file: Arc<str>) -> Self {
        SourceLocation::new(file, 1, 1)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(file: {}, line: {}, column: {})",
            self.file, self.line, self.column
        )
    }
}
