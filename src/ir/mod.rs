//! Intermediate representation of compiled workflows.

pub mod graph;
pub mod types;

pub use graph::DependencyGraph;
pub use types::*;
