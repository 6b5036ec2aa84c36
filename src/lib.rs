pub mod config;
pub mod error;
pub mod ir;
pub mod lower;
pub mod parse;
pub mod registry;
pub mod types;
pub mod validate;
pub mod wasm;

pub use config::CompileOptions;
pub use error::{Category, CompileError, ErrorKind};
pub use ir::{StepDefinition, Value, WorkflowDefinition};
pub use lower::compile;
pub use registry::ServiceRegistry;
pub use types::{TypeRef, TypeRegistry, TypeResolver};
