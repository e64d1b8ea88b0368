use thiserror::Error;

use crate::{graph::NodeId, validate::ValidationIssue};

/// Hard failures raised by resolution, generation, extraction and population.
///
/// Per-field problems are never reported here; they are recovered locally
/// and recorded as [`Diagnostic`](crate::diagnostics::Diagnostic)s instead.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The root schema does not describe an object.
    #[error("root schema is not object-shaped: {0}")]
    SchemaShape(String),

    /// A `$ref` pointer was re-entered before its resolution completed.
    #[error("circular reference at `{pointer}` (via {})", .chain.join(" -> "))]
    CircularReference { pointer: String, chain: Vec<String> },

    /// A `$ref` is non-local or does not lead to a schema object.
    #[error("cannot resolve pointer `{pointer}`: {reason}")]
    PointerResolution { pointer: String, reason: String },

    /// Extraction found no node of the root type in the graph.
    #[error("no node of root type `{0}` in the graph")]
    MissingRootInstance(String),

    /// A type id that the generation pass never produced.
    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    /// A node id that is not part of the graph.
    #[error("node {0} does not exist in the graph")]
    UnknownNode(NodeId),

    /// The value handed to population is not an object.
    #[error("configuration value must be an object, got {0}")]
    RootValueShape(String),

    /// The validator refused the value before population started.
    #[error("configuration value rejected by validator ({} issue(s)): {}", .0.len(), summary(.0))]
    InvalidValue(Vec<ValidationIssue>),
}

fn summary(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("{}: {}", i.path, i.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result alias used throughout the library.
pub type Result<T, E = MappingError> = std::result::Result<T, E>;
