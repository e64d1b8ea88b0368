//! # nodeconfig
//!
//! Schema-driven mapping between editable node graphs and plain configuration
//! values.
//!
//! A JSON Schema is resolved into canonical nodes, walked into a set of node
//! types (scalar fields, child slots, union variants), and then used in both
//! directions: a configuration value is loaded into a graph of nodes, and a
//! graph is read back into a configuration value.
//!
//! ## Quick Start
//!
//! ```rust
//! use nodeconfig::{ConfigExtractor, GraphPopulator, NodeGraph, NodeTypeGenerator};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "name": {"type": "string"},
//!         "tags": {"type": "array", "items": {"type": "string"}}
//!     }
//! });
//! let generation = NodeTypeGenerator::default().generate(&schema).unwrap();
//!
//! let mut graph = NodeGraph::new();
//! let value = json!({"name": "demo", "tags": ["a", "b"]});
//! GraphPopulator::new(&generation)
//!     .load(&mut graph, "root", &value)
//!     .unwrap();
//!
//! let back = ConfigExtractor::new(&generation).generate(&graph, "root").unwrap();
//! assert_eq!(back, value);
//! ```
//!
//! ## Modules
//!
//! - [`schema`] - reference and `allOf` resolution into canonical nodes
//! - [`types`] - node type generation and the variant registry
//! - [`graph`] - the graph host interface and an in-memory graph
//! - [`extract`] - graph to configuration value
//! - [`populate`] - configuration value to graph
//! - [`validate`] - pre-population validation
//! - [`format`] - JSON, TOML and YAML text encodings
//! - [`session`] - one schema, one graph, one config file

#[macro_use]
extern crate log;

/// Diagnostics recorded while recovering from per-property problems.
pub mod diagnostics;

/// Error types.
pub mod error;

/// Graph to configuration value.
pub mod extract;

/// Text encodings.
pub mod format;

/// Graph host interface and the in-memory graph.
pub mod graph;

/// Configuration value to graph.
pub mod populate;

/// Schema resolution.
///
/// Same-document `$ref` pointers and `allOf` are merged away; unions are
/// kept as branch lists.
pub mod schema;

/// Config file plus live graph.
pub mod session;

/// Generation and extraction options read from a settings file.
pub mod settings;

/// Node type generation.
pub mod types;

/// Validator collaborator and the structural default.
pub mod validate;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use error::{MappingError, Result};
pub use extract::{ConfigExtractor, ExtractOptions, FieldExtractor, FieldHook};
pub use format::{ConfigFormat, FormatError};
pub use graph::{FieldValue, GraphHost, NodeGraph, NodeId};
pub use populate::{GraphPopulator, LoadReport};
pub use schema::{Resolver, SchemaNode};
pub use session::Session;
pub use settings::Settings;
pub use types::{
    GenerateOptions, Generation, NodeTypeDescriptor, NodeTypeGenerator, VariantRegistry,
};
pub use validate::{StructuralValidator, ValidationIssue, Validator};
