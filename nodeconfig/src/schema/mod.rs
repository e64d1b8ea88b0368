//! JSON Schema canonicalization.
//!
//! - [`node`] - the canonical [`SchemaNode`] representation
//! - [`resolver`] - `$ref` dereferencing, cycle detection and `allOf` merging

/// Canonical schema fragments.
pub mod node;

/// Reference resolution and composition merging.
pub mod resolver;

pub use node::{AdditionalProperties, Constraints, Items, SchemaNode, SchemaType, Union, UnionKind};
pub use resolver::{PointerStack, Resolver};
