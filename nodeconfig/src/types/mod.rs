//! Node-type templates generated from a schema.
//!
//! - [`descriptor`] - node types, fields, slots and scalar kinds
//! - [`variant`] - union variants and discriminator-based selection
//! - [`generator`] - the schema walk producing a [`Generation`]

/// Node type, field and slot descriptors.
pub mod descriptor;

/// Schema walk that emits node types.
pub mod generator;

/// Union variant registry.
pub mod variant;

pub use descriptor::{
    Cardinality, FieldDescriptor, NodeShape, NodeTypeDescriptor, SCALAR_FIELD, ScalarKind,
    SlotDescriptor,
};
pub use generator::{GenerateOptions, Generation, NodeTypeGenerator};
pub use variant::{Discriminator, Variant, VariantRegistry};
