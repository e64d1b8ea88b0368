//! Node-graph to configuration value.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    diagnostics::{DiagnosticKind, Diagnostics},
    error::{MappingError, Result},
    graph::{GraphHost, NodeId, walk_chain},
    schema::SchemaNode,
    types::{
        Cardinality, FieldDescriptor, Generation, NodeShape, NodeTypeDescriptor, SlotDescriptor,
    },
};

/// Replacement extraction for one named property.
///
/// Receives the graph, the bound node (the owning node for scalar fields,
/// the bound child for slots, `None` for an empty slot) and the property's
/// resolved schema. Returning `None` means the property is absent.
pub type FieldExtractor =
    Arc<dyn Fn(&dyn GraphHost, Option<NodeId>, &SchemaNode) -> Option<Value> + Send + Sync>;

/// Extractor registration for one property name.
#[derive(Clone)]
pub struct FieldHook {
    /// Property name the hook answers for, at any depth.
    pub field: String,
    pub extractor: FieldExtractor,
}

/// What to emit for absent properties.
///
/// Both off: omit. `fill_defaults` wins over `fill_nulls` when the schema
/// declares a default.
///
/// An empty array leaves its slot unbound, so an optional array loaded from
/// `[]` reads back as absent and falls under these options. A required
/// array with no items always extracts as `[]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExtractOptions {
    /// Insert the schema-declared default.
    pub fill_defaults: bool,
    /// Insert an explicit `null`.
    pub fill_nulls: bool,
}

/// Reads a populated graph back into a plain value.
pub struct ConfigExtractor<'g> {
    generation: &'g Generation,
    options: ExtractOptions,
    hooks: HashMap<String, FieldExtractor>,
}

impl<'g> ConfigExtractor<'g> {
    /// Extractor with the default options and no hooks.
    pub fn new(generation: &'g Generation) -> Self {
        Self {
            generation,
            options: ExtractOptions::default(),
            hooks: HashMap::new(),
        }
    }

    /// Replace the missing-field policy.
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Take over extraction of every property called `field`.
    pub fn with_field_extractor<F>(mut self, field: &str, extractor: F) -> Self
    where
        F: Fn(&dyn GraphHost, Option<NodeId>, &SchemaNode) -> Option<Value>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.insert(field.to_string(), Arc::new(extractor));
        self
    }

    /// Register a [`FieldHook`], replacing any extractor for the same name.
    pub fn with_hook(mut self, hook: &FieldHook) -> Self {
        self.hooks.insert(hook.field.clone(), hook.extractor.clone());
        self
    }

    /// Build the configuration value rooted at the first `root_type_id` node.
    ///
    /// # Errors
    ///
    /// [`MappingError::MissingRootInstance`] when no such node exists,
    /// [`MappingError::UnknownNodeType`] when the type was never generated.
    pub fn generate(&self, graph: &dyn GraphHost, root_type_id: &str) -> Result<Value> {
        self.generate_with_diagnostics(graph, root_type_id)
            .map(|(value, _)| value)
    }

    /// Like [`generate`](Self::generate), also returning recovered problems.
    pub fn generate_with_diagnostics(
        &self,
        graph: &dyn GraphHost,
        root_type_id: &str,
    ) -> Result<(Value, Diagnostics)> {
        let descriptor = self.generation.descriptor(root_type_id)?;
        let roots = graph.nodes_of_type(root_type_id);
        let Some(&root) = roots.first() else {
            return Err(MappingError::MissingRootInstance(root_type_id.to_string()));
        };

        let mut pass = Pass {
            extractor: self,
            graph,
            diagnostics: Diagnostics::new(),
            visited: HashSet::new(),
        };
        if roots.len() > 1 {
            pass.diagnostics.push(
                DiagnosticKind::MultipleRootInstances,
                root_type_id,
                format!("{} root nodes found, using {root}", roots.len()),
            );
        }

        let schema = self
            .generation
            .schema_of(root_type_id)
            .unwrap_or(&self.generation.root_schema);
        let value = pass
            .object(root, descriptor, schema, root_type_id)
            .unwrap_or_else(|| Value::Object(Map::new()));
        debug!(
            "extracted configuration from {root} with {} diagnostics",
            pass.diagnostics.len()
        );
        Ok((value, pass.diagnostics))
    }
}

struct Pass<'a, 'g> {
    extractor: &'a ConfigExtractor<'g>,
    graph: &'a dyn GraphHost,
    diagnostics: Diagnostics,
    visited: HashSet<NodeId>,
}

impl Pass<'_, '_> {
    fn enter(&mut self, node: NodeId, path: &str) -> bool {
        if self.visited.insert(node) {
            return true;
        }
        self.diagnostics.push(
            DiagnosticKind::BrokenLink,
            path,
            format!("node {node} is bound more than once"),
        );
        false
    }

    fn object(
        &mut self,
        node: NodeId,
        descriptor: &NodeTypeDescriptor,
        schema: &SchemaNode,
        path: &str,
    ) -> Option<Value> {
        if !self.enter(node, path) {
            return None;
        }

        let mut out = Map::new();
        for (name, prop) in &schema.properties {
            let prop_path = format!("{path}.{name}");
            let value = if let Some(hook) = self.extractor.hooks.get(name) {
                let bound = if descriptor.slot(name).is_some() {
                    self.graph.slot(node, name)
                } else {
                    Some(node)
                };
                hook(self.graph, bound, prop)
            } else if let Some(field) = descriptor.field(name) {
                self.scalar(node, field, &prop_path)
            } else if let Some(slot) = descriptor.slot(name) {
                match slot.cardinality {
                    Cardinality::Single => self
                        .graph
                        .slot(node, name)
                        .and_then(|child| self.child(child, slot, &prop_path)),
                    Cardinality::Chain => self.chain(node, slot, &prop_path),
                }
            } else {
                continue;
            };

            if let Some(value) = value.or_else(|| self.missing(prop)) {
                out.insert(name.clone(), value);
            }
        }
        Some(Value::Object(out))
    }

    fn missing(&self, schema: &SchemaNode) -> Option<Value> {
        let options = &self.extractor.options;
        if options.fill_defaults
            && let Some(default) = &schema.default
        {
            return Some(default.clone());
        }
        options.fill_nulls.then_some(Value::Null)
    }

    fn scalar(&mut self, node: NodeId, field: &FieldDescriptor, path: &str) -> Option<Value> {
        match field.kind.from_field(self.graph.field(node, &field.name)) {
            Ok(value) => value,
            Err(mismatch) => {
                self.diagnostics
                    .push(DiagnosticKind::CoercionFailed, path, mismatch.to_string());
                None
            }
        }
    }

    fn chain(&mut self, node: NodeId, slot: &SlotDescriptor, path: &str) -> Option<Value> {
        let Some(head) = self.graph.slot(node, &slot.name) else {
            return slot.required.then(|| Value::Array(Vec::new()));
        };
        let chain = walk_chain(self.graph, Some(head));
        if chain.looped {
            self.diagnostics.push(
                DiagnosticKind::BrokenLink,
                path,
                "sibling chain loops back on itself",
            );
        }
        let items = chain
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.child(*item, slot, &format!("{path}[{i}]")))
            .collect();
        Some(Value::Array(items))
    }

    fn child(&mut self, child: NodeId, slot: &SlotDescriptor, path: &str) -> Option<Value> {
        let generation = self.extractor.generation;
        let Some(type_id) = self.graph.node_type(child) else {
            self.diagnostics.push(
                DiagnosticKind::BrokenLink,
                path,
                format!("bound node {child} does not exist"),
            );
            return None;
        };
        let Some(descriptor) = generation.node_types.get(type_id) else {
            self.diagnostics.push(
                DiagnosticKind::UnresolvedSlotType,
                path,
                format!("node {child} has unknown type `{type_id}`"),
            );
            return None;
        };

        let schema = slot
            .variant_path
            .as_deref()
            .and_then(|p| generation.variants.variant_for_type(p, type_id))
            .map(|v| &v.schema)
            .or_else(|| generation.schema_of(type_id));
        let Some(schema) = schema else {
            self.diagnostics.push(
                DiagnosticKind::UnresolvedSlotType,
                path,
                format!("no schema recorded for `{type_id}`"),
            );
            return None;
        };

        match descriptor.shape {
            NodeShape::Object => self.object(child, descriptor, schema, path),
            NodeShape::Scalar => {
                if !self.enter(child, path) {
                    return None;
                }
                let field = descriptor.fields.first()?;
                self.scalar(child, field, path)
            }
        }
    }
}
