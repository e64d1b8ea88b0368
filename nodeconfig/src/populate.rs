//! Configuration value to node graph.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    diagnostics::{DiagnosticKind, Diagnostics},
    error::{MappingError, Result},
    graph::{GraphHost, NodeId},
    schema::{SchemaNode, SchemaType},
    types::{
        Cardinality, FieldDescriptor, Generation, NodeShape, NodeTypeDescriptor, SlotDescriptor,
    },
    validate::Validator,
};

/// Outcome of a successful [`GraphPopulator::load`].
#[derive(Debug, Serialize)]
pub struct LoadReport {
    pub root: NodeId,
    pub diagnostics: Diagnostics,
}

/// Rebuilds a graph from a configuration value.
pub struct GraphPopulator<'a> {
    generation: &'a Generation,
    validator: Option<&'a dyn Validator>,
}

impl<'a> GraphPopulator<'a> {
    /// Populator without a validator.
    pub fn new(generation: &'a Generation) -> Self {
        Self {
            generation,
            validator: None,
        }
    }

    /// Refuse values the validator reports issues for. The graph is left
    /// untouched in that case.
    pub fn with_validator(mut self, validator: &'a dyn Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Clear `graph` and rebuild it from `value`.
    ///
    /// Per-property problems (unknown keys, uncoercible scalars, properties
    /// cut by the depth bound) are skipped and reported in the returned
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// [`MappingError::RootValueShape`] if `value` is not an object,
    /// [`MappingError::InvalidValue`] if the validator refuses it. Neither
    /// touches the graph.
    pub fn load(
        &self,
        graph: &mut dyn GraphHost,
        root_type_id: &str,
        value: &Value,
    ) -> Result<LoadReport> {
        let generation = self.generation;
        let descriptor = generation.descriptor(root_type_id)?;
        let Value::Object(map) = value else {
            return Err(MappingError::RootValueShape(
                SchemaType::of_value(value).as_str().to_string(),
            ));
        };
        if let Some(validator) = self.validator {
            let issues = validator.validate(&generation.source_schema, value);
            if !issues.is_empty() {
                return Err(MappingError::InvalidValue(issues));
            }
        }

        graph.clear();
        let root = graph.create_node(root_type_id);
        let schema = generation
            .schema_of(root_type_id)
            .unwrap_or(&generation.root_schema);

        let mut fill = Fill {
            generation,
            graph,
            diagnostics: Diagnostics::new(),
        };
        fill.object(root, descriptor, schema, map, root_type_id)?;

        info!(
            "loaded configuration into {root}, {} diagnostics",
            fill.diagnostics.len()
        );
        Ok(LoadReport {
            root,
            diagnostics: fill.diagnostics,
        })
    }
}

struct Fill<'a, 'h> {
    generation: &'a Generation,
    graph: &'h mut dyn GraphHost,
    diagnostics: Diagnostics,
}

impl<'a> Fill<'a, '_> {
    fn object(
        &mut self,
        node: NodeId,
        descriptor: &'a NodeTypeDescriptor,
        schema: &'a SchemaNode,
        map: &Map<String, Value>,
        path: &str,
    ) -> Result<()> {
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            let key_path = format!("{path}.{key}");

            if let Some(field) = descriptor.field(key) {
                self.scalar(node, field, value, &key_path)?;
            } else if let Some(slot) = descriptor.slot(key) {
                match slot.cardinality {
                    Cardinality::Single => {
                        if let Some(child) = self.item(slot, 0, value, &key_path)? {
                            self.graph.connect(node, key, child)?;
                        }
                    }
                    Cardinality::Chain => self.chain(node, slot, value, &key_path)?,
                }
            } else if schema.properties.contains_key(key) {
                self.diagnostics.push(
                    DiagnosticKind::UnresolvedSlotType,
                    &key_path,
                    format!("`{}` has no field or slot for this property", descriptor.type_id),
                );
            } else {
                self.diagnostics.push(
                    DiagnosticKind::UnmappedProperty,
                    &key_path,
                    "property is not declared by the schema",
                );
            }
        }
        Ok(())
    }

    fn scalar(
        &mut self,
        node: NodeId,
        field: &FieldDescriptor,
        value: &Value,
        path: &str,
    ) -> Result<()> {
        match field.kind.to_field(value) {
            Ok(Some(raw)) => self.graph.set_field(node, &field.name, raw)?,
            Ok(None) => {}
            Err(mismatch) => {
                self.diagnostics
                    .push(DiagnosticKind::CoercionFailed, path, mismatch.to_string());
            }
        }
        Ok(())
    }

    fn chain(
        &mut self,
        node: NodeId,
        slot: &'a SlotDescriptor,
        value: &Value,
        path: &str,
    ) -> Result<()> {
        let Value::Array(list) = value else {
            self.diagnostics.push(
                DiagnosticKind::CoercionFailed,
                path,
                format!("expected an array, got {}", SchemaType::of_value(value).as_str()),
            );
            return Ok(());
        };

        let mut prev: Option<NodeId> = None;
        for (i, item) in list.iter().enumerate() {
            if item.is_null() {
                continue;
            }
            let Some(child) = self.item(slot, i, item, &format!("{path}[{i}]"))? else {
                continue;
            };
            match prev {
                None => self.graph.connect(node, &slot.name, child)?,
                Some(prev) => self.graph.link_next(prev, child)?,
            }
            prev = Some(child);
        }
        Ok(())
    }

    /// Create the node for one slot value, `None` when it had to be skipped.
    fn item(
        &mut self,
        slot: &'a SlotDescriptor,
        index: usize,
        value: &Value,
        path: &str,
    ) -> Result<Option<NodeId>> {
        let generation = self.generation;
        let (type_id, schema) = match &slot.variant_path {
            Some(variant_path) => match generation.variants.select_variant(variant_path, value) {
                Some(v) => (v.type_id.as_str(), Some(&v.schema)),
                None => {
                    self.diagnostics.push(
                        DiagnosticKind::UnresolvedSlotType,
                        path,
                        format!("no variant registered at `{variant_path}`"),
                    );
                    return Ok(None);
                }
            },
            None => match slot.item_type(index) {
                Some(type_id) => (type_id, generation.schema_of(type_id)),
                None => {
                    self.diagnostics.push(
                        DiagnosticKind::UnresolvedSlotType,
                        path,
                        "slot accepts no node type",
                    );
                    return Ok(None);
                }
            },
        };
        let descriptor = generation.descriptor(type_id)?;

        match (descriptor.shape, value) {
            (NodeShape::Object, Value::Object(map)) => {
                let Some(schema) = schema else {
                    self.diagnostics.push(
                        DiagnosticKind::UnresolvedSlotType,
                        path,
                        format!("no schema recorded for `{type_id}`"),
                    );
                    return Ok(None);
                };
                let node = self.graph.create_node(type_id);
                self.object(node, descriptor, schema, map, path)?;
                Ok(Some(node))
            }
            (NodeShape::Scalar, Value::Object(_) | Value::Array(_)) | (NodeShape::Object, _) => {
                let expected = match descriptor.shape {
                    NodeShape::Object => "an object",
                    NodeShape::Scalar => "a scalar",
                };
                self.diagnostics.push(
                    DiagnosticKind::CoercionFailed,
                    path,
                    format!(
                        "`{type_id}` expects {expected}, got {}",
                        SchemaType::of_value(value).as_str()
                    ),
                );
                Ok(None)
            }
            (NodeShape::Scalar, scalar) => {
                let node = self.graph.create_node(type_id);
                if let Some(field) = descriptor.fields.first() {
                    self.scalar(node, field, scalar, path)?;
                }
                Ok(Some(node))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        graph::{FieldValue, NodeGraph, walk_chain},
        types::{GenerateOptions, NodeTypeGenerator, SCALAR_FIELD},
        validate::ValidationIssue,
    };
    use serde_json::json;

    fn generation() -> Generation {
        NodeTypeGenerator::default()
            .generate(&json!({
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "port": {"type": "integer"},
                    "debug": {"type": "boolean"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "server": {"type": "object", "properties": {"host": {"type": "string"}}},
                    "tracker": {
                        "oneOf": [
                            {
                                "type": "object",
                                "properties": {
                                    "type": {"const": "azure"},
                                    "org": {"type": "string"}
                                }
                            },
                            {
                                "type": "object",
                                "properties": {
                                    "type": {"const": "jira"},
                                    "projectName": {"type": "string"}
                                }
                            },
                            {"type": "integer"}
                        ]
                    }
                }
            }))
            .unwrap()
    }

    fn text(graph: &NodeGraph, node: NodeId, field: &str) -> Option<String> {
        graph
            .field(node, field)
            .and_then(FieldValue::as_text)
            .map(String::from)
    }

    #[test]
    fn test_fields_and_slots() {
        let g = generation();
        let mut graph = NodeGraph::new();
        let report = GraphPopulator::new(&g)
            .load(
                &mut graph,
                "root",
                &json!({
                    "name": "demo",
                    "port": 8080,
                    "debug": true,
                    "tags": ["a", null, "b"],
                    "server": {"host": "localhost"}
                }),
            )
            .unwrap();
        let root = report.root;
        assert!(report.diagnostics.is_empty());

        assert_eq!(text(&graph, root, "name").as_deref(), Some("demo"));
        assert_eq!(text(&graph, root, "port").as_deref(), Some("8080"));
        assert_eq!(graph.field(root, "debug"), Some(&FieldValue::Toggle(true)));

        let tags = walk_chain(&graph, graph.slot(root, "tags"));
        let values: Vec<_> = tags
            .nodes
            .iter()
            .map(|n| text(&graph, *n, SCALAR_FIELD).unwrap())
            .collect();
        assert_eq!(values, vec!["a", "b"]);
        assert_eq!(graph.node_type(tags.nodes[0]), Some("item_string"));

        let server = graph.slot(root, "server").unwrap();
        assert_eq!(graph.node_type(server), Some("root_server"));
        assert_eq!(text(&graph, server, "host").as_deref(), Some("localhost"));
    }

    #[test]
    fn test_variants() {
        let g = generation();
        let mut graph = NodeGraph::new();
        let root = GraphPopulator::new(&g)
            .load(&mut graph, "root", &json!({"tracker": {"type": "jira", "projectName": "p"}}))
            .unwrap()
            .root;
        let tracker = graph.slot(root, "tracker").unwrap();
        assert_eq!(graph.node_type(tracker), Some("root_tracker_1"));
        assert_eq!(text(&graph, tracker, "projectName").as_deref(), Some("p"));

        let root = GraphPopulator::new(&g)
            .load(&mut graph, "root", &json!({"tracker": 7}))
            .unwrap()
            .root;
        let tracker = graph.slot(root, "tracker").unwrap();
        assert_eq!(graph.node_type(tracker), Some("root_tracker_2"));
        assert_eq!(text(&graph, tracker, SCALAR_FIELD).as_deref(), Some("7"));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_recovers_per_property() {
        let g = generation();
        let mut graph = NodeGraph::new();
        let report = GraphPopulator::new(&g)
            .load(
                &mut graph,
                "root",
                &json!({
                    "name": null,
                    "debug": "maybe",
                    "tags": "not-a-list",
                    "server": 3,
                    "colour": "blue"
                }),
            )
            .unwrap();
        let kinds: Vec<_> = report.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::CoercionFailed,
                DiagnosticKind::CoercionFailed,
                DiagnosticKind::CoercionFailed,
                DiagnosticKind::UnmappedProperty
            ]
        );
        assert_eq!(graph.len(), 1);
        assert!(graph.field(report.root, "name").is_none());
    }

    #[test]
    fn test_refusals_leave_graph_alone() {
        let g = generation();
        let mut graph = NodeGraph::new();
        GraphPopulator::new(&g)
            .load(&mut graph, "root", &json!({"tags": ["x"]}))
            .unwrap();
        assert_eq!(graph.len(), 2);

        let err = GraphPopulator::new(&g)
            .load(&mut graph, "root", &json!(["x"]))
            .unwrap_err();
        assert!(matches!(err, MappingError::RootValueShape(ref t) if t == "array"));

        let refuse = |_: &Value, _: &Value| {
            vec![ValidationIssue {
                path: "name".into(),
                message: "nope".into(),
            }]
        };
        let err = GraphPopulator::new(&g)
            .with_validator(&refuse)
            .load(&mut graph, "root", &json!({}))
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidValue(ref issues) if issues.len() == 1));
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_truncated_property_is_reported() {
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "object",
                    "properties": {
                        "b": {"type": "object", "properties": {"c": {"type": "string"}}}
                    }
                }
            }
        });
        let options = GenerateOptions {
            max_depth: 0,
            ..Default::default()
        };
        let g = NodeTypeGenerator::new(options).generate(&schema).unwrap();
        let mut graph = NodeGraph::new();
        let report = GraphPopulator::new(&g)
            .load(&mut graph, "root", &json!({"a": {"b": {"c": "x"}}}))
            .unwrap();
        assert!(report.diagnostics.has(DiagnosticKind::UnresolvedSlotType));
        assert!(graph.slot(report.root, "a").is_some());
    }
}
