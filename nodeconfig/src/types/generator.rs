//! Schema to node-type generation.
//!
//! Type ids are derived from the schema path, never from property names
//! alone, so two arrays of objects in different places always get distinct
//! item types:
//!
//! | position                       | type id        |
//! |--------------------------------|----------------|
//! | root                           | `root`         |
//! | object property `p` of `T`     | `T_p`          |
//! | object items of array `p`      | `T_p_item`     |
//! | tuple position `i` of `p`      | `T_p_i`        |
//! | union branch `i` at `T_p`      | `T_p_i`        |
//! | scalar array items             | `item_<kind>`  |
//!
//! Property names may themselves contain `_`, so a joined id can already
//! belong to another schema location (`a_b` next to `a.b`). The later
//! location then gets a `~2`, `~3`, ... suffix.

use std::{borrow::Cow, collections::HashMap};

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    diagnostics::{DiagnosticKind, Diagnostics},
    error::{MappingError, Result},
    schema::{Items, Resolver, SchemaNode},
    types::{
        descriptor::{
            Cardinality, FieldDescriptor, GENERAL_CATEGORY, NodeShape, NodeTypeDescriptor,
            SCALAR_FIELD, ScalarKind, SlotDescriptor, titleize,
        },
        variant::VariantRegistry,
    },
};

/// Knobs for one generation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GenerateOptions {
    /// Maximum object nesting below the root before a branch is cut.
    pub max_depth: usize,
    /// Type id of the root node type.
    pub root_type_id: String,
    /// Category of the root node type.
    pub root_category: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            root_type_id: "root".to_string(),
            root_category: "Configuration".to_string(),
        }
    }
}

/// Everything one generation pass produces. Immutable once built; a schema
/// change means generating again.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub root_type_id: String,
    /// Every node type, in generation order.
    pub node_types: IndexMap<String, NodeTypeDescriptor>,
    /// Category name to the type ids it groups.
    pub categories: IndexMap<String, Vec<String>>,
    pub variants: VariantRegistry,
    /// The schema document as handed to the generator.
    #[serde(skip)]
    pub source_schema: Value,
    /// The resolved root.
    #[serde(skip)]
    pub root_schema: SchemaNode,
    #[serde(skip)]
    pub schema_by_type_id: HashMap<String, SchemaNode>,
    pub diagnostics: Diagnostics,
}

impl Generation {
    /// Generate node types for a Rust type through its derived JSON Schema.
    pub fn from_type<C: JsonSchema>(options: GenerateOptions) -> Result<Generation> {
        let schema = schemars::schema_for!(C);
        NodeTypeGenerator::new(options).generate(schema.as_value())
    }

    /// Descriptor of `type_id`, or [`MappingError::UnknownNodeType`].
    pub fn descriptor(&self, type_id: &str) -> Result<&NodeTypeDescriptor> {
        self.node_types
            .get(type_id)
            .ok_or_else(|| MappingError::UnknownNodeType(type_id.to_string()))
    }

    /// Resolved schema the node type was generated from.
    pub fn schema_of(&self, type_id: &str) -> Option<&SchemaNode> {
        self.schema_by_type_id.get(type_id)
    }

    /// Category the node type is grouped under.
    pub fn category_of(&self, type_id: &str) -> Option<&str> {
        self.node_types.get(type_id).map(|d| d.category.as_str())
    }
}

/// Walks a resolved schema and emits node types.
#[derive(Debug, Clone, Default)]
pub struct NodeTypeGenerator {
    options: GenerateOptions,
}

impl NodeTypeGenerator {
    /// Generator with explicit options; [`Default`] uses [`GenerateOptions::default`].
    pub fn new(options: GenerateOptions) -> Self {
        Self { options }
    }

    /// Resolve `root_schema` and build the node types for it.
    ///
    /// # Errors
    ///
    /// Resolution errors, and [`MappingError::SchemaShape`] when the root is
    /// not an object. Depth truncation is reported as a diagnostic only.
    pub fn generate(&self, root_schema: &Value) -> Result<Generation> {
        let mut resolver = Resolver::new(root_schema).with_max_recursion(self.options.max_depth);
        let root = resolver.resolve_root()?;
        if !root.is_object_shaped() {
            let found = match root.primary_type() {
                Some(t) => format!("type `{}`", t.as_str()),
                None if root.union.is_some() => "a bare union".to_string(),
                None => "no type and no properties".to_string(),
            };
            return Err(MappingError::SchemaShape(found));
        }

        let mut walk = Walk {
            options: &self.options,
            claims: HashMap::new(),
            node_types: IndexMap::new(),
            schema_by_type_id: HashMap::new(),
            variants: VariantRegistry::new(),
            diagnostics: resolver.take_diagnostics(),
        };

        let root_id = walk.claim(self.options.root_type_id.clone(), "#");
        let title = root
            .title
            .clone()
            .unwrap_or_else(|| self.options.root_category.clone());
        walk.object_type(&root_id, "#", &title, &root, 0, None);

        let mut categories: IndexMap<String, Vec<String>> = IndexMap::new();
        for descriptor in walk.node_types.values() {
            categories
                .entry(descriptor.category.clone())
                .or_default()
                .push(descriptor.type_id.clone());
        }

        info!(
            "generated {} node types in {} categories, {} union paths",
            walk.node_types.len(),
            categories.len(),
            walk.variants.len()
        );

        Ok(Generation {
            root_type_id: root_id,
            node_types: walk.node_types,
            categories,
            variants: walk.variants,
            source_schema: root_schema.clone(),
            root_schema: root,
            schema_by_type_id: walk.schema_by_type_id,
            diagnostics: walk.diagnostics,
        })
    }
}

/// How a property maps onto a node type.
enum Shape {
    Scalar(ScalarKind),
    Object,
    Array,
    Variant(Vec<SchemaNode>),
    Unsupported(&'static str),
}

/// Classify a property, collapsing nullable unions to their single branch.
fn classify(schema: &SchemaNode) -> (Cow<'_, SchemaNode>, Shape) {
    if let Some(union) = &schema.union {
        let mut base = schema.clone();
        base.union = None;
        let branches: Vec<&SchemaNode> = union
            .branches
            .iter()
            .filter(|b| !b.is_null_only())
            .collect();
        return match branches.as_slice() {
            [] => (Cow::Borrowed(schema), Shape::Unsupported("union without non-null branches")),
            [only] => {
                let collapsed = (*only).clone().merge(base);
                let (_, shape) = classify(&collapsed);
                (Cow::Owned(collapsed), shape)
            }
            many => {
                // keywords shared by every branch, minus presentation
                base.title = None;
                base.description = None;
                base.default = None;
                let merged = many.iter().map(|b| base.clone().merge((*b).clone())).collect();
                (Cow::Borrowed(schema), Shape::Variant(merged))
            }
        };
    }

    let shape = if let Some(kind) = ScalarKind::of_schema(schema) {
        Shape::Scalar(kind)
    } else if schema.is_object_shaped() {
        Shape::Object
    } else if schema.is_array_shaped() {
        Shape::Array
    } else {
        Shape::Unsupported("null-only property")
    };
    (Cow::Borrowed(schema), shape)
}

struct Walk<'o> {
    options: &'o GenerateOptions,
    /// Type id (or union path) to the schema location that owns it.
    claims: HashMap<String, String>,
    node_types: IndexMap<String, NodeTypeDescriptor>,
    schema_by_type_id: HashMap<String, SchemaNode>,
    variants: VariantRegistry,
    diagnostics: Diagnostics,
}

impl Walk<'_> {
    /// Id for the schema location `pointer`, starting from `preferred`.
    ///
    /// The same location always gets the same id back.
    fn claim(&mut self, preferred: String, pointer: &str) -> String {
        let mut id = preferred.clone();
        let mut n = 2;
        loop {
            match self.claims.get(&id) {
                None => {
                    self.claims.insert(id.clone(), pointer.to_string());
                    return id;
                }
                Some(owner) if owner == pointer => return id,
                Some(owner) => {
                    debug!("type id {id} already taken by {owner}, renaming {pointer}");
                    id = format!("{preferred}~{n}");
                    n += 1;
                }
            }
        }
    }

    /// Insert unless the id already exists (first write wins).
    fn insert(&mut self, descriptor: NodeTypeDescriptor, schema: SchemaNode) {
        let id = descriptor.type_id.clone();
        if self.node_types.contains_key(&id) {
            debug!("node type {id} already generated, keeping the first");
            return;
        }
        self.schema_by_type_id.entry(id.clone()).or_insert(schema);
        self.node_types.insert(id, descriptor);
    }

    fn object_type(
        &mut self,
        type_id: &str,
        pointer: &str,
        title: &str,
        schema: &SchemaNode,
        depth: usize,
        category: Option<&str>,
    ) -> String {
        if self.node_types.contains_key(type_id) {
            debug!("reusing node type {type_id}");
            return type_id.to_string();
        }

        let truncated = depth > self.options.max_depth;
        let mut fields = Vec::new();
        let mut slots = Vec::new();
        let mut dropped = Vec::new();

        for (name, prop) in &schema.properties {
            let path = format!("{type_id}_{name}");
            let prop_pointer = format!("{pointer}/properties/{}", escape(name));
            let required = schema.is_required(name);
            let inherited = if depth == 0 {
                Some(name.as_str())
            } else {
                category
            };

            let (prop, shape) = classify(prop);
            match shape {
                Shape::Scalar(kind) => {
                    fields.push(FieldDescriptor::new(name, &prop, kind, required));
                }
                Shape::Unsupported(reason) => {
                    self.diagnostics
                        .push(DiagnosticKind::UnsupportedShape, &path, reason);
                }
                _ if truncated => dropped.push(name.as_str()),
                Shape::Object => {
                    let child_id = self.claim(path, &prop_pointer);
                    let child_title = prop.title.clone().unwrap_or_else(|| titleize(name));
                    let child = self.object_type(
                        &child_id,
                        &prop_pointer,
                        &child_title,
                        &prop,
                        depth + 1,
                        inherited,
                    );
                    let mut slot =
                        SlotDescriptor::new(name, &prop, Cardinality::Single, vec![child]);
                    slot.required = required;
                    slots.push(slot);
                }
                Shape::Array => {
                    let path = self.claim(path, &prop_pointer);
                    let array =
                        self.array_slot(name, &path, &prop_pointer, &prop, depth, inherited);
                    if let Some(mut slot) = array {
                        slot.required = required;
                        slots.push(slot);
                    }
                }
                Shape::Variant(branches) => {
                    let path = self.claim(path, &prop_pointer);
                    let accepts =
                        self.variant_types(&path, &prop_pointer, name, &branches, depth, inherited);
                    if accepts.is_empty() {
                        self.diagnostics.push(
                            DiagnosticKind::UnresolvedSlotType,
                            &path,
                            "no usable union branch",
                        );
                        continue;
                    }
                    let mut slot = SlotDescriptor::new(name, &prop, Cardinality::Single, accepts);
                    slot.variant_path = Some(path);
                    slot.required = required;
                    slots.push(slot);
                }
            }
        }

        if truncated {
            self.diagnostics.push(
                DiagnosticKind::DepthTruncated,
                type_id,
                format!(
                    "object nesting {depth} exceeds max_depth {}, dropped [{}]",
                    self.options.max_depth,
                    dropped.join(", ")
                ),
            );
        }

        let category = if depth == 0 {
            self.options.root_category.clone()
        } else {
            match category {
                Some(c) => c.to_string(),
                None => NodeTypeDescriptor::dominant_kind(&fields)
                    .map(|k| k.category())
                    .unwrap_or(GENERAL_CATEGORY)
                    .to_string(),
            }
        };

        self.insert(
            NodeTypeDescriptor {
                type_id: type_id.to_string(),
                title: title.to_string(),
                shape: NodeShape::Object,
                fields,
                slots,
                category,
                truncated,
            },
            schema.clone(),
        );
        type_id.to_string()
    }

    /// A node type wrapping one scalar in its `value` field.
    fn scalar_type(
        &mut self,
        type_id: &str,
        title: &str,
        kind: ScalarKind,
        schema: &SchemaNode,
        category: Option<&str>,
    ) -> String {
        if !self.node_types.contains_key(type_id) {
            self.insert(
                NodeTypeDescriptor {
                    type_id: type_id.to_string(),
                    title: title.to_string(),
                    shape: NodeShape::Scalar,
                    fields: vec![FieldDescriptor::new(SCALAR_FIELD, schema, kind, true)],
                    slots: Vec::new(),
                    category: category.unwrap_or(kind.category()).to_string(),
                    truncated: false,
                },
                schema.clone(),
            );
        }
        type_id.to_string()
    }

    fn generic_item(&mut self, kind: ScalarKind) -> String {
        let id = kind.generic_item_type_id();
        let id = self.claim(id, &format!("#item/{}", kind.as_str()));
        let title = format!("{} Item", titleize(kind.as_str()));
        self.scalar_type(&id, &title, kind, &kind.schema(), None)
    }

    fn array_slot(
        &mut self,
        name: &str,
        path: &str,
        pointer: &str,
        schema: &SchemaNode,
        depth: usize,
        category: Option<&str>,
    ) -> Option<SlotDescriptor> {
        match &schema.items {
            None => {
                let item = self.generic_item(ScalarKind::String);
                Some(SlotDescriptor::new(name, schema, Cardinality::Chain, vec![item]))
            }
            Some(Items::Single(item)) => {
                let (item, shape) = classify(item);
                match shape {
                    Shape::Scalar(kind) => {
                        let item = self.generic_item(kind);
                        Some(SlotDescriptor::new(name, schema, Cardinality::Chain, vec![item]))
                    }
                    Shape::Object => {
                        let title = item
                            .title
                            .clone()
                            .unwrap_or_else(|| format!("{} Item", titleize(name)));
                        let item_pointer = format!("{pointer}/items");
                        let id = self.claim(format!("{path}_item"), &item_pointer);
                        let id = self.object_type(
                            &id,
                            &item_pointer,
                            &title,
                            &item,
                            depth + 1,
                            category,
                        );
                        Some(SlotDescriptor::new(name, schema, Cardinality::Chain, vec![id]))
                    }
                    Shape::Variant(branches) => {
                        let item_pointer = format!("{pointer}/items");
                        let accepts = self.variant_types(
                            path,
                            &item_pointer,
                            name,
                            &branches,
                            depth,
                            category,
                        );
                        if accepts.is_empty() {
                            self.diagnostics.push(
                                DiagnosticKind::UnresolvedSlotType,
                                path,
                                "no usable union branch for array items",
                            );
                            return None;
                        }
                        let mut slot =
                            SlotDescriptor::new(name, schema, Cardinality::Chain, accepts);
                        slot.variant_path = Some(path.to_string());
                        Some(slot)
                    }
                    Shape::Array => {
                        self.diagnostics.push(
                            DiagnosticKind::UnsupportedShape,
                            path,
                            "arrays of arrays have no node mapping",
                        );
                        None
                    }
                    Shape::Unsupported(reason) => {
                        self.diagnostics
                            .push(DiagnosticKind::UnsupportedShape, path, reason);
                        None
                    }
                }
            }
            Some(Items::Tuple(list)) => {
                let mut accepts = Vec::with_capacity(list.len());
                for (i, item) in list.iter().enumerate() {
                    let (item, shape) = classify(item);
                    let id = match shape {
                        Shape::Scalar(kind) => self.generic_item(kind),
                        Shape::Object => {
                            let title = item
                                .title
                                .clone()
                                .unwrap_or_else(|| format!("{} {}", titleize(name), i + 1));
                            let item_pointer = format!("{pointer}/prefixItems/{i}");
                            let id = self.claim(format!("{path}_{i}"), &item_pointer);
                            self.object_type(&id, &item_pointer, &title, &item, depth + 1, category)
                        }
                        _ => {
                            self.diagnostics.push(
                                DiagnosticKind::UnsupportedShape,
                                path,
                                format!("tuple position {i} has no node mapping"),
                            );
                            return None;
                        }
                    };
                    accepts.push(id);
                }
                if accepts.is_empty() {
                    return None;
                }
                let mut slot = SlotDescriptor::new(name, schema, Cardinality::Chain, accepts);
                slot.positional = true;
                Some(slot)
            }
        }
    }

    /// One node type per union branch, registered as variants at `path`.
    fn variant_types(
        &mut self,
        path: &str,
        pointer: &str,
        name: &str,
        branches: &[SchemaNode],
        depth: usize,
        category: Option<&str>,
    ) -> Vec<String> {
        let mut ids = Vec::with_capacity(branches.len());
        for (i, branch) in branches.iter().enumerate() {
            let branch_pointer = format!("{pointer}/union/{i}");
            let type_id = self.claim(format!("{path}_{i}"), &branch_pointer);
            let title = branch
                .title
                .clone()
                .unwrap_or_else(|| format!("{} #{}", titleize(name), i + 1));
            let (branch, shape) = classify(branch);
            let id = match shape {
                Shape::Object => self.object_type(
                    &type_id,
                    &branch_pointer,
                    &title,
                    &branch,
                    depth + 1,
                    category,
                ),
                Shape::Scalar(kind) => self.scalar_type(&type_id, &title, kind, &branch, category),
                Shape::Array | Shape::Variant(_) | Shape::Unsupported(_) => {
                    self.diagnostics.push(
                        DiagnosticKind::UnsupportedShape,
                        &type_id,
                        "union branch is not an object or scalar",
                    );
                    continue;
                }
            };
            self.variants
                .register_variant(path, &id, branch.into_owned(), &title);
            ids.push(id);
        }
        ids
    }
}

/// JSON Pointer escaping for one reference token.
fn escape(token: &str) -> Cow<'_, str> {
    if token.contains(['~', '/']) {
        Cow::Owned(token.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(token)
    }
}
