use serde::Serialize;
use serde_json::Value;

use crate::schema::{SchemaNode, SchemaType};

/// Name of the only field on scalar-shaped node types.
pub const SCALAR_FIELD: &str = "value";

/// Scalar field kinds, fixed once at generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Number,
    Integer,
    Boolean,
    Enum,
}

impl ScalarKind {
    /// Field kind of a scalar schema; `None` for objects, arrays and `null`.
    pub fn of_schema(schema: &SchemaNode) -> Option<ScalarKind> {
        if let Some(fixed) = schema.fixed_value() {
            return Self::of_constant(fixed);
        }
        if let Some(values) = &schema.enum_values {
            if values.iter().all(Value::is_string) {
                return Some(ScalarKind::Enum);
            }
            return values.first().and_then(Self::of_constant);
        }
        match schema.primary_type() {
            Some(SchemaType::String) => Some(ScalarKind::String),
            Some(SchemaType::Number) => Some(ScalarKind::Number),
            Some(SchemaType::Integer) => Some(ScalarKind::Integer),
            Some(SchemaType::Boolean) => Some(ScalarKind::Boolean),
            Some(SchemaType::Object | SchemaType::Array | SchemaType::Null) => None,
            None if schema.is_null_only() => None,
            // untyped leaves are edited as free text
            None if schema.properties.is_empty() && schema.items.is_none() => {
                Some(ScalarKind::String)
            }
            None => None,
        }
    }

    fn of_constant(value: &Value) -> Option<ScalarKind> {
        match SchemaType::of_value(value) {
            SchemaType::String => Some(ScalarKind::Enum),
            SchemaType::Integer => Some(ScalarKind::Integer),
            SchemaType::Number => Some(ScalarKind::Number),
            SchemaType::Boolean => Some(ScalarKind::Boolean),
            _ => None,
        }
    }

    /// Lower-case name, as used in generic item type ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Number => "number",
            ScalarKind::Integer => "integer",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Enum => "enum",
        }
    }

    /// Id of the item type shared by every array of this kind.
    pub fn generic_item_type_id(&self) -> String {
        format!("item_{}", self.as_str())
    }

    /// Category for leaf types that inherit none.
    pub fn category(&self) -> &'static str {
        match self {
            ScalarKind::String => "Text",
            ScalarKind::Number | ScalarKind::Integer => "Numeric",
            ScalarKind::Boolean => "Flags",
            ScalarKind::Enum => "Choices",
        }
    }

    /// Schema describing one value of this kind.
    pub fn schema(&self) -> SchemaNode {
        SchemaNode::of_type(match self {
            ScalarKind::String | ScalarKind::Enum => SchemaType::String,
            ScalarKind::Number => SchemaType::Number,
            ScalarKind::Integer => SchemaType::Integer,
            ScalarKind::Boolean => SchemaType::Boolean,
        })
    }
}

/// Category of types without fields or an inherited category.
pub const GENERAL_CATEGORY: &str = "General";

/// Whether a node type is an object with named fields or a wrapped scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    Object,
    /// One field named [`SCALAR_FIELD`]; extracted as the bare scalar.
    Scalar,
}

/// A scalar field on a node type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub title: String,
    pub kind: ScalarKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub required: bool,
}

impl FieldDescriptor {
    /// Field for property `name`, taking title, options and default from `schema`.
    pub fn new(name: &str, schema: &SchemaNode, kind: ScalarKind, required: bool) -> Self {
        let options = match (&schema.const_value, &schema.enum_values) {
            (Some(Value::String(c)), _) => vec![c.clone()],
            (None, Some(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        };
        Self {
            name: name.to_string(),
            title: schema.title.clone().unwrap_or_else(|| titleize(name)),
            kind,
            options,
            default: schema.default.clone(),
            required,
        }
    }
}

/// How many children a slot binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// One child node.
    Single,
    /// The head of a sibling chain, one node per array item.
    Chain,
}

/// A named attachment point for child nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotDescriptor {
    pub name: String,
    pub title: String,
    pub cardinality: Cardinality,
    /// Accepted type ids; the first is the default.
    pub accepts: Vec<String>,
    /// Registry path when the slot holds union variants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_path: Option<String>,
    /// Tuple arrays: item `i` takes `accepts[i]`.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub positional: bool,
    pub required: bool,
}

impl SlotDescriptor {
    pub fn new(
        name: &str,
        schema: &SchemaNode,
        cardinality: Cardinality,
        accepts: Vec<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            title: schema.title.clone().unwrap_or_else(|| titleize(name)),
            cardinality,
            accepts,
            variant_path: None,
            positional: false,
            required: false,
        }
    }

    /// `true` when the slot is backed by a union.
    pub fn is_variant(&self) -> bool {
        self.variant_path.is_some()
    }

    /// Type to use for item `index` when no variant applies.
    pub fn item_type(&self, index: usize) -> Option<&str> {
        if self.positional {
            self.accepts
                .get(index)
                .or_else(|| self.accepts.last())
                .map(String::as_str)
        } else {
            self.accepts.first().map(String::as_str)
        }
    }
}

/// Template for one kind of node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTypeDescriptor {
    /// Path-qualified, unique within one generation.
    pub type_id: String,
    pub title: String,
    pub shape: NodeShape,
    pub fields: Vec<FieldDescriptor>,
    pub slots: Vec<SlotDescriptor>,
    pub category: String,
    /// Built past the depth bound; structured properties were dropped.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl NodeTypeDescriptor {
    /// Scalar field named `name`.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Child slot named `name`.
    pub fn slot(&self, name: &str) -> Option<&SlotDescriptor> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// The most common field kind, first seen winning ties.
    pub fn dominant_kind(fields: &[FieldDescriptor]) -> Option<ScalarKind> {
        let mut counts: Vec<(ScalarKind, usize)> = Vec::new();
        for field in fields {
            match counts.iter_mut().find(|(k, _)| *k == field.kind) {
                Some((_, n)) => *n += 1,
                None => counts.push((field.kind, 1)),
            }
        }
        counts
            .iter()
            .fold(None, |best: Option<(ScalarKind, usize)>, &(k, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((k, n)),
            })
            .map(|(k, _)| k)
    }
}

/// `server_config` -> `Server Config`.
pub fn titleize(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
