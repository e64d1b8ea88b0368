use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// JSON Schema `type` tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl SchemaType {
    /// Parse a `type` keyword value. Unknown names give `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            _ => return None,
        })
    }

    /// The keyword spelling of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    /// The tag describing a concrete JSON value.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

/// Item schema(s) of an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    /// Every element shares one schema.
    Single(Box<SchemaNode>),
    /// Positional schemas (`prefixItems` or the array form of `items`).
    Tuple(Vec<SchemaNode>),
}

/// `additionalProperties` keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

/// Which union keyword produced a branch list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionKind {
    OneOf,
    AnyOf,
}

impl UnionKind {
    /// `oneOf` or `anyOf`.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
        }
    }
}

/// Unmerged `oneOf`/`anyOf` branches.
#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub kind: UnionKind,
    pub branches: Vec<SchemaNode>,
}

/// Value constraints, checked by the structural validator only. Node
/// fields are coerced by type alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub format: Option<String>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

const FLOAT_KEYS: [&str; 5] = [
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
];
const COUNT_KEYS: [&str; 4] = ["minLength", "maxLength", "minItems", "maxItems"];

impl Constraints {
    fn float_mut(&mut self, key: &str) -> Option<&mut Option<f64>> {
        Some(match key {
            "minimum" => &mut self.minimum,
            "maximum" => &mut self.maximum,
            "exclusiveMinimum" => &mut self.exclusive_minimum,
            "exclusiveMaximum" => &mut self.exclusive_maximum,
            "multipleOf" => &mut self.multiple_of,
            _ => return None,
        })
    }

    fn count_mut(&mut self, key: &str) -> Option<&mut Option<u64>> {
        Some(match key {
            "minLength" => &mut self.min_length,
            "maxLength" => &mut self.max_length,
            "minItems" => &mut self.min_items,
            "maxItems" => &mut self.max_items,
            _ => return None,
        })
    }

    pub(crate) fn read(map: &Map<String, Value>) -> Self {
        let mut c = Constraints::default();
        for key in FLOAT_KEYS {
            if let Some(v) = map.get(key).and_then(Value::as_f64)
                && let Some(slot) = c.float_mut(key)
            {
                *slot = Some(v);
            }
        }
        for key in COUNT_KEYS {
            if let Some(v) = map.get(key).and_then(Value::as_u64)
                && let Some(slot) = c.count_mut(key)
            {
                *slot = Some(v);
            }
        }
        c.pattern = map.get("pattern").and_then(Value::as_str).map(String::from);
        c.format = map.get("format").and_then(Value::as_str).map(String::from);
        c
    }

    fn write(&self, map: &mut Map<String, Value>) {
        let floats = [
            self.minimum,
            self.maximum,
            self.exclusive_minimum,
            self.exclusive_maximum,
            self.multiple_of,
        ];
        for (key, v) in FLOAT_KEYS.into_iter().zip(floats) {
            if let Some(n) = v.and_then(Number::from_f64) {
                map.insert(key.to_string(), Value::Number(n));
            }
        }
        let counts = [self.min_length, self.max_length, self.min_items, self.max_items];
        for (key, v) in COUNT_KEYS.into_iter().zip(counts) {
            if let Some(v) = v {
                map.insert(key.to_string(), Value::from(v));
            }
        }
        if let Some(p) = &self.pattern {
            map.insert("pattern".into(), Value::String(p.clone()));
        }
        if let Some(f) = &self.format {
            map.insert("format".into(), Value::String(f.clone()));
        }
    }

    /// Field-wise merge where `later` wins when set.
    pub(crate) fn merged(self, later: Constraints) -> Self {
        Constraints {
            minimum: later.minimum.or(self.minimum),
            maximum: later.maximum.or(self.maximum),
            exclusive_minimum: later.exclusive_minimum.or(self.exclusive_minimum),
            exclusive_maximum: later.exclusive_maximum.or(self.exclusive_maximum),
            multiple_of: later.multiple_of.or(self.multiple_of),
            min_length: later.min_length.or(self.min_length),
            max_length: later.max_length.or(self.max_length),
            pattern: later.pattern.or(self.pattern),
            format: later.format.or(self.format),
            min_items: later.min_items.or(self.min_items),
            max_items: later.max_items.or(self.max_items),
        }
    }
}

/// A canonical schema fragment.
///
/// References and `allOf` are gone once a node has been through the
/// [`Resolver`](super::Resolver); `oneOf`/`anyOf` survive as [`Union`]
/// branch lists because they become variant slots downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    /// Declared types, in document order. Empty means untyped.
    pub types: Vec<SchemaType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub default: Option<Value>,
    /// `enum`
    pub enum_values: Option<Vec<Value>>,
    /// `const`
    pub const_value: Option<Value>,
    pub constraints: Constraints,
    /// Declaration order is significant (discriminator scan, output order).
    pub properties: IndexMap<String, SchemaNode>,
    pub required: Vec<String>,
    pub items: Option<Items>,
    pub additional_properties: Option<AdditionalProperties>,
    pub union: Option<Union>,
}

impl SchemaNode {
    /// A node declaring just `ty`.
    pub fn of_type(ty: SchemaType) -> Self {
        SchemaNode {
            types: vec![ty],
            ..Default::default()
        }
    }

    /// `true` when `ty` is among the declared types.
    pub fn has_type(&self, ty: SchemaType) -> bool {
        self.types.contains(&ty)
    }

    /// First declared non-null type.
    pub fn primary_type(&self) -> Option<SchemaType> {
        self.types.iter().copied().find(|t| *t != SchemaType::Null)
    }

    /// Only `null` is allowed.
    pub fn is_null_only(&self) -> bool {
        !self.types.is_empty() && self.types.iter().all(|t| *t == SchemaType::Null)
    }

    /// Declared `object`, or untyped with properties.
    pub fn is_object_shaped(&self) -> bool {
        match self.primary_type() {
            Some(t) => t == SchemaType::Object,
            None => !self.properties.is_empty(),
        }
    }

    /// Declared `array`, or untyped with items.
    pub fn is_array_shaped(&self) -> bool {
        match self.primary_type() {
            Some(t) => t == SchemaType::Array,
            None => self.items.is_some(),
        }
    }

    /// `true` when `name` is listed in `required`.
    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }

    /// The constant this node pins its value to: `const`, or a single-valued `enum`.
    pub fn fixed_value(&self) -> Option<&Value> {
        if let Some(c) = &self.const_value {
            return Some(c);
        }
        match self.enum_values.as_deref() {
            Some([only]) => Some(only),
            _ => None,
        }
    }

    /// Merge `later` over `self` with `allOf` semantics.
    ///
    /// Property maps union (later wins per key, first position kept),
    /// `required` sets union, every other keyword takes the later value
    /// when present.
    pub fn merge(mut self, later: SchemaNode) -> SchemaNode {
        for (k, v) in later.properties {
            self.properties.insert(k, v);
        }
        for r in later.required {
            if !self.required.contains(&r) {
                self.required.push(r);
            }
        }
        SchemaNode {
            types: if later.types.is_empty() {
                self.types
            } else {
                later.types
            },
            title: later.title.or(self.title),
            description: later.description.or(self.description),
            default: later.default.or(self.default),
            enum_values: later.enum_values.or(self.enum_values),
            const_value: later.const_value.or(self.const_value),
            constraints: self.constraints.merged(later.constraints),
            properties: self.properties,
            required: self.required,
            items: later.items.or(self.items),
            additional_properties: later.additional_properties.or(self.additional_properties),
            union: later.union.or(self.union),
        }
    }

    /// Render back to a JSON Schema document that resolves to an equal node.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self.types.as_slice() {
            [] => {}
            [one] => {
                map.insert("type".into(), one.as_str().into());
            }
            many => {
                map.insert(
                    "type".into(),
                    Value::Array(many.iter().map(|t| t.as_str().into()).collect()),
                );
            }
        }
        if let Some(t) = &self.title {
            map.insert("title".into(), t.clone().into());
        }
        if let Some(d) = &self.description {
            map.insert("description".into(), d.clone().into());
        }
        if let Some(d) = &self.default {
            map.insert("default".into(), d.clone());
        }
        if let Some(e) = &self.enum_values {
            map.insert("enum".into(), Value::Array(e.clone()));
        }
        if let Some(c) = &self.const_value {
            map.insert("const".into(), c.clone());
        }
        self.constraints.write(&mut map);
        if !self.properties.is_empty() {
            let props = self
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_value()))
                .collect();
            map.insert("properties".into(), Value::Object(props));
        }
        if !self.required.is_empty() {
            map.insert(
                "required".into(),
                Value::Array(self.required.iter().cloned().map(Value::String).collect()),
            );
        }
        match &self.items {
            Some(Items::Single(s)) => {
                map.insert("items".into(), s.to_value());
            }
            Some(Items::Tuple(list)) => {
                map.insert(
                    "prefixItems".into(),
                    Value::Array(list.iter().map(SchemaNode::to_value).collect()),
                );
            }
            None => {}
        }
        match &self.additional_properties {
            Some(AdditionalProperties::Allowed(b)) => {
                map.insert("additionalProperties".into(), Value::Bool(*b));
            }
            Some(AdditionalProperties::Schema(s)) => {
                map.insert("additionalProperties".into(), s.to_value());
            }
            None => {}
        }
        if let Some(u) = &self.union {
            map.insert(
                u.kind.keyword().into(),
                Value::Array(u.branches.iter().map(SchemaNode::to_value).collect()),
            );
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_later_wins() {
        let mut a = SchemaNode::of_type(SchemaType::Object);
        a.title = Some("A".into());
        a.properties
            .insert("x".into(), SchemaNode::of_type(SchemaType::String));
        a.properties
            .insert("y".into(), SchemaNode::of_type(SchemaType::String));
        a.required = vec!["x".into()];

        let mut b = SchemaNode::default();
        b.properties
            .insert("x".into(), SchemaNode::of_type(SchemaType::Integer));
        b.required = vec!["x".into(), "z".into()];

        let m = a.merge(b);
        assert_eq!(m.types, vec![SchemaType::Object]);
        assert_eq!(m.title.as_deref(), Some("A"));
        assert_eq!(m.properties.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(m.properties["x"].types, vec![SchemaType::Integer]);
        assert_eq!(m.required, vec!["x".to_string(), "z".to_string()]);
    }

    #[test]
    fn test_fixed_value() {
        let mut n = SchemaNode::default();
        assert!(n.fixed_value().is_none());
        n.enum_values = Some(vec![json!("only")]);
        assert_eq!(n.fixed_value(), Some(&json!("only")));
        n.enum_values = Some(vec![json!("a"), json!("b")]);
        assert!(n.fixed_value().is_none());
        n.const_value = Some(json!("c"));
        assert_eq!(n.fixed_value(), Some(&json!("c")));
    }

    #[test]
    fn test_shape_inference() {
        let mut n = SchemaNode::default();
        assert!(!n.is_object_shaped());
        n.properties
            .insert("a".into(), SchemaNode::of_type(SchemaType::String));
        assert!(n.is_object_shaped());

        let nullable = SchemaNode {
            types: vec![SchemaType::Null, SchemaType::Array],
            ..Default::default()
        };
        assert!(nullable.is_array_shaped());
        assert!(!nullable.is_null_only());
        assert!(SchemaNode::of_type(SchemaType::Null).is_null_only());
    }
}
