//! Union variants keyed by the schema path where the union occurs.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::{schema::SchemaNode, types::ScalarKind};

/// Property pinned to a constant that identifies a variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discriminator {
    pub property: String,
    pub value: Value,
}

/// One alternative of a `oneOf`/`anyOf`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variant {
    /// Node type generated for this branch.
    pub type_id: String,
    pub title: String,
    #[serde(skip)]
    pub schema: SchemaNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
}

impl Variant {
    /// Scalar kind when the variant wraps a scalar.
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        if self.schema.is_object_shaped() {
            None
        } else {
            ScalarKind::of_schema(&self.schema)
        }
    }
}

/// Variants generated per union path, in registration order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct VariantRegistry {
    by_path: IndexMap<String, Vec<Variant>>,
}

impl VariantRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a variant at `path`.
    ///
    /// The discriminator is the first property, in declaration order, whose
    /// schema fixes a constant. Registering a type id twice at one path
    /// keeps the first registration.
    pub fn register_variant(
        &mut self,
        path: &str,
        type_id: &str,
        schema: SchemaNode,
        title: &str,
    ) -> &Variant {
        let list = self.by_path.entry(path.to_string()).or_default();
        let index = match list.iter().position(|v| v.type_id == type_id) {
            Some(index) => index,
            None => {
                let discriminator = schema.properties.iter().find_map(|(name, prop)| {
                    prop.fixed_value().map(|value| Discriminator {
                        property: name.clone(),
                        value: value.clone(),
                    })
                });
                list.push(Variant {
                    type_id: type_id.to_string(),
                    title: title.to_string(),
                    schema,
                    discriminator,
                });
                list.len() - 1
            }
        };
        &list[index]
    }

    /// Variant to use for `candidate` at `path`.
    ///
    /// Objects are matched on their discriminator value, then on the first
    /// object-shaped variant; scalars on the first variant whose kind
    /// accepts them. Anything unmatched falls back to the first registered
    /// variant. `None` only when the path has no variants at all.
    pub fn select_variant(&self, path: &str, candidate: &Value) -> Option<&Variant> {
        let variants = self.variants(path);
        let matched = match candidate {
            Value::Object(map) => variants
                .iter()
                .find(|v| {
                    v.discriminator
                        .as_ref()
                        .is_some_and(|d| map.get(&d.property) == Some(&d.value))
                })
                .or_else(|| variants.iter().find(|v| v.schema.is_object_shaped())),
            Value::Null => None,
            scalar => variants
                .iter()
                .find(|v| v.scalar_kind().is_some_and(|k| k.accepts(scalar))),
        };
        if matched.is_none() && !variants.is_empty() {
            debug!("no variant at {path} matches {candidate}, using the first");
        }
        matched.or_else(|| variants.first())
    }

    /// Variant whose node type is `type_id`.
    pub fn variant_for_type(&self, path: &str, type_id: &str) -> Option<&Variant> {
        self.variants(path).iter().find(|v| v.type_id == type_id)
    }

    /// Variants at `path` in registration order, empty for unknown paths.
    pub fn variants(&self, path: &str) -> &[Variant] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every union path with at least one variant.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}
