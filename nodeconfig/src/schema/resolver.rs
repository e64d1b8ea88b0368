//! Reference resolution and `allOf` merging.

use serde_json::{Map, Value};

use crate::{
    diagnostics::{DiagnosticKind, Diagnostics},
    error::{MappingError, Result},
    schema::node::{
        AdditionalProperties, Constraints, Items, SchemaNode, SchemaType, Union, UnionKind,
    },
};

/// Default bound on how often one pointer may be unrolled.
pub const DEFAULT_MAX_RECURSION: usize = 10;

/// Keywords that never contribute to a resolved node.
const CONTAINER_KEYS: [&str; 5] = ["$ref", "$defs", "definitions", "$schema", "$id"];

#[derive(Debug, Clone)]
struct Frame {
    pointer: String,
    descents: usize,
}

/// Pointers currently being resolved, innermost last.
///
/// Each frame remembers the structural depth at which it was entered. A
/// pointer that comes back at the same depth has not gone through any
/// `properties`, `items` or `additionalProperties` edge in between, which
/// makes it a cycle. Union and `allOf` branches do not count as depth.
#[derive(Debug, Clone, Default)]
pub struct PointerStack {
    frames: Vec<Frame>,
    descents: usize,
}

impl PointerStack {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when no pointer is being resolved.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Pointers in entry order, outermost first.
    pub fn pointers(&self) -> Vec<String> {
        self.frames.iter().map(|f| f.pointer.clone()).collect()
    }

    fn occurrences(&self, pointer: &str) -> usize {
        self.frames.iter().filter(|f| f.pointer == pointer).count()
    }

    fn re_entered_in_place(&self, pointer: &str) -> bool {
        self.frames
            .iter()
            .rev()
            .find(|f| f.pointer == pointer)
            .is_some_and(|f| f.descents == self.descents)
    }

    fn push(&mut self, pointer: &str) {
        self.frames.push(Frame {
            pointer: pointer.to_string(),
            descents: self.descents,
        });
    }

    fn pop(&mut self) {
        self.frames.pop();
    }
}

/// Canonicalizes schema fragments against one root document.
pub struct Resolver<'a> {
    root: &'a Value,
    max_recursion: usize,
    diagnostics: Diagnostics,
}

impl<'a> Resolver<'a> {
    /// Resolver for `root`, unrolling recursion [`DEFAULT_MAX_RECURSION`] times.
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            max_recursion: DEFAULT_MAX_RECURSION,
            diagnostics: Diagnostics::new(),
        }
    }

    /// Limit how many times a recursive pointer is unrolled.
    pub fn with_max_recursion(mut self, max_recursion: usize) -> Self {
        self.max_recursion = max_recursion.max(1);
        self
    }

    /// Resolve the whole root document.
    pub fn resolve_root(&mut self) -> Result<SchemaNode> {
        let mut stack = PointerStack::new();
        stack.push("#");
        let root = self.root;
        self.resolve(root, &mut stack)
    }

    /// Diagnostics gathered so far (recursion truncation).
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// Canonicalize one schema fragment and everything below it.
    ///
    /// # Errors
    ///
    /// - [`MappingError::PointerResolution`] for non-local or dangling `$ref`s.
    /// - [`MappingError::CircularReference`] when a pointer is re-entered
    ///   before its resolution completes.
    pub fn resolve(&mut self, schema: &Value, stack: &mut PointerStack) -> Result<SchemaNode> {
        let map = match schema {
            Value::Object(map) => map,
            Value::Bool(_) => return Ok(SchemaNode::default()),
            other => {
                return Err(MappingError::SchemaShape(format!(
                    "schema fragment must be an object or boolean, got {other}"
                )));
            }
        };

        if let Some(reference) = map.get("$ref") {
            let pointer = reference
                .as_str()
                .ok_or_else(|| MappingError::PointerResolution {
                    pointer: reference.to_string(),
                    reason: "`$ref` must be a string".into(),
                })?;
            let mut resolved = self.dereference(pointer, stack)?;

            let siblings: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !CONTAINER_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !siblings.is_empty() {
                let overlay = self.resolve(&Value::Object(siblings), stack)?;
                resolved = resolved.merge(overlay);
            }
            return Ok(resolved);
        }

        let mut node = SchemaNode {
            types: read_types(map),
            title: read_string(map, "title"),
            description: read_string(map, "description"),
            default: map.get("default").cloned(),
            enum_values: map.get("enum").and_then(Value::as_array).cloned(),
            const_value: map.get("const").cloned(),
            constraints: Constraints::read(map),
            ..Default::default()
        };

        if let Some(Value::Object(props)) = map.get("properties") {
            for (name, prop) in props {
                let resolved = self.descend(prop, stack)?;
                node.properties.insert(name.clone(), resolved);
            }
        }

        if let Some(Value::Array(required)) = map.get("required") {
            for name in required.iter().filter_map(Value::as_str) {
                if !node.is_required(name) {
                    node.required.push(name.to_string());
                }
            }
        }

        node.items = match (map.get("prefixItems"), map.get("items")) {
            (Some(Value::Array(list)), _) | (None, Some(Value::Array(list))) => {
                let mut tuple = Vec::with_capacity(list.len());
                for item in list {
                    tuple.push(self.descend(item, stack)?);
                }
                Some(Items::Tuple(tuple))
            }
            (_, Some(item)) => Some(Items::Single(Box::new(self.descend(item, stack)?))),
            _ => None,
        };

        node.additional_properties = match map.get("additionalProperties") {
            Some(Value::Bool(b)) => Some(AdditionalProperties::Allowed(*b)),
            Some(schema @ Value::Object(_)) => Some(AdditionalProperties::Schema(Box::new(
                self.descend(schema, stack)?,
            ))),
            _ => None,
        };

        for kind in [UnionKind::OneOf, UnionKind::AnyOf] {
            let Some(Value::Array(list)) = map.get(kind.keyword()) else {
                continue;
            };
            if node.union.is_some() {
                debug!("both oneOf and anyOf present, keeping oneOf");
                break;
            }
            let mut branches = Vec::with_capacity(list.len());
            for branch in list {
                branches.push(self.resolve(branch, stack)?);
            }
            node.union = Some(Union { kind, branches });
        }

        if let Some(Value::Array(all)) = map.get("allOf") {
            let mut merged = SchemaNode::default();
            for branch in all {
                let resolved = self.resolve(branch, stack)?;
                merged = merged.merge(resolved);
            }
            node = merged.merge(node);
        }

        Ok(node)
    }

    /// Walk a `#/a/b/c` pointer through the root document.
    pub fn lookup(&self, pointer: &str) -> Result<&'a Value> {
        let fail = |reason: String| MappingError::PointerResolution {
            pointer: pointer.to_string(),
            reason,
        };

        let Some(fragment) = pointer.strip_prefix('#') else {
            return Err(fail(
                "only same-document pointers (`#/...`) are supported".into(),
            ));
        };

        let mut current = self.root;
        if !fragment.is_empty() {
            let Some(path) = fragment.strip_prefix('/') else {
                return Err(fail("pointer fragment must start with `/`".into()));
            };
            for raw in path.split('/') {
                let token = raw.replace("~1", "/").replace("~0", "~");
                current = match current {
                    Value::Object(map) => map.get(&token),
                    Value::Array(list) => token.parse::<usize>().ok().and_then(|i| list.get(i)),
                    _ => None,
                }
                .ok_or_else(|| fail(format!("no member `{token}`")))?;
            }
        }

        if !current.is_object() {
            return Err(fail("target is not a schema object".into()));
        }
        Ok(current)
    }

    fn dereference(&mut self, pointer: &str, stack: &mut PointerStack) -> Result<SchemaNode> {
        let target = self.lookup(pointer)?;

        if stack.re_entered_in_place(pointer) {
            let mut chain = stack.pointers();
            chain.push(pointer.to_string());
            return Err(MappingError::CircularReference {
                pointer: pointer.to_string(),
                chain,
            });
        }

        if stack.occurrences(pointer) >= self.max_recursion {
            self.diagnostics.push(
                DiagnosticKind::RecursionTruncated,
                pointer,
                format!("recursive reference unrolled {} times", self.max_recursion),
            );
            return Ok(truncated(target));
        }

        stack.push(pointer);
        let resolved = self.resolve(target, stack);
        stack.pop();
        resolved
    }

    fn descend(&mut self, schema: &Value, stack: &mut PointerStack) -> Result<SchemaNode> {
        stack.descents += 1;
        let resolved = self.resolve(schema, stack);
        stack.descents -= 1;
        resolved
    }
}

/// Placeholder for a recursion that was cut: keeps type and title only.
fn truncated(target: &Value) -> SchemaNode {
    let Value::Object(map) = target else {
        return SchemaNode::default();
    };
    let mut types = read_types(map);
    if types.is_empty() && map.contains_key("properties") {
        types.push(SchemaType::Object);
    }
    SchemaNode {
        types,
        title: read_string(map, "title"),
        ..Default::default()
    }
}

fn read_types(map: &Map<String, Value>) -> Vec<SchemaType> {
    match map.get("type") {
        Some(Value::String(s)) => SchemaType::parse(s).into_iter().collect(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .filter_map(SchemaType::parse)
            .collect(),
        _ => Vec::new(),
    }
}

fn read_string(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(schema: &Value) -> Result<SchemaNode> {
        Resolver::new(schema).resolve_root()
    }

    #[test]
    fn test_all_of_merge() {
        let schema = json!({
            "allOf": [
                {"properties": {"a": {"type": "string"}}},
                {"properties": {"b": {"type": "string"}}, "required": ["b"]}
            ]
        });
        let node = resolve(&schema).unwrap();
        assert_eq!(node.properties.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(node.required, vec!["b".to_string()]);
    }

    #[test]
    fn test_all_of_later_branch_wins() {
        let schema = json!({
            "allOf": [
                {"properties": {"a": {"type": "string", "title": "first"}}},
                {"properties": {"a": {"type": "integer"}}, "additionalProperties": false}
            ]
        });
        let node = resolve(&schema).unwrap();
        let a = &node.properties["a"];
        assert_eq!(a.types, vec![SchemaType::Integer]);
        // per-key replacement, not a deep merge
        assert_eq!(a.title, None);
        assert_eq!(
            node.additional_properties,
            Some(AdditionalProperties::Allowed(false))
        );
    }

    #[test]
    fn test_ref_with_siblings() {
        let schema = json!({
            "type": "object",
            "properties": {
                "server": {"$ref": "#/$defs/Server", "description": "main server"}
            },
            "$defs": {
                "Server": {
                    "type": "object",
                    "description": "a server",
                    "properties": {"host": {"type": "string"}}
                }
            }
        });
        let node = resolve(&schema).unwrap();
        let server = &node.properties["server"];
        assert!(server.is_object_shaped());
        assert_eq!(server.description.as_deref(), Some("main server"));
        assert!(server.properties.contains_key("host"));
    }

    #[test]
    fn test_pointer_errors() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"$ref": "other.json#/x"}},
            "$defs": {"scalar": 3}
        });
        assert!(matches!(
            resolve(&schema),
            Err(MappingError::PointerResolution { .. })
        ));

        let missing = json!({"properties": {"a": {"$ref": "#/$defs/nope"}}});
        assert!(matches!(
            resolve(&missing),
            Err(MappingError::PointerResolution { .. })
        ));

        let not_object = json!({
            "properties": {"a": {"$ref": "#/$defs/scalar"}},
            "$defs": {"scalar": 3}
        });
        assert!(matches!(
            resolve(&not_object),
            Err(MappingError::PointerResolution { .. })
        ));
    }

    #[test]
    fn test_escaped_pointer_tokens() {
        let schema = json!({
            "properties": {"a": {"$ref": "#/$defs/a~1b~0c"}},
            "$defs": {"a/b~c": {"type": "boolean"}}
        });
        let node = resolve(&schema).unwrap();
        assert_eq!(node.properties["a"].types, vec![SchemaType::Boolean]);
    }

    #[test]
    fn test_circular_reference() {
        let schema = json!({
            "properties": {"a": {"$ref": "#/$defs/A"}},
            "$defs": {
                "A": {"$ref": "#/$defs/B"},
                "B": {"$ref": "#/$defs/A"}
            }
        });
        match resolve(&schema) {
            Err(MappingError::CircularReference { pointer, chain }) => {
                assert_eq!(pointer, "#/$defs/A");
                assert!(chain.ends_with(&["#/$defs/B".to_string(), "#/$defs/A".to_string()]));
            }
            other => panic!("expected circular reference, got {other:?}"),
        }

        let self_all_of = json!({
            "properties": {"a": {"$ref": "#/$defs/A"}},
            "$defs": {"A": {"allOf": [{"$ref": "#/$defs/A"}]}}
        });
        assert!(matches!(
            resolve(&self_all_of),
            Err(MappingError::CircularReference { .. })
        ));

        let self_union = json!({
            "properties": {"a": {"$ref": "#/$defs/A"}},
            "$defs": {"A": {"anyOf": [{"$ref": "#/$defs/A"}, {"type": "string"}]}}
        });
        match resolve(&self_union) {
            Err(MappingError::CircularReference { pointer, .. }) => {
                assert_eq!(pointer, "#/$defs/A");
            }
            other => panic!("expected circular reference, got {other:?}"),
        }
    }

    #[test]
    fn test_union_recursion_through_properties_is_bounded() {
        let schema = json!({
            "properties": {"a": {"$ref": "#/$defs/A"}},
            "$defs": {
                "A": {
                    "type": "object",
                    "properties": {
                        "next": {"oneOf": [{"$ref": "#/$defs/A"}, {"type": "null"}]}
                    }
                }
            }
        });
        let mut resolver = Resolver::new(&schema).with_max_recursion(2);
        assert!(resolver.resolve_root().is_ok());
        assert!(
            resolver
                .take_diagnostics()
                .has(DiagnosticKind::RecursionTruncated)
        );
    }

    #[test]
    fn test_structural_recursion_is_bounded() {
        let schema = json!({
            "type": "object",
            "properties": {"tree": {"$ref": "#/$defs/Node"}},
            "$defs": {
                "Node": {
                    "type": "object",
                    "title": "Node",
                    "properties": {
                        "name": {"type": "string"},
                        "child": {"$ref": "#/$defs/Node"}
                    }
                }
            }
        });
        let mut resolver = Resolver::new(&schema).with_max_recursion(2);
        let node = resolver.resolve_root().unwrap();
        let cut = &node.properties["tree"].properties["child"].properties["child"];
        assert_eq!(cut.types, vec![SchemaType::Object]);
        assert_eq!(cut.title.as_deref(), Some("Node"));
        assert!(cut.properties.is_empty());
        assert!(
            resolver
                .take_diagnostics()
                .has(DiagnosticKind::RecursionTruncated)
        );
    }

    #[test]
    fn test_unions_stay_unmerged() {
        let schema = json!({
            "properties": {
                "tracker": {
                    "oneOf": [
                        {"$ref": "#/$defs/Azure"},
                        {"properties": {"type": {"const": "jira"}}}
                    ]
                }
            },
            "$defs": {"Azure": {"properties": {"type": {"const": "azure"}}}}
        });
        let node = resolve(&schema).unwrap();
        let union = node.properties["tracker"].union.as_ref().unwrap();
        assert_eq!(union.kind, UnionKind::OneOf);
        assert_eq!(union.branches.len(), 2);
        assert_eq!(
            union.branches[0].properties["type"].const_value,
            Some(json!("azure"))
        );
    }

    #[test]
    fn test_tuple_items() {
        let schema = json!({
            "properties": {
                "pair": {"type": "array", "prefixItems": [{"type": "string"}, {"type": "integer"}]},
                "old": {"type": "array", "items": [{"type": "boolean"}]}
            }
        });
        let node = resolve(&schema).unwrap();
        assert!(matches!(&node.properties["pair"].items, Some(Items::Tuple(t)) if t.len() == 2));
        assert!(matches!(&node.properties["old"].items, Some(Items::Tuple(t)) if t.len() == 1));
    }

    #[test]
    fn test_idempotent() {
        let schema = json!({
            "type": "object",
            "title": "Config",
            "required": ["name"],
            "properties": {
                "name": {"type": "string", "minLength": 1, "default": "x"},
                "port": {"type": ["integer", "null"], "minimum": 1, "maximum": 65535},
                "mode": {"enum": ["a", "b"]},
                "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 4},
                "pair": {"type": "array", "prefixItems": [{"type": "string"}, {"type": "number"}]},
                "extra": {"type": "object", "additionalProperties": {"type": "string"}},
                "base": {
                    "allOf": [{"$ref": "#/$defs/Base"}, {"properties": {"z": {"type": "boolean"}}}]
                },
                "choice": {"anyOf": [{"type": "string"}, {"$ref": "#/$defs/Base"}]}
            },
            "$defs": {
                "Base": {"type": "object", "properties": {"y": {"const": 1}}}
            }
        });
        let once = resolve(&schema).unwrap();
        let twice = resolve(&once.to_value()).unwrap();
        assert_eq!(once, twice);
    }
}
