use nodeconfig::{
    ConfigExtractor, DiagnosticKind, ExtractOptions, GraphHost, GraphPopulator, MappingError,
    NodeGraph, StructuralValidator,
    types::{GenerateOptions, Generation, NodeTypeGenerator},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

fn round_trip(generation: &Generation, value: &Value) -> Value {
    let mut graph = NodeGraph::new();
    GraphPopulator::new(generation)
        .load(&mut graph, &generation.root_type_id, value)
        .expect("load");
    ConfigExtractor::new(generation)
        .generate(&graph, &generation.root_type_id)
        .expect("extract")
}

#[test]
fn test_items_variant_scenario() {
    let schema = json!({
        "type": "object",
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "oneOf": [
                        {"title": "A", "properties": {"kind": {"const": "a"}}},
                        {"title": "B", "properties": {"kind": {"const": "b"}}}
                    ]
                }
            }
        }
    });
    let generation = NodeTypeGenerator::default().generate(&schema).unwrap();

    let variants = generation.variants.variants("root_items");
    let ids: Vec<_> = variants.iter().map(|v| v.type_id.as_str()).collect();
    assert_eq!(ids, vec!["root_items_0", "root_items_1"]);

    let value = json!({"items": [{"kind": "b"}]});
    let mut graph = NodeGraph::new();
    let report = GraphPopulator::new(&generation)
        .load(&mut graph, "root", &value)
        .unwrap();
    assert!(report.diagnostics.is_empty());

    let b_nodes = graph.nodes_of_type("root_items_1");
    assert_eq!(b_nodes.len(), 1);
    assert!(graph.nodes_of_type("root_items_0").is_empty());
    assert_eq!(generation.descriptor("root_items_1").unwrap().title, "B");
    assert_eq!(graph.slot(report.root, "items"), Some(b_nodes[0]));

    let back = ConfigExtractor::new(&generation).generate(&graph, "root").unwrap();
    assert_eq!(back, value);
}

#[test]
fn test_variant_free_round_trip() {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "ratio": {"type": "number"},
            "retries": {"type": "integer"},
            "debug": {"type": "boolean"},
            "mode": {"enum": ["fast", "safe"]},
            "tags": {"type": "array", "items": {"type": "string"}},
            "ports": {"type": "array", "items": {"type": "integer"}},
            "pair": {
                "type": "array",
                "prefixItems": [
                    {"type": "string"},
                    {"type": "object", "properties": {"x": {"type": "number"}}}
                ]
            },
            "server": {"anyOf": [{"$ref": "#/$defs/Server"}, {"type": "null"}]},
            "mirrors": {"type": "array", "items": {"$ref": "#/$defs/Server"}},
            "limits": {
                "allOf": [
                    {"properties": {"cpu": {"type": "integer"}}},
                    {"properties": {"memory": {"type": "string"}}}
                ]
            }
        },
        "$defs": {
            "Server": {
                "type": "object",
                "properties": {
                    "host": {"type": "string"},
                    "tls": {"type": "object", "properties": {"cert": {"type": "string"}}}
                }
            }
        }
    });
    let generation = NodeTypeGenerator::default().generate(&schema).unwrap();
    assert!(generation.variants.is_empty());

    let value = json!({
        "name": "demo",
        "ratio": 0.25,
        "retries": -3,
        "debug": false,
        "mode": "safe",
        "tags": ["a", "b", "c"],
        "ports": [80, 443],
        "pair": ["left", {"x": 1.5}],
        "server": {"host": "localhost", "tls": {"cert": "/etc/cert.pem"}},
        "mirrors": [{"host": "m1"}, {"host": "m2", "tls": {"cert": "c"}}],
        "limits": {"cpu": 4, "memory": "2G"}
    });
    assert!(StructuralValidator.validate_node(&generation.root_schema, &value).is_empty());
    assert_eq!(round_trip(&generation, &value), value);

    // absent properties follow the missing-field policy
    let sparse = json!({"name": "only"});
    assert_eq!(round_trip(&generation, &sparse), sparse);
}

#[test]
fn test_missing_field_policy_after_load() {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string"},
            "port": {"type": "integer", "default": 8080}
        }
    });
    let generation = NodeTypeGenerator::default().generate(&schema).unwrap();
    let mut graph = NodeGraph::new();
    GraphPopulator::new(&generation)
        .load(&mut graph, "root", &json!({}))
        .unwrap();

    let filled = ConfigExtractor::new(&generation)
        .with_options(ExtractOptions {
            fill_defaults: true,
            fill_nulls: true,
        })
        .generate(&graph, "root")
        .unwrap();
    assert_eq!(filled, json!({"name": null, "port": 8080}));
}

#[test]
fn test_discriminator_selection() {
    let schema = json!({
        "type": "object",
        "properties": {
            "tracker": {
                "oneOf": [
                    {
                        "type": "object",
                        "properties": {"type": {"const": "azure"}, "org": {"type": "string"}}
                    },
                    {
                        "type": "object",
                        "properties": {"type": {"const": "jira"}, "projectName": {"type": "string"}}
                    }
                ]
            }
        }
    });
    let generation = NodeTypeGenerator::default().generate(&schema).unwrap();
    let registry = &generation.variants;

    let jira = registry
        .select_variant("root_tracker", &json!({"type": "jira", "projectName": "x"}))
        .unwrap();
    assert_eq!(jira.type_id, "root_tracker_1");
    let fallback = registry
        .select_variant("root_tracker", &json!({"type": "github"}))
        .unwrap();
    assert_eq!(fallback.type_id, "root_tracker_0");

    let value = json!({"tracker": {"type": "jira", "projectName": "x"}});
    assert_eq!(round_trip(&generation, &value), value);
}

#[test]
fn test_depth_bound_stays_usable() {
    let schema = json!({
        "type": "object",
        "properties": {"node": {"$ref": "#/$defs/Node"}},
        "$defs": {
            "Node": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "child": {"$ref": "#/$defs/Node"}
                }
            }
        }
    });
    let options = GenerateOptions {
        max_depth: 2,
        ..Default::default()
    };
    let generation = NodeTypeGenerator::new(options).generate(&schema).unwrap();
    assert!(generation.diagnostics.has(DiagnosticKind::RecursionTruncated));
    assert!(generation.descriptor("root_node_child_child").unwrap().truncated);

    let value = json!({
        "node": {
            "name": "a",
            "child": {"name": "b", "child": {"name": "c", "child": {"name": "d"}}}
        }
    });
    let mut graph = NodeGraph::new();
    let report = GraphPopulator::new(&generation)
        .load(&mut graph, "root", &value)
        .unwrap();
    assert!(report.diagnostics.has(DiagnosticKind::UnmappedProperty));

    let back = ConfigExtractor::new(&generation).generate(&graph, "root").unwrap();
    assert_eq!(back, json!({"node": {"name": "a", "child": {"name": "b", "child": {}}}}));
}

#[test]
fn test_circular_schema_is_an_error() {
    let schema = json!({
        "type": "object",
        "properties": {"a": {"$ref": "#/$defs/A"}},
        "$defs": {
            "A": {"$ref": "#/$defs/B"},
            "B": {"$ref": "#/$defs/A"}
        }
    });
    let err = NodeTypeGenerator::default().generate(&schema).unwrap_err();
    assert!(matches!(err, MappingError::CircularReference { .. }));
}

#[test]
fn test_validator_gate() {
    let schema = json!({
        "type": "object",
        "required": ["name"],
        "properties": {"name": {"type": "string"}}
    });
    let generation = NodeTypeGenerator::default().generate(&schema).unwrap();
    let mut graph = NodeGraph::new();
    let validator = StructuralValidator;
    let err = GraphPopulator::new(&generation)
        .with_validator(&validator)
        .load(&mut graph, "root", &json!({"other": 1}))
        .unwrap_err();
    assert!(matches!(err, MappingError::InvalidValue(ref issues) if issues[0].path == "name"));
    assert!(graph.is_empty());
}

#[test]
fn test_underscored_property_next_to_nested_path() {
    let schema = json!({
        "type": "object",
        "properties": {
            "a": {
                "type": "object",
                "properties": {"b": {"type": "object", "properties": {"x": {"type": "string"}}}}
            },
            "a_b": {"type": "object", "properties": {"y": {"type": "integer"}}}
        }
    });
    let generation = NodeTypeGenerator::default().generate(&schema).unwrap();

    let value = json!({"a": {"b": {"x": "hi"}}, "a_b": {"y": 5}});
    let mut graph = NodeGraph::new();
    let report = GraphPopulator::new(&generation)
        .load(&mut graph, "root", &value)
        .unwrap();
    assert!(report.diagnostics.is_empty());
    let back = ConfigExtractor::new(&generation).generate(&graph, "root").unwrap();
    assert_eq!(back, value);
}

#[test]
fn test_string_or_detailed_object() {
    let schema = json!({
        "type": "object",
        "properties": {
            "dep": {
                "anyOf": [
                    {"type": "string"},
                    {
                        "type": "object",
                        "properties": {
                            "version": {"type": "string"},
                            "features": {"type": "array", "items": {"type": "string"}}
                        }
                    }
                ]
            }
        }
    });
    let generation = NodeTypeGenerator::default().generate(&schema).unwrap();

    let detailed = json!({"dep": {"version": "1.0", "features": ["derive"]}});
    let mut graph = NodeGraph::new();
    let report = GraphPopulator::new(&generation)
        .load(&mut graph, "root", &detailed)
        .unwrap();
    assert!(!report.diagnostics.has(DiagnosticKind::CoercionFailed));
    assert_eq!(graph.nodes_of_type("root_dep_1").len(), 1);
    let back = ConfigExtractor::new(&generation).generate(&graph, "root").unwrap();
    assert_eq!(back, detailed);

    let short = json!({"dep": "1.0"});
    assert_eq!(round_trip(&generation, &short), short);
}

#[test]
fn test_required_empty_array_round_trips() {
    let schema = json!({
        "type": "object",
        "required": ["features"],
        "properties": {
            "features": {"type": "array", "items": {"type": "string"}}
        }
    });
    let generation = NodeTypeGenerator::default().generate(&schema).unwrap();
    let value = json!({"features": []});
    assert_eq!(round_trip(&generation, &value), value);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
enum Level {
    Info,
    Warn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
struct Target {
    arch: String,
    cpus: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
enum Runner {
    Qemu { machine: String },
    Uboot { board: String },
}

/// Build settings for a kernel image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
struct BuildConfig {
    name: String,
    debug: bool,
    level: Level,
    features: Vec<String>,
    target: Option<Target>,
    runner: Runner,
}

#[test]
fn test_derived_schema_round_trip() {
    let generation = Generation::from_type::<BuildConfig>(GenerateOptions::default()).unwrap();
    assert_eq!(generation.variants.variants("root_runner").len(), 2);

    let config = BuildConfig {
        name: "kernel".into(),
        debug: true,
        level: Level::Warn,
        features: vec!["smp".into(), "net".into()],
        target: Some(Target {
            arch: "aarch64".into(),
            cpus: 4,
        }),
        runner: Runner::Uboot {
            board: "rk3588".into(),
        },
    };
    let value = serde_json::to_value(&config).unwrap();
    let back = round_trip(&generation, &value);
    let typed: BuildConfig = serde_json::from_value(back).unwrap();
    assert_eq!(typed, config);
}
