use std::collections::HashMap;

use sculpt_api_core::json::parse_value;
use sculpt_graph_core::{EngineConfig, GraphDocument, GraphEngine, NodeRegistry, ScopeId};
use serde::Deserialize;
use sculpt_test_fixtures::node_graphs;

#[derive(Debug, Default, Deserialize)]
struct Expected {
    #[serde(default)]
    outputs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    failed: Vec<String>,
    /// Nodes that resolve cleanly without any output.
    #[serde(default)]
    empty: Vec<String>,
}

fn load(name: &str) -> GraphEngine {
    let doc: GraphDocument = node_graphs::document(name).expect("fixture document");
    let mut engine = GraphEngine::default();
    engine
        .load_document(&doc, &ScopeId::Root)
        .unwrap_or_else(|e| panic!("{name}: {e}"));
    engine
}

fn check(name: &str, engine: &GraphEngine) {
    let expected: Expected = node_graphs::expected(name)
        .expect("expected file")
        .unwrap_or_default();
    for (id, raw) in &expected.outputs {
        let want = parse_value(raw.clone()).expect("expected value");
        let node = engine.node(id).unwrap_or_else(|| panic!("{name}: no node {id}"));
        assert!(node.error.is_none(), "{name}: {id} failed: {:?}", node.error);
        assert_eq!(node.primary_output(), Some(&want), "{name}: output of {id}");
    }
    for id in &expected.failed {
        let node = engine.node(id).expect("failed node exists");
        assert!(node.has_error(), "{name}: {id} should have failed");
    }
    for id in &expected.empty {
        let node = engine.node(id).expect("empty node exists");
        assert!(node.error.is_none() && node.output.is_none(), "{name}: {id} should be empty");
    }
}

#[test]
fn fixtures_recompute_to_expected_outputs() {
    for name in node_graphs::keys() {
        let mut engine = load(&name);
        engine.recompute_root().expect("recompute");
        check(&name, &engine);

        let second = engine.recompute_root().expect("second recompute");
        assert!(second.is_noop(), "{name}: second pass should do nothing");
    }
}

#[test]
fn eager_engines_settle_while_loading() {
    for name in node_graphs::keys() {
        let doc = GraphDocument::from_json(&node_graphs::document_json(&name).unwrap()).unwrap();
        let mut engine = GraphEngine::with_config(NodeRegistry::with_builtins(), EngineConfig::eager());
        engine.load_document(&doc, &ScopeId::Root).unwrap();
        check(&name, &engine);
        assert!(engine
            .nodes_in(&ScopeId::Root)
            .unwrap()
            .iter()
            .all(|n| !n.dirty));
    }
}

#[test]
fn scene_failures_name_their_cause() {
    let mut engine = load("scene");
    engine.recompute_root().unwrap();
    let mesh = engine.get_runtime("mesh", &ScopeId::Root).unwrap();
    let json = serde_json::to_value(&mesh).unwrap();
    assert_eq!(json["type"], "import");
    assert_eq!(json["error"]["kind"], "compute_failure");
    assert_eq!(json["error"]["cause"], "no file selected");

    let moved = engine.get_runtime("mesh_moved", &ScopeId::Root).unwrap();
    let json = serde_json::to_value(&moved).unwrap();
    assert_eq!(json["error"]["kind"], "upstream_failure");
    assert_eq!(json["error"]["upstream"], "mesh");

    let sun = engine.get_runtime("sun", &ScopeId::Root).unwrap();
    assert!(!sun.visible);
    assert!(sun.error.is_none());
}

#[test]
fn editing_inside_a_loaded_subflow_reaches_the_root() {
    let mut engine = load("grouped");
    engine.recompute_root().unwrap();

    let inner = engine.enter_subflow(&"g".to_string()).unwrap();
    let params = sculpt_graph_core::NodeParams::new()
        .with("value", "value", sculpt_graph_core::Value::f(5.0));
    engine.set_params("k", &params, &inner).unwrap();
    engine.return_to_root();
    engine.recompute_root().unwrap();

    let m = engine.node("m").and_then(|n| n.primary_output()).cloned();
    assert_eq!(m, Some(sculpt_graph_core::Value::f(20.0)));
}
