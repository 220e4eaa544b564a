use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sculpt_graph_core::{ConnectionRequest, GraphDocument, GraphEngine, NodeParams, ScopeId, Value};
use sculpt_test_fixtures::node_graphs;

fn chain(len: usize) -> (GraphEngine, String) {
    let root = ScopeId::Root;
    let mut engine = GraphEngine::default();
    let head = engine.add_node("constant", &root).unwrap();
    let mut prev = head.clone();
    for _ in 0..len {
        let next = engine.add_node("add_one", &root).unwrap();
        engine
            .add_edge(&ConnectionRequest::new(prev.as_str(), next.as_str()), &root)
            .unwrap();
        prev = next;
    }
    engine.recompute(&root).unwrap();
    (engine, head)
}

fn fan_out(width: usize) -> (GraphEngine, String) {
    let root = ScopeId::Root;
    let mut engine = GraphEngine::default();
    let head = engine.add_node("constant", &root).unwrap();
    let sum = engine.add_node("sum", &root).unwrap();
    for _ in 0..width {
        let leaf = engine.add_node("double", &root).unwrap();
        engine
            .add_edge(&ConnectionRequest::new(head.as_str(), leaf.as_str()), &root)
            .unwrap();
        engine
            .add_edge(&ConnectionRequest::new(leaf.as_str(), sum.as_str()), &root)
            .unwrap();
    }
    engine.recompute(&root).unwrap();
    (engine, head)
}

type Builder = fn(usize) -> (GraphEngine, String);

fn bench_invalidate_and_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("invalidate_and_recompute");
    let builders: [(&str, Builder); 2] = [("chain", chain), ("fan_out", fan_out)];
    for size in [16usize, 128, 1024] {
        for (label, build) in builders {
            let (mut engine, head) = build(size);
            let mut value = 0.0f32;
            group.bench_with_input(BenchmarkId::new(label, size), &size, |b, _| {
                b.iter(|| {
                    value += 1.0;
                    let params = NodeParams::new().with("value", "value", Value::f(value));
                    engine.set_params(&head, &params, &ScopeId::Root).unwrap();
                    black_box(engine.recompute(&ScopeId::Root).unwrap());
                })
            });
        }
    }
    group.finish();
}

fn bench_clean_pass(c: &mut Criterion) {
    let (mut engine, _) = chain(1024);
    c.bench_function("clean_pass_chain_1024", |b| {
        b.iter(|| black_box(engine.recompute(&ScopeId::Root).unwrap()))
    });
}

fn bench_fixture_load(c: &mut Criterion) {
    let doc: GraphDocument = node_graphs::document("scene").expect("scene fixture");
    c.bench_function("load_and_recompute_scene", |b| {
        b.iter(|| {
            let mut engine = GraphEngine::from_document(black_box(&doc)).unwrap();
            black_box(engine.recompute(&ScopeId::Root).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_invalidate_and_recompute,
    bench_clean_pass,
    bench_fixture_load
);
criterion_main!(benches);
