//! Dispatch hot-path benchmarks using Criterion.rs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use wfm_orchestration_core::domain::{domain_rule_set, WORKFLOW_MANAGER_SOURCE};
use wfm_orchestration_core::envelope::EventEnvelope;

fn event(source: &str, detail_type: &str) -> EventEnvelope {
    EventEnvelope::from_value(json!({
        "source": source,
        "detail-type": detail_type,
        "detail": {
            "portalRunId": "20240501abcdef01",
            "workflowName": "qc",
            "workflowVersion": "1.0",
            "status": "SUCCEEDED"
        }
    }))
    .expect("bench event should parse")
}

fn bench_dispatch(c: &mut Criterion) {
    let rules = domain_rule_set(WORKFLOW_MANAGER_SOURCE).expect("domain rules should build");
    let external = "orcabus.executionservice";
    let own = WORKFLOW_MANAGER_SOURCE;
    let cases = vec![
        ("legacy_match", event(external, "WorkflowRunStateChange")),
        ("self_sourced", event(own, "WorkflowRunStateChange")),
        ("unknown_type", event(external, "FastqListRowStateChange")),
    ];

    let mut group = c.benchmark_group("dispatch");
    for (name, envelope) in &cases {
        let id = BenchmarkId::from_parameter(name);
        group.bench_with_input(id, envelope, |b, envelope| {
            b.iter(|| black_box(rules.dispatch(black_box(envelope)).is_ok()));
        });
    }
    group.finish();
}

fn bench_fingerprint(c: &mut Criterion) {
    let envelope = event("orcabus.executionservice", "WorkflowRunUpdate");
    c.bench_function("fingerprint", |b| {
        b.iter(|| black_box(envelope.fingerprint()))
    });
}

criterion_group!(benches, bench_dispatch, bench_fingerprint);
criterion_main!(benches);
