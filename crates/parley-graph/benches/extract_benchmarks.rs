//! Benchmarks for graph extraction and normalization on realistic responses.
//!
//! The fenced-block case is the slow path: the whole-string and embedded
//! steps both miss before the regex scan runs.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use parley_core::ThemeVariant;
use parley_graph::{extract, resolve};
use serde_json::{json, Value};

fn graph_payload(index: usize) -> Value {
    let labels: Vec<String> = (0..12).map(|m| format!("Month {}", m + 1)).collect();
    let values: Vec<usize> = (0..12).map(|m| (m * 37 + index) % 500).collect();
    json!({
        "type": ["bar", "line", "pie"][index % 3],
        "labels": labels,
        "values": values,
        "title": format!("Report {}", index),
    })
}

/// Prose with stray braces before and after a fenced payload.
fn fenced_response(index: usize) -> Value {
    Value::String(format!(
        "Here is the monthly summary you asked for. Totals exclude {{pending}} \
         items and the {{archived}} ledger.\n\n```json\n{}\n```\n\n\
         Let me know if you want a different breakdown.",
        json!({ "graph_data": graph_payload(index) })
    ))
}

fn structured_response(index: usize) -> Value {
    json!({
        "response": "Here is the monthly summary you asked for.",
        "graph_data": graph_payload(index),
        "thread_id": "bench-thread",
    })
}

fn plain_response(index: usize) -> Value {
    json!({
        "response": format!(
            "The quarterly numbers look stable. Reference {} has no chart attached \
             and the totals match last period within a percent.",
            index
        ),
    })
}

fn bench_extraction(c: &mut Criterion) {
    let fenced: Vec<Value> = (0..100).map(fenced_response).collect();
    let structured: Vec<Value> = (0..100).map(structured_response).collect();
    let plain: Vec<Value> = (0..100).map(plain_response).collect();

    let mut group = c.benchmark_group("graph_extraction");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("structured_field", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let out = extract(&structured[idx % structured.len()]);
            idx += 1;
            out
        });
    });

    group.bench_function("fenced_block", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let out = extract(&fenced[idx % fenced.len()]);
            idx += 1;
            out
        });
    });

    group.bench_function("plain_text", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let out = extract(&plain[idx % plain.len()]);
            idx += 1;
            out
        });
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let fenced: Vec<Value> = (0..100).map(fenced_response).collect();

    let mut group = c.benchmark_group("graph_resolve");
    group.bench_function("fenced_to_chart_config", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let out = resolve(&fenced[idx % fenced.len()], ThemeVariant::Dark);
            idx += 1;
            out
        });
    });
    group.finish();
}

criterion_group!(benches, bench_extraction, bench_resolve);
criterion_main!(benches);
