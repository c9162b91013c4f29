//! Performance benchmarks for the client-count report pipeline
//!
//! Run with: cargo bench

use chrono::{TimeZone, Utc};
use client_counts::analyzer::normalize_activity;
use client_counts::months::build_series;
use client_counts::normalizer::normalize_namespaces;
use client_counts::ranking::rank;
use client_counts::sources::from_response;
use client_counts::timestamp_parser::CalendarMonth;
use client_counts::{
    ActivityResponse, ClientCountAnalyzer, Endpoint, Fetched, ReportQuery, SourceSet,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};

/// Alternate between the deprecated and current key names.
fn counts(seed: u64, deprecated: bool) -> Value {
    let entity = seed * 3 % 1_000;
    let non_entity = seed * 7 % 1_000;
    if deprecated {
        json!({"distinct_entities": entity, "non_entity_tokens": non_entity, "clients": entity + non_entity})
    } else {
        json!({"entity_clients": entity, "non_entity_clients": non_entity, "clients": entity + non_entity})
    }
}

fn namespaces(count: usize, month_seed: u64) -> Value {
    let blocks: Vec<Value> = (0..count)
        .map(|i| {
            let seed = i as u64 + month_seed;
            json!({
                "namespace_id": format!("ns{i}"),
                "namespace_path": format!("team{i}/"),
                "counts": counts(seed, i % 2 == 0),
                "mounts": [
                    {"mount_path": "auth/token/", "counts": counts(seed + 1, false)},
                    {"mount_path": "auth/approle/", "counts": counts(seed + 2, true)}
                ]
            })
        })
        .collect();
    Value::Array(blocks)
}

/// Generate an activity body with the given number of namespaces over 24 months.
fn generate_activity(namespace_count: usize) -> Value {
    let first = CalendarMonth::new(2022, 1).unwrap();
    let months: Vec<Value> = (0..24)
        .rev()
        .map(|i| {
            let month = first.add_months(i);
            if i < 3 {
                return json!({"timestamp": month.first_instant().to_rfc3339(), "counts": null});
            }
            json!({
                "timestamp": month.first_instant().to_rfc3339(),
                "counts": counts(i as u64, i < 12),
                "namespaces": namespaces(namespace_count, i as u64),
                "new_clients": {
                    "counts": counts(i as u64 + 5, false),
                    "namespaces": namespaces(namespace_count / 2, i as u64 + 5)
                }
            })
        })
        .collect();

    json!({
        "request_id": "bench",
        "data": {
            "start_time": "2022-01-01T00:00:00Z",
            "end_time": "2023-12-31T23:59:59Z",
            "total": counts(42, false),
            "by_namespace": namespaces(namespace_count, 0),
            "months": months
        }
    })
}

fn benchmark_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_activity");

    for size in [10, 100, 1000].iter() {
        let response: ActivityResponse = serde_json::from_value(generate_activity(*size)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| normalize_activity(black_box(&response)))
        });
    }

    group.finish();
}

fn benchmark_month_series(c: &mut Criterion) {
    let response: ActivityResponse = serde_json::from_value(generate_activity(100)).unwrap();
    let months = response.data.and_then(|d| d.months).unwrap_or_default();

    c.bench_function("build_series", |b| b.iter(|| build_series(black_box(&months))));
}

fn benchmark_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_namespaces");

    for size in [100, 1000, 10000].iter() {
        let response: ActivityResponse = serde_json::from_value(generate_activity(*size)).unwrap();
        let raw = response.data.and_then(|d| d.by_namespace).unwrap_or_default();
        let blocks = normalize_namespaces(&raw).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| rank(black_box(&blocks), 10))
        });
    }

    group.finish();
}

fn benchmark_build_report(c: &mut Criterion) {
    let body = generate_activity(100);
    let activity: Fetched<ActivityResponse> = from_response(Endpoint::Activity, 200, Some(body));
    let sources = SourceSet {
        activity,
        config: from_response(
            Endpoint::Config,
            200,
            Some(json!({"data": {"enabled": "default-enable", "queries_available": true}})),
        ),
        license: from_response(
            Endpoint::License,
            200,
            Some(json!({"data": {"autoloaded": {"start_time": "2022-01-01T00:00:00Z"}}})),
        ),
        ..Default::default()
    };
    let query = ReportQuery::at(Utc.with_ymd_and_hms(2023, 12, 15, 0, 0, 0).unwrap());
    let analyzer = ClientCountAnalyzer::default();

    c.bench_function("build_report", |b| {
        b.iter(|| analyzer.build_report(black_box(&sources), black_box(&query)))
    });
}

criterion_group!(
    benches,
    benchmark_normalize,
    benchmark_month_series,
    benchmark_ranking,
    benchmark_build_report
);
criterion_main!(benches);
