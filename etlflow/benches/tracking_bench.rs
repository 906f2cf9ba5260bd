//! Benchmarks for tracking-store reconciliation and updates.

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use etlflow::tracking::{MemoryBackend, PipelineDefaults, TrackedField, TrackingStore};
use etlflow::utils::FixedClock;
use std::collections::BTreeMap;
use std::time::Duration;

fn pipeline_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("pipeline_{i:04}")).collect()
}

fn defaults(names: &[String]) -> BTreeMap<String, PipelineDefaults> {
    names
        .iter()
        .map(|name| {
            (
                name.clone(),
                PipelineDefaults::new().with_interval(Duration::from_secs(900)),
            )
        })
        .collect()
}

fn tracking_benchmark(c: &mut Criterion) {
    let names = pipeline_names(200);
    let defaults = defaults(&names);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    c.bench_function("load_200_pipelines", |b| {
        let backend = MemoryBackend::new();
        b.iter(|| {
            let mut store = TrackingStore::new(backend.clone()).with_clock(FixedClock::new(now));
            black_box(store.load(&names, &defaults).unwrap().len())
        });
    });

    c.bench_function("update_aligned_trigger", |b| {
        let mut store = TrackingStore::new(MemoryBackend::new()).with_clock(FixedClock::new(now));
        store.load(&names, &defaults).unwrap();
        b.iter(|| {
            black_box(
                store
                    .update("pipeline_0100", TrackedField::LastTriggerTime)
                    .unwrap(),
            )
        });
    });
}

criterion_group!(benches, tracking_benchmark);
criterion_main!(benches);
