use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meshgraph_engine::{CallObservation, ComponentObservation, ModelManager, Scope};
use meshgraph_store::{MemoryBackend, ModelStore};
use meshgraph_types::ManualClock;
use std::sync::Arc;
use std::thread;

fn manager() -> ModelManager {
    let store = ModelStore::new(Arc::new(MemoryBackend::new()), Arc::new(ManualClock::new(0)));
    ModelManager::new(Arc::new(store)).unwrap()
}

fn component(index: usize) -> ComponentObservation {
    ComponentObservation::new("prod", "default", format!("instance-{}", index / 10), format!("svc-{index}"))
        .with_instance_kind("Cell")
}

/// Populate a chain-with-fanout graph of `size` components
fn populate(manager: &ModelManager, size: usize) {
    for i in 1..size {
        manager.observe_call(&CallObservation::new(component(i / 2), component(i)));
    }
}

/// Benchmark repeated observation of a known call (hot path)
fn bench_observe_known_call(c: &mut Criterion) {
    let manager = manager();
    let call = CallObservation::new(component(0), component(1));
    manager.observe_call(&call);

    c.bench_function("observe_known_call", |b| {
        b.iter(|| manager.observe_call(black_box(&call)));
    });
}

/// Benchmark node lookup with varying graph sizes
fn bench_get_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_node");

    for size in [10usize, 100, 1_000].iter() {
        let manager = manager();
        populate(&manager, *size);
        let target = format!("svc-{}", size - 1);
        let instance = format!("instance-{}", (size - 1) / 10);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| manager.get_node("prod", "default", black_box(&instance), black_box(&target)));
        });
    }
    group.finish();
}

/// Benchmark snapshotting the live graph
fn bench_current_models(c: &mut Criterion) {
    let mut group = c.benchmark_group("current_runtime_models");

    for size in [100usize, 1_000].iter() {
        let manager = manager();
        populate(&manager, *size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(manager.current_runtime_models()));
        });
    }
    group.finish();
}

/// Benchmark scoped extraction from a merged model
fn bench_extract_scope(c: &mut Criterion) {
    let manager = manager();
    populate(&manager, 1_000);
    let model = manager.current_model("prod").unwrap();

    c.bench_function("extract_instance_scope", |b| {
        b.iter(|| {
            meshgraph_engine::extract_scope(
                black_box(&model),
                "prod",
                Scope::Instance {
                    namespace: "default",
                    instance: "instance-0",
                },
            )
        });
    });
}

/// Benchmark concurrent observation from several threads
fn bench_concurrent_observations(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_observations");

    for thread_count in [1, 2, 4, 8].iter() {
        group.throughput(Throughput::Elements(*thread_count as u64 * 100));
        group.bench_with_input(
            BenchmarkId::new("threads", thread_count),
            thread_count,
            |b, &thread_count| {
                b.iter(|| {
                    let manager = Arc::new(manager());
                    let handles: Vec<_> = (0..thread_count)
                        .map(|t| {
                            let manager = Arc::clone(&manager);
                            thread::spawn(move || {
                                for i in 0..100 {
                                    manager.observe_call(&CallObservation::new(
                                        component(t),
                                        component(i),
                                    ));
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_observe_known_call,
    bench_get_node,
    bench_current_models,
    bench_extract_scope,
    bench_concurrent_observations,
);
criterion_main!(benches);
