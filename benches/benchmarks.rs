use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use serde_json::json;
use shopdesk::app::ROUTES;
use shopdesk::router::PathPattern;
use shopdesk::{MemoryHistory, Router, Store};

fn pattern_compile_benchmark(c: &mut Criterion) {
    c.bench_function("pattern_compile", |b| {
        b.iter(|| PathPattern::compile(black_box("/clients/:id/vehicles/:vehicle")));
    });
}

fn route_resolution_benchmark(c: &mut Criterion) {
    let router = Router::new(MemoryHistory::new());
    for (pattern, _) in ROUTES {
        router.add_route(pattern, |_| Ok(())).unwrap();
    }
    router.add_route("*", |_| Ok(())).unwrap();
    router.init();

    let mut group = c.benchmark_group("route_resolution");
    for path in ["/dashboard", "/invoices/42", "/missing/page"] {
        group.bench_with_input(BenchmarkId::from_parameter(path), path, |b, path| {
            let mut toggle = false;
            b.iter(|| {
                // Alternate so every navigation changes the hash.
                toggle = !toggle;
                let target = if toggle { path } else { "/clients" };
                black_box(router.navigate(target));
            });
        });
    }
    group.finish();
}

fn store_set_benchmark(c: &mut Criterion) {
    let store = Store::new();

    c.bench_function("store_set", |b| {
        let mut i = 0;
        b.iter(|| {
            store.set("counter", black_box(i)).unwrap();
            i += 1;
        });
    });
}

fn store_update_benchmark(c: &mut Criterion) {
    let store = Store::new();
    store
        .set("user", json!({ "name": "Ana", "role": "admin" }))
        .unwrap();

    c.bench_function("store_update", |b| {
        let mut i = 0;
        b.iter(|| {
            store.update("user", json!({ "visits": black_box(i) })).unwrap();
            i += 1;
        });
    });
}

fn store_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let store = Store::new();
        let subscriptions: Vec<_> = (0..*subscriber_count)
            .map(|_| store.subscribe("value", |_| {}))
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.set("value", black_box(i)).unwrap();
                    i += 1;
                });
            },
        );
        drop(subscriptions);
    }
    group.finish();
}

criterion_group!(
    benches,
    pattern_compile_benchmark,
    route_resolution_benchmark,
    store_set_benchmark,
    store_update_benchmark,
    store_subscribe_benchmark,
);
criterion_main!(benches);
