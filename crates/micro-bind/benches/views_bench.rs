//! Benchmarks for derived view maintenance and list projection.
//!
//! Run with: `cargo bench --package micro-bind --bench views_bench`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use micro_bind::{Element, List, Record, Value, bind, filter, map};
use std::hint::black_box;

// ============================================================================
// Test Data Generation
// ============================================================================

fn numbers(len: usize) -> List {
    (0..len).map(Value::from).collect()
}

fn is_even(value: &Value, _: usize, _: &List) -> bool {
    value.as_number().is_some_and(|n| n % 2.0 == 0.0)
}

// ============================================================================
// Derived Views
// ============================================================================

fn bench_filter_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_build");

    for size in [100, 1_000, 10_000] {
        let source = numbers(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, source| {
            b.iter(|| filter(black_box(source), is_even));
        });
    }

    group.finish();
}

fn bench_filter_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_set");

    for size in [100, 1_000, 10_000] {
        let source = numbers(size);
        let _view = filter(&source, is_even);
        let middle = size / 2;
        let mut flip = 0usize;
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                // Alternate between a matching and a non-matching value.
                flip += 1;
                source.set(middle, black_box(flip % 2));
            });
        });
    }

    group.finish();
}

fn bench_chain_splice(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_of_filter_splice");

    for size in [100, 1_000, 10_000] {
        let source = numbers(size);
        let evens = filter(&source, is_even);
        let _doubled = map(&evens, |v| Value::from(v.as_number().unwrap_or(0.0) * 2.0));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                source.splice(0, 0, [Value::from(2)]);
                source.remove(0);
            });
        });
    }

    group.finish();
}

// ============================================================================
// Projection
// ============================================================================

fn bench_list_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_projection");

    for size in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("bind", size), &size, |b, &size| {
            b.iter(|| {
                let data = Record::from_iter([("items", Value::from(numbers(size)))]);
                let ul = Element::new("ul")
                    .with_binding("content", "list items")
                    .with_child(Element::new("li").with_binding("content", "item"));
                black_box(bind(ul, &data))
            });
        });

        let items = numbers(size);
        let data = Record::from_iter([("items", Value::from(items.clone()))]);
        let ul = Element::new("ul")
            .with_binding("content", "list items")
            .with_child(Element::new("li").with_binding("content", "item"));
        let _scope = bind(ul, &data);
        group.bench_function(BenchmarkId::new("push_remove", size), |b| {
            b.iter(|| {
                items.push([Value::from(-1)]);
                items.remove(items.len() - 1);
            });
        });
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(
    benches,
    bench_filter_build,
    bench_filter_set,
    bench_chain_splice,
    bench_list_projection,
);

criterion_main!(benches);
