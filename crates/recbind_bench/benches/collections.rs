//! Big-collection benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use recbind_codec::{CodecRegistry, TypeDescriptor};
use recbind_core::{LargeList, LargeMap, MapperConfig};
use recbind_storage::{InMemoryClient, RecordKey};
use std::sync::Arc;

fn fresh_list(config: &MapperConfig) -> LargeList<i64> {
    LargeList::new(
        Arc::new(InMemoryClient::new()),
        Arc::new(CodecRegistry::new()),
        RecordKey::new("bench", "lists", "l1"),
        "items",
        TypeDescriptor::I64,
        config,
    )
}

/// Benchmark single and chunked appends.
fn bench_list_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_append");

    group.bench_function("add", |b| {
        let list = fresh_list(&MapperConfig::default());
        let mut n = 0i64;
        b.iter(|| {
            n += 1;
            list.add(black_box(n)).unwrap();
        });
    });

    for chunk in [10usize, 100, 1000] {
        group.throughput(Throughput::Elements(1000));
        group.bench_with_input(BenchmarkId::new("add_all_1000", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let list = fresh_list(&MapperConfig::default().list_chunk_size(chunk));
                black_box(list.add_all(0..1000).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark reads from a populated list.
fn bench_list_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_read");
    let list = fresh_list(&MapperConfig::default());
    list.add_all(0..10_000).unwrap();

    group.bench_function("get", |b| {
        b.iter(|| black_box(list.get(black_box(5_000)).unwrap()));
    });

    group.bench_function("range_100", |b| {
        b.iter(|| black_box(list.range(black_box(1_000), black_box(1_099)).unwrap()));
    });

    group.finish();
}

/// Benchmark map puts and lookups.
fn bench_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");
    let map: LargeMap<String, i64> = LargeMap::new(
        Arc::new(InMemoryClient::new()),
        Arc::new(CodecRegistry::new()),
        RecordKey::new("bench", "maps", "m1"),
        "scores",
        (TypeDescriptor::Text, TypeDescriptor::I64),
        &MapperConfig::default(),
    );
    map.put_all((0..500).map(|i| (format!("k{}", i), i))).unwrap();

    group.bench_function("put_overwrite", |b| {
        b.iter(|| map.put(black_box("k250".to_string()), black_box(1)).unwrap());
    });

    group.bench_function("get", |b| {
        b.iter(|| black_box(map.get(black_box("k499".to_string())).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_list_append, bench_list_read, bench_map);
criterion_main!(benches);
