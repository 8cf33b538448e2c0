// Record store performance benchmarks for SparseDb

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sparsedb::{Mode, Options, RecordStore};
use std::hint::black_box;
use tempfile::TempDir;

fn bench_opts() -> Options {
    Options::new().map_size(1 << 24)
}

fn benchmark_sequential_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_put");

    for size in [100u32, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let mut store =
                    RecordStore::open_with(temp_dir.path().join("s"), Mode::Create, bench_opts())
                        .unwrap();

                for id in 1..=size {
                    let payload = format!("payload for chunk {:08}", id);
                    store.put(id, payload.as_bytes()).unwrap();
                }

                black_box(&store);
            });
        });
    }

    group.finish();
}

fn benchmark_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    for size in [1000u32, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut store =
                RecordStore::open_with(temp_dir.path().join("s"), Mode::Create, bench_opts())
                    .unwrap();
            for id in 1..=size {
                store.put(id, format!("payload {:08}", id).as_bytes()).unwrap();
            }

            b.iter(|| {
                for id in 1..=size {
                    black_box(store.get(id).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_overwrite_in_place(c: &mut Criterion) {
    let mut group = c.benchmark_group("overwrite_in_place");
    group.throughput(Throughput::Elements(10000));

    group.bench_function("same_size", |b| {
        let temp_dir = TempDir::new().unwrap();
        let mut store =
            RecordStore::open_with(temp_dir.path().join("s"), Mode::Create, bench_opts()).unwrap();
        for id in 1..=100u32 {
            store.put(id, &[0u8; 64]).unwrap();
        }

        b.iter(|| {
            for round in 0..100u32 {
                for id in 1..=100u32 {
                    store.put(id, &[round as u8; 64]).unwrap();
                }
            }
            black_box(&store);
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_sequential_put, benchmark_get, benchmark_overwrite_in_place);
criterion_main!(benches);
