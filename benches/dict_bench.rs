// Dictionary performance benchmarks for SparseDb

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sparsedb::{Dictionary, Mode, Options};
use std::hint::black_box;
use tempfile::TempDir;

fn bench_opts() -> Options {
    Options::new().map_size(1 << 24)
}

fn benchmark_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("dict_insert");

    for size in [1000u32, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let temp_dir = TempDir::new().unwrap();
                let mut dict =
                    Dictionary::open_with(temp_dir.path().join("d"), Mode::Create, bench_opts())
                        .unwrap();

                for i in 0..size {
                    dict.insert(&format!("term-{:08}", i)).unwrap();
                }

                black_box(&dict);
            });
        });
    }

    group.finish();
}

fn benchmark_lookup_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("dict_lookup_hit");

    for size in [1000u32, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut dict =
                Dictionary::open_with(temp_dir.path().join("d"), Mode::Create, bench_opts())
                    .unwrap();
            for i in 0..size {
                dict.insert(&format!("term-{:08}", i)).unwrap();
            }

            b.iter(|| {
                for i in 0..size {
                    black_box(dict.lookup(&format!("term-{:08}", i)).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn benchmark_lookup_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("dict_lookup_miss");
    group.throughput(Throughput::Elements(10000));

    group.bench_function("10000", |b| {
        let temp_dir = TempDir::new().unwrap();
        let mut dict =
            Dictionary::open_with(temp_dir.path().join("d"), Mode::Create, bench_opts()).unwrap();
        for i in 0..10000u32 {
            dict.insert(&format!("term-{:08}", i)).unwrap();
        }

        b.iter(|| {
            for i in 0..10000u32 {
                black_box(dict.lookup(&format!("absent-{:08}", i)).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_insert, benchmark_lookup_hit, benchmark_lookup_miss);
criterion_main!(benches);
