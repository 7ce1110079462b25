//! Benchmarks for typed dataset transfer through the access layer.

use criterion::{criterion_group, criterion_main, Criterion};

use cellar::{AccessMode, Archive};

const N: usize = 100_000;

fn make_f64_data() -> Vec<f64> {
    (0..N).map(|i| i as f64).collect()
}

fn bench_write_f64(c: &mut Criterion) {
    let dir = std::env::temp_dir();
    let path = dir.join("cellar_bench_write.clr");
    let data = make_f64_data();

    c.bench_function("write_100k_f64", |b| {
        b.iter(|| {
            let mut ar = Archive::open(&path, AccessMode::Write).unwrap();
            ar.at("data").unwrap().write(&data).unwrap();
            ar.close().unwrap();
        })
    });

    std::fs::remove_file(&path).ok();
}

fn bench_read_f64(c: &mut Criterion) {
    let dir = std::env::temp_dir();
    let path = dir.join("cellar_bench_read.clr");
    let data = make_f64_data();
    let mut ar = Archive::open(&path, AccessMode::Write).unwrap();
    ar.at("data").unwrap().write(&data).unwrap();
    ar.close().unwrap();

    c.bench_function("read_100k_f64", |b| {
        b.iter(|| {
            let mut ar = Archive::open(&path, AccessMode::Read).unwrap();
            let mut out: Vec<f64> = Vec::new();
            ar.at("data").unwrap().read(&mut out).unwrap();
            out
        })
    });

    std::fs::remove_file(&path).ok();
}

fn bench_read_converted(c: &mut Criterion) {
    let dir = std::env::temp_dir();
    let path = dir.join("cellar_bench_convert.clr");
    let data = make_f64_data();
    let mut ar = Archive::open(&path, AccessMode::Write).unwrap();
    ar.at("data").unwrap().write(&data).unwrap();
    ar.close().unwrap();

    // Same dataset, read through the f64 -> f32 conversion loop.
    c.bench_function("read_100k_f64_as_f32", |b| {
        b.iter(|| {
            let mut ar = Archive::open(&path, AccessMode::Read).unwrap();
            let mut out: Vec<f32> = Vec::new();
            ar.at("data").unwrap().read(&mut out).unwrap();
            out
        })
    });

    std::fs::remove_file(&path).ok();
}

criterion_group!(
    benches,
    bench_write_f64,
    bench_read_f64,
    bench_read_converted
);
criterion_main!(benches);
