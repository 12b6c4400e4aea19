//! Benchmark suite for the cataloging pipeline.
//!
//! Run with: cargo bench --bench pipeline_bench
//!
//! - B1: Walker throughput (atomic-bundle detection vs plain file tree)
//! - B2: Fast + full hash throughput over a mid-sized file
//! - B3: End-to-end `run_index` over a synthetic tree

use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::TempDir;

use sortomatic::catalog::Catalog;
use sortomatic::config::{Settings, CAT_DOCUMENT};
use sortomatic::hasher::compute_hashes;
use sortomatic::pipeline::PipelineManager;
use sortomatic::walker::walk;

fn plain_tree(file_count: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..file_count {
        fs::write(dir.path().join(format!("f{i:05}.dat")), format!("payload {i}")).unwrap();
    }
    dir
}

fn tree_with_bundles(file_count: usize, bundle_count: usize) -> TempDir {
    let dir = plain_tree(file_count);
    for b in 0..bundle_count {
        let repo = dir.path().join(format!("repo{b}"));
        fs::create_dir(&repo).unwrap();
        fs::create_dir(repo.join(".git")).unwrap();
        for i in 0..20 {
            fs::write(repo.join(format!("src{i}.rs")), "fn f() {}").unwrap();
        }
    }
    dir
}

fn benchmark_b1_walker(c: &mut Criterion) {
    let mut group = c.benchmark_group("B1_Walker");

    let plain = plain_tree(2000);
    group.throughput(Throughput::Elements(2000));
    group.bench_function("plain_tree", |b| {
        b.iter(|| {
            let settings = Settings::default();
            let count = walk(black_box(plain.path()), &settings).count();
            black_box(count);
        })
    });

    let bundled = tree_with_bundles(2000, 50);
    group.bench_function("tree_with_bundles", |b| {
        b.iter(|| {
            let settings = Settings::default();
            let count = walk(black_box(bundled.path()), &settings).count();
            black_box(count);
        })
    });

    group.finish();
}

fn benchmark_b2_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("B2_Hashing");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mid.bin");
    let payload = vec![0x42u8; 8 * 1024 * 1024];
    fs::write(&path, &payload).unwrap();
    let settings = Settings::default();

    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("fast_plus_full_hash_8mib", |b| {
        b.iter(|| {
            let result = compute_hashes(
                black_box(&path),
                payload.len() as i64,
                CAT_DOCUMENT,
                &settings,
            );
            black_box(result);
        })
    });

    group.finish();
}

fn benchmark_b3_run_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("B3_RunIndex");
    group.throughput(Throughput::Elements(1000));
    group.bench_function("run_index_1000_files", |b| {
        b.iter(|| {
            let dir = plain_tree(1000);
            let db_path = dir.path().join(".sortomatic").join("sortomatic.db");
            fs::create_dir_all(db_path.parent().unwrap()).unwrap();
            let mut catalog = Catalog::open(&db_path).unwrap();
            let settings = Arc::new(Settings::default());
            let manager = PipelineManager::new(settings).unwrap();
            let cancel = AtomicBool::new(false);
            let stats = manager
                .run_index(dir.path(), &mut catalog, &|_| {}, &cancel)
                .unwrap();
            black_box(stats);
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_b1_walker, benchmark_b2_hashing, benchmark_b3_run_index);
criterion_main!(benches);
