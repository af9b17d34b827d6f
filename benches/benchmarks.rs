use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use json_prefs::{FlushPolicy, Node, PrefStore};
use std::hint::black_box;
use std::path::PathBuf;
use std::time::Duration;

fn bench_path(name: &str, size: usize) -> PathBuf {
    std::env::temp_dir().join(format!("json_prefs_bench_{}_{}.json", name, size))
}

/// `size` children with ten keys each.
fn populate(root: &Node, size: usize) {
    for n in 0..size {
        let node = root.child(&format!("node{n}")).unwrap();
        for k in 0..10 {
            node.put(&format!("k{k}"), format!("value {n}/{k}")).unwrap();
        }
    }
}

fn bench_put_get_manual(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_get_manual");
    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("keys", size), &size, |b, &size| {
            let path = bench_path("put_get", size);
            let _ = std::fs::remove_file(&path);
            let store = PrefStore::builder(&path)
                .policy(FlushPolicy::Manual)
                .build()
                .unwrap();
            let node = store.root().child("bench").unwrap();
            b.iter(|| {
                for i in 0..size {
                    node.put(&format!("k{i}"), i.to_string()).unwrap();
                }
                for i in 0..size {
                    black_box(node.get(&format!("k{i}")).unwrap());
                }
            });
            let _ = std::fs::remove_file(&path);
        });
    }
}

fn bench_put_immediate(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_immediate");
    group.sample_size(20);
    for size in [10, 100] {
        group.bench_with_input(BenchmarkId::new("nodes", size), &size, |b, &size| {
            let path = bench_path("put_immediate", size);
            let _ = std::fs::remove_file(&path);
            let store = PrefStore::builder(&path)
                .policy(FlushPolicy::Manual)
                .build()
                .unwrap();
            populate(&store.root(), size);
            store.flush().unwrap();
            drop(store);

            let store = PrefStore::open(&path).unwrap();
            let window = store.root().child("window").unwrap();
            b.iter(|| window.put("width", "800").unwrap());
            let _ = std::fs::remove_file(&path);
        });
    }
}

fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(8));
    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("nodes", size), &size, |b, &size| {
            let path = bench_path("flush", size);
            let _ = std::fs::remove_file(&path);
            let store = PrefStore::builder(&path)
                .policy(FlushPolicy::Manual)
                .pretty(false)
                .build()
                .unwrap();
            populate(&store.root(), size);
            b.iter(|| store.flush().unwrap());
            let _ = std::fs::remove_file(&path);
        });
    }
}

fn bench_sync(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync");
    group.sample_size(50);
    for size in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("nodes", size), &size, |b, &size| {
            let path = bench_path("sync", size);
            let _ = std::fs::remove_file(&path);
            let store = PrefStore::builder(&path)
                .policy(FlushPolicy::Manual)
                .build()
                .unwrap();
            populate(&store.root(), size);
            store.flush().unwrap();
            b.iter(|| store.sync().unwrap());
            let _ = std::fs::remove_file(&path);
        });
    }
}

criterion_group!(
    benches,
    bench_put_get_manual,
    bench_put_immediate,
    bench_flush,
    bench_sync,
);
criterion_main!(benches);
