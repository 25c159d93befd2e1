//! Benchmarks for acquisition latency on the file backend.

use std::cell::RefCell;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use tempfile::TempDir;

use crosslock::{FileBackend, LockName, Mutex};

fn file_mutex(dir: &TempDir, name: &str) -> Mutex {
    let backend = FileBackend::new(dir.path()).unwrap();
    Mutex::new(LockName::new(name).unwrap(), Box::new(backend))
}

fn bench_file_lock(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("file_lock");

    let cycle = RefCell::new(file_mutex(&temp_dir, "bench-cycle"));
    group.bench_function("acquire_release_cycle", |b| {
        b.to_async(&rt).iter(|| async {
            let mut mutex = cycle.borrow_mut();
            mutex.acquire(Duration::ZERO).await.unwrap();
            mutex.release().await.unwrap();
        });
    });

    // The miss path: a single attempt against a lock somebody else holds.
    let mut holder = file_mutex(&temp_dir, "bench-miss");
    rt.block_on(async {
        holder.acquire(Duration::ZERO).await.unwrap();
    });
    let contender = RefCell::new(file_mutex(&temp_dir, "bench-miss"));
    group.bench_function("acquire_miss", |b| {
        b.to_async(&rt).iter(|| async {
            contender.borrow_mut().acquire(Duration::ZERO).await.unwrap();
        });
    });
    rt.block_on(async {
        holder.release().await.unwrap();
    });

    group.finish();
}

criterion_group!(benches, bench_file_lock);
criterion_main!(benches);
