//! Benchmarks for request coalescing and the per-frame tick.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use stowage::prelude::*;

fn cache_with_assets(count: usize) -> (ResourceCache, Vec<String>) {
    let mut manifest = Manifest::new();
    let mut reader = MemoryReader::new();
    let paths: Vec<String> = (0..count).map(|i| format!("data/{}.txt", i)).collect();
    for path in &paths {
        manifest.add_asset(path.as_str());
        reader.insert(path, "payload");
    }
    let cache = ResourceCache::new()
        .with_resolver(manifest)
        .with_reader(reader);
    (cache, paths)
}

fn bench_async_load_and_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_load_and_tick");

    for size in [10, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || cache_with_assets(size),
                |(mut cache, paths)| {
                    for path in &paths {
                        let _ = cache.load_asset_async::<String>(path, None);
                    }
                    cache.tick();
                    black_box(cache.len())
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_coalesced_requests(c: &mut Criterion) {
    let (mut cache, paths) = cache_with_assets(1);
    let path = &paths[0];
    let Ok(handle) = cache.load_asset::<String>(path) else {
        return;
    };

    c.bench_function("coalesced_request", |b| {
        b.iter(|| {
            let again = cache.load_asset_async::<String>(black_box(path), None);
            if let Ok(again) = again {
                cache.release(again);
            }
        });
    });

    cache.release(handle);
}

fn bench_release_and_reclaim(c: &mut Criterion) {
    let mut group = c.benchmark_group("release_and_reclaim");

    for size in [10, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let (mut cache, paths) = cache_with_assets(size);
                    let handles: Vec<_> = paths
                        .iter()
                        .filter_map(|path| cache.load_asset::<String>(path).ok())
                        .collect();
                    (cache, handles)
                },
                |(mut cache, handles)| {
                    for handle in handles {
                        cache.release(handle);
                    }
                    cache.tick();
                    black_box(cache.is_empty())
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_async_load_and_tick,
    bench_coalesced_requests,
    bench_release_and_reclaim
);
criterion_main!(benches);
