use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use radiomesh::prelude::*;

fn population(count: u32) -> Snapshot {
    let template = NodeTemplate { range: 500.0, ..NodeTemplate::default() };
    NodeStateStore::populate(count, &template, 10_000.0, Some(42)).snapshot()
}

fn discovery(c: &mut Criterion) {
    let discovery = NeighborDiscovery::default();
    let mut group = c.benchmark_group("discovery");
    group.sample_size(20);

    for count in [250u32, 1_000, 4_000] {
        let snapshot = population(count);

        group.bench_with_input(BenchmarkId::new("kdtree", count), &snapshot, |b, snap| {
            b.iter(|| {
                let index = NeighborDiscovery::build_index(snap);
                black_box(discovery.discover(snap, &index))
            })
        });

        // Quadratic; skip the largest population.
        if count <= 1_000 {
            group.bench_with_input(BenchmarkId::new("scan", count), &snapshot, |b, snap| {
                b.iter(|| black_box(discovery.scan_all_pairs(snap)))
            });
        }
    }

    group.finish();
}

fn index_build(c: &mut Criterion) {
    let snapshot = population(4_000);
    c.bench_function("kdtree_build_4000", |b| {
        b.iter(|| black_box(NeighborDiscovery::build_index(&snapshot)))
    });
}

criterion_group!(benches, discovery, index_build);
criterion_main!(benches);
