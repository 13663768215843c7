// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use brushwork_scene::{BBox3, Brush, Group, IndexBackend, QueryFilter, Ray3, Tree, TreeConfig};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use glam::DVec3;

/// Attach `rooms` groups of `per_room` brushes to the default layer.
fn populate(tree: &mut Tree, rooms: usize, per_room: usize) {
    let layer = tree.default_layer();
    for r in 0..rooms {
        let group = tree.create(Group::new("room").into());
        let origin = DVec3::new((r % 16) as f64 * 512.0, (r / 16) as f64 * 512.0, 0.0);
        for i in 0..per_room {
            let offset = DVec3::new((i % 8) as f64 * 48.0, (i / 8) as f64 * 48.0, 0.0);
            let brush = Brush::cuboid(BBox3::cube(16.0).translate(origin + offset), "wall");
            let id = tree.create(brush.into());
            let _ = tree.add_child(group, id);
        }
        let _ = tree.add_child(layer, group);
    }
}

fn tree(backend: IndexBackend) -> Tree {
    Tree::with_config(TreeConfig {
        index_backend: backend,
        ..TreeConfig::default()
    })
}

fn bench_bulk_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_bulk_load");
    let (rooms, per_room) = (64, 64);
    group.throughput(Throughput::Elements((rooms * per_room) as u64));
    group.bench_function("incremental_bvh", |b| {
        b.iter_batched(
            || tree(IndexBackend::Bvh),
            |mut t| {
                populate(&mut t, rooms, per_room);
                black_box(t.indexed_nodes().len());
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("suspended_then_rebuilt_bvh", |b| {
        b.iter_batched(
            || tree(IndexBackend::Bvh),
            |mut t| {
                t.suspend_index();
                populate(&mut t, rooms, per_room);
                t.resume_index();
                black_box(t.indexed_nodes().len());
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_pick(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_pick");
    for backend in [IndexBackend::Bvh, IndexBackend::FlatVec] {
        let mut t = tree(backend);
        t.suspend_index();
        populate(&mut t, 64, 64);
        t.resume_index();
        let ray = Ray3::new(DVec3::new(-64.0, 24.0, 0.0), DVec3::X);
        group.bench_function(format!("{backend:?}"), |b| {
            b.iter(|| black_box(t.pick(ray, QueryFilter::default()).len()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bulk_load, bench_pick);
criterion_main!(benches);
