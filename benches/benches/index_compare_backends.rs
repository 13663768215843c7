// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use brushwork_index::{Aabb3D, Index, Ray3D};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

/// `n * n` unit-height cells on the floor plane, like a tiled level.
fn gen_floor_boxes(n: usize, cell: f64) -> Vec<Aabb3D<f64>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push(Aabb3D::from_min_size([x0, y0, 0.0], [cell, cell, 8.0]));
        }
    }
    out
}

fn gen_floor_boxes_f32(n: usize, cell: f32) -> Vec<Aabb3D<f32>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f32 * cell;
            let y0 = y as f32 * cell;
            out.push(Aabb3D::from_min_size([x0, y0, 0.0], [cell, cell, 8.0]));
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

/// Props scattered around a few rooms.
fn gen_clustered_boxes(n_clusters: usize, per_cluster: usize, spread: f64) -> Vec<Aabb3D<f64>> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut centers = Vec::with_capacity(n_clusters);
    for _ in 0..n_clusters {
        centers.push([
            rng.next_f64() * 4096.0,
            rng.next_f64() * 4096.0,
            rng.next_f64() * 512.0,
        ]);
    }
    for [cx, cy, cz] in centers {
        for _ in 0..per_cluster {
            let dx = (rng.next_f64() - 0.5) * spread;
            let dy = (rng.next_f64() - 0.5) * spread;
            let dz = (rng.next_f64() - 0.5) * spread;
            out.push(Aabb3D::from_min_size([cx + dx, cy + dy, cz + dz], [16.0; 3]));
        }
    }
    out
}

fn query_box() -> Aabb3D<f64> {
    Aabb3D::from_min_size([100.0, 100.0, -16.0], [400.0, 400.0, 64.0])
}

fn bench_flatvec(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatvec");
    for &n in &[32usize, 64, 128] {
        let boxes = gen_floor_boxes(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("insert_commit_box_n{}", n), |b| {
            b.iter_batched(
                Index::<f64, u32>::new,
                |mut idx| {
                    for (i, r) in boxes.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    let _ = idx.commit();
                    let hits: usize = idx.query_box(query_box()).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_bvh(c: &mut Criterion) {
    let mut group = c.benchmark_group("bvh_f64");
    for &n in &[32usize, 64, 128] {
        let boxes = gen_floor_boxes(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("insert_commit_box_n{}", n), |b| {
            b.iter_batched(
                Index::<f64, u32>::with_bvh,
                |mut idx| {
                    for (i, r) in boxes.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    let _ = idx.commit();
                    let hits: usize = idx.query_box(query_box()).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("bulk_rebuild_n{}", n), |b| {
            b.iter_batched(
                || {
                    boxes
                        .iter()
                        .copied()
                        .enumerate()
                        .map(|(i, r)| (r, i as u32))
                        .collect::<Vec<_>>()
                },
                |entries| {
                    let idx = Index::<f64, u32>::with_bvh_bulk(&entries);
                    black_box(idx.query_box(query_box()).count());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_bvh_f32(c: &mut Criterion) {
    let mut group = c.benchmark_group("bvh_f32");
    for &n in &[32usize, 64, 128] {
        let boxes = gen_floor_boxes_f32(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("insert_commit_box_n{}", n), |b| {
            b.iter_batched(
                Index::<f32, u32>::with_bvh,
                |mut idx| {
                    for (i, r) in boxes.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    let _ = idx.commit();
                    let hits: usize = idx
                        .query_box(Aabb3D::from_min_size(
                            [100.0, 100.0, -16.0],
                            [400.0, 400.0, 64.0],
                        ))
                        .count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_ray_picking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ray_picking");
    let boxes = gen_clustered_boxes(16, 256, 256.0);
    let entries: Vec<_> = boxes
        .iter()
        .copied()
        .enumerate()
        .map(|(i, r)| (r, i as u32))
        .collect();
    let bvh = Index::<f64, u32>::with_bvh_bulk(&entries);
    let mut flat = Index::<f64, u32>::new();
    for (r, i) in &entries {
        let _ = flat.insert(*r, *i);
    }
    let _ = flat.commit();

    let rays: Vec<Ray3D<f64>> = (0..256)
        .map(|q| {
            let t = q as f64 / 256.0;
            Ray3D::new([-64.0, t * 4096.0, 256.0], [1.0, 0.25 - t * 0.5, 0.0])
        })
        .collect();

    group.bench_function("bvh_f64", |b| {
        b.iter(|| {
            let total: usize = rays.iter().map(|r| bvh.query_ray(*r).len()).sum();
            black_box(total);
        })
    });
    group.bench_function("flatvec", |b| {
        b.iter(|| {
            let total: usize = rays.iter().map(|r| flat.query_ray(*r).len()).sum();
            black_box(total);
        })
    });
    group.finish();
}

fn bench_update_heavy_bvh(c: &mut Criterion) {
    let mut group = c.benchmark_group("bvh_f64_update_heavy");
    let boxes = gen_floor_boxes(64, 10.0);
    group.bench_function("update_move_then_commit", |b| {
        b.iter_batched(
            || {
                let mut idx = Index::<f64, u32>::with_bvh();
                let mut keys = Vec::new();
                for (i, r) in boxes.iter().copied().enumerate() {
                    keys.push(idx.insert(r, i as u32));
                }
                let _ = idx.commit();
                (idx, keys)
            },
            |(mut idx, keys)| {
                // A drag: every box nudged by a small delta.
                for (j, k) in keys.into_iter().enumerate() {
                    let dx = (j % 5) as f64 - 2.0;
                    let dz = ((j * 7) % 5) as f64 - 2.0;
                    let x0 = (j % 64) as f64 * 10.0 + dx;
                    let y0 = (j / 64) as f64 * 10.0;
                    idx.update(k, Aabb3D::from_min_size([x0, y0, dz], [10.0, 10.0, 8.0]));
                }
                let _ = idx.commit();
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_flatvec,
    bench_bvh,
    bench_bvh_f32,
    bench_ray_picking,
    bench_update_heavy_bvh,
);
criterion_main!(benches);
