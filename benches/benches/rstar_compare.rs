// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use brushwork_index::{Aabb3D, Index};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rstar::primitives::Rectangle;
use rstar::{AABB, RTree};

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

fn to_rstar_boxes(v: &[Aabb3D<f64>]) -> Vec<Rectangle<[f64; 3]>> {
    v.iter()
        .map(|r| {
            Rectangle::from_corners([r.min_x, r.min_y, r.min_z], [r.max_x, r.max_y, r.max_z])
        })
        .collect()
}

fn bench_rstar_compare_f64(c: &mut Criterion) {
    let mut group = c.benchmark_group("rstar_compare_f64");
    for &n in &[64usize, 128] {
        let boxes = gen_floor_boxes(n, 10.0);
        let query = Aabb3D::from_min_size([100.0, 100.0, -16.0], [400.0, 400.0, 64.0]);
        group.throughput(Throughput::Elements((n * n) as u64));

        group.bench_function(format!("brushwork_bvh_build_query_n{}", n), |b| {
            b.iter_batched(
                Index::<f64, u32>::with_bvh,
                |mut idx| {
                    for (i, r) in boxes.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    let _ = idx.commit();
                    let hits: usize = idx.query_box(query).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("brushwork_bvh_build_query_bulk_n{}", n), |b| {
            b.iter_batched(
                || {
                    let entries: Vec<_> = boxes
                        .iter()
                        .copied()
                        .enumerate()
                        .map(|(i, r)| (r, i as u32))
                        .collect();
                    entries
                },
                |entries| {
                    let idx = Index::<f64, u32>::with_bvh_bulk(&entries);
                    let hits: usize = idx.query_box(query).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("rstar_build_query_bulk_n{}", n), |b| {
            b.iter_batched(
                || to_rstar_boxes(&boxes),
                |rectangles| {
                    let tree = RTree::bulk_load(rectangles);
                    let aabb = AABB::from_corners(
                        [query.min_x, query.min_y, query.min_z],
                        [query.max_x, query.max_y, query.max_z],
                    );
                    let hits: usize = tree.locate_in_envelope_intersecting(&aabb).count();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_rstar_compare_f64);
criterion_main!(benches);
