// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial index basics.
//!
//! Insert a few boxes, commit, move one, and run box and ray queries.
//!
//! Run:
//! - `cargo run -p brushwork_demos --example index_basics`

use brushwork_index::{Aabb3D, Index, Ray3D};

fn main() {
    let mut idx = Index::<f64, &str>::with_bvh();
    let floor = idx.insert(Aabb3D::new(-256.0, -256.0, -16.0, 256.0, 256.0, 0.0), "floor");
    let crate_a = idx.insert(Aabb3D::from_min_size([0.0, 0.0, 0.0], [32.0; 3]), "crate a");
    let _crate_b = idx.insert(Aabb3D::from_min_size([96.0, 0.0, 0.0], [32.0; 3]), "crate b");
    let damage = idx.commit();
    println!("added: {}", damage.added.len());

    // Stack crate a on top of crate b.
    idx.update(crate_a, Aabb3D::from_min_size([96.0, 0.0, 32.0], [32.0; 3]));
    let damage = idx.commit();
    println!("moved: {:?}", damage.moved);
    println!("dirty region: {:?}", damage.union());

    let mut on_floor: Vec<_> = idx
        .query_box(Aabb3D::new(-8.0, -8.0, -8.0, 8.0, 8.0, 8.0))
        .map(|(_, name)| name)
        .collect();
    on_floor.sort_unstable();
    println!("near origin: {on_floor:?}");

    // Straight down through the stack: both crates, then the floor.
    let mut hits = idx.query_ray(Ray3D::new([112.0, 16.0, 512.0], [0.0, 0.0, -1.0]));
    hits.sort_by(|a, b| a.2.total_cmp(&b.2));
    for (_, name, t) in &hits {
        println!("hit {name} at t = {t}");
    }
    assert_eq!(hits.len(), 3, "ray should pass through both crates and the floor");
    assert_eq!(hits[2].0, floor, "floor is hit last");
}
