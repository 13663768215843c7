// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene tree basics.
//!
//! Build a layer with a group of brushes, read cached bounds, and pick with a ray.
//!
//! Run:
//! - `cargo run -p brushwork_demos --example scene_basics`

use brushwork_scene::{BBox3, Brush, Entity, Group, QueryFilter, Ray3, Tree};
use glam::DVec3;

fn main() {
    let mut tree = Tree::new();
    let layer = tree.default_layer();

    let room = tree.create(Group::new("room").into());
    for x in [0.0, 64.0, 128.0] {
        let pillar = Brush::cuboid(
            BBox3::new(DVec3::new(x, 0.0, 0.0), DVec3::new(x + 16.0, 16.0, 128.0)),
            "stone",
        );
        let id = tree.create(pillar.into());
        tree.add_child(room, id).unwrap();
    }
    tree.add_child(layer, room).unwrap();

    let mut light = Entity::with_classname("light");
    light.set_origin(DVec3::new(72.0, 8.0, 96.0));
    light.set_property("light", "300");
    let light = tree.create(light.into());
    tree.add_child(layer, light).unwrap();

    println!("room bounds: {:?}", tree.logical_bounds(room));
    println!("world bounds: {:?}", tree.logical_bounds(tree.world()));

    // Shoot along +x at pillar height; the nearest pillar comes first.
    let ray = Ray3::new(DVec3::new(-64.0, 8.0, 32.0), DVec3::X);
    let hits = tree.pick(ray, QueryFilter::default());
    for hit in &hits {
        println!("hit {:?} at {}", hit.node, hit.distance);
    }
    assert_eq!(hits.len(), 3, "the ray crosses all three pillars");
    assert_eq!(hits[0].node, tree.children(room)[0], "first pillar is nearest");

    for n in tree.take_notifications() {
        println!("{n:?}");
    }
}
