// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Linked groups.
//!
//! Make a linked copy of a group, edit inside the original, and watch the copy follow.
//!
//! Run:
//! - `cargo run -p brushwork_demos --example linked_groups`

use brushwork_document::Document;
use brushwork_scene::{BBox3, Brush};
use glam::DVec3;

fn main() {
    let mut doc = Document::default();
    let layer = doc.tree().default_layer();

    let brush = doc
        .add_node(layer, Brush::cuboid(BBox3::cube(8.0), "metal").into())
        .unwrap();
    doc.select(&[brush]).unwrap();
    let original = doc.group_selected_nodes("vent").unwrap();

    let copy = doc.create_linked_duplicate(original).unwrap();
    doc.translate_selection(DVec3::new(256.0, 0.0, 0.0)).unwrap();
    println!(
        "link ids: {:?} {:?}",
        doc.tree().link_id(original),
        doc.tree().link_id(copy)
    );

    // Edit inside the original; the copy's brush follows, offset by the copy's transform.
    doc.open_group(original).unwrap();
    doc.select(&[brush]).unwrap();
    doc.translate_selection(DVec3::new(0.0, 0.0, 32.0)).unwrap();
    doc.close_group().unwrap();

    let copied_brush = doc.tree().children(copy)[0];
    let a = doc.tree().logical_bounds(brush).unwrap();
    let b = doc.tree().logical_bounds(copied_brush).unwrap();
    println!("original brush: {a:?}");
    println!("linked brush:   {b:?}");
    assert!(
        a.translate(DVec3::new(256.0, 0.0, 0.0)).abs_diff_eq(&b, 1e-9),
        "linked copy should mirror the edit"
    );

    doc.separate_linked_groups(&[copy]).unwrap();
    assert_ne!(doc.tree().link_id(original), doc.tree().link_id(copy));
}
