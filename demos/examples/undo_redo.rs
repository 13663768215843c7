// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Commands, undo, redo and repeat.
//!
//! Add a brush, nudge it twice, repeat the nudge, and walk the history back.
//!
//! Run:
//! - `cargo run -p brushwork_demos --example undo_redo`

use brushwork_document::Document;
use brushwork_scene::{BBox3, Brush};
use glam::DVec3;

fn main() {
    let mut doc = Document::default();
    let layer = doc.tree().default_layer();

    let brush = doc
        .add_node(layer, Brush::cuboid(BBox3::cube(8.0), "crate").into())
        .unwrap();
    doc.select(&[brush]).unwrap();

    // Consecutive moves collate into one undo step.
    doc.translate_selection(DVec3::new(16.0, 0.0, 0.0)).unwrap();
    doc.translate_selection(DVec3::new(16.0, 0.0, 0.0)).unwrap();
    doc.repeat_commands().unwrap();
    let min_x = |doc: &Document| doc.tree().logical_bounds(brush).unwrap().min.x;
    println!("after moves: min.x = {}", min_x(&doc));
    println!("undo: {:?}", doc.processor().undo_command_name());

    doc.undo().unwrap();
    println!("after undo: min.x = {}", min_x(&doc));
    doc.redo().unwrap();
    println!("after redo: min.x = {}", min_x(&doc));

    while doc.can_undo() {
        println!("undoing {:?}", doc.processor().undo_command_name());
        doc.undo().unwrap();
    }
    assert!(!doc.tree().in_world(brush), "the brush addition was undone");

    for n in doc.take_command_notifications() {
        println!("{n:?}");
    }
}
