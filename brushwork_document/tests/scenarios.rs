// Copyright 2025 the Brushwork Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end editing scenarios and the document-wide invariants checked after them.

use std::collections::BTreeSet;

use brushwork_document::commands::TransformNodes;
use brushwork_document::{Document, DocumentError, TransactionScope};
use brushwork_scene::linked_groups::collect_link_set;
use brushwork_scene::{
    BBox3, Brush, Entity, Group, NodeContents, NodeId, NodeSnapshot, SceneError,
};
use glam::{DMat4, DVec3};

fn document() -> Document {
    let _ = env_logger::builder().is_test(true).try_init();
    Document::default()
}

fn brush_at(center: DVec3) -> NodeContents {
    Brush::cuboid(BBox3::cube(8.0).translate(center), "rock").into()
}

fn world(doc: &Document) -> NodeSnapshot {
    doc.tree()
        .snapshot(doc.tree().world())
        .expect("the world is always alive")
}

/// Index fidelity and bounds soundness.
fn check_invariants(doc: &Document) {
    let tree = doc.tree();
    let expected: BTreeSet<NodeId> = tree
        .descendants(tree.world())
        .into_iter()
        .filter(|n| tree.should_add_to_spatial_index(*n))
        .collect();
    let indexed: BTreeSet<NodeId> = tree.indexed_nodes().into_iter().collect();
    assert_eq!(indexed, expected, "spatial index diverged from the tree");

    for id in tree.descendants(tree.world()) {
        let (Some(cached), Some(fresh)) = (tree.bounds(id), tree.uncached_bounds(id)) else {
            panic!("attached node {id:?} has no bounds");
        };
        assert!(
            cached.logical.abs_diff_eq(&fresh.logical, 1e-9)
                && cached.physical.abs_diff_eq(&fresh.physical, 1e-9),
            "stale bounds on {id:?}"
        );
        assert!(
            cached.physical.contains(&cached.logical),
            "physical bounds of {id:?} must contain logical bounds"
        );
    }
}

/// A group holding a brush and a point entity, plus a linked copy moved by `offset`.
struct LinkedPair {
    a: NodeId,
    b: NodeId,
    brush: NodeId,
    entity: NodeId,
}

fn linked_pair(doc: &mut Document, offset: DVec3) -> LinkedPair {
    let layer = doc.tree().default_layer();
    let a = doc.add_node(layer, Group::new("crate").into()).expect("add");
    let brush = doc.add_node(a, brush_at(DVec3::ZERO)).expect("add");
    let mut light = Entity::with_classname("light");
    light.set_origin(DVec3::new(0.0, 0.0, 32.0));
    let entity = doc.add_node(a, light.into()).expect("add");
    let b = doc.create_linked_duplicate(a).expect("duplicate");
    doc.translate_selection(offset).expect("move the copy");
    LinkedPair {
        a,
        b,
        brush,
        entity,
    }
}

fn translated(snapshot: &NodeSnapshot, delta: DVec3) -> NodeSnapshot {
    let mut out = snapshot.clone();
    out.bounds.logical = out.bounds.logical.translate(delta);
    out.bounds.physical = out.bounds.physical.translate(delta);
    out.children = out.children.iter().map(|c| translated(c, delta)).collect();
    out
}

#[test]
fn add_brush_undo_redo() {
    let mut doc = document();
    let layer = doc.tree().default_layer();
    let before = world(&doc);

    let brush = doc.add_node(layer, brush_at(DVec3::ZERO)).expect("add");
    let after = world(&doc);
    check_invariants(&doc);

    doc.undo().expect("undo");
    assert_eq!(world(&doc), before, "undo restores the empty layer");
    assert!(doc.tree().indexed_nodes().is_empty());

    doc.redo().expect("redo");
    assert_eq!(world(&doc), after, "redo restores bounds and ids");
    assert!(doc.tree().spatial_index().contains(brush));
    check_invariants(&doc);
}

#[test]
fn linked_edit_reaches_every_member() {
    let mut doc = document();
    let pair = linked_pair(&mut doc, DVec3::X * 100.0);

    doc.replace_selection(&[pair.brush]).expect("select");
    doc.translate_selection(DVec3::Z * 16.0).expect("move");

    let tree = doc.tree();
    let counterpart = tree
        .children(pair.b)
        .iter()
        .copied()
        .find(|c| tree.link_id(*c) == tree.link_id(pair.brush))
        .expect("b holds the counterpart of the edited brush");
    let expected = BBox3::cube(8.0).translate(DVec3::new(100.0, 0.0, 16.0));
    assert!(
        tree.logical_bounds(counterpart)
            .is_some_and(|bb| bb.abs_diff_eq(&expected, 1e-9)),
        "edit replayed relative to b's placement"
    );

    let a = tree.snapshot(pair.a).expect("live");
    let b = tree.snapshot(pair.b).expect("live");
    assert!(
        translated(&a, DVec3::X * 100.0).matches_linked(&b, 1e-9),
        "members converge up to their placement"
    );
    check_invariants(&doc);

    // The replay is part of the same undo step.
    doc.undo().expect("undo");
    let tree = doc.tree();
    let restored = tree.children(pair.b)[0];
    assert!(
        tree.logical_bounds(restored)
            .is_some_and(|bb| bb.abs_diff_eq(&BBox3::cube(8.0).translate(DVec3::X * 100.0), 1e-9)),
        "undo swaps b's old children back"
    );
    check_invariants(&doc);
}

#[test]
fn reparent_into_own_descendant_is_rejected() {
    let mut doc = document();
    let layer = doc.tree().default_layer();
    let outer = doc.add_node(layer, Group::new("outer").into()).expect("add");
    let inner = doc.add_node(outer, Group::new("inner").into()).expect("add");
    doc.add_node(inner, brush_at(DVec3::ZERO)).expect("add");
    let before = world(&doc);
    let undo_len = doc.processor().undo_len();

    let err = doc
        .reparent_nodes(vec![(outer, inner)])
        .expect_err("cycle");
    assert_eq!(
        err.root_cause(),
        &DocumentError::Scene(SceneError::InvalidHierarchy {
            node: outer,
            parent: inner,
        })
    );
    assert_eq!(world(&doc), before, "tree unchanged");
    assert_eq!(doc.processor().undo_len(), undo_len, "nothing stored");
    check_invariants(&doc);
}

#[test]
fn removing_the_default_layer_is_rejected() {
    let mut doc = document();
    let layer = doc.tree().default_layer();
    doc.add_node(layer, brush_at(DVec3::ZERO)).expect("add");
    let before = world(&doc);

    let err = doc.remove_nodes(&[layer]).expect_err("protected");
    assert_eq!(
        err.root_cause(),
        &DocumentError::Scene(SceneError::ProtectedNode(layer))
    );
    assert_eq!(world(&doc), before, "tree unchanged");
    assert_eq!(doc.tree().children(doc.tree().world()), [layer]);
}

#[test]
fn entity_moved_out_of_linked_group_gets_a_fresh_link_id() {
    let mut doc = document();
    let pair = linked_pair(&mut doc, DVec3::X * 100.0);
    let layer = doc.tree().default_layer();
    let group_link = doc.tree().link_id(pair.a);
    let entity_link = doc.tree().link_id(pair.entity);
    let taken: BTreeSet<_> = doc
        .tree()
        .descendants(doc.tree().world())
        .into_iter()
        .filter_map(|n| doc.tree().link_id(n))
        .collect();

    doc.reparent_nodes(vec![(pair.entity, layer)]).expect("move");
    let tree = doc.tree();
    let fresh = tree.link_id(pair.entity);
    assert_ne!(fresh, entity_link);
    assert!(
        fresh.is_some_and(|l| !taken.contains(&l)),
        "the new link id was never used before"
    );
    assert_eq!(tree.link_id(pair.a), group_link, "group keeps its link id");
    assert_eq!(tree.children(pair.a), [pair.brush]);
    assert_eq!(
        tree.children(pair.b).len(),
        1,
        "the removal is replayed into the linked copy"
    );
    check_invariants(&doc);
}

#[test]
fn moves_between_members_of_one_link_set_are_rejected() {
    let mut doc = document();
    let pair = linked_pair(&mut doc, DVec3::X * 100.0);
    let link = doc.tree().link_id(pair.entity);
    let before = world(&doc);
    let undo_len = doc.processor().undo_len();

    // Both members change, so neither can be replayed into the other.
    let err = doc
        .reparent_nodes(vec![(pair.entity, pair.b)])
        .expect_err("two members of one link set changed");
    assert!(
        matches!(err.root_cause(), DocumentError::LinkPropagationFailed(_)),
        "unexpected error {err:?}"
    );
    assert_eq!(world(&doc), before, "tree unchanged");
    assert_eq!(doc.tree().link_id(pair.entity), link);
    assert_eq!(doc.tree().children(pair.a), [pair.brush, pair.entity]);
    assert_eq!(doc.processor().undo_len(), undo_len, "nothing stored");
    check_invariants(&doc);
}

#[test]
fn unrecorded_edits_are_not_replayed_by_later_transactions() {
    let mut doc = document();
    let pair = linked_pair(&mut doc, DVec3::X * 100.0);
    let layer = doc.tree().default_layer();
    let copy_before = doc.tree().snapshot(pair.b).expect("live");

    let lift = DMat4::from_translation(DVec3::Z * 16.0);
    let mut command = TransformNodes::new("Move Objects", doc.tree(), &[pair.brush], lift);
    doc.execute(&mut command).expect("move");
    let lifted = BBox3::cube(8.0).translate(DVec3::Z * 16.0);
    assert!(
        doc.tree()
            .logical_bounds(pair.brush)
            .is_some_and(|bb| bb.abs_diff_eq(&lifted, 1e-9))
    );

    doc.add_node(layer, brush_at(DVec3::X * -200.0)).expect("add");
    assert_eq!(
        doc.tree().snapshot(pair.b),
        Some(copy_before.clone()),
        "an unrelated edit leaves the linked copy alone"
    );

    doc.undo().expect("undo the addition");
    assert_eq!(doc.tree().snapshot(pair.b), Some(copy_before));
    assert!(
        doc.tree()
            .logical_bounds(pair.brush)
            .is_some_and(|bb| bb.abs_diff_eq(&lifted, 1e-9)),
        "the unrecorded edit is not part of any undo step"
    );
    check_invariants(&doc);
}

#[test]
fn undo_reverts_a_long_edit_sequence_exactly() {
    let mut doc = document();
    let layer = doc.tree().default_layer();
    let before = world(&doc);

    let a = doc.add_node(layer, brush_at(DVec3::ZERO)).expect("add");
    let g = doc.add_node(layer, Group::new("g").into()).expect("add");
    let mut light = Entity::with_classname("light");
    light.set_origin(DVec3::new(64.0, 0.0, 0.0));
    let e = doc.add_node(layer, light.into()).expect("add");
    check_invariants(&doc);

    doc.select(&[a]).expect("select");
    doc.translate_selection(DVec3::Y * 24.0).expect("move");
    doc.reparent_nodes(vec![(a, g)]).expect("reparent");
    doc.duplicate_selection().expect("duplicate");
    doc.set_entity_property(&[e], "light", "300").expect("property");
    doc.hide(&[g]).expect("hide");
    doc.lock(&[e]).expect("lock");
    let copy = doc.create_linked_duplicate(g).expect("linked duplicate");
    doc.separate_linked_groups(&[copy]).expect("separate");
    doc.remove_nodes(&[e]).expect("remove");
    check_invariants(&doc);
    let after = world(&doc);

    while doc.can_undo() {
        doc.undo().expect("undo");
        check_invariants(&doc);
    }
    assert_eq!(world(&doc), before, "structure, bounds and ids restored");

    while doc.can_redo() {
        doc.redo().expect("redo");
        check_invariants(&doc);
    }
    assert_eq!(world(&doc), after, "redo reaches the same state");
}

#[test]
fn failing_command_rolls_back_the_whole_transaction() {
    let mut doc = document();
    let layer = doc.tree().default_layer();
    let outer = doc.add_node(layer, Group::new("outer").into()).expect("add");
    let inner = doc.add_node(outer, Group::new("inner").into()).expect("add");
    doc.add_node(inner, brush_at(DVec3::ZERO)).expect("add");
    let before = world(&doc);
    let undo_len = doc.processor().undo_len();

    doc.start_transaction("Edit", TransactionScope::LinkedGroupAware);
    let added = doc.add_node(layer, brush_at(DVec3::X * 64.0)).expect("add");
    assert!(doc.tree().in_world(added));
    assert!(doc.reparent_nodes(vec![(outer, inner)]).is_err());

    assert!(!doc.processor().is_in_transaction());
    assert_eq!(world(&doc), before, "earlier commands were reverted");
    assert!(!doc.tree().is_alive(added), "nodes of discarded commands are destroyed");
    assert_eq!(doc.processor().undo_len(), undo_len);
    check_invariants(&doc);
}

#[test]
fn failed_link_propagation_rolls_back() {
    let mut doc = document();
    let pair = linked_pair(&mut doc, DVec3::X * 65500.0);
    let before = world(&doc);

    doc.replace_selection(&[pair.brush]).expect("select");
    let err = doc
        .translate_selection(DVec3::X * 40.0)
        .expect_err("the linked copy would leave the world");
    assert!(
        matches!(err, DocumentError::LinkPropagationFailed(_)),
        "unexpected error {err:?}"
    );
    assert_eq!(world(&doc), before, "the move was rolled back");
    check_invariants(&doc);
}

#[test]
fn persistent_ids_are_never_reused() {
    let mut doc = document();
    let layer = doc.tree().default_layer();
    let a = doc.add_node(layer, brush_at(DVec3::ZERO)).expect("add");
    let first = doc.tree().persistent_id(a).expect("assigned on attach");

    doc.remove_nodes(&[a]).expect("remove");
    doc.clear_history();
    assert!(!doc.tree().is_alive(a), "disposed with the history");

    let b = doc.add_node(layer, brush_at(DVec3::ZERO)).expect("add");
    let c = doc.add_node(layer, brush_at(DVec3::X * 32.0)).expect("add");
    let (pb, pc) = (
        doc.tree().persistent_id(b).expect("assigned"),
        doc.tree().persistent_id(c).expect("assigned"),
    );
    assert_ne!(a, b, "stale ids never alias new nodes");
    assert!(first < pb && pb < pc, "strictly increasing");
}

#[test]
fn duplicate_and_move_repeats_on_the_new_selection() {
    let mut doc = document();
    let layer = doc.tree().default_layer();
    let a = doc.add_node(layer, brush_at(DVec3::ZERO)).expect("add");
    doc.select(&[a]).expect("select");
    let first = doc.duplicate_selection().expect("duplicate");
    doc.translate_selection(DVec3::X * 32.0).expect("move");

    doc.repeat_commands().expect("repeat");
    let tree = doc.tree();
    assert_eq!(tree.children(layer).len(), 3);
    let second = tree.selection().nodes().to_vec();
    assert_ne!(second, first);
    assert!(
        tree.logical_bounds(second[0])
            .is_some_and(|bb| bb.abs_diff_eq(&BBox3::cube(8.0).translate(DVec3::X * 64.0), 1e-9)),
        "copy of the copy, moved again"
    );

    doc.undo().expect("undo the repeat as one step");
    assert_eq!(doc.tree().children(layer).len(), 2);
    assert_eq!(
        doc.repeat_commands(),
        Err(DocumentError::NothingToRepeat),
        "undo clears the repeat stack"
    );
}

#[test]
fn flat_index_backend_behaves_like_the_bvh() {
    use brushwork_document::DocumentOptions;
    use brushwork_scene::IndexBackend;

    let mut doc = Document::new(DocumentOptions {
        index_backend: IndexBackend::FlatVec,
        ..DocumentOptions::default()
    });
    let pair = linked_pair(&mut doc, DVec3::X * 100.0);
    doc.replace_selection(&[pair.brush]).expect("select");
    doc.translate_selection(DVec3::Z * 8.0).expect("move");
    check_invariants(&doc);
}
