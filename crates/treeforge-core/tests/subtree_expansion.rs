//! Subtree expansion, propagation, rename and delete across documents

use pretty_assertions::assert_eq;
use treeforge_core::{
    EditorError, InvariantViolation, Notification, SubtreeFault, ValidityError,
};
use treeforge_model::NodeKind;
use treeforge_scene::{ExpansionState, NodeHandle, Point, PortSide, SceneAdapter};
use treeforge_test_utils::{door_set, root_of, Recorder, DOOR, MAIN};

fn node_count(ctx: &treeforge_core::EditorContext, document: &str) -> usize {
    ctx.document(document).unwrap().scene().node_count()
}

fn children(ctx: &treeforge_core::EditorContext, document: &str, node: NodeHandle) -> Vec<NodeHandle> {
    ctx.document(document).unwrap().scene().children(node)
}

fn ids(ctx: &treeforge_core::EditorContext, document: &str, nodes: &[NodeHandle]) -> Vec<String> {
    let scene = ctx.document(document).unwrap().scene();
    nodes
        .iter()
        .map(|h| scene.node(*h).unwrap().registration_id().to_string())
        .collect()
}

#[test]
fn expand_then_collapse_restores_the_node_count() {
    let (mut ctx, set) = door_set();
    let before = node_count(&ctx, MAIN);

    assert_eq!(ctx.expand_subtree(MAIN, set.reference).unwrap(), 2);
    assert_eq!(node_count(&ctx, MAIN), before + 2);

    let body = children(&ctx, MAIN, set.reference);
    assert_eq!(ids(&ctx, MAIN, &body), vec!["Inverter"]);
    let scene = ctx.document(MAIN).unwrap().scene();
    assert!(scene.node(body[0]).unwrap().locked);
    assert_eq!(scene.node(set.reference).unwrap().port_count(PortSide::Out), 1);

    assert_eq!(ctx.collapse_subtree(MAIN, set.reference).unwrap(), 2);
    assert_eq!(node_count(&ctx, MAIN), before);
    let scene = ctx.document(MAIN).unwrap().scene();
    assert!(scene.connections(set.reference, PortSide::Out, 0).is_empty());
    assert_eq!(scene.node(set.reference).unwrap().port_count(PortSide::Out), 0);
    assert!(ctx.contains_valid_tree(MAIN).unwrap());
}

#[test]
fn expand_with_empty_target_leaves_the_reference_collapsed() {
    let (mut ctx, set) = door_set();
    ctx.remove_node(DOOR, set.inverter).unwrap();
    ctx.remove_node(DOOR, set.open).unwrap();

    let err = ctx.expand_subtree(MAIN, set.reference).unwrap_err();
    match err {
        EditorError::Validity {
            document,
            source: ValidityError::SubtreeInvalid { subtree, reason },
        } => {
            assert_eq!(document, MAIN);
            assert_eq!(subtree, DOOR);
            assert_eq!(reason, SubtreeFault::EmptyBody);
        }
        other => panic!("unexpected error: {other}"),
    }
    let node = ctx.document(MAIN).unwrap().scene().node(set.reference).unwrap().clone();
    assert_eq!(node.expansion(), Some(ExpansionState::Collapsed));
    assert_eq!(node.port_count(PortSide::Out), 0);
}

#[test]
fn state_machine_misuse_is_an_invariant_violation() {
    let (mut ctx, set) = door_set();
    let err = ctx.collapse_subtree(MAIN, set.reference).unwrap_err();
    assert!(matches!(err, EditorError::Invariant(InvariantViolation::NotExpanded(_))));
    assert!(!err.is_recoverable());

    ctx.expand_subtree(MAIN, set.reference).unwrap();
    assert!(matches!(
        ctx.expand_subtree(MAIN, set.reference),
        Err(EditorError::Invariant(InvariantViolation::AlreadyExpanded(_)))
    ));
    assert!(matches!(
        ctx.refresh_subtree(MAIN, set.sequence),
        Err(EditorError::Invariant(InvariantViolation::NotSubtree(_)))
    ));
}

#[test]
fn inlined_bodies_reject_edits() {
    let (mut ctx, set) = door_set();
    ctx.expand_subtree(MAIN, set.reference).unwrap();
    let inverter = children(&ctx, MAIN, set.reference)[0];

    assert!(matches!(
        ctx.set_instance_name(MAIN, inverter, "Not"),
        Err(EditorError::Locked { .. })
    ));
    assert!(matches!(
        ctx.remove_node(MAIN, inverter),
        Err(EditorError::Locked { .. })
    ));
}

#[test]
fn edits_propagate_to_expanded_copies() {
    let (mut ctx, set) = door_set();
    ctx.expand_subtree(MAIN, set.reference).unwrap();

    ctx.set_port_mapping(DOOR, set.open, "door_id", "back").unwrap();
    ctx.set_instance_name(DOOR, set.inverter, "Not").unwrap();

    let tree = ctx.tree(MAIN).unwrap();
    let open = tree
        .nodes()
        .iter()
        .find(|n| n.registration_id() == "OpenDoor")
        .unwrap();
    assert_eq!(open.ports_mapping["door_id"], "back");
    assert!(tree.nodes().iter().any(|n| n.instance_name == "Not"));
    assert_eq!(node_count(&ctx, MAIN), 4 + 2);
}

#[test]
fn invalid_targets_collapse_their_copies() {
    let (mut ctx, set) = door_set();
    ctx.expand_subtree(MAIN, set.reference).unwrap();
    let recorder = Recorder::new();
    ctx.subscribe(recorder.clone());

    // a second root makes Door invalid
    ctx.add_node(DOOR, "AlwaysFailure", Point::default()).unwrap();

    let node = ctx.document(MAIN).unwrap().scene().node(set.reference).unwrap().clone();
    assert_eq!(node.expansion(), Some(ExpansionState::Collapsed));
    assert!(recorder.take().contains(&Notification::SubtreeExpansionChanged {
        document: MAIN.into(),
        node: set.reference,
        state: ExpansionState::Collapsed,
    }));
}

#[test]
fn propagation_is_transitive() {
    let (mut ctx, set) = door_set();
    ctx.create_document("Hall").unwrap();
    let hall_root = root_of(&ctx, "Hall");
    let hall_door = ctx.add_node("Hall", DOOR, Point::default()).unwrap();
    ctx.connect("Hall", hall_root, hall_door).unwrap();
    ctx.expand_subtree("Hall", hall_door).unwrap();

    // Main references Hall, which inlines Door
    let hall_ref = ctx.add_node(MAIN, "Hall", Point::default()).unwrap();
    ctx.connect(MAIN, set.sequence, hall_ref).unwrap();
    ctx.expand_subtree(MAIN, hall_ref).unwrap();
    let before = node_count(&ctx, MAIN);

    ctx.set_instance_name(DOOR, set.open, "OpenFrontDoor").unwrap();

    assert_eq!(node_count(&ctx, MAIN), before);
    let scene = ctx.document(MAIN).unwrap().scene();
    let leaf_names: Vec<&str> = scene
        .nodes()
        .into_iter()
        .filter_map(|h| scene.node(h))
        .filter(|n| n.locked && n.kind() == NodeKind::Action)
        .map(|n| n.instance_name.as_str())
        .collect();
    assert_eq!(leaf_names, vec!["OpenFrontDoor"]);
}

#[test]
fn structural_edits_reach_copies_once_the_target_is_valid_again() {
    let (mut ctx, set) = door_set();
    ctx.expand_subtree(MAIN, set.reference).unwrap();

    // an unconnected node invalidates Door until it is wired in
    let extra = ctx.add_node(DOOR, "AlwaysSuccess", Point::default()).unwrap();
    assert!(!ctx.document(MAIN).unwrap().scene().node(set.reference).unwrap().is_expanded());
    ctx.remove_node(DOOR, set.open).unwrap();
    ctx.connect(DOOR, set.inverter, extra).unwrap();

    ctx.expand_subtree(MAIN, set.reference).unwrap();
    let body = children(&ctx, MAIN, set.reference);
    let leaf = children(&ctx, MAIN, body[0]);
    assert_eq!(ids(&ctx, MAIN, &leaf), vec!["AlwaysSuccess"]);
}

#[test]
fn rename_retargets_and_keeps_bodies() {
    let (mut ctx, set) = door_set();
    ctx.expand_subtree(MAIN, set.reference).unwrap();
    let body_before = ctx.tree(MAIN).unwrap();

    ctx.rename_document(DOOR, "Gate").unwrap();

    let node = ctx.document(MAIN).unwrap().scene().node(set.reference).unwrap().clone();
    assert_eq!(node.registration_id(), "Gate");
    assert!(node.is_expanded());
    let body_after = ctx.tree(MAIN).unwrap();
    assert_eq!(body_before.len(), body_after.len());
    assert_eq!(
        body_after.nodes().iter().filter(|n| n.registration_id() == DOOR).count(),
        0
    );
    assert!(ctx.models().get("Gate").unwrap().is_subtree());
    assert!(!ctx.models().contains(DOOR));
}

#[test]
fn rename_to_a_taken_name_keeps_the_old_one() {
    let (mut ctx, _) = door_set();
    assert!(matches!(
        ctx.rename_document(DOOR, MAIN),
        Err(EditorError::NameConflict(_))
    ));
    assert!(matches!(
        ctx.rename_document(DOOR, "Sequence"),
        Err(EditorError::NameConflict(_))
    ));
    assert!(ctx.registry().contains(DOOR));
    assert!(ctx.models().contains(DOOR));
}

#[test]
fn delete_dissolves_expanded_references() {
    let (mut ctx, set) = door_set();
    ctx.expand_subtree(MAIN, set.reference).unwrap();

    ctx.delete_document(DOOR).unwrap();

    let scene = ctx.document(MAIN).unwrap().scene();
    assert!(!scene.contains(set.reference));
    assert!(scene
        .nodes()
        .into_iter()
        .all(|h| scene.node(h).is_some_and(|n| !n.locked && !n.is_subtree())));
    let under_sequence = children(&ctx, MAIN, set.sequence);
    assert_eq!(ids(&ctx, MAIN, &under_sequence), vec!["Inverter", "IsDoorOpen"]);
    assert!(!ctx.models().contains(DOOR));
    assert!(!ctx.can_undo());
}

#[test]
fn delete_expands_collapsed_references_first() {
    let (mut ctx, set) = door_set();
    ctx.delete_document(DOOR).unwrap();

    let under_sequence = children(&ctx, MAIN, set.sequence);
    assert_eq!(ids(&ctx, MAIN, &under_sequence), vec!["Inverter", "IsDoorOpen"]);
    let tree = ctx.tree(MAIN).unwrap();
    assert_eq!(tree.len(), 5);
}

#[test]
fn self_references_cannot_expand() {
    let (mut ctx, _) = door_set();
    let door_root = root_of(&ctx, DOOR);
    let inner = ctx.add_node(DOOR, DOOR, Point::default()).unwrap();
    let fallback = ctx.add_node(DOOR, "Fallback", Point::default()).unwrap();
    let first = children(&ctx, DOOR, door_root)[0];
    let link = ctx
        .document(DOOR)
        .unwrap()
        .scene()
        .find_connection(door_root, first)
        .unwrap();
    ctx.disconnect(DOOR, link.id).unwrap();
    ctx.connect(DOOR, door_root, fallback).unwrap();
    ctx.connect(DOOR, fallback, first).unwrap();
    ctx.connect(DOOR, fallback, inner).unwrap();

    let err = ctx.expand_subtree(DOOR, inner).unwrap_err();
    assert!(matches!(
        err,
        EditorError::Validity {
            source: ValidityError::SubtreeInvalid {
                reason: SubtreeFault::Recursive,
                ..
            },
            ..
        }
    ));
    assert!(matches!(ctx.flatten(MAIN), Err(EditorError::Validity { .. })));
}

#[test]
fn flatten_inlines_collapsed_references() {
    let (ctx, _) = door_set();
    let flat = ctx.flatten(MAIN).unwrap();
    let order: Vec<&str> = flat
        .preorder()
        .map(|i| flat.nodes()[i].registration_id())
        .collect();
    assert_eq!(
        order,
        vec!["Root", "Sequence", DOOR, "Inverter", "OpenDoor", "IsDoorOpen"]
    );
    // the document itself is untouched
    assert_eq!(ctx.tree(MAIN).unwrap().len(), 4);
}

#[test]
fn expanded_references_take_no_user_children() {
    let (mut ctx, set) = door_set();
    ctx.expand_subtree(MAIN, set.reference).unwrap();
    let user = ctx.add_node(MAIN, "AlwaysSuccess", Point::default()).unwrap();

    let err = ctx.connect(MAIN, set.reference, user).unwrap_err();
    assert!(matches!(
        err,
        EditorError::Invariant(InvariantViolation::ReferenceOutput(node)) if node == set.reference
    ));
    assert_eq!(children(&ctx, MAIN, set.reference).len(), 1);

    ctx.connect(MAIN, set.sequence, user).unwrap();
    assert!(ctx.contains_valid_tree(MAIN).unwrap());
    ctx.collapse_subtree(MAIN, set.reference).unwrap();
    assert!(ctx.document(MAIN).unwrap().scene().contains(user));
    assert!(matches!(
        ctx.connect(MAIN, set.reference, user),
        Err(EditorError::Invariant(InvariantViolation::ReferenceOutput(_)))
    ));
}

#[test]
fn mutual_references_cannot_expand() {
    let (mut ctx, _) = door_set();
    ctx.create_document("A").unwrap();
    ctx.create_document("B").unwrap();

    let a_root = root_of(&ctx, "A");
    let a_seq = ctx.add_node("A", "Sequence", Point::default()).unwrap();
    let to_b = ctx.add_node("A", "B", Point::default()).unwrap();
    ctx.connect("A", a_root, a_seq).unwrap();
    ctx.connect("A", a_seq, to_b).unwrap();

    let b_root = root_of(&ctx, "B");
    let b_seq = ctx.add_node("B", "Sequence", Point::default()).unwrap();
    let leaf = ctx.add_node("B", "AlwaysSuccess", Point::default()).unwrap();
    ctx.connect("B", b_root, b_seq).unwrap();
    ctx.connect("B", b_seq, leaf).unwrap();
    ctx.expand_subtree("A", to_b).unwrap();

    // close the loop: B now refers back to A
    let to_a = ctx.add_node("B", "A", Point::default()).unwrap();
    ctx.connect("B", b_seq, to_a).unwrap();
    let a_node = ctx.document("A").unwrap().scene().node(to_b).unwrap().clone();
    assert_eq!(a_node.expansion(), Some(ExpansionState::Collapsed));

    for (document, reference) in [("A", to_b), ("B", to_a)] {
        let err = ctx.expand_subtree(document, reference).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Validity {
                source: ValidityError::SubtreeInvalid {
                    reason: SubtreeFault::Recursive,
                    ..
                },
                ..
            }
        ));
    }

    let (a_count, b_count) = (node_count(&ctx, "A"), node_count(&ctx, "B"));
    for name in ["First", "Second", "Third"] {
        ctx.set_instance_name("A", a_seq, name).unwrap();
        ctx.set_instance_name("B", b_seq, name).unwrap();
    }
    assert_eq!(node_count(&ctx, "A"), a_count);
    assert_eq!(node_count(&ctx, "B"), b_count);
}
