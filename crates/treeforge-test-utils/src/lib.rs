//! Testing utilities for the treeforge workspace
//!
//! Shared fixtures and an observer that records notifications.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc, clippy::must_use_candidate)]

use std::cell::RefCell;
use std::rc::Rc;
use treeforge_core::{
    AbsBehaviorTree, AbstractTreeNode, EditorConfig, EditorContext, Notification, Observer,
    TreeDescription, TreeSetDescription,
};
use treeforge_model::{NodeKind, NodeModel, PortModel};
use treeforge_scene::{NodeHandle, Point, SceneAdapter};

pub const MAIN: &str = "Main";
pub const DOOR: &str = "Door";

/// Handles of the nodes built by [`door_set`]
#[derive(Debug, Clone, Copy)]
pub struct DoorSet {
    pub main_root: NodeHandle,
    pub sequence: NodeHandle,
    pub reference: NodeHandle,
    pub check: NodeHandle,
    pub door_root: NodeHandle,
    pub inverter: NodeHandle,
    pub open: NodeHandle,
}

/// Observer that keeps every notification it sees
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    seen: Rc<RefCell<Vec<Notification>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain what was recorded so far
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.seen.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.seen.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.borrow().is_empty()
    }
}

impl Observer for Recorder {
    fn notify(&mut self, notification: &Notification) {
        self.seen.borrow_mut().push(notification.clone());
    }
}

pub fn open_door_model() -> NodeModel {
    NodeModel::new(NodeKind::Action, "OpenDoor").with_port("door_id", PortModel::input().with_default("front"))
}

/// Empty context whose main document is [`MAIN`]
pub fn editor() -> EditorContext {
    EditorContext::new(EditorConfig::default().with_default_tree_name(MAIN)).unwrap()
}

pub fn root_of<S: SceneAdapter>(ctx: &EditorContext<S>, document: &str) -> NodeHandle {
    let scene = ctx.document(document).unwrap().scene();
    scene
        .nodes()
        .into_iter()
        .find(|h| scene.node(*h).is_some_and(|n| n.kind() == NodeKind::Root))
        .unwrap()
}

/// Two documents
///
/// ```text
/// Main: Root -> Sequence -> [Door (collapsed), IsDoorOpen]
/// Door: Root -> Inverter -> OpenDoor
/// ```
pub fn door_set() -> (EditorContext, DoorSet) {
    let mut ctx = editor();
    ctx.register_model(open_door_model()).unwrap();
    ctx.register_model(NodeModel::new(NodeKind::Condition, "IsDoorOpen")).unwrap();
    ctx.create_document(DOOR).unwrap();

    let door_root = root_of(&ctx, DOOR);
    let inverter = ctx.add_node(DOOR, "Inverter", Point::default()).unwrap();
    let open = ctx.add_node(DOOR, "OpenDoor", Point::default()).unwrap();
    ctx.connect(DOOR, door_root, inverter).unwrap();
    ctx.connect(DOOR, inverter, open).unwrap();

    let main_root = root_of(&ctx, MAIN);
    let sequence = ctx.add_node(MAIN, "Sequence", Point::default()).unwrap();
    let reference = ctx.add_node(MAIN, DOOR, Point::default()).unwrap();
    let check = ctx.add_node(MAIN, "IsDoorOpen", Point::default()).unwrap();
    ctx.connect(MAIN, main_root, sequence).unwrap();
    ctx.connect(MAIN, sequence, reference).unwrap();
    ctx.connect(MAIN, sequence, check).unwrap();

    let handles = DoorSet {
        main_root,
        sequence,
        reference,
        check,
        door_root,
        inverter,
        open,
    };
    (ctx, handles)
}

pub fn node(id: &str, kind: NodeKind) -> AbstractTreeNode {
    AbstractTreeNode::new(NodeModel::new(kind, id), id)
}

pub fn tree(nodes: Vec<AbstractTreeNode>) -> AbsBehaviorTree {
    AbsBehaviorTree::from_nodes(nodes, 0).unwrap()
}

/// Saved form of [`door_set`], without the custom condition
pub fn door_description() -> TreeSetDescription {
    let mut sequence = node("Sequence", NodeKind::Control);
    sequence.children_index = vec![1, 2];
    let mut inverter = node("Inverter", NodeKind::Decorator);
    inverter.children_index = vec![1];
    let mut open = AbstractTreeNode::new(open_door_model(), "OpenDoor");
    open.ports_mapping.insert("door_id".into(), "back".into());

    TreeSetDescription {
        main_tree: Some(MAIN.into()),
        trees: vec![
            TreeDescription::new(
                MAIN,
                Some(tree(vec![
                    sequence,
                    node(DOOR, NodeKind::Subtree),
                    node("AlwaysSuccess", NodeKind::Action),
                ])),
            ),
            TreeDescription::new(DOOR, Some(tree(vec![inverter, open]))),
        ],
        models: vec![open_door_model()],
    }
}
