//! Tree builder
//!
//! Derives an [`AbsBehaviorTree`] from a document's graph. This is the single
//! source of truth for "is this document a valid tree": save, expand and
//! refresh are all gated on it.
//!
//! The walk is a depth-first traversal from the unique parentless node,
//! following output connections in authoring order, which is a control
//! node's child execution order.

use crate::error::{StructuralError, ValidityError};
use crate::tree::{AbsBehaviorTree, AbstractTreeNode};
use std::collections::{HashMap, HashSet};
use treeforge_scene::{NodeHandle, PortSide, SceneAdapter};

/// Build the logical tree of a scene
///
/// Pure: the scene is only read.
///
/// # Errors
/// Returns [`ValidityError::Structural`] when the graph has no root or more
/// than one, a cycle, a node with two parents, unreachable nodes, or a node
/// with more children than it admits
pub fn build_tree<S: SceneAdapter>(scene: &S) -> Result<AbsBehaviorTree, ValidityError> {
    build_structure(scene).map_err(ValidityError::Structural)
}

/// Check whether the scene holds a valid tree
#[must_use]
pub fn contains_valid_tree<S: SceneAdapter>(scene: &S) -> bool {
    build_structure(scene).is_ok()
}

pub(crate) fn build_structure<S: SceneAdapter>(
    scene: &S,
) -> Result<AbsBehaviorTree, StructuralError> {
    let handles = scene.nodes();
    let roots: Vec<NodeHandle> = handles
        .iter()
        .copied()
        .filter(|&h| scene.connections(h, PortSide::In, 0).is_empty())
        .collect();

    let root = match roots.as_slice() {
        [] => return Err(StructuralError::NoRoot),
        [root] => *root,
        many => {
            return Err(StructuralError::MultipleRoots(
                many.iter().map(|&h| instance_name(scene, h)).collect(),
            ))
        }
    };

    let mut walk = Walk {
        scene,
        index_of: HashMap::with_capacity(handles.len()),
        on_path: HashSet::new(),
        nodes: Vec::with_capacity(handles.len()),
    };
    walk.visit(root)?;

    let unreachable = handles.len() - walk.nodes.len();
    if unreachable > 0 {
        return Err(StructuralError::Unreachable { count: unreachable });
    }
    Ok(AbsBehaviorTree::from_validated(walk.nodes, 0))
}

fn instance_name<S: SceneAdapter>(scene: &S, handle: NodeHandle) -> String {
    scene
        .node(handle)
        .map_or_else(|| handle.to_string(), |n| n.instance_name.clone())
}

struct Walk<'a, S> {
    scene: &'a S,
    index_of: HashMap<NodeHandle, usize>,
    on_path: HashSet<NodeHandle>,
    nodes: Vec<AbstractTreeNode>,
}

/// A node whose children are being walked
struct Frame {
    handle: NodeHandle,
    index: usize,
    children: Vec<NodeHandle>,
    next: usize,
}

impl<S: SceneAdapter> Walk<'_, S> {
    /// Depth-first from `root` with an explicit stack, so depth is bounded by
    /// memory rather than the call stack
    fn visit(&mut self, root: NodeHandle) -> Result<(), StructuralError> {
        let mut stack = vec![self.enter(root)?];
        while let Some(frame) = stack.last_mut() {
            let Some(&child) = frame.children.get(frame.next) else {
                self.on_path.remove(&frame.handle);
                stack.pop();
                continue;
            };
            frame.next += 1;
            let parent = frame.index;

            if self.on_path.contains(&child) {
                return Err(StructuralError::Cycle {
                    node: instance_name(self.scene, child),
                });
            }
            if self.index_of.contains_key(&child) {
                return Err(StructuralError::SharedChild {
                    node: instance_name(self.scene, child),
                });
            }
            let entered = self.enter(child)?;
            self.nodes[parent].children_index.push(entered.index);
            stack.push(entered);
        }
        Ok(())
    }

    /// Index a node and check its child capacity
    fn enter(&mut self, handle: NodeHandle) -> Result<Frame, StructuralError> {
        let scene = self.scene;
        let Some(data) = scene.node(handle) else {
            return Err(StructuralError::NoRoot);
        };

        let children = scene.children(handle);
        let limit = if data.port_count(PortSide::Out) == 0 {
            Some(0)
        } else {
            data.kind().child_capacity().limit()
        };
        if let Some(limit) = limit {
            if children.len() > limit {
                return Err(StructuralError::TooManyChildren {
                    node: data.instance_name.clone(),
                    limit,
                    found: children.len(),
                });
            }
        }

        let index = self.nodes.len();
        self.index_of.insert(handle, index);
        self.on_path.insert(handle);
        self.nodes.push(AbstractTreeNode::from_scene(handle, data));
        Ok(Frame {
            handle,
            index,
            children,
            next: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeforge_model::{NodeKind, NodeModel};
    use treeforge_scene::{FlowScene, Point};

    fn add(scene: &mut FlowScene, kind: NodeKind, id: &str) -> NodeHandle {
        scene.create_node(NodeModel::new(kind, id), Point::default())
    }

    #[test]
    fn builds_in_authoring_order() {
        let mut scene = FlowScene::new();
        let root = add(&mut scene, NodeKind::Root, "Root");
        let seq = add(&mut scene, NodeKind::Control, "Sequence");
        let b = add(&mut scene, NodeKind::Action, "B");
        let a = add(&mut scene, NodeKind::Action, "A");
        scene.connect(root, seq).unwrap();
        scene.connect(seq, b).unwrap();
        scene.connect(seq, a).unwrap();

        let tree = build_tree(&scene).unwrap();
        let names: Vec<_> = tree.nodes().iter().map(|n| n.instance_name.as_str()).collect();
        assert_eq!(names, vec!["Root", "Sequence", "B", "A"]);
        assert_eq!(tree.nodes()[1].children_index, vec![2, 3]);
        assert_eq!(tree.nodes()[2].owning_graph_node, Some(b));
    }

    #[test]
    fn empty_scene_has_no_root() {
        assert_eq!(
            build_tree(&FlowScene::new()),
            Err(ValidityError::Structural(StructuralError::NoRoot))
        );
    }

    #[test]
    fn detects_multiple_roots_and_unreachable_cycles() {
        let mut scene = FlowScene::new();
        add(&mut scene, NodeKind::Root, "Root");
        let stray = add(&mut scene, NodeKind::Action, "Stray");
        assert!(matches!(
            build_structure(&scene),
            Err(StructuralError::MultipleRoots(names)) if names == ["Root", "Stray"]
        ));
        scene.delete_node(stray).unwrap();

        // a loop hanging off nothing has no parentless node of its own
        let x = add(&mut scene, NodeKind::Decorator, "X");
        let y = add(&mut scene, NodeKind::Decorator, "Y");
        scene.connect(x, y).unwrap();
        scene.connect(y, x).unwrap();
        assert_eq!(
            build_structure(&scene),
            Err(StructuralError::Unreachable { count: 2 })
        );
        assert!(!contains_valid_tree(&scene));
    }

    #[test]
    fn detects_shared_children() {
        let mut scene = FlowScene::new();
        let root = add(&mut scene, NodeKind::Root, "Root");
        let seq = add(&mut scene, NodeKind::Control, "Sequence");
        let inv = add(&mut scene, NodeKind::Decorator, "Inverter");
        let leaf = add(&mut scene, NodeKind::Action, "Leaf");
        scene.connect(root, seq).unwrap();
        scene.connect(seq, inv).unwrap();
        scene.connect(seq, leaf).unwrap();
        scene.connect(inv, leaf).unwrap();

        assert!(matches!(
            build_structure(&scene),
            Err(StructuralError::SharedChild { node }) if node == "Leaf"
        ));
    }

    #[test]
    fn detects_cycles_below_the_root() {
        let mut scene = FlowScene::new();
        let root = add(&mut scene, NodeKind::Root, "Root");
        let seq = add(&mut scene, NodeKind::Control, "Sequence");
        let inv = add(&mut scene, NodeKind::Decorator, "Inverter");
        scene.connect(root, seq).unwrap();
        scene.connect(seq, inv).unwrap();
        scene.connect(inv, seq).unwrap();

        // Sequence now has a parent twice over, but Root is still the only source
        assert!(matches!(
            build_structure(&scene),
            Err(StructuralError::Cycle { node }) if node == "Sequence"
        ));
    }

    #[test]
    fn enforces_child_capacity() {
        let mut scene = FlowScene::new();
        let root = add(&mut scene, NodeKind::Root, "Root");
        let inv = add(&mut scene, NodeKind::Decorator, "Inverter");
        let a = add(&mut scene, NodeKind::Action, "A");
        let b = add(&mut scene, NodeKind::Action, "B");
        scene.connect(root, inv).unwrap();
        scene.connect(inv, a).unwrap();
        scene.connect(inv, b).unwrap();

        assert_eq!(
            build_structure(&scene),
            Err(StructuralError::TooManyChildren {
                node: "Inverter".into(),
                limit: 1,
                found: 2,
            })
        );
    }

    #[test]
    fn deep_chains_do_not_exhaust_the_stack() {
        let mut scene = FlowScene::new();
        let mut parent = add(&mut scene, NodeKind::Root, "Root");
        for _ in 0..20_000 {
            let inv = add(&mut scene, NodeKind::Decorator, "Inverter");
            scene.connect(parent, inv).unwrap();
            parent = inv;
        }

        let tree = build_tree(&scene).unwrap();
        assert_eq!(tree.len(), 20_001);
        assert_eq!(tree.nodes()[19_999].children_index, vec![20_000]);
        assert_eq!(tree.depths()[20_000], 20_000);
    }
}
