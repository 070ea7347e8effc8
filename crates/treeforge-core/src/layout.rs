//! Tidy layered layout
//!
//! Leaves take consecutive slots in execution order and every parent is
//! centered over its first and last child. Depth picks the layer.

use crate::builder::build_structure;
use crate::config::{LayoutConfig, Orientation};
use treeforge_scene::{Point, SceneAdapter};

/// Position every node of a valid tree
///
/// Returns `false` and leaves positions alone when the scene is not a valid
/// tree.
pub fn arrange<S: SceneAdapter>(scene: &mut S, config: &LayoutConfig) -> bool {
    let Ok(tree) = build_structure(scene) else {
        return false;
    };

    let depths = tree.depths();
    let mut slots = vec![0.0_f64; tree.len()];
    let mut next_leaf = 0.0_f64;

    let order: Vec<usize> = tree.preorder().collect();
    for &index in &order {
        if tree.nodes()[index].children_index.is_empty() {
            slots[index] = next_leaf;
            next_leaf += 1.0;
        }
    }
    // reversed pre-order visits children before parents
    for &index in order.iter().rev() {
        let children = &tree.nodes()[index].children_index;
        if let (Some(&first), Some(&last)) = (children.first(), children.last()) {
            slots[index] = (slots[first] + slots[last]) / 2.0;
        }
    }

    for index in order {
        let Some(handle) = tree.nodes()[index].owning_graph_node else {
            continue;
        };
        #[allow(clippy::cast_precision_loss)]
        let level = depths[index] as f64 * config.level_spacing;
        let across = slots[index] * config.sibling_spacing;
        let position = match config.orientation {
            Orientation::Vertical => Point::new(across, level),
            Orientation::Horizontal => Point::new(level, across),
        };
        if let Some(node) = scene.node_mut(handle) {
            node.position = position;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeforge_model::{NodeKind, NodeModel};
    use treeforge_scene::{FlowScene, NodeHandle};

    fn add(scene: &mut FlowScene, kind: NodeKind, id: &str) -> NodeHandle {
        scene.create_node(NodeModel::new(kind, id), Point::default())
    }

    #[test]
    fn parents_center_over_children() {
        let mut scene = FlowScene::new();
        let root = add(&mut scene, NodeKind::Root, "Root");
        let seq = add(&mut scene, NodeKind::Control, "Sequence");
        let a = add(&mut scene, NodeKind::Action, "A");
        let b = add(&mut scene, NodeKind::Action, "B");
        let c = add(&mut scene, NodeKind::Action, "C");
        scene.connect(root, seq).unwrap();
        for leaf in [a, b, c] {
            scene.connect(seq, leaf).unwrap();
        }

        let config = LayoutConfig::default().with_spacing(10.0, 100.0);
        assert!(arrange(&mut scene, &config));

        let pos = |h| scene.node(h).unwrap().position;
        assert_eq!(pos(a), Point::new(0.0, 200.0));
        assert_eq!(pos(c), Point::new(20.0, 200.0));
        assert_eq!(pos(seq), Point::new(10.0, 100.0));
        assert_eq!(pos(root), Point::new(10.0, 0.0));
    }

    #[test]
    fn horizontal_swaps_axes() {
        let mut scene = FlowScene::new();
        let root = add(&mut scene, NodeKind::Root, "Root");
        let a = add(&mut scene, NodeKind::Action, "A");
        scene.connect(root, a).unwrap();

        let config = LayoutConfig::default()
            .with_orientation(Orientation::Horizontal)
            .with_spacing(10.0, 50.0);
        arrange(&mut scene, &config);
        assert_eq!(scene.node(a).unwrap().position, Point::new(50.0, 0.0));
    }

    #[test]
    fn invalid_trees_are_left_alone() {
        let mut scene = FlowScene::new();
        add(&mut scene, NodeKind::Root, "Root");
        let stray = scene.create_node(
            NodeModel::new(NodeKind::Action, "Stray"),
            Point::new(7.0, 7.0),
        );
        assert!(!arrange(&mut scene, &LayoutConfig::default()));
        assert_eq!(scene.node(stray).unwrap().position, Point::new(7.0, 7.0));
    }
}
