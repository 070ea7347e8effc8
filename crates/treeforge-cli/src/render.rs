//! Plain-text tree dumps

use std::fmt::Write;
use treeforge_core::AbsBehaviorTree;

/// One line per node, two spaces of indentation per level
///
/// ```text
///   Sequence [Control]
///     Door [SubTree]
///     Open (OpenDoor) [Action] door_id=front
/// ```
pub(crate) fn indented(tree: &AbsBehaviorTree) -> String {
    let depths = tree.depths();
    let mut out = String::new();
    for index in tree.preorder() {
        let node = &tree.nodes()[index];
        let indent = "  ".repeat(depths[index] + 1);
        let _ = write!(out, "{indent}{}", node.instance_name);
        if node.instance_name != node.registration_id() {
            let _ = write!(out, " ({})", node.registration_id());
        }
        let _ = write!(out, " [{}]", node.kind());
        for (port, value) in &node.ports_mapping {
            let _ = write!(out, " {port}={value}");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeforge_core::AbstractTreeNode;
    use treeforge_model::{NodeKind, NodeModel, PortModel};

    #[test]
    fn nests_and_annotates() {
        let mut seq = AbstractTreeNode::new(NodeModel::new(NodeKind::Control, "Sequence"), "Sequence");
        seq.children_index = vec![1];
        let open = AbstractTreeNode::new(
            NodeModel::new(NodeKind::Action, "OpenDoor")
                .with_port("door_id", PortModel::input().with_default("front")),
            "Open",
        );
        let tree = AbsBehaviorTree::from_nodes(vec![seq, open], 0).unwrap();

        assert_eq!(
            indented(&tree),
            "  Sequence [Control]\n    Open (OpenDoor) [Action] door_id=front\n"
        );
    }
}
