//! Logical tree
//!
//! [`AbsBehaviorTree`] is the ordered, acyclic tree derived from a document's
//! graph. It is never edited in place: a structural change in the document
//! means building a new tree. Trees are also the value exchanged with the
//! serialization codec.
//!
//! # Invariants
//! - Exactly one node (the root) has no parent
//! - Every other index appears in exactly one parent's `children_index`
//! - Every node is reachable from the root, hence no cycles

use crate::error::StructuralError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use treeforge_model::{NodeKind, NodeModel};
use treeforge_scene::{NodeHandle, SceneNode};

/// One node of a logical tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractTreeNode {
    /// Model instantiated by this node
    pub model: NodeModel,
    /// Name shown for the node
    pub instance_name: String,
    /// Port name to value, for ports the model declares
    #[serde(default)]
    pub ports_mapping: IndexMap<String, String>,
    /// Children in execution order
    #[serde(default)]
    pub children_index: Vec<usize>,
    /// Scene node this entry was built from, if any
    #[serde(skip)]
    pub owning_graph_node: Option<NodeHandle>,
}

impl AbstractTreeNode {
    /// Leaf entry for `model`, with the model's initial mapping
    #[must_use]
    pub fn new(model: NodeModel, instance_name: impl Into<String>) -> Self {
        Self {
            ports_mapping: model.initial_mapping(),
            model,
            instance_name: instance_name.into(),
            children_index: Vec::new(),
            owning_graph_node: None,
        }
    }

    pub(crate) fn from_scene(handle: NodeHandle, node: &SceneNode) -> Self {
        Self {
            model: node.model.clone(),
            instance_name: node.instance_name.clone(),
            ports_mapping: node.ports_mapping.clone(),
            children_index: Vec::new(),
            owning_graph_node: Some(handle),
        }
    }

    /// Kind of the node's model
    #[inline]
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.model.kind
    }

    /// Registration id of the node's model
    #[inline]
    #[must_use]
    pub fn registration_id(&self) -> &str {
        &self.model.registration_id
    }

    /// Same model, name, mapping and child indices; scene handles are ignored
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.model == other.model
            && self.instance_name == other.instance_name
            && self.ports_mapping == other.ports_mapping
            && self.children_index == other.children_index
    }
}

/// Ordered, acyclic tree of [`AbstractTreeNode`]s
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TreeRecord")]
pub struct AbsBehaviorTree {
    nodes: Vec<AbstractTreeNode>,
    root_index: usize,
}

#[derive(Deserialize)]
struct TreeRecord {
    nodes: Vec<AbstractTreeNode>,
    root_index: usize,
}

impl TryFrom<TreeRecord> for AbsBehaviorTree {
    type Error = StructuralError;

    fn try_from(record: TreeRecord) -> Result<Self, Self::Error> {
        Self::from_nodes(record.nodes, record.root_index)
    }
}

impl AbsBehaviorTree {
    /// Validate and wrap a node list
    ///
    /// # Errors
    /// Returns the first structural violation found
    pub fn from_nodes(
        nodes: Vec<AbstractTreeNode>,
        root_index: usize,
    ) -> Result<Self, StructuralError> {
        if root_index >= nodes.len() {
            return Err(StructuralError::NoRoot);
        }

        let mut parent_of: Vec<Option<usize>> = vec![None; nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            if let Some(limit) = node.kind().child_capacity().limit() {
                if node.children_index.len() > limit {
                    return Err(StructuralError::TooManyChildren {
                        node: node.instance_name.clone(),
                        limit,
                        found: node.children_index.len(),
                    });
                }
            }
            for &child in &node.children_index {
                let slot = parent_of
                    .get_mut(child)
                    .ok_or(StructuralError::DanglingIndex { index: child })?;
                if child == root_index || child == index {
                    return Err(StructuralError::Cycle {
                        node: nodes[child].instance_name.clone(),
                    });
                }
                if slot.replace(index).is_some() {
                    return Err(StructuralError::SharedChild {
                        node: nodes[child].instance_name.clone(),
                    });
                }
            }
        }

        let parentless: Vec<String> = parent_of
            .iter()
            .enumerate()
            .filter(|(index, parent)| parent.is_none() && *index != root_index)
            .map(|(index, _)| nodes[index].instance_name.clone())
            .collect();
        if !parentless.is_empty() {
            let mut names = vec![nodes[root_index].instance_name.clone()];
            names.extend(parentless);
            return Err(StructuralError::MultipleRoots(names));
        }

        let tree = Self { nodes, root_index };
        let reached = tree.preorder().count();
        if reached != tree.nodes.len() {
            return Err(StructuralError::Unreachable {
                count: tree.nodes.len() - reached,
            });
        }
        Ok(tree)
    }

    /// Wrap nodes the builder already validated
    pub(crate) fn from_validated(nodes: Vec<AbstractTreeNode>, root_index: usize) -> Self {
        Self { nodes, root_index }
    }

    /// All nodes, indexed by `children_index` entries
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &[AbstractTreeNode] {
        &self.nodes
    }

    /// Index of the root node
    #[inline]
    #[must_use]
    pub fn root_index(&self) -> usize {
        self.root_index
    }

    /// The root node
    #[inline]
    #[must_use]
    pub fn root(&self) -> &AbstractTreeNode {
        &self.nodes[self.root_index]
    }

    /// Node at `index`
    #[inline]
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&AbstractTreeNode> {
        self.nodes.get(index)
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of `index` in execution order
    pub fn children(&self, index: usize) -> impl Iterator<Item = &AbstractTreeNode> + '_ {
        self.nodes
            .get(index)
            .map(|n| n.children_index.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&child| &self.nodes[child])
    }

    /// Indices in depth-first pre-order, starting at the root
    pub fn preorder(&self) -> impl Iterator<Item = usize> + '_ {
        self.preorder_from(self.root_index)
    }

    /// Indices of the subtree at `start` in depth-first pre-order
    pub fn preorder_from(&self, start: usize) -> impl Iterator<Item = usize> + '_ {
        let mut stack = if start < self.nodes.len() { vec![start] } else { Vec::new() };
        let mut seen = vec![false; self.nodes.len()];
        std::iter::from_fn(move || {
            let index = stack.pop()?;
            seen[index] = true;
            stack.extend(
                self.nodes[index]
                    .children_index
                    .iter()
                    .rev()
                    .copied()
                    .filter(|&c| c < seen.len() && !seen[c]),
            );
            Some(index)
        })
    }

    /// Depth of every node, indexed like [`Self::nodes`]
    #[must_use]
    pub fn depths(&self) -> Vec<usize> {
        let mut depths = vec![0; self.nodes.len()];
        for index in self.preorder() {
            for &child in &self.nodes[index].children_index {
                depths[child] = depths[index] + 1;
            }
        }
        depths
    }

    /// Copy of the subtree rooted at `index`, re-indexed in pre-order
    #[must_use]
    pub fn subtree_at(&self, index: usize) -> Option<Self> {
        self.rebuild(index, |_| false)
    }

    /// The tree without a leading `Root` node
    ///
    /// Returns `None` for a `Root` without children, and the tree itself
    /// when the root is not a `Root`.
    #[must_use]
    pub fn without_root(&self) -> Option<Self> {
        if self.root().kind() != NodeKind::Root {
            return Some(self.clone());
        }
        let child = *self.root().children_index.first()?;
        self.subtree_at(child)
    }

    /// Copy in which subtree references have no children
    #[must_use]
    pub fn without_subtree_bodies(&self) -> Self {
        self.rebuild(self.root_index, |node| node.kind() == NodeKind::Subtree)
            .unwrap_or_else(|| self.clone())
    }

    /// Same shape, kinds, names and mappings; scene handles are ignored
    #[must_use]
    pub fn same_structure(&self, other: &Self) -> bool {
        let ours: Vec<usize> = self.preorder().collect();
        let theirs: Vec<usize> = other.preorder().collect();
        ours.len() == theirs.len()
            && ours.iter().zip(&theirs).all(|(&a, &b)| {
                let (a, b) = (&self.nodes[a], &other.nodes[b]);
                a.model == b.model
                    && a.instance_name == b.instance_name
                    && a.ports_mapping == b.ports_mapping
                    && a.children_index.len() == b.children_index.len()
            })
    }

    /// Re-index the subtree at `start` in pre-order, dropping the children of
    /// nodes for which `prune` holds
    fn rebuild(&self, start: usize, prune: impl Fn(&AbstractTreeNode) -> bool) -> Option<Self> {
        if start >= self.nodes.len() {
            return None;
        }
        let mut nodes: Vec<AbstractTreeNode> = Vec::new();
        let mut stack = vec![(start, None::<usize>)];

        while let Some((index, parent)) = stack.pop() {
            let original = &self.nodes[index];
            let position = nodes.len();
            let mut copy = original.clone();
            copy.children_index.clear();
            nodes.push(copy);
            if let Some(parent) = parent {
                nodes[parent].children_index.push(position);
            }
            if !prune(original) {
                for &child in original.children_index.iter().rev() {
                    stack.push((child, Some(position)));
                }
            }
        }
        Some(Self::from_validated(nodes, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: NodeKind, name: &str, children: &[usize]) -> AbstractTreeNode {
        let mut node = AbstractTreeNode::new(NodeModel::new(kind, name), name);
        node.children_index = children.to_vec();
        node
    }

    fn sample() -> AbsBehaviorTree {
        AbsBehaviorTree::from_nodes(
            vec![
                node(NodeKind::Root, "Root", &[1]),
                node(NodeKind::Control, "Sequence", &[2, 3]),
                node(NodeKind::Action, "Open", &[]),
                node(NodeKind::Subtree, "Door", &[4]),
                node(NodeKind::Action, "Push", &[]),
            ],
            0,
        )
        .unwrap()
    }

    #[test]
    fn preorder_follows_child_order() {
        let tree = sample();
        assert_eq!(tree.preorder().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert_eq!(tree.depths(), vec![0, 1, 2, 2, 3]);
    }

    #[test]
    fn without_root_reindexes() {
        let body = sample().without_root().unwrap();
        assert_eq!(body.root().instance_name, "Sequence");
        assert_eq!(body.len(), 4);
        assert_eq!(body.root().children_index, vec![1, 2]);
    }

    #[test]
    fn empty_root_has_no_body() {
        let tree = AbsBehaviorTree::from_nodes(vec![node(NodeKind::Root, "Root", &[])], 0).unwrap();
        assert!(tree.without_root().is_none());
    }

    #[test]
    fn subtree_bodies_are_pruned() {
        let pruned = sample().without_subtree_bodies();
        assert_eq!(pruned.len(), 4);
        assert!(pruned.nodes().iter().all(|n| n.instance_name != "Push"));
    }

    #[test]
    fn rejects_malformed_node_lists() {
        let shared = vec![
            node(NodeKind::Control, "A", &[1, 2]),
            node(NodeKind::Control, "B", &[2]),
            node(NodeKind::Action, "C", &[]),
        ];
        assert!(matches!(
            AbsBehaviorTree::from_nodes(shared, 0),
            Err(StructuralError::SharedChild { .. })
        ));

        let orphan = vec![node(NodeKind::Control, "A", &[]), node(NodeKind::Action, "B", &[])];
        assert!(matches!(
            AbsBehaviorTree::from_nodes(orphan, 0),
            Err(StructuralError::MultipleRoots(_))
        ));

        let loop_ = vec![
            node(NodeKind::Control, "A", &[]),
            node(NodeKind::Decorator, "B", &[2]),
            node(NodeKind::Decorator, "C", &[1]),
        ];
        assert!(matches!(
            AbsBehaviorTree::from_nodes(loop_, 0),
            Err(StructuralError::Unreachable { count: 2 })
        ));

        let overfull = vec![
            node(NodeKind::Decorator, "A", &[1, 2]),
            node(NodeKind::Action, "B", &[]),
            node(NodeKind::Action, "C", &[]),
        ];
        assert!(matches!(
            AbsBehaviorTree::from_nodes(overfull, 0),
            Err(StructuralError::TooManyChildren { limit: 1, found: 2, .. })
        ));

        assert!(matches!(
            AbsBehaviorTree::from_nodes(vec![node(NodeKind::Control, "A", &[7])], 0),
            Err(StructuralError::DanglingIndex { index: 7 })
        ));
    }

    #[test]
    fn deserialization_validates() {
        let json = serde_json::to_string(&sample()).unwrap();
        let back: AbsBehaviorTree = serde_json::from_str(&json).unwrap();
        assert!(back.same_structure(&sample()));

        let bad = r#"{"nodes":[],"root_index":0}"#;
        assert!(serde_json::from_str::<AbsBehaviorTree>(bad).is_err());
    }
}
