//! Copying trees into scenes and tearing them down again

use crate::tree::AbsBehaviorTree;
use treeforge_model::{NodeKind, NodeModel};
use treeforge_scene::{ExpansionState, NodeHandle, Point, PortSide, SceneAdapter, SceneError};

/// Insert a deep, independent copy of `tree` into `scene`
///
/// The copy's root is connected as the last child of `parent`, if given.
/// Every copied node gets `locked`; subtree references that carry children in
/// `tree` come out expanded, with their bodies locked regardless.
/// Returns the new handles in pre-order.
///
/// # Errors
/// Returns error if the scene rejects a connection
pub(crate) fn insert_tree<S: SceneAdapter>(
    scene: &mut S,
    tree: &AbsBehaviorTree,
    parent: Option<NodeHandle>,
    locked: bool,
) -> Result<Vec<NodeHandle>, SceneError> {
    let mut created = Vec::with_capacity(tree.len());
    let mut stack = vec![(tree.root_index(), parent, locked)];

    while let Some((index, parent, locked)) = stack.pop() {
        let source = &tree.nodes()[index];
        let handle = scene.create_node(source.model.clone(), Point::default());
        if let Some(node) = scene.node_mut(handle) {
            node.instance_name.clone_from(&source.instance_name);
            node.ports_mapping.clone_from(&source.ports_mapping);
            node.locked = locked;
        }

        let has_body = source.kind() == NodeKind::Subtree && !source.children_index.is_empty();
        if has_body {
            scene.set_port_count(handle, PortSide::Out, 1)?;
            if let Some(node) = scene.node_mut(handle) {
                node.set_expansion(ExpansionState::Expanded);
            }
        }
        if let Some(parent) = parent {
            scene.connect(parent, handle)?;
        }
        created.push(handle);

        for &child in source.children_index.iter().rev() {
            stack.push((child, Some(handle), locked || has_body));
        }
    }
    Ok(created)
}

/// Replace the whole scene with `tree`, under a fresh `Root` node when the
/// tree does not start with one
///
/// # Errors
/// Returns error if the scene rejects a connection
pub(crate) fn replace_with_tree<S: SceneAdapter>(
    scene: &mut S,
    tree: Option<&AbsBehaviorTree>,
    root_model: NodeModel,
) -> Result<(), SceneError> {
    scene.clear();
    match tree {
        Some(tree) if tree.root().kind() == NodeKind::Root => {
            insert_tree(scene, tree, None, false)?;
        }
        Some(tree) => {
            let root = scene.create_node(root_model, Point::default());
            insert_tree(scene, tree, Some(root), false)?;
        }
        None => {
            scene.create_node(root_model, Point::default());
        }
    }
    Ok(())
}

/// Every node reachable from `start` through output connections, `start`
/// excluded, in pre-order
pub(crate) fn descendants<S: SceneAdapter>(scene: &S, start: NodeHandle) -> Vec<NodeHandle> {
    let mut found = Vec::new();
    let mut stack: Vec<NodeHandle> = scene.children(start).into_iter().rev().collect();
    while let Some(handle) = stack.pop() {
        if handle == start || found.contains(&handle) {
            continue;
        }
        found.push(handle);
        stack.extend(scene.children(handle).into_iter().rev());
    }
    found
}

/// Delete every node reachable from `start`, keeping `start`
///
/// Returns the number of deleted nodes.
///
/// # Errors
/// Returns error if a node vanished mid-way
pub(crate) fn delete_descendants<S: SceneAdapter>(
    scene: &mut S,
    start: NodeHandle,
) -> Result<usize, SceneError> {
    let doomed = descendants(scene, start);
    for &handle in &doomed {
        scene.delete_node(handle)?;
    }
    Ok(doomed.len())
}

/// Lock every node reachable from `start`, `start` excluded
pub(crate) fn lock_body<S: SceneAdapter>(scene: &mut S, start: NodeHandle) {
    for handle in descendants(scene, start) {
        if let Some(node) = scene.node_mut(handle) {
            node.locked = true;
        }
    }
}

/// Unlock the body below `start`, leaving bodies of nested expanded
/// references locked
pub(crate) fn unlock_body<S: SceneAdapter>(scene: &mut S, start: NodeHandle) {
    let mut stack: Vec<NodeHandle> = scene.children(start);
    while let Some(handle) = stack.pop() {
        let nested = match scene.node_mut(handle) {
            Some(node) => {
                node.locked = false;
                node.is_expanded()
            }
            None => continue,
        };
        if !nested {
            stack.extend(scene.children(handle));
        }
    }
}
