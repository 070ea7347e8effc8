//! Subtree expansion engine
//!
//! A subtree-reference node is either `Collapsed` (a single opaque node with
//! no output port) or `Expanded` (one output port leading to a locked, inlined
//! copy of the referenced document's tree).
//!
//! # Core Concepts
//!
//! - [`SubtreeRef`]: A node handle proven to be a subtree reference
//! - [`expand`] / [`collapse`] / [`refresh`]: The three transitions
//! - [`refresh_dependents`]: Keeps every inlined copy of an edited document
//!   current, collapsing copies whose document became invalid
//! - [`dissolve_references`] / [`retarget_references`]: Propagation of
//!   document deletion and renaming
//!
//! # Transitions
//!
//! ```text
//! Collapsed --expand--> Expanded --collapse--> Collapsed
//!                        |    ^
//!                        +----+ refresh
//! ```

use crate::builder::{build_structure, build_tree};
use crate::config::LayoutConfig;
use crate::error::{EditorError, InvariantViolation, Result, SubtreeFault, ValidityError};
use crate::layout::arrange;
use crate::materialize::{delete_descendants, insert_tree, unlock_body};
use crate::notify::Notification;
use crate::registry::{Document, DocumentRegistry};
use crate::tree::{AbsBehaviorTree, AbstractTreeNode};
use std::collections::{HashSet, VecDeque};
use treeforge_model::{NodeKind, NodeModel};
use treeforge_scene::{ExpansionState, NodeHandle, PortSide, SceneAdapter, SceneError};

/// Handle of a node known to be a subtree reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubtreeRef {
    node: NodeHandle,
}

impl SubtreeRef {
    /// Check that `node` is a subtree reference in `document`
    ///
    /// # Errors
    /// - [`EditorError::NodeNotFound`] if the handle is stale
    /// - [`InvariantViolation::NotSubtree`] for other kinds
    pub fn of<S: SceneAdapter>(document: &Document<S>, node: NodeHandle) -> Result<Self> {
        let data = document
            .scene()
            .node(node)
            .ok_or_else(|| EditorError::NodeNotFound {
                document: document.name().to_string(),
                node,
            })?;
        if !data.is_subtree() {
            return Err(InvariantViolation::NotSubtree(node).into());
        }
        Ok(Self { node })
    }

    /// Handle in the owning scene
    #[inline]
    #[must_use]
    pub fn node(self) -> NodeHandle {
        self.node
    }

    /// Name of the referenced document
    #[must_use]
    pub fn target<S: SceneAdapter>(self, document: &Document<S>) -> Option<&str> {
        document.scene().node(self.node).map(|n| n.registration_id())
    }

    /// Current state
    #[must_use]
    pub fn state<S: SceneAdapter>(self, document: &Document<S>) -> Option<ExpansionState> {
        document.scene().node(self.node).and_then(|n| n.expansion())
    }
}

/// The tree that gets inlined for a reference to `target`: the document's
/// tree without its `Root` node
///
/// # Errors
/// Returns the reason the document cannot be inlined
pub fn subtree_body<S: SceneAdapter>(
    registry: &DocumentRegistry<S>,
    target: &str,
) -> std::result::Result<AbsBehaviorTree, SubtreeFault> {
    let document = registry
        .get(target)
        .map_err(|_| SubtreeFault::MissingDocument)?;
    let tree = build_structure(document.scene()).map_err(SubtreeFault::Structural)?;
    tree.without_root().ok_or(SubtreeFault::EmptyBody)
}

fn invalid_subtree(document: &str, target: &str, reason: SubtreeFault) -> EditorError {
    EditorError::validity(
        document,
        ValidityError::SubtreeInvalid {
            subtree: target.to_string(),
            reason,
        },
    )
}

/// Target name and state of a reference, re-checked against the live scene
fn inspect<S: SceneAdapter>(
    registry: &DocumentRegistry<S>,
    document: &str,
    subtree: SubtreeRef,
) -> Result<(String, bool)> {
    let doc = registry.get(document)?;
    let reference = SubtreeRef::of(doc, subtree.node)?;
    let node = doc.scene().node(reference.node).ok_or(EditorError::NodeNotFound {
        document: document.to_string(),
        node: reference.node,
    })?;
    Ok((node.registration_id().to_string(), node.is_expanded()))
}

/// Whether inlining `target` into `document` would pull `document` back in,
/// directly or through the documents `target` refers to
fn references_back<S: SceneAdapter>(
    registry: &DocumentRegistry<S>,
    target: &str,
    document: &str,
) -> bool {
    let mut seen: HashSet<String> = HashSet::new();
    let mut pending = vec![target.to_string()];
    while let Some(name) = pending.pop() {
        if name == document {
            return true;
        }
        if !seen.insert(name.clone()) {
            continue;
        }
        let Ok(referenced) = registry.get(&name) else {
            continue;
        };
        let scene = referenced.scene();
        pending.extend(scene.nodes().into_iter().filter_map(|handle| {
            scene
                .node(handle)
                .filter(|node| node.is_subtree())
                .map(|node| node.registration_id().to_string())
        }));
    }
    false
}

fn set_state<S: SceneAdapter>(
    scene: &mut S,
    node: NodeHandle,
    state: ExpansionState,
) -> std::result::Result<(), SceneError> {
    let ports = usize::from(state == ExpansionState::Expanded);
    scene.set_port_count(node, PortSide::Out, ports)?;
    scene
        .node_mut(node)
        .ok_or(SceneError::NodeNotFound(node))?
        .set_expansion(state);
    Ok(())
}

/// Collapsed to Expanded
///
/// Inlines a locked copy of the referenced tree below the reference and
/// re-arranges the document when more than one node was inserted. Returns
/// the number of inserted nodes.
///
/// # Errors
/// - [`InvariantViolation::AlreadyExpanded`] when already expanded
/// - [`ValidityError::SubtreeInvalid`] when the target is missing, invalid,
///   empty or refers back to the owning document; the node is left untouched
pub fn expand<S: SceneAdapter>(
    registry: &mut DocumentRegistry<S>,
    document: &str,
    subtree: SubtreeRef,
    layout: &LayoutConfig,
) -> Result<usize> {
    let (target, expanded) = inspect(registry, document, subtree)?;
    if expanded {
        return Err(InvariantViolation::AlreadyExpanded(subtree.node).into());
    }
    if references_back(registry, &target, document) {
        return Err(invalid_subtree(document, &target, SubtreeFault::Recursive));
    }
    let body = subtree_body(registry, &target)
        .map_err(|reason| invalid_subtree(document, &target, reason))?;

    let scene = registry.get_mut(document)?.scene_mut();
    set_state(scene, subtree.node, ExpansionState::Expanded)?;
    let inserted = insert_tree(scene, &body, Some(subtree.node), true)?.len();
    if inserted > 1 {
        arrange(scene, layout);
    }

    tracing::debug!(document, subtree = %target, inserted, "expanded subtree");
    Ok(inserted)
}

/// Expanded to Collapsed
///
/// Deletes the inlined body and removes the output port. Returns the number
/// of deleted nodes.
///
/// # Errors
/// Returns [`InvariantViolation::NotExpanded`] when already collapsed
pub fn collapse<S: SceneAdapter>(
    registry: &mut DocumentRegistry<S>,
    document: &str,
    subtree: SubtreeRef,
    layout: &LayoutConfig,
) -> Result<usize> {
    let (target, expanded) = inspect(registry, document, subtree)?;
    if !expanded {
        return Err(InvariantViolation::NotExpanded(subtree.node).into());
    }

    let scene = registry.get_mut(document)?.scene_mut();
    let removed = delete_descendants(scene, subtree.node)?;
    set_state(scene, subtree.node, ExpansionState::Collapsed)?;
    if removed > 0 {
        arrange(scene, layout);
    }

    tracing::debug!(document, subtree = %target, removed, "collapsed subtree");
    Ok(removed)
}

/// Expanded to Expanded
///
/// Rebuilds the inlined body from the referenced document's current state.
/// Returns the number of inserted nodes.
///
/// # Errors
/// - [`InvariantViolation::NotExpanded`] when collapsed
/// - [`ValidityError::SubtreeInvalid`] when the target became invalid; the
///   node keeps its current body
pub fn refresh<S: SceneAdapter>(
    registry: &mut DocumentRegistry<S>,
    document: &str,
    subtree: SubtreeRef,
    layout: &LayoutConfig,
) -> Result<usize> {
    let (target, expanded) = inspect(registry, document, subtree)?;
    if !expanded {
        return Err(InvariantViolation::NotExpanded(subtree.node).into());
    }
    if references_back(registry, &target, document) {
        return Err(invalid_subtree(document, &target, SubtreeFault::Recursive));
    }
    let body = subtree_body(registry, &target)
        .map_err(|reason| invalid_subtree(document, &target, reason))?;

    let scene = registry.get_mut(document)?.scene_mut();
    delete_descendants(scene, subtree.node)?;
    let inserted = insert_tree(scene, &body, Some(subtree.node), true)?.len();
    arrange(scene, layout);

    tracing::trace!(document, subtree = %target, inserted, "refreshed subtree");
    Ok(inserted)
}

/// Unlocked references in a scene, optionally filtered by target and state
fn top_level_references<S: SceneAdapter>(
    scene: &S,
    target: Option<&str>,
    expanded_only: bool,
) -> Vec<SubtreeRef> {
    scene
        .nodes()
        .into_iter()
        .filter(|&handle| {
            scene.node(handle).is_some_and(|node| {
                node.is_subtree()
                    && !node.locked
                    && (!expanded_only || node.is_expanded())
                    && target.map_or(true, |t| node.registration_id() == t)
            })
        })
        .map(|node| SubtreeRef { node })
        .collect()
}

/// Refresh one reference, collapsing it instead when its target is no longer
/// a valid subtree
fn refresh_or_collapse<S: SceneAdapter>(
    registry: &mut DocumentRegistry<S>,
    document: &str,
    subtree: SubtreeRef,
    layout: &LayoutConfig,
    changes: &mut Vec<Notification>,
) -> Result<()> {
    match refresh(registry, document, subtree, layout) {
        Ok(_) => Ok(()),
        Err(err) if err.is_validity() => {
            tracing::warn!(document, node = %subtree.node, error = %err, "collapsing invalid subtree");
            collapse(registry, document, subtree, layout)?;
            changes.push(Notification::SubtreeExpansionChanged {
                document: document.to_string(),
                node: subtree.node,
                state: ExpansionState::Collapsed,
            });
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Bring every inlined copy of `origin` up to date
///
/// Walks the documents embedding `origin`, then the documents embedding
/// those, visiting each document at most once. Returns the expansion changes
/// made along the way (references collapsed because their target became
/// invalid).
///
/// # Errors
/// Returns error on scene failures
pub fn refresh_dependents<S: SceneAdapter>(
    registry: &mut DocumentRegistry<S>,
    origin: &str,
    layout: &LayoutConfig,
) -> Result<Vec<Notification>> {
    let mut visited: HashSet<String> = HashSet::from([origin.to_string()]);
    let mut queue: VecDeque<String> = VecDeque::from([origin.to_string()]);
    let mut changes = Vec::new();

    while let Some(edited) = queue.pop_front() {
        for name in registry.names() {
            if name == edited {
                continue;
            }
            let references = top_level_references(registry.get(&name)?.scene(), Some(&edited), true);
            if references.is_empty() {
                continue;
            }
            for reference in references {
                refresh_or_collapse(registry, &name, reference, layout, &mut changes)?;
            }
            if visited.insert(name.clone()) {
                queue.push_back(name);
            }
        }
    }
    Ok(changes)
}

/// Refresh every top-level expanded reference of one document
///
/// # Errors
/// Returns error if the document does not exist or on scene failures
pub fn refresh_document<S: SceneAdapter>(
    registry: &mut DocumentRegistry<S>,
    document: &str,
    layout: &LayoutConfig,
) -> Result<Vec<Notification>> {
    let mut changes = Vec::new();
    for reference in top_level_references(registry.get(document)?.scene(), None, true) {
        refresh_or_collapse(registry, document, reference, layout, &mut changes)?;
    }
    Ok(changes)
}

/// Remove `node`, putting its only child (if any) in its place under its parent
fn splice_out<S: SceneAdapter>(scene: &mut S, node: NodeHandle) -> Result<()> {
    let child = scene.children(node).first().copied();
    let Some(parent) = scene.parent(node) else {
        scene.delete_node(node)?;
        return Ok(());
    };

    let siblings = scene.connections(parent, PortSide::Out, 0);
    let position = siblings
        .iter()
        .position(|c| c.child == node)
        .unwrap_or(siblings.len());
    let trailing: Vec<NodeHandle> = siblings.iter().skip(position + 1).map(|c| c.child).collect();
    for connection in siblings.iter().skip(position + 1) {
        scene.disconnect(connection.id)?;
    }

    scene.delete_node(node)?;
    if let Some(child) = child {
        scene.connect(parent, child)?;
    }
    for sibling in trailing {
        scene.connect(parent, sibling)?;
    }
    Ok(())
}

/// Replace every reference to `target` outside `target` itself by the body
/// it stands for
///
/// Collapsed references are force-expanded first; the inlined body is
/// unlocked (nested bodies stay locked) and takes the reference's place under
/// its parent. A reference whose target cannot be expanded is dropped.
/// Returns the names of the documents that changed.
///
/// # Errors
/// Returns error on scene failures
pub fn dissolve_references<S: SceneAdapter>(
    registry: &mut DocumentRegistry<S>,
    target: &str,
    layout: &LayoutConfig,
) -> Result<Vec<String>> {
    let mut changed = Vec::new();
    for name in registry.names() {
        if name == target {
            continue;
        }
        let references = top_level_references(registry.get(&name)?.scene(), Some(target), false);
        if references.is_empty() {
            continue;
        }

        for reference in references {
            if reference.state(registry.get(&name)?) == Some(ExpansionState::Collapsed) {
                match expand(registry, &name, reference, layout) {
                    Ok(_) => {}
                    Err(err) if err.is_validity() => {
                        tracing::warn!(document = %name, subtree = target, error = %err, "dropping reference without a body");
                    }
                    Err(err) => return Err(err),
                }
            }
            let scene = registry.get_mut(&name)?.scene_mut();
            unlock_body(scene, reference.node);
            splice_out(scene, reference.node)?;
        }
        arrange(registry.get_mut(&name)?.scene_mut(), layout);
        tracing::debug!(document = %name, subtree = target, "dissolved subtree references");
        changed.push(name);
    }
    Ok(changed)
}

/// Point every reference to `previous` at `model` instead
///
/// Expanded references keep their bodies. Returns the names of the documents
/// that changed.
pub fn retarget_references<S: SceneAdapter>(
    registry: &mut DocumentRegistry<S>,
    previous: &str,
    model: &NodeModel,
) -> Vec<String> {
    let mut changed = Vec::new();
    for document in registry.iter_mut() {
        let scene = document.scene_mut();
        let mut touched = false;
        for handle in scene.nodes() {
            if let Some(node) = scene.node_mut(handle) {
                if node.is_subtree() && node.registration_id() == previous {
                    node.substitute_model(model.clone());
                    touched = true;
                }
            }
        }
        if touched {
            changed.push(document.name().to_string());
        }
    }
    changed
}

/// The tree of `document` with every subtree reference replaced by the full,
/// recursively inlined tree it refers to
///
/// # Errors
/// - [`ValidityError::Structural`] if `document` is invalid
/// - [`ValidityError::SubtreeInvalid`] for references that cannot be
///   inlined, including recursive ones
pub fn flatten<S: SceneAdapter>(
    registry: &DocumentRegistry<S>,
    document: &str,
) -> Result<AbsBehaviorTree> {
    let tree = build_tree(registry.get(document)?.scene())
        .map_err(|err| EditorError::validity(document, err))?;
    let mut flat = Flattener {
        registry,
        document,
        nodes: Vec::with_capacity(tree.len()),
        trees: vec![Inlined {
            tree,
            name: document.to_string(),
            parent: None,
        }],
    };
    flat.run()?;
    Ok(AbsBehaviorTree::from_validated(flat.nodes, 0))
}

/// A tree being copied into the flat result; `parent` is the tree holding
/// the reference it was inlined for
struct Inlined {
    tree: AbsBehaviorTree,
    name: String,
    parent: Option<usize>,
}

struct Flattener<'a, S> {
    registry: &'a DocumentRegistry<S>,
    document: &'a str,
    nodes: Vec<AbstractTreeNode>,
    trees: Vec<Inlined>,
}

impl<S: SceneAdapter> Flattener<'_, S> {
    /// Whether `name` is already being inlined on the way down to `tree`
    fn on_path(&self, tree: usize, name: &str) -> bool {
        let mut current = Some(tree);
        while let Some(id) = current {
            if self.trees[id].name == name {
                return true;
            }
            current = self.trees[id].parent;
        }
        false
    }

    /// Pre-order copy with an explicit stack of (tree, node, parent position)
    fn run(&mut self) -> Result<()> {
        let mut stack = vec![(0, self.trees[0].tree.root_index(), None::<usize>)];
        while let Some((tree, index, parent)) = stack.pop() {
            let source = &self.trees[tree].tree.nodes()[index];
            let is_reference = source.kind() == NodeKind::Subtree;
            let children = source.children_index.clone();
            let mut copy = source.clone();
            copy.children_index.clear();
            copy.owning_graph_node = None;

            let position = self.nodes.len();
            self.nodes.push(copy);
            if let Some(parent) = parent {
                self.nodes[parent].children_index.push(position);
            }

            if is_reference {
                let target = self.nodes[position].registration_id().to_string();
                if self.on_path(tree, &target) {
                    return Err(invalid_subtree(self.document, &target, SubtreeFault::Recursive));
                }
                let body = subtree_body(self.registry, &target)
                    .map_err(|reason| invalid_subtree(self.document, &target, reason))?;
                let root = body.root_index();
                self.trees.push(Inlined {
                    tree: body,
                    name: target,
                    parent: Some(tree),
                });
                stack.push((self.trees.len() - 1, root, Some(position)));
            } else {
                stack.extend(children.into_iter().rev().map(|child| (tree, child, Some(position))));
            }
        }
        Ok(())
    }
}
