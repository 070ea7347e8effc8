//! User edit operations
//!
//! Every edit checks the mode and the node locks, runs in a mutation scope,
//! refreshes the inlined copies of the edited document elsewhere and pushes
//! an undo snapshot.

use crate::builder::{build_tree, contains_valid_tree};
use crate::context::EditorContext;
use crate::error::{EditorError, InvariantViolation, Result};
use crate::layout::arrange;
use crate::notify::Notification;
use crate::subtree::{self, refresh_document, SubtreeRef};
use crate::tree::AbsBehaviorTree;
use treeforge_scene::{
    ConnectionHandle, ExpansionState, NodeHandle, Point, SceneAdapter, SceneNode,
};

impl<S: SceneAdapter> EditorContext<S> {
    /// Node data, for an edit
    fn editable_node(&self, document: &str, node: NodeHandle) -> Result<&SceneNode> {
        let data = self
            .registry
            .get(document)?
            .scene()
            .node(node)
            .ok_or_else(|| EditorError::NodeNotFound {
                document: document.to_string(),
                node,
            })?;
        if data.locked {
            return Err(EditorError::Locked {
                document: document.to_string(),
                node,
            });
        }
        Ok(data)
    }

    /// Instantiate a registered model
    ///
    /// # Errors
    /// Returns error for unknown documents or models, or outside editor mode
    pub fn add_node(&mut self, document: &str, model_id: &str, position: Point) -> Result<NodeHandle> {
        self.ensure_editable()?;
        self.transaction(|ctx| {
            let model = ctx
                .models
                .get(model_id)
                .cloned()
                .ok_or_else(|| EditorError::UnknownModel(model_id.to_string()))?;
            let handle = ctx
                .registry
                .get_mut(document)?
                .scene_mut()
                .create_node(model, position);
            ctx.commit_edit(document)?;
            Ok(handle)
        })
    }

    /// Delete a node; an expanded subtree reference takes its body with it
    ///
    /// # Errors
    /// Returns error for locked or unknown nodes, or outside editor mode
    pub fn remove_node(&mut self, document: &str, node: NodeHandle) -> Result<()> {
        self.ensure_editable()?;
        let expanded = self.editable_node(document, node)?.is_expanded();
        self.transaction(|ctx| {
            let scene = ctx.registry.get_mut(document)?.scene_mut();
            if expanded {
                crate::materialize::delete_descendants(scene, node)?;
            }
            scene.delete_node(node)?;
            ctx.commit_edit(document)
        })
    }

    /// Append `child` to `parent`'s children
    ///
    /// # Errors
    /// Returns error for locked nodes, subtree references as parent, missing
    /// ports, duplicates and self loops, or outside editor mode
    pub fn connect(
        &mut self,
        document: &str,
        parent: NodeHandle,
        child: NodeHandle,
    ) -> Result<ConnectionHandle> {
        self.ensure_editable()?;
        if self.editable_node(document, parent)?.is_subtree() {
            return Err(InvariantViolation::ReferenceOutput(parent).into());
        }
        self.editable_node(document, child)?;
        self.transaction(|ctx| {
            let connection = ctx
                .registry
                .get_mut(document)?
                .scene_mut()
                .connect(parent, child)?;
            ctx.commit_edit(document)?;
            Ok(connection)
        })
    }

    /// Remove a connection
    ///
    /// # Errors
    /// Returns error if either end is locked or the connection is unknown
    pub fn disconnect(&mut self, document: &str, connection: ConnectionHandle) -> Result<()> {
        self.ensure_editable()?;
        let link = self
            .registry
            .get(document)?
            .scene()
            .connection(connection)
            .ok_or(treeforge_scene::SceneError::ConnectionNotFound(connection))?;
        self.editable_node(document, link.parent)?;
        self.editable_node(document, link.child)?;
        self.transaction(|ctx| {
            ctx.registry.get_mut(document)?.scene_mut().disconnect(connection)?;
            ctx.commit_edit(document)
        })
    }

    /// Rename a node instance
    ///
    /// # Errors
    /// Returns error for locked or unknown nodes, or outside editor mode
    pub fn set_instance_name(&mut self, document: &str, node: NodeHandle, name: &str) -> Result<()> {
        self.ensure_editable()?;
        self.editable_node(document, node)?;
        self.transaction(|ctx| {
            if let Some(data) = ctx.registry.get_mut(document)?.scene_mut().node_mut(node) {
                data.instance_name = name.to_string();
            }
            ctx.commit_edit(document)
        })
    }

    /// Map one port of a node instance
    ///
    /// # Errors
    /// Returns error for locked nodes or ports the model does not declare
    pub fn set_port_mapping(
        &mut self,
        document: &str,
        node: NodeHandle,
        port: &str,
        value: &str,
    ) -> Result<()> {
        self.ensure_editable()?;
        let data = self.editable_node(document, node)?;
        if !data.model.ports.contains_key(port) {
            return Err(EditorError::UnknownPort {
                model: data.registration_id().to_string(),
                port: port.to_string(),
            });
        }
        self.transaction(|ctx| {
            if let Some(data) = ctx.registry.get_mut(document)?.scene_mut().node_mut(node) {
                data.ports_mapping.insert(port.to_string(), value.to_string());
            }
            ctx.commit_edit(document)
        })
    }

    /// Move a node on the canvas
    ///
    /// # Errors
    /// Returns error for unknown nodes, or outside editor mode
    pub fn move_node(&mut self, document: &str, node: NodeHandle, position: Point) -> Result<()> {
        self.ensure_editable()?;
        self.transaction(|ctx| {
            let data = ctx
                .registry
                .get_mut(document)?
                .scene_mut()
                .node_mut(node)
                .ok_or_else(|| EditorError::NodeNotFound {
                    document: document.to_string(),
                    node,
                })?;
            data.position = position;
            ctx.push_undo()
        })
    }

    /// Re-layout a document; returns `false` when it is not a valid tree
    ///
    /// # Errors
    /// Returns error for unknown documents, or outside editor mode
    pub fn arrange(&mut self, document: &str) -> Result<bool> {
        self.ensure_editable()?;
        self.transaction(|ctx| {
            let layout = ctx.config.layout.clone();
            let arranged = arrange(ctx.registry.get_mut(document)?.scene_mut(), &layout);
            if arranged {
                ctx.push_undo()?;
            }
            Ok(arranged)
        })
    }

    fn subtree_ref(&self, document: &str, node: NodeHandle) -> Result<SubtreeRef> {
        let reference = SubtreeRef::of(self.registry.get(document)?, node)?;
        self.editable_node(document, node)?;
        Ok(reference)
    }

    fn finish_transition(&mut self, document: &str, node: NodeHandle, state: ExpansionState) -> Result<()> {
        self.emit(Notification::SubtreeExpansionChanged {
            document: document.to_string(),
            node,
            state,
        });
        self.commit_edit(document)
    }

    /// Inline the referenced document below a collapsed reference
    ///
    /// # Errors
    /// See [`subtree::expand`]; also fails for locked references
    pub fn expand_subtree(&mut self, document: &str, node: NodeHandle) -> Result<usize> {
        self.ensure_editable()?;
        let reference = self.subtree_ref(document, node)?;
        self.transaction(|ctx| {
            let layout = ctx.config.layout.clone();
            let inserted = subtree::expand(&mut ctx.registry, document, reference, &layout)?;
            ctx.finish_transition(document, node, ExpansionState::Expanded)?;
            Ok(inserted)
        })
    }

    /// Remove the inlined body of an expanded reference
    ///
    /// # Errors
    /// See [`subtree::collapse`]; also fails for locked references
    pub fn collapse_subtree(&mut self, document: &str, node: NodeHandle) -> Result<usize> {
        self.ensure_editable()?;
        let reference = self.subtree_ref(document, node)?;
        self.transaction(|ctx| {
            let layout = ctx.config.layout.clone();
            let removed = subtree::collapse(&mut ctx.registry, document, reference, &layout)?;
            ctx.finish_transition(document, node, ExpansionState::Collapsed)?;
            Ok(removed)
        })
    }

    /// Rebuild the inlined body of an expanded reference
    ///
    /// # Errors
    /// See [`subtree::refresh`]; also fails for locked references
    pub fn refresh_subtree(&mut self, document: &str, node: NodeHandle) -> Result<usize> {
        self.ensure_editable()?;
        let reference = self.subtree_ref(document, node)?;
        self.transaction(|ctx| {
            let layout = ctx.config.layout.clone();
            let inserted = subtree::refresh(&mut ctx.registry, document, reference, &layout)?;
            ctx.finish_transition(document, node, ExpansionState::Expanded)?;
            Ok(inserted)
        })
    }

    /// Switch to a tab
    ///
    /// In editor mode the tab's expanded references are refreshed first;
    /// references whose target became invalid are collapsed, which is pushed
    /// as an undoable change.
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn activate(&mut self, document: &str) -> Result<()> {
        self.transaction(|ctx| {
            ctx.registry.set_active(document)?;
            if ctx.config.mode.allows_editing() {
                let layout = ctx.config.layout.clone();
                let changes = refresh_document(&mut ctx.registry, document, &layout)?;
                if !changes.is_empty() {
                    for change in changes {
                        ctx.emit(change);
                    }
                    ctx.commit_edit(document)?;
                }
            }
            Ok(())
        })
    }

    /// Logical tree of a document
    ///
    /// # Errors
    /// Returns error if the document is missing or not a valid tree
    pub fn tree(&self, document: &str) -> Result<AbsBehaviorTree> {
        build_tree(self.registry.get(document)?.scene())
            .map_err(|err| EditorError::validity(document, err))
    }

    /// Check whether a document holds a valid tree
    ///
    /// # Errors
    /// Returns error if the document does not exist
    pub fn contains_valid_tree(&self, document: &str) -> Result<bool> {
        Ok(contains_valid_tree(self.registry.get(document)?.scene()))
    }

    /// Tree of a document with every subtree reference recursively inlined
    ///
    /// # Errors
    /// See [`subtree::flatten`]
    pub fn flatten(&self, document: &str) -> Result<AbsBehaviorTree> {
        subtree::flatten(&self.registry, document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EditorConfig, EditorMode};

    fn context() -> (EditorContext, NodeHandle) {
        let ctx: EditorContext = EditorContext::new(EditorConfig::default()).unwrap();
        let root = ctx.document("BehaviorTree").unwrap().scene().nodes()[0];
        (ctx, root)
    }

    #[test]
    fn edits_push_undo_and_dirty_the_set() {
        let (mut ctx, root) = context();
        assert!(ctx.is_saved());
        let seq = ctx.add_node("BehaviorTree", "Sequence", Point::default()).unwrap();
        ctx.connect("BehaviorTree", root, seq).unwrap();
        assert!(!ctx.is_saved());
        assert_eq!(ctx.history().undo_len(), 2);
        assert!(ctx.contains_valid_tree("BehaviorTree").unwrap());

        ctx.mark_saved();
        assert!(ctx.is_saved());
    }

    #[test]
    fn unknown_models_and_ports_are_rejected() {
        let (mut ctx, root) = context();
        assert!(matches!(
            ctx.add_node("BehaviorTree", "Teleport", Point::default()),
            Err(EditorError::UnknownModel(_))
        ));
        let repeat = ctx.add_node("BehaviorTree", "Repeat", Point::default()).unwrap();
        ctx.set_port_mapping("BehaviorTree", repeat, "num_cycles", "3").unwrap();
        assert!(matches!(
            ctx.set_port_mapping("BehaviorTree", repeat, "speed", "3"),
            Err(EditorError::UnknownPort { .. })
        ));
        assert!(matches!(
            ctx.connect("BehaviorTree", repeat, root),
            Err(EditorError::Scene(_))
        ));
    }

    #[test]
    fn read_only_modes_reject_edits() {
        let (mut ctx, _) = context();
        ctx.set_mode(EditorMode::Monitor);
        assert!(matches!(
            ctx.add_node("BehaviorTree", "Sequence", Point::default()),
            Err(EditorError::ReadOnlyMode(EditorMode::Monitor))
        ));
        assert!(!ctx.undo().unwrap());
    }

    #[test]
    fn failed_edit_leaves_history_alone() {
        let (mut ctx, root) = context();
        let before = ctx.snapshot().unwrap();
        assert!(ctx.connect("BehaviorTree", root, root).is_err());
        assert_eq!(ctx.snapshot().unwrap(), before);
        assert_eq!(ctx.history().undo_len(), 0);
    }
}
