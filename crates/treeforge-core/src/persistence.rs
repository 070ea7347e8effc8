//! Saving and loading the document set
//!
//! # Core Concepts
//!
//! - [`EditorContext::encode_document_set`]: Every document as a root-less
//!   tree with collapsed subtree references, plus the custom models
//! - [`EditorContext::load_document_set`]: Replace everything with a saved
//!   set, or change nothing
//! - [`EditorContext::check_required_ports`]: Required ports still unmapped
//! - Workspace models: a shared palette merged into the registered models

use crate::builder::{build_tree, contains_valid_tree};
use crate::codec::{TreeDescription, TreeSetDescription};
use crate::context::EditorContext;
use crate::error::{EditorError, Result};
use crate::layout::arrange;
use crate::materialize::replace_with_tree;
use crate::notify::DocumentChange;
use crate::tree::AbsBehaviorTree;
use indexmap::IndexSet;
use treeforge_model::{
    is_builtin, NodeKind, NodeModel, WorkspaceConflict, WorkspaceMergeReport, ROOT_MODEL_ID,
};
use treeforge_scene::SceneAdapter;

/// A required port without a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPort {
    /// Document holding the node
    pub document: String,
    /// Model of the node
    pub registration_id: String,
    /// Node instance name
    pub instance_name: String,
    /// Required port without a value
    pub port: String,
}

impl<S: SceneAdapter> EditorContext<S> {
    /// Required ports whose mapping is empty or absent, over every valid
    /// document
    ///
    /// Nodes of inlined subtree bodies are reported in their own document
    /// only.
    #[must_use]
    pub fn check_required_ports(&self) -> Vec<MissingPort> {
        let mut missing = Vec::new();
        for document in self.registry.iter() {
            let scene = document.scene();
            if !contains_valid_tree(scene) {
                continue;
            }
            for handle in scene.nodes() {
                let Some(node) = scene.node(handle).filter(|n| !n.locked) else {
                    continue;
                };
                for (port, declared) in &node.model.ports {
                    let unset = node.ports_mapping.get(port).map_or(true, String::is_empty);
                    if declared.required && unset {
                        missing.push(MissingPort {
                            document: document.name().to_string(),
                            registration_id: node.registration_id().to_string(),
                            instance_name: node.instance_name.clone(),
                            port: port.clone(),
                        });
                    }
                }
            }
        }
        missing
    }

    /// Describe the whole document set for saving
    ///
    /// # Errors
    /// - [`EditorError::Validity`] naming the first invalid document
    /// - [`EditorError::RequiredPortsUnset`] listing every unmapped required
    ///   port
    pub fn encode_document_set(&self) -> Result<TreeSetDescription> {
        let mut trees = Vec::with_capacity(self.registry.len());
        for document in self.registry.iter() {
            let tree = build_tree(document.scene())
                .map_err(|err| EditorError::validity(document.name(), err))?;
            trees.push(TreeDescription::new(
                document.name(),
                tree.without_subtree_bodies().without_root(),
            ));
        }

        let missing = self.check_required_ports();
        if !missing.is_empty() {
            return Err(EditorError::RequiredPortsUnset(missing));
        }

        tracing::debug!(documents = trees.len(), "encoded document set");
        Ok(TreeSetDescription {
            main_tree: self.registry.main_name().map(str::to_string),
            trees,
            models: self.models.custom_models().cloned().collect(),
        })
    }

    /// Replace every document with the saved set
    ///
    /// The set's models are registered first. Subtree references to names
    /// without a model become subtree models; references to documents the
    /// set does not contain get an empty document. Allowed in every mode; the
    /// history is reset and the set counts as saved.
    ///
    /// # Errors
    /// - [`EditorError::UnknownModel`] for nodes of unregistered, non-subtree
    ///   models
    /// - [`EditorError::NameConflict`] for duplicate tree ids
    /// - [`EditorError::Model`] for models clashing with built-ins
    ///
    /// On error nothing changes.
    pub fn load_document_set(&mut self, description: &TreeSetDescription) -> Result<()> {
        self.transaction(|ctx| {
            let previous = ctx.registry.names();
            for name in &previous {
                if ctx.models.get(name).is_some_and(NodeModel::is_subtree) {
                    ctx.models.unregister(name)?;
                }
            }
            ctx.registry.clear();

            for model in description.models.iter().filter(|m| !is_builtin(&m.registration_id)) {
                ctx.models.register(model.clone())?;
                ctx.emit_model(&model.registration_id);
            }

            let root_model = ctx
                .models
                .get(ROOT_MODEL_ID)
                .cloned()
                .unwrap_or_else(|| NodeModel::new(NodeKind::Root, ROOT_MODEL_ID));
            let mut referenced = IndexSet::new();
            for entry in &description.trees {
                if let Some(tree) = &entry.tree {
                    ctx.check_models(tree, &mut referenced)?;
                }
                ctx.registry.insert(&entry.id, S::default())?;
                let scene = ctx.registry.get_mut(&entry.id)?.scene_mut();
                replace_with_tree(scene, entry.tree.as_ref(), root_model.clone())?;
            }

            for name in referenced {
                if !ctx.registry.contains(&name) {
                    tracing::debug!(document = %name, "creating empty document for dangling reference");
                    ctx.registry.create(&name)?;
                }
            }
            if ctx.registry.is_empty() {
                let fallback = ctx.config.default_tree_name.clone();
                ctx.registry.create(&fallback)?;
            }

            let main = description
                .main_tree
                .as_deref()
                .filter(|m| ctx.registry.contains(m))
                .map(str::to_string)
                .or_else(|| ctx.registry.names().into_iter().next());
            if let Some(main) = &main {
                ctx.registry.set_main(main)?;
                ctx.registry.set_active(main)?;
            }

            let layout = ctx.config.layout.clone();
            for name in ctx.registry.names() {
                if main.as_deref() != Some(name.as_str()) {
                    match ctx.models.get(&name).map(NodeModel::is_subtree) {
                        Some(false) => return Err(EditorError::NameConflict(name)),
                        Some(true) => {}
                        None => {
                            ctx.models.register(NodeModel::subtree(name.as_str()))?;
                            ctx.emit_model(&name);
                        }
                    }
                }
                arrange(ctx.registry.get_mut(&name)?.scene_mut(), &layout);
            }

            for name in &previous {
                if !ctx.registry.contains(name) {
                    ctx.emit_document(name, DocumentChange::Removed);
                }
            }
            for name in ctx.registry.names() {
                ctx.emit_document(&name, DocumentChange::Restored);
            }
            ctx.reset_history()?;
            ctx.saved = true;
            tracing::info!(
                documents = ctx.registry.len(),
                main = main.as_deref().unwrap_or_default(),
                "document set loaded"
            );
            Ok(())
        })
    }

    /// Make sure every node of `tree` has a registered model, registering
    /// subtree models on the fly; collects the referenced subtree names
    fn check_models(&mut self, tree: &AbsBehaviorTree, referenced: &mut IndexSet<String>) -> Result<()> {
        for node in tree.nodes() {
            let id = node.registration_id();
            if node.kind() == NodeKind::Subtree {
                referenced.insert(id.to_string());
                if !self.models.contains(id) {
                    self.models.register(NodeModel::subtree(id))?;
                    self.emit_model(id);
                }
            } else if !self.models.contains(id) {
                return Err(EditorError::UnknownModel(id.to_string()));
            }
        }
        Ok(())
    }

    /// Merge shared models into the registered set
    ///
    /// Instances of models replaced under [`WorkspaceConflict::UseWorkspace`]
    /// are updated in every document.
    ///
    /// # Errors
    /// Returns error outside editor mode or on scene failures
    pub fn merge_workspace(
        &mut self,
        models: impl IntoIterator<Item = NodeModel>,
        policy: WorkspaceConflict,
    ) -> Result<WorkspaceMergeReport> {
        self.ensure_editable()?;
        self.transaction(|ctx| {
            let report = ctx.models.merge_workspace(models, policy);
            for id in &report.replaced {
                if let Some(model) = ctx.models.get(id).cloned() {
                    let changed = ctx.substitute(id, &model);
                    ctx.propagate(&changed)?;
                }
            }
            for id in report.added.iter().chain(&report.replaced) {
                ctx.emit_model(id);
            }
            if !report.conflicts.is_empty() {
                tracing::warn!(conflicts = ?report.conflicts, ?policy, "workspace models differ from registered ones");
            }
            ctx.push_undo()?;
            Ok(report)
        })
    }

    /// Add a model to the workspace palette without registering it
    pub fn add_to_workspace(&mut self, model: NodeModel) {
        let id = model.registration_id.clone();
        self.models.add_to_workspace(model);
        self.emit_model(&id);
    }

    /// Workspace palette in insertion order
    pub fn workspace_models(&self) -> impl Iterator<Item = &NodeModel> {
        self.models.workspace()
    }
}
